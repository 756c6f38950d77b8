use crate::config::ConfigError;
use crate::engine::DebugLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rule sources and labels for the middleware.
///
/// ```toml
/// [waf]
/// include = ["/etc/wafgate/rules/*.conf"]
/// directives = """
/// SecRuleEngine On
/// """
/// tag = "edge"
/// debug_level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WafConfig {
    /// Rule files or glob patterns, compiled after `directives`.
    #[serde(default)]
    pub include: Vec<String>,

    /// Inline rules.
    #[serde(default)]
    pub directives: String,

    /// Label attached to every log line of this middleware instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Verbosity of the engine's debug log. Unset means `info`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_level: Option<DebugLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    waf: WafConfig,
}

impl WafConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::parse(path, &contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(Path::new("<inline>"), contents)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| ConfigError::parse(path, e))?;
        file.waf.validate()?;
        Ok(file.waf)
    }

    /// Check the config without touching the engine or the filesystem.
    ///
    /// Include entries are only checked for glob syntax: resolving them is
    /// left to the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, entry) in self.include.iter().enumerate() {
            if entry.trim().is_empty() {
                return Err(ConfigError::EmptyInclude { index });
            }
            glob::Pattern::new(entry).map_err(|source| ConfigError::Glob {
                pattern: entry.clone(),
                source,
            })?;
        }

        if let Some(tag) = &self.tag {
            if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidTag { tag: tag.clone() });
            }
        }

        Ok(())
    }

    /// Number of non-blank, non-comment directive lines.
    pub fn directive_lines(&self) -> usize {
        self.directives
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .count()
    }
}
