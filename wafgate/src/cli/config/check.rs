use owo_colors::OwoColorize;
use std::path::PathBuf;
use wafgate_core::{ConfigError, WafConfig};

pub fn check(path: PathBuf, plain: bool) -> anyhow::Result<()> {
    match WafConfig::from_file(&path) {
        Ok(cfg) => {
            for line in summary(&cfg) {
                println!("✔ {line}");
            }
            Ok(())
        }
        Err(err) => {
            print_config_error(&err, plain);
            std::process::exit(1);
        }
    }
}

fn summary(cfg: &WafConfig) -> Vec<String> {
    let mut lines = vec![
        "Config loaded successfully".to_string(),
        format!("{} directive lines", cfg.directive_lines()),
        format!("{} include entries", cfg.include.len()),
    ];
    if let Some(tag) = &cfg.tag {
        lines.push(format!("tag: {tag}"));
    }
    if let Some(level) = cfg.debug_level {
        lines.push(format!("engine debug log: {level}"));
    }
    lines
}

fn print_config_error(err: &ConfigError, plain: bool) {
    if plain {
        eprintln!("error: {err}");
    } else {
        eprintln!();
        eprintln!("{}: {}", "error".red().bold(), err);
    }
    if let Some(hint) = config_error_hint(err) {
        eprintln!();
        eprintln!("{hint}");
    }
}

pub fn config_error_hint(err: &ConfigError) -> Option<&'static str> {
    match err {
        ConfigError::Parse { .. } => Some(
            "The config file must be TOML with a single [waf] table.\n\
             \n\
             Example:\n\
             \n\
             [waf]\n\
             include    = [\"/etc/wafgate/rules/*.conf\"]\n\
             directives = \"SecRuleEngine On\"",
        ),

        ConfigError::EmptyInclude { .. } => Some(
            "Include entries must name a rule file or a glob pattern.\n\
             \n\
             Remove the empty entry from `include`.",
        ),

        ConfigError::Glob { .. } => Some(
            "Include patterns use shell glob syntax: `*`, `?` and `[...]`.\n\
             \n\
             Check for unbalanced brackets.",
        ),

        ConfigError::InvalidTag { .. } => Some(
            "Tags label log lines and must be a single word.\n\
             \n\
             Example:\n\
             \n\
             tag = \"edge\"",
        ),

        _ => None,
    }
}
