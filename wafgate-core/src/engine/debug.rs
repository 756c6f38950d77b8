use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Verbosity of the engine's own diagnostics, quietest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[serde(rename = "off")]
    NoLog,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebugLevel::NoLog => "off",
            DebugLevel::Error => "error",
            DebugLevel::Warn => "warn",
            DebugLevel::Info => "info",
            DebugLevel::Debug => "debug",
            DebugLevel::Trace => "trace",
        };
        f.write_str(s)
    }
}

/// Typed value attached to a debug event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Err(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) | FieldValue::Err(s) => write!(f, "{s:?}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Uint(u) => write!(f, "{u}"),
        }
    }
}

pub type Field = (String, FieldValue);

/// Sink for the engine's debug log.
///
/// Loggers are immutable: `with_*` return a new logger and leave `self`
/// untouched.
pub trait DebugLogger: Send + Sync {
    fn level(&self) -> DebugLevel;

    fn with_level(&self, level: DebugLevel) -> Arc<dyn DebugLogger>;

    /// Logger that attaches `fields` to every event.
    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn DebugLogger>;

    /// Logger that drops everything.
    fn discard(&self) -> Arc<dyn DebugLogger>;

    /// Write one event. Level gating already happened in [`DebugEvent`].
    fn log(&self, level: DebugLevel, fields: &[Field], message: &str);
}

impl dyn DebugLogger + '_ {
    fn event(&self, level: DebugLevel) -> DebugEvent<'_> {
        let enabled = level != DebugLevel::NoLog && level <= self.level();
        DebugEvent {
            logger: enabled.then_some(self),
            level,
            fields: Vec::new(),
        }
    }

    pub fn trace(&self) -> DebugEvent<'_> {
        self.event(DebugLevel::Trace)
    }

    pub fn debug(&self) -> DebugEvent<'_> {
        self.event(DebugLevel::Debug)
    }

    pub fn info(&self) -> DebugEvent<'_> {
        self.event(DebugLevel::Info)
    }

    pub fn warn(&self) -> DebugEvent<'_> {
        self.event(DebugLevel::Warn)
    }

    pub fn error(&self) -> DebugEvent<'_> {
        self.event(DebugLevel::Error)
    }
}

/// One pending debug event. Disabled events collect nothing.
pub struct DebugEvent<'a> {
    logger: Option<&'a dyn DebugLogger>,
    level: DebugLevel,
    fields: Vec<Field>,
}

impl DebugEvent<'_> {
    pub fn is_enabled(&self) -> bool {
        self.logger.is_some()
    }

    fn field(mut self, key: &str, value: impl FnOnce() -> FieldValue) -> Self {
        if self.logger.is_some() {
            self.fields.push((key.to_string(), value()));
        }
        self
    }

    pub fn str(self, key: &str, value: &str) -> Self {
        self.field(key, || FieldValue::Str(value.to_string()))
    }

    pub fn bool(self, key: &str, value: bool) -> Self {
        self.field(key, || FieldValue::Bool(value))
    }

    pub fn int(self, key: &str, value: i64) -> Self {
        self.field(key, || FieldValue::Int(value))
    }

    pub fn uint(self, key: &str, value: u64) -> Self {
        self.field(key, || FieldValue::Uint(value))
    }

    pub fn display(self, key: &str, value: &dyn fmt::Display) -> Self {
        self.field(key, || FieldValue::Str(value.to_string()))
    }

    pub fn err(self, err: &dyn std::error::Error) -> Self {
        self.field("error", || FieldValue::Err(err.to_string()))
    }

    pub fn msg(self, message: &str) {
        if let Some(logger) = self.logger {
            logger.log(self.level, &self.fields, message);
        }
    }
}
