use crate::engine::{DebugLevel, DebugLogger, ErrorCallback, Field, MatchedRule, RuleSeverity};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

macro_rules! emit {
    ($level:expr, $($fields:tt)*) => {
        match $level {
            LogLevel::Debug => debug!($($fields)*),
            LogLevel::Info  => info!($($fields)*),
            LogLevel::Warn  => warn!($($fields)*),
            LogLevel::Error => error!($($fields)*),
        }
    };
}

/// Log level a matched rule is reported at.
///
/// Unrecognized severities land in the debug bucket so a misbehaving engine
/// cannot flood the error log.
pub(crate) fn level_for(severity: RuleSeverity) -> LogLevel {
    match severity {
        RuleSeverity::Emergency
        | RuleSeverity::Alert
        | RuleSeverity::Critical
        | RuleSeverity::Error => LogLevel::Error,
        RuleSeverity::Warning => LogLevel::Warn,
        RuleSeverity::Notice | RuleSeverity::Info => LogLevel::Info,
        RuleSeverity::Debug | RuleSeverity::Unknown(_) => LogLevel::Debug,
    }
}

pub fn log_matched_rule(rule: &MatchedRule, tag: Option<&str>) {
    emit!(
        level_for(rule.severity),
        rule_id = rule.id,
        severity = %rule.severity,
        transaction_id = %rule.transaction_id,
        tag = tag.unwrap_or_default(),
        "{}",
        rule.message
    );
}

/// Build the callback registered with the engine at provisioning time.
pub fn error_callback(tag: Option<String>) -> ErrorCallback {
    Arc::new(move |rule: &MatchedRule| log_matched_rule(rule, tag.as_deref()))
}

/// Engine debug log forwarded to `tracing` under the `wafgate::engine` target.
///
/// Fields are rendered as `key=value` pairs, context fields first.
#[derive(Debug, Clone, Default)]
pub struct TracingDebugLogger {
    level: DebugLevel,
    context: Vec<Field>,
    discarded: bool,
}

impl TracingDebugLogger {
    pub fn new(level: DebugLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    fn render(&self, fields: &[Field]) -> String {
        let mut out = String::new();
        for (key, value) in self.context.iter().chain(fields) {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{key}={value}");
        }
        out
    }
}

impl DebugLogger for TracingDebugLogger {
    fn level(&self) -> DebugLevel {
        if self.discarded {
            DebugLevel::NoLog
        } else {
            self.level
        }
    }

    fn with_level(&self, level: DebugLevel) -> Arc<dyn DebugLogger> {
        Arc::new(Self {
            level,
            ..self.clone()
        })
    }

    fn with_fields(&self, fields: Vec<Field>) -> Arc<dyn DebugLogger> {
        let mut next = self.clone();
        if !self.discarded {
            next.context.extend(fields);
        }
        Arc::new(next)
    }

    fn discard(&self) -> Arc<dyn DebugLogger> {
        Arc::new(Self {
            discarded: true,
            context: Vec::new(),
            ..self.clone()
        })
    }

    fn log(&self, level: DebugLevel, fields: &[Field], message: &str) {
        if self.discarded {
            return;
        }
        let fields = self.render(fields);
        match level {
            DebugLevel::NoLog => {}
            DebugLevel::Trace => trace!(target: "wafgate::engine", fields, "{message}"),
            DebugLevel::Debug => debug!(target: "wafgate::engine", fields, "{message}"),
            DebugLevel::Info => info!(target: "wafgate::engine", fields, "{message}"),
            DebugLevel::Warn => warn!(target: "wafgate::engine", fields, "{message}"),
            DebugLevel::Error => error!(target: "wafgate::engine", fields, "{message}"),
        }
    }
}

/// Debug logger handed to the engine at provisioning time.
pub fn debug_logger(level: DebugLevel, tag: Option<&str>) -> Arc<dyn DebugLogger> {
    let logger = TracingDebugLogger::new(level);
    match tag {
        Some(tag) => logger.with_fields(vec![(
            "tag".to_string(),
            crate::engine::FieldValue::Str(tag.to_string()),
        )]),
        None => Arc::new(logger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn severities_map_to_log_levels() {
        let cases = [
            (0, LogLevel::Error),
            (1, LogLevel::Error),
            (2, LogLevel::Error),
            (3, LogLevel::Error),
            (4, LogLevel::Warn),
            (5, LogLevel::Info),
            (6, LogLevel::Info),
            (7, LogLevel::Debug),
        ];

        for (level, expected) in cases {
            assert_eq!(level_for(RuleSeverity::from_level(level)), expected);
        }
    }

    #[test]
    fn unknown_severity_falls_into_debug_bucket() {
        let severity = RuleSeverity::from_level(42);

        assert_eq!(severity, RuleSeverity::Unknown(42));
        assert_eq!(level_for(severity), LogLevel::Debug);
        assert_eq!(severity.to_string(), "unknown(42)");
    }

    #[test]
    fn debug_logger_renders_context_before_event_fields() {
        let logger = TracingDebugLogger::new(DebugLevel::Debug);
        let scoped = TracingDebugLogger {
            context: vec![("tx".to_string(), FieldValue::Str("abc".to_string()))],
            ..logger
        };

        let rendered = scoped.render(&[("size".to_string(), FieldValue::Uint(3))]);

        assert_eq!(rendered, "tx=\"abc\" size=3");
    }

    #[test]
    fn debug_logger_with_fields_keeps_the_original_untouched() {
        let base: Arc<dyn DebugLogger> = debug_logger(DebugLevel::Info, None);
        let scoped = base.with_fields(vec![("k".to_string(), FieldValue::Bool(true))]);

        assert_eq!(scoped.level(), DebugLevel::Info);
        assert_eq!(base.level(), DebugLevel::Info);
        assert!(scoped.info().is_enabled());
        assert!(!scoped.debug().is_enabled());
    }

    #[test]
    fn discarded_debug_logger_is_a_no_op() {
        let logger = debug_logger(DebugLevel::Trace, Some("edge")).discard();

        assert_eq!(logger.level(), DebugLevel::NoLog);
        assert!(!logger.error().is_enabled());

        // Raising the level again does not bring output back.
        let louder = logger.with_level(DebugLevel::Trace);
        assert!(!louder.error().is_enabled());
        louder.error().str("k", "v").msg("dropped");
    }

    #[test]
    fn no_log_level_silences_the_tracing_logger() {
        let logger = debug_logger(DebugLevel::Info, None).with_level(DebugLevel::NoLog);

        assert!(!logger.error().is_enabled());
    }

    #[test]
    fn callback_accepts_rules_without_subscriber() {
        let callback = error_callback(Some("edge".to_string()));

        callback(&MatchedRule {
            id: 101,
            severity: RuleSeverity::Critical,
            transaction_id: "abc".to_string(),
            message: "matched".to_string(),
        });
    }
}
