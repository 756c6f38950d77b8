use std::fmt::{Display, Formatter};

/// Rule severity as reported by the engine (syslog numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSeverity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    /// A level outside 0..=7.
    Unknown(u8),
}

impl RuleSeverity {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            other => Self::Unknown(other),
        }
    }
}

impl Display for RuleSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Emergency => f.write_str("emergency"),
            Self::Alert => f.write_str("alert"),
            Self::Critical => f.write_str("critical"),
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Notice => f.write_str("notice"),
            Self::Info => f.write_str("info"),
            Self::Debug => f.write_str("debug"),
            Self::Unknown(level) => write!(f, "unknown({level})"),
        }
    }
}

/// A rule that matched during a transaction, as handed to the error callback.
#[derive(Debug, Clone)]
pub struct MatchedRule {
    pub id: u32,
    pub severity: RuleSeverity,
    pub transaction_id: String,
    pub message: String,
}
