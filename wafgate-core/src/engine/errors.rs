use thiserror::Error;

/// Errors surfaced by a rule engine through the transaction API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid directive: {message}")]
    Directive { message: String },

    #[error("body limit bookkeeping failed: {message}")]
    Limit { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl EngineError {
    pub fn directive(message: impl Into<String>) -> Self {
        Self::Directive {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
