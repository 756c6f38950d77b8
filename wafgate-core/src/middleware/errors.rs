use crate::ctx::ResponseWriter;
use crate::engine::{EngineError, Interruption};
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use thiserror::Error;

/// Request translation failed before the engine reached a verdict.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("failed to append request body: {0}")]
    ReadBody(#[source] EngineError),

    #[error("failed to get the request body: {0}")]
    BodyReader(#[source] EngineError),

    #[error("failed to process request body: {0}")]
    ProcessBody(#[source] EngineError),
}

/// Appending to the engine's response body buffer failed.
#[derive(Debug, Error)]
#[error("failed to buffer response body: {source}")]
pub struct RecorderWriteError {
    #[source]
    pub source: EngineError,
}

/// Everything a request can end with besides success.
///
/// Interruptions are control flow, not failures: the engine decided to block
/// and the host only has to answer with [`HandlerError::status`].
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("transaction {transaction_id} interrupted by rule {} ({})", .interruption.rule_id, .interruption.action)]
    Interrupted {
        transaction_id: String,
        interruption: Interruption,
    },

    #[error("transaction {transaction_id}: {source}")]
    Translation {
        transaction_id: String,
        #[source]
        source: TranslationError,
    },

    #[error("transaction {transaction_id}: {source}")]
    ResponseBody {
        transaction_id: String,
        #[source]
        source: EngineError,
    },

    #[error("downstream handler failed ({status}): {message}")]
    Downstream { status: StatusCode, message: String },

    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub fn downstream(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Downstream {
            status,
            message: message.into(),
        }
    }

    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Interrupted { transaction_id, .. }
            | Self::Translation { transaction_id, .. }
            | Self::ResponseBody { transaction_id, .. } => Some(transaction_id),
            Self::Downstream { .. } | Self::Io(_) => None,
        }
    }

    /// Status the host should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Interrupted { interruption, .. } => interruption.status_code(),
            Self::Downstream { status, .. } => *status,
            Self::Translation { .. } | Self::ResponseBody { .. } | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render the error page for this error: the status line and its
    /// canonical reason. Internal error text never reaches the client.
    pub fn write_response(&self, w: &mut dyn ResponseWriter) -> std::io::Result<()> {
        let status = self.status();
        let body = status.canonical_reason().unwrap_or_default();

        let headers = w.headers_mut();
        headers.clear();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        w.write_header(status);
        let mut written = 0;
        while written < body.len() {
            match w.write(&body.as_bytes()[written..])? {
                0 => break,
                n => written += n,
            }
        }
        Ok(())
    }
}
