use http::StatusCode;

/// The engine's decision to stop a request or response.
///
/// Only `status` is interpreted by the adapter. The rest is carried along for
/// logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interruption {
    pub rule_id: u32,
    pub action: String,
    pub status: u16,
    pub data: String,
}

impl Interruption {
    pub fn new(rule_id: u32, action: impl Into<String>, status: u16) -> Self {
        Self {
            rule_id,
            action: action.into(),
            status,
            data: String::new(),
        }
    }

    /// HTTP status to answer with. Rules that do not set one (or set an
    /// invalid one) block with 403.
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            0 => StatusCode::FORBIDDEN,
            s => StatusCode::from_u16(s).unwrap_or(StatusCode::FORBIDDEN),
        }
    }
}
