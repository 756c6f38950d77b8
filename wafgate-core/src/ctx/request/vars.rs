use std::collections::HashMap;

/// Trusted client address (`ip` or `ip:port`) resolved by the host, e.g.
/// from forwarding headers sent by a known proxy.
pub const CLIENT_IP_VAR: &str = "client_ip";

/// Identifier of the WAF transaction handling the request.
pub const TRANSACTION_ID_VAR: &str = "transaction_id";

/// Request-scoped variables shared between the host, the middleware and the
/// downstream handlers (log correlation, placeholders).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestVars(HashMap<String, String>);

impl RequestVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
