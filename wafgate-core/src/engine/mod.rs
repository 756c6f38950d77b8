mod debug;
pub mod errors;
mod interruption;
pub mod log;
mod severity;

pub use self::debug::{DebugEvent, DebugLevel, DebugLogger, Field, FieldValue};
pub use self::errors::EngineError;
pub use self::interruption::Interruption;
pub use self::severity::{MatchedRule, RuleSeverity};

use std::io::Read;
use std::sync::Arc;

/// Callback the engine invokes for every rule that matched during a transaction.
pub type ErrorCallback = Arc<dyn Fn(&MatchedRule) + Send + Sync>;

/// A compiled rule engine, built once at startup and shared read-only by
/// every request.
pub trait Waf: Send + Sync {
    type Transaction: Transaction;

    /// Open a new inspection session identified by `id`.
    fn new_transaction(&self, id: &str) -> Self::Transaction;
}

/// Setup-time construction of a [`Waf`].
///
/// Rule sources are handed over as-is. Resolving include patterns and reading
/// rule files is the engine's business.
pub trait WafBuilder {
    type Waf: Waf;

    fn with_error_callback(&mut self, callback: ErrorCallback);

    /// Route the engine's own diagnostics to `logger`.
    fn with_debug_logger(&mut self, logger: Arc<dyn DebugLogger>);

    /// Compile inline rule text.
    fn with_directives(&mut self, directives: &str) -> Result<(), EngineError>;

    /// Compile the rules found at `path`, which may be a glob pattern.
    fn with_directives_from_path(&mut self, path: &str) -> Result<(), EngineError>;

    fn build(self) -> Result<Self::Waf, EngineError>;
}

/// One request's inspection session.
///
/// The adapter drives it in phase order: connection, URI, request headers,
/// request body, response headers, response body, logging. Once an
/// interruption is set it stays set for the rest of the transaction.
pub trait Transaction: Send {
    fn id(&self) -> &str;

    fn process_connection(
        &mut self,
        client_ip: &str,
        client_port: u16,
        server_ip: &str,
        server_port: u16,
    );

    fn process_uri(&mut self, uri: &str, method: &str, protocol: &str);

    fn add_request_header(&mut self, key: &str, value: &str);

    fn set_server_name(&mut self, name: &str);

    fn process_request_headers(&mut self) -> Option<Interruption>;

    /// Whether the engine wants to see the request body at all.
    fn is_request_body_accessible(&self) -> bool;

    /// Consume as much of `body` as the engine is willing to buffer.
    ///
    /// Returns the interruption raised while reading (if any) and the number
    /// of bytes consumed.
    fn read_request_body_from(
        &mut self,
        body: &mut dyn Read,
    ) -> Result<(Option<Interruption>, u64), EngineError>;

    /// Owned view over the request bytes already consumed by the engine.
    fn request_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError>;

    fn process_request_body(&mut self) -> Result<Option<Interruption>, EngineError>;

    fn add_response_header(&mut self, key: &str, value: &str);

    fn process_response_headers(&mut self, status: u16, protocol: &str) -> Option<Interruption>;

    /// Whether the response body should be buffered for inspection.
    fn is_response_body_processable(&self) -> bool;

    fn interruption(&self) -> Option<&Interruption>;

    fn is_interrupted(&self) -> bool {
        self.interruption().is_some()
    }

    /// Append to the engine's response body buffer.
    fn write_response_body(
        &mut self,
        data: &[u8],
    ) -> Result<(Option<Interruption>, usize), EngineError>;

    /// Owned view over the buffered response body.
    fn response_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError>;

    /// Evaluate the buffered response body.
    fn process_response_body(&mut self) -> Result<Option<Interruption>, EngineError>;

    fn process_logging(&mut self);

    fn close(&mut self) -> Result<(), EngineError>;
}
