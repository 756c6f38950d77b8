pub mod config;
pub mod ctx;
pub mod engine;
pub mod id;
pub mod logging;
pub mod middleware;

pub use config::{ConfigError, WafConfig};
pub use ctx::{Body, BodyStream, RequestCtx, ResponseBuffer, ResponseWriter};
pub use engine::{Interruption, Transaction, Waf, WafBuilder};
pub use middleware::{Handler, HandlerError, WafMiddleware};
