pub mod engine;
pub mod host;
pub mod tracing;
pub mod upstream;

pub use engine::{RuleEngine, RuleEngineBuilder};
pub use host::TestHost;
pub use self::tracing::{CapturedEvent, EventLog, capture_events};
