mod error;
mod waf_config;

pub use error::ConfigError;
pub use waf_config::WafConfig;
