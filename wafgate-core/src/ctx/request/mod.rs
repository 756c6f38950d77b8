mod body;
mod client_addr;
mod request_ctx;
#[cfg(test)]
mod tests;
mod vars;

pub use body::*;
pub use client_addr::*;
pub use request_ctx::*;
pub use vars::*;
