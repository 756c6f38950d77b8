pub mod request;
pub mod response;

pub use request::{Body, BodyStream, RequestCtx, RequestVars};
pub use response::{BodyWriter, ResponseBuffer, ResponseWriter};
