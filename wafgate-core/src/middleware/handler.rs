use crate::ctx::{RequestCtx, ResponseWriter};
use crate::middleware::HandlerError;

/// The next handler in the host's chain.
pub trait Handler: Send + Sync {
    fn serve(&self, req: &mut RequestCtx, w: &mut dyn ResponseWriter) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestCtx, &mut dyn ResponseWriter) -> Result<(), HandlerError> + Send + Sync,
{
    fn serve(&self, req: &mut RequestCtx, w: &mut dyn ResponseWriter) -> Result<(), HandlerError> {
        self(req, w)
    }
}
