mod errors;
mod guard;
mod handler;
mod recorder;
#[cfg(test)]
mod tests;
mod translate;

pub use errors::*;
pub use guard::TransactionGuard;
pub use handler::Handler;
pub use recorder::{RESPONSE_PROTOCOL, StreamRecorder};
pub use translate::process_request;

use crate::config::{ConfigError, WafConfig};
use crate::ctx::request::TRANSACTION_ID_VAR;
use crate::ctx::{BodyWriter, RequestCtx, ResponseWriter};
use crate::engine::log::{debug_logger, error_callback};
use crate::engine::{Interruption, Transaction, Waf, WafBuilder};
use crate::id::transaction_id;
use http::StatusCode;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Middleware that runs every request and response through a rule engine.
///
/// The engine is built once and shared; each request gets its own
/// transaction, closed when the request is done.
pub struct WafMiddleware<W: Waf> {
    waf: Arc<W>,
    tag: Option<String>,
}

impl<W: Waf> Clone for WafMiddleware<W> {
    fn clone(&self) -> Self {
        Self {
            waf: Arc::clone(&self.waf),
            tag: self.tag.clone(),
        }
    }
}

/// Setup API
impl<W: Waf> WafMiddleware<W> {
    /// Validate `config` and compile its rules with `builder`.
    ///
    /// Inline directives are compiled first, then every include entry in
    /// order.
    pub fn provision<B>(config: &WafConfig, mut builder: B) -> Result<Self, ConfigError>
    where
        B: WafBuilder<Waf = W>,
    {
        config.validate()?;

        builder.with_error_callback(error_callback(config.tag.clone()));
        builder.with_debug_logger(debug_logger(
            config.debug_level.unwrap_or_default(),
            config.tag.as_deref(),
        ));

        if !config.directives.trim().is_empty() {
            builder
                .with_directives(&config.directives)
                .map_err(|source| ConfigError::Directives { source })?;
        }

        debug!(
            count = config.include.len(),
            files = ?config.include,
            "Preparing to include files"
        );
        for path in &config.include {
            builder
                .with_directives_from_path(path)
                .map_err(|source| ConfigError::Include {
                    path: path.clone(),
                    source,
                })?;
        }

        let waf = builder
            .build()
            .map_err(|source| ConfigError::Directives { source })?;

        Ok(Self::from_waf(waf, config.tag.clone()))
    }

    pub fn from_waf(waf: W, tag: Option<String>) -> Self {
        Self {
            waf: Arc::new(waf),
            tag,
        }
    }

    pub fn waf(&self) -> &W {
        &self.waf
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Request API
impl<W: Waf> WafMiddleware<W> {
    /// Inspect `req`, call `next` unless the engine blocks, and release the
    /// response once the engine is done with it.
    ///
    /// An interruption detected at any point wins over whatever `next`
    /// returned.
    pub fn handle(
        &self,
        req: &mut RequestCtx,
        w: &mut dyn ResponseWriter,
        next: &dyn Handler,
    ) -> Result<(), HandlerError> {
        let id = transaction_id();
        let span = info_span!("waf", transaction_id = %id, tag = self.tag().unwrap_or_default());
        let _entered = span.enter();

        let mut tx = TransactionGuard::new(self.waf.new_transaction(&id));
        req.vars.set(TRANSACTION_ID_VAR, id.as_str());

        //---------------------------------------------------------------------
        // Request phases
        //---------------------------------------------------------------------
        match process_request(&mut *tx, req) {
            Ok(None) => {}
            Ok(Some(it)) => return Err(interrupted(&id, it)),
            Err(source) => {
                return Err(HandlerError::Translation {
                    transaction_id: id,
                    source,
                });
            }
        }

        //---------------------------------------------------------------------
        // Downstream
        //---------------------------------------------------------------------
        let (result, buffered, status) = {
            let mut rec = StreamRecorder::new(w, &mut *tx);
            let result = next.serve(req, &mut rec);
            if result.is_ok() && !rec.header_written() {
                // A handler that wrote nothing still answers 200 OK.
                rec.write_header(StatusCode::OK);
            }
            (result, rec.buffered(), rec.status())
        };

        // Blocked during response headers or body.
        if let Some(it) = tx.interruption().cloned() {
            return Err(interrupted(&id, it));
        }
        result?;

        if !buffered {
            // Already sent to the client.
            return Ok(());
        }

        //---------------------------------------------------------------------
        // Buffered response
        //---------------------------------------------------------------------
        match tx.process_response_body() {
            Ok(None) => {}
            Ok(Some(it)) => return Err(interrupted(&id, it)),
            Err(source) => {
                return Err(HandlerError::ResponseBody {
                    transaction_id: id,
                    source,
                });
            }
        }

        if let Some(status) = status {
            w.write_header(status);
        }

        let mut reader = tx
            .response_body_reader()
            .map_err(|source| HandlerError::ResponseBody {
                transaction_id: id.clone(),
                source,
            })?;
        io::copy(&mut reader, &mut BodyWriter(w))?;

        Ok(())
    }
}

fn interrupted(transaction_id: &str, interruption: Interruption) -> HandlerError {
    info!(
        rule_id = interruption.rule_id,
        action = %interruption.action,
        status = interruption.status_code().as_u16(),
        "Transaction interrupted"
    );

    HandlerError::Interrupted {
        transaction_id: transaction_id.to_string(),
        interruption,
    }
}
