use crate::ctx::ResponseWriter;
use crate::engine::{EngineError, Transaction};
use crate::middleware::RecorderWriteError;
use http::{HeaderMap, StatusCode};
use std::io::{self, Read};

/// Protocol label reported to the engine for response headers.
pub const RESPONSE_PROTOCOL: &str = "HTTP/1.1";

/// Wraps the host's writer so that the response goes through the engine.
///
/// The first `write_header` (or the first `write`, which implies `200 OK`)
/// hands the response headers to the engine and decides, once, what happens
/// to the body:
/// - the engine does not want it: bytes are streamed to the client as they
///   come, and the status line is written right away unless the transaction
///   is already interrupted (so the host can still send an error page);
/// - the engine wants it: bytes are buffered in the transaction and the
///   caller flushes them once the handler is done (see [`Self::buffered`]).
///
/// After an interruption every write is swallowed.
pub struct StreamRecorder<'a, T: Transaction + ?Sized> {
    inner: &'a mut dyn ResponseWriter,
    tx: &'a mut T,
    status: Option<StatusCode>,
    header_written: bool,
    streaming: bool,
}

impl<'a, T> StreamRecorder<'a, T>
where
    T: Transaction + ?Sized,
{
    pub fn new(inner: &'a mut dyn ResponseWriter, tx: &'a mut T) -> Self {
        Self {
            inner,
            tx,
            status: None,
            header_written: false,
            streaming: false,
        }
    }

    /// Status requested by the handler, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    /// True when the body sits in the transaction and still has to be sent.
    /// False before the status is decided or once the body went to the client.
    pub fn buffered(&self) -> bool {
        self.header_written && !self.streaming
    }

    /// Buffered response body, `None` when streaming.
    pub fn reader(&mut self) -> Result<Option<Box<dyn Read + Send>>, EngineError> {
        if self.streaming {
            return Ok(None);
        }
        self.tx.response_body_reader().map(Some)
    }
}

impl<T> ResponseWriter for StreamRecorder<'_, T>
where
    T: Transaction + ?Sized,
{
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.header_written {
            return;
        }
        self.status = Some(status);
        self.header_written = true;

        for (name, value) in self.inner.headers().iter() {
            self.tx
                .add_response_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
        let interrupted = self
            .tx
            .process_response_headers(status.as_u16(), RESPONSE_PROTOCOL)
            .is_some()
            || self.tx.is_interrupted();

        self.streaming = !self.tx.is_response_body_processable();

        // An interrupted transaction keeps the status line back so the host
        // can still answer with an error page.
        if self.streaming && !interrupted {
            self.inner.write_header(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_header(StatusCode::OK);

        if self.tx.is_interrupted() {
            return Ok(0);
        }

        if self.streaming {
            return self.inner.write(buf);
        }

        match self.tx.write_response_body(buf) {
            Ok((Some(_), _)) => Ok(0),
            Ok((None, n)) => Ok(n),
            Err(source) => Err(io::Error::other(RecorderWriteError { source })),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Flushing before the buffered body is released would commit the
        // status line early.
        if self.streaming && self.header_written && !self.tx.is_interrupted() {
            return self.inner.flush();
        }
        Ok(())
    }
}
