use crate::ctx::response::ResponseWriter;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use std::io;

/// In-memory [`ResponseWriter`].
///
/// Follows the usual writer rules: the first status wins, a body write
/// without a status commits `200 OK`, and headers are snapshotted when the
/// status is committed.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    headers: HeaderMap,
    committed_headers: Option<HeaderMap>,
    status: Option<StatusCode>,
    status_writes: usize,
    body: BytesMut,
    flushes: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// How many times a status line was requested. Anything above one means a
    /// handler tried to write the status twice.
    pub fn status_writes(&self) -> usize {
        self.status_writes
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Headers as they were when the status line was committed.
    pub fn committed_headers(&self) -> Option<&HeaderMap> {
        self.committed_headers.as_ref()
    }

    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.committed_headers.unwrap_or(self.headers);
        response
    }
}

impl ResponseWriter for ResponseBuffer {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status_writes += 1;
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        self.committed_headers = Some(self.headers.clone());
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
