mod buffer;

pub use buffer::ResponseBuffer;

use http::{HeaderMap, StatusCode};
use std::io;

/// Host-side response sink handed to handlers.
///
/// Headers may be changed until the status line is written. Writing a body
/// chunk before any status commits a `200 OK`.
pub trait ResponseWriter {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line and the current headers.
    fn write_header(&mut self, status: StatusCode);

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts a [`ResponseWriter`] to [`io::Write`] so it can be fed with
/// `io::copy` and friends.
pub struct BodyWriter<'a, W: ?Sized>(pub &'a mut W);

impl<W> io::Write for BodyWriter<'_, W>
where
    W: ResponseWriter + ?Sized,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
