use std::io::{self, Cursor, Empty, Read, Write};

/// A request body as seen by the middleware and the downstream handler.
pub type Body = Box<dyn BodyStream>;

/// A readable request body with an optional direct-copy path.
///
/// Transports that can push their remaining bytes straight into a sink
/// (without going through an intermediate `read` buffer) advertise it through
/// [`BodyStream::supports_write_to`]. Chunked HTTP/1 bodies rely on this to
/// keep their framing intact when copied.
pub trait BodyStream: Read + Send {
    fn supports_write_to(&self) -> bool {
        false
    }

    /// Copy the remaining bytes into `sink`.
    fn write_to(&mut self, sink: &mut dyn Write) -> io::Result<u64> {
        io::copy(self, sink)
    }
}

impl<T> BodyStream for Cursor<T>
where
    T: AsRef<[u8]> + Send,
{
    fn supports_write_to(&self) -> bool {
        true
    }

    fn write_to(&mut self, sink: &mut dyn Write) -> io::Result<u64> {
        let start = usize::try_from(self.position())
            .unwrap_or(usize::MAX)
            .min(self.get_ref().as_ref().len());
        let remaining = &self.get_ref().as_ref()[start..];
        sink.write_all(remaining)?;
        let written = remaining.len() as u64;
        self.set_position(self.position() + written);
        Ok(written)
    }
}

impl BodyStream for Empty {}

impl BodyStream for Box<dyn BodyStream> {
    fn supports_write_to(&self) -> bool {
        (**self).supports_write_to()
    }

    fn write_to(&mut self, sink: &mut dyn Write) -> io::Result<u64> {
        (**self).write_to(sink)
    }
}

/// Copy a body into `sink`, using the direct-copy path when the body has one.
pub fn copy_body(body: &mut dyn BodyStream, sink: &mut dyn Write) -> io::Result<u64> {
    if body.supports_write_to() {
        body.write_to(sink)
    } else {
        io::copy(body, sink)
    }
}

/// A body made of the bytes the engine already consumed, followed by
/// whatever the transport has not delivered yet.
///
/// The direct-copy capability is the tail's: the head is always an in-memory
/// reader owned by the engine.
pub struct SplicedBody {
    head: Box<dyn Read + Send>,
    tail: Body,
    head_done: bool,
}

impl SplicedBody {
    pub fn new(head: Box<dyn Read + Send>, tail: Body) -> Self {
        Self {
            head,
            tail,
            head_done: false,
        }
    }
}

impl Read for SplicedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.head_done {
            match self.head.read(buf)? {
                0 => self.head_done = true,
                n => return Ok(n),
            }
        }

        self.tail.read(buf)
    }
}

impl BodyStream for SplicedBody {
    fn supports_write_to(&self) -> bool {
        self.tail.supports_write_to()
    }

    fn write_to(&mut self, sink: &mut dyn Write) -> io::Result<u64> {
        let mut written = 0;
        if !self.head_done {
            written += io::copy(&mut self.head, sink)?;
            self.head_done = true;
        }

        written += copy_body(&mut self.tail, sink)?;
        Ok(written)
    }
}
