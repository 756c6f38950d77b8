use crate::ctx::request::{Body, BodyStream, SplicedBody, copy_body};
use pretty_assertions::assert_eq;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};

//-----------------------------------------------------------------------------
// Test helpers
//-----------------------------------------------------------------------------
struct ReadOnly(Cursor<Vec<u8>>);

impl Read for ReadOnly {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl BodyStream for ReadOnly {}

struct CountingDirectCopy {
    inner: Cursor<Vec<u8>>,
    direct_copies: Arc<Mutex<usize>>,
}

impl Read for CountingDirectCopy {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BodyStream for CountingDirectCopy {
    fn supports_write_to(&self) -> bool {
        true
    }

    fn write_to(&mut self, sink: &mut dyn io::Write) -> io::Result<u64> {
        *self.direct_copies.lock().unwrap() += 1;
        io::copy(&mut self.inner, sink)
    }
}

fn head(data: &str) -> Box<dyn Read + Send> {
    Box::new(Cursor::new(data.as_bytes().to_vec()))
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------
#[test]
fn spliced_body_reads_head_then_tail() {
    let tail: Body = Box::new(ReadOnly(Cursor::new(b" world".to_vec())));
    let mut body = SplicedBody::new(head("hello"), tail);

    let mut out = String::new();
    body.read_to_string(&mut out).unwrap();

    assert_eq!(out, "hello world");
}

#[test]
fn spliced_body_with_empty_head_is_the_tail() {
    let tail: Body = Box::new(ReadOnly(Cursor::new(b"rest".to_vec())));
    let mut body = SplicedBody::new(head(""), tail);

    let mut out = String::new();
    body.read_to_string(&mut out).unwrap();

    assert_eq!(out, "rest");
}

#[test]
fn spliced_body_preserves_order_with_tiny_reads() {
    let tail: Body = Box::new(ReadOnly(Cursor::new(b"defgh".to_vec())));
    let mut body = SplicedBody::new(head("abc"), tail);

    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    while body.read(&mut byte).unwrap() == 1 {
        out.push(byte[0]);
    }

    assert_eq!(out, b"abcdefgh");
}

#[test]
fn spliced_body_forwards_direct_copy_of_tail() {
    let direct_copies = Arc::new(Mutex::new(0));
    let tail: Body = Box::new(CountingDirectCopy {
        inner: Cursor::new(b"-tail".to_vec()),
        direct_copies: Arc::clone(&direct_copies),
    });
    let mut body = SplicedBody::new(head("head"), tail);
    assert!(body.supports_write_to());

    let mut sink = Vec::new();
    let written = copy_body(&mut body, &mut sink).unwrap();

    assert_eq!(sink, b"head-tail");
    assert_eq!(written, 9);
    assert_eq!(*direct_copies.lock().unwrap(), 1);
}

#[test]
fn spliced_body_without_direct_copy_tail_does_not_advertise_it() {
    let tail: Body = Box::new(ReadOnly(Cursor::new(b"x".to_vec())));
    let body = SplicedBody::new(head("y"), tail);

    assert!(!body.supports_write_to());
}

#[test]
fn cursor_direct_copy_honors_position() {
    let mut cursor = Cursor::new(b"0123456789".to_vec());
    let mut skip = [0u8; 4];
    cursor.read_exact(&mut skip).unwrap();

    let mut sink = Vec::new();
    let written = cursor.write_to(&mut sink).unwrap();

    assert_eq!(sink, b"456789");
    assert_eq!(written, 6);
    assert_eq!(cursor.position(), 10);
}

#[test]
fn copy_body_falls_back_to_read() {
    let mut body = ReadOnly(Cursor::new(b"plain".to_vec()));
    let mut sink = Vec::new();

    copy_body(&mut body, &mut sink).unwrap();

    assert_eq!(sink, b"plain");
}
