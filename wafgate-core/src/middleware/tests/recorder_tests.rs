use crate::ctx::{ResponseBuffer, ResponseWriter};
use crate::engine::Transaction;
use crate::middleware::tests::test_helpers::*;
use crate::middleware::{RecorderWriteError, StreamRecorder};
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use pretty_assertions::assert_eq;
use std::io::Read;

fn buffering() -> Script {
    Script {
        response_body_processable: true,
        ..Script::default()
    }
}

#[test]
fn nothing_is_decided_before_the_status() {
    let waf = ScriptedWaf::new(buffering());
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    let rec = StreamRecorder::new(&mut out, &mut tx);

    assert!(!rec.header_written());
    assert!(!rec.buffered());
    assert!(!rec.streaming());
}

//-----------------------------------------------------------------------------
// Streaming
//-----------------------------------------------------------------------------
#[test]
fn streaming_writes_status_once_and_passes_bytes_through() {
    let waf = ScriptedWaf::default();
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write_header(StatusCode::CREATED);
        rec.write_header(StatusCode::NOT_FOUND);
        assert_eq!(rec.write(b"hello ").unwrap(), 6);
        assert_eq!(rec.write(b"world").unwrap(), 5);

        assert!(rec.streaming());
        assert!(!rec.buffered());
        assert_eq!(rec.status(), Some(StatusCode::CREATED));
        assert!(rec.reader().unwrap().is_none());
    }

    assert_eq!(out.status(), Some(StatusCode::CREATED));
    assert_eq!(out.status_writes(), 1);
    assert_eq!(out.body(), b"hello world");
    assert_eq!(waf.recorded().response_header_calls, 1);
    assert!(waf.recorded().response_body.is_empty());
}

#[test]
fn first_write_implies_ok() {
    let waf = ScriptedWaf::default();
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write(b"body").unwrap();
        assert!(rec.header_written());
    }

    assert_eq!(out.status(), Some(StatusCode::OK));
    assert_eq!(waf.recorded().response_status, Some(200));
}

#[test]
fn response_headers_are_fed_to_the_engine() {
    let waf = ScriptedWaf::default();
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        rec.write_header(StatusCode::OK);
    }

    assert_eq!(
        waf.recorded().response_headers,
        vec![("content-type".to_string(), "text/html".to_string())]
    );
}

#[test]
fn streaming_flush_reaches_the_client() {
    let waf = ScriptedWaf::default();
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.flush().unwrap();
        rec.write(b"chunk").unwrap();
        rec.flush().unwrap();
    }

    // The flush before the status line is not forwarded.
    assert_eq!(out.flushes(), 1);
}

#[test]
fn header_interruption_withholds_status_while_streaming() {
    let waf = ScriptedWaf::new(Script {
        block_response_headers: Some(deny(300, 403)),
        ..Script::default()
    });
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write_header(StatusCode::OK);
        assert_eq!(rec.write(b"leak").unwrap(), 0);
        rec.flush().unwrap();
        assert!(rec.streaming());
    }

    assert_eq!(out.status(), None);
    assert!(out.body().is_empty());
    assert_eq!(out.flushes(), 0);
    assert!(tx.is_interrupted());
}

//-----------------------------------------------------------------------------
// Buffering
//-----------------------------------------------------------------------------
#[test]
fn buffering_holds_status_and_body() {
    let waf = ScriptedWaf::new(buffering());
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write_header(StatusCode::ACCEPTED);
        assert_eq!(rec.write(b"held").unwrap(), 4);
        rec.flush().unwrap();

        assert!(rec.buffered());
        assert_eq!(rec.status(), Some(StatusCode::ACCEPTED));

        let mut held = String::new();
        rec.reader()
            .unwrap()
            .unwrap()
            .read_to_string(&mut held)
            .unwrap();
        assert_eq!(held, "held");
    }

    assert_eq!(out.status(), None);
    assert!(out.body().is_empty());
    assert_eq!(out.flushes(), 0);
    assert_eq!(waf.recorded().response_body_writes, 1);
}

#[test]
fn buffered_write_that_trips_a_limit_is_absorbed() {
    let waf = ScriptedWaf::new(Script {
        response_body_limit: Some(8),
        ..buffering()
    });
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        assert_eq!(rec.write(b"12345").unwrap(), 5);
        assert_eq!(rec.write(b"67890").unwrap(), 0);
        // Interrupted: later writes never reach the engine.
        assert_eq!(rec.write(b"more").unwrap(), 0);
    }

    assert!(tx.is_interrupted());
    assert_eq!(waf.recorded().response_body_writes, 2);
    assert!(out.body().is_empty());
}

#[test]
fn buffered_write_failure_is_an_io_error() {
    let waf = ScriptedWaf::new(Script {
        fail_response_body_write: true,
        ..buffering()
    });
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    let err = {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write(b"data").unwrap_err()
    };

    assert_eq!(err.kind(), std::io::ErrorKind::Other);
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<RecorderWriteError>());
    assert!(inner.is_some());
}

#[test]
fn header_interruption_while_buffering_swallows_writes() {
    let waf = ScriptedWaf::new(Script {
        block_response_headers: Some(deny(301, 403)),
        ..buffering()
    });
    let mut tx = waf.transaction();
    let mut out = ResponseBuffer::new();

    {
        let mut rec = StreamRecorder::new(&mut out, &mut tx);
        rec.write_header(StatusCode::OK);
        assert_eq!(rec.write(b"blocked").unwrap(), 0);
    }

    assert_eq!(out.status(), None);
    assert_eq!(waf.recorded().response_body_writes, 0);
}
