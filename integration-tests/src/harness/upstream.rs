//! Downstream handlers standing in for the application behind the WAF.

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use std::io::Read;
use wafgate_core::{Handler, HandlerError, RequestCtx, ResponseWriter};

/// Answer with `status`, `content_type` and `body`, written in pieces of at
/// most `chunk` bytes.
pub fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Vec<u8>>,
    chunk: usize,
) -> impl Handler {
    let body = body.into();
    move |_req: &mut RequestCtx, w: &mut dyn ResponseWriter| -> Result<(), HandlerError> {
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        w.write_header(status);
        for piece in body.chunks(chunk.max(1)) {
            let mut written = 0;
            while written < piece.len() {
                match w.write(&piece[written..])? {
                    // Swallowed by the middleware after an interruption.
                    0 => return Ok(()),
                    n => written += n,
                }
            }
        }
        Ok(())
    }
}

/// `200 OK` with a plain text body.
pub fn text(body: &'static str) -> impl Handler {
    respond(StatusCode::OK, "text/plain", body, usize::MAX)
}

/// Echo the request body back as `application/octet-stream`.
pub fn echo() -> impl Handler {
    |req: &mut RequestCtx, w: &mut dyn ResponseWriter| -> Result<(), HandlerError> {
        let mut body = Vec::new();
        if let Some(b) = req.body.as_mut() {
            b.read_to_end(&mut body)?;
        }
        w.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        w.write_header(StatusCode::OK);
        w.write(&body)?;
        Ok(())
    }
}

/// Fails the way a broken upstream would.
pub fn bad_gateway() -> impl Handler {
    |_req: &mut RequestCtx, _w: &mut dyn ResponseWriter| -> Result<(), HandlerError> {
        Err(HandlerError::downstream(
            StatusCode::BAD_GATEWAY,
            "upstream connection refused",
        ))
    }
}
