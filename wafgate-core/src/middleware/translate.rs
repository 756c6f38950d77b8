use crate::ctx::request::{SplicedBody, client_address, parse_server_name};
use crate::ctx::RequestCtx;
use crate::engine::{Interruption, Transaction};
use crate::middleware::TranslationError;
use tracing::debug;

/// Replay `req` into `tx` in phase order and return the first interruption.
///
/// Order of operations:
/// 1. Connection (client address, no server address at this layer)
/// 2. Request line
/// 3. Headers, then the out-of-band `Host` and `Transfer-Encoding`
/// 4. Request headers phase (may interrupt before the body is touched)
/// 5. Request body, when the engine wants it and there is one
/// 6. Request body phase (always)
///
/// When the engine consumed (part of) the body, `req.body` is replaced by a
/// stream that yields the consumed bytes first and then the unread rest.
pub fn process_request<T>(
    tx: &mut T,
    req: &mut RequestCtx,
) -> Result<Option<Interruption>, TranslationError>
where
    T: Transaction + ?Sized,
{
    //-------------------------------------------------------------------------
    // Connection + request line
    //-------------------------------------------------------------------------
    let (client_ip, client_port) = client_address(req);
    tx.process_connection(&client_ip, client_port, "", 0);
    tx.process_uri(&req.uri_string(), req.method.as_str(), req.protocol());

    //-------------------------------------------------------------------------
    // Headers
    //-------------------------------------------------------------------------
    for (name, value) in req.headers.iter() {
        tx.add_request_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }

    // Transports promote Host out of the header map, but rules match on it.
    if let Some(host) = req.host.as_deref() {
        tx.add_request_header("Host", host);
        let server_name = parse_server_name(host).unwrap_or_else(|err| {
            debug!(host, error = %err, "Failed to parse server name from host");
            err.fallback
        });
        tx.set_server_name(&server_name);
    }

    // Same for Transfer-Encoding.
    if let Some(coding) = req.transfer_encoding.first() {
        tx.add_request_header("Transfer-Encoding", coding);
    }

    if let Some(it) = tx.process_request_headers() {
        return Ok(Some(it));
    }

    //-------------------------------------------------------------------------
    // Body
    //-------------------------------------------------------------------------
    if tx.is_request_body_accessible() {
        if let Some(mut body) = req.body.take() {
            let (it, _) = match tx.read_request_body_from(&mut body) {
                Ok(read) => read,
                Err(err) => {
                    req.body = Some(body);
                    return Err(TranslationError::ReadBody(err));
                }
            };

            if let Some(it) = it {
                req.body = Some(body);
                return Ok(Some(it));
            }

            let consumed = match tx.request_body_reader() {
                Ok(reader) => reader,
                Err(err) => {
                    req.body = Some(body);
                    return Err(TranslationError::BodyReader(err));
                }
            };

            req.body = Some(Box::new(SplicedBody::new(consumed, body)));
        }
    }

    tx.process_request_body()
        .map_err(TranslationError::ProcessBody)
}
