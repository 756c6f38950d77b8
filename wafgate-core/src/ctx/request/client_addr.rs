use crate::ctx::request::{CLIENT_IP_VAR, RequestCtx};
use thiserror::Error;

/// The host part of an authority could not be separated from its port.
///
/// `fallback` is the value to use as server name anyway (the authority,
/// verbatim).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse server name from authority {fallback:?}: {reason}")]
pub struct ServerNameError {
    pub fallback: String,
    pub reason: &'static str,
}

/// Split `host:port`, `[ipv6]:port` into its parts.
pub(crate) fn split_host_port(addr: &str) -> Result<(&str, &str), &'static str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")?;
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or("missing port in address")?;
        return Ok((&rest[..end], port));
    }

    let idx = addr.rfind(':').ok_or("missing port in address")?;
    let host = &addr[..idx];
    if host.contains(':') {
        return Err("too many colons in address");
    }

    Ok((host, &addr[idx + 1..]))
}

/// `[::1]` -> `::1`; anything else is returned as is.
fn unbracket(addr: &str) -> &str {
    addr.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(addr)
}

fn parse_port(port: &str) -> u16 {
    port.parse().unwrap_or(0)
}

/// Resolve the client IP and port the engine should see.
///
/// A trusted address computed by the host wins over the TCP peer address.
/// This never fails: anything that does not carry a usable port gets port 0.
pub fn client_address(req: &RequestCtx) -> (String, u16) {
    if let Some(address) = req.vars.get(CLIENT_IP_VAR).filter(|a| !a.is_empty()) {
        return match split_host_port(address) {
            Ok((ip, port)) if !ip.is_empty() => (ip.to_string(), parse_port(port)),
            _ => (unbracket(address).to_string(), 0),
        };
    }

    match split_host_port(&req.remote_addr) {
        Ok((ip, port)) => (ip.to_string(), parse_port(port)),
        Err(_) => (unbracket(&req.remote_addr).to_string(), 0),
    }
}

/// Virtual host name for `host`, with any `:port` suffix removed.
pub fn parse_server_name(host: &str) -> Result<String, ServerNameError> {
    split_host_port(host)
        .map(|(name, _)| name.to_string())
        .map_err(|reason| ServerNameError {
            fallback: host.to_string(),
            reason,
        })
}
