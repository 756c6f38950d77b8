use crate::ctx::request::{Body, RequestVars};
use http::header::{HOST, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use std::fmt::{Debug, Formatter};

/// Request as handed to the middleware by the host.
///
/// Mirrors what an HTTP/1 transport exposes: `Host` and `Transfer-Encoding`
/// live outside of `headers`, and the body is a stream that may not have
/// been read yet.
pub struct RequestCtx {
    pub method: Method,

    /// Request target, including the query string.
    pub uri: Uri,

    pub version: Version,

    /// Request headers, without `Host` and `Transfer-Encoding`.
    pub headers: HeaderMap,

    /// Authority the request was addressed to (Host header or URI authority).
    pub host: Option<String>,

    /// Transfer codings announced by the client, stripped from `headers` by
    /// the transport.
    pub transfer_encoding: Vec<String>,

    /// TCP peer address, usually `ip:port`.
    pub remote_addr: String,

    pub vars: RequestVars,

    /// `None` when the request carries no body.
    pub body: Option<Body>,
}

impl Default for RequestCtx {
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"))
    }
}

impl Debug for RequestCtx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCtx")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("host", &self.host)
            .field("transfer_encoding", &self.transfer_encoding)
            .field("remote_addr", &self.remote_addr)
            .field("vars", &self.vars)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Hydration API
impl RequestCtx {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            host: None,
            transfer_encoding: Vec::new(),
            remote_addr: String::new(),
            vars: RequestVars::new(),
            body: None,
        }
    }

    pub fn from_request(req: Request<Option<Body>>, remote_addr: impl Into<String>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body, remote_addr)
    }

    /// Build a context the way an HTTP/1 transport would present it: `Host`
    /// and `Transfer-Encoding` are promoted out of the header map.
    pub fn from_parts(parts: Parts, body: Option<Body>, remote_addr: impl Into<String>) -> Self {
        let mut headers = parts.headers;

        let host = headers
            .remove(HOST)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()));

        let mut transfer_encoding = Vec::new();
        if let http::header::Entry::Occupied(entry) = headers.entry(TRANSFER_ENCODING) {
            let (_, values) = entry.remove_entry_mult();
            transfer_encoding.extend(
                values
                    .flat_map(|v| {
                        String::from_utf8_lossy(v.as_bytes())
                            .split(',')
                            .map(|coding| coding.trim().to_string())
                            .collect::<Vec<_>>()
                    })
                    .filter(|coding| !coding.is_empty()),
            );
        }

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers,
            host,
            transfer_encoding,
            remote_addr: remote_addr.into(),
            vars: RequestVars::new(),
            body,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }
}

/// Request line API
impl RequestCtx {
    /// Full request target as received, including the query string.
    pub fn uri_string(&self) -> String {
        self.uri.to_string()
    }

    /// Protocol label as it appears on the request line.
    pub fn protocol(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }
}
