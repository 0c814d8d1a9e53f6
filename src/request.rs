//! Outgoing request representation.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, UPGRADE};
use http::Method;

use crate::codec::options::ConnectionOptions;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body at all; no framing headers are emitted.
    #[default]
    Empty,
    /// A complete in-memory body, sent with `Content-Length` unless the
    /// caller asked for chunked transfer-coding.
    Full(Bytes),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Full(bytes) => bytes.is_empty(),
        }
    }
}

/// An outgoing HTTP/1.1 request.
///
/// The target is the request-target as written on the wire (origin form,
/// e.g. `/api/data?x=1`). The destination host is carried separately by
/// the engine and synthesized into a `Host` header if absent.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Shorthand for a bodyless GET.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach a complete body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Full(body.into());
        self
    }

    /// Whether this request must run on its own connection instead of a
    /// shared pipelined one: non-safe methods must not be pipelined, and
    /// `Connection: close` / `Upgrade` both preclude reuse.
    pub fn requires_dedicated_connection(&self) -> bool {
        let safe_method = self.method == Method::GET || self.method == Method::HEAD;
        if !safe_method {
            return true;
        }

        let options = ConnectionOptions::parse(&self.headers);
        options.close || options.upgrade || self.headers.contains_key(UPGRADE)
    }
}
