//! Incoming response representation.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

/// A complete HTTP/1.1 response.
///
/// The body is fully drained before the response is delivered: a
/// partially-read body would desynchronize the byte stream for the next
/// pipelined response, so the engine never hands out streaming bodies.
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response, keeping only the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}
