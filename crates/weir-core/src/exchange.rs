//! The decoded HTTP exchange consumed from the proxy engine.

use bytes::Bytes;

/// One intercepted HTTP response. Owned by the handling call and never
/// retained past it.
#[derive(Debug, Clone)]
pub struct ResponseExchange {
    /// Full request URL.
    pub url: String,
    /// Request host, without a port.
    pub host: String,
    /// `content-type` response header, if present.
    pub content_type: Option<String>,
    /// Raw `content-length` response header, if present.
    pub content_length: Option<String>,
    /// Decoded response body.
    pub body: Bytes,
}

impl ResponseExchange {
    /// Body length in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Basename of the URL path, query and fragment stripped.
    pub fn basename(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        path.rsplit('/').next().unwrap_or("")
    }
}
