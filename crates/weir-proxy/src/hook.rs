//! Hudsucker integration: the response hook the proxy engine drives.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hudsucker::{
    hyper::{Request, Response},
    Body, HttpContext, HttpHandler, RequestOrResponse,
};
use tracing::warn;

use weir_core::ResponseExchange;

use crate::handler::ResponseHandler;

/// Helper to convert bytes to Body
fn bytes_to_body(bytes: Bytes) -> Body {
    Body::from(Full::new(bytes))
}

/// Response hook for a hudsucker MITM proxy.
///
/// Hudsucker clones the hook per client connection and runs a connection's
/// requests in order, so the URL recorded in `handle_request` belongs to the
/// next `handle_response` on the same clone.
///
/// The response is always forwarded to the client unchanged; capture work
/// runs on a blocking task off the proxying path, so a slow disk never
/// stalls the exchange and a client abort cannot cancel a started write.
#[derive(Clone)]
pub struct CaptureHook {
    handler: Arc<ResponseHandler>,
    url: Option<String>,
    host: Option<String>,
}

impl CaptureHook {
    pub fn new(handler: Arc<ResponseHandler>) -> Self {
        Self {
            handler,
            url: None,
            host: None,
        }
    }

    /// Extracts the host from the request URI or Host header.
    fn extract_host(req: &Request<Body>) -> Option<String> {
        if let Some(host) = req.uri().host() {
            return Some(host.to_string());
        }

        req.headers()
            .get(hyper::header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(':').next().unwrap_or(value).to_string())
    }
}

impl HttpHandler for CaptureHook {
    async fn handle_request(
        &mut self,
        _ctx: &HttpContext,
        req: Request<Body>,
    ) -> RequestOrResponse {
        self.url = Some(req.uri().to_string());
        self.host = Self::extract_host(&req);
        RequestOrResponse::Request(req)
    }

    async fn handle_response(&mut self, _ctx: &HttpContext, res: Response<Body>) -> Response<Body> {
        let (parts, body) = res.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(error) => {
                warn!(%error, "failed to read response body");
                return Response::from_parts(parts, Body::empty());
            }
        };

        if let (Some(url), Some(host)) = (self.url.take(), self.host.take()) {
            let exchange = ResponseExchange {
                content_type: header_string(&parts.headers, hyper::header::CONTENT_TYPE),
                content_length: header_string(&parts.headers, hyper::header::CONTENT_LENGTH),
                url,
                host,
                body: bytes.clone(),
            };
            let handler = Arc::clone(&self.handler);
            tokio::task::spawn_blocking(move || handler.handle(&exchange));
        }

        Response::from_parts(parts, bytes_to_body(bytes))
    }
}

fn header_string(headers: &hyper::HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
