//! The ordered filter chain.
//!
//! Predicates run cheapest first and the chain stops at the first deny, so
//! image decoding never runs on bodies already rejected by size, MIME, or
//! domain.

use std::io::Cursor;

use image::ImageReader;
use tracing::{debug, warn};

use crate::config::Config;
use crate::exchange::ResponseExchange;
use crate::mime;

/// Allow/deny decision with a display-ready reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    pub allow: bool,
    pub reason: String,
}

impl FilterVerdict {
    fn allow() -> Self {
        Self {
            allow: true,
            reason: "allowed".to_string(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// Evaluates the fixed predicate order against one exchange.
pub struct FilterChain;

impl FilterChain {
    /// Runs the chain against one exchange and the given policy snapshot.
    /// The first deny wins.
    pub fn evaluate(exchange: &ResponseExchange, mime_type: &str, config: &Config) -> FilterVerdict {
        if let Some(reason) = Self::length_mismatch(exchange)
            .or_else(|| Self::size_out_of_bounds(exchange, config))
            .or_else(|| Self::mime_not_allowed(mime_type, config))
            .or_else(|| Self::blocked_by_whitelist(exchange, config))
            .or_else(|| Self::blacklisted(exchange, config))
            .or_else(|| Self::image_out_of_bounds(exchange, mime_type, config))
        {
            return FilterVerdict::deny(reason);
        }
        FilterVerdict::allow()
    }

    /// A declared content-length must match the actual body length; an
    /// unparsable header is warned and passed.
    fn length_mismatch(exchange: &ResponseExchange) -> Option<String> {
        let raw = exchange.content_length.as_deref()?;
        match raw.trim().parse::<u64>() {
            Ok(expected) if expected != exchange.body_len() as u64 => Some(format!(
                "length mismatch: header declared {expected} B, body is {} B",
                exchange.body_len()
            )),
            Ok(_) => None,
            Err(_) => {
                warn!(header = %raw, url = %exchange.url, "invalid content-length header");
                None
            }
        }
    }

    fn size_out_of_bounds(exchange: &ResponseExchange, config: &Config) -> Option<String> {
        let filter = &config.filter_file_size;
        if !filter.enabled {
            return None;
        }
        let size = exchange.body_len() as u64;
        if size < filter.min_bytes || size > filter.max_bytes {
            return Some(format!(
                "size {size} B not between [{}, {}] bytes",
                filter.min_bytes, filter.max_bytes
            ));
        }
        None
    }

    fn mime_not_allowed(mime_type: &str, config: &Config) -> Option<String> {
        let allowed = config
            .allowed_mime_groups
            .iter()
            .any(|group| mime::group_contains(group, mime_type));
        if allowed {
            None
        } else {
            Some(format!("MIME type {mime_type} not allowed"))
        }
    }

    /// An empty whitelist allows all domains.
    fn blocked_by_whitelist(exchange: &ResponseExchange, config: &Config) -> Option<String> {
        if config.whitelist.is_empty() {
            return None;
        }
        if config.whitelist.iter().any(|p| p.matches(&exchange.host)) {
            None
        } else {
            Some(format!("domain {} not in whitelist", exchange.host))
        }
    }

    fn blacklisted(exchange: &ResponseExchange, config: &Config) -> Option<String> {
        config
            .blacklist
            .iter()
            .find(|p| p.matches(&exchange.host))
            .map(|p| format!("domain {} matches blacklist pattern {}", exchange.host, p.as_str()))
    }

    /// Header-only dimension check for image payloads. A body that claims to
    /// be an image but cannot be decoded denies.
    fn image_out_of_bounds(
        exchange: &ResponseExchange,
        mime_type: &str,
        config: &Config,
    ) -> Option<String> {
        let filter = &config.filter_pixel_dimensions;
        if !filter.enabled || !mime::is_image_mime(mime_type) {
            return None;
        }
        let Some((width, height)) = read_dimensions(&exchange.body) else {
            return Some("unreadable image".to_string());
        };
        if width < filter.min_width
            || width > filter.max_width
            || height < filter.min_height
            || height > filter.max_height
        {
            return Some(format!("image {width}x{height} not in allowed ranges"));
        }
        debug!(width, height, "image dimensions within bounds");
        None
    }
}

/// Reads image dimensions from the header without a full raster decode.
fn read_dimensions(body: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(body))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
