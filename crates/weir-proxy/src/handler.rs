//! The per-response capture pipeline.
//!
//! One call runs classify, filter, dedup-check, save, short-circuiting at
//! the first terminal transition. Each call works against the config
//! snapshot taken at entry, so a concurrent reload never changes a
//! decision mid-flight.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use weir_core::{
    classify, safe_name, ConfigStore, FilterChain, OutcomeEvent, OutcomeSink, ResponseExchange,
    SaveOutcome, SaveStatus, TracingSink,
};
use weir_storage::DedupTracker;

use crate::writer::AtomicWriter;

/// Orchestrates classification, filtering, dedup, and persistence for every
/// intercepted response. The proxy engine calls [`handle`](Self::handle)
/// concurrently from many tasks with no ordering guarantees; every piece of
/// shared state sits behind its own synchronization.
pub struct ResponseHandler {
    config: Arc<ConfigStore>,
    dedup: Arc<DedupTracker>,
    sink: Arc<dyn OutcomeSink>,
}

impl ResponseHandler {
    pub fn new(config: Arc<ConfigStore>, dedup: Arc<DedupTracker>) -> Self {
        Self {
            config,
            dedup,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the outcome sink.
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs the full pipeline for one exchange and reports the outcome.
    ///
    /// Never panics or propagates an error to the caller: every failure is
    /// a terminal outcome, so one bad exchange cannot disrupt the next.
    pub fn handle(&self, exchange: &ResponseExchange) -> SaveOutcome {
        let config = self.config.current();

        let (mime_type, ext) =
            classify(&exchange.body, exchange.content_type.as_deref(), &exchange.url);
        let file_name = safe_name(exchange.basename(), &ext, &exchange.url);
        debug!(
            name = %file_name,
            mime = %mime_type,
            bytes = exchange.body_len(),
            host = %exchange.host,
            "received response"
        );

        let verdict = FilterChain::evaluate(exchange, &mime_type, &config);
        if !verdict.allow {
            return self.finish(SaveOutcome::skipped(verdict.reason), &file_name);
        }

        match self.dedup.is_duplicate(&exchange.body) {
            Ok(true) => {
                return self.finish(SaveOutcome::skipped("duplicate content"), &file_name)
            }
            Ok(false) => {}
            // A broken dedup store may cost us duplicate suppression, never a save.
            Err(error) => warn!(%error, "dedup check failed, treating as new content"),
        }

        let outcome = AtomicWriter::new(&config.save_dir).save(&exchange.body, Path::new(&file_name));
        self.finish(outcome, &file_name)
    }

    /// Emits the structured event for a terminal state.
    fn finish(&self, outcome: SaveOutcome, file_name: &str) -> SaveOutcome {
        let line = match (&outcome.status, &outcome.path) {
            (SaveStatus::Saved, Some(path)) => {
                format!("Saved {file_name} -> {} ({})", path.display(), outcome.reason)
            }
            (SaveStatus::Error, _) => format!("Error {file_name}: {}", outcome.reason),
            _ => format!("Skipped {file_name}: {}", outcome.reason),
        };
        self.sink.emit(&OutcomeEvent::single(outcome.severity, line));
        outcome
    }
}
