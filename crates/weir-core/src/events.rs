//! Outcome reporting for the capture pipeline.
//!
//! Every handled response ends in exactly one terminal state and emits one
//! structured event through the [`OutcomeSink`]. The pipeline does not know
//! or care how sinks display events; the default sink forwards to `tracing`.

use std::path::PathBuf;

use serde::Serialize;

/// Severity of an outcome event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    /// String form used in logs and serialized events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Display color used by log viewers.
    pub fn color_hint(&self) -> &'static str {
        match self {
            Severity::Debug => "grey",
            Severity::Info => "black",
            Severity::Warn => "orange",
            Severity::Error | Severity::Critical => "red",
        }
    }
}

/// A structured event emitted once per terminal pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEvent {
    pub severity: Severity,
    pub color_hint: &'static str,
    pub lines: Vec<String>,
}

impl OutcomeEvent {
    /// Creates an event; the color hint follows the severity.
    pub fn new(severity: Severity, lines: Vec<String>) -> Self {
        Self {
            severity,
            color_hint: severity.color_hint(),
            lines,
        }
    }

    /// Creates a single-line event.
    pub fn single(severity: Severity, line: impl Into<String>) -> Self {
        Self::new(severity, vec![line.into()])
    }
}

/// Receives outcome events from the pipeline.
pub trait OutcomeSink: Send + Sync {
    fn emit(&self, event: &OutcomeEvent);
}

/// Default sink forwarding events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn emit(&self, event: &OutcomeEvent) {
        for line in &event.lines {
            match event.severity {
                Severity::Debug => tracing::debug!(target: "weir::outcome", "{line}"),
                Severity::Info => tracing::info!(target: "weir::outcome", "{line}"),
                Severity::Warn => tracing::warn!(target: "weir::outcome", "{line}"),
                Severity::Error => tracing::error!(target: "weir::outcome", "{line}"),
                Severity::Critical => {
                    tracing::error!(target: "weir::outcome", critical = true, "{line}")
                }
            }
        }
    }
}

/// Terminal status of a handled response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    Skipped,
    Error,
}

/// Result of handling one response, suitable for direct display.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub status: SaveStatus,
    /// Final path of the written file, for saved outcomes.
    pub path: Option<PathBuf>,
    pub reason: String,
    pub severity: Severity,
}

impl SaveOutcome {
    /// The body was persisted at `path`.
    pub fn saved(path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            status: SaveStatus::Saved,
            path: Some(path),
            reason: reason.into(),
            severity: Severity::Info,
        }
    }

    /// The body was filtered out or deduplicated.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: SaveStatus::Skipped,
            path: None,
            reason: reason.into(),
            severity: Severity::Info,
        }
    }

    /// The save failed.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: SaveStatus::Error,
            path: None,
            reason: reason.into(),
            severity: Severity::Error,
        }
    }

    /// The save was refused for security reasons.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            status: SaveStatus::Error,
            path: None,
            reason: reason.into(),
            severity: Severity::Critical,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.status == SaveStatus::Saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_hints_follow_severity() {
        assert_eq!(Severity::Debug.color_hint(), "grey");
        assert_eq!(Severity::Warn.color_hint(), "orange");
        assert_eq!(Severity::Critical.color_hint(), "red");

        let event = OutcomeEvent::single(Severity::Warn, "size out of bounds");
        assert_eq!(event.color_hint, "orange");
        assert_eq!(event.lines.len(), 1);
    }

    #[test]
    fn refused_outcome_is_critical_error() {
        let outcome = SaveOutcome::refused("path traversal attempt blocked");
        assert_eq!(outcome.status, SaveStatus::Error);
        assert_eq!(outcome.severity, Severity::Critical);
        assert!(outcome.path.is_none());
    }

    #[test]
    fn saved_outcome_carries_path() {
        let outcome = SaveOutcome::saved(PathBuf::from("/tmp/a.jpg"), "12 B written");
        assert!(outcome.is_saved());
        assert_eq!(outcome.path.as_deref(), Some(std::path::Path::new("/tmp/a.jpg")));
    }
}
