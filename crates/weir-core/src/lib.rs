//! Weir core - capture policy, classification, and filtering.
//!
//! This crate carries everything the response pipeline needs to decide
//! whether a payload is worth keeping:
//!
//! - Hot-reloadable policy snapshots ([`ConfigStore`]) with a debounced
//!   file watcher
//! - Best-effort MIME/extension classification ([`mime::classify`])
//! - Filename sanitization ([`sanitize::safe_name`])
//! - The ordered filter chain ([`FilterChain`])
//! - Structured outcome events ([`OutcomeEvent`], [`OutcomeSink`])
//!
//! Persistence and orchestration live in `weir-proxy`; the dedup store in
//! `weir-storage`.

pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod filter;
pub mod mime;
pub mod sanitize;
pub mod watcher;

pub use config::{
    default_config_path, default_save_dir, Config, ConfigStore, DomainPattern, FileSizeFilter,
    PixelDimensionFilter,
};
pub use error::{ConfigError, Result};
pub use events::{OutcomeEvent, OutcomeSink, SaveOutcome, SaveStatus, Severity, TracingSink};
pub use exchange::ResponseExchange;
pub use filter::{FilterChain, FilterVerdict};
pub use mime::classify;
pub use sanitize::safe_name;
pub use watcher::{ConfigWatcher, DEBOUNCE_WINDOW};
