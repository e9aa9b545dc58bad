//! Weir storage - content-hash deduplication.
//!
//! Tracks SHA-256 digests of saved payloads so byte-identical content is
//! persisted once. Two backings with identical semantics:
//!
//! - volatile: an in-process set, lost on restart
//! - persistent: a single-table SQLite store that survives restarts
//!
//! The check-and-insert is atomic with respect to concurrent callers in
//! both modes.
//!
//! # Example
//!
//! ```
//! use weir_storage::DedupTracker;
//!
//! let tracker = DedupTracker::in_memory();
//! assert!(!tracker.is_duplicate(b"body").unwrap());
//! assert!(tracker.is_duplicate(b"body").unwrap());
//! ```

mod dedup;
pub mod error;
mod pool;
mod schema;

pub use dedup::{default_db_path, hash_content, DedupTracker};
pub use error::{Result, StorageError};
pub use pool::ConnectionPool;
