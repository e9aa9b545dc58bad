//! Weir proxy - the response capture pipeline driven by a MITM engine.
//!
//! The proxy engine hands every decoded HTTP response to the
//! [`ResponseHandler`], which classifies the body, evaluates the current
//! policy snapshot, suppresses duplicates, and persists survivors with an
//! atomic write. A [`CaptureHook`] adapter plugs the handler into a
//! hudsucker proxy.
//!
//! ## Architecture
//!
//! ```text
//! Response → Classify (MIME, name) → Filter Chain → allow?
//!                                                     │
//!                                ┌────────────────────┴─────┐
//!                                │ No                       │ Yes
//!                                ▼                          ▼
//!                             Skipped               Dedup check → seen?
//!                                                            │
//!                                           ┌────────────────┴─────┐
//!                                           │ Yes                  │ No
//!                                           ▼                      ▼
//!                                        Skipped             Atomic write
//!                                                                  │
//!                                                           Saved / Error
//! ```
//!
//! Every terminal state emits one structured outcome event.

mod handler;
mod hook;
mod writer;

pub use handler::ResponseHandler;
pub use hook::CaptureHook;
pub use writer::AtomicWriter;
