//! Content-addressed record storage for ogx.
//!
//! The store is a collaborator, not part of the core: a pure key-value
//! surface holding [`Record`](ogx_types::Record)s by their content id. The
//! decomposer produces records, a [`RecordStore`] keeps them, and the
//! reconstructor fetches them back — locally or across the network.
//!
//! # Design Rules
//!
//! 1. Records are immutable once written; content addressing guarantees the
//!    same id always maps to the same payload.
//! 2. Writes are idempotent: putting an id that is already present is a
//!    no-op, which lets dedup-aware senders skip cheaply.
//! 3. The store never interprets record payloads.
//! 4. All I/O errors are propagated, never silently ignored.
//! 5. Every operation is safe to retry; retry policy belongs to callers.

pub mod error;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
