//! Transport operations for ogx: moving object graphs through record stores.
//!
//! This crate wires the core engine to storage. [`send`] decomposes a graph
//! and persists its records with dedup-aware skip-on-write; [`receive`]
//! fetches records back and rebuilds the graph. Both operate against any
//! [`RecordStore`](ogx_store::RecordStore), so the same code path serves
//! in-memory round trips and remote backends.

pub mod error;
pub mod ops;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{TransportError, TransportResult};
pub use ops::{receive, send, SendReceipt, StoreResolver};
