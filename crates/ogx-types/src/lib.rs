//! Foundation types for ogx, the content-addressable object-graph exchange.
//!
//! This crate provides the identifiers and wire structures shared by every
//! other ogx crate: decomposition produces [`Record`]s, stores key them by
//! [`ObjectId`], and reconstruction consumes them.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash, hex on the wire)
//! - [`Record`] — The flat, independently addressable wire form of one node
//! - [`WireValue`] — A single element of a record's attribute payload
//! - [`Closure`] — Reachable reference ids mapped to their minimum depth

pub mod closure;
pub mod error;
pub mod object;
pub mod record;

pub use closure::Closure;
pub use error::TypeError;
pub use object::ObjectId;
pub use record::{InlineNode, Record, WireValue};
