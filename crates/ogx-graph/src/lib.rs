//! Object-graph decomposition and reconstruction for ogx.
//!
//! This crate is the core engine: it turns an in-memory graph of attribute
//! containers into a flat set of independently addressable, deduplicated,
//! size-bounded records, and rebuilds an isomorphic graph — shared-reference
//! identity included — from an unordered bag of records.
//!
//! # Key Types
//!
//! - [`NodeRef`] / [`Value`] — the generic node: a typed/dynamic attribute bag
//! - [`TypeRegistry`] / [`TypeShape`] — per-tag validator table: declared
//!   kinds, detach markers, chunk directives, ignored attributes, aliases
//! - [`Chunker`] — splits oversized sequences into `DataChunk` records
//! - [`decompose`] — recursive-descent serializer with identity- and
//!   content-level dedup
//! - [`reconstruct`] — inverse walk with a shared-identity cache
//!
//! # Design Rules
//!
//! 1. Content ids are deterministic: attribute order and float source
//!    representation never change the hash.
//! 2. Decomposition is all-or-nothing; reconstruction degrades per subtree.
//! 3. Per-pass state is local to one call; only the registry is shared.
//! 4. Cycles are legal through detachable links only; inline attributes must
//!    form a tree.

pub mod chunk;
pub mod container;
pub mod decompose;
pub mod error;
pub mod reconstruct;
pub mod registry;

// Re-export primary types at crate root for ergonomic imports.
pub use chunk::{Chunker, CHUNK_DATA_ATTRIBUTE, CHUNK_TYPE_TAG, DEFAULT_CHUNK_SIZE};
pub use container::{NodeRef, Value, DETACH_PREFIX, PATH_SEPARATORS};
pub use decompose::{decompose, Decomposition};
pub use error::{GraphError, GraphResult};
pub use reconstruct::{reconstruct, RecordResolver, Reconstruction};
pub use registry::{AttrKind, TypeRegistry, TypeShape, TypeShapeBuilder};
