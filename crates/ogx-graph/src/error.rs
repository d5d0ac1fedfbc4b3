//! Error types for graph decomposition and reconstruction.
//!
//! Every variant carries the offending id and/or attribute path so failures
//! deep inside a large graph stay diagnosable.

use ogx_types::ObjectId;

/// Errors that can occur while building, decomposing, or reconstructing an
/// object graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An attribute name is empty, starts with the reserved `@`, or contains
    /// a path separator.
    #[error("invalid attribute name {name:?}: {reason}")]
    InvalidAttributeName {
        /// The name as supplied by the caller (directives included).
        name: String,
        reason: String,
    },

    /// A declared attribute was assigned a value of an incompatible kind.
    #[error("type mismatch for {type_tag}.{attribute}: expected {expected}, got {actual}")]
    TypeMismatch {
        type_tag: String,
        attribute: String,
        expected: String,
        actual: String,
    },

    /// A type tag is already registered with a different shape.
    #[error("duplicate type tag {0:?} registered with a different shape")]
    DuplicateTypeTag(String),

    /// An attribute value cannot be canonicalized.
    #[error("unserializable value at {path}: {reason}")]
    UnserializableValue { path: String, reason: String },

    /// A cycle was closed through inline-only attributes. Cycles are legal
    /// only through detachable links.
    #[error("cyclic inline reference at {path}")]
    CyclicInlineReference { path: String },

    /// A chunked sequence is structurally inconsistent.
    #[error("corrupt chunk sequence at {path}: {reason}")]
    CorruptChunkSequence { path: String, reason: String },

    /// A referenced record is absent from the resolver.
    #[error("missing record {id} referenced from {path}")]
    MissingRecord { id: ObjectId, path: String },

    /// The resolver itself failed (I/O or backend fault), distinct from a
    /// record that is cleanly absent.
    #[error("resolver failure for {id}: {reason}")]
    ResolverFailure { id: ObjectId, reason: String },

    /// Wire encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
