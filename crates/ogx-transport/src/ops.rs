//! High-level send and receive operations.
//!
//! [`send`] decomposes a graph and writes its records to a [`RecordStore`],
//! skipping ids the store already holds. Records are written in emission
//! order (children before parents), so an interrupted send never leaves a
//! parent durable without its children in any acyclic region. Re-sending an
//! unchanged graph writes nothing.
//!
//! [`receive`] is the inverse: it reads records from a store and rebuilds the
//! graph, preserving shared-reference identity. Missing child records are
//! reported in the returned [`Reconstruction`] instead of aborting the pass.

use tracing::debug;

use ogx_graph::{decompose, reconstruct, GraphError, GraphResult, NodeRef, Reconstruction};
use ogx_graph::{RecordResolver, TypeRegistry};
use ogx_store::RecordStore;
use ogx_types::{ObjectId, Record};

use crate::error::TransportResult;

/// Summary of one send pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    /// Content id of the root record, the handle for a later [`receive`].
    pub root_id: ObjectId,
    /// Records written to the store by this pass.
    pub written: usize,
    /// Records the store already held and were skipped.
    pub skipped: usize,
}

/// Decompose `root` and persist every record the store does not yet hold.
///
/// Decomposition is all-or-nothing: if any part of the graph cannot be
/// serialized, nothing is written.
pub fn send(root: &NodeRef, store: &dyn RecordStore) -> TransportResult<SendReceipt> {
    let decomposition = decompose(root)?;

    let mut written = 0usize;
    let mut skipped = 0usize;
    // Emission order is children-first; writing in order keeps every
    // partially completed send consistent.
    for record in &decomposition.records {
        if store.has(&record.id)? {
            skipped += 1;
            continue;
        }
        store.put(record)?;
        written += 1;
    }

    debug!(
        root = %decomposition.root_id.short_hex(),
        written,
        skipped,
        "sent object graph"
    );
    Ok(SendReceipt {
        root_id: decomposition.root_id,
        written,
        skipped,
    })
}

/// Read the record set rooted at `root_id` from `store` and rebuild the
/// graph.
///
/// A missing root is a hard error; missing children are collected in the
/// returned [`Reconstruction`] and their subtrees hold `Null`.
pub fn receive(
    root_id: &ObjectId,
    registry: &TypeRegistry,
    store: &dyn RecordStore,
) -> TransportResult<Reconstruction> {
    let resolver = StoreResolver { store };
    let reconstruction = reconstruct(root_id, registry, &resolver)?;
    debug!(
        root = %root_id.short_hex(),
        missing = reconstruction.missing.len(),
        "received object graph"
    );
    Ok(reconstruction)
}

/// Adapts a [`RecordStore`] to the reconstructor's [`RecordResolver`] seam.
///
/// A cleanly absent record stays `Ok(None)`; a store fault surfaces as
/// [`GraphError::ResolverFailure`] so the reconstructor can tell the two
/// apart.
pub struct StoreResolver<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> StoreResolver<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl RecordResolver for StoreResolver<'_> {
    fn resolve(&self, id: &ObjectId) -> GraphResult<Option<Record>> {
        self.store.get(id).map_err(|err| GraphError::ResolverFailure {
            id: *id,
            reason: err.to_string(),
        })
    }
}
