//! Graph reconstruction: the inverse of decomposition.
//!
//! [`reconstruct`] rebuilds an object graph from a root id and a
//! [`RecordResolver`]. A per-reconstruction cache maps record ids to built
//! nodes, so every attribute referencing the same id anywhere in the graph
//! resolves to the exact same in-memory instance — the shared-identity
//! guarantee that makes deduplication transparent. The shell node is cached
//! before its attributes are filled, so record-level cycles terminate.
//!
//! Failures are scoped: a missing child record aborts only its own subtree.
//! Resolved siblings are kept, and the caller receives the partial graph
//! together with every recorded [`GraphError::MissingRecord`]. Only a
//! missing root is a hard error.

use std::collections::HashMap;

use tracing::debug;

use ogx_types::{ObjectId, Record, WireValue};

use crate::chunk::{CHUNK_DATA_ATTRIBUTE, CHUNK_TYPE_TAG};
use crate::container::{NodeRef, Value};
use crate::decompose::Decomposition;
use crate::error::{GraphError, GraphResult};
use crate::registry::TypeRegistry;

/// Resolves record ids to records, typically backed by a store.
pub trait RecordResolver {
    /// Fetch the record for `id`. `Ok(None)` means the record is cleanly
    /// absent; `Err` means the backend itself failed.
    fn resolve(&self, id: &ObjectId) -> GraphResult<Option<Record>>;
}

impl RecordResolver for HashMap<ObjectId, Record> {
    fn resolve(&self, id: &ObjectId) -> GraphResult<Option<Record>> {
        Ok(self.get(id).cloned())
    }
}

/// A decomposition doubles as a resolver over its own record set, which is
/// convenient for in-process round trips.
impl RecordResolver for Decomposition {
    fn resolve(&self, id: &ObjectId) -> GraphResult<Option<Record>> {
        Ok(self.record(id).cloned())
    }
}

/// The outcome of a reconstruction pass.
#[derive(Debug)]
pub struct Reconstruction {
    /// The rebuilt root. Subtrees behind missing records hold `Null`.
    pub root: NodeRef,
    /// Every missing-record failure encountered, with id and attribute path.
    pub missing: Vec<GraphError>,
}

impl Reconstruction {
    /// Returns `true` if every referenced record resolved.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The root if complete, otherwise the first recorded error.
    pub fn into_result(mut self) -> GraphResult<NodeRef> {
        if self.missing.is_empty() {
            Ok(self.root)
        } else {
            Err(self.missing.remove(0))
        }
    }
}

/// Rebuild the object graph rooted at `root_id`.
///
/// Unknown type tags fall back to generic untyped containers carrying the
/// same tag, so records from newer producers still reconstruct.
pub fn reconstruct(
    root_id: &ObjectId,
    registry: &TypeRegistry,
    resolver: &dyn RecordResolver,
) -> GraphResult<Reconstruction> {
    let mut pass = Rebuild {
        registry,
        resolver,
        cache: HashMap::new(),
        missing: Vec::new(),
    };
    let root = pass.build(root_id, "$")?;
    debug!(
        root = %root_id.short_hex(),
        nodes = pass.cache.len(),
        missing = pass.missing.len(),
        "reconstructed object graph"
    );
    Ok(Reconstruction {
        root,
        missing: pass.missing,
    })
}

/// State local to one reconstruction call. Never shared across passes.
struct Rebuild<'a> {
    registry: &'a TypeRegistry,
    resolver: &'a dyn RecordResolver,
    cache: HashMap<ObjectId, NodeRef>,
    missing: Vec<GraphError>,
}

impl Rebuild<'_> {
    /// Build (or reuse) the node for `id`.
    fn build(&mut self, id: &ObjectId, path: &str) -> GraphResult<NodeRef> {
        if let Some(node) = self.cache.get(id) {
            return Ok(node.clone());
        }
        let record = self
            .resolver
            .resolve(id)?
            .ok_or_else(|| GraphError::MissingRecord {
                id: *id,
                path: path.to_string(),
            })?;

        let node = NodeRef::new(&record.type_tag, self.registry);
        // Cache the shell before filling so record-level cycles terminate.
        self.cache.insert(*id, node.clone());
        self.fill_attributes(&node, &record, path)?;
        node.store_id(*id);
        Ok(node)
    }

    /// Fill a node from a record's wire attributes, restoring detach and
    /// chunk markers observed on the wire so re-serialization preserves the
    /// record layout.
    fn fill_attributes(&mut self, node: &NodeRef, record: &Record, path: &str) -> GraphResult<()> {
        for (name, wire) in &record.attributes {
            let attr_path = format!("{path}.{name}");
            let value = match wire {
                WireValue::Reference { reference_id } => {
                    match self.build(reference_id, &attr_path) {
                        Ok(child) => {
                            node.mark_detached(name);
                            Value::Node(child)
                        }
                        Err(e @ GraphError::MissingRecord { .. }) => {
                            self.missing.push(e);
                            Value::Null
                        }
                        Err(other) => return Err(other),
                    }
                }
                WireValue::List(items) if is_reference_list(items) => {
                    self.revive_reference_list(node, name, items, &attr_path)?
                }
                other => self.revive(other, &attr_path)?,
            };
            node.set_reconstructed(name, value);
        }
        Ok(())
    }

    /// Revive an attribute whose wire value is a non-empty list made
    /// entirely of references: either a chunk sequence to reassemble or a
    /// detached element list.
    fn revive_reference_list(
        &mut self,
        node: &NodeRef,
        name: &str,
        items: &[WireValue],
        path: &str,
    ) -> GraphResult<Value> {
        let mut children: Vec<Option<NodeRef>> = Vec::with_capacity(items.len());
        let mut any_missing = false;
        for (i, item) in items.iter().enumerate() {
            let Some(reference_id) = item.as_reference() else {
                continue; // is_reference_list guarantees this never fires
            };
            match self.build(reference_id, &format!("{path}[{i}]")) {
                Ok(child) => children.push(Some(child)),
                Err(e @ GraphError::MissingRecord { .. }) => {
                    self.missing.push(e);
                    any_missing = true;
                    children.push(None);
                }
                Err(other) => return Err(other),
            }
        }

        let resolved: Vec<&NodeRef> = children.iter().flatten().collect();
        let chunk_count = resolved
            .iter()
            .filter(|c| c.type_tag() == CHUNK_TYPE_TAG)
            .count();

        if chunk_count == 0 {
            // A detached element list: missing elements stay null.
            node.mark_detached(name);
            return Ok(Value::List(
                children
                    .into_iter()
                    .map(|c| c.map(Value::Node).unwrap_or(Value::Null))
                    .collect(),
            ));
        }

        if chunk_count != resolved.len() {
            return Err(GraphError::CorruptChunkSequence {
                path: path.to_string(),
                reason: "mixed chunk and non-chunk references".to_string(),
            });
        }
        if any_missing {
            // The sequence cannot be reassembled without every slice; the
            // misses are already recorded.
            return Ok(Value::Null);
        }

        self.reassemble_chunks(node, name, &resolved, path)
    }

    /// Concatenate chunk payloads in list order, verifying that chunk count
    /// and element counts are internally consistent.
    fn reassemble_chunks(
        &mut self,
        node: &NodeRef,
        name: &str,
        chunks: &[&NodeRef],
        path: &str,
    ) -> GraphResult<Value> {
        let corrupt = |reason: &str| GraphError::CorruptChunkSequence {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut data = Vec::new();
        let mut chunk_size = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            let payload = match chunk.get(CHUNK_DATA_ATTRIBUTE) {
                Some(Value::List(items)) => items,
                _ => return Err(corrupt("chunk record has no sequence payload")),
            };
            if payload.is_empty() {
                return Err(corrupt("empty chunk"));
            }
            if i == 0 {
                chunk_size = payload.len();
            } else if i < chunks.len() - 1 && payload.len() != chunk_size {
                // Every slice but the last must be full.
                return Err(corrupt("chunk sizes are inconsistent"));
            } else if payload.len() > chunk_size {
                return Err(corrupt("final chunk exceeds the chunk size"));
            }
            data.extend(payload);
        }

        node.mark_chunked(name, chunk_size);
        Ok(Value::List(data))
    }

    /// Revive a general wire value.
    fn revive(&mut self, wire: &WireValue, path: &str) -> GraphResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Bool(b) => Ok(Value::Bool(*b)),
            WireValue::Int(i) => Ok(Value::Int(*i)),
            WireValue::Float(f) => Ok(Value::Float(*f)),
            WireValue::Text(s) => Ok(Value::Text(s.clone())),
            WireValue::Reference { reference_id } => {
                match self.build(reference_id, path) {
                    Ok(child) => Ok(Value::Node(child)),
                    Err(e @ GraphError::MissingRecord { .. }) => {
                        self.missing.push(e);
                        Ok(Value::Null)
                    }
                    Err(other) => Err(other),
                }
            }
            WireValue::Inline(inline) => {
                let node = NodeRef::new(&inline.type_tag, self.registry);
                for (name, wire) in &inline.attributes {
                    let attr_path = format!("{path}.{name}");
                    let value = match wire {
                        WireValue::Reference { reference_id } => {
                            match self.build(reference_id, &attr_path) {
                                Ok(child) => {
                                    node.mark_detached(name);
                                    Value::Node(child)
                                }
                                Err(e @ GraphError::MissingRecord { .. }) => {
                                    self.missing.push(e);
                                    Value::Null
                                }
                                Err(other) => return Err(other),
                            }
                        }
                        other => self.revive(other, &attr_path)?,
                    };
                    node.set_reconstructed(name, value);
                }
                Ok(Value::Node(node))
            }
            WireValue::List(items) => {
                let mut revived = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    revived.push(self.revive(item, &format!("{path}[{i}]"))?);
                }
                Ok(Value::List(revived))
            }
        }
    }
}

/// Returns `true` for a non-empty list made entirely of references.
fn is_reference_list(items: &[WireValue]) -> bool {
    !items.is_empty() && items.iter().all(|i| i.as_reference().is_some())
}
