use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// The set of reference ids reachable from a root, each mapped to its
/// minimum depth in detach-reference hops (a direct child is depth 1).
///
/// A closure is built incrementally during decomposition and tells a
/// consumer exactly which records must be fetched to reconstruct a subgraph,
/// without re-walking it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure(BTreeMap<ObjectId, u32>);

impl Closure {
    /// Create an empty closure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` at `depth`, keeping the minimum if it was already known.
    pub fn insert(&mut self, id: ObjectId, depth: u32) {
        self.0
            .entry(id)
            .and_modify(|d| *d = (*d).min(depth))
            .or_insert(depth);
    }

    /// Merge a direct child and everything below it.
    ///
    /// The child itself lands at depth 1; every entry of the child's own
    /// closure is shifted down by one hop. Depths are min-merged, so a node
    /// reachable along several paths keeps its shortest distance.
    pub fn absorb_child(&mut self, child_id: ObjectId, child_closure: &Closure) {
        self.insert(child_id, 1);
        for (id, depth) in child_closure.iter() {
            self.insert(*id, depth + 1);
        }
    }

    /// Min-merge another closure at the same depth.
    ///
    /// Used for inline-embedded children: their references appear directly
    /// in the enclosing record's payload, so depths are not shifted.
    pub fn merge(&mut self, other: &Closure) {
        for (id, depth) in other.iter() {
            self.insert(*id, *depth);
        }
    }

    /// Minimum known depth of `id`, if reachable.
    pub fn min_depth(&self, id: &ObjectId) -> Option<u32> {
        self.0.get(id).copied()
    }

    /// Returns `true` if `id` is reachable.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.0.contains_key(id)
    }

    /// Number of reachable reference ids.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is reachable.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(id, min_depth)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &u32)> {
        self.0.iter()
    }

    /// All reachable ids in sorted order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.0.keys().copied().collect()
    }
}
