//! Recursive-descent graph decomposition.
//!
//! [`decompose`] walks an object graph from a root node and turns it into a
//! flat set of independently addressable, deduplicated records plus the
//! root's reachability closure. The pass runs in two phases:
//!
//! - **walk**: recursive descent over node instances. A node instance
//!   visited twice is never re-walked (identity-level memoization), which is
//!   what makes repeated references and detachable cycles terminate. The
//!   walk lowers attributes to proto-records whose references point at walk
//!   indices, not ids.
//! - **seal**: ids are assigned bottom-up over the strongly connected
//!   components of the proto-record reference graph. An acyclic record gets
//!   a pure content id. Members of a cycle get ids derived from the
//!   canonical form of the whole cycle, with intra-cycle references replaced
//!   by slot placeholders, so equal cycles dedupe across graphs and distinct
//!   cycles never collide. Two distinct instances with identical canonical
//!   payloads collapse to a single record.
//!
//! Records are pushed after their children (post-order), so a consumer
//! writing them in emission order satisfies the children-before-parents
//! durability guarantee for every acyclic region; members of a cycle are
//! mutually dependent and are written in emission order.
//!
//! Decomposition is all-or-nothing: any failure aborts the pass and no
//! partial record set escapes.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use ogx_hash::canonical;
use ogx_types::{Closure, InlineNode, ObjectId, Record, WireValue};

use crate::chunk::Chunker;
use crate::container::{NodeRef, Value};
use crate::error::{GraphError, GraphResult};

/// The output of one decomposition pass.
#[derive(Clone, Debug)]
pub struct Decomposition {
    /// Content id of the root record.
    pub root_id: ObjectId,
    /// Flat record set, children before parents.
    pub records: Vec<Record>,
    /// Every reference id reachable from the root, with minimum depths.
    pub closure: Closure,
}

impl Decomposition {
    /// Find an emitted record by id.
    pub fn record(&self, id: &ObjectId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == *id)
    }

    /// The root record.
    pub fn root_record(&self) -> Option<&Record> {
        self.record(&self.root_id)
    }

    /// Number of emitted records (root included).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was emitted. Never the case for a
    /// successful pass, which emits at least the root.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Decompose the graph reachable from `root` into a flat record set.
pub fn decompose(root: &NodeRef) -> GraphResult<Decomposition> {
    let mut walk = Walk::new();
    walk.visit(root, "$")?;
    let sealed = seal(walk.protos)?;
    debug!(
        root = %sealed.root_id.short_hex(),
        records = sealed.records.len(),
        closure = sealed.closure.len(),
        "decomposed object graph"
    );
    Ok(Decomposition {
        root_id: sealed.root_id,
        records: sealed.records,
        closure: sealed.closure,
    })
}

/// A record-shaped attribute value before id assignment. References carry
/// walk indices so cycles can be expressed without knowing any id yet.
enum ProtoValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ProtoValue>),
    Inline(ProtoInline),
    Reference(usize),
}

struct ProtoInline {
    type_tag: String,
    attributes: BTreeMap<String, ProtoValue>,
}

/// One future record: a walked node with lowered attributes. The node handle
/// is kept so the final id can be cached on the instance.
struct ProtoRecord {
    node: NodeRef,
    type_tag: String,
    attributes: BTreeMap<String, ProtoValue>,
}

/// Walk-phase state, local to one decomposition call.
struct Walk {
    /// Pointer key → walk index, assigned on first visit.
    indices: HashMap<usize, usize>,
    /// Pointer keys of nodes whose attributes are still being lowered.
    in_progress: HashSet<usize>,
    /// Pointer keys of nodes on the current inline-embedding chain.
    inline_stack: Vec<usize>,
    protos: Vec<ProtoRecord>,
}

impl Walk {
    fn new() -> Self {
        Self {
            indices: HashMap::new(),
            in_progress: HashSet::new(),
            inline_stack: Vec::new(),
            protos: Vec::new(),
        }
    }

    /// Lower `node` as a top-level record, returning its walk index. A
    /// back-edge into an in-progress node returns the reserved index, which
    /// is exactly how cycles terminate.
    fn visit(&mut self, node: &NodeRef, path: &str) -> GraphResult<usize> {
        let key = node.ptr_key();
        if let Some(&index) = self.indices.get(&key) {
            return Ok(index);
        }

        let index = self.protos.len();
        self.protos.push(ProtoRecord {
            node: node.clone(),
            type_tag: node.type_tag(),
            attributes: BTreeMap::new(),
        });
        self.indices.insert(key, index);
        self.in_progress.insert(key);
        let attributes = self.lower_attributes(node, path)?;
        self.protos[index].attributes = attributes;
        self.in_progress.remove(&key);
        Ok(index)
    }

    /// Lower a node's serializable attributes to proto values.
    fn lower_attributes(
        &mut self,
        node: &NodeRef,
        path: &str,
    ) -> GraphResult<BTreeMap<String, ProtoValue>> {
        let mut attributes = BTreeMap::new();
        for name in node.attribute_names() {
            if node.is_ignored(&name) {
                continue;
            }
            let value = node.get(&name).unwrap_or(Value::Null);
            let attr_path = format!("{path}.{name}");
            let proto = if let Some(chunk_size) = node.chunk_size(&name) {
                self.lower_chunked(&value, chunk_size, &attr_path)?
            } else if node.is_detached(&name) {
                self.lower_detached(&value, &attr_path)?
            } else {
                self.lower_inline(&value, &attr_path)?
            };
            attributes.insert(name, proto);
        }
        Ok(attributes)
    }

    /// Lower a chunk-flagged sequence: split, detach every chunk, and
    /// replace the value with an ordered reference list.
    fn lower_chunked(
        &mut self,
        value: &Value,
        chunk_size: usize,
        path: &str,
    ) -> GraphResult<ProtoValue> {
        let items = match value {
            Value::List(items) => items,
            Value::Null => return Ok(ProtoValue::Null),
            other => {
                return Err(GraphError::UnserializableValue {
                    path: path.to_string(),
                    reason: format!("chunk directive on a non-sequence value ({})", other.kind_name()),
                })
            }
        };

        let chunks = Chunker::new(chunk_size).split(items);
        let mut references = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let index = self.visit(chunk, &format!("{path}[{i}]"))?;
            references.push(ProtoValue::Reference(index));
        }
        Ok(ProtoValue::List(references))
    }

    /// Lower a detachable value: nodes become references (recursively inside
    /// sequences); primitives stay in place.
    fn lower_detached(&mut self, value: &Value, path: &str) -> GraphResult<ProtoValue> {
        match value {
            Value::Node(child) => {
                let index = self.visit(child, path)?;
                Ok(ProtoValue::Reference(index))
            }
            Value::List(items) => {
                let mut lowered = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    lowered.push(self.lower_detached(item, &format!("{path}[{i}]"))?);
                }
                Ok(ProtoValue::List(lowered))
            }
            scalar => lower_scalar(scalar, path),
        }
    }

    /// Lower an inline value: nested nodes are embedded in place, their own
    /// detachable children still become separate records.
    fn lower_inline(&mut self, value: &Value, path: &str) -> GraphResult<ProtoValue> {
        match value {
            Value::Node(child) => {
                let key = child.ptr_key();
                if self.in_progress.contains(&key) || self.inline_stack.contains(&key) {
                    // Embedding a node that is still being lowered can never
                    // terminate: the cycle is closed through an inline link.
                    return Err(GraphError::CyclicInlineReference {
                        path: path.to_string(),
                    });
                }
                self.inline_stack.push(key);
                let attributes = self.lower_attributes(child, path)?;
                self.inline_stack.pop();
                Ok(ProtoValue::Inline(ProtoInline {
                    type_tag: child.type_tag(),
                    attributes,
                }))
            }
            Value::List(items) => {
                let mut lowered = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    lowered.push(self.lower_inline(item, &format!("{path}[{i}]"))?);
                }
                Ok(ProtoValue::List(lowered))
            }
            scalar => lower_scalar(scalar, path),
        }
    }
}

/// Lower a scalar value, enforcing the canonical float contract.
fn lower_scalar(value: &Value, path: &str) -> GraphResult<ProtoValue> {
    match value {
        Value::Null => Ok(ProtoValue::Null),
        Value::Bool(b) => Ok(ProtoValue::Bool(*b)),
        Value::Int(i) => Ok(ProtoValue::Int(*i)),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(GraphError::UnserializableValue {
                    path: path.to_string(),
                    reason: "non-finite float".to_string(),
                });
            }
            // Normalize negative zero so equal values hash identically.
            let f = if *f == 0.0 { 0.0 } else { *f };
            Ok(ProtoValue::Float(f))
        }
        Value::Text(s) => Ok(ProtoValue::Text(s.clone())),
        composite => Err(GraphError::UnserializableValue {
            path: path.to_string(),
            reason: format!("unexpected composite value ({})", composite.kind_name()),
        }),
    }
}

struct Sealed {
    root_id: ObjectId,
    records: Vec<Record>,
    closure: Closure,
}

/// Assign ids over the proto-record graph and emit records.
fn seal(protos: Vec<ProtoRecord>) -> GraphResult<Sealed> {
    let refs: Vec<Vec<usize>> = protos.iter().map(|p| collect_refs(&p.attributes)).collect();
    // Children-first: every component is sealed before any component that
    // references it.
    let components = strongly_connected(&refs);

    let mut ids: Vec<Option<ObjectId>> = vec![None; protos.len()];
    let mut attributes: Vec<Option<BTreeMap<String, WireValue>>> = vec![None; protos.len()];

    for members in &components {
        let cyclic = members.len() > 1 || refs[members[0]].contains(&members[0]);
        if !cyclic {
            let m = members[0];
            let wire = resolve_attributes(&protos[m].attributes, &ids, None)?;
            let id = canonical::record_id(&protos[m].type_tag, &wire)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
            ids[m] = Some(id);
            attributes[m] = Some(wire);
            continue;
        }

        // Canonical form of the whole cycle: members in walk order,
        // intra-cycle references replaced by slot placeholders.
        let slots: HashMap<usize, u64> = members
            .iter()
            .enumerate()
            .map(|(slot, &m)| (m, slot as u64))
            .collect();
        let mut canon = Vec::with_capacity(members.len());
        for &m in members {
            canon.push(resolve_attributes(&protos[m].attributes, &ids, Some(&slots))?);
        }
        let payloads: Vec<(&str, &BTreeMap<String, WireValue>)> = members
            .iter()
            .zip(&canon)
            .map(|(&m, wire)| (protos[m].type_tag.as_str(), wire))
            .collect();
        let digest = canonical::cycle_digest(&payloads)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        for (slot, &m) in members.iter().enumerate() {
            ids[m] = Some(canonical::cycle_member_id(&digest, slot as u64));
        }
        // With every member id now known, resolve the real wire payloads.
        for &m in members {
            attributes[m] = Some(resolve_attributes(&protos[m].attributes, &ids, None)?);
        }
    }

    let ids: Vec<ObjectId> = ids
        .into_iter()
        .map(|id| id.ok_or_else(|| GraphError::Serialization("record left unsealed".to_string())))
        .collect::<GraphResult<_>>()?;

    // Closures, memoized from the root so back-edges resolve exactly where
    // the walk found them.
    let mut done: Vec<Option<Closure>> = vec![None; protos.len()];
    let mut marked = vec![false; protos.len()];
    let root_closure = closure_of(0, &refs, &ids, &mut done, &mut marked);

    let mut emitted = HashSet::new();
    let mut records = Vec::new();
    for members in &components {
        // Within a cycle, deepest walk index first (the walk's completion
        // order).
        for &m in members.iter().rev() {
            protos[m].node.store_id(ids[m]);
            if !emitted.insert(ids[m]) {
                continue;
            }
            let closure = closure_of(m, &refs, &ids, &mut done, &mut marked);
            let wire = attributes[m].take().ok_or_else(|| {
                GraphError::Serialization("record payload missing at emission".to_string())
            })?;
            debug!(
                id = %ids[m].short_hex(),
                type_tag = %protos[m].type_tag,
                "emitting record"
            );
            records.push(Record {
                id: ids[m],
                type_tag: protos[m].type_tag.clone(),
                total_child_count: closure.len() as u64,
                attributes: wire,
            });
        }
    }

    Ok(Sealed {
        root_id: ids[0],
        records,
        closure: root_closure,
    })
}

/// All outgoing reference indices of a proto payload, in deterministic
/// (attribute-name, then list) order.
fn collect_refs(attributes: &BTreeMap<String, ProtoValue>) -> Vec<usize> {
    fn walk(value: &ProtoValue, out: &mut Vec<usize>) {
        match value {
            ProtoValue::Reference(index) => out.push(*index),
            ProtoValue::List(items) => items.iter().for_each(|v| walk(v, out)),
            ProtoValue::Inline(inline) => {
                inline.attributes.values().for_each(|v| walk(v, out));
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    attributes.values().for_each(|v| walk(v, &mut out));
    out
}

/// Map a proto payload to wire values. `slots` substitutes placeholder ids
/// for not-yet-sealed intra-cycle references.
fn resolve_attributes(
    attributes: &BTreeMap<String, ProtoValue>,
    ids: &[Option<ObjectId>],
    slots: Option<&HashMap<usize, u64>>,
) -> GraphResult<BTreeMap<String, WireValue>> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), resolve_value(value, ids, slots)?)))
        .collect()
}

fn resolve_value(
    value: &ProtoValue,
    ids: &[Option<ObjectId>],
    slots: Option<&HashMap<usize, u64>>,
) -> GraphResult<WireValue> {
    match value {
        ProtoValue::Null => Ok(WireValue::Null),
        ProtoValue::Bool(b) => Ok(WireValue::Bool(*b)),
        ProtoValue::Int(i) => Ok(WireValue::Int(*i)),
        ProtoValue::Float(f) => Ok(WireValue::Float(*f)),
        ProtoValue::Text(s) => Ok(WireValue::Text(s.clone())),
        ProtoValue::List(items) => Ok(WireValue::List(
            items
                .iter()
                .map(|v| resolve_value(v, ids, slots))
                .collect::<GraphResult<_>>()?,
        )),
        ProtoValue::Inline(inline) => Ok(WireValue::Inline(InlineNode {
            type_tag: inline.type_tag.clone(),
            attributes: resolve_attributes(&inline.attributes, ids, slots)?,
        })),
        ProtoValue::Reference(index) => {
            if let Some(Some(id)) = ids.get(*index) {
                return Ok(WireValue::reference(*id));
            }
            match slots.and_then(|s| s.get(index)) {
                Some(&slot) => Ok(WireValue::reference(canonical::cycle_slot_id(slot))),
                None => Err(GraphError::Serialization(
                    "reference to an unsealed record outside its cycle".to_string(),
                )),
            }
        }
    }
}

/// Closure of the record at walk index `i`: every reference at depth 1 plus
/// each referenced record's own closure shifted one hop down. A back-edge
/// contributes its target at the referencing depth only.
fn closure_of(
    i: usize,
    refs: &[Vec<usize>],
    ids: &[ObjectId],
    done: &mut Vec<Option<Closure>>,
    marked: &mut Vec<bool>,
) -> Closure {
    if let Some(closure) = &done[i] {
        return closure.clone();
    }
    marked[i] = true;
    let mut closure = Closure::new();
    for &j in &refs[i] {
        if marked[j] && done[j].is_none() {
            closure.insert(ids[j], 1);
        } else {
            let sub = closure_of(j, refs, ids, done, marked);
            closure.absorb_child(ids[j], &sub);
        }
    }
    marked[i] = false;
    done[i] = Some(closure.clone());
    closure
}

/// Tarjan's strongly connected components over the proto-record reference
/// graph. Components are produced children-first: every component appears
/// before any component that references it. Members are in ascending walk
/// order.
fn strongly_connected(refs: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: u32 = u32::MAX;

    struct Tarjan<'a> {
        refs: &'a [Vec<usize>],
        index: Vec<u32>,
        low: Vec<u32>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next: u32,
        components: Vec<Vec<usize>>,
    }

    impl Tarjan<'_> {
        fn connect(&mut self, v: usize) {
            self.index[v] = self.next;
            self.low[v] = self.next;
            self.next += 1;
            self.stack.push(v);
            self.on_stack[v] = true;

            let refs = self.refs;
            for &w in &refs[v] {
                if self.index[w] == UNVISITED {
                    self.connect(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                } else if self.on_stack[w] {
                    self.low[v] = self.low[v].min(self.index[w]);
                }
            }

            if self.low[v] == self.index[v] {
                let mut members = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    members.push(w);
                    if w == v {
                        break;
                    }
                }
                members.sort_unstable();
                self.components.push(members);
            }
        }
    }

    let mut tarjan = Tarjan {
        refs,
        index: vec![UNVISITED; refs.len()],
        low: vec![0; refs.len()],
        on_stack: vec![false; refs.len()],
        stack: Vec::new(),
        next: 0,
        components: Vec::new(),
    };
    for v in 0..refs.len() {
        if tarjan.index[v] == UNVISITED {
            tarjan.connect(v);
        }
    }
    tarjan.components
}
