//! The generic node type: a typed/dynamic bag of named attributes.
//!
//! A [`Container`] holds an ordered attribute map plus the serialization
//! directives that apply to this instance. Shared handles are [`NodeRef`]s
//! (`Rc<RefCell<Container>>`): two attributes holding clones of one `NodeRef`
//! reference the same in-memory node, which is exactly the sharing structure
//! the decomposer dedupes and the reconstructor restores.
//!
//! Attribute names may carry inline directives: a leading `@` detaches the
//! value into its own record, and `@(N)` additionally chunks an ordered
//! sequence with chunk size `N`. Directives are stripped before the name
//! reaches the attribute map.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ogx_types::ObjectId;

use crate::error::{GraphError, GraphResult};
use crate::registry::{TypeRegistry, TypeShape};

/// Reserved prefix marking an attribute as detachable.
pub const DETACH_PREFIX: char = '@';

/// Reserved path separators, rejected inside attribute names.
pub const PATH_SEPARATORS: [char; 2] = ['.', '/'];

/// A single attribute value: a tagged union of the serializable kinds.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent / explicitly empty.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// Nested container, owned or shared.
    Node(NodeRef),
}

impl Value {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Node(_) => "node",
        }
    }

    /// Build a list value from anything convertible.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// The nested node, if this is a node value.
    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality for primitives and lists; *identity* equality for
    /// nodes, since node equality is about sharing, not content.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => NodeRef::same_instance(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<NodeRef> for Value {
    fn from(v: NodeRef) -> Self {
        Self::Node(v)
    }
}

impl From<&NodeRef> for Value {
    fn from(v: &NodeRef) -> Self {
        Self::Node(v.clone())
    }
}

/// An attribute name with its inline directives stripped.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ParsedName {
    pub name: String,
    pub detach: bool,
    pub chunk_size: Option<usize>,
}

/// Validate a bare attribute name (directives already stripped).
pub(crate) fn validate_bare_name(raw: &str, bare: &str) -> GraphResult<()> {
    let reason = if bare.is_empty() {
        "name is empty"
    } else if bare.starts_with(DETACH_PREFIX) {
        "names must not start with the reserved '@'"
    } else if bare.contains(PATH_SEPARATORS) {
        "names must not contain '.' or '/'"
    } else {
        return Ok(());
    };
    Err(GraphError::InvalidAttributeName {
        name: raw.to_string(),
        reason: reason.to_string(),
    })
}

/// Parse an attribute name as supplied by application code.
///
/// `@name` detaches; `@(N)name` detaches and chunks with size `N`.
pub(crate) fn parse_attribute_name(raw: &str) -> GraphResult<ParsedName> {
    let invalid = |reason: &str| GraphError::InvalidAttributeName {
        name: raw.to_string(),
        reason: reason.to_string(),
    };

    let (bare, detach, chunk_size) = match raw.strip_prefix(DETACH_PREFIX) {
        Some(stripped) => match stripped.strip_prefix('(') {
            Some(inner) => {
                let close = inner
                    .find(')')
                    .ok_or_else(|| invalid("unterminated chunk size directive"))?;
                let size: usize = inner[..close]
                    .parse()
                    .map_err(|_| invalid("malformed chunk size directive"))?;
                if size == 0 {
                    return Err(invalid("chunk size must be positive"));
                }
                (&inner[close + 1..], true, Some(size))
            }
            None => (stripped, true, None),
        },
        None => (raw, false, None),
    };

    validate_bare_name(raw, bare)?;
    Ok(ParsedName {
        name: bare.to_string(),
        detach,
        chunk_size,
    })
}

/// The attribute container backing a [`NodeRef`].
struct Container {
    type_tag: String,
    shape: Option<Arc<TypeShape>>,
    attributes: BTreeMap<String, Value>,
    /// Instance-level detach markers from inline `@` directives.
    detached: BTreeSet<String>,
    /// Instance-level chunk sizes from inline `@(N)` directives.
    chunked: BTreeMap<String, usize>,
    /// Content id, cached after decomposition, cleared on mutation.
    cached_id: Option<ObjectId>,
}

/// Shared handle to an attribute container.
///
/// Cloning a `NodeRef` clones the handle, not the node; use
/// [`NodeRef::same_instance`] to test sharing.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<Container>>);

impl NodeRef {
    /// Create a node with the shape registered for `tag`.
    ///
    /// An unregistered tag yields a generic untyped container carrying the
    /// same tag: dynamic attributes only, no declared validation.
    pub fn new(tag: impl Into<String>, registry: &TypeRegistry) -> Self {
        let tag = tag.into();
        let shape = registry.resolve(&tag);
        Self(Rc::new(RefCell::new(Container {
            type_tag: tag,
            shape,
            attributes: BTreeMap::new(),
            detached: BTreeSet::new(),
            chunked: BTreeMap::new(),
            cached_id: None,
        })))
    }

    /// Create an untyped container with an ad-hoc tag, bypassing the
    /// registry entirely.
    pub fn untyped(tag: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(Container {
            type_tag: tag.into(),
            shape: None,
            attributes: BTreeMap::new(),
            detached: BTreeSet::new(),
            chunked: BTreeMap::new(),
            cached_id: None,
        })))
    }

    /// The polymorphic discriminator, immutable after construction.
    pub fn type_tag(&self) -> String {
        self.0.borrow().type_tag.clone()
    }

    /// The cached content id, if this node was decomposed and not mutated
    /// since.
    pub fn id(&self) -> Option<ObjectId> {
        self.0.borrow().cached_id
    }

    pub(crate) fn store_id(&self, id: ObjectId) {
        self.0.borrow_mut().cached_id = Some(id);
    }

    /// Set an attribute.
    ///
    /// The name may carry inline directives (`@`, `@(N)`); these are
    /// stripped and recorded on the instance. Legacy names are mapped to
    /// their current equivalents via the shape's alias table. Declared
    /// attributes validate against their kind with narrow coercions
    /// (numeric-to-numeric, text-to-enum-by-name); anything else
    /// incompatible fails with [`GraphError::TypeMismatch`]. Dynamic
    /// attributes accept any value unchecked.
    pub fn set(&self, raw_name: &str, value: impl Into<Value>) -> GraphResult<()> {
        let parsed = parse_attribute_name(raw_name)?;
        let mut inner = self.0.borrow_mut();
        let name = match &inner.shape {
            Some(shape) => shape.canonical_name(&parsed.name).to_string(),
            None => parsed.name,
        };
        let value = value.into();
        let value = match inner.shape.as_ref().and_then(|s| s.declared(&name)) {
            Some(kind) => kind.coerce(&inner.type_tag, &name, value)?,
            None => value,
        };
        if parsed.detach {
            inner.detached.insert(name.clone());
        }
        if let Some(size) = parsed.chunk_size {
            inner.chunked.insert(name.clone(), size);
        }
        inner.cached_id = None;
        inner.attributes.insert(name, value);
        Ok(())
    }

    /// Get an attribute by name (legacy aliases resolve to current names).
    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.0.borrow();
        let name = match &inner.shape {
            Some(shape) => shape.canonical_name(name),
            None => name,
        };
        inner.attributes.get(name).cloned()
    }

    /// All stored attribute names, in deterministic (sorted) order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.0.borrow().attributes.keys().cloned().collect()
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.0.borrow().attributes.len()
    }

    /// Returns `true` if the node has no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().attributes.is_empty()
    }

    /// Returns `true` if `a` and `b` are the same in-memory node.
    pub fn same_instance(a: &NodeRef, b: &NodeRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Pointer-identity key, used by per-pass visited sets.
    pub(crate) fn ptr_key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Whether `name` must be serialized as a separate record. Combines the
    /// shape's declared markers with instance-level ones; a chunk directive
    /// implies detachment.
    pub fn is_detached(&self, name: &str) -> bool {
        let inner = self.0.borrow();
        inner.detached.contains(name)
            || inner.chunked.contains_key(name)
            || inner
                .shape
                .as_ref()
                .is_some_and(|s| s.is_detached(name))
    }

    /// The chunk size for `name`, if it carries a chunk directive.
    pub fn chunk_size(&self, name: &str) -> Option<usize> {
        let inner = self.0.borrow();
        inner
            .chunked
            .get(name)
            .copied()
            .or_else(|| inner.shape.as_ref().and_then(|s| s.chunk_size(name)))
    }

    /// Whether `name` is excluded from hashing and the wire payload.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.0
            .borrow()
            .shape
            .as_ref()
            .is_some_and(|s| s.is_ignored(name))
    }

    /// Insert a wire-sourced attribute, bypassing declared validation.
    ///
    /// Reconstruction must accept records produced before a shape changed,
    /// so declared-kind coercion does not apply here. Alias mapping still
    /// does: legacy wire names land under their current name.
    pub(crate) fn set_reconstructed(&self, name: &str, value: Value) {
        let mut inner = self.0.borrow_mut();
        let name = match &inner.shape {
            Some(shape) => shape.canonical_name(name).to_string(),
            None => name.to_string(),
        };
        inner.attributes.insert(name, value);
    }

    pub(crate) fn mark_detached(&self, name: &str) {
        self.0.borrow_mut().detached.insert(name.to_string());
    }

    pub(crate) fn mark_chunked(&self, name: &str, size: usize) {
        self.0.borrow_mut().chunked.insert(name.to_string(), size);
    }
}

impl fmt::Debug for NodeRef {
    // Deliberately shallow: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("NodeRef")
            .field("type_tag", &inner.type_tag)
            .field("attributes", &inner.attributes.len())
            .field("cached_id", &inner.cached_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AttrKind, TypeRegistry, TypeShape};

    fn registry_with_line() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register(
                TypeShape::builder("Objects.Geometry.Line")
                    .attr("units", AttrKind::Text)
                    .attr("span", AttrKind::Float)
                    .attr("segments", AttrKind::Int)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    // -----------------------------------------------------------------------
    // Name validation
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_names_are_rejected() {
        let node = NodeRef::untyped("Base");
        for bad in ["", "@", "@@wow", "this.is.bad", "super/bad"] {
            let err = node.set(bad, 1i64).unwrap_err();
            assert!(
                matches!(err, GraphError::InvalidAttributeName { ref name, .. } if name == bad),
                "expected InvalidAttributeName for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn valid_name_is_accepted() {
        let node = NodeRef::untyped("Base");
        node.set("imgood", 1i64).unwrap();
        assert_eq!(node.get("imgood"), Some(Value::Int(1)));
    }

    #[test]
    fn detach_prefix_is_stripped_and_recorded() {
        let node = NodeRef::untyped("Base");
        let child = NodeRef::untyped("Base");
        node.set("@material", &child).unwrap();
        assert!(node.is_detached("material"));
        assert!(node.get("material").is_some());
        assert!(node.get("@material").is_none());
    }

    #[test]
    fn chunk_directive_is_parsed() {
        let node = NodeRef::untyped("Base");
        node.set("@(100)vertices", Value::list(0i64..3)).unwrap();
        assert!(node.is_detached("vertices"));
        assert_eq!(node.chunk_size("vertices"), Some(100));
    }

    #[test]
    fn malformed_chunk_directives_fail() {
        let node = NodeRef::untyped("Base");
        for bad in ["@(x)verts", "@(10verts", "@(0)verts", "@()verts"] {
            assert!(
                matches!(
                    node.set(bad, Value::list([1i64])),
                    Err(GraphError::InvalidAttributeName { .. })
                ),
                "expected failure for {bad:?}"
            );
        }
    }

    #[test]
    fn parse_name_directive_forms() {
        assert_eq!(
            parse_attribute_name("plain").unwrap(),
            ParsedName {
                name: "plain".into(),
                detach: false,
                chunk_size: None
            }
        );
        assert_eq!(
            parse_attribute_name("@detached").unwrap(),
            ParsedName {
                name: "detached".into(),
                detach: true,
                chunk_size: None
            }
        );
        assert_eq!(
            parse_attribute_name("@(1000)points").unwrap(),
            ParsedName {
                name: "points".into(),
                detach: true,
                chunk_size: Some(1000)
            }
        );
    }

    // -----------------------------------------------------------------------
    // Declared attribute validation
    // -----------------------------------------------------------------------

    #[test]
    fn declared_attribute_accepts_matching_kind() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        line.set("units", "mm").unwrap();
        assert_eq!(line.get("units"), Some(Value::Text("mm".into())));
    }

    #[test]
    fn declared_attribute_coerces_int_to_float() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        line.set("span", 7i64).unwrap();
        assert_eq!(line.get("span"), Some(Value::Float(7.0)));
    }

    #[test]
    fn declared_attribute_coerces_lossless_float_to_int() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        line.set("segments", 4.0).unwrap();
        assert_eq!(line.get("segments"), Some(Value::Int(4)));

        let err = line.set("segments", 4.5).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
    }

    #[test]
    fn declared_attribute_rejects_wrong_kind() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        let err = line.set("units", 12i64).unwrap_err();
        assert!(matches!(
            err,
            GraphError::TypeMismatch { ref attribute, .. } if attribute == "units"
        ));
    }

    #[test]
    fn dynamic_attributes_are_unchecked() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        // Not declared on the shape: any serializable value goes.
        line.set("annotation", true).unwrap();
        line.set("annotation", "now a string").unwrap();
        assert_eq!(line.get("annotation"), Some(Value::Text("now a string".into())));
    }

    #[test]
    fn null_is_always_accepted() {
        let registry = registry_with_line();
        let line = NodeRef::new("Objects.Geometry.Line", &registry);
        line.set("units", Value::Null).unwrap();
        assert_eq!(line.get("units"), Some(Value::Null));
    }

    // -----------------------------------------------------------------------
    // Identity and sharing
    // -----------------------------------------------------------------------

    #[test]
    fn clones_share_the_same_node() {
        let node = NodeRef::untyped("Base");
        let alias = node.clone();
        alias.set("x", 1i64).unwrap();
        assert_eq!(node.get("x"), Some(Value::Int(1)));
        assert!(NodeRef::same_instance(&node, &alias));
    }

    #[test]
    fn distinct_nodes_are_not_the_same_instance() {
        let a = NodeRef::untyped("Base");
        let b = NodeRef::untyped("Base");
        assert!(!NodeRef::same_instance(&a, &b));
    }

    #[test]
    fn node_value_equality_is_identity() {
        let a = NodeRef::untyped("Base");
        let b = NodeRef::untyped("Base");
        assert_eq!(Value::Node(a.clone()), Value::Node(a.clone()));
        assert_ne!(Value::Node(a), Value::Node(b));
    }

    // -----------------------------------------------------------------------
    // Cached id lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn mutation_invalidates_cached_id() {
        let node = NodeRef::untyped("Base");
        node.set("x", 1i64).unwrap();
        node.store_id(ObjectId::from_bytes(b"fake"));
        assert!(node.id().is_some());
        node.set("x", 2i64).unwrap();
        assert_eq!(node.id(), None);
    }

    #[test]
    fn unknown_tag_falls_back_to_untyped() {
        let registry = TypeRegistry::new();
        let node = NodeRef::new("Never.Registered", &registry);
        assert_eq!(node.type_tag(), "Never.Registered");
        // No declared validation applies.
        node.set("anything", 1.25).unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn names_with_separators_always_fail(
                prefix in "[a-z]{1,5}",
                sep in prop::sample::select(vec!['.', '/']),
                suffix in "[a-z]{1,5}",
            ) {
                let node = NodeRef::untyped("Base");
                let name = format!("{prefix}{sep}{suffix}");
                let rejected = matches!(
                    node.set(&name, 1i64),
                    Err(GraphError::InvalidAttributeName { .. })
                );
                prop_assert!(rejected);
            }

            #[test]
            fn plain_lowercase_names_always_succeed(name in "[a-z][a-z0-9_]{0,10}") {
                let node = NodeRef::untyped("Base");
                prop_assert!(node.set(&name, 1i64).is_ok());
            }
        }
    }
}
