//! The process-wide type registry: tag → shape.
//!
//! A [`TypeShape`] is the per-tag validator table: declared attribute kinds,
//! detach markers, chunk directives, ignored (computed) attributes, and
//! legacy-name aliases. Shapes are declared once per tag and apply uniformly
//! to all instances of that tag. The registry is read-mostly; registrations
//! are serialized behind a write lock, and re-registering a tag with a
//! different shape is rejected.
//!
//! The registry is an explicit instance passed to whoever needs it — there
//! is no ambient global lookup.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::container::{validate_bare_name, Value};
use crate::error::{GraphError, GraphResult};

/// The declared kind of a typed attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Text,
    List,
    Node,
    /// Text restricted to a fixed set of variant names.
    Enum(Vec<String>),
    /// Declared but unchecked.
    Any,
}

impl AttrKind {
    fn describe(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Int => "int".to_string(),
            Self::Float => "float".to_string(),
            Self::Text => "text".to_string(),
            Self::List => "list".to_string(),
            Self::Node => "node".to_string(),
            Self::Enum(variants) => format!("enum of {variants:?}"),
            Self::Any => "any".to_string(),
        }
    }

    /// Validate `value` against this kind, applying the documented narrow
    /// coercions: int↔float (float→int only when lossless) and
    /// text→enum-by-variant-name. `Null` is accepted for every kind.
    pub(crate) fn coerce(
        &self,
        type_tag: &str,
        attribute: &str,
        value: Value,
    ) -> GraphResult<Value> {
        let mismatch = |actual: &Value| GraphError::TypeMismatch {
            type_tag: type_tag.to_string(),
            attribute: attribute.to_string(),
            expected: self.describe(),
            actual: actual.kind_name().to_string(),
        };

        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Any, value) => Ok(value),
            (Self::Bool, v @ Value::Bool(_)) => Ok(v),
            (Self::Int, v @ Value::Int(_)) => Ok(v),
            (Self::Int, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                Ok(Value::Int(f as i64))
            }
            (Self::Float, v @ Value::Float(_)) => Ok(v),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Text, v @ Value::Text(_)) => Ok(v),
            (Self::Enum(variants), Value::Text(s)) => {
                if variants.iter().any(|v| v == &s) {
                    Ok(Value::Text(s))
                } else {
                    Err(mismatch(&Value::Text(s)))
                }
            }
            (Self::List, v @ Value::List(_)) => Ok(v),
            (Self::Node, v @ Value::Node(_)) => Ok(v),
            (_, value) => Err(mismatch(&value)),
        }
    }
}

/// The declared shape of one type tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeShape {
    tag: String,
    declared: BTreeMap<String, AttrKind>,
    detached: BTreeSet<String>,
    chunked: BTreeMap<String, usize>,
    ignored: BTreeSet<String>,
    /// Legacy attribute name → current name.
    aliases: BTreeMap<String, String>,
}

impl TypeShape {
    /// Start building a shape for `tag`.
    pub fn builder(tag: impl Into<String>) -> TypeShapeBuilder {
        TypeShapeBuilder {
            shape: TypeShape {
                tag: tag.into(),
                declared: BTreeMap::new(),
                detached: BTreeSet::new(),
                chunked: BTreeMap::new(),
                ignored: BTreeSet::new(),
                aliases: BTreeMap::new(),
            },
            error: None,
        }
    }

    /// The tag this shape is declared for.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The declared kind of `name`, if typed.
    pub fn declared(&self, name: &str) -> Option<&AttrKind> {
        self.declared.get(name)
    }

    /// Whether `name` is serialized as a separate record. A chunk directive
    /// implies detachment.
    pub fn is_detached(&self, name: &str) -> bool {
        self.detached.contains(name) || self.chunked.contains_key(name)
    }

    /// The chunk size declared for `name`.
    pub fn chunk_size(&self, name: &str) -> Option<usize> {
        self.chunked.get(name).copied()
    }

    /// Whether `name` is a computed attribute excluded from serialization.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    /// Map a possibly-legacy attribute name to its current equivalent.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Builder for [`TypeShape`]. Name validation failures are deferred to
/// [`build`](TypeShapeBuilder::build) so declarations chain fluently.
pub struct TypeShapeBuilder {
    shape: TypeShape,
    error: Option<GraphError>,
}

impl TypeShapeBuilder {
    fn check_name(&mut self, name: &str) {
        if self.error.is_none() {
            if let Err(e) = validate_bare_name(name, name) {
                self.error = Some(e);
            }
        }
    }

    /// Declare a typed attribute.
    pub fn attr(mut self, name: impl Into<String>, kind: AttrKind) -> Self {
        let name = name.into();
        self.check_name(&name);
        self.shape.declared.insert(name, kind);
        self
    }

    /// Mark an attribute as always detached.
    pub fn detach(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.check_name(&name);
        self.shape.detached.insert(name);
        self
    }

    /// Mark an ordered-sequence attribute for chunked detachment.
    pub fn chunked(mut self, name: impl Into<String>, chunk_size: usize) -> Self {
        let name = name.into();
        self.check_name(&name);
        if chunk_size == 0 {
            self.error = Some(GraphError::InvalidAttributeName {
                name,
                reason: "chunk size must be positive".to_string(),
            });
            return self;
        }
        self.shape.chunked.insert(name, chunk_size);
        self
    }

    /// Mark an ordered-sequence attribute for chunked detachment with the
    /// default chunk size.
    pub fn chunked_default(self, name: impl Into<String>) -> Self {
        self.chunked(name, crate::chunk::DEFAULT_CHUNK_SIZE)
    }

    /// Exclude a computed attribute from hashing and the wire payload.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.check_name(&name);
        self.shape.ignored.insert(name);
        self
    }

    /// Map a legacy attribute name to its current equivalent.
    pub fn alias(mut self, legacy: impl Into<String>, current: impl Into<String>) -> Self {
        let legacy = legacy.into();
        let current = current.into();
        self.check_name(&legacy);
        self.check_name(&current);
        self.shape.aliases.insert(legacy, current);
        self
    }

    /// Finish the shape, failing on any invalid declaration.
    pub fn build(self) -> GraphResult<TypeShape> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.shape),
        }
    }
}

/// Registry of type shapes, keyed by tag.
pub struct TypeRegistry {
    shapes: RwLock<HashMap<String, Arc<TypeShape>>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a shape.
    ///
    /// Re-registering an identical shape is a no-op; a tag already bound to
    /// a *different* shape fails with [`GraphError::DuplicateTypeTag`].
    pub fn register(&self, shape: TypeShape) -> GraphResult<Arc<TypeShape>> {
        let mut map = self.shapes.write().expect("lock poisoned");
        if let Some(existing) = map.get(shape.tag()) {
            if **existing == shape {
                return Ok(Arc::clone(existing));
            }
            return Err(GraphError::DuplicateTypeTag(shape.tag().to_string()));
        }
        let tag = shape.tag().to_string();
        let shape = Arc::new(shape);
        map.insert(tag, Arc::clone(&shape));
        Ok(shape)
    }

    /// Look up the shape registered for `tag`.
    pub fn resolve(&self, tag: &str) -> Option<Arc<TypeShape>> {
        self.shapes.read().expect("lock poisoned").get(tag).cloned()
    }

    /// Returns `true` if `tag` has a registered shape.
    pub fn is_registered(&self, tag: &str) -> bool {
        self.shapes.read().expect("lock poisoned").contains_key(tag)
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.shapes.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.shapes.read().expect("lock poisoned").is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("registered", &self.len())
            .finish()
    }
}
