//! Shape descriptors: what a decode target expects to find on the wire.
//!
//! A [`Shape`] is built once per Rust type (see [`crate::JsonShape`]) and
//! describes the fields a struct declares, or the container it is. Nested
//! shapes are referenced through [`ShapeRef`] so that recursive types resolve
//! lazily instead of being expanded eagerly.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Lazily resolved reference to a nested shape.
///
/// Usually `shape_of::<T>`, which goes through the process-wide cache.
pub type ShapeRef = fn() -> Arc<Shape>;

/// Description of a decode target.
#[derive(Clone)]
pub struct Shape {
    label: Cow<'static, str>,
    kind: ShapeKind,
}

/// Container kind of a [`Shape`].
#[derive(Clone)]
#[non_exhaustive]
pub enum ShapeKind {
    /// Closed set of named fields. Keys outside the set are unknown.
    Struct(StructShape),
    /// Open mapping: every key is legal, values follow `values`.
    Map { values: ShapeRef },
    /// Ordered list whose elements follow `element`.
    Sequence { element: ShapeRef },
    /// Fixed-length array whose items follow `elements` by position.
    Tuple { elements: Vec<ShapeRef> },
    /// Optional, pointer or newtype wrapper around `inner`.
    Wrapped { inner: ShapeRef },
    /// Terminal value; nothing below it is inspected.
    Scalar,
}

impl Shape {
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>, kind: ShapeKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }

    #[must_use]
    pub fn scalar(label: impl Into<Cow<'static, str>>) -> Self {
        Self::new(label, ShapeKind::Scalar)
    }

    #[must_use]
    pub fn structure(label: impl Into<Cow<'static, str>>, fields: StructShape) -> Self {
        Self::new(label, ShapeKind::Struct(fields))
    }

    #[must_use]
    pub fn map(label: impl Into<Cow<'static, str>>, values: ShapeRef) -> Self {
        Self::new(label, ShapeKind::Map { values })
    }

    #[must_use]
    pub fn sequence(label: impl Into<Cow<'static, str>>, element: ShapeRef) -> Self {
        Self::new(label, ShapeKind::Sequence { element })
    }

    #[must_use]
    pub fn tuple(label: impl Into<Cow<'static, str>>, elements: Vec<ShapeRef>) -> Self {
        Self::new(label, ShapeKind::Tuple { elements })
    }

    #[must_use]
    pub fn wrapped(label: impl Into<Cow<'static, str>>, inner: ShapeRef) -> Self {
        Self::new(label, ShapeKind::Wrapped { inner })
    }

    /// Human-readable identity of the target type, e.g. `Item` or `Vec<Item>`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ShapeKind::Struct(_) => "struct",
            ShapeKind::Map { .. } => "map",
            ShapeKind::Sequence { .. } => "sequence",
            ShapeKind::Tuple { .. } => "tuple",
            ShapeKind::Wrapped { .. } => "wrapped",
            ShapeKind::Scalar => "scalar",
        };
        f.debug_struct("Shape")
            .field("label", &self.label)
            .field("kind", &kind)
            .finish()
    }
}

static ANY: LazyLock<Arc<Shape>> = LazyLock::new(|| Arc::new(Shape::scalar("any")));

/// Shape that accepts any value and is never inspected further.
#[must_use]
pub fn any() -> Arc<Shape> {
    Arc::clone(&ANY)
}

/// Declared fields of a struct target, in declaration order.
#[derive(Clone, Default)]
pub struct StructShape {
    fields: Vec<Field>,
    flattened: Vec<ShapeRef>,
}

impl StructShape {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a shape whose keys are merged into this struct's key space.
    #[must_use]
    pub fn flatten(mut self, shape: ShapeRef) -> Self {
        self.flattened.push(shape);
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Finds the nested shape that `key` decodes into, or `None` when no
    /// visible field claims it.
    ///
    /// Declared fields win over flattened shapes. A flattened map or opaque
    /// value accepts every key.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<ShapeRef> {
        if let Some(field) = self.fields.iter().find(|field| field.matches(key)) {
            return Some(field.shape);
        }
        self.flattened
            .iter()
            .find_map(|flattened| resolve_flattened(&flattened(), key))
    }
}

fn resolve_flattened(shape: &Shape, key: &str) -> Option<ShapeRef> {
    match shape.kind() {
        ShapeKind::Struct(fields) => fields.resolve(key),
        ShapeKind::Map { values } => Some(*values),
        ShapeKind::Wrapped { inner } => resolve_flattened(&inner(), key),
        ShapeKind::Scalar => Some(any),
        ShapeKind::Sequence { .. } | ShapeKind::Tuple { .. } => None,
    }
}

/// A struct field and the wire keys it accepts.
#[derive(Clone)]
pub struct Field {
    name: Cow<'static, str>,
    rename: Option<Cow<'static, str>>,
    aliases: Vec<Cow<'static, str>>,
    omitted: bool,
    shape: ShapeRef,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, shape: ShapeRef) -> Self {
        Self {
            name: name.into(),
            rename: None,
            aliases: Vec::new(),
            omitted: false,
            shape,
        }
    }

    /// Sets the explicit wire key.
    #[must_use]
    pub fn rename(mut self, wire_name: impl Into<Cow<'static, str>>) -> Self {
        self.rename = Some(wire_name.into());
        self
    }

    /// Adds another accepted wire key.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<Cow<'static, str>>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Marks the field as never read from the wire.
    ///
    /// An omitted field claims no key, not even its own name.
    #[must_use]
    pub fn omit(mut self) -> Self {
        self.omitted = true;
        self
    }

    /// Declared name of the field.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key the field is read from: the rename when present, otherwise the
    /// declared name.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn is_omitted(&self) -> bool {
        self.omitted
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        !self.omitted && (self.wire_name() == key || self.aliases.iter().any(|alias| alias == key))
    }

    #[must_use]
    pub fn shape(&self) -> ShapeRef {
        self.shape
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("rename", &self.rename)
            .field("aliases", &self.aliases)
            .field("omitted", &self.omitted)
            .field("shape", &(self.shape)().label())
            .finish()
    }
}
