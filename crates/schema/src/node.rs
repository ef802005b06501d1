//! Schema node tree
//!
//! The schema is a closed enum over a small set of node kinds: primitive
//! leaves, structural nodes (object/array), modifier wrappers
//! (optional/nullable/default) and a few pass-through kinds (enum, literal,
//! union). Keeping the set closed means every consumer — the validator, the
//! coercing transformer, the form decoder — is an exhaustive `match`, and a
//! new node kind shows up as a compile error in each of them.

use serde_json::Value;

/// Format constraint for string leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uuid,
    DateTime,
}

/// String leaf with optional format and length constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    pub coerce: bool,
    pub format: Option<StringFormat>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl StringSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    pub fn into_schema(self) -> Schema {
        Schema::String(self)
    }
}

/// Floating-point number leaf with optional range constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub coerce: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn into_schema(self) -> Schema {
        Schema::Number(self)
    }
}

/// Integer leaf: rejects values with a fractional part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerSchema {
    pub coerce: bool,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntegerSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn into_schema(self) -> Schema {
        Schema::Integer(self)
    }
}

/// One named field of an object schema. Required unless the schema is
/// wrapped in [`Schema::Optional`] or [`Schema::WithDefault`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub name: String,
    pub schema: Schema,
}

/// A schema node. See the module docs for the taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String(StringSchema),
    Number(NumberSchema),
    Integer(IntegerSchema),
    Boolean { coerce: bool },
    /// RFC 3339 date-time carried as a string on the wire.
    Date { coerce: bool },
    Literal(Value),
    Enum(Vec<String>),
    Union(Vec<Schema>),
    Object(Vec<ObjectField>),
    Array(Box<Schema>),
    Optional(Box<Schema>),
    Nullable(Box<Schema>),
    WithDefault { inner: Box<Schema>, default: Value },
    /// Accepts any value unchanged.
    Unknown,
    /// Accepts absence; used for endpoints with no response body.
    Void,
}

impl Schema {
    pub fn string() -> Self {
        Schema::String(StringSchema::new())
    }

    pub fn number() -> Self {
        Schema::Number(NumberSchema::new())
    }

    pub fn integer() -> Self {
        Schema::Integer(IntegerSchema::new())
    }

    pub fn boolean() -> Self {
        Schema::Boolean { coerce: false }
    }

    pub fn date() -> Self {
        Schema::Date { coerce: false }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn enumeration<S: Into<String>>(variants: impl IntoIterator<Item = S>) -> Self {
        Schema::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn union(variants: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Union(variants.into_iter().collect())
    }

    pub fn object<S: Into<String>>(fields: impl IntoIterator<Item = (S, Schema)>) -> Self {
        Schema::Object(
            fields.into_iter().map(|(name, schema)| ObjectField { name: name.into(), schema }).collect(),
        )
    }

    pub fn array(element: Schema) -> Self {
        Schema::Array(Box::new(element))
    }

    pub fn optional(self) -> Self {
        Schema::Optional(Box::new(self))
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable(Box::new(self))
    }

    pub fn default_to(self, default: impl Into<Value>) -> Self {
        Schema::WithDefault { inner: Box::new(self), default: default.into() }
    }

    /// Looks up a field schema on an object node, unwrapping modifier
    /// wrappers first. Returns `None` for non-object nodes.
    pub(crate) fn object_field(&self, name: &str) -> Option<&Schema> {
        match self.unwrapped() {
            Schema::Object(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.schema),
            _ => None,
        }
    }

    /// Strips optional/nullable/default wrappers down to the base node.
    pub(crate) fn unwrapped(&self) -> &Schema {
        let mut node = self;
        loop {
            match node {
                Schema::Optional(inner) | Schema::Nullable(inner) => node = inner,
                Schema::WithDefault { inner, .. } => node = inner,
                _ => return node,
            }
        }
    }

    /// True for leaves that re-parse string input when their coerce flag is
    /// set. The empty-string normalization rules of the form decoder only
    /// apply in front of these.
    pub(crate) fn is_coercible_leaf(&self) -> bool {
        matches!(
            self,
            Schema::String(_)
                | Schema::Number(_)
                | Schema::Integer(_)
                | Schema::Boolean { .. }
                | Schema::Date { .. }
        )
    }
}
