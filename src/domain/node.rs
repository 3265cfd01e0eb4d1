//! Node contract: the capability every graph element implements.

use std::fmt;
use std::hash::Hash;

use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Requirements on a node key.
///
/// The `Display` text identifies the node inside relation partitions, so two
/// distinct keys of one type must never render to the same text.
pub trait BomKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + 'static {}

impl<K> BomKey for K where K: Clone + Eq + Hash + fmt::Display + fmt::Debug + 'static {}

/// A business object that can live in an object pool and in the relation index.
///
/// Relations are not part of a node: its `save`/`load` hooks only carry the
/// node's own scalar state, the tree walker restores the links.
pub trait BomNode: fmt::Debug + Sized + 'static {
    type Key: BomKey;

    /// Identifies the pool and the relation partitions of this type.
    const TYPE_TAG: &'static str;

    fn key(&self) -> &Self::Key;

    /// Display form of the key. Relations always use `key().to_string()`.
    fn describe_key(&self) -> String {
        self.key().to_string()
    }

    /// Human readable representation, used by dumps and tree displays.
    fn describe(&self) -> String {
        self.describe_key()
    }

    fn save(&self, out: &mut FieldWriter);

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self>;
}

/// Object-safe view on a node, used where the static type is unknown.
pub trait BomObject {
    fn tag(&self) -> &'static str;
    fn key_text(&self) -> String;
    fn description(&self) -> String;
    fn write_fields(&self, out: &mut FieldWriter);
}

impl<T: BomNode> BomObject for T {
    fn tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn key_text(&self) -> String {
        self.key().to_string()
    }

    fn description(&self) -> String {
        self.describe()
    }

    fn write_fields(&self, out: &mut FieldWriter) {
        self.save(out)
    }
}

/// Type-erased reference to a node: type tag, key text and arena slot.
///
/// Never owns the node; resolving it against a store whose node was destroyed
/// yields nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    tag: &'static str,
    key: String,
    index: Index,
}

impl NodeRef {
    pub(crate) fn new(tag: &'static str, key: String, index: Index) -> Self {
        Self { tag, key, index }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn index(&self) -> Index {
        self.index
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.tag, self.key)
    }
}

/// A single scalar value on the field channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Text(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl Field {
    fn kind(&self) -> &'static str {
        match self {
            Field::Text(_) => "text",
            Field::Int(_) => "int",
            Field::Uint(_) => "uint",
            Field::Float(_) => "float",
            Field::Bool(_) => "bool",
        }
    }
}

/// Write side of the field channel.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldWriter {
    fields: Vec<Field>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&mut self, value: impl Into<String>) -> &mut Self {
        self.fields.push(Field::Text(value.into()));
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.fields.push(Field::Int(value));
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.fields.push(Field::Uint(value));
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.fields.push(Field::Float(value));
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.fields.push(Field::Bool(value));
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

/// Read side of the field channel.
///
/// Every mismatch is reported as `CorruptStream` at the record the fields came from.
#[derive(Debug)]
pub struct FieldReader<'a> {
    fields: &'a [Field],
    pos: usize,
    record: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a [Field], record: usize) -> Self {
        Self {
            fields,
            pos: 0,
            record,
        }
    }

    pub fn record(&self) -> usize {
        self.record
    }

    /// Builds a `CorruptStream` error for the current record.
    pub fn error(&self, reason: impl Into<String>) -> DomainError {
        DomainError::corrupt(self.record, reason)
    }

    fn next(&mut self, expected: &str) -> DomainResult<&'a Field> {
        let field = self.fields.get(self.pos).ok_or_else(|| {
            self.error(format!("missing {} field at position {}", expected, self.pos))
        })?;
        self.pos += 1;
        Ok(field)
    }

    fn mismatch(&self, expected: &str, found: &Field) -> DomainError {
        self.error(format!(
            "expected {} field at position {}, found {}",
            expected,
            self.pos - 1,
            found.kind()
        ))
    }

    pub fn read_str(&mut self) -> DomainResult<String> {
        match self.next("text")? {
            Field::Text(v) => Ok(v.clone()),
            other => Err(self.mismatch("text", other)),
        }
    }

    pub fn read_i64(&mut self) -> DomainResult<i64> {
        match self.next("int")? {
            Field::Int(v) => Ok(*v),
            other => Err(self.mismatch("int", other)),
        }
    }

    pub fn read_u64(&mut self) -> DomainResult<u64> {
        match self.next("uint")? {
            Field::Uint(v) => Ok(*v),
            other => Err(self.mismatch("uint", other)),
        }
    }

    pub fn read_f64(&mut self) -> DomainResult<f64> {
        match self.next("float")? {
            Field::Float(v) => Ok(*v),
            other => Err(self.mismatch("float", other)),
        }
    }

    pub fn read_bool(&mut self) -> DomainResult<bool> {
        match self.next("bool")? {
            Field::Bool(v) => Ok(*v),
            other => Err(self.mismatch("bool", other)),
        }
    }

    /// Fails if fields are left unread.
    pub fn finish(&self) -> DomainResult<()> {
        if self.pos < self.fields.len() {
            return Err(self.error(format!(
                "{} unread field(s) after position {}",
                self.fields.len() - self.pos,
                self.pos
            )));
        }
        Ok(())
    }
}
