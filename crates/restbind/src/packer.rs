//! # Packers
//!
//! A packer turns a raw transport payload into plain attribute objects. It is chosen
//! once per [`ModelType`](crate::model::ModelType) and shared, read-only, by every
//! collection and record of that type.
//!
//! - [`DefaultPacker`] takes the payload as-is: an object is the attributes of one
//!   record, an array is the list of items.
//! - [`EnvelopePacker`] reads the payload from a named root property, for APIs that
//!   answer `{ "bike": {..} }` and `{ "bikes": [..], "meta": {..} }`.
//!
//! Custom strategies implement [`Packer`] directly.

use crate::collection::Collection;
use crate::error::{RestError, RestResult};
use crate::model::{Attributes, Model};
use crate::record::Record;
use serde_json::Value;

/// Strategy that unwraps raw payloads into attribute objects.
pub trait Packer<M: Model>: Send + Sync {
    /// Unwraps the payload answered for a single record.
    fn unpack(&self, raw: Value, record: &Record<M>) -> RestResult<Attributes>;

    /// Unwraps the payload answered for a collection listing.
    fn unpack_many(&self, raw: Value, collection: &Collection<M>) -> RestResult<Vec<Attributes>>;
}

/// Pass-through packer used when a model type does not register one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPacker;

impl<M: Model> Packer<M> for DefaultPacker {
    fn unpack(&self, raw: Value, _record: &Record<M>) -> RestResult<Attributes> {
        single(raw)
    }

    fn unpack_many(&self, raw: Value, _collection: &Collection<M>) -> RestResult<Vec<Attributes>> {
        many(raw)
    }
}

/// Packer for payloads wrapped in a root property.
#[derive(Debug, Clone)]
pub struct EnvelopePacker {
    single: String,
    many: String,
}

impl EnvelopePacker {
    /// `single` wraps one record, `many` wraps a listing.
    pub fn new(single: impl Into<String>, many: impl Into<String>) -> Self {
        Self {
            single: single.into(),
            many: many.into(),
        }
    }

    fn open(&self, raw: Value, key: &str) -> RestResult<Value> {
        match raw {
            Value::Object(mut root) => root.remove(key).ok_or_else(|| {
                RestError::PackerContract(format!("missing root property `{}`", key))
            }),
            Value::Null => Ok(Value::Null),
            other => Err(RestError::PackerContract(format!(
                "expected an object wrapping `{}`, got {}",
                key,
                kind_of(&other)
            ))),
        }
    }
}

impl<M: Model> Packer<M> for EnvelopePacker {
    fn unpack(&self, raw: Value, _record: &Record<M>) -> RestResult<Attributes> {
        single(self.open(raw, &self.single)?)
    }

    fn unpack_many(&self, raw: Value, _collection: &Collection<M>) -> RestResult<Vec<Attributes>> {
        many(self.open(raw, &self.many)?)
    }
}

// An empty body (null) unpacks to no attributes, so writes answered with
// `204 No Content` leave the record as it is.
fn single(raw: Value) -> RestResult<Attributes> {
    match raw {
        Value::Object(attrs) => Ok(attrs),
        Value::Null => Ok(Attributes::new()),
        other => Err(RestError::PackerContract(format!(
            "expected an object, got {}",
            kind_of(&other)
        ))),
    }
}

fn many(raw: Value) -> RestResult<Vec<Attributes>> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(attrs) => Ok(attrs),
                other => Err(RestError::PackerContract(format!(
                    "item {} is {}, expected an object",
                    i,
                    kind_of(&other)
                ))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(RestError::PackerContract(format!(
            "expected an array, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
