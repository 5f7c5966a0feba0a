//! # Model Types
//!
//! A resource type is described once, at definition time, by a [`ModelType`]: the
//! collection path on the remote side, the name of the primary key attribute, the
//! [`Packer`] that unwraps payloads and the [`Transport`] requests go through. The
//! descriptor is immutable and cheap to clone; every [`Collection`] and [`Record`]
//! of that type shares it.
//!
//! The typed attributes themselves are any struct implementing [`Model`], which is
//! a blanket marker over the serde traits: records are decoded from and encoded to
//! JSON objects.
//!
//! ```rust
//! use restbind::mock::MockTransport;
//! use restbind::{ModelType, QueryParams};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Bike {
//!     #[serde(skip_serializing_if = "Option::is_none")]
//!     id: Option<u64>,
//!     #[serde(default)]
//!     model: String,
//! }
//!
//! let backend = Arc::new(MockTransport::new());
//! let bikes = ModelType::<Bike>::builder("/api/bikes", backend).build();
//!
//! let query = bikes.collection(QueryParams::from([("brand", "trek")]));
//! assert_eq!(query.len(), 0);
//!
//! let bike = bikes.build(Bike { id: None, model: "Slash".into() });
//! assert!(bike.is_new());
//! ```
//!
//! [`Collection`]: crate::collection::Collection
//! [`Record`]: crate::record::Record

use crate::collection::Collection;
use crate::error::RestResult;
use crate::packer::{DefaultPacker, Packer};
use crate::record::Record;
use crate::transport::{QueryParams, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Plain attribute object, as produced by a packer from a raw payload.
pub type Attributes = serde_json::Map<String, Value>;

/// Typed attributes of a resource.
///
/// Implemented automatically for every type with the required serde and
/// threading bounds. `Default` is what a record built without attributes holds.
pub trait Model:
    Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + 'static
{
}

impl<T> Model for T where
    T: Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + 'static
{
}

struct ModelTypeInner<M: Model> {
    path: String,
    primary_key: String,
    packer: Arc<dyn Packer<M>>,
    transport: Arc<dyn Transport>,
}

/// Immutable descriptor of a resource type.
pub struct ModelType<M: Model> {
    inner: Arc<ModelTypeInner<M>>,
}

impl<M: Model> Clone for ModelType<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Model> Debug for ModelType<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("path", &self.inner.path)
            .field("primary_key", &self.inner.primary_key)
            .finish()
    }
}

impl<M: Model> ModelType<M> {
    /// Starts a definition for the resource served at `path`.
    pub fn builder(path: impl Into<String>, transport: Arc<dyn Transport>) -> ModelTypeBuilder<M> {
        ModelTypeBuilder {
            path: path.into(),
            primary_key: "id".to_string(),
            packer: Arc::new(DefaultPacker),
            transport,
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn primary_key(&self) -> &str {
        &self.inner.primary_key
    }

    pub fn packer(&self) -> &Arc<dyn Packer<M>> {
        &self.inner.packer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Builds a standalone record. Nothing is sent and no collection is touched.
    pub fn build(&self, attrs: M) -> Record<M> {
        Record::new(self.clone(), attrs)
    }

    /// Builds a record from a plain attribute object.
    pub fn decode(&self, raw: Attributes) -> RestResult<Record<M>> {
        let attrs: M = serde_json::from_value(Value::Object(raw))?;
        Ok(self.build(attrs))
    }

    /// Creates an empty collection bound to this type with initial query params.
    pub fn collection(&self, params: QueryParams) -> Collection<M> {
        Collection::new(self.clone(), params)
    }

    /// Two handles describe the same definition.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder returned by [`ModelType::builder`].
pub struct ModelTypeBuilder<M: Model> {
    path: String,
    primary_key: String,
    packer: Arc<dyn Packer<M>>,
    transport: Arc<dyn Transport>,
}

impl<M: Model> ModelTypeBuilder<M> {
    /// Replaces the [`DefaultPacker`].
    pub fn packer(mut self, packer: Arc<dyn Packer<M>>) -> Self {
        self.packer = packer;
        self
    }

    /// Attribute holding the server-assigned identifier. Defaults to `"id"`.
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn build(self) -> ModelType<M> {
        ModelType {
            inner: Arc::new(ModelTypeInner {
                path: self.path,
                primary_key: self.primary_key,
                packer: self.packer,
                transport: self.transport,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Bike {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        serial: Option<String>,
        #[serde(default)]
        model: String,
    }

    fn bikes() -> ModelType<Bike> {
        ModelType::builder("/api/bikes", Arc::new(MockTransport::new()))
            .primary_key("serial")
            .build()
    }

    #[test]
    fn builder_applies_definition() {
        let bikes = bikes();
        assert_eq!(bikes.path(), "/api/bikes");
        assert_eq!(bikes.primary_key(), "serial");
        assert!(bikes.ptr_eq(&bikes.clone()));
    }

    #[test]
    fn decode_builds_typed_record() {
        let bikes = bikes();
        let raw = json!({ "serial": "X1", "model": "Slash", "ignored": true });
        let Value::Object(raw) = raw else {
            unreachable!()
        };
        let record = bikes.decode(raw).unwrap();
        assert_eq!(record.attributes().model, "Slash");
        assert_eq!(record.pk().as_deref(), Some("X1"));
    }

    #[test]
    fn decode_rejects_mistyped_attributes() {
        let bikes = bikes();
        let Value::Object(raw) = json!({ "model": 42 }) else {
            unreachable!()
        };
        assert!(matches!(
            bikes.decode(raw),
            Err(crate::error::RestError::Decode(_))
        ));
    }
}
