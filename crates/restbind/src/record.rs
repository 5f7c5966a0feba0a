//! # Records
//!
//! A [`Record`] is one instance of a resource: typed attributes plus its own
//! [`EventBus`]. Records have reference identity. Cloning a `Record` clones the
//! handle, not the instance, and [`Record::ptr_eq`] is how collections find them.
//! Two decodes of the same server entity are two distinct records.
//!
//! Membership in a collection is tracked by the collection only; removing a record
//! from a collection leaves the record itself untouched.

use crate::error::{RestError, RestResult};
use crate::events::{Event, EventBus, EventKind, ListenerId};
use crate::model::{Attributes, Model, ModelType};
use crate::transport::Request;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

struct RecordInner<M: Model> {
    model: ModelType<M>,
    attrs: Mutex<M>,
    events: EventBus<M>,
}

/// Handle to a single resource instance.
pub struct Record<M: Model> {
    inner: Arc<RecordInner<M>>,
}

impl<M: Model> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Record");
        s.field("resource", &self.inner.model.path());
        match self.inner.attrs.try_lock() {
            Some(attrs) => s.field("attrs", &*attrs),
            None => s.field("attrs", &"<locked>"),
        };
        s.finish()
    }
}

impl<M: Model> Record<M> {
    pub(crate) fn new(model: ModelType<M>, attrs: M) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                model,
                attrs: Mutex::new(attrs),
                events: EventBus::new(),
            }),
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn model_type(&self) -> &ModelType<M> {
        &self.inner.model
    }

    /// Snapshot of the typed attributes.
    pub fn attributes(&self) -> M {
        self.inner.attrs.lock().clone()
    }

    /// Runs `f` on a snapshot of the attributes.
    ///
    /// The lock is released before `f` runs, so `f` may call back into this
    /// record.
    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        let attrs = self.attributes();
        f(&attrs)
    }

    /// Local mutation; nothing is sent.
    ///
    /// `f` edits a copy outside the lock, which then replaces the attributes.
    /// Two concurrent updates of the same record are last-writer-wins.
    pub fn update(&self, f: impl FnOnce(&mut M)) {
        let mut attrs = self.attributes();
        f(&mut attrs);
        self.set(attrs);
    }

    pub fn set(&self, attrs: M) {
        *self.inner.attrs.lock() = attrs;
    }

    /// Encodes the attributes as a plain object.
    pub fn to_raw(&self) -> RestResult<Attributes> {
        match serde_json::to_value(&*self.inner.attrs.lock())? {
            Value::Object(raw) => Ok(raw),
            other => Err(RestError::Decode(format!(
                "model encodes to {} instead of an object",
                other
            ))),
        }
    }

    /// Merges a plain attribute object into the typed attributes.
    ///
    /// Keys in `raw` override the current values. If the merged object does not
    /// decode into `M` the attributes are left unchanged.
    pub fn merge(&self, raw: Attributes) -> RestResult<()> {
        if raw.is_empty() {
            return Ok(());
        }
        let mut attrs = self.inner.attrs.lock();
        let mut merged = match serde_json::to_value(&*attrs)? {
            Value::Object(current) => current,
            _ => Attributes::new(),
        };
        merged.extend(raw);
        *attrs = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }

    /// Runs a single-record payload through the model's packer and merges it.
    pub fn unwrap(&self, raw: Value) -> RestResult<()> {
        let attrs = self.inner.model.packer().unpack(raw, self)?;
        self.merge(attrs)
    }

    /// Primary key value, if the server assigned one.
    pub fn pk(&self) -> Option<String> {
        let attrs = self.to_raw().ok()?;
        match attrs.get(self.inner.model.primary_key())? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn is_new(&self) -> bool {
        self.pk().is_none()
    }

    /// Member URL (`path/pk`) of a persisted record.
    pub fn url(&self) -> Option<String> {
        self.pk()
            .map(|pk| format!("{}/{}", self.inner.model.path().trim_end_matches('/'), pk))
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event<M>) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    /// Persists the record: POST to the collection path when new, PUT to the
    /// member URL otherwise. The confirmed payload is merged back.
    #[instrument(skip(self), fields(resource = %self.inner.model.path()))]
    pub async fn save(&self) -> RestResult<()> {
        self.inner.events.emit(&Event::BeforeSave {
            record: self.clone(),
        });
        match self.write().await {
            Ok(()) => {
                self.inner.events.emit(&Event::AfterSave {
                    record: self.clone(),
                });
                Ok(())
            }
            Err(error) => {
                self.inner.events.emit(&Event::AfterSaveError {
                    record: self.clone(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Deletes the record on the remote side.
    #[instrument(skip(self), fields(resource = %self.inner.model.path()))]
    pub async fn destroy(&self) -> RestResult<()> {
        let url = self.url().ok_or(RestError::NotPersisted)?;
        self.inner.events.emit(&Event::BeforeDestroy {
            record: self.clone(),
        });
        debug!(%url, "Sending request");
        self.inner
            .model
            .transport()
            .send(Request::delete(url.clone()))
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "Destroy failed");
                RestError::from(e)
            })?;
        info!(%url, "Destroyed");
        self.inner.events.emit(&Event::AfterDestroy {
            record: self.clone(),
        });
        Ok(())
    }

    /// POST when new, PUT to the member URL otherwise.
    async fn write(&self) -> RestResult<()> {
        let body = Value::Object(self.to_raw()?);
        let request = match self.url() {
            Some(url) => Request::put(url, body),
            None => Request::post(self.inner.model.path(), body),
        };
        self.send_write(request).await
    }

    /// POSTs the attributes to the collection path, whatever they contain.
    pub(crate) async fn post(&self) -> RestResult<()> {
        let body = Value::Object(self.to_raw()?);
        self.send_write(Request::post(self.inner.model.path(), body))
            .await
    }

    /// Sends a write and merges the confirmed payload. No events.
    ///
    /// Nothing is merged unless the transport reports success, so a failed write
    /// leaves the attributes exactly as they were before the call.
    async fn send_write(&self, request: Request) -> RestResult<()> {
        debug!(method = %request.method, url = %request.url(), body = ?request.body, "Sending request");

        let raw = match self.inner.model.transport().send(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Write failed");
                return Err(e.into());
            }
        };
        self.unwrap(raw)?;
        info!(pk = ?self.pk(), "Saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::Method;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Bike {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    }

    fn setup() -> (Arc<MockTransport>, ModelType<Bike>) {
        let backend = Arc::new(MockTransport::new());
        let bikes = ModelType::builder("/api/bikes", backend.clone()).build();
        (backend, bikes)
    }

    fn teocali() -> Bike {
        Bike {
            id: None,
            model: Some("Teocali".into()),
        }
    }

    #[test]
    fn identity_is_per_instance() {
        let (_, bikes) = setup();
        let a = bikes.build(teocali());
        let b = bikes.build(teocali());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.attributes(), b.attributes());
    }

    #[test]
    fn merge_overrides_and_keeps_state_on_decode_failure() {
        let (_, bikes) = setup();
        let bike = bikes.build(teocali());

        let Value::Object(raw) = json!({ "id": 4 }) else {
            unreachable!()
        };
        bike.merge(raw).unwrap();
        assert_eq!(bike.attributes().id, Some(4));
        assert_eq!(bike.url().as_deref(), Some("/api/bikes/4"));

        let Value::Object(bad) = json!({ "id": "four" }) else {
            unreachable!()
        };
        assert!(bike.merge(bad).is_err());
        assert_eq!(bike.attributes().id, Some(4));
    }

    #[test]
    fn closures_may_call_back_into_the_record() {
        let (_, bikes) = setup();
        let bike = bikes.build(Bike {
            id: Some(3),
            model: Some("Teocali".into()),
        });

        let url = bike.with(|b| (b.model.clone(), bike.url()));
        assert_eq!(url, (Some("Teocali".into()), Some("/api/bikes/3".into())));

        bike.update(|b| {
            b.model = bike.pk();
        });
        assert_eq!(bike.attributes().model.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn save_posts_new_records_then_puts() {
        let (backend, bikes) = setup();
        backend
            .expect(Method::Post, "/api/bikes")
            .with_body(json!({ "model": "Teocali" }))
            .respond(json!({ "id": 1 }));
        backend
            .expect(Method::Put, "/api/bikes/1")
            .with_body(json!({ "id": 1, "model": "Teocali" }))
            .respond(Value::Null);

        let bike = bikes.build(teocali());
        let saves = Arc::new(AtomicUsize::new(0));
        let counter = saves.clone();
        bike.on(EventKind::AfterSave, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let task = tokio::spawn({
            let bike = bike.clone();
            async move {
                bike.save().await?;
                bike.save().await
            }
        });
        backend.flush().await;
        backend.flush().await;
        task.await.unwrap().unwrap();

        assert_eq!(bike.attributes().id, Some(1));
        assert_eq!(saves.load(Ordering::SeqCst), 2);
        backend.verify();
    }

    #[tokio::test]
    async fn failed_save_does_not_touch_attributes() {
        let (backend, bikes) = setup();
        backend
            .expect(Method::Post, "/api/bikes")
            .fail(422, "Unprocessable Entity");

        let bike = bikes.build(teocali());
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        bike.on(EventKind::AfterSaveError, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let task = tokio::spawn({
            let bike = bike.clone();
            async move { bike.save().await }
        });
        backend.flush().await;
        let err = task.await.unwrap().unwrap_err();

        assert!(matches!(err, RestError::Transport(ref e) if e.status == Some(422)));
        assert_eq!(bike.attributes(), teocali());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn destroy_requires_a_primary_key() {
        let (_, bikes) = setup();
        let bike = bikes.build(teocali());
        assert_eq!(bike.destroy().await, Err(RestError::NotPersisted));
    }
}
