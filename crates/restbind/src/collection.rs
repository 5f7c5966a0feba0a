//! # Collections
//!
//! A [`Collection`] is the ordered, observable mirror of a remote resource listing.
//! It owns the sequence of [`Record`]s plus the state of the fetch cycle that
//! populates it.
//!
//! ## Fetch cycles
//!
//! `fetch`, `refresh` and `reset` drive a small state machine ([`FetchStatus`]):
//!
//! ```text
//!            fetch / refresh                  response (current generation)
//!   Idle ─────────────────────▶ Fetching ─────────────────────────────▶ Resolved
//!    ▲                            │  ▲                                 │ Failed
//!    │ reset                      │  │ refresh (new generation)        │
//!    └────────────────────────────┘  └─────────────────────────────────┘
//! ```
//!
//! Every cycle is tagged with a generation number. Only the response of the
//! current generation is applied; a response that arrives after `reset` or
//! `refresh` bumped the generation is dropped without touching the items, the
//! status or the observers. There is no transport-level cancellation: the stale
//! request may still complete, its payload is simply discarded.
//!
//! - `fetch` appends: items are only touched when the response arrives.
//! - `reset` clears the items right away and abandons the in-flight cycle.
//! - `refresh` is `reset` followed by `fetch`, applied atomically, so issuing it
//!   several times in a row leaves exactly the last response in the collection.
//!
//! A `fetch` issued while a cycle is in flight does not send a second request.
//! Its params are merged into the collection's query, which the in-flight cycle
//! reads when it dispatches and every later cycle reuses.
//!
//! The methods that start a cycle return immediately (they are chainable) and
//! spawn the request on the current Tokio runtime. [`Collection::wait`] is the
//! async result of the newest cycle.
//!
//! ## Ordering guarantees
//!
//! On success the payload is unwrapped by the model's packer, the records go
//! through [`Collection::feed`]'s append path (which refuses a superseded
//! generation), the status flips to `Resolved`, and only then is `after-fetch`
//! emitted. Observers never see `resolved` before the data, and `wait` returns
//! only after the `after-fetch` handlers have run.

use crate::error::{RestError, RestResult};
use crate::events::{Event, EventBus, EventKind, ListenerId};
use crate::model::{Attributes, Model, ModelType};
use crate::record::Record;
use crate::transport::{QueryParams, Request};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

/// Phase of the fetch-family cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    Resolved,
    Failed,
}

struct CollectionState<M: Model> {
    items: Vec<Record<M>>,
    status: FetchStatus,
    generation: u64,
    query: QueryParams,
    last_error: Option<RestError>,
    // Newest generation whose settle events have been delivered.
    announced: u64,
}

struct Shared<M: Model> {
    model: ModelType<M>,
    state: Mutex<CollectionState<M>>,
    events: EventBus<M>,
    settled: Notify,
}

/// Ordered collection of records bound to a remote listing.
///
/// Cloning yields another handle to the same collection.
pub struct Collection<M: Model> {
    inner: Arc<Shared<M>>,
}

impl<M: Model> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Collection")
            .field("resource", &self.inner.model.path())
            .field("len", &state.items.len())
            .field("status", &state.status)
            .field("generation", &state.generation)
            .field("query", &state.query)
            .finish()
    }
}

impl<M: Model> Collection<M> {
    pub(crate) fn new(model: ModelType<M>, query: QueryParams) -> Self {
        Self {
            inner: Arc::new(Shared {
                model,
                state: Mutex::new(CollectionState {
                    items: Vec::new(),
                    status: FetchStatus::Idle,
                    generation: 0,
                    query,
                    last_error: None,
                    announced: 0,
                }),
                events: EventBus::new(),
                settled: Notify::new(),
            }),
        }
    }

    fn resource(&self) -> &str {
        self.inner.model.path()
    }

    // --- Accessors ---

    pub fn model_type(&self) -> &ModelType<M> {
        &self.inner.model
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Record<M>> {
        self.inner.state.lock().items.get(index).cloned()
    }

    /// Snapshot of the current sequence.
    pub fn items(&self) -> Vec<Record<M>> {
        self.inner.state.lock().items.clone()
    }

    /// `true` once the newest fetch-family cycle completed successfully.
    pub fn is_resolved(&self) -> bool {
        self.inner.state.lock().status == FetchStatus::Resolved
    }

    pub fn status(&self) -> FetchStatus {
        self.inner.state.lock().status
    }

    pub fn query_params(&self) -> QueryParams {
        self.inner.state.lock().query.clone()
    }

    /// Tag of the newest cycle. Zero until the first fetch.
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Error of the most recent failed cycle, cleared by the next success.
    pub fn last_error(&self) -> Option<RestError> {
        self.inner.state.lock().last_error.clone()
    }

    /// Two handles refer to the same collection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Events ---

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event<M>) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    // --- Fetch cycle ---

    /// Fetches the listing and appends the result.
    ///
    /// `params` are merged into the collection's query (new values win). Existing
    /// items stay until the response arrives. If a cycle is already in flight no
    /// new request is sent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn fetch(&self, params: QueryParams) -> &Self {
        let generation = {
            let mut state = self.inner.state.lock();
            state.query.merge(&params);
            if state.status == FetchStatus::Fetching {
                debug!(
                    resource = self.resource(),
                    generation = state.generation,
                    query = ?state.query,
                    "Fetch already in flight, params merged"
                );
                return self;
            }
            state.generation += 1;
            state.status = FetchStatus::Fetching;
            state.generation
        };
        debug!(resource = self.resource(), generation, ?params, "Fetch");
        self.dispatch(generation);
        self
    }

    /// Clears the items and abandons the in-flight cycle. Sends nothing.
    pub fn reset(&self) -> &Self {
        let (dropped, generation) = {
            let mut state = self.inner.state.lock();
            let dropped = state.items.len();
            state.items.clear();
            state.generation += 1;
            state.status = FetchStatus::Idle;
            (dropped, state.generation)
        };
        self.inner.settled.notify_waiters();
        info!(resource = self.resource(), dropped, generation, "Reset");
        self
    }

    /// Clears the items and fetches, superseding any in-flight cycle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn refresh(&self, params: QueryParams) -> &Self {
        let (dropped, generation) = {
            let mut state = self.inner.state.lock();
            let dropped = state.items.len();
            state.items.clear();
            state.query.merge(&params);
            state.generation += 1;
            state.status = FetchStatus::Fetching;
            (dropped, state.generation)
        };
        debug!(resource = self.resource(), generation, dropped, ?params, "Refresh");
        self.dispatch(generation);
        self
    }

    /// Resolves when the newest cycle settles.
    ///
    /// A cycle is settled once its `after-fetch` or `after-fetch-error` handlers
    /// have returned. Follows supersession: if the cycle being waited on is
    /// replaced by a newer one, this waits for the newer one. Returns immediately
    /// when nothing is in flight, with the error of the last cycle if it failed.
    pub async fn wait(&self) -> RestResult<()> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.inner.state.lock();
                let announced = state.announced == state.generation;
                match (state.status, &state.last_error) {
                    (FetchStatus::Fetching, _) => {}
                    (FetchStatus::Resolved | FetchStatus::Failed, _) if !announced => {}
                    (FetchStatus::Failed, Some(error)) => return Err(error.clone()),
                    _ => return Ok(()),
                }
            }
            notified.await;
        }
    }

    fn dispatch(&self, generation: u64) {
        let collection = self.clone();
        tokio::spawn(async move { collection.run_cycle(generation).await });
    }

    async fn run_cycle(self, generation: u64) {
        // The query is read at dispatch time so params merged by a `fetch`
        // issued in the meantime are sent.
        let request = {
            let state = self.inner.state.lock();
            if state.generation != generation {
                debug!(
                    resource = self.resource(),
                    generation,
                    current = state.generation,
                    "Superseded before dispatch"
                );
                return;
            }
            Request::get(self.resource(), state.query.clone())
        };

        self.inner.events.emit(&Event::BeforeFetch {
            generation,
            query: request.query.clone(),
        });
        debug!(resource = self.resource(), generation, url = %request.url(), "Sending request");

        let outcome = match self.inner.model.transport().send(request).await {
            Ok(raw) => {
                if self.generation() != generation {
                    self.drop_stale(generation);
                    return;
                }
                match self
                    .unwrap(raw)
                    .and_then(|batch| self.append(batch, Some(generation)))
                {
                    Ok(Some(records)) => Ok(records.len()),
                    Ok(None) => {
                        self.drop_stale(generation);
                        return;
                    }
                    Err(error) => Err(error),
                }
            }
            Err(e) => Err(RestError::from(e)),
        };
        self.settle(generation, outcome);
    }

    /// Flips the status of the current cycle and announces it. The records of a
    /// successful cycle have already been fed.
    fn settle(&self, generation: u64, outcome: RestResult<usize>) {
        let event = {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                drop(state);
                self.drop_stale(generation);
                return;
            }
            match outcome {
                Ok(count) => {
                    state.status = FetchStatus::Resolved;
                    state.last_error = None;
                    info!(
                        resource = self.resource(),
                        generation,
                        count,
                        size = state.items.len(),
                        "Fetched"
                    );
                    Event::AfterFetch { generation, count }
                }
                Err(error) => {
                    state.status = FetchStatus::Failed;
                    state.last_error = Some(error.clone());
                    warn!(resource = self.resource(), generation, error = %error, "Fetch failed");
                    Event::AfterFetchError { generation, error }
                }
            }
        };
        self.inner.events.emit(&event);
        {
            let mut state = self.inner.state.lock();
            state.announced = state.announced.max(generation);
        }
        self.inner.settled.notify_waiters();
    }

    fn drop_stale(&self, generation: u64) {
        debug!(
            resource = self.resource(),
            generation,
            current = self.generation(),
            "Dropping stale response"
        );
    }

    // --- Unwrap / feed pipeline ---

    /// Turns a raw listing payload into attribute objects using the model's packer.
    ///
    /// The fetch path always follows this with [`Collection::feed`]; it is public as
    /// an extension point for callers that receive listings through other means.
    pub fn unwrap(&self, raw: Value) -> RestResult<Vec<Attributes>> {
        self.inner
            .model
            .packer()
            .unpack_many(raw, self)
            .inspect_err(|e| warn!(resource = self.resource(), error = %e, "Unwrap failed"))
    }

    /// Decodes a batch into records and appends them.
    ///
    /// A batch is all-or-nothing: if one object fails to decode nothing is
    /// appended. No `after-add` is emitted per record. Fetch cycles feed their
    /// payload through the same path.
    pub fn feed(&self, batch: Vec<Attributes>) -> RestResult<Vec<Record<M>>> {
        Ok(self.append(batch, None)?.unwrap_or_default())
    }

    /// Appends a decoded batch. With `cycle` set, nothing is appended and `None`
    /// is returned unless that generation is still current.
    fn append(
        &self,
        batch: Vec<Attributes>,
        cycle: Option<u64>,
    ) -> RestResult<Option<Vec<Record<M>>>> {
        let records = self.decode_batch(batch)?;
        let size = {
            let mut state = self.inner.state.lock();
            if cycle.is_some_and(|generation| generation != state.generation) {
                return Ok(None);
            }
            state.items.extend(records.iter().cloned());
            state.items.len()
        };
        debug!(resource = self.resource(), count = records.len(), size, "Fed");
        Ok(Some(records))
    }

    fn decode_batch(&self, batch: Vec<Attributes>) -> RestResult<Vec<Record<M>>> {
        batch
            .into_iter()
            .map(|raw| self.inner.model.decode(raw))
            .collect()
    }

    // --- Membership ---

    /// Builds a record of this collection's type without inserting it.
    pub fn build(&self, attrs: M) -> Record<M> {
        self.inner.model.build(attrs)
    }

    /// Appends `record` and emits `after-add`. Returns its index.
    pub fn add(&self, record: Record<M>) -> usize {
        let index = {
            let mut state = self.inner.state.lock();
            state.items.push(record.clone());
            state.items.len() - 1
        };
        self.added(record, index)
    }

    /// Inserts `record` at `index`, shifting later items right, and emits
    /// `after-add`. An index past the end appends.
    pub fn add_at(&self, record: Record<M>, index: usize) -> usize {
        let index = {
            let mut state = self.inner.state.lock();
            let index = if index > state.items.len() {
                warn!(
                    resource = self.resource(),
                    index,
                    len = state.items.len(),
                    "Insert index out of range, appending"
                );
                state.items.len()
            } else {
                index
            };
            state.items.insert(index, record.clone());
            index
        };
        self.added(record, index)
    }

    fn added(&self, record: Record<M>, index: usize) -> usize {
        info!(resource = self.resource(), index, size = self.len(), "Added");
        self.inner.events.emit(&Event::AfterAdd { record, index });
        index
    }

    /// Removes the first occurrence of `record`.
    ///
    /// Returns the index it held, or `None` (and emits nothing) if it was not a
    /// member. The record itself is not destroyed.
    pub fn remove(&self, record: &Record<M>) -> Option<usize> {
        let (removed, index) = {
            let mut state = self.inner.state.lock();
            let index = state.items.iter().position(|r| r.ptr_eq(record))?;
            (state.items.remove(index), index)
        };
        info!(resource = self.resource(), index, size = self.len(), "Removed");
        self.inner.events.emit(&Event::AfterRemove {
            record: removed,
            index,
        });
        Some(index)
    }

    /// Position of `record` (identity match).
    pub fn index_of(&self, record: &Record<M>) -> Option<usize> {
        self.inner
            .state
            .lock()
            .items
            .iter()
            .position(|r| r.ptr_eq(record))
    }

    /// Position of the first record satisfying `predicate`.
    ///
    /// The predicate runs on a snapshot, outside the collection lock.
    pub fn index_where(&self, predicate: impl Fn(&Record<M>) -> bool) -> Option<usize> {
        self.items().iter().position(predicate)
    }

    // --- Writes ---

    /// Builds a record, POSTs it, and appends it once the server confirms.
    ///
    /// The request is always a POST to the collection path, even when `attrs`
    /// already carry a primary key. The collection is not touched until the
    /// write succeeds. On failure the record is dropped and the error returned;
    /// attributes are never rolled back because nothing is merged unless the
    /// write succeeds.
    #[instrument(skip(self), fields(resource = %self.inner.model.path()))]
    pub async fn create(&self, attrs: M) -> RestResult<Record<M>> {
        let record = self.build(attrs);
        self.inner.events.emit(&Event::BeforeSave {
            record: record.clone(),
        });
        if let Err(error) = record.post().await {
            self.inner.events.emit(&Event::AfterSaveError {
                record,
                error: error.clone(),
            });
            return Err(error);
        }
        self.inner.events.emit(&Event::AfterSave {
            record: record.clone(),
        });
        self.add(record.clone());
        Ok(record)
    }

    /// Destroys `record` remotely, then removes it from this collection.
    #[instrument(skip(self, record), fields(resource = %self.inner.model.path()))]
    pub async fn destroy(&self, record: &Record<M>) -> RestResult<()> {
        record.destroy().await?;
        self.remove(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Bike {
        #[serde(default)]
        model: String,
    }

    fn batch(raw: Value) -> Vec<Attributes> {
        let Value::Array(items) = raw else {
            unreachable!()
        };
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(attrs) => Some(attrs),
                _ => None,
            })
            .collect()
    }

    fn bikes() -> Collection<Bike> {
        ModelType::builder("/api/bikes", Arc::new(MockTransport::new()))
            .build()
            .collection(QueryParams::new())
    }

    #[test]
    fn cycle_feed_is_dropped_once_superseded() {
        let col = bikes();
        col.reset();
        assert_eq!(col.generation(), 1);

        let stale = col.append(batch(json!([{ "model": "Slash" }])), Some(0));
        assert!(matches!(stale, Ok(None)));
        assert!(col.is_empty());

        let current = col
            .append(batch(json!([{ "model": "Reign" }])), Some(1))
            .unwrap()
            .unwrap();
        assert_eq!(current.len(), 1);
        assert!(col.get(0).unwrap().ptr_eq(&current[0]));
    }

    #[test]
    fn public_feed_appends_regardless_of_generation() {
        let col = bikes();
        col.reset().reset();

        let records = col.feed(batch(json!([{ "model": "Slash" }]))).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(col.len(), 1);
    }
}
