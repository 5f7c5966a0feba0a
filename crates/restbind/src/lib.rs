//! # restbind
//!
//! The synchronization core of a client-side REST resource binding library.
//!
//! A [`Collection`] keeps an in-memory, ordered list of [`Record`]s consistent with a
//! remote resource listing across asynchronous fetch, refresh and reset cycles,
//! local mutations and server-confirmed writes. The network call itself is an
//! external collaborator behind the [`Transport`] trait; the hard part this crate
//! owns is the state machine deciding when data is replaced or appended, which
//! response wins when requests overlap, and when observers are told.
//!
//! ## Architecture Overview
//!
//! 1. **Definition Layer** ([`ModelType`]) - path, primary key, [`Packer`] and
//!    [`Transport`] of a resource type, fixed once and shared.
//! 2. **Data Layer** ([`Record`], [`Collection`]) - typed instances and the ordered,
//!    observable sequence that mirrors the listing.
//! 3. **Observation Layer** ([`EventBus`]) - typed, per-instance observers keyed by
//!    [`EventKind`].
//!
//! ## Quick Tour
//!
//! ```rust
//! use restbind::mock::MockTransport;
//! use restbind::{EventKind, Method, ModelType, QueryParams};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Bike {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     id: Option<u64>,
//!     #[serde(default)]
//!     model: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(MockTransport::new());
//!     backend
//!         .when(Method::Get, "/api/bikes?brand=trek")
//!         .respond(json!([{ "model": "Slash" }, { "model": "Remedy" }]));
//!     backend
//!         .when(Method::Get, "/api/bikes?brand=giant")
//!         .respond(json!([{ "model": "Reign" }]));
//!
//!     let bikes = ModelType::<Bike>::builder("/api/bikes", backend.clone()).build();
//!     let query = bikes.collection(QueryParams::from([("brand", "trek")]));
//!     query.on(EventKind::AfterFetch, |_| println!("fetched"));
//!
//!     // `fetch` appends...
//!     query.fetch(QueryParams::new());
//!     backend.flush().await;
//!     query.wait().await.unwrap();
//!     assert_eq!(query.len(), 2);
//!
//!     // ...`refresh` replaces.
//!     query.refresh(QueryParams::from([("brand", "giant")]));
//!     backend.flush().await;
//!     query.wait().await.unwrap();
//!     assert_eq!(query.len(), 1);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! All state mutation is short and synchronous behind a per-collection lock; the
//! only suspension points are transport calls (`fetch`, `refresh`, `create`,
//! `save`, `destroy`). Fetch-family requests are tagged with a generation number and
//! only the newest generation is applied. `create` calls are independent of each
//! other and of the fetch cycle. Event handlers run after the lock is released.
//!
//! ## Testing
//!
//! [`mock::MockTransport`] parks requests until the test flushes them, which makes
//! overlapping cycles reproducible. See the [`mock`] module for the full API.

pub mod collection;
pub mod error;
pub mod events;
pub mod mock;
pub mod model;
pub mod packer;
pub mod record;
pub mod tracing;
pub mod transport;

pub use collection::{Collection, FetchStatus};
pub use error::{RestError, RestResult, TransportError};
pub use events::{Event, EventBus, EventKind, ListenerId};
pub use model::{Attributes, Model, ModelType, ModelTypeBuilder};
pub use packer::{DefaultPacker, EnvelopePacker, Packer};
pub use record::Record;
pub use transport::{Method, QueryParams, Request, Transport};
