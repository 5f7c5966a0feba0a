//! # Mock Transport & Testing Guide
//!
//! [`MockTransport`] implements [`Transport`] entirely in memory. It is modelled on a
//! "flushable backend": requests are *parked* when they are sent and only answered
//! when the test calls [`MockTransport::flush`]. This makes the interleavings that
//! matter for collections reproducible: a test can issue several fetches, assert on
//! the intermediate state, then release every response at once.
//!
//! ## Definitions vs Expectations
//!
//! | | `when` (definition) | `expect` (expectation) |
//! |---|---|---|
//! | **Matches** | any number of requests | exactly one request, in order |
//! | **Body check** | no | optional (`with_body`) |
//! | **Verified by** | never | [`MockTransport::verify`] |
//!
//! Expectations are checked first. Among definitions for the same request the most
//! recent one wins, so a test can redefine a response.
//!
//! ## Example
//!
//! ```rust
//! use restbind::mock::MockTransport;
//! use restbind::{ModelType, Method, QueryParams};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Bike { #[serde(default)] model: String }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(MockTransport::new());
//!     backend
//!         .when(Method::Get, "/api/bikes?brand=trek")
//!         .respond(json!([{ "model": "Slash" }, { "model": "Remedy" }]));
//!
//!     let bikes = ModelType::<Bike>::builder("/api/bikes", backend.clone()).build();
//!     let query = bikes.collection(QueryParams::from([("brand", "trek")]));
//!
//!     query.fetch(QueryParams::new());
//!     assert_eq!(query.len(), 0);
//!
//!     backend.flush().await;
//!     query.wait().await.unwrap();
//!     assert_eq!(query.len(), 2);
//! }
//! ```
//!
//! ## Testing Failure Scenarios
//!
//! Use `fail(status, reason)` instead of `respond(..)` to answer with a transport
//! error. Requests that match nothing make `flush` panic with the offending URL.

use crate::error::TransportError;
use crate::transport::{Method, Request, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Scheduler turns granted to spawned tasks before each flush round.
const SETTLE_YIELDS: usize = 16;

/// Upper bound on flush rounds, in case handlers keep issuing requests.
const MAX_FLUSH_ROUNDS: usize = 32;

type Reply = Result<Value, TransportError>;

struct Definition {
    method: Method,
    url: String,
    reply: Reply,
}

struct Expectation {
    method: Method,
    url: String,
    body: Option<Value>,
    reply: Reply,
}

struct Parked {
    request: Request,
    respond_to: oneshot::Sender<Reply>,
}

#[derive(Default)]
struct MockState {
    definitions: Vec<Definition>,
    expectations: VecDeque<Expectation>,
    parked: Vec<Parked>,
    log: Vec<Request>,
}

/// In-memory transport with flush-controlled responses.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a standing response for `method url`.
    pub fn when(&self, method: Method, url: impl Into<String>) -> DefinitionBuilder<'_> {
        DefinitionBuilder {
            mock: self,
            method,
            url: url.into(),
        }
    }

    /// Expects exactly one `method url` request, in order with other expectations.
    pub fn expect(&self, method: Method, url: impl Into<String>) -> ExpectationBuilder<'_> {
        ExpectationBuilder {
            mock: self,
            method,
            url: url.into(),
            body: None,
        }
    }

    /// Number of requests waiting for a flush.
    pub fn pending(&self) -> usize {
        self.state.lock().parked.len()
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    /// Answers every parked request, including those issued while flushing.
    ///
    /// Spawned tasks are given a few scheduler turns first so that requests they
    /// are about to send get parked. Returns the number of requests answered.
    pub async fn flush(&self) -> usize {
        let mut answered = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            settle().await;
            let parked = std::mem::take(&mut self.state.lock().parked);
            if parked.is_empty() {
                break;
            }
            for Parked {
                request,
                respond_to,
            } in parked
            {
                let reply = self.resolve(&request);
                let _ = respond_to.send(reply);
                answered += 1;
            }
        }
        settle().await;
        answered
    }

    /// Panics if expectations remain unmet.
    pub fn verify(&self) {
        let state = self.state.lock();
        if !state.expectations.is_empty() {
            let remaining: Vec<String> = state
                .expectations
                .iter()
                .map(|e| format!("{} {}", e.method, e.url))
                .collect();
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                remaining.len(),
                remaining
            );
        }
    }

    fn resolve(&self, request: &Request) -> Reply {
        let url = request.url();
        let mut state = self.state.lock();

        let expected = state
            .expectations
            .front()
            .is_some_and(|e| e.method == request.method && e.url == url);
        if expected {
            if let Some(expectation) = state.expectations.pop_front() {
                if let Some(body) = &expectation.body {
                    assert_eq!(
                        request.body.as_ref(),
                        Some(body),
                        "Unexpected body for {} {}",
                        request.method,
                        url
                    );
                }
                return expectation.reply;
            }
        }

        state
            .definitions
            .iter()
            .rev()
            .find(|d| d.method == request.method && d.url == url)
            .map(|d| d.reply.clone())
            .unwrap_or_else(|| panic!("Unexpected request: {} {}", request.method, url))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        let (respond_to, response) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.log.push(request.clone());
            state.parked.push(Parked {
                request,
                respond_to,
            });
        }
        response
            .await
            .map_err(|_| TransportError::network("mock transport dropped the request"))?
    }
}

async fn settle() {
    for _ in 0..SETTLE_YIELDS {
        tokio::task::yield_now().await;
    }
}

/// Builder for `when` definitions.
pub struct DefinitionBuilder<'a> {
    mock: &'a MockTransport,
    method: Method,
    url: String,
}

impl DefinitionBuilder<'_> {
    /// Answers with a 2xx and `payload`.
    pub fn respond(self, payload: Value) {
        self.push(Ok(payload));
    }

    /// Answers with a failure status.
    pub fn fail(self, status: u16, reason: impl Into<String>) {
        self.push(Err(TransportError::status(status, reason)));
    }

    fn push(self, reply: Reply) {
        self.mock.state.lock().definitions.push(Definition {
            method: self.method,
            url: self.url,
            reply,
        });
    }
}

/// Builder for `expect` expectations.
pub struct ExpectationBuilder<'a> {
    mock: &'a MockTransport,
    method: Method,
    url: String,
    body: Option<Value>,
}

impl ExpectationBuilder<'_> {
    /// The request body must equal `body`.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn respond(self, payload: Value) {
        self.push(Ok(payload));
    }

    pub fn fail(self, status: u16, reason: impl Into<String>) {
        self.push(Err(TransportError::status(status, reason)));
    }

    fn push(self, reply: Reply) {
        self.mock.state.lock().expectations.push_back(Expectation {
            method: self.method,
            url: self.url,
            body: self.body,
            reply,
        });
    }
}
