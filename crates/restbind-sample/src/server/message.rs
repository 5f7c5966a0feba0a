//! # Server Messages
//!
//! Requests understood by the [`ResourceServer`](super::ResourceServer). The
//! transport half routes each REST call into one of these variants; the actor
//! answers through the embedded oneshot sender.

use restbind::{Attributes, QueryParams, TransportError};
use serde_json::Value;
use tokio::sync::oneshot;

/// One-shot response channel carrying the raw payload or a status failure.
pub type Response = oneshot::Sender<Result<Value, TransportError>>;

#[derive(Debug)]
pub enum ServerRequest {
    /// `GET path?query`: every stored object whose fields match `query`.
    List {
        query: QueryParams,
        respond_to: Response,
    },
    /// `GET path/id`
    Get { id: u64, respond_to: Response },
    /// `POST path`: store `body` under a fresh id.
    Create {
        body: Attributes,
        respond_to: Response,
    },
    /// `PUT path/id`: replace the stored object.
    Update {
        id: u64,
        body: Attributes,
        respond_to: Response,
    },
    /// `DELETE path/id`
    Delete { id: u64, respond_to: Response },
    /// Stops the run loop even while transports are still alive.
    Shutdown,
}
