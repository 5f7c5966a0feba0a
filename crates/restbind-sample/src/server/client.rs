//! # Server Transport
//!
//! Client half of the [`ResourceServer`](super::ResourceServer). It maps each
//! [`Request`] onto a [`ServerRequest`] and forwards it over the channel, so
//! routing errors (unknown paths, unsupported methods) never reach the actor.

use super::message::{Response, ServerRequest};
use async_trait::async_trait;
use restbind::{Attributes, Method, Request, Transport, TransportError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Route {
    Collection,
    Member(u64),
}

/// A cloneable [`Transport`] backed by a running `ResourceServer`.
#[derive(Clone)]
pub struct ServerTransport {
    path: Arc<str>,
    sender: mpsc::Sender<ServerRequest>,
}

impl ServerTransport {
    pub fn new(path: impl Into<Arc<str>>, sender: mpsc::Sender<ServerRequest>) -> Self {
        Self {
            path: path.into(),
            sender,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Asks the server to stop. Requests already queued are still answered.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ServerRequest::Shutdown).await;
    }

    fn route(&self, path: &str) -> Result<Route, TransportError> {
        let rest = path
            .strip_prefix(&*self.path)
            .ok_or_else(|| TransportError::status(404, "Not Found"))?;
        match rest.trim_end_matches('/') {
            "" => Ok(Route::Collection),
            member => member
                .strip_prefix('/')
                .and_then(|id| id.parse().ok())
                .map(Route::Member)
                .ok_or_else(|| TransportError::status(404, "Not Found")),
        }
    }

    async fn call(
        &self,
        build: impl FnOnce(Response) -> ServerRequest,
    ) -> Result<Value, TransportError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| TransportError::network("server closed"))?;
        response
            .await
            .map_err(|_| TransportError::network("server dropped the request"))?
    }
}

fn object_body(body: Option<Value>) -> Result<Attributes, TransportError> {
    match body {
        None => Ok(Attributes::new()),
        Some(Value::Object(body)) => Ok(body),
        Some(_) => Err(TransportError::status(400, "Bad Request")),
    }
}

#[async_trait]
impl Transport for ServerTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        debug!(method = %request.method, url = %request.url(), "Routing");
        let Request {
            method,
            path,
            query,
            body,
        } = request;

        match (self.route(&path)?, method) {
            (Route::Collection, Method::Get) => {
                self.call(|respond_to| ServerRequest::List { query, respond_to })
                    .await
            }
            (Route::Collection, Method::Post) => {
                let body = object_body(body)?;
                self.call(|respond_to| ServerRequest::Create { body, respond_to })
                    .await
            }
            (Route::Member(id), Method::Get) => {
                self.call(|respond_to| ServerRequest::Get { id, respond_to })
                    .await
            }
            (Route::Member(id), Method::Put) => {
                let body = object_body(body)?;
                self.call(|respond_to| ServerRequest::Update {
                    id,
                    body,
                    respond_to,
                })
                .await
            }
            (Route::Member(id), Method::Delete) => {
                self.call(|respond_to| ServerRequest::Delete { id, respond_to })
                    .await
            }
            _ => Err(TransportError::status(405, "Method Not Allowed")),
        }
    }
}
