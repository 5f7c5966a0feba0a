//! # Resource Server Actor
//!
//! The server half owns the store and processes [`ServerRequest`]s one at a time
//! in its own task, so the store needs no lock. Objects are kept ordered by id,
//! which is also their creation order, so listings are stable.

use super::client::ServerTransport;
use super::message::ServerRequest;
use super::ServerConfig;
use restbind::{Attributes, QueryParams, TransportError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// In-memory REST resource served over a channel.
pub struct ResourceServer {
    receiver: mpsc::Receiver<ServerRequest>,
    path: String,
    store: BTreeMap<u64, Attributes>,
    next_id: u64,
}

impl ResourceServer {
    /// Creates the server and its transport. The server does nothing until
    /// [`run`](Self::run) is spawned.
    pub fn new(config: ServerConfig) -> (Self, ServerTransport) {
        let (sender, receiver) = mpsc::channel(config.buffer_size);
        let transport = ServerTransport::new(config.path.as_str(), sender);
        let server = Self {
            receiver,
            path: config.path,
            store: BTreeMap::new(),
            next_id: 1,
        };
        (server, transport)
    }

    /// Serves requests until every transport is dropped or `Shutdown` arrives.
    pub async fn run(mut self) {
        let resource = self.path.as_str();
        info!(resource, "Server started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ServerRequest::List { query, respond_to } => {
                    let items: Vec<Value> = self
                        .store
                        .values()
                        .filter(|item| matches(item, &query))
                        .cloned()
                        .map(Value::Object)
                        .collect();
                    debug!(resource, ?query, count = items.len(), "List");
                    let _ = respond_to.send(Ok(Value::Array(items)));
                }
                ServerRequest::Get { id, respond_to } => {
                    let reply = self.store.get(&id).cloned().map(Value::Object);
                    debug!(resource, id, found = reply.is_some(), "Get");
                    let _ = respond_to.send(reply.ok_or_else(not_found));
                }
                ServerRequest::Create {
                    mut body,
                    respond_to,
                } => {
                    let id = self.next_id;
                    self.next_id += 1;
                    body.insert("id".to_string(), json!(id));
                    self.store.insert(id, body);
                    info!(resource, id, size = self.store.len(), "Created");
                    let _ = respond_to.send(Ok(json!({ "id": id })));
                }
                ServerRequest::Update {
                    id,
                    mut body,
                    respond_to,
                } => match self.store.get_mut(&id) {
                    Some(item) => {
                        body.insert("id".to_string(), json!(id));
                        *item = body;
                        info!(resource, id, "Updated");
                        let _ = respond_to.send(Ok(Value::Object(item.clone())));
                    }
                    None => {
                        warn!(resource, id, "Not found");
                        let _ = respond_to.send(Err(not_found()));
                    }
                },
                ServerRequest::Delete { id, respond_to } => {
                    if self.store.remove(&id).is_some() {
                        info!(resource, id, size = self.store.len(), "Deleted");
                        let _ = respond_to.send(Ok(Value::Null));
                    } else {
                        warn!(resource, id, "Not found");
                        let _ = respond_to.send(Err(not_found()));
                    }
                }
                ServerRequest::Shutdown => break,
            }
        }

        info!(resource, size = self.store.len(), "Shutdown");
    }
}

fn not_found() -> TransportError {
    TransportError::status(404, "Not Found")
}

/// Every query param equals the field's string form.
fn matches(item: &Attributes, query: &QueryParams) -> bool {
    query.iter().all(|(key, expected)| match item.get(key) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use restbind::{Request, Transport};

    fn start() -> ServerTransport {
        let (server, transport) = ResourceServer::new(ServerConfig::default());
        tokio::spawn(server.run());
        transport
    }

    async fn create(transport: &ServerTransport, body: Value) -> Value {
        transport
            .send(Request::post("/api/bikes", body))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn list_filters_on_query_params() {
        let transport = start();
        create(&transport, json!({ "model": "Slash", "brand": "trek" })).await;
        create(&transport, json!({ "model": "Reign", "brand": "giant" })).await;
        create(&transport, json!({ "model": "Remedy", "brand": "trek" })).await;

        let trek = transport
            .send(Request::get(
                "/api/bikes",
                QueryParams::from([("brand", "trek")]),
            ))
            .await
            .unwrap();
        assert_eq!(
            trek,
            json!([
                { "id": 1, "model": "Slash", "brand": "trek" },
                { "id": 3, "model": "Remedy", "brand": "trek" }
            ])
        );

        let by_id = transport
            .send(Request::get("/api/bikes", QueryParams::from([("id", "2")])))
            .await
            .unwrap();
        assert_eq!(by_id.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let transport = start();
        assert_eq!(create(&transport, json!({})).await, json!({ "id": 1 }));
        assert_eq!(create(&transport, json!({})).await, json!({ "id": 2 }));
    }

    #[tokio::test]
    async fn update_and_delete_unknown_ids_are_not_found() {
        let transport = start();
        let update = transport
            .send(Request::put("/api/bikes/9", json!({ "model": "Ghost" })))
            .await;
        assert_eq!(update, Err(TransportError::status(404, "Not Found")));

        let delete = transport.send(Request::delete("/api/bikes/9")).await;
        assert_eq!(delete.map_err(|e| e.status), Err(Some(404)));
    }

    #[tokio::test]
    async fn update_replaces_the_stored_object() {
        let transport = start();
        create(&transport, json!({ "model": "Slash", "brand": "trek" })).await;

        let updated = transport
            .send(Request::put("/api/bikes/1", json!({ "model": "Fuel EX" })))
            .await
            .unwrap();
        assert_eq!(updated, json!({ "id": 1, "model": "Fuel EX" }));

        let fetched = transport
            .send(Request::get("/api/bikes/1", QueryParams::new()))
            .await
            .unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn unsupported_routes_are_rejected() {
        let transport = start();
        let err = |r: Result<Value, TransportError>| r.unwrap_err().status;

        assert_eq!(err(transport.send(Request::delete("/api/bikes")).await), Some(405));
        assert_eq!(
            err(transport
                .send(Request::post("/api/bikes/1", json!({})))
                .await),
            Some(405)
        );
        assert_eq!(
            err(transport
                .send(Request::get("/api/cars", QueryParams::new()))
                .await),
            Some(404)
        );
        assert_eq!(
            err(transport
                .send(Request::post("/api/bikes", json!([1, 2])))
                .await),
            Some(400)
        );
    }

    #[tokio::test]
    async fn shutdown_closes_the_transport() {
        let (server, transport) = ResourceServer::new(ServerConfig::default());
        let handle = tokio::spawn(server.run());

        transport.shutdown().await;
        handle.await.unwrap();

        let err = transport
            .send(Request::get("/api/bikes", QueryParams::new()))
            .await
            .unwrap_err();
        assert_eq!(err.status, None);
    }
}
