//! # In-Process REST Server
//!
//! A tiny resource server that runs as an actor in its own Tokio task. It keeps
//! JSON objects in memory and speaks just enough REST for a [`restbind`]
//! collection: list with query filtering, get, create, update and delete.
//!
//! [`ResourceServer::new`] returns the server half and a [`ServerTransport`],
//! the client half that implements [`restbind::Transport`] and can be handed to
//! a `ModelType` builder.

pub mod actor;
pub mod client;
pub mod message;

pub use actor::ResourceServer;
pub use client::ServerTransport;
pub use message::ServerRequest;

use serde::Deserialize;

/// Server settings, loadable from JSON.
///
/// ```rust
/// use restbind_sample::server::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{ "path": "/v2/bikes" }"#).unwrap();
/// assert_eq!(config.path, "/v2/bikes");
/// assert_eq!(config.buffer_size, 32);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Capacity of the request channel.
    pub buffer_size: usize,
    /// Collection path served, e.g. `/api/bikes`.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 32,
            path: "/api/bikes".to_string(),
        }
    }
}
