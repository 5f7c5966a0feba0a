//! # Bike Shop Sample
//!
//! An end-to-end sample for [`restbind`]: an in-process REST server, a `Bike`
//! model, and a lifecycle type that wires them together.
//!
//! - **[server]**: the [`ResourceServer`](server::ResourceServer) actor and its
//!   [`ServerTransport`](server::ServerTransport).
//! - **[model]**: the [`Bike`](model::Bike) attributes.
//! - **[lifecycle]**: [`BikeShop`](lifecycle::BikeShop), which starts, seeds and stops
//!   the server.
//!
//! The binary in `main.rs` walks through fetch, refresh, create and remove.

pub mod lifecycle;
pub mod model;
pub mod server;
