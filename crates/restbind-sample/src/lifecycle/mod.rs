//! # Shop Lifecycle
//!
//! Starting the sample means spawning the [`ResourceServer`](crate::server::ResourceServer)
//! and binding a model type to its transport. [`BikeShop`] does both and owns the
//! server task so it can be stopped cleanly.
//!
//! ## Shutdown
//!
//! Collections and records keep the transport alive through their model type,
//! so the server cannot rely on every sender being dropped. `shutdown` sends an
//! explicit stop message instead and then awaits the server task. Requests
//! issued afterwards fail with a network error.
//!
//! ## Logging
//!
//! Call [`restbind::tracing::setup_tracing`] once at startup:
//!
//! ```bash
//! RUST_LOG=info cargo run      # state changes
//! RUST_LOG=debug cargo run     # requests and payloads
//! ```

pub mod bike_shop;

pub use bike_shop::*;
