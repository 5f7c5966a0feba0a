//! # Observability & Tracing
//!
//! Every collection and record operation logs through `tracing` with structured
//! fields. The resource path is always recorded as `resource`, so one model type
//! can be followed through interleaved cycles.
//!
//! ## What Gets Traced
//!
//! - **Fetch cycles**: `Fetch`, `Refresh`, `Reset`, `Fetched` (with `generation`,
//!   `count` and `size`), `Fetch failed`
//! - **Supersession**: `Superseded before dispatch`, `Dropping stale response`
//! - **Membership**: `Added`, `Removed`, `Fed`
//! - **Writes**: `Sending request`, `Saved`, `Destroyed`, `Write failed`
//! - **Observers**: `Event handler panicked`
//!
//! ## Usage
//!
//! ```bash
//! # State changes only
//! RUST_LOG=info cargo run -p restbind-sample
//!
//! # Requests, payloads and stale responses
//! RUST_LOG=debug cargo run -p restbind-sample
//!
//! # Only the collection state machine
//! RUST_LOG=restbind::collection=debug cargo run -p restbind-sample
//! ```
//!
//! Running with `RUST_LOG=debug` shows a refresh superseding a fetch:
//!
//! ```text
//! DEBUG Fetch resource="/api/bikes" generation=1 params=QueryParams({})
//! DEBUG Refresh resource="/api/bikes" generation=2 dropped=0 params=QueryParams({"brand": "giant"})
//! DEBUG Superseded before dispatch resource="/api/bikes" generation=1 current=2
//! DEBUG Sending request resource="/api/bikes" generation=2 url=/api/bikes?brand=giant
//!  INFO Fetched resource="/api/bikes" generation=2 count=1 size=1
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Call once, at program start. Module paths are hidden; the `resource` field
/// identifies where a line comes from.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
