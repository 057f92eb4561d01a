// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! EC2 spot price ingestion pipeline.
//!
//! Fetches spot price history from a paginated HTTP price API, normalizes
//! it into [`model::PriceRecord`]s, persists them through a pool of
//! concurrent workers, and writes per-region and instance-type artifacts.
//!
//! # Structure
//!
//! - `window`: query window resolution
//! - `source`: price source port, HTTP adapter, paginated fetcher
//! - `split`: deterministic contiguous list splitting
//! - `region`: availability-zone to region reverse lookup
//! - `worker` / `pool`: cooperative persistence workers and their
//!   join-all coordinator
//! - `aggregate`: per-instance-type price summaries
//! - `store`: durable table and object store ports plus adapters
//! - `artifact`: run artifact serialization and delivery
//! - `pipeline`: orchestration of a full run
//! - `handler` / `config` / `telemetry`: entry-point plumbing
//!
//! Invoked either through the CLI binary or the scheduled entry point
//! [`handler::handle_scheduled`].

pub mod aggregate;
pub mod artifact;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod region;
pub mod source;
pub mod split;
pub mod store;
pub mod telemetry;
pub mod window;
pub mod worker;

pub use config::Settings;
pub use error::IngestError;
pub use model::PriceRecord;
pub use pipeline::{Pipeline, RunReport};
pub use window::TimeWindow;
