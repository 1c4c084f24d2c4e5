//! Clicker - banner click aggregation
//!
//! Ingests high-frequency click events, buffers them in memory, flushes them
//! in batches to a storage backend and answers time-bucketed range queries.
//!
//! # Features
//! - **cli**: Command-line binary (default)
//!
//! # Architecture
//! - `analytics`: Time buckets, aggregation buffer, batch flusher, stats reader
//! - `storage`: `ClickStore` trait with Redis / in-memory counter stores and a SeaORM event log
//! - `service`: `ClickService`, the object callers hold on to
//! - `config`: Static configuration (TOML + environment)
//! - `interfaces`: CLI command handlers
//! - `system`: Logging and shutdown signals

pub mod analytics;
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod service;
pub mod storage;
pub mod system;
pub mod utils;

pub use analytics::{AggregatedCount, ClickEvent, ClickStats, FlushStatsSnapshot, Granularity};
pub use errors::{ClickerError, Result};
pub use service::ClickService;
pub use storage::{ClickStore, StoreFactory};
