//! The incremental synchronisation engine.
//!
//! Keeps the in-memory [`UnitRegistry`] in step with the external card
//! source: board scans discover units, the [`LoadCoordinator`] pulls
//! per-unit card detail with bounded concurrency and at most one in-flight
//! fetch per unit, and [`stats`] derives production figures on demand.

pub mod board;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fold;
pub mod registry;
pub mod single_flight;
pub mod stats;
pub mod tracker;

pub use board::{ScanReport, scan_board};
pub use config::SyncConfig;
pub use coordinator::LoadCoordinator;
pub use error::{Error, LoadError, Result};
pub use registry::{UnitRegistry, Upsert};
pub use single_flight::SingleFlight;
pub use stats::ProductionStats;
pub use tracker::Tracker;

// Cancellation is part of the public load API.
pub use tokio_util::sync::CancellationToken;
