//! Core types and invariants for the vantrack production tracker.
//!
//! Nothing here depends on an async runtime or a log sink. The crate models
//! the location catalog, the per-unit position history and the card data
//! mirrored from the external card source, and defines the traits through
//! which the engine talks to that source.

pub mod card;
pub mod catalog;
pub mod error;
pub mod location;
pub mod position;
pub mod source;
pub mod unit;

pub use error::{CatalogError, PositionError, PositionField};
