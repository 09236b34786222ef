//! Error types for `vantrack-core`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::location::LocationType;

// ─── Position history ────────────────────────────────────────────────────────

/// The field of a position change that caused it to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionField {
  Location,
  Type,
  Line,
  Date,
}

/// A position change that would break one of the history invariants. The
/// history is left untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
  #[error("location {location:?} is already present in the history")]
  DuplicateLocation { location: String },

  #[error("location {location:?} is a {location_type} location, only bays may be entered")]
  NotABay {
    location:      String,
    location_type: LocationType,
  },

  #[error("location {location:?} is on line {found}, but the history is on line {expected}")]
  LineMismatch {
    location: String,
    expected: String,
    found:    String,
  },

  #[error("a position change is already recorded at {at}")]
  DuplicateTimestamp { at: DateTime<Utc> },
}

impl PositionError {
  /// Which part of the change triggered the rejection.
  pub fn field(&self) -> PositionField {
    match self {
      Self::DuplicateLocation { .. } => PositionField::Location,
      Self::NotABay { .. } => PositionField::Type,
      Self::LineMismatch { .. } => PositionField::Line,
      Self::DuplicateTimestamp { .. } => PositionField::Date,
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A malformed catalog definition. These are configuration errors and are
/// fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
  #[error("bay {name:?} has no line")]
  MissingLine { name: String },

  #[error("bay {name:?} has no bay number")]
  MissingBayNumber { name: String },

  #[error("bay {name:?} collides with an existing bay at order {order} on line {line}")]
  DuplicateBayOrder {
    name:  String,
    line:  String,
    order: Decimal,
  },

  #[error("unknown workspace: {0}")]
  UnknownWorkspace(String),

  #[error("unknown line: {0}")]
  UnknownLine(String),

  #[error("unknown line id: {0}")]
  UnknownLineId(Uuid),

  #[error("model prefix {prefix:?} is used by more than one model")]
  DuplicateModelPrefix { prefix: String },
}
