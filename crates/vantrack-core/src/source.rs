//! Traits for the external collaborators the engine reads from, and the
//! records they return.
//!
//! Implementations wrap the card-tracking API, a database, or (in the
//! `vantrack` binary) JSON files on disk. The engine depends only on these
//! traits.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{card::Card, catalog::CatalogDefinition};

// ─── Records ─────────────────────────────────────────────────────────────────

/// A candidate unit seen on the external board listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardMention {
  /// Raw display name; resolved against model prefixes.
  pub name:         String,
  #[serde(default)]
  pub external_id:  Option<String>,
  /// The redline (committed handover) date.
  #[serde(default)]
  pub due:          Option<DateTime<Utc>>,
  /// Whether the due date has been marked done, i.e. the unit was handed
  /// over.
  #[serde(default)]
  pub due_complete: bool,
  /// The list the unit's card sits in, used as a position hint.
  #[serde(default)]
  pub list_name:    Option<String>,
  #[serde(default)]
  pub moved_at:     Option<DateTime<Utc>>,
}

/// Everything the per-unit loader returns for one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitDetail {
  #[serde(default)]
  pub cards: Vec<Card>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Supplies the catalog definition, once, at startup.
pub trait CatalogSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn load_catalog(
    &self,
  ) -> impl Future<Output = Result<CatalogDefinition, Self::Error>> + Send + '_;
}

/// Lists the units currently present on the external board.
pub trait BoardSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn list_board(
    &self,
  ) -> impl Future<Output = Result<Vec<BoardMention>, Self::Error>> + Send + '_;
}

/// Fetches per-unit card detail. This is the only call in the engine that is
/// expected to suspend on I/O.
pub trait UnitLoader: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load every card attached to the unit with board id `external_id`.
  fn load_unit<'a>(
    &'a self,
    external_id: &'a str,
  ) -> impl Future<Output = Result<UnitDetail, Self::Error>> + Send + 'a;

  /// Search for boards belonging to `unit_name`, returning their ids. More
  /// than one hit means the name is ambiguous.
  fn search_boards<'a>(
    &'a self,
    unit_name: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
