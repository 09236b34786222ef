//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the sync engine, usually deserialised from the `[sync]`
/// table of the binary's config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Upper bound on concurrent per-unit loads in a batch. Keeps the external
  /// API under its rate limit.
  pub max_parallelism: usize,
  /// Which display names the catalog matches list names against.
  pub service_type:    String,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_parallelism: 3,
      service_type:    "trello".to_string(),
    }
  }
}

impl SyncConfig {
  /// The effective concurrency bound; never zero.
  pub fn parallelism(&self) -> usize { self.max_parallelism.max(1) }
}
