//! File-backed adapters and configuration for the `vantrack` binary.
//!
//! The engine in `vantrack-sync` talks to the outside world through the
//! source traits in `vantrack-core`; this crate implements them over JSON
//! files so a sync can be run against an exported snapshot of the card
//! source.

pub mod error;
pub mod source;

pub use error::SourceError;
pub use source::{FileBoardSource, FileCatalogSource, FileUnitLoader};

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vantrack_sync::SyncConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `VANTRACK_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// JSON catalog definition.
  pub catalog_path: PathBuf,
  /// JSON array of board mentions.
  pub board_path:   PathBuf,
  /// Directory holding one `<external id>.json` unit detail per board.
  pub details_dir:  PathBuf,
  #[serde(default)]
  pub sync:         SyncConfig,
}

impl AppConfig {
  /// Expand a leading `~` in every configured path.
  pub fn expand_paths(mut self) -> Self {
    self.catalog_path = expand_tilde(&self.catalog_path);
    self.board_path = expand_tilde(&self.board_path);
    self.details_dir = expand_tilde(&self.details_dir);
    self
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
