//! Error types for `vantrack-sync`.

use std::sync::Arc;

use thiserror::Error;
use vantrack_core::CatalogError;

type SourceError = Arc<dyn std::error::Error + Send + Sync>;

/// Why a unit could not be loaded.
///
/// `Clone` so that one in-flight result can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
  #[error("unit {0} is not registered")]
  UnknownUnit(String),

  #[error("unit {0} has no external id")]
  MissingExternalId(String),

  #[error("load of unit {0} was cancelled")]
  Cancelled(String),

  #[error("loader failed for unit {unit}: {source}")]
  Loader {
    unit:   String,
    #[source]
    source: SourceError,
  },
}

impl LoadError {
  pub fn loader<E>(unit: &str, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Loader { unit: unit.to_string(), source: Arc::new(source) }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("catalog error: {0}")]
  Catalog(#[from] CatalogError),

  #[error("catalog source error: {0}")]
  CatalogSource(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("board source error: {0}")]
  BoardSource(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("load error: {0}")]
  Load(#[from] LoadError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
