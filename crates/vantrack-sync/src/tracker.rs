//! [`Tracker`] owns the catalog, the registry and the load coordinator
//! for one running instance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use vantrack_core::{
  catalog::Catalog,
  location::Sentinels,
  source::{BoardSource, CatalogSource, UnitLoader},
  unit::UnitSummary,
};

use crate::{
  board::{ScanReport, scan_board},
  config::SyncConfig,
  coordinator::LoadCoordinator,
  error::{Error, Result},
  registry::UnitRegistry,
  stats::ProductionStats,
};

pub struct Tracker<L> {
  catalog:     Arc<Catalog>,
  registry:    Arc<UnitRegistry>,
  coordinator: Arc<LoadCoordinator<L>>,
}

impl<L> Tracker<L>
where
  L: UnitLoader + 'static,
{
  /// Load and validate the catalog, then set up an empty registry. Any
  /// catalog configuration error is returned and nothing is started.
  pub async fn start<C: CatalogSource>(
    catalog_source: &C,
    sentinels: Sentinels,
    loader: L,
    config: SyncConfig,
  ) -> Result<Self> {
    let definition = catalog_source
      .load_catalog()
      .await
      .map_err(|e| Error::CatalogSource(Box::new(e)))?;
    let catalog = Arc::new(Catalog::from_definition(
      &definition,
      sentinels,
      config.service_type.clone(),
    )?);
    info!(
      lines = catalog.lines().len(),
      models = catalog.models().len(),
      locations = catalog.locations().len(),
      "catalog loaded"
    );

    let registry = Arc::new(UnitRegistry::new());
    let coordinator = Arc::new(LoadCoordinator::new(
      Arc::clone(&registry),
      Arc::clone(&catalog),
      Arc::new(loader),
      config,
    ));
    Ok(Self { catalog, registry, coordinator })
  }

  pub fn catalog(&self) -> &Arc<Catalog> { &self.catalog }

  pub fn registry(&self) -> &Arc<UnitRegistry> { &self.registry }

  pub fn coordinator(&self) -> &Arc<LoadCoordinator<L>> { &self.coordinator }

  /// Fetch the board listing and fold it into the registry.
  pub async fn scan<B: BoardSource>(&self, board: &B) -> Result<ScanReport> {
    let mentions = board
      .list_board()
      .await
      .map_err(|e| Error::BoardSource(Box::new(e)))?;
    Ok(scan_board(&self.registry, &self.catalog, &mentions, Utc::now()))
  }

  pub fn stats(&self, now: DateTime<Utc>) -> ProductionStats {
    ProductionStats::compute(&self.registry, now)
  }

  /// Summaries of every unit, sorted by name.
  pub fn summaries(&self) -> Vec<UnitSummary> {
    let mut summaries: Vec<UnitSummary> =
      self.registry.find(|_| true).iter().map(|u| u.summary()).collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    summaries
  }
}
