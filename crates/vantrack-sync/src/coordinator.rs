//! [`LoadCoordinator`] pulls per-unit card detail from the external source.
//!
//! Per unit the state machine is `NotLoaded → Loading → Loaded`, with
//! `Loaded → NotLoaded` only through [`UnitRegistry::mark_unloaded`]. A unit
//! that is `Loading` is never loaded a second time concurrently: later
//! callers wait on the in-flight load. Batches are bounded by
//! [`SyncConfig::parallelism`].

use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vantrack_core::{
  catalog::Catalog,
  source::UnitLoader,
  unit::{HandoverState, SalesOrder},
};

use crate::{
  config::SyncConfig,
  error::LoadError,
  fold::plan_load,
  registry::UnitRegistry,
  single_flight::SingleFlight,
};

type LoadResult = Result<SalesOrder, LoadError>;

pub struct LoadCoordinator<L> {
  registry:  Arc<UnitRegistry>,
  catalog:   Arc<Catalog>,
  loader:    Arc<L>,
  config:    SyncConfig,
  in_flight: SingleFlight<String, LoadResult>,
}

impl<L> LoadCoordinator<L>
where
  L: UnitLoader + 'static,
{
  pub fn new(
    registry: Arc<UnitRegistry>,
    catalog: Arc<Catalog>,
    loader: Arc<L>,
    config: SyncConfig,
  ) -> Self {
    Self {
      registry,
      catalog,
      loader,
      config,
      in_flight: SingleFlight::new(),
    }
  }

  pub fn registry(&self) -> &Arc<UnitRegistry> { &self.registry }

  pub fn config(&self) -> &SyncConfig { &self.config }

  /// Number of units with a load currently in flight.
  pub fn loads_in_flight(&self) -> usize { self.in_flight.len() }

  /// Load the named unit's card detail.
  ///
  /// Already-loaded units are returned as-is without touching the loader. If
  /// a load for the unit is in flight, this waits for it and returns its
  /// result. Loader failures are returned to the caller and leave the unit
  /// unloaded, so a later call retries.
  pub async fn load_one(&self, name: &str, cancel: &CancellationToken) -> LoadResult {
    let unit = self
      .registry
      .get(name)
      .ok_or_else(|| LoadError::UnknownUnit(name.to_string()))?;
    if unit.production_info_loaded {
      return Ok(unit);
    }

    let registry = Arc::clone(&self.registry);
    let catalog = Arc::clone(&self.catalog);
    let loader = Arc::clone(&self.loader);
    let key = name.to_string();
    let run = self.in_flight.run(key.clone(), move || {
      fetch_and_fold(registry, catalog, loader, key)
    });

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        debug!(unit = %name, "load cancelled");
        Err(LoadError::Cancelled(name.to_string()))
      }
      result = run => result,
    }
  }

  /// Load many units, at most [`SyncConfig::parallelism`] at a time.
  ///
  /// Units that fail are logged and left out of the result; they do not stop
  /// the rest of the batch and are not retried. Once `cancel` fires no new
  /// loads are started, and loads already running observe the cancellation.
  pub async fn load_many<I>(self: &Arc<Self>, names: I, cancel: &CancellationToken) -> Vec<SalesOrder>
  where
    I: IntoIterator<Item = String>,
  {
    let semaphore = Arc::new(Semaphore::new(self.config.parallelism()));
    let mut tasks = JoinSet::new();

    for name in names {
      let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        permit = Arc::clone(&semaphore).acquire_owned() => match permit {
          Ok(permit) => permit,
          Err(_) => break,
        },
      };
      let this = Arc::clone(self);
      let cancel = cancel.clone();
      tasks.spawn(async move {
        // Hold the permit until the load completes.
        let _permit = permit;
        let result = this.load_one(&name, &cancel).await;
        (name, result)
      });
    }

    let mut loaded = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((_, Ok(unit))) => loaded.push(unit),
        Ok((name, Err(e))) => {
          warn!(unit = %name, error = %e, "unit excluded from batch load");
        }
        Err(e) => error!(error = %e, "load task panicked or was aborted"),
      }
    }
    loaded
  }

  /// Load every unit that is somewhere in production: it has a known
  /// position and has not been handed over.
  pub async fn load_required(self: &Arc<Self>, cancel: &CancellationToken) -> Vec<SalesOrder> {
    let names: Vec<String> = self
      .registry
      .find(|u| {
        !u.production_info_loaded
          && u.current_position().is_some()
          && u.handover_state != HandoverState::HandedOver
      })
      .into_iter()
      .map(|u| u.name().to_string())
      .collect();
    info!(units = names.len(), "loading required units");
    self.load_many(names, cancel).await
  }

  /// Look up the external board id of every unit that lacks one. A search
  /// with exactly one hit sets the id; no hit or several hits leave the unit
  /// unresolved. Returns how many units were resolved.
  pub async fn resolve_ids(&self, cancel: &CancellationToken) -> usize {
    let pending = self.registry.find(|u| u.external_id.is_none());
    let mut resolved = 0;
    for unit in pending {
      if cancel.is_cancelled() {
        break;
      }
      let name = unit.name();
      let hits = match self.loader.search_boards(name).await {
        Ok(hits) => hits,
        Err(e) => {
          warn!(unit = %name, error = %e, "board search failed");
          continue;
        }
      };
      match hits.as_slice() {
        [id] => {
          let id = id.clone();
          if self
            .registry
            .update(name, |u| u.external_id = Some(id))
            .is_some()
          {
            resolved += 1;
          }
        }
        [] => debug!(unit = %name, "no board found for unit"),
        _ => warn!(unit = %name, boards = hits.len(), "several boards match unit; leaving unresolved"),
      }
    }
    resolved
  }
}

/// The body of a single in-flight load.
async fn fetch_and_fold<L: UnitLoader>(
  registry: Arc<UnitRegistry>,
  catalog: Arc<Catalog>,
  loader: Arc<L>,
  name: String,
) -> LoadResult {
  let unit = registry
    .get(&name)
    .ok_or_else(|| LoadError::UnknownUnit(name.clone()))?;
  // Another load may have finished between the caller's check and now.
  if unit.production_info_loaded {
    return Ok(unit);
  }
  let external_id = unit
    .external_id
    .clone()
    .ok_or_else(|| LoadError::MissingExternalId(name.clone()))?;

  let detail = match loader.load_unit(&external_id).await {
    Ok(detail) => detail,
    Err(e) => {
      let e = LoadError::loader(&name, e);
      warn!(unit = %name, error = %e, "unit load failed");
      return Err(e);
    }
  };

  let plan = plan_load(&catalog, unit.line_id(), detail);
  let loaded = registry
    .complete_load(&name, plan.cards, plan.moves)
    .ok_or_else(|| LoadError::UnknownUnit(name.clone()))?;
  info!(
    unit = %name,
    cards = loaded.cards().len(),
    position = loaded.current_position().map(|p| p.name()).unwrap_or("-"),
    "unit loaded"
  );
  Ok(loaded)
}
