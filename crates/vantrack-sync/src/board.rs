//! Folding a board listing into the registry.
//!
//! A scan is the cheap pass that runs before any per-unit load: it creates
//! units the registry has not seen, refreshes their external id and redline,
//! and seeds a position from the board's list hint so that
//! [`LoadCoordinator::load_required`](crate::LoadCoordinator::load_required)
//! knows which units are in production.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use vantrack_core::{
  catalog::Catalog,
  location::LocationType,
  source::BoardMention,
  unit::{HandoverState, SalesOrder, UnitName},
};

use crate::registry::{UnitRegistry, Upsert};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
  /// Mentions whose name resolved to a unit.
  pub seen:             usize,
  pub created:          usize,
  pub refreshed:        usize,
  /// Mentions whose name matched no model prefix.
  pub unresolved:       usize,
  /// Unit names listed more than once; these are blocked for this scan.
  pub duplicates:       Vec<String>,
  pub positions_seeded: usize,
}

/// Fold `mentions` into `registry`. `now` is recorded as the observation
/// time of any new redline.
///
/// Names blocked by an earlier scan get a fresh chance: the block set is
/// cleared first and rebuilt from this listing.
pub fn scan_board(
  registry: &UnitRegistry,
  catalog: &Catalog,
  mentions: &[BoardMention],
  now: DateTime<Utc>,
) -> ScanReport {
  let mut report = ScanReport::default();
  registry.clear_blocked();

  let mut resolved: Vec<(UnitName, &BoardMention)> = Vec::with_capacity(mentions.len());
  for mention in mentions {
    match catalog.resolve_unit_name(&mention.name) {
      Some(unit_name) => resolved.push((unit_name, mention)),
      None => {
        debug!(name = %mention.name, "board entry does not name a known model");
        report.unresolved += 1;
      }
    }
  }
  report.seen = resolved.len();

  let mut occurrences: HashMap<String, usize> = HashMap::new();
  for (unit_name, _) in &resolved {
    *occurrences.entry(unit_name.name()).or_default() += 1;
  }
  for (name, count) in &occurrences {
    if *count > 1 {
      warn!(unit = %name, count, "unit listed more than once on the board; blocking");
      registry.block(name);
      registry.remove(name);
      report.duplicates.push(name.clone());
    }
  }
  report.duplicates.sort();

  for (unit_name, mention) in resolved {
    let name = unit_name.name();
    if registry.is_blocked(&name) {
      continue;
    }
    if !registry.contains(&name) {
      match registry.upsert_if_absent(SalesOrder::new(unit_name)) {
        Upsert::Inserted => report.created += 1,
        Upsert::Duplicate | Upsert::Blocked => continue,
      }
    }
    let seeded = registry.update(&name, |unit| refresh(unit, catalog, mention, now));
    if let Some(seeded) = seeded {
      report.refreshed += 1;
      if seeded {
        report.positions_seeded += 1;
      }
    }
  }

  info!(
    seen = report.seen,
    created = report.created,
    unresolved = report.unresolved,
    duplicates = report.duplicates.len(),
    "board scan complete"
  );
  report
}

/// Apply one board mention to its unit. Returns whether a position was
/// seeded.
fn refresh(
  unit: &mut SalesOrder,
  catalog: &Catalog,
  mention: &BoardMention,
  now: DateTime<Utc>,
) -> bool {
  if let Some(external_id) = &mention.external_id
    && unit.external_id.as_ref() != Some(external_id)
  {
    if let Some(previous) = &unit.external_id {
      info!(unit = %unit.name(), %previous, current = %external_id, "board id changed");
    }
    unit.external_id = Some(external_id.clone());
  }

  if let Some(due) = mention.due {
    unit.record_handover_date(due, now);
    unit.handover_state = if mention.due_complete {
      HandoverState::HandedOver
    } else {
      HandoverState::UnhandedOver
    };
  }

  let (Some(list), Some(at)) = (mention.list_name.as_deref(), mention.moved_at) else {
    return false;
  };
  let Some(position) = catalog.resolve_location_by_display_name(unit.line_id(), list) else {
    return false;
  };
  if !(position.is_sentinel() || position.location_type() == LocationType::Bay)
    || unit.positions.contains(&position)
  {
    return false;
  }
  let label = position.name().to_string();
  match unit.positions.add_position_change(at, position) {
    Ok(()) => true,
    Err(e) => {
      warn!(unit = %unit.name(), position = %label, error = %e, "board position rejected");
      false
    }
  }
}
