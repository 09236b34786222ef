//! Turning a loader response into card data and position moves for a unit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;
use vantrack_core::{
  card::Card,
  catalog::Catalog,
  location::{LineLocation, LocationType},
  source::UnitDetail,
};

/// What a load will attach to a unit.
#[derive(Debug, Default)]
pub struct LoadPlan {
  pub cards: Vec<Card>,
  /// Bay (or sentinel) moves derived from card list hints, ascending by
  /// time, at most one per position.
  pub moves: Vec<(DateTime<Utc>, Arc<LineLocation>)>,
}

/// Resolve each card's list-name hint against the unit's line. Cards whose
/// hint names a bay (or a sentinel) and carry a move timestamp contribute a
/// position move; when several cards point at the same position the earliest
/// timestamp wins. Area-of-origin names are normalised to the catalog's
/// spelling where they match.
pub fn plan_load(catalog: &Catalog, line_id: Uuid, detail: UnitDetail) -> LoadPlan {
  let mut plan = LoadPlan::default();

  for mut card in detail.cards {
    let data = card.data();
    if let (Some(list), Some(at)) = (data.list_name.as_deref(), data.moved_at) {
      match catalog.resolve_location_by_display_name(line_id, list) {
        Some(position)
          if position.is_sentinel() || position.location_type() == LocationType::Bay =>
        {
          add_move(&mut plan.moves, at, position);
        }
        Some(_) => {}
        None => debug!(card = %data.card_id, list, "list name does not resolve to a position"),
      }
    }

    normalise_area(catalog, line_id, &mut card);
    plan.cards.push(card);
  }

  plan.moves.sort_by_key(|(at, _)| *at);
  plan
}

fn add_move(
  moves: &mut Vec<(DateTime<Utc>, Arc<LineLocation>)>,
  at: DateTime<Utc>,
  position: Arc<LineLocation>,
) {
  match moves.iter_mut().find(|(_, p)| LineLocation::equals(p, &position)) {
    Some(existing) if at < existing.0 => existing.0 = at,
    Some(_) => {}
    None => moves.push((at, position)),
  }
}

fn normalise_area(catalog: &Catalog, line_id: Uuid, card: &mut Card) {
  let data = match card {
    Card::Job(c) => &mut c.data,
    Card::Red(c) => &mut c.data,
    Card::Yellow(c) => &mut c.data,
  };
  if let Some(raw) = data.area_of_origin.as_deref()
    && let Some(area) = catalog.area_of_origin_by_name(line_id, raw)
  {
    data.area_of_origin = Some(area.name.clone());
  }
}
