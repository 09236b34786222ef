//! [`UnitRegistry`], the concurrent store of every known unit.
//!
//! Alongside the units it keeps three secondary indexes over the loaded card
//! data (cards, checklists and comments by external id). The indexes are
//! populated only through [`UnitRegistry::complete_load`] and cleared only
//! through [`UnitRegistry::mark_unloaded`] and duplicate removal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use tracing::{debug, info, warn};
use vantrack_core::{card::Card, location::LineLocation, unit::SalesOrder};

/// Outcome of [`UnitRegistry::upsert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
  Inserted,
  /// The name was already registered. Both units were dropped and the name
  /// is blocked until [`UnitRegistry::clear_blocked`].
  Duplicate,
  /// The name is currently blocked; nothing was inserted.
  Blocked,
}

#[derive(Debug, Clone)]
struct CardChild {
  unit:    String,
  card_id: String,
}

#[derive(Default)]
pub struct UnitRegistry {
  units:      DashMap<String, SalesOrder>,
  blocked:    DashSet<String>,
  /// card id → unit name
  cards:      DashMap<String, String>,
  checklists: DashMap<String, CardChild>,
  comments:   DashMap<String, CardChild>,
}

impl UnitRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.units.len() }

  pub fn is_empty(&self) -> bool { self.units.is_empty() }

  pub fn contains(&self, name: &str) -> bool { self.units.contains_key(name) }

  /// A snapshot of the named unit.
  pub fn get(&self, name: &str) -> Option<SalesOrder> {
    self.units.get(name).map(|u| u.value().clone())
  }

  pub fn names(&self) -> Vec<String> {
    self.units.iter().map(|u| u.key().clone()).collect()
  }

  // ── Insertion ─────────────────────────────────────────────────────────

  /// Insert `unit` under its name unless the name is taken.
  ///
  /// A second unit with the same name means the source data is ambiguous:
  /// the new unit is discarded, the original is removed too, and the name is
  /// blocked so neither comes back until the block is cleared.
  pub fn upsert_if_absent(&self, unit: SalesOrder) -> Upsert {
    let name = unit.name().to_string();
    if self.blocked.contains(&name) {
      debug!(unit = %name, "ignoring blocked unit name");
      return Upsert::Blocked;
    }
    let original = match self.units.entry(name.clone()) {
      Entry::Vacant(entry) => {
        entry.insert(unit);
        return Upsert::Inserted;
      }
      Entry::Occupied(entry) => entry.remove(),
    };
    self.blocked.insert(name.clone());
    self.unindex(&name, original.cards());
    warn!(unit = %name, "duplicate unit name; dropping both and blocking the name");
    Upsert::Duplicate
  }

  pub(crate) fn block(&self, name: &str) { self.blocked.insert(name.to_string()); }

  pub fn is_blocked(&self, name: &str) -> bool { self.blocked.contains(name) }

  pub fn clear_blocked(&self) { self.blocked.clear(); }

  /// Remove a unit and every index entry that points at it.
  pub fn remove(&self, name: &str) -> Option<SalesOrder> {
    let (_, unit) = self.units.remove(name)?;
    self.unindex(name, unit.cards());
    Some(unit)
  }

  /// Apply `f` to the named unit in place. `f` must not call back into the
  /// registry.
  pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut SalesOrder) -> R) -> Option<R> {
    self.units.get_mut(name).map(|mut u| f(u.value_mut()))
  }

  // ── Queries ───────────────────────────────────────────────────────────

  pub fn find(&self, predicate: impl Fn(&SalesOrder) -> bool) -> Vec<SalesOrder> {
    self
      .units
      .iter()
      .filter(|u| predicate(u.value()))
      .map(|u| u.value().clone())
      .collect()
  }

  /// The one unit matching `predicate`. Zero or several matches are logged
  /// and treated as no match: ambiguous identifiers are never coalesced.
  pub fn find_single(&self, predicate: impl Fn(&SalesOrder) -> bool) -> Option<SalesOrder> {
    let mut hits = self.find(predicate);
    match hits.len() {
      1 => hits.pop(),
      0 => {
        warn!("no unit matched a single-unit lookup");
        None
      }
      n => {
        let names: Vec<&str> = hits.iter().map(|u| u.name()).collect();
        warn!(matches = n, units = ?names, "ambiguous single-unit lookup");
        None
      }
    }
  }

  pub fn count(&self, predicate: impl Fn(&SalesOrder) -> bool) -> usize {
    self.units.iter().filter(|u| predicate(u.value())).count()
  }

  /// Which unit owns the card with external id `card_id`.
  pub fn card_owner(&self, card_id: &str) -> Option<String> {
    self.cards.get(card_id).map(|u| u.value().clone())
  }

  /// How many secondary-index entries still point at `name`. Zero for any
  /// unit that is not loaded.
  pub fn index_references(&self, name: &str) -> usize {
    self.cards.iter().filter(|e| e.value() == name).count()
      + self.checklists.iter().filter(|e| e.value().unit == name).count()
      + self.comments.iter().filter(|e| e.value().unit == name).count()
  }

  // ── Load / unload ─────────────────────────────────────────────────────

  /// Attach freshly loaded cards and position moves to a unit and mark it
  /// loaded. Cards whose id is already indexed to another unit are skipped;
  /// moves that the position history rejects are logged and skipped. A unit
  /// that is already loaded is returned unchanged.
  ///
  /// Returns the updated unit, or `None` if it has left the registry.
  pub(crate) fn complete_load(
    &self,
    name: &str,
    cards: Vec<Card>,
    moves: Vec<(DateTime<Utc>, Arc<LineLocation>)>,
  ) -> Option<SalesOrder> {
    let current = self.get(name)?;
    if current.production_info_loaded {
      debug!(unit = %name, "unit already loaded; discarding fetched cards");
      return Some(current);
    }

    let mut accepted = Vec::with_capacity(cards.len());
    for card in cards {
      match self.cards.entry(card.card_id().to_string()) {
        Entry::Occupied(owner) if owner.get() != name => {
          warn!(
            unit = %name,
            card = %card.card_id(),
            owner = %owner.get(),
            "card already belongs to another unit; skipping"
          );
          continue;
        }
        Entry::Occupied(_) => {}
        Entry::Vacant(slot) => {
          slot.insert(name.to_string());
        }
      }
      self.index_children(name, &card);
      accepted.push(card);
    }

    let Some(mut unit) = self.units.get_mut(name) else {
      self.unindex(name, &accepted);
      return None;
    };
    for card in accepted {
      unit.push_card(card);
    }
    for (at, position) in moves {
      if unit.positions.contains(&position) {
        continue;
      }
      let label = position.name().to_string();
      if let Err(e) = unit.positions.add_position_change(at, position) {
        warn!(unit = %name, position = %label, error = %e, "position change rejected");
      }
    }
    unit.production_info_loaded = true;
    Some(unit.clone())
  }

  /// Drop the card data of every loaded unit matching `predicate` and clear
  /// its loaded flags. Identity, positions and handover history are kept.
  /// Returns the names of the units that were unloaded.
  pub fn mark_unloaded(&self, predicate: impl Fn(&SalesOrder) -> bool) -> Vec<String> {
    let names: Vec<String> = self
      .units
      .iter()
      .filter(|u| u.production_info_loaded && predicate(u.value()))
      .map(|u| u.key().clone())
      .collect();

    for name in &names {
      let Some(cards) = self.update(name, |unit| {
        unit.production_info_loaded = false;
        unit.inventory_info_loaded = false;
        unit.take_cards()
      }) else {
        continue;
      };
      self.unindex(name, &cards);
      info!(unit = %name, cards = cards.len(), "unit unloaded");
    }

    debug_assert!(names.iter().all(|n| self.index_references(n) == 0));
    names
  }

  fn index_children(&self, name: &str, card: &Card) {
    let data = card.data();
    for checklist in &data.checklists {
      self.checklists.insert(checklist.checklist_id.clone(), CardChild {
        unit:    name.to_string(),
        card_id: data.card_id.clone(),
      });
    }
    for comment in &data.comments {
      self.comments.insert(comment.comment_id.clone(), CardChild {
        unit:    name.to_string(),
        card_id: data.card_id.clone(),
      });
    }
  }

  fn unindex(&self, name: &str, cards: &[Card]) {
    for card in cards {
      let data = card.data();
      self.cards.remove_if(&data.card_id, |_, owner| owner == name);
      for checklist in &data.checklists {
        self
          .checklists
          .remove_if(&checklist.checklist_id, |_, child| child.card_id == data.card_id);
      }
      for comment in &data.comments {
        self
          .comments
          .remove_if(&comment.comment_id, |_, child| child.card_id == data.card_id);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use vantrack_core::{
    card::{CardData, CardStatus, Checklist, Comment, JobCard},
    location::Model,
    unit::UnitName,
  };

  use super::*;

  fn unit(number: u32) -> SalesOrder {
    SalesOrder::new(UnitName {
      model: Arc::new(Model {
        model_id: uuid::Uuid::new_v4(),
        line_id:  uuid::Uuid::new_v4(),
        name:     "Gen 2".into(),
        prefix:   "G2-".into(),
      }),
      number,
    })
  }

  fn job(card_id: &str) -> Card {
    Card::Job(JobCard {
      data:         CardData {
        card_id:        card_id.into(),
        name:           format!("task {card_id}"),
        status:         CardStatus::InProgress,
        list_name:      None,
        moved_at:       None,
        area_of_origin: None,
        created_at:     None,
        completed_at:   None,
        checklists:     vec![Checklist {
          checklist_id: format!("{card_id}-list"),
          name:         "Checks".into(),
          items:        vec![],
        }],
        comments:       vec![Comment {
          comment_id: format!("{card_id}-comment"),
          author:     None,
          text:       "looks good".into(),
          created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }],
        attachments:    vec![],
      },
      task_minutes: Some(30),
    })
  }

  #[test]
  fn duplicate_insert_drops_both_and_blocks() {
    let registry = UnitRegistry::new();
    assert_eq!(registry.upsert_if_absent(unit(1)), Upsert::Inserted);
    assert_eq!(registry.upsert_if_absent(unit(1)), Upsert::Duplicate);
    assert!(!registry.contains("G2-1"));
    assert_eq!(registry.upsert_if_absent(unit(1)), Upsert::Blocked);

    registry.clear_blocked();
    assert_eq!(registry.upsert_if_absent(unit(1)), Upsert::Inserted);
  }

  #[test]
  fn find_single_rejects_ambiguity() {
    let registry = UnitRegistry::new();
    registry.upsert_if_absent(unit(1));
    registry.upsert_if_absent(unit(2));
    assert!(registry.find_single(|_| true).is_none());
    assert!(registry.find_single(|u| u.number == 3).is_none());
    assert_eq!(registry.find_single(|u| u.number == 2).unwrap().name(), "G2-2");
    assert_eq!(registry.find(|u| u.number < 3).len(), 2);
  }

  #[test]
  fn load_then_unload_clears_every_index() {
    let registry = UnitRegistry::new();
    registry.upsert_if_absent(unit(1));
    let loaded = registry
      .complete_load("G2-1", vec![job("a"), job("b")], vec![])
      .unwrap();
    assert!(loaded.production_info_loaded);
    assert_eq!(loaded.job_cards().count(), 2);
    assert_eq!(registry.index_references("G2-1"), 6);
    assert_eq!(registry.card_owner("a").as_deref(), Some("G2-1"));

    let unloaded = registry.mark_unloaded(|_| true);
    assert_eq!(unloaded, ["G2-1"]);
    assert_eq!(registry.index_references("G2-1"), 0);
    let unit = registry.get("G2-1").unwrap();
    assert!(!unit.production_info_loaded);
    assert!(unit.cards().is_empty());

    // Already unloaded units are not touched again.
    assert!(registry.mark_unloaded(|_| true).is_empty());
  }

  #[test]
  fn cards_owned_by_another_unit_are_skipped() {
    let registry = UnitRegistry::new();
    registry.upsert_if_absent(unit(1));
    registry.upsert_if_absent(unit(2));
    registry.complete_load("G2-1", vec![job("a")], vec![]).unwrap();
    let second = registry
      .complete_load("G2-2", vec![job("a"), job("b")], vec![])
      .unwrap();
    assert_eq!(second.cards().len(), 1);
    assert_eq!(registry.card_owner("a").as_deref(), Some("G2-1"));
  }

  #[test]
  fn completing_a_loaded_unit_again_changes_nothing() {
    let registry = UnitRegistry::new();
    registry.upsert_if_absent(unit(1));
    registry.complete_load("G2-1", vec![job("a")], vec![]).unwrap();
    let again = registry
      .complete_load("G2-1", vec![job("a"), job("b")], vec![])
      .unwrap();
    assert_eq!(again.cards().len(), 1);
    assert_eq!(registry.get("G2-1").unwrap().cards().len(), 1);
    assert_eq!(registry.index_references("G2-1"), 3);
    assert!(registry.card_owner("b").is_none());
  }

  #[test]
  fn removing_a_unit_clears_its_indexes() {
    let registry = UnitRegistry::new();
    registry.upsert_if_absent(unit(1));
    registry.complete_load("G2-1", vec![job("a")], vec![]).unwrap();
    assert!(registry.remove("G2-1").is_some());
    assert_eq!(registry.index_references("G2-1"), 0);
    assert!(registry.card_owner("a").is_none());
  }
}
