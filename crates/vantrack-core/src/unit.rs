//! Units (sales orders): the vehicles tracked through production.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  card::{Card, CardKind},
  location::{LineLocation, LocationType, Model},
  position::PositionHistory,
};

// ─── Naming ──────────────────────────────────────────────────────────────────

/// A unit name resolved against the catalog's models.
#[derive(Debug, Clone)]
pub struct UnitName {
  pub model:  Arc<Model>,
  pub number: u32,
}

impl UnitName {
  /// The canonical unit name: model prefix followed by the sequence number.
  pub fn name(&self) -> String {
    format!("{}{}", self.model.prefix, self.number)
  }
}

// ─── Handover ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HandoverState {
  #[default]
  Unknown,
  UnhandedOver,
  HandedOver,
}

/// One entry in a unit's redline history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverDate {
  pub date:        DateTime<Utc>,
  /// When this redline was first observed.
  pub recorded_at: DateTime<Utc>,
}

// ─── SalesOrder ──────────────────────────────────────────────────────────────

/// One tracked unit.
///
/// Card data is populated lazily by the load coordinator and can be dropped
/// again with an unload; the identity, position history and handover
/// history survive an unload.
#[derive(Debug, Clone)]
pub struct SalesOrder {
  name:                       String,
  pub model:                  Arc<Model>,
  pub number:                 u32,
  /// The unit's board id in the external tool, once resolved.
  pub external_id:            Option<String>,
  pub positions:              PositionHistory<Arc<LineLocation>>,
  cards:                      Vec<Card>,
  pub handover_state:         HandoverState,
  handover_dates:             Vec<HandoverDate>,
  pub production_info_loaded: bool,
  pub inventory_info_loaded:  bool,
}

impl SalesOrder {
  pub fn new(unit_name: UnitName) -> Self {
    Self {
      name:                   unit_name.name(),
      model:                  unit_name.model,
      number:                 unit_name.number,
      external_id:            None,
      positions:              PositionHistory::new(),
      cards:                  Vec::new(),
      handover_state:         HandoverState::Unknown,
      handover_dates:         Vec::new(),
      production_info_loaded: false,
      inventory_info_loaded:  false,
    }
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn line_id(&self) -> Uuid { self.model.line_id }

  pub fn current_position(&self) -> Option<&Arc<LineLocation>> {
    self.positions.current_position()
  }

  pub fn current_location_type(&self) -> Option<LocationType> {
    self.current_position().map(|p| p.location_type())
  }

  // ── Cards ─────────────────────────────────────────────────────────────

  pub fn cards(&self) -> &[Card] { &self.cards }

  pub fn cards_of(&self, kind: CardKind) -> impl Iterator<Item = &Card> {
    self.cards.iter().filter(move |c| c.kind() == kind)
  }

  pub fn job_cards(&self) -> impl Iterator<Item = &Card> { self.cards_of(CardKind::Job) }

  pub fn red_cards(&self) -> impl Iterator<Item = &Card> { self.cards_of(CardKind::Red) }

  pub fn yellow_cards(&self) -> impl Iterator<Item = &Card> { self.cards_of(CardKind::Yellow) }

  pub fn push_card(&mut self, card: Card) { self.cards.push(card); }

  /// Detach every card from the unit, handing them back to the caller.
  pub fn take_cards(&mut self) -> Vec<Card> { std::mem::take(&mut self.cards) }

  // ── Handover ──────────────────────────────────────────────────────────

  pub fn handover_dates(&self) -> &[HandoverDate] { &self.handover_dates }

  /// The committed delivery date: the most recently recorded redline.
  pub fn redline_date(&self) -> Option<DateTime<Utc>> {
    self.handover_dates.last().map(|h| h.date)
  }

  /// Append `date` to the redline history unless it is already the current
  /// redline. Returns whether an entry was added.
  pub fn record_handover_date(
    &mut self,
    date: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
  ) -> bool {
    if self.redline_date() == Some(date) {
      return false;
    }
    self.handover_dates.push(HandoverDate { date, recorded_at });
    true
  }

  pub fn summary(&self) -> UnitSummary {
    UnitSummary {
      name:             self.name.clone(),
      model:            self.model.name.clone(),
      external_id:      self.external_id.clone(),
      current_position: self.current_position().map(|p| p.name().to_string()),
      last_moved_at:    self.positions.last_moved_at(),
      handover_state:   self.handover_state,
      redline_date:     self.redline_date(),
      loaded:           self.production_info_loaded,
      job_cards:        self.job_cards().count(),
      red_cards:        self.red_cards().count(),
      open_red_cards:   self.red_cards().filter(|c| c.is_open()).count(),
      yellow_cards:     self.yellow_cards().count(),
    }
  }
}

/// A flat, serialisable view of a unit for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
  pub name:             String,
  pub model:            String,
  pub external_id:      Option<String>,
  pub current_position: Option<String>,
  pub last_moved_at:    Option<DateTime<Utc>>,
  pub handover_state:   HandoverState,
  pub redline_date:     Option<DateTime<Utc>>,
  pub loaded:           bool,
  pub job_cards:        usize,
  pub red_cards:        usize,
  pub open_red_cards:   usize,
  pub yellow_cards:     usize,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::card::{CardData, CardStatus, RedCard};

  fn unit() -> SalesOrder {
    SalesOrder::new(UnitName {
      model:  Arc::new(Model {
        model_id: Uuid::new_v4(),
        line_id:  Uuid::new_v4(),
        name:     "Gen 2".into(),
        prefix:   "G2-".into(),
      }),
      number: 117,
    })
  }

  #[test]
  fn name_is_prefix_and_number() {
    assert_eq!(unit().name(), "G2-117");
  }

  #[test]
  fn redline_history_only_grows_on_change() {
    let mut u = unit();
    let d1 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let d2 = Utc.with_ymd_and_hms(2024, 5, 8, 0, 0, 0).unwrap();
    let now = Utc::now();
    assert!(u.record_handover_date(d1, now));
    assert!(!u.record_handover_date(d1, now));
    assert!(u.record_handover_date(d2, now));
    assert!(u.record_handover_date(d1, now));
    assert_eq!(u.handover_dates().len(), 3);
    assert_eq!(u.redline_date(), Some(d1));
  }

  #[test]
  fn summary_of_a_fresh_unit() {
    let s = unit().summary();
    assert_eq!(s.name, "G2-117");
    assert_eq!(s.current_position, None);
    assert_eq!(s.handover_state, HandoverState::Unknown);
    assert!(!s.loaded);
    assert_eq!(s.last_moved_at, None);
  }

  #[test]
  fn summary_counts_only_open_red_cards() {
    let red = |card_id: &str, status| {
      Card::Red(RedCard {
        data:       CardData {
          card_id: card_id.into(),
          name: "Cracked panel".into(),
          status,
          list_name: None,
          moved_at: None,
          area_of_origin: None,
          created_at: None,
          completed_at: None,
          checklists: vec![],
          comments: vec![],
          attachments: vec![],
        },
        flag_issue: None,
      })
    };
    let mut u = unit();
    u.push_card(red("r1", CardStatus::InProgress));
    u.push_card(red("r2", CardStatus::Completed));

    let s = u.summary();
    assert_eq!(s.red_cards, 2);
    assert_eq!(s.open_red_cards, 1);
  }
}
