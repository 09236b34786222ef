//! Position history: the chronological movement record of one unit.
//!
//! Entries are only ever appended. Every insertion is validated against the
//! whole existing history before anything is written:
//!
//! 1. no location may appear twice;
//! 2. only bays (and the two sentinels) may be entered;
//! 3. every non-sentinel entry must be on the same line;
//! 4. no two entries may share a timestamp.
//!
//! Reads always see the entries in ascending timestamp order, whatever order
//! they were inserted in.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  error::PositionError,
  location::{LineLocation, LocationType, ProductionLocation},
};

// ─── TrackedPosition ─────────────────────────────────────────────────────────

/// A position that can be recorded in a [`PositionHistory`].
pub trait TrackedPosition: Clone {
  type LineKey: PartialEq + fmt::Debug;

  /// Human-readable name, used in error messages.
  fn label(&self) -> &str;

  fn location_type(&self) -> LocationType;

  fn is_sentinel(&self) -> bool;

  fn line_key(&self) -> Option<&Self::LineKey>;

  /// Human-readable line name, used in error messages.
  fn line_label(&self) -> String;

  fn same_position(&self, other: &Self) -> bool;
}

impl TrackedPosition for Arc<LineLocation> {
  type LineKey = Uuid;

  fn label(&self) -> &str { self.name() }

  fn location_type(&self) -> LocationType { LineLocation::location_type(self) }

  fn is_sentinel(&self) -> bool { LineLocation::is_sentinel(self) }

  fn line_key(&self) -> Option<&Uuid> { self.line_id.as_ref() }

  fn line_label(&self) -> String {
    match (&self.line_name, self.line_id) {
      (Some(name), _) => name.clone(),
      (None, Some(id)) => id.to_string(),
      (None, None) => "<none>".to_string(),
    }
  }

  fn same_position(&self, other: &Self) -> bool {
    LineLocation::equals(self, other)
  }
}

impl TrackedPosition for ProductionLocation {
  type LineKey = String;

  fn label(&self) -> &str { &self.name }

  fn location_type(&self) -> LocationType { self.location_type }

  fn is_sentinel(&self) -> bool { ProductionLocation::is_sentinel(self) }

  fn line_key(&self) -> Option<&String> { self.line.as_ref() }

  fn line_label(&self) -> String {
    self.line.clone().unwrap_or_else(|| "<none>".to_string())
  }

  fn same_position(&self, other: &Self) -> bool {
    ProductionLocation::equals(self, other)
  }
}

// ─── PositionHistory ─────────────────────────────────────────────────────────

/// One recorded move: the unit entered `position` at `at`.
#[derive(Debug, Clone)]
pub struct PositionChange<P> {
  pub at:       DateTime<Utc>,
  pub position: P,
}

/// Append-only, timestamp-ordered position record for a single unit.
#[derive(Debug, Clone)]
pub struct PositionHistory<P = Arc<LineLocation>> {
  /// Always sorted by `at`, ascending.
  entries: Vec<PositionChange<P>>,
}

impl<P> Default for PositionHistory<P> {
  fn default() -> Self { Self { entries: Vec::new() } }
}

impl<P: TrackedPosition> PositionHistory<P> {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// The entry with the latest timestamp.
  pub fn current_position(&self) -> Option<&P> {
    self.entries.last().map(|e| &e.position)
  }

  /// Timestamp of the latest move.
  pub fn last_moved_at(&self) -> Option<DateTime<Utc>> {
    self.entries.last().map(|e| e.at)
  }

  pub fn contains(&self, position: &P) -> bool {
    self.entries.iter().any(|e| e.position.same_position(position))
  }

  /// Record a move into `position` at `at`.
  pub fn add_position_change(
    &mut self,
    at: DateTime<Utc>,
    position: P,
  ) -> Result<(), PositionError> {
    validate(&self.entries, &[], at, &position)?;
    self.insert(PositionChange { at, position });
    Ok(())
  }

  /// Record several moves at once. Either every change is valid (against the
  /// history and against each other) and all are inserted, or none are.
  pub fn add_position_change_range<I>(
    &mut self,
    changes: I,
  ) -> Result<(), PositionError>
  where
    I: IntoIterator<Item = (DateTime<Utc>, P)>,
  {
    let mut staged: Vec<PositionChange<P>> = Vec::new();
    for (at, position) in changes {
      validate(&self.entries, &staged, at, &position)?;
      staged.push(PositionChange { at, position });
    }
    for change in staged {
      self.insert(change);
    }
    Ok(())
  }

  /// The position effective at `at`, looking forward: the first entry whose
  /// timestamp is at or after `at`. `None` if `at` precedes the first move
  /// or follows the last one.
  pub fn position_at(&self, at: DateTime<Utc>) -> Option<&P> {
    let first = self.entries.first()?;
    if at < first.at {
      return None;
    }
    let idx = self.entries.partition_point(|e| e.at < at);
    self.entries.get(idx).map(|e| &e.position)
  }

  /// The window during which `position` was the active position: from the
  /// move into it until the next move, or open-ended if it is the latest.
  pub fn active_date_range(
    &self,
    position: &P,
  ) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let idx = self
      .entries
      .iter()
      .position(|e| e.position.same_position(position))?;
    let start = self.entries[idx].at;
    let end = self.entries.get(idx + 1).map(|e| e.at);
    Some((start, end))
  }

  /// The history as `(timestamp, position)` pairs in ascending order. The
  /// iterator is cheap to clone, so it can be restarted.
  pub fn iter(&self) -> Iter<'_, P> {
    Iter { inner: self.entries.iter() }
  }

  fn insert(&mut self, change: PositionChange<P>) {
    let idx = self.entries.partition_point(|e| e.at < change.at);
    self.entries.insert(idx, change);
  }
}

fn validate<P: TrackedPosition>(
  existing: &[PositionChange<P>],
  staged: &[PositionChange<P>],
  at: DateTime<Utc>,
  position: &P,
) -> Result<(), PositionError> {
  let all = || existing.iter().chain(staged.iter());

  if all().any(|e| e.position.same_position(position)) {
    return Err(PositionError::DuplicateLocation {
      location: position.label().to_string(),
    });
  }

  if !position.is_sentinel() && position.location_type() != LocationType::Bay {
    return Err(PositionError::NotABay {
      location:      position.label().to_string(),
      location_type: position.location_type(),
    });
  }

  if !position.is_sentinel()
    && let Some(anchor) = all().find(|e| !e.position.is_sentinel())
    && anchor.position.line_key() != position.line_key()
  {
    return Err(PositionError::LineMismatch {
      location: position.label().to_string(),
      expected: anchor.position.line_label(),
      found:    position.line_label(),
    });
  }

  if all().any(|e| e.at == at) {
    return Err(PositionError::DuplicateTimestamp { at });
  }

  Ok(())
}

// ─── Iteration ───────────────────────────────────────────────────────────────

/// Iterator over a [`PositionHistory`] in ascending timestamp order.
#[derive(Debug, Clone)]
pub struct Iter<'a, P> {
  inner: std::slice::Iter<'a, PositionChange<P>>,
}

impl<'a, P> Iterator for Iter<'a, P> {
  type Item = (DateTime<Utc>, &'a P);

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.next().map(|e| (e.at, &e.position))
  }

  fn size_hint(&self) -> (usize, Option<usize>) { self.inner.size_hint() }
}

impl<P> ExactSizeIterator for Iter<'_, P> {}

impl<'a, P: TrackedPosition> IntoIterator for &'a PositionHistory<P> {
  type Item = (DateTime<Utc>, &'a P);
  type IntoIter = Iter<'a, P>;

  fn into_iter(self) -> Self::IntoIter { self.iter() }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use rust_decimal::Decimal;

  use super::*;
  use crate::PositionField;

  fn t(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
  }

  fn bay(n: i64) -> ProductionLocation {
    ProductionLocation::bay(format!("Bay {n}"), "Gen2", Decimal::from(n))
  }

  fn expo_bay(n: i64) -> ProductionLocation {
    ProductionLocation::bay(format!("Expo Bay {n}"), "Expo", Decimal::from(n))
  }

  fn history() -> PositionHistory<ProductionLocation> {
    let mut h = PositionHistory::new();
    h.add_position_change(t(0), ProductionLocation::pre_production()).unwrap();
    h.add_position_change(t(1), bay(1)).unwrap();
    h.add_position_change(t(2), bay(3)).unwrap();
    h
  }

  fn names(h: &PositionHistory<ProductionLocation>) -> Vec<String> {
    h.iter().map(|(_, p)| p.name.clone()).collect()
  }

  #[test]
  fn empty_history_has_no_current_position() {
    let h: PositionHistory<ProductionLocation> = PositionHistory::new();
    assert!(h.current_position().is_none());
    assert!(h.position_at(t(0)).is_none());
    assert_eq!(h.iter().count(), 0);
  }

  #[test]
  fn skipping_bays_is_allowed() {
    let h = history();
    assert_eq!(h.current_position().unwrap().name, "Bay 3");
    assert_eq!(names(&h), ["Pre-Production", "Bay 1", "Bay 3"]);
  }

  #[test]
  fn duplicate_location_is_rejected() {
    let mut h = history();
    let err = h.add_position_change(t(5), bay(1)).unwrap_err();
    assert_eq!(err.field(), PositionField::Location);
    assert_eq!(h.len(), 3);
  }

  #[test]
  fn non_bay_is_rejected() {
    let mut h = history();
    let module = ProductionLocation {
      name:          "Module A".into(),
      order:         Decimal::from(10),
      location_type: LocationType::Module,
      line:          Some("Gen2".into()),
    };
    let err = h.add_position_change(t(5), module).unwrap_err();
    assert_eq!(err.field(), PositionField::Type);
    assert_eq!(h.len(), 3);
  }

  #[test]
  fn other_line_is_rejected() {
    let mut h = history();
    let err = h.add_position_change(t(5), expo_bay(4)).unwrap_err();
    assert_eq!(err.field(), PositionField::Line);
    assert_eq!(h.current_position().unwrap().name, "Bay 3");
  }

  #[test]
  fn duplicate_timestamp_is_rejected() {
    let mut h = history();
    let err = h.add_position_change(t(1), bay(4)).unwrap_err();
    assert_eq!(err.field(), PositionField::Date);
    assert_eq!(h.len(), 3);
  }

  #[test]
  fn sentinels_do_not_pin_the_line() {
    let mut h = PositionHistory::new();
    h.add_position_change(t(0), ProductionLocation::pre_production()).unwrap();
    h.add_position_change(t(1), expo_bay(1)).unwrap();
    h.add_position_change(t(2), ProductionLocation::post_production()).unwrap();
    assert_eq!(h.current_position().unwrap().name, "Post-Production");
  }

  #[test]
  fn reads_are_sorted_whatever_the_insert_order() {
    let mut h = PositionHistory::new();
    h.add_position_change(t(3), bay(4)).unwrap();
    h.add_position_change(t(1), bay(2)).unwrap();
    h.add_position_change(t(2), bay(1)).unwrap();
    let stamps: Vec<_> = h.iter().map(|(at, _)| at).collect();
    assert_eq!(stamps, [t(1), t(2), t(3)]);
    assert_eq!(h.current_position().unwrap().name, "Bay 4");
    // The iterator can be restarted.
    let it = h.iter();
    assert_eq!(it.clone().count(), it.count());
  }

  #[test]
  fn range_is_all_or_nothing() {
    let mut h = history();
    let err = h
      .add_position_change_range([(t(3), bay(4)), (t(4), bay(1))])
      .unwrap_err();
    assert_eq!(err.field(), PositionField::Location);
    assert_eq!(h.len(), 3);

    h.add_position_change_range([(t(4), bay(5)), (t(3), bay(4))]).unwrap();
    assert_eq!(names(&h), ["Pre-Production", "Bay 1", "Bay 3", "Bay 4", "Bay 5"]);
  }

  #[test]
  fn range_checks_changes_against_each_other() {
    let mut h = PositionHistory::new();
    let err = h
      .add_position_change_range([(t(1), bay(1)), (t(1), bay(2))])
      .unwrap_err();
    assert_eq!(err.field(), PositionField::Date);

    let err = h
      .add_position_change_range([(t(1), bay(1)), (t(2), expo_bay(2))])
      .unwrap_err();
    assert_eq!(err.field(), PositionField::Line);
    assert!(h.is_empty());
  }

  #[test]
  fn position_at_looks_forward() {
    let h = history();
    assert!(h.position_at(t(0) - Duration::minutes(1)).is_none());
    assert_eq!(h.position_at(t(0)).unwrap().name, "Pre-Production");
    assert_eq!(h.position_at(t(0) + Duration::minutes(30)).unwrap().name, "Bay 1");
    assert_eq!(h.position_at(t(2)).unwrap().name, "Bay 3");
    assert!(h.position_at(t(3)).is_none());
  }

  #[test]
  fn active_date_range_spans_to_next_move() {
    let h = history();
    assert_eq!(h.active_date_range(&bay(1)), Some((t(1), Some(t(2)))));
    assert_eq!(h.active_date_range(&bay(3)), Some((t(2), None)));
    assert_eq!(h.active_date_range(&bay(2)), None);
  }
}
