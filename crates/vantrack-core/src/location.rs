//! Locations, lines and the ordered bindings between them.
//!
//! A [`Location`] is a physical place in a workspace. A [`LineLocation`]
//! binds a location to a production line at a numeric order, and it is the
//! line-location (not the location row) that a unit's position history
//! records. Two sentinel line-locations, Pre-Production and
//! Post-Production, sit before and after every line.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

// ─── Structural records ──────────────────────────────────────────────────────

/// What kind of work happens at a location.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LocationType {
  Prep,
  Subassembly,
  Module,
  Bay,
  Finishing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
  pub workspace_id: Uuid,
  pub name:         String,
}

/// A production line within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
  pub line_id:      Uuid,
  pub workspace_id: Uuid,
  pub name:         String,
}

/// A product model built on one line. Unit names start with the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
  pub model_id: Uuid,
  pub line_id:  Uuid,
  pub name:     String,
  pub prefix:   String,
}

/// A department or area a card can be raised against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaOfOrigin {
  pub area_id: Uuid,
  pub line_id: Uuid,
  pub name:    String,
}

/// A place in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub location_id:   Uuid,
  /// `None` only for the two sentinels, which belong to every workspace.
  pub workspace_id:  Option<Uuid>,
  pub name:          String,
  pub description:   Option<String>,
  pub location_type: LocationType,
}

// ─── LineLocation ────────────────────────────────────────────────────────────

/// Which end of production a sentinel stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
  PreProduction,
  PostProduction,
}

/// A location bound to a line at an order.
///
/// Equality and ordering are defined by `(order, line)` only: two bindings
/// at the same order on the same line are the same position even when they
/// reference different location rows. See [`LineLocation::equals`] and
/// [`LineLocation::compare`].
#[derive(Debug, Clone)]
pub struct LineLocation {
  pub binding_id:      Uuid,
  /// `None` only for the sentinels, which are shared by every line.
  pub line_id:         Option<Uuid>,
  pub line_name:       Option<String>,
  pub order:           Decimal,
  pub location:        Arc<Location>,
  /// Custom display names keyed by external service type.
  pub display_names:   BTreeMap<String, String>,
  /// Names this position is known by in the inventory system.
  pub inventory_names: Vec<String>,
}

impl LineLocation {
  /// Same position: equal order on the same line.
  pub fn equals(a: &Self, b: &Self) -> bool {
    a.order == b.order && a.line_id == b.line_id
  }

  /// Total order on `(order, line)`.
  pub fn compare(a: &Self, b: &Self) -> Ordering {
    a.order
      .cmp(&b.order)
      .then_with(|| a.line_id.cmp(&b.line_id))
  }

  pub fn name(&self) -> &str { &self.location.name }

  pub fn location_type(&self) -> LocationType { self.location.location_type }

  pub fn sentinel(&self) -> Option<Sentinel> {
    if self.line_id.is_some() {
      return None;
    }
    if self.order == Decimal::MIN {
      Some(Sentinel::PreProduction)
    } else if self.order == Decimal::MAX {
      Some(Sentinel::PostProduction)
    } else {
      None
    }
  }

  pub fn is_sentinel(&self) -> bool { self.sentinel().is_some() }

  /// The custom display name registered for `service_type`, if any.
  pub fn display_name(&self, service_type: &str) -> Option<&str> {
    self.display_names.get(service_type).map(String::as_str)
  }
}

// ─── Sentinels ───────────────────────────────────────────────────────────────

const PRE_PRODUCTION_LOCATION: Uuid = Uuid::from_u128(0x01);
const PRE_PRODUCTION_BINDING: Uuid = Uuid::from_u128(0x02);
const POST_PRODUCTION_LOCATION: Uuid = Uuid::from_u128(0x03);
const POST_PRODUCTION_BINDING: Uuid = Uuid::from_u128(0x04);

/// The Pre-Production and Post-Production positions.
///
/// Construct once at startup and hand the same value (it clones cheaply) to
/// every catalog so that all catalogs share the same sentinel instances.
#[derive(Debug, Clone)]
pub struct Sentinels {
  pre_production:  Arc<LineLocation>,
  post_production: Arc<LineLocation>,
}

impl Sentinels {
  pub fn new() -> Self {
    Self {
      pre_production:  Arc::new(sentinel_binding(
        PRE_PRODUCTION_LOCATION,
        PRE_PRODUCTION_BINDING,
        "Pre-Production",
        LocationType::Prep,
        Decimal::MIN,
      )),
      post_production: Arc::new(sentinel_binding(
        POST_PRODUCTION_LOCATION,
        POST_PRODUCTION_BINDING,
        "Post-Production",
        LocationType::Finishing,
        Decimal::MAX,
      )),
    }
  }

  pub fn pre_production(&self) -> &Arc<LineLocation> { &self.pre_production }

  pub fn post_production(&self) -> &Arc<LineLocation> { &self.post_production }

  /// Whether `other` holds the very same sentinel instances.
  pub fn same_instances(&self, other: &Sentinels) -> bool {
    Arc::ptr_eq(&self.pre_production, &other.pre_production)
      && Arc::ptr_eq(&self.post_production, &other.post_production)
  }
}

impl Default for Sentinels {
  fn default() -> Self { Self::new() }
}

fn sentinel_binding(
  location_id: Uuid,
  binding_id: Uuid,
  name: &str,
  location_type: LocationType,
  order: Decimal,
) -> LineLocation {
  LineLocation {
    binding_id,
    line_id: None,
    line_name: None,
    order,
    location: Arc::new(Location {
      location_id,
      workspace_id: None,
      name: name.to_string(),
      description: None,
      location_type,
    }),
    display_names: BTreeMap::new(),
    inventory_names: Vec::new(),
  }
}

// ─── ProductionLocation ──────────────────────────────────────────────────────

/// A lightweight position that is not backed by catalog rows: an order, a
/// type and an optional line name.
///
/// Ordering uses the type as a tie-breaker for equal orders, which makes
/// comparisons across lines meaningful for this variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLocation {
  pub name:          String,
  pub order:         Decimal,
  pub location_type: LocationType,
  pub line:          Option<String>,
}

impl ProductionLocation {
  pub fn pre_production() -> Self {
    Self {
      name:          "Pre-Production".to_string(),
      order:         Decimal::MIN,
      location_type: LocationType::Prep,
      line:          None,
    }
  }

  pub fn post_production() -> Self {
    Self {
      name:          "Post-Production".to_string(),
      order:         Decimal::MAX,
      location_type: LocationType::Finishing,
      line:          None,
    }
  }

  pub fn bay(name: impl Into<String>, line: impl Into<String>, order: Decimal) -> Self {
    Self {
      name: name.into(),
      order,
      location_type: LocationType::Bay,
      line: Some(line.into()),
    }
  }

  pub fn equals(a: &Self, b: &Self) -> bool {
    Self::compare(a, b) == Ordering::Equal
  }

  /// Total order on `(order, type, line)`.
  pub fn compare(a: &Self, b: &Self) -> Ordering {
    a.order
      .cmp(&b.order)
      .then_with(|| a.location_type.cmp(&b.location_type))
      .then_with(|| a.line.cmp(&b.line))
  }

  pub fn is_sentinel(&self) -> bool {
    self.line.is_none()
      && (self.order == Decimal::MIN || self.order == Decimal::MAX)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn binding(line: Uuid, order: i64, name: &str) -> LineLocation {
    LineLocation {
      binding_id:      Uuid::new_v4(),
      line_id:         Some(line),
      line_name:       Some("Gen2".into()),
      order:           Decimal::from(order),
      location:        Arc::new(Location {
        location_id:   Uuid::new_v4(),
        workspace_id:  Some(Uuid::new_v4()),
        name:          name.into(),
        description:   None,
        location_type: LocationType::Bay,
      }),
      display_names:   BTreeMap::new(),
      inventory_names: Vec::new(),
    }
  }

  #[test]
  fn bindings_with_same_order_and_line_are_equal() {
    let line = Uuid::new_v4();
    let a = binding(line, 3, "Bay 3");
    let b = binding(line, 3, "Bay 3 (renamed row)");
    assert!(LineLocation::equals(&a, &b));
    assert_eq!(LineLocation::compare(&a, &b), Ordering::Equal);
  }

  #[test]
  fn bindings_on_different_lines_are_not_equal() {
    let a = binding(Uuid::new_v4(), 3, "Bay 3");
    let b = binding(Uuid::new_v4(), 3, "Bay 3");
    assert!(!LineLocation::equals(&a, &b));
  }

  #[test]
  fn sentinels_bracket_every_line() {
    let sentinels = Sentinels::new();
    let bay = binding(Uuid::new_v4(), 1, "Bay 1");
    assert_eq!(
      LineLocation::compare(sentinels.pre_production(), &bay),
      Ordering::Less
    );
    assert_eq!(
      LineLocation::compare(sentinels.post_production(), &bay),
      Ordering::Greater
    );
    assert_eq!(
      sentinels.pre_production().sentinel(),
      Some(Sentinel::PreProduction)
    );
    assert_eq!(bay.sentinel(), None);
  }

  #[test]
  fn cloned_sentinels_share_instances() {
    let sentinels = Sentinels::new();
    let copy = sentinels.clone();
    assert!(sentinels.same_instances(&copy));
    assert!(!sentinels.same_instances(&Sentinels::new()));
    // Separately constructed sentinels still compare equal by position.
    assert!(LineLocation::equals(
      sentinels.post_production(),
      Sentinels::new().post_production()
    ));
  }

  #[test]
  fn production_locations_break_ties_on_type() {
    let bay = ProductionLocation::bay("Bay 1", "Gen2", Decimal::ONE);
    let module = ProductionLocation {
      name:          "Module 1".into(),
      order:         Decimal::ONE,
      location_type: LocationType::Module,
      line:          Some("Gen2".into()),
    };
    assert_eq!(ProductionLocation::compare(&module, &bay), Ordering::Less);
    assert!(!ProductionLocation::equals(&module, &bay));
    assert!(ProductionLocation::pre_production().is_sentinel());
  }

  #[test]
  fn location_type_parses_case_insensitively() {
    assert_eq!("BAY".parse::<LocationType>().unwrap(), LocationType::Bay);
    assert_eq!(LocationType::Finishing.to_string(), "finishing");
  }
}
