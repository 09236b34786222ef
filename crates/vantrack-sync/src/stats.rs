//! Production statistics over the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vantrack_core::{
  location::LocationType,
  unit::{HandoverState, SalesOrder},
};

use crate::registry::UnitRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductionStats {
  pub total:            usize,
  /// Finished units waiting to be handed over.
  pub car_park:         usize,
  pub handover_overdue: usize,
  pub handed_over:      usize,
}

impl ProductionStats {
  pub fn compute(registry: &UnitRegistry, now: DateTime<Utc>) -> Self {
    Self {
      total:            registry.len(),
      car_park:         registry.count(in_car_park),
      handover_overdue: registry.count(|u| handover_overdue(u, now)),
      handed_over:      registry.count(handed_over),
    }
  }
}

/// A unit has a redline, has not been handed over, and its current location
/// is a finishing location.
pub fn in_car_park(unit: &SalesOrder) -> bool {
  unit.redline_date().is_some()
    && unit.handover_state == HandoverState::UnhandedOver
    && unit.current_location_type() == Some(LocationType::Finishing)
}

/// The redline has passed and the unit has not been handed over.
pub fn handover_overdue(unit: &SalesOrder, now: DateTime<Utc>) -> bool {
  unit.handover_state != HandoverState::HandedOver
    && unit.redline_date().is_some_and(|d| d < now)
}

pub fn handed_over(unit: &SalesOrder) -> bool {
  unit.handover_state == HandoverState::HandedOver
}
