//! Domain model for route drafts.
//!
//! Customers, depots, drivers and vehicles come from read-only snapshots
//! owned by the hosting application; the draft only ever holds shared
//! references to them.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::time_window::TimeWindow;

/// Fallback per-stop service time when the customer carries no estimate.
pub const DEFAULT_SERVICE_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(pub i64);

/// Identifier of a stop row in the remote store, present only once the
/// owning route has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteStopId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepotId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RouteStopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A delivery customer as known to the workspace.
///
/// Read-only to this crate: drafts share customers via `Arc` and never
/// mutate them.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub address: String,
    /// Geocoded location as (lat, lng).
    pub location: (f64, f64),
    /// Default delivery window, overridable per stop.
    pub default_window: Option<TimeWindow>,
    /// Default on-site service time estimate in minutes.
    pub service_estimate_minutes: Option<u32>,
    pub notes: Option<String>,
}

impl Customer {
    /// Service time to seed a new stop with: the customer estimate when
    /// present, the workspace fallback otherwise, never below one minute.
    pub fn default_service_minutes(&self) -> u32 {
        self.service_estimate_minutes
            .unwrap_or(DEFAULT_SERVICE_MINUTES)
            .max(1)
    }
}

/// Pin forcing a stop to the first or last position of the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionConstraint {
    First,
    #[default]
    None,
    Last,
}

impl PositionConstraint {
    /// Numeric sort tier understood by the remote store and optimizer:
    /// `first` sorts below everything, `last` above, with room between
    /// tiers for solver-internal ordering.
    pub fn order_code(self) -> i32 {
        match self {
            PositionConstraint::First => 10,
            PositionConstraint::None => 20,
            PositionConstraint::Last => 30,
        }
    }

    pub fn from_order_code(code: i32) -> Self {
        match code {
            10 => PositionConstraint::First,
            30 => PositionConstraint::Last,
            _ => PositionConstraint::None,
        }
    }

    /// Maps the optimizer's tier label (`"First"`, `"Last"`, anything else)
    /// onto a constraint. Case-insensitive.
    pub fn from_tier_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("first") {
            PositionConstraint::First
        } else if label.eq_ignore_ascii_case("last") {
            PositionConstraint::Last
        } else {
            PositionConstraint::None
        }
    }
}

impl fmt::Display for PositionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PositionConstraint::First => "first",
            PositionConstraint::None => "none",
            PositionConstraint::Last => "last",
        };
        f.write_str(label)
    }
}

/// Workspace-wide defaults applied when a stop is first added.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopDefaults {
    pub signature_required: bool,
    pub photo_required: bool,
}

/// One planned visit in the draft.
#[derive(Debug, Clone, PartialEq)]
pub struct StopEntry {
    pub customer: Arc<Customer>,
    pub route_stop_id: Option<RouteStopId>,
    /// Per-stop window overriding the customer default; `None` means "use
    /// the customer default if any".
    pub override_window: Option<TimeWindow>,
    pub position: PositionConstraint,
    /// On-site service time in minutes, always >= 1.
    pub service_minutes: u32,
    pub signature_required: bool,
    pub photo_required: bool,
    /// Stop-specific notes, distinct from the customer's own notes.
    pub notes: Option<String>,
    /// Populated only by a successful optimization; cleared when the draft
    /// is mutated in a way that invalidates the result.
    pub estimated_arrival: Option<NaiveTime>,
    pub estimated_departure: Option<NaiveTime>,
}

impl StopEntry {
    /// Builds a fresh entry with workspace defaults for the given customer.
    pub fn new(customer: Arc<Customer>, defaults: StopDefaults) -> Self {
        let service_minutes = customer.default_service_minutes();
        Self {
            customer,
            route_stop_id: None,
            override_window: None,
            position: PositionConstraint::None,
            service_minutes,
            signature_required: defaults.signature_required,
            photo_required: defaults.photo_required,
            notes: None,
            estimated_arrival: None,
            estimated_departure: None,
        }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer.id
    }

    /// The override window when set, the customer default otherwise.
    pub fn effective_window(&self) -> Option<&TimeWindow> {
        self.override_window
            .as_ref()
            .or(self.customer.default_window.as_ref())
    }

    pub fn clear_estimates(&mut self) {
        self.estimated_arrival = None;
        self.estimated_departure = None;
    }
}

/// A stop the optimizer could not place, kept aside so the operator can
/// adjust it and move it back into the draft.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedStop {
    pub entry: StopEntry,
    /// Human-readable explanation shown to the operator.
    pub reason: String,
    /// Raw conflict string from the optimizer, kept verbatim.
    pub time_window_conflict: Option<String>,
}

/// Route-level metadata edited alongside the stop list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteMetadata {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub depot: Option<DepotId>,
    pub driver: Option<DriverId>,
    pub vehicle: Option<VehicleId>,
    pub start_odometer: Option<u32>,
    pub notes: Option<String>,
    pub start_time: Option<NaiveTime>,
}

/// End-of-route depot arrival reported by the optimizer, kept separately
/// from the per-stop estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct EndDetails {
    pub estimated_arrival: Option<NaiveTime>,
}

/// Where the draft stands relative to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationStatus {
    /// Never optimized, or invalidated by a later edit.
    #[default]
    None,
    /// Every stop was placed.
    Success,
    /// Some stops were placed, the rest are in the exclusion list.
    Partial,
}
