//! The in-memory working set of a route being edited.
//!
//! `RouteDraft` is a plain value with explicit mutation methods; it owns no
//! I/O. Constraint checks run before anything is applied, so a rejected
//! operation leaves the draft exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::model::{
    Customer, CustomerId, EndDetails, ExcludedStop, OptimizationStatus, PositionConstraint,
    RouteId, RouteMetadata, RouteStopId, StopDefaults, StopEntry,
};
use crate::policy::{self, PolicyViolation};
use crate::time_window::{self, TimeWindowError, WindowNote};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error(transparent)]
    Window(#[from] TimeWindowError),
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("no stop at index {index}")]
    NoSuchStop { index: usize },
    #[error("customer {customer} is not in the route")]
    UnknownCustomer { customer: CustomerId },
    #[error("customer {customer} is not in the exclusion list")]
    UnknownExclusion { customer: CustomerId },
    #[error("reorder must carry exactly the current stops")]
    ReorderMismatch,
}

/// Result of a single-customer add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The customer was already in the draft; nothing changed.
    AlreadyPresent,
}

/// Counts reported back from a bulk add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchAddReport {
    pub added: usize,
    pub skipped_duplicates: usize,
}

/// Raw window fields from the stop form; blank means "no bound".
#[derive(Debug, Clone, Default)]
pub struct WindowEdit {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Partial update for one stop. `None` fields are left untouched; an update
/// with every field `None` is treated as a cancelled edit and ignored.
#[derive(Debug, Clone, Default)]
pub struct StopUpdate {
    /// Replaces the override window when present: resolved through the
    /// window validator, cleared when both bounds are blank.
    pub window: Option<WindowEdit>,
    pub position: Option<PositionConstraint>,
    pub service_minutes: Option<u32>,
    pub signature_required: Option<bool>,
    pub photo_required: Option<bool>,
    /// Replaces the stop notes; an empty string clears them.
    pub notes: Option<String>,
}

impl StopUpdate {
    pub fn is_empty(&self) -> bool {
        self.window.is_none()
            && self.position.is_none()
            && self.service_minutes.is_none()
            && self.signature_required.is_none()
            && self.photo_required.is_none()
            && self.notes.is_none()
    }
}

/// What an applied update wants the caller to surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Advisories from window normalization (derived bound, midnight nudge).
    pub window_notes: Vec<WindowNote>,
    /// The normalized override matched the customer default and was dropped.
    pub override_dropped: bool,
    /// Nothing was supplied; the draft was not touched.
    pub ignored_empty: bool,
}

/// Ordered stop list plus route metadata, optimization state and the
/// exclusion list left behind by a partial optimization.
#[derive(Debug, Clone, Default)]
pub struct RouteDraft {
    pub(crate) route_id: Option<RouteId>,
    pub metadata: RouteMetadata,
    pub(crate) stops: Vec<StopEntry>,
    pub(crate) excluded: Vec<ExcludedStop>,
    pub(crate) status: OptimizationStatus,
    pub(crate) total_distance_km: Option<f64>,
    pub(crate) optimized_duration_minutes: Option<u32>,
    pub(crate) end_details: Option<EndDetails>,
    pub(crate) defaults: StopDefaults,
}

impl RouteDraft {
    /// Empty draft for a brand-new route.
    pub fn new(defaults: StopDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Draft hydrated from a previously persisted route (edit mode).
    pub fn from_persisted(
        route_id: RouteId,
        metadata: RouteMetadata,
        stops: Vec<StopEntry>,
        defaults: StopDefaults,
    ) -> Self {
        Self {
            route_id: Some(route_id),
            metadata,
            stops,
            defaults,
            ..Self::default()
        }
    }

    pub fn route_id(&self) -> Option<RouteId> {
        self.route_id
    }

    pub fn stops(&self) -> &[StopEntry] {
        &self.stops
    }

    pub fn excluded(&self) -> &[ExcludedStop] {
        &self.excluded
    }

    pub fn status(&self) -> OptimizationStatus {
        self.status
    }

    pub fn is_optimized(&self) -> bool {
        self.status != OptimizationStatus::None
    }

    pub fn total_distance_km(&self) -> Option<f64> {
        self.total_distance_km
    }

    pub fn end_details(&self) -> Option<&EndDetails> {
        self.end_details.as_ref()
    }

    pub fn defaults(&self) -> StopDefaults {
        self.defaults
    }

    pub fn contains_customer(&self, customer: CustomerId) -> bool {
        self.stops.iter().any(|stop| stop.customer_id() == customer)
    }

    /// Appends a stop for the customer with workspace defaults.
    ///
    /// Adding someone already in the draft is a no-op. An actual append
    /// invalidates any prior optimization result.
    pub fn add_stop(&mut self, customer: Arc<Customer>) -> Result<AddOutcome, DraftError> {
        if self.contains_customer(customer.id) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        let entry = StopEntry::new(customer, self.defaults);
        policy::check_addition(&self.stops, std::slice::from_ref(&entry))?;

        self.stops.push(entry);
        self.invalidate_optimization();
        Ok(AddOutcome::Added)
    }

    /// Bulk add: duplicates are filtered out first, then the survivors pass
    /// the stop-count policy as one atomic batch. Either every survivor is
    /// appended or none is.
    pub fn add_stops<I>(&mut self, customers: I) -> Result<BatchAddReport, DraftError>
    where
        I: IntoIterator<Item = Arc<Customer>>,
    {
        let mut incoming: Vec<StopEntry> = Vec::new();
        let mut skipped = 0usize;
        for customer in customers {
            let duplicate = self.contains_customer(customer.id)
                || incoming.iter().any(|entry| entry.customer_id() == customer.id);
            if duplicate {
                skipped += 1;
            } else {
                incoming.push(StopEntry::new(customer, self.defaults));
            }
        }

        if incoming.is_empty() {
            return Ok(BatchAddReport {
                added: 0,
                skipped_duplicates: skipped,
            });
        }

        policy::check_addition(&self.stops, &incoming)?;

        let added = incoming.len();
        self.stops.extend(incoming);
        self.invalidate_optimization();
        Ok(BatchAddReport {
            added,
            skipped_duplicates: skipped,
        })
    }

    /// Removes the stop for the customer and invalidates the optimization
    /// result. The removed entry is handed back to the caller.
    pub fn remove_stop(&mut self, customer: CustomerId) -> Result<StopEntry, DraftError> {
        let index = self
            .stops
            .iter()
            .position(|stop| stop.customer_id() == customer)
            .ok_or(DraftError::UnknownCustomer { customer })?;

        let removed = self.stops.remove(index);
        self.invalidate_optimization();
        Ok(removed)
    }

    /// Replaces the stop order with the given customer sequence.
    ///
    /// Deliberately does NOT invalidate the optimization status or the
    /// per-stop estimated times: fine-tuning an optimized route by hand is
    /// allowed, even though the estimates may no longer be accurate for the
    /// new order. The sequence must be a permutation of the current stops.
    pub fn reorder_stops(&mut self, order: &[CustomerId]) -> Result<(), DraftError> {
        if order.len() != self.stops.len() {
            return Err(DraftError::ReorderMismatch);
        }

        // Validate the permutation before moving anything.
        let mut index_of: HashMap<CustomerId, usize> = self
            .stops
            .iter()
            .enumerate()
            .map(|(index, stop)| (stop.customer_id(), index))
            .collect();
        let mut picks = Vec::with_capacity(order.len());
        for customer in order {
            match index_of.remove(customer) {
                Some(index) => picks.push(index),
                None => return Err(DraftError::ReorderMismatch),
            }
        }

        let mut slots: Vec<Option<StopEntry>> = self.stops.drain(..).map(Some).collect();
        self.stops = picks
            .into_iter()
            .map(|index| slots[index].take().expect("each index picked exactly once"))
            .collect();
        Ok(())
    }

    /// Applies a partial update to the stop at `index`.
    ///
    /// An empty update is ignored (cancelled edit upstream). Otherwise the
    /// whole update is validated first (window normalization, position
    /// exclusivity) and rejected in full on any failure. An override window
    /// that normalizes to the customer's own default is dropped as
    /// redundant. Applying a non-empty update invalidates the optimization
    /// result.
    pub fn update_stop(
        &mut self,
        index: usize,
        update: StopUpdate,
    ) -> Result<UpdateReport, DraftError> {
        if index >= self.stops.len() {
            return Err(DraftError::NoSuchStop { index });
        }
        if update.is_empty() {
            return Ok(UpdateReport {
                ignored_empty: true,
                ..UpdateReport::default()
            });
        }

        // Validate everything before touching the entry.
        let resolved = match &update.window {
            Some(edit) => Some(time_window::resolve(
                edit.start.as_deref(),
                edit.end.as_deref(),
            )?),
            None => None,
        };
        if let Some(position) = update.position {
            policy::check_position(&self.stops, Some(index), position)?;
        }

        let mut report = UpdateReport::default();
        let entry = &mut self.stops[index];

        if let Some(resolved) = resolved {
            entry.override_window = match resolved {
                Some(resolved) => {
                    report.window_notes = resolved.notes;
                    if entry.customer.default_window == Some(resolved.window) {
                        report.override_dropped = true;
                        None
                    } else {
                        Some(resolved.window)
                    }
                }
                None => None,
            };
        }
        if let Some(position) = update.position {
            entry.position = position;
        }
        if let Some(minutes) = update.service_minutes {
            entry.service_minutes = minutes.max(1);
        }
        if let Some(signature) = update.signature_required {
            entry.signature_required = signature;
        }
        if let Some(photo) = update.photo_required {
            entry.photo_required = photo;
        }
        if let Some(notes) = update.notes {
            let trimmed = notes.trim();
            entry.notes = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        self.invalidate_optimization();
        Ok(report)
    }

    /// Moves an excluded stop back into the draft for another attempt.
    ///
    /// The stop-count ceiling is re-checked first; the restored entry loses
    /// its stale estimates and the draft needs re-optimizing.
    pub fn restore_excluded(&mut self, customer: CustomerId) -> Result<(), DraftError> {
        let index = self
            .excluded
            .iter()
            .position(|excluded| excluded.entry.customer_id() == customer)
            .ok_or(DraftError::UnknownExclusion { customer })?;

        policy::check_addition(
            &self.stops,
            std::slice::from_ref(&self.excluded[index].entry),
        )?;

        let mut entry = self.excluded.remove(index).entry;
        entry.clear_estimates();
        self.stops.push(entry);
        self.invalidate_optimization();
        Ok(())
    }

    /// Clears the draft back to an empty new-route state.
    pub fn reset(&mut self) {
        let defaults = self.defaults;
        *self = Self::new(defaults);
    }

    /// Total route duration in minutes.
    ///
    /// The optimizer-reported total when one is in effect; otherwise an
    /// estimate: per-stop service time, an average travel allowance per stop
    /// that shrinks as density grows (20 min up to 5 stops, 15 up to 10,
    /// 12 beyond), a 25 minute return-to-depot allowance, and 3 minutes of
    /// early-arrival buffer per time-windowed stop.
    pub fn total_duration_minutes(&self) -> u32 {
        if let Some(total) = self.optimized_duration_minutes {
            return total;
        }

        let count = self.stops.len() as u32;
        if count == 0 {
            return 0;
        }

        let service: u32 = self.stops.iter().map(|stop| stop.service_minutes).sum();
        let travel_per_stop = match count {
            0..=5 => 20,
            6..=10 => 15,
            _ => 12,
        };
        let windowed = self
            .stops
            .iter()
            .filter(|stop| stop.effective_window().is_some())
            .count() as u32;

        service + travel_per_stop * count + 25 + 3 * windowed
    }

    /// Records the remote identity assigned when the route is first
    /// persisted, wiring each stop to its created row.
    pub(crate) fn assign_remote_identity(
        &mut self,
        route_id: RouteId,
        stop_ids: &[(CustomerId, RouteStopId)],
    ) {
        self.route_id = Some(route_id);
        let by_customer: HashMap<CustomerId, RouteStopId> = stop_ids.iter().copied().collect();
        for stop in &mut self.stops {
            if let Some(id) = by_customer.get(&stop.customer_id()) {
                stop.route_stop_id = Some(*id);
            }
        }
    }

    /// Drops a stale optimization result after a structural or
    /// constraint-affecting edit. Exclusions stay visible so the operator
    /// can still reinstate them.
    pub(crate) fn invalidate_optimization(&mut self) {
        if self.status != OptimizationStatus::None {
            debug!(status = ?self.status, "optimization result invalidated by edit");
        }
        self.status = OptimizationStatus::None;
        self.total_distance_km = None;
        self.optimized_duration_minutes = None;
        self.end_details = None;
        for stop in &mut self.stops {
            stop.clear_estimates();
        }
    }
}
