//! Reconciliation of optimizer outcomes into the draft.
//!
//! The optimizer answers with an ordered stop list that carries only thin
//! stop records. Reconciliation joins that order back onto the draft the
//! operator was editing, so overrides, notes, proof-of-delivery flags and
//! persisted row ids survive the round trip, and turns exclusion records
//! into entries the operator can read and reinstate.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::directory::CustomerDirectory;
use crate::draft::RouteDraft;
use crate::model::{
    Customer, CustomerId, EndDetails, ExcludedStop, OptimizationStatus, StopDefaults, StopEntry,
};
use crate::optimizer_data::{
    OptimizeOutcome, RawCustomer, RawEndDetails, RawExclusion, RawStop, RouteTotals,
};
use crate::time_window::{self, DISPLAY_FORMAT};

/// Shown when the optimizer fails without an explanation of its own.
const FALLBACK_FAILURE_MESSAGE: &str = "the optimizer could not produce a route";

/// Shown for an excluded stop with no window and no optimizer reason.
const FALLBACK_EXCLUSION_REASON: &str = "could not be placed on the route";

/// What a reconciliation did, for logging and operator feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub status: OptimizationStatus,
    pub placed: usize,
    pub excluded: usize,
    /// Operator-facing explanation; present only for a failed run.
    pub failure_message: Option<String>,
}

/// Applies a classified optimizer outcome to the draft.
///
/// The directory is the fallback source for customer records when the
/// optimizer mentions a customer the draft no longer holds. Applying the
/// same success outcome twice leaves the draft unchanged.
pub fn apply_outcome(
    draft: &mut RouteDraft,
    outcome: OptimizeOutcome,
    directory: &CustomerDirectory,
) -> ReconcileSummary {
    match outcome {
        OptimizeOutcome::Failure { message } => apply_failure(draft, message),
        OptimizeOutcome::Partial {
            excluded,
            stops,
            totals,
            end_details,
        } => apply_partial(draft, excluded, stops, totals, end_details, directory),
        OptimizeOutcome::Success {
            stops,
            totals,
            end_details,
        } => apply_success(draft, stops, totals, end_details, directory),
    }
}

/// Hard failure: the stop list is left exactly as it was, nothing of a
/// failed result is applied.
fn apply_failure(draft: &mut RouteDraft, message: Option<String>) -> ReconcileSummary {
    draft.status = OptimizationStatus::None;
    draft.excluded.clear();
    draft.total_distance_km = None;
    draft.optimized_duration_minutes = None;
    draft.end_details = None;

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string());
    warn!(%message, "optimization failed");

    ReconcileSummary {
        status: OptimizationStatus::None,
        placed: 0,
        excluded: 0,
        failure_message: Some(message),
    }
}

fn apply_success(
    draft: &mut RouteDraft,
    raw_stops: Vec<RawStop>,
    totals: RouteTotals,
    end_details: Option<RawEndDetails>,
    directory: &CustomerDirectory,
) -> ReconcileSummary {
    let defaults = draft.defaults();
    let mut previous = index_by_customer(mem::take(&mut draft.stops));

    let stops = rejoin_stops(raw_stops, &mut previous, directory, defaults);
    warn_dropped(&previous);

    let placed = stops.len();
    draft.stops = stops;
    draft.excluded.clear();
    draft.status = OptimizationStatus::Success;
    store_result(draft, totals, end_details);

    ReconcileSummary {
        status: OptimizationStatus::Success,
        placed,
        excluded: 0,
        failure_message: None,
    }
}

fn apply_partial(
    draft: &mut RouteDraft,
    records: Vec<RawExclusion>,
    raw_stops: Vec<RawStop>,
    totals: RouteTotals,
    end_details: Option<RawEndDetails>,
    directory: &CustomerDirectory,
) -> ReconcileSummary {
    let defaults = draft.defaults();
    let mut previous = index_by_customer(mem::take(&mut draft.stops));

    let mut excluded = Vec::with_capacity(records.len());
    for record in &records {
        match resolve_exclusion(record, &mut previous, directory, defaults) {
            Some(stop) => excluded.push(stop),
            // A record we can neither display nor reinstate.
            None => debug!("exclusion record with no resolvable customer, dropping"),
        }
    }

    let stops = rejoin_stops(raw_stops, &mut previous, directory, defaults);
    warn_dropped(&previous);

    let placed = stops.len();
    let excluded_count = excluded.len();
    draft.stops = stops;
    draft.excluded = excluded;
    draft.status = OptimizationStatus::Partial;
    store_result(draft, totals, end_details);

    ReconcileSummary {
        status: OptimizationStatus::Partial,
        placed,
        excluded: excluded_count,
        failure_message: None,
    }
}

fn index_by_customer(stops: Vec<StopEntry>) -> HashMap<CustomerId, StopEntry> {
    stops
        .into_iter()
        .map(|stop| (stop.customer_id(), stop))
        .collect()
}

/// Joins the optimizer's ordered output back onto the previous draft
/// entries. Depot markers carry no customer id and are filtered out; output
/// rows naming a customer nobody knows are dropped with a warning.
fn rejoin_stops(
    raw_stops: Vec<RawStop>,
    previous: &mut HashMap<CustomerId, StopEntry>,
    directory: &CustomerDirectory,
    defaults: StopDefaults,
) -> Vec<StopEntry> {
    let mut seen: HashSet<CustomerId> = HashSet::new();
    let mut result = Vec::with_capacity(raw_stops.len());

    for raw in raw_stops {
        let Some(id) = raw_customer_id(raw.customer_id, raw.customer.as_ref()) else {
            continue;
        };
        if !seen.insert(id) {
            warn!(customer = %id, "duplicate stop in optimizer output, keeping the first");
            continue;
        }

        let mut entry = match previous.remove(&id) {
            Some(entry) => entry,
            None => {
                let Some(mut entry) = fresh_entry(id, raw.customer.as_ref(), directory, defaults)
                else {
                    warn!(customer = %id, "optimizer stop has no matching customer, dropping");
                    continue;
                };
                if let Some(service) = raw.service_time {
                    entry.service_minutes = service.max(1);
                }
                if raw.stop_notes.is_some() {
                    entry.notes = raw.stop_notes.clone();
                }
                entry
            }
        };

        // The optimizer's placement is authoritative from here on.
        entry.position = raw.position();
        entry.estimated_arrival = raw
            .estimated_arrival_time
            .as_deref()
            .and_then(time_window::parse_clock);
        entry.estimated_departure = raw
            .estimated_departure_time
            .as_deref()
            .and_then(time_window::parse_clock);
        result.push(entry);
    }

    result
}

fn resolve_exclusion(
    record: &RawExclusion,
    previous: &mut HashMap<CustomerId, StopEntry>,
    directory: &CustomerDirectory,
    defaults: StopDefaults,
) -> Option<ExcludedStop> {
    let id = raw_customer_id(record.stop.customer_id, record.stop.customer.as_ref())?;

    let entry = match previous.remove(&id) {
        Some(mut entry) => {
            entry.clear_estimates();
            entry
        }
        None => {
            let customer = record
                .stop
                .customer
                .as_ref()
                .map(customer_from_embedded)
                .or_else(|| directory.get(id))?;
            let mut entry = StopEntry::new(customer, defaults);
            if let Some(service) = record.stop.service_time {
                entry.service_minutes = service.max(1);
            }
            if record.stop.notes.is_some() {
                entry.notes = record.stop.notes.clone();
            }
            entry
        }
    };

    let reason = exclusion_reason(&entry, record);
    Some(ExcludedStop {
        entry,
        reason,
        time_window_conflict: record.time_window_conflict.clone(),
    })
}

/// An explicit window explanation beats the optimizer's generic reason; the
/// window comes from the stop's effective window when known, the record's
/// own arrive-between fields otherwise.
fn exclusion_reason(entry: &StopEntry, record: &RawExclusion) -> String {
    let window = entry
        .effective_window()
        .map(|w| (w.start_display(), w.end_display()))
        .or_else(|| {
            match (
                &record.stop.arrive_between_start,
                &record.stop.arrive_between_end,
            ) {
                (Some(start), Some(end)) => Some((display_clock(start), display_clock(end))),
                _ => None,
            }
        });

    match window {
        Some((start, end)) => format!("visit must occur between {start}\u{2013}{end}"),
        None => record
            .reason
            .clone()
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_EXCLUSION_REASON.to_string()),
    }
}

fn raw_customer_id(explicit: Option<CustomerId>, embedded: Option<&RawCustomer>) -> Option<CustomerId> {
    explicit.or_else(|| embedded.map(|customer| customer.id))
}

fn fresh_entry(
    id: CustomerId,
    embedded: Option<&RawCustomer>,
    directory: &CustomerDirectory,
    defaults: StopDefaults,
) -> Option<StopEntry> {
    let customer = directory
        .get(id)
        .or_else(|| embedded.map(customer_from_embedded))?;
    Some(StopEntry::new(customer, defaults))
}

fn customer_from_embedded(raw: &RawCustomer) -> Arc<Customer> {
    Arc::new(Customer {
        id: raw.id,
        name: raw.name.clone().unwrap_or_default(),
        address: raw.address.clone().unwrap_or_default(),
        location: (raw.latitude.unwrap_or(0.0), raw.longitude.unwrap_or(0.0)),
        default_window: None,
        service_estimate_minutes: None,
        notes: None,
    })
}

fn store_result(draft: &mut RouteDraft, totals: RouteTotals, end_details: Option<RawEndDetails>) {
    draft.total_distance_km = totals.distance_km;
    draft.optimized_duration_minutes = totals.duration_minutes;
    draft.end_details = end_details.map(|details| EndDetails {
        estimated_arrival: details
            .estimated_arrival_time
            .as_deref()
            .and_then(time_window::parse_clock),
    });
}

fn warn_dropped(previous: &HashMap<CustomerId, StopEntry>) {
    for id in previous.keys() {
        warn!(customer = %id, "stop missing from optimizer response, dropped from draft");
    }
}

fn display_clock(raw: &str) -> String {
    time_window::parse_clock(raw)
        .map(|t| t.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}
