//! Cross-stop constraint checks applied before a draft mutation.
//!
//! The checks run on every add, bulk add and restore-from-exclusion, never
//! on pure reorders or edits that leave constraints untouched. A failed
//! check rejects the whole operation; nothing is partially applied.

use thiserror::Error;

use crate::model::{PositionConstraint, StopEntry};

/// Hard ceiling on draft size once any stop carries an effective window.
/// Unwindowed drafts may grow past this freely.
pub const MAX_STOPS_WITH_WINDOWS: usize = 70;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Another stop already holds the requested first/last pin.
    #[error("another stop is already pinned {position}; unpin it before reassigning")]
    PositionTaken { position: PositionConstraint },

    /// The batch would push a time-windowed draft past the ceiling.
    #[error(
        "routes with delivery windows are limited to {limit} stops \
         ({current} in the route, {incoming} being added)"
    )]
    WindowedStopLimit {
        current: usize,
        incoming: usize,
        limit: usize,
    },
}

/// Rejects assigning `first`/`last` when another stop already holds it.
///
/// `changing` is the index of the stop being edited, so the current holder
/// may keep its own pin; pass `None` when the proposal is for a new stop.
pub fn check_position(
    stops: &[StopEntry],
    changing: Option<usize>,
    proposed: PositionConstraint,
) -> Result<(), PolicyViolation> {
    if proposed == PositionConstraint::None {
        return Ok(());
    }

    let taken = stops
        .iter()
        .enumerate()
        .any(|(index, stop)| Some(index) != changing && stop.position == proposed);

    if taken {
        Err(PolicyViolation::PositionTaken { position: proposed })
    } else {
        Ok(())
    }
}

/// Atomic stop-count check for adding `incoming` to `stops`.
///
/// The ceiling bites only when the post-add draft both exceeds
/// [`MAX_STOPS_WITH_WINDOWS`] and contains at least one effective window
/// (existing or incoming). On violation the whole batch is rejected; the
/// counts are carried for the user-facing message.
pub fn check_addition(stops: &[StopEntry], incoming: &[StopEntry]) -> Result<(), PolicyViolation> {
    let total = stops.len() + incoming.len();
    if total <= MAX_STOPS_WITH_WINDOWS {
        return Ok(());
    }

    let any_window = stops
        .iter()
        .chain(incoming.iter())
        .any(|stop| stop.effective_window().is_some());

    if any_window {
        Err(PolicyViolation::WindowedStopLimit {
            current: stops.len(),
            incoming: incoming.len(),
            limit: MAX_STOPS_WITH_WINDOWS,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{Customer, CustomerId, StopDefaults};
    use crate::time_window::TimeWindow;

    fn customer(id: i64, window: Option<TimeWindow>) -> Arc<Customer> {
        Arc::new(Customer {
            id: CustomerId(id),
            name: format!("Customer {id}"),
            address: format!("{id} Main St"),
            location: (36.1, -115.1),
            default_window: window,
            service_estimate_minutes: None,
            notes: None,
        })
    }

    fn stop(id: i64) -> StopEntry {
        StopEntry::new(customer(id, None), StopDefaults::default())
    }

    fn windowed_stop(id: i64) -> StopEntry {
        let window = TimeWindow::from_display("09:00", "12:00").unwrap();
        StopEntry::new(customer(id, Some(window)), StopDefaults::default())
    }

    fn pinned(id: i64, position: PositionConstraint) -> StopEntry {
        let mut entry = stop(id);
        entry.position = position;
        entry
    }

    #[test]
    fn test_second_first_pin_rejected() {
        let stops = vec![pinned(1, PositionConstraint::First), stop(2)];
        let err = check_position(&stops, Some(1), PositionConstraint::First).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::PositionTaken {
                position: PositionConstraint::First
            }
        );
    }

    #[test]
    fn test_holder_may_keep_its_own_pin() {
        let stops = vec![pinned(1, PositionConstraint::Last), stop(2)];
        assert!(check_position(&stops, Some(0), PositionConstraint::Last).is_ok());
    }

    #[test]
    fn test_unpinning_is_always_allowed() {
        let stops = vec![
            pinned(1, PositionConstraint::First),
            pinned(2, PositionConstraint::Last),
        ];
        assert!(check_position(&stops, Some(0), PositionConstraint::None).is_ok());
    }

    #[test]
    fn test_ceiling_ignored_without_windows() {
        let stops: Vec<_> = (0..80).map(stop).collect();
        let incoming = vec![stop(100)];
        assert!(check_addition(&stops, &incoming).is_ok());
    }

    #[test]
    fn test_ceiling_bites_with_existing_window() {
        let mut stops: Vec<_> = (0..69).map(stop).collect();
        stops.push(windowed_stop(69));
        let incoming = vec![stop(100)];
        let err = check_addition(&stops, &incoming).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::WindowedStopLimit {
                current: 70,
                incoming: 1,
                limit: MAX_STOPS_WITH_WINDOWS,
            }
        );
    }

    #[test]
    fn test_ceiling_bites_when_incoming_brings_the_window() {
        let stops: Vec<_> = (0..70).map(stop).collect();
        let incoming = vec![windowed_stop(100)];
        assert!(check_addition(&stops, &incoming).is_err());
    }

    #[test]
    fn test_exactly_at_ceiling_is_allowed() {
        let stops: Vec<_> = (0..69).map(windowed_stop).collect();
        let incoming = vec![windowed_stop(100)];
        assert!(check_addition(&stops, &incoming).is_ok(), "70 total is legal");
    }
}
