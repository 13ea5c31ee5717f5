//! Wire contract with the remote optimizer.
//!
//! The optimizer has answered in more than one shape over time: an ordered
//! `optimizedStops` array, or a `stops` array carrying an explicit `order`
//! field, each with or without an exclusion list. The raw response type is
//! deliberately tolerant; [`OptimizeResponse::classify`] resolves it exactly
//! once at the boundary into the three outcomes the rest of the crate works
//! with.

use serde::{Deserialize, Serialize};

use crate::model::{CustomerId, PositionConstraint, RouteId};

/// What we ask of the optimizer. The solving heuristic is its own affair;
/// only this contract is ours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub route_id: RouteId,
    pub objective: Objective,
    pub avoid_tolls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    #[default]
    Distance,
}

/// Raw optimizer response, covering every observed shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeResponse {
    pub success: bool,
    pub message: Option<String>,
    pub has_exclusions: Option<bool>,
    pub excluded_stops: Vec<RawExclusion>,
    pub optimized_stops: Vec<RawStop>,
    pub stops: Vec<RawStop>,
    /// Kilometres.
    pub total_distance: Option<f64>,
    /// Minutes.
    pub total_duration: Option<u32>,
    pub end_details: Option<RawEndDetails>,
}

/// One placed stop as the optimizer reports it. Depot markers come through
/// with no customer id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStop {
    pub customer_id: Option<CustomerId>,
    /// Embedded customer record; often omitted.
    pub customer: Option<RawCustomer>,
    /// Sort key used by the alternate `stops` shape.
    pub order: Option<i32>,
    pub order_type: Option<i32>,
    /// Tier label, e.g. `"First"` / `"Last"`.
    pub tier: Option<String>,
    pub service_time: Option<u32>,
    pub stop_notes: Option<String>,
    pub estimated_arrival_time: Option<String>,
    pub estimated_departure_time: Option<String>,
}

impl RawStop {
    /// Position pin as reported by the optimizer: the tier label wins,
    /// the numeric order code is the fallback. Authoritative after a
    /// successful optimization.
    pub fn position(&self) -> PositionConstraint {
        if let Some(tier) = &self.tier {
            let mapped = PositionConstraint::from_tier_label(tier);
            if mapped != PositionConstraint::None {
                return mapped;
            }
        }
        match self.order_type {
            Some(code) => PositionConstraint::from_order_code(code),
            None => PositionConstraint::None,
        }
    }
}

/// One stop the optimizer refused to place.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawExclusion {
    pub stop: RawExcludedStop,
    pub reason: Option<String>,
    /// Raw conflict description, e.g. `"09:00-10:00"`.
    pub time_window_conflict: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawExcludedStop {
    pub customer_id: Option<CustomerId>,
    pub customer: Option<RawCustomer>,
    pub service_time: Option<u32>,
    pub notes: Option<String>,
    /// The window the optimizer tried to satisfy.
    pub arrive_between_start: Option<String>,
    pub arrive_between_end: Option<String>,
}

/// Customer record some responses embed alongside a stop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCustomer {
    pub id: CustomerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// End-of-route depot arrival estimate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEndDetails {
    pub estimated_arrival_time: Option<String>,
}

/// Route-level totals reported alongside a produced order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteTotals {
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<u32>,
}

/// The optimizer response resolved once at the boundary.
#[derive(Debug, Clone)]
pub enum OptimizeOutcome {
    /// The optimizer could not produce a route; the draft must stay as it
    /// was. A normal outcome, not an exception.
    Failure { message: Option<String> },
    /// A route was produced but some stops could not be placed.
    Partial {
        excluded: Vec<RawExclusion>,
        stops: Vec<RawStop>,
        totals: RouteTotals,
        end_details: Option<RawEndDetails>,
    },
    /// Every stop was placed.
    Success {
        stops: Vec<RawStop>,
        totals: RouteTotals,
        end_details: Option<RawEndDetails>,
    },
}

impl OptimizeResponse {
    /// Resolves the response, checked in this precedence order: hard
    /// failure, partial success with a non-empty exclusion list, full
    /// success. A "successful" response with no stop list at all is
    /// malformed and classified as a failure.
    pub fn classify(self) -> OptimizeOutcome {
        let OptimizeResponse {
            success,
            message,
            has_exclusions,
            excluded_stops,
            optimized_stops,
            stops,
            total_distance,
            total_duration,
            end_details,
        } = self;

        if !success {
            return OptimizeOutcome::Failure { message };
        }

        let totals = RouteTotals {
            distance_km: total_distance,
            duration_minutes: total_duration,
        };
        let stops = normalize_stop_order(optimized_stops, stops);

        if has_exclusions == Some(true) && !excluded_stops.is_empty() {
            return OptimizeOutcome::Partial {
                excluded: excluded_stops,
                stops,
                totals,
                end_details,
            };
        }

        if stops.is_empty() {
            return OptimizeOutcome::Failure { message: None };
        }

        OptimizeOutcome::Success {
            stops,
            totals,
            end_details,
        }
    }
}

/// Both list shapes normalize identically: `optimizedStops` comes
/// pre-ordered, the alternate `stops` shape is sorted by its `order` field.
fn normalize_stop_order(optimized: Vec<RawStop>, alternate: Vec<RawStop>) -> Vec<RawStop> {
    if !optimized.is_empty() {
        return optimized;
    }
    let mut stops = alternate;
    stops.sort_by_key(|stop| stop.order.unwrap_or(i32::MAX));
    stops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = OptimizeRequest {
            route_id: RouteId(42),
            objective: Objective::Distance,
            avoid_tolls: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "routeId": 42,
                "objective": "distance",
                "avoidTolls": true,
            })
        );
    }

    #[test]
    fn test_failure_wins_over_everything() {
        let response: OptimizeResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "message": "no vehicles available",
            "optimizedStops": [{"customerId": 1}],
        }))
        .unwrap();

        match response.classify() {
            OptimizeOutcome::Failure { message } => {
                assert_eq!(message.as_deref(), Some("no vehicles available"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_exclusions_classify_as_partial() {
        let response: OptimizeResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "hasExclusions": true,
            "excludedStops": [
                {"stop": {"customerId": 7}, "reason": "window too tight"}
            ],
            "optimizedStops": [{"customerId": 1}, {"customerId": 2}],
            "totalDistance": 12.5,
            "totalDuration": 96,
        }))
        .unwrap();

        match response.classify() {
            OptimizeOutcome::Partial {
                excluded,
                stops,
                totals,
                ..
            } => {
                assert_eq!(excluded.len(), 1);
                assert_eq!(stops.len(), 2);
                assert_eq!(totals.distance_km, Some(12.5));
                assert_eq!(totals.duration_minutes, Some(96));
            }
            other => panic!("expected partial, got {other:?}"),
        }
    }

    #[test]
    fn test_exclusion_flag_without_records_falls_through_to_success() {
        let response: OptimizeResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "hasExclusions": true,
            "excludedStops": [],
            "optimizedStops": [{"customerId": 1}],
        }))
        .unwrap();

        assert!(matches!(
            response.classify(),
            OptimizeOutcome::Success { .. }
        ));
    }

    #[test]
    fn test_alternate_stops_shape_sorted_by_order() {
        let response: OptimizeResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "stops": [
                {"customerId": 3, "order": 2},
                {"customerId": 1, "order": 0},
                {"customerId": 2, "order": 1},
            ],
        }))
        .unwrap();

        match response.classify() {
            OptimizeOutcome::Success { stops, .. } => {
                let ids: Vec<i64> = stops
                    .iter()
                    .map(|stop| stop.customer_id.unwrap().0)
                    .collect();
                assert_eq!(ids, vec![1, 2, 3]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_success_without_any_stops_is_malformed() {
        let response: OptimizeResponse =
            serde_json::from_value(serde_json::json!({"success": true})).unwrap();
        match response.classify() {
            OptimizeOutcome::Failure { message } => assert_eq!(message, None),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_tier_label_beats_order_code() {
        let stop: RawStop = serde_json::from_value(serde_json::json!({
            "customerId": 5,
            "tier": "Last",
            "orderType": 10,
        }))
        .unwrap();
        assert_eq!(stop.position(), PositionConstraint::Last);

        let stop: RawStop = serde_json::from_value(serde_json::json!({
            "customerId": 5,
            "orderType": 10,
        }))
        .unwrap();
        assert_eq!(stop.position(), PositionConstraint::First);
    }

    #[test]
    fn test_excluded_record_parses_window_fields() {
        let exclusion: RawExclusion = serde_json::from_value(serde_json::json!({
            "stop": {
                "customerId": 7,
                "serviceTime": 15,
                "arriveBetweenStart": "09:00",
                "arriveBetweenEnd": "10:00",
            },
            "reason": "",
            "timeWindowConflict": "09:00-10:00",
        }))
        .unwrap();

        assert_eq!(exclusion.stop.customer_id, Some(CustomerId(7)));
        assert_eq!(exclusion.stop.arrive_between_start.as_deref(), Some("09:00"));
        assert_eq!(exclusion.time_window_conflict.as_deref(), Some("09:00-10:00"));
    }
}
