//! Drawable route trace.
//!
//! A [`RoutePath`] is the decoded coordinate sequence a map layer draws
//! between the stops of a planned route. Compact encodings stay at the
//! transport boundary; internally the trace is plain points.

/// A route trace as decoded (latitude, longitude) points, in travel order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePath {
    points: Vec<(f64, f64)>,
}

impl RoutePath {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}
