//! Collaborator seams for the route editing session.
//!
//! The remote route store, the optimizer, the directions service and the
//! local draft snapshot are injected capabilities: concrete adapters live in
//! their own modules, tests plug in mocks. Everything network-facing is
//! async; the snapshot store is synchronous and advisory.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{CustomerId, PositionConstraint, RouteId, RouteMetadata, RouteStopId, StopEntry};
use crate::optimizer_data::{OptimizeRequest, OptimizeResponse};
use crate::path::RoutePath;
use crate::snapshot::DraftSnapshot;
use crate::time_window::TimeWindow;

/// Errors from the remote HTTP collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Errors from the local snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot not decodable: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Identities assigned by the store when a route is first persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRoute {
    pub route_id: RouteId,
    /// Stop row ids keyed by customer, in no particular order.
    pub stop_ids: Vec<(CustomerId, RouteStopId)>,
}

/// A persisted route as loaded for editing.
#[derive(Debug, Clone)]
pub struct PersistedRoute {
    pub route_id: RouteId,
    pub metadata: RouteMetadata,
    pub stops: Vec<PersistedStop>,
}

/// One persisted stop row; the session re-attaches the customer record from
/// the workspace directory.
#[derive(Debug, Clone)]
pub struct PersistedStop {
    pub route_stop_id: RouteStopId,
    pub customer_id: CustomerId,
    pub override_window: Option<TimeWindow>,
    pub position: PositionConstraint,
    pub service_minutes: u32,
    pub signature_required: bool,
    pub photo_required: bool,
    pub notes: Option<String>,
}

/// Solver-relevant fields for one stop, in store format. The optimizer
/// reads persisted constraints rather than the in-memory draft, so these
/// are pushed for every stop before each optimization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopConstraint {
    pub customer_id: CustomerId,
    pub order_code: i32,
    /// Effective window bounds as backend `HH:MM:SS` strings.
    pub window_start: Option<String>,
    pub window_end: Option<String>,
}

impl StopConstraint {
    /// Snapshot of the entry's pin and effective window (override when set,
    /// customer default otherwise).
    pub fn from_entry(entry: &StopEntry) -> Self {
        let window = entry.effective_window();
        Self {
            customer_id: entry.customer_id(),
            order_code: entry.position.order_code(),
            window_start: window.map(TimeWindow::start_backend),
            window_end: window.map(TimeWindow::end_backend),
        }
    }
}

/// Remote route store.
#[async_trait]
pub trait RouteBackend: Send + Sync {
    /// Persists a brand-new route with its current stops.
    async fn create_route(
        &self,
        metadata: &RouteMetadata,
        stops: &[StopEntry],
    ) -> Result<CreatedRoute, BackendError>;

    /// Final submission of a persisted route.
    async fn save_route(
        &self,
        route_id: RouteId,
        metadata: &RouteMetadata,
        stops: &[StopEntry],
    ) -> Result<(), BackendError>;

    /// Loads a persisted route for editing.
    async fn load_route(&self, route_id: RouteId) -> Result<PersistedRoute, BackendError>;

    /// Pushes one stop's editable fields; used as a best-effort side effect
    /// while editing a persisted route.
    async fn update_stop(
        &self,
        route_id: RouteId,
        stop_id: RouteStopId,
        stop: &StopEntry,
    ) -> Result<(), BackendError>;

    /// Pushes order codes and effective windows for every stop of the route.
    async fn push_stop_constraints(
        &self,
        route_id: RouteId,
        constraints: &[StopConstraint],
    ) -> Result<(), BackendError>;
}

/// The remote optimizer, a black box behind a request/response contract.
#[async_trait]
pub trait OptimizerApi: Send + Sync {
    async fn optimize(&self, request: OptimizeRequest) -> Result<OptimizeResponse, BackendError>;
}

/// Black-box driving-directions lookup, used to redraw the route preview.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Path through the waypoints in draft order, as (lat, lng) pairs.
    async fn trace(&self, waypoints: &[(f64, f64)]) -> Result<RoutePath, BackendError>;
}

/// Local draft snapshot storage: crash-recovery convenience for new-route
/// editing, last-writer-wins, never the system of record.
pub trait DraftStore: Send + Sync {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StoreError>;
    fn load(&self) -> Result<Option<DraftSnapshot>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}
