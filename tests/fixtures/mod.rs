//! Shared fixtures for the route-composer test suites.
//!
//! Customer builders plus scriptable in-memory collaborators standing in
//! for the remote route store, the optimizer and the directions service.
//! The mocks record every call so tests can assert on ordering and
//! payloads, and individual calls can be made to fail on demand.

// Helpers are shared across test binaries; not every binary uses them all.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use route_composer::directory::CustomerDirectory;
use route_composer::model::{
    Customer, CustomerId, DepotId, RouteId, RouteMetadata, RouteStopId, StopEntry,
};
use route_composer::optimizer_data::{OptimizeRequest, OptimizeResponse};
use route_composer::path::RoutePath;
use route_composer::session::{Collaborators, RouteSession, SessionConfig};
use route_composer::snapshot::{DraftSnapshot, MemoryDraftStore};
use route_composer::time_window::TimeWindow;
use route_composer::traits::{
    BackendError, CreatedRoute, DirectionsProvider, DraftStore, OptimizerApi, PersistedRoute,
    RouteBackend, StopConstraint, StoreError,
};

// ============================================================================
// Customers
// ============================================================================

pub fn customer(id: i64, name: &str) -> Customer {
    Customer {
        id: CustomerId(id),
        name: name.to_string(),
        address: format!("{id} Fremont St"),
        location: (36.10 + id as f64 * 0.01, -115.20 + id as f64 * 0.005),
        default_window: None,
        service_estimate_minutes: None,
        notes: None,
    }
}

pub fn windowed_customer(id: i64, name: &str, start: &str, end: &str) -> Customer {
    let mut customer = customer(id, name);
    customer.default_window = Some(TimeWindow::from_display(start, end).unwrap());
    customer
}

pub fn directory(customers: Vec<Customer>) -> Arc<CustomerDirectory> {
    Arc::new(CustomerDirectory::new(customers))
}

/// Metadata that satisfies the optimize preconditions.
pub fn ready_metadata(name: &str) -> RouteMetadata {
    RouteMetadata {
        name: name.to_string(),
        depot: Some(DepotId(2)),
        ..RouteMetadata::default()
    }
}

// ============================================================================
// Optimizer responses
// ============================================================================

/// Arrival clock for the stop at `index`, fifteen minutes apart from 09:10.
fn scripted_eta(index: usize) -> String {
    let minutes = 9 * 60 + 10 + index as u32 * 15;
    format!("{:02}:{:02}:00", minutes / 60, minutes % 60)
}

pub fn success_response(order: &[i64]) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "optimizedStops": order
            .iter()
            .enumerate()
            .map(|(index, id)| {
                serde_json::json!({
                    "customerId": id,
                    "estimatedArrivalTime": scripted_eta(index),
                })
            })
            .collect::<Vec<_>>(),
        "totalDistance": 12.5,
        "totalDuration": 64,
        "endDetails": {"estimatedArrivalTime": "12:10:00"},
    })
}

pub fn partial_response(accepted: &[i64], excluded: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "hasExclusions": true,
        "excludedStops": excluded,
        "optimizedStops": accepted
            .iter()
            .enumerate()
            .map(|(index, id)| {
                serde_json::json!({
                    "customerId": id,
                    "estimatedArrivalTime": scripted_eta(index),
                })
            })
            .collect::<Vec<_>>(),
        "totalDistance": 9.0,
        "totalDuration": 48,
    })
}

pub fn failure_response(message: &str) -> serde_json::Value {
    serde_json::json!({"success": false, "message": message})
}

pub fn api_error(status: u16, message: &str) -> BackendError {
    BackendError::Api {
        status,
        message: message.to_string(),
    }
}

// ============================================================================
// Mock route backend
// ============================================================================

/// One recorded call against the mock backend, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateRoute { stops: Vec<CustomerId> },
    SaveRoute { route_id: RouteId },
    LoadRoute { route_id: RouteId },
    UpdateStop { route_id: RouteId, stop_id: RouteStopId },
    PushConstraints { route_id: RouteId, constraints: Vec<StopConstraint> },
}

pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    next_route_id: AtomicI64,
    next_stop_id: AtomicI64,
    fail_create: AtomicBool,
    fail_save: AtomicBool,
    fail_constraints: AtomicBool,
    fail_update: AtomicBool,
    persisted: Mutex<Option<PersistedRoute>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_route_id: AtomicI64::new(500),
            next_stop_id: AtomicI64::new(9000),
            fail_create: AtomicBool::new(false),
            fail_save: AtomicBool::new(false),
            fail_constraints: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            persisted: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Call kinds in arrival order, for sequencing assertions.
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| match call {
                BackendCall::CreateRoute { .. } => "create",
                BackendCall::SaveRoute { .. } => "save",
                BackendCall::LoadRoute { .. } => "load",
                BackendCall::UpdateStop { .. } => "update_stop",
                BackendCall::PushConstraints { .. } => "push_constraints",
            })
            .collect()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_constraints(&self, fail: bool) {
        self.fail_constraints.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// Route served by the next `load_route` call.
    pub fn serve_route(&self, route: PersistedRoute) {
        *self.persisted.lock().unwrap() = Some(route);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteBackend for MockBackend {
    async fn create_route(
        &self,
        _metadata: &RouteMetadata,
        stops: &[StopEntry],
    ) -> Result<CreatedRoute, BackendError> {
        self.record(BackendCall::CreateRoute {
            stops: stops.iter().map(StopEntry::customer_id).collect(),
        });
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(api_error(500, "create refused"));
        }
        let route_id = RouteId(self.next_route_id.fetch_add(1, Ordering::SeqCst));
        let stop_ids = stops
            .iter()
            .map(|stop| {
                (
                    stop.customer_id(),
                    RouteStopId(self.next_stop_id.fetch_add(1, Ordering::SeqCst)),
                )
            })
            .collect();
        Ok(CreatedRoute { route_id, stop_ids })
    }

    async fn save_route(
        &self,
        route_id: RouteId,
        _metadata: &RouteMetadata,
        _stops: &[StopEntry],
    ) -> Result<(), BackendError> {
        self.record(BackendCall::SaveRoute { route_id });
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(api_error(500, "save refused"));
        }
        Ok(())
    }

    async fn load_route(&self, route_id: RouteId) -> Result<PersistedRoute, BackendError> {
        self.record(BackendCall::LoadRoute { route_id });
        self.persisted
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| api_error(404, "no such route"))
    }

    async fn update_stop(
        &self,
        route_id: RouteId,
        stop_id: RouteStopId,
        _stop: &StopEntry,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::UpdateStop { route_id, stop_id });
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(api_error(500, "update refused"));
        }
        Ok(())
    }

    async fn push_stop_constraints(
        &self,
        route_id: RouteId,
        constraints: &[StopConstraint],
    ) -> Result<(), BackendError> {
        self.record(BackendCall::PushConstraints {
            route_id,
            constraints: constraints.to_vec(),
        });
        if self.fail_constraints.load(Ordering::SeqCst) {
            return Err(api_error(500, "constraints refused"));
        }
        Ok(())
    }
}

// ============================================================================
// Mock optimizer
// ============================================================================

pub struct MockOptimizer {
    responses: Mutex<VecDeque<serde_json::Value>>,
    requests: Mutex<Vec<OptimizeRequest>>,
    fail_transport: AtomicBool,
}

impl MockOptimizer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fail_transport: AtomicBool::new(false),
        }
    }

    /// Queues the response for the next optimize call.
    pub fn enqueue(&self, response: serde_json::Value) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<OptimizeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptimizerApi for MockOptimizer {
    async fn optimize(&self, request: OptimizeRequest) -> Result<OptimizeResponse, BackendError> {
        self.requests.lock().unwrap().push(request);
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(api_error(503, "optimizer unavailable"));
        }
        let json = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| api_error(500, "no scripted response"))?;
        Ok(serde_json::from_value(json).expect("scripted response must parse"))
    }
}

// ============================================================================
// Mock directions
// ============================================================================

pub struct MockDirections {
    traces: Mutex<Vec<Vec<(f64, f64)>>>,
    fail: AtomicBool,
}

impl MockDirections {
    pub fn new() -> Self {
        Self {
            traces: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Waypoint lists passed to `trace`, in call order.
    pub fn traced(&self) -> Vec<Vec<(f64, f64)>> {
        self.traces.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockDirections {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectionsProvider for MockDirections {
    async fn trace(&self, waypoints: &[(f64, f64)]) -> Result<RoutePath, BackendError> {
        self.traces.lock().unwrap().push(waypoints.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(api_error(500, "directions unavailable"));
        }
        Ok(RoutePath::new(waypoints.to_vec()))
    }
}

// ============================================================================
// Draft stores
// ============================================================================

/// Store handle the test keeps while the session owns a clone of it.
#[derive(Clone, Default)]
pub struct SharedStore(pub Arc<MemoryDraftStore>);

impl DraftStore for SharedStore {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        self.0.save(snapshot)
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, StoreError> {
        self.0.load()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.0.clear()
    }
}

/// Store whose every operation fails, for best-effort behavior tests.
pub struct FailingStore;

impl DraftStore for FailingStore {
    fn save(&self, _snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

// ============================================================================
// Session harness
// ============================================================================

/// One set of mock collaborators plus handles for assertions.
pub struct Harness {
    pub directory: Arc<CustomerDirectory>,
    pub backend: Arc<MockBackend>,
    pub optimizer: Arc<MockOptimizer>,
    pub directions: Arc<MockDirections>,
    pub store: SharedStore,
}

impl Harness {
    pub fn new(customers: Vec<Customer>) -> Self {
        Self {
            directory: directory(customers),
            backend: Arc::new(MockBackend::new()),
            optimizer: Arc::new(MockOptimizer::new()),
            directions: Arc::new(MockDirections::new()),
            store: SharedStore::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            directory: Arc::clone(&self.directory),
            backend: Arc::clone(&self.backend) as Arc<dyn RouteBackend>,
            optimizer: Arc::clone(&self.optimizer) as Arc<dyn OptimizerApi>,
            directions: Arc::clone(&self.directions) as Arc<dyn DirectionsProvider>,
            store: Box::new(self.store.clone()),
        }
    }

    pub fn new_session(&self) -> RouteSession {
        RouteSession::new_route(self.collaborators(), SessionConfig::default())
    }

    pub fn get(&self, id: i64) -> Arc<Customer> {
        self.directory.get(CustomerId(id)).unwrap()
    }
}
