//! HTTP adapter for the remote route store.
//!
//! The store speaks camelCase JSON and backend `HH:MM:SS` clock strings.
//! Stop rows persist the per-stop override window only; effective windows
//! are pushed separately as constraints right before each optimization run.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
    CustomerId, DepotId, DriverId, PositionConstraint, RouteId, RouteMetadata, RouteStopId,
    StopEntry, VehicleId, DEFAULT_SERVICE_MINUTES,
};
use crate::time_window::{self, TimeWindow, BACKEND_FORMAT};
use crate::traits::{
    BackendError, CreatedRoute, PersistedRoute, PersistedStop, RouteBackend, StopConstraint,
};

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRouteBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpRouteBackend {
    pub fn new(config: BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl RouteBackend for HttpRouteBackend {
    async fn create_route(
        &self,
        metadata: &RouteMetadata,
        stops: &[StopEntry],
    ) -> Result<CreatedRoute, BackendError> {
        let url = format!("{}/routes", self.config.base_url);
        debug!(stops = stops.len(), "creating route");

        let payload = RoutePayload::from_parts(metadata, stops);
        let response = self.authorized(self.client.post(&url)).json(&payload).send().await?;
        let body = expect_success(response).await?.json::<CreatedRouteBody>().await?;

        Ok(CreatedRoute {
            route_id: body.id,
            stop_ids: body
                .stops
                .into_iter()
                .map(|row| (row.customer_id, row.id))
                .collect(),
        })
    }

    async fn save_route(
        &self,
        route_id: RouteId,
        metadata: &RouteMetadata,
        stops: &[StopEntry],
    ) -> Result<(), BackendError> {
        let url = format!("{}/routes/{}", self.config.base_url, route_id);
        debug!(%route_id, stops = stops.len(), "saving route");

        let payload = RoutePayload::from_parts(metadata, stops);
        let response = self.authorized(self.client.put(&url)).json(&payload).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn load_route(&self, route_id: RouteId) -> Result<PersistedRoute, BackendError> {
        let url = format!("{}/routes/{}", self.config.base_url, route_id);
        debug!(%route_id, "loading route");

        let response = self.authorized(self.client.get(&url)).send().await?;
        let body = expect_success(response).await?.json::<RouteBody>().await?;
        Ok(body.into_persisted())
    }

    async fn update_stop(
        &self,
        route_id: RouteId,
        stop_id: RouteStopId,
        stop: &StopEntry,
    ) -> Result<(), BackendError> {
        let url = format!("{}/routes/{}/stops/{}", self.config.base_url, route_id, stop_id);
        debug!(%route_id, %stop_id, "updating stop");

        let payload = StopPayload::from_entry(stop);
        let response = self.authorized(self.client.put(&url)).json(&payload).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn push_stop_constraints(
        &self,
        route_id: RouteId,
        constraints: &[StopConstraint],
    ) -> Result<(), BackendError> {
        let url = format!("{}/routes/{}/constraints", self.config.base_url, route_id);
        debug!(%route_id, count = constraints.len(), "pushing stop constraints");

        let payload: Vec<ConstraintPayload<'_>> =
            constraints.iter().map(ConstraintPayload::from_constraint).collect();
        let response = self.authorized(self.client.put(&url)).json(&payload).send().await?;
        expect_success(response).await?;
        Ok(())
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutePayload {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depot_id: Option<DepotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver_id: Option<DriverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle_id: Option<VehicleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_odometer: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    stops: Vec<StopPayload>,
}

impl RoutePayload {
    fn from_parts(metadata: &RouteMetadata, stops: &[StopEntry]) -> Self {
        Self {
            name: metadata.name.clone(),
            date: metadata.date,
            depot_id: metadata.depot,
            driver_id: metadata.driver,
            vehicle_id: metadata.vehicle,
            start_odometer: metadata.start_odometer,
            notes: metadata.notes.clone(),
            start_time: metadata
                .start_time
                .map(|t| t.format(BACKEND_FORMAT).to_string()),
            stops: stops.iter().map(StopPayload::from_entry).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopPayload {
    customer_id: CustomerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrive_between_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrive_between_end: Option<String>,
    order_type: i32,
    service_time: u32,
    signature_required: bool,
    photo_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_notes: Option<String>,
}

impl StopPayload {
    /// Persists the explicit override only; a stop inheriting the customer
    /// default carries no window of its own.
    fn from_entry(entry: &StopEntry) -> Self {
        Self {
            customer_id: entry.customer_id(),
            arrive_between_start: entry.override_window.as_ref().map(TimeWindow::start_backend),
            arrive_between_end: entry.override_window.as_ref().map(TimeWindow::end_backend),
            order_type: entry.position.order_code(),
            service_time: entry.service_minutes,
            signature_required: entry.signature_required,
            photo_required: entry.photo_required,
            stop_notes: entry.notes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintPayload<'a> {
    customer_id: CustomerId,
    order_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrive_between_start: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrive_between_end: Option<&'a str>,
}

impl<'a> ConstraintPayload<'a> {
    fn from_constraint(constraint: &'a StopConstraint) -> Self {
        Self {
            customer_id: constraint.customer_id,
            order_type: constraint.order_code,
            arrive_between_start: constraint.window_start.as_deref(),
            arrive_between_end: constraint.window_end.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRouteBody {
    id: RouteId,
    #[serde(default)]
    stops: Vec<CreatedStopRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedStopRow {
    id: RouteStopId,
    customer_id: CustomerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteBody {
    id: RouteId,
    #[serde(default)]
    name: String,
    date: Option<NaiveDate>,
    depot_id: Option<DepotId>,
    driver_id: Option<DriverId>,
    vehicle_id: Option<VehicleId>,
    start_odometer: Option<u32>,
    notes: Option<String>,
    start_time: Option<String>,
    #[serde(default)]
    stops: Vec<StopBody>,
}

impl RouteBody {
    fn into_persisted(self) -> PersistedRoute {
        PersistedRoute {
            route_id: self.id,
            metadata: RouteMetadata {
                name: self.name,
                date: self.date,
                depot: self.depot_id,
                driver: self.driver_id,
                vehicle: self.vehicle_id,
                start_odometer: self.start_odometer,
                notes: self.notes,
                start_time: self.start_time.as_deref().and_then(time_window::parse_clock),
            },
            stops: self.stops.into_iter().map(StopBody::into_persisted).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopBody {
    id: RouteStopId,
    customer_id: CustomerId,
    arrive_between_start: Option<String>,
    arrive_between_end: Option<String>,
    order_type: Option<i32>,
    service_time: Option<u32>,
    #[serde(default)]
    signature_required: bool,
    #[serde(default)]
    photo_required: bool,
    stop_notes: Option<String>,
}

impl StopBody {
    fn into_persisted(self) -> PersistedStop {
        let override_window = match (
            self.arrive_between_start
                .as_deref()
                .and_then(time_window::parse_clock),
            self.arrive_between_end
                .as_deref()
                .and_then(time_window::parse_clock),
        ) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        };

        PersistedStop {
            route_stop_id: self.id,
            customer_id: self.customer_id,
            override_window,
            position: self
                .order_type
                .map(PositionConstraint::from_order_code)
                .unwrap_or_default(),
            service_minutes: self.service_time.unwrap_or(DEFAULT_SERVICE_MINUTES).max(1),
            signature_required: self.signature_required,
            photo_required: self.photo_required,
            notes: self.stop_notes,
        }
    }
}
