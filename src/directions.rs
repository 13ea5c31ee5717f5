//! OSRM HTTP adapter for route traces.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::path::RoutePath;
use crate::traits::{BackendError, DirectionsProvider};

#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpDirections {
    config: DirectionsConfig,
    client: reqwest::Client,
}

impl HttpDirections {
    pub fn new(config: DirectionsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl DirectionsProvider for HttpDirections {
    async fn trace(&self, locations: &[(f64, f64)]) -> Result<RoutePath, BackendError> {
        if locations.len() < 2 {
            return Ok(RoutePath::default());
        }

        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.config.base_url, self.config.profile, coords
        );
        debug!(waypoints = locations.len(), "tracing route path");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<OsrmRouteResponse>().await?;
        let points = body
            .routes
            .into_iter()
            .next()
            .map(|route| {
                route
                    .geometry
                    .coordinates
                    .into_iter()
                    .map(|[lng, lat]| (lat, lng))
                    .collect()
            })
            .unwrap_or_default();

        Ok(RoutePath::new(points))
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

/// GeoJSON line geometry; OSRM orders coordinates (longitude, latitude).
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}
