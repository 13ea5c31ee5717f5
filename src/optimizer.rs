//! HTTP adapter for the remote optimization service.

use async_trait::async_trait;
use tracing::debug;

use crate::optimizer_data::{OptimizeRequest, OptimizeResponse};
use crate::traits::{BackendError, OptimizerApi};

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpOptimizer {
    config: OptimizerConfig,
    client: reqwest::Client,
}

impl HttpOptimizer {
    pub fn new(config: OptimizerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl OptimizerApi for HttpOptimizer {
    /// Sends one optimization request. No retry on failure: a failed run is
    /// surfaced to the caller, who decides whether to ask again.
    async fn optimize(&self, request: OptimizeRequest) -> Result<OptimizeResponse, BackendError> {
        let url = format!("{}/optimize", self.config.base_url);
        debug!(route_id = %request.route_id, %url, "requesting optimization");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<OptimizeResponse>().await?)
    }
}
