//! HTTP store speaking the bridge firmware's configuration endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::schema::ConfigDocument;
use crate::store::{ConfigStore, StoreError, TestOutcome, TestRequest};

/// Path serving the persisted document.
pub const CONFIG_PATH: &str = "/conf/config.json";
/// Path accepting a replacement document.
pub const COMMIT_PATH: &str = "/api/config/modbus";
/// Path performing a one-shot diagnostic read or write.
pub const EXECUTE_PATH: &str = "/api/modbus/execute";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ConfigStore`] backed by the firmware's HTTP API.
pub struct HttpConfigStore {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpConfigStore {
    /// Store rooted at a device base URL, e.g. `http://192.168.4.1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_default();
        HttpConfigStore {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ConfigStore for HttpConfigStore {
    async fn fetch(&self) -> Result<Value, StoreError> {
        debug!(url = %self.url(CONFIG_PATH), "fetching configuration");
        let response = self
            .client
            .get(self.url(CONFIG_PATH))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("HTTP request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(StoreError::Communication(format!("HTTP error: {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("JSON parse error: {e}")))
    }

    async fn put(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        debug!(url = %self.url(COMMIT_PATH), devices = document.devices.len(), "committing configuration");
        let response = self
            .client
            .put(self.url(COMMIT_PATH))
            .json(document)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("HTTP request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(StoreError::Communication(format!("HTTP error: {}", response.status())));
        }
        Ok(())
    }

    async fn execute(&self, request: &TestRequest) -> Result<TestOutcome, StoreError> {
        let mut query: Vec<(&str, String)> = vec![
            ("devId", request.device_id.clone()),
            ("dpId", request.datapoint_id.clone()),
            ("func_code", request.function.to_string()),
            ("addr", request.address.to_string()),
            ("len", request.count.to_string()),
        ];
        if request.is_write() {
            if let Some(value) = request.value.as_deref().filter(|v| !v.is_empty()) {
                query.push(("value", value.to_string()));
            }
        }
        debug!(device = %request.device_id, datapoint = %request.datapoint_id, "executing test request");
        let response = self
            .client
            .post(self.url(EXECUTE_PATH))
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("HTTP request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(StoreError::Communication(format!("HTTP error: {}", response.status())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("JSON parse error: {e}")))?;
        Ok(TestOutcome::from_response(&body))
    }
}
