//! Persistence boundary for configuration documents.
//!
//! The engine never talks to the firmware directly; it goes through a
//! [`ConfigStore`]. The HTTP implementation in [`crate::http`] and the
//! in-memory double below both satisfy it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::draft::DraftDatapoint;
use crate::schema::{self, ConfigDocument};

/// Errors crossing the persistence boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transport-level failure: connect, DNS, timeout.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The far side answered with a non-success status.
    #[error("Communication error: {0}")]
    Communication(String),
    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One operator-triggered diagnostic read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequest {
    pub device_id: String,
    pub datapoint_id: String,
    pub function: u8,
    pub address: u32,
    pub count: u16,
    /// Raw value for write functions; ignored for reads.
    pub value: Option<String>,
}

impl TestRequest {
    pub fn new(
        device_id: impl Into<String>,
        datapoint_id: impl Into<String>,
        function: u8,
        address: u32,
        count: u16,
    ) -> Self {
        TestRequest {
            device_id: device_id.into(),
            datapoint_id: datapoint_id.into(),
            function,
            address,
            count,
            value: None,
        }
    }

    /// Request mirroring a draft datapoint's current settings.
    pub fn for_datapoint(device_id: &str, point: &DraftDatapoint) -> Self {
        TestRequest::new(device_id, &point.id, point.function, point.address, point.count)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn is_write(&self) -> bool {
        schema::is_write_code(self.function)
    }
}

/// What the firmware reported back for one test execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Decoded value, when the firmware produced one.
    pub value: Option<Value>,
    /// Raw register words as read off the bus.
    pub raw: Vec<u64>,
}

impl TestOutcome {
    /// Pull the interesting parts out of a firmware response. Current
    /// builds nest them under `result`; older ones answer with a top-level
    /// `value`.
    pub fn from_response(response: &Value) -> Self {
        let result = response.get("result");
        let raw: Vec<u64> = result
            .and_then(|r| r.get("raw"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        let value = result
            .and_then(|r| r.get("value"))
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| {
                result
                    .and_then(|r| r.get("raw"))
                    .and_then(|r| r.get(0))
                    .filter(|v| !v.is_null())
                    .cloned()
            })
            .or_else(|| response.get("value").filter(|v| !v.is_null()).cloned());
        TestOutcome { value, raw }
    }
}

/// Where configuration documents live.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the persisted document as raw JSON.
    async fn fetch(&self) -> Result<Value, StoreError>;

    /// Persist a document, replacing whatever was stored.
    async fn put(&self, document: &ConfigDocument) -> Result<(), StoreError>;

    /// Ask the firmware to perform one live read or write.
    async fn execute(&self, request: &TestRequest) -> Result<TestOutcome, StoreError>;
}

/// In-memory store for tests and offline drafting.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    document: RwLock<Value>,
    committed: RwLock<Vec<ConfigDocument>>,
    outcome: RwLock<TestOutcome>,
}

impl InMemoryStore {
    pub fn new(document: Value) -> Self {
        InMemoryStore {
            document: RwLock::new(document),
            committed: RwLock::new(Vec::new()),
            outcome: RwLock::new(TestOutcome::default()),
        }
    }

    /// Store holding no document at all.
    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    /// Fix the outcome every `execute` call will report.
    pub fn with_outcome(self, outcome: TestOutcome) -> Self {
        InMemoryStore { outcome: RwLock::new(outcome), ..self }
    }

    /// Documents committed through this store, oldest first.
    pub async fn committed(&self) -> Vec<ConfigDocument> {
        self.committed.read().await.clone()
    }

    pub async fn last_committed(&self) -> Option<ConfigDocument> {
        self.committed.read().await.last().cloned()
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn fetch(&self) -> Result<Value, StoreError> {
        Ok(self.document.read().await.clone())
    }

    async fn put(&self, document: &ConfigDocument) -> Result<(), StoreError> {
        *self.document.write().await = document.to_value();
        self.committed.write().await.push(document.clone());
        Ok(())
    }

    async fn execute(&self, _request: &TestRequest) -> Result<TestOutcome, StoreError> {
        Ok(self.outcome.read().await.clone())
    }
}
