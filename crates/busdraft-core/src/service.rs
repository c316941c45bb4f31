//! Reconciliation workflow between the editing session and a store.
//!
//! The service owns one session and one store and sequences the
//! operations around them: load, preview, commit, backup, import, export,
//! and one-shot test execution. Validation gates every commit; a failing
//! report means the network is never touched.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::schema::ConfigDocument;
use crate::session::DraftSession;
use crate::store::{ConfigStore, StoreError, TestOutcome, TestRequest};
use crate::validate::{validate_document, ValidationProfile, ValidationReport};

/// Why a commit did not happen.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The document failed validation; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationReport),
    /// Validation passed but the store rejected or never received the put.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Dry run of a commit: the document that would be sent and its report.
#[derive(Debug, Clone)]
pub struct CommitPreview {
    pub document: ConfigDocument,
    pub report: ValidationReport,
}

impl CommitPreview {
    /// Pretty-printed JSON for operator confirmation.
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_default()
    }
}

/// Drives load, edit, and commit against an injected store.
pub struct ConfigService {
    session: DraftSession,
    store: Arc<dyn ConfigStore>,
    profile: ValidationProfile,
}

impl ConfigService {
    /// Service starting from a blank draft.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        ConfigService {
            session: DraftSession::new(),
            store,
            profile: ValidationProfile::default(),
        }
    }

    /// Enforce a different rule generation on commit.
    pub fn with_profile(mut self, profile: ValidationProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn session(&self) -> &DraftSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DraftSession {
        &mut self.session
    }

    /// Fetch the persisted document and rebuild the session from it. On
    /// transport failure the current draft is left untouched.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let document = self.store.fetch().await?;
        self.session = DraftSession::from_document(&document);
        info!(devices = self.session.bus().devices.len(), "configuration loaded");
        Ok(())
    }

    /// Map and validate without touching the network.
    pub fn preview(&self) -> CommitPreview {
        let document = self.session.to_document();
        let report = self.validate(&document);
        CommitPreview { document, report }
    }

    /// Validate, then persist. A failing report blocks the network call
    /// entirely; a transport failure keeps every local edit.
    pub async fn commit(&self) -> Result<ConfigDocument, CommitError> {
        let document = self.session.to_document();
        let report = self.validate(&document);
        if !report.ok {
            warn!(problems = report.errors.len(), "commit blocked by validation");
            return Err(CommitError::Validation(report));
        }
        self.store.put(&document).await?;
        info!(devices = document.devices.len(), "configuration committed");
        Ok(document)
    }

    /// Raw persisted document, independent of any draft state.
    pub async fn backup(&self) -> Result<Value, StoreError> {
        self.store.fetch().await
    }

    /// Replace the whole session with an externally supplied document.
    pub fn import(&mut self, document: &Value) {
        self.session = DraftSession::from_document(document);
        info!(devices = self.session.bus().devices.len(), "configuration imported");
    }

    /// Wire document for the current draft, for local download.
    pub fn export(&self) -> ConfigDocument {
        self.session.to_document()
    }

    /// Test request mirroring a draft datapoint's current settings, or
    /// `None` when no datapoint carries that id.
    pub fn test_request(&self, datapoint_id: &str) -> Option<TestRequest> {
        let (device, point) = self.session.bus().find_datapoint(datapoint_id)?;
        Some(TestRequest::for_datapoint(&device.id, point))
    }

    /// One-shot diagnostic read or write, decoupled from validation and
    /// commit state.
    pub async fn execute_test(&self, request: &TestRequest) -> Result<TestOutcome, StoreError> {
        self.store.execute(request).await
    }

    fn validate(&self, document: &ConfigDocument) -> ValidationReport {
        validate_document(&document.to_value(), self.profile)
    }
}
