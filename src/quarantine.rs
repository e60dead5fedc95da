//! File quarantine controller.
//!
//! Coordinates one invocation: object → text → row scan → disposition →
//! (on rejection) quarantine transition.
//!
//! ```text
//! read(source) ──▶ scan_content ──┬── no rejection ──▶ Accepted
//!                                 │
//!                                 └── rejection ──▶ copy(source, quarantine)
//!                                                        │ ok
//!                                                        ▼
//!                                                   delete(source) ──▶ Quarantined
//! ```
//!
//! The transition is a guarded sequence: `delete` runs only after `copy`
//! has succeeded, so a failed copy always leaves the source in place.
//! Two invocations racing on the same object are not coordinated.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::event::ObjectCreatedEvent;
use crate::models::{Disposition, ObjectRef};
use crate::store::{build_store, ObjectStore, StorageError};
use crate::validate::{scan_content, RuleSet, Validator};

/// Which half of the quarantine transition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStage {
    Copy,
    Delete,
}

impl fmt::Display for TransitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionStage::Copy => f.write_str("copy"),
            TransitionStage::Delete => f.write_str("delete"),
        }
    }
}

/// Fatal outcome of one invocation. Validation failures are never errors.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to read {object}: {source}")]
    Read {
        object: ObjectRef,
        source: StorageError,
    },

    #[error("{object} is not UTF-8 text: {message}")]
    Decode { object: ObjectRef, message: String },

    #[error("quarantine {stage} failed for {object}: {source}")]
    Transition {
        object: ObjectRef,
        stage: TransitionStage,
        source: StorageError,
    },

    #[error("{object} is already in the quarantine container")]
    QuarantineIsSource { object: ObjectRef },
}

impl ProcessError {
    /// True when the source object does not exist (e.g. it was already quarantined).
    pub fn is_source_missing(&self) -> bool {
        matches!(self, ProcessError::Read { source, .. } if source.is_not_found())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ProcessError::Read { source, .. } if source.is_not_found() => 404,
            ProcessError::Decode { .. } => 422,
            ProcessError::Read { .. }
            | ProcessError::Transition { .. }
            | ProcessError::QuarantineIsSource { .. } => 500,
        }
    }
}

/// Structured result returned from every invocation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    pub fn failure(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Validates billing files and quarantines the ones that fail.
///
/// Holds no per-file state; each call to [`process`](Controller::process)
/// is an independent evaluation.
pub struct Controller {
    store: Arc<dyn ObjectStore>,
    validator: Validator,
    quarantine_container: String,
}

impl Controller {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        validator: Validator,
        quarantine_container: impl Into<String>,
    ) -> Self {
        Self {
            store,
            validator,
            quarantine_container: quarantine_container.into(),
        }
    }

    /// Build the store, rule set, and quarantine destination from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = Arc::from(build_store(&config.storage)?);
        let quarantine_container = config.quarantine.resolve_bucket()?;
        let validator = Validator::new(RuleSet::from(&config.rules));
        Ok(Self::new(store, validator, quarantine_container))
    }

    /// Validate one object and quarantine it if any record fails.
    pub async fn process(&self, source: &ObjectRef) -> Result<Disposition, ProcessError> {
        tracing::info!(%source, backend = self.store.backend(), "processing billing file");

        let bytes = self
            .store
            .read(source)
            .await
            .map_err(|e| ProcessError::Read {
                object: source.clone(),
                source: e,
            })?;
        let content = String::from_utf8(bytes).map_err(|e| ProcessError::Decode {
            object: source.clone(),
            message: e.to_string(),
        })?;

        let report = scan_content(&content, &self.validator);
        let Some(rejection) = report.rejection else {
            tracing::info!(%source, records = report.records_checked, "no errors found");
            return Ok(Disposition::Accepted {
                records: report.records_checked,
            });
        };

        tracing::warn!(
            %source,
            line = rejection.line,
            reason = %rejection.violation.kind,
            value = %rejection.violation.offending_value,
            record = %rejection.violation.record_identifier,
            "invalid record, quarantining file"
        );

        let destination = self.transition(source).await?;
        tracing::info!(%source, %destination, "file quarantined");

        Ok(Disposition::Quarantined {
            rejection,
            destination,
        })
    }

    /// Copy `source` into quarantine, then delete it; delete only after a confirmed copy.
    async fn transition(&self, source: &ObjectRef) -> Result<ObjectRef, ProcessError> {
        if source.container == self.quarantine_container {
            return Err(ProcessError::QuarantineIsSource {
                object: source.clone(),
            });
        }

        let fail = |stage: TransitionStage| {
            move |e: StorageError| {
                tracing::error!(%source, %stage, error = %e, "quarantine transition failed");
                ProcessError::Transition {
                    object: source.clone(),
                    stage,
                    source: e,
                }
            }
        };

        self.store
            .copy(source, &self.quarantine_container)
            .await
            .map_err(fail(TransitionStage::Copy))?;
        self.store
            .delete(source)
            .await
            .map_err(fail(TransitionStage::Delete))?;

        Ok(source.in_container(&self.quarantine_container))
    }

    /// Run [`process`](Controller::process) and normalise the outcome.
    pub async fn handle(&self, source: &ObjectRef) -> InvocationResult {
        match self.process(source).await {
            Ok(Disposition::Accepted { records }) => InvocationResult::ok(format!(
                "No errors found in {} ({} records checked)",
                source, records
            )),
            Ok(Disposition::Quarantined {
                rejection,
                destination,
            }) => InvocationResult::ok(format!(
                "Moved {} to {}: {}",
                source, destination, rejection
            )),
            Err(e) => InvocationResult::failure(e.status_code(), e.to_string()),
        }
    }

    /// Handle an object-created notification.
    pub async fn handle_event(&self, event: &ObjectCreatedEvent) -> InvocationResult {
        match event.source() {
            Ok(source) => self.handle(&source).await,
            Err(e) => InvocationResult::failure(400, e.to_string()),
        }
    }

    /// Handle an object-created notification given as raw JSON.
    pub async fn handle_event_json(&self, json: &str) -> InvocationResult {
        match ObjectCreatedEvent::from_json(json) {
            Ok(event) => self.handle_event(&event).await,
            Err(e) => InvocationResult::failure(400, e.to_string()),
        }
    }
}
