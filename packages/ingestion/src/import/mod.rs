//! The import orchestrator: a forward-only phase machine.
//!
//! An import run validates the payload, extracts the usable batch, then
//! walks the phases in a fixed order: documents, site fields, logs,
//! completion. Per-document failures are collected and the run keeps
//! going; only a payload that fails validation aborts, into the
//! absorbing error phase. The returned [`ImportResult`] is always
//! well-formed, whatever happened.

mod idempotency;

pub use idempotency::{batch_id_for_payload, was_already_imported, IDEMPOTENCY_SCAN_WINDOW};

use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::best_effort::BestEffort;
use crate::error::{IngestError, Result, StoreError};
use crate::extract::extract_valid_data;
use crate::traits::HarvestStore;
use crate::types::{
    DocumentRecord, HarvestBatch, ImportPhase, ImportProgress, ImportResult, LogRecord,
    SiteFieldsUpdate,
};
use crate::validate::{validate_import_json_with, ValidationOptions};

/// Where an import goes: the owning site and the batch identity.
#[derive(Debug, Clone)]
pub struct ImportTarget {
    pub site_id: Uuid,
    /// SHA-256 hex of the source payload
    pub batch_id: String,
}

impl ImportTarget {
    pub fn new(site_id: Uuid, batch_id: impl Into<String>) -> Self {
        Self {
            site_id,
            batch_id: batch_id.into(),
        }
    }

    /// Derive the batch id from the payload itself.
    pub fn from_payload(site_id: Uuid, payload: &str) -> Self {
        Self::new(site_id, batch_id_for_payload(payload))
    }
}

/// Knobs for an [`Importer`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub validation: ValidationOptions,
    /// When set, any error in the run makes `success` false, even if
    /// documents were imported. Default: errors are tolerated as long
    /// as at least one document landed.
    pub strict_success: bool,
}

impl ImportOptions {
    pub fn with_validation(mut self, validation: ValidationOptions) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_strict_success(mut self, strict: bool) -> Self {
        self.strict_success = strict;
        self
    }
}

/// Receives progress snapshots during an import run.
///
/// Snapshots are delivered synchronously, in order, from the importing
/// task. At most one observer is registered at a time.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ImportProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ImportProgress) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ImportProgress) {
        self(snapshot)
    }
}

/// Runs import batches against a store.
pub struct Importer<S> {
    store: S,
    options: ImportOptions,
    observer: RwLock<Option<Arc<dyn ProgressObserver>>>,
}

impl<S: HarvestStore> Importer<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ImportOptions::default())
    }

    pub fn with_options(store: S, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            observer: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Register the progress observer. The last registration wins.
    pub fn set_observer(&self, observer: Arc<dyn ProgressObserver>) {
        if let Ok(mut slot) = self.observer.write() {
            *slot = Some(observer);
        }
    }

    pub fn clear_observer(&self) {
        if let Ok(mut slot) = self.observer.write() {
            *slot = None;
        }
    }

    /// True when a recent document already carries `batch_id`.
    pub async fn was_already_imported(&self, batch_id: &str) -> bool {
        was_already_imported(&self.store, batch_id).await
    }

    /// Run a full import of `text` for `target`.
    ///
    /// Never returns an error: a rejected payload comes back as a
    /// failed [`ImportResult`] after the error-phase snapshot.
    pub async fn import_json(&self, text: &str, target: &ImportTarget) -> ImportResult {
        match self.run_import(text, target).await {
            Ok(result) => result,
            Err(err) => {
                warn!(site_id = %target.site_id, error = %err, "import aborted");
                let errors = match err {
                    IngestError::InvalidPayload { errors } => errors,
                    other => vec![other.to_string()],
                };
                let result = ImportResult::failed(errors);
                self.emit(self.snapshot(
                    ImportPhase::Error,
                    "Import aborted".to_string(),
                    100,
                    0,
                    0,
                    &result,
                ));
                result
            }
        }
    }

    async fn run_import(&self, text: &str, target: &ImportTarget) -> Result<ImportResult> {
        let mut result = ImportResult::new();

        self.emit(self.snapshot(
            ImportPhase::Parsing,
            "Validating import payload".to_string(),
            ImportPhase::Parsing.percent(0, 1),
            0,
            0,
            &result,
        ));

        let report = validate_import_json_with(text, &self.options.validation);
        if !report.is_valid {
            return Err(IngestError::InvalidPayload {
                errors: report.error_messages(),
            });
        }
        result.warnings = report.warning_messages();

        let batch = extract_valid_data(text);
        debug!(
            site_id = %target.site_id,
            documents = batch.documents.len(),
            logs = batch.logs.len(),
            "payload validated and extracted"
        );

        self.import_documents(&batch, target, &mut result).await;
        self.update_site_fields(&batch, target, &mut result).await;
        self.record_logs(&batch, target, &mut result).await;

        result.success = if self.options.strict_success {
            result.errors.is_empty()
        } else {
            result.errors.is_empty() || result.documents_imported > 0
        };

        let total = batch.documents.len();
        info!(
            site_id = %target.site_id,
            imported = result.documents_imported,
            failed = result.documents_with_errors,
            logs = result.logs_imported,
            success = result.success,
            "import finished"
        );
        self.emit(self.snapshot(
            ImportPhase::Completed,
            format!(
                "Import complete: {} of {} document(s)",
                result.documents_imported, total
            ),
            100,
            total,
            total,
            &result,
        ));

        Ok(result)
    }

    async fn import_documents(
        &self,
        batch: &HarvestBatch,
        target: &ImportTarget,
        result: &mut ImportResult,
    ) {
        let total = batch.documents.len();
        if total == 0 {
            self.emit(self.snapshot(
                ImportPhase::Documents,
                "No documents to import".to_string(),
                ImportPhase::Documents.percent(0, 0),
                0,
                0,
                result,
            ));
            return;
        }

        for (index, document) in batch.documents.iter().enumerate() {
            let record = DocumentRecord::new(target.site_id, &target.batch_id, document.clone());
            let message = match self.store.insert_document(&record).await {
                Ok(()) => {
                    result.documents_imported += 1;
                    format!("Imported {}", document.display_name())
                }
                Err(StoreError::Conflict { constraint }) => {
                    debug!(url = %document.url_doc, constraint, "document already imported");
                    result
                        .warnings
                        .push(format!("document {} already imported", document.url_doc));
                    format!("Already imported {}", document.display_name())
                }
                Err(err) => {
                    warn!(url = %document.url_doc, error = %err, "document import failed");
                    result.documents_with_errors += 1;
                    result
                        .errors
                        .push(format!("document {}: {}", document.url_doc, err));
                    format!("Failed to import {}", document.display_name())
                }
            };
            self.emit(self.snapshot(
                ImportPhase::Documents,
                message,
                ImportPhase::Documents.percent(index + 1, total),
                index + 1,
                total,
                result,
            ));
        }
    }

    async fn update_site_fields(
        &self,
        batch: &HarvestBatch,
        target: &ImportTarget,
        result: &mut ImportResult,
    ) {
        let total = batch.documents.len();
        if !batch.has_site_fields() {
            self.emit(self.snapshot(
                ImportPhase::SiteUpdate,
                "No site-level fields to update".to_string(),
                ImportPhase::SiteUpdate.percent(0, 0),
                total,
                total,
                result,
            ));
            return;
        }

        let update = SiteFieldsUpdate {
            obstacles_globaux: (!batch.obstacles_globaux.is_empty())
                .then(|| batch.obstacles_globaux.clone()),
            recommandations: batch.recommandations.clone(),
        };

        // Site update failures are recorded but never abort the batch.
        let mut side = BestEffort::new();
        let message = if side
            .run(
                "site update",
                self.store.update_site_fields(target.site_id, &update),
            )
            .await
            .is_some()
        {
            result.obstacles_updated = update.obstacles_globaux.is_some();
            result.recommendations_updated = update.recommandations.is_some();
            "Updated site fields".to_string()
        } else {
            "Site fields update failed".to_string()
        };
        result.errors.extend(side.into_failures());

        self.emit(self.snapshot(
            ImportPhase::SiteUpdate,
            message,
            ImportPhase::SiteUpdate.percent(1, 1),
            total,
            total,
            result,
        ));
    }

    async fn record_logs(
        &self,
        batch: &HarvestBatch,
        target: &ImportTarget,
        result: &mut ImportResult,
    ) {
        let doc_total = batch.documents.len();
        let total = batch.logs.len();
        if total == 0 {
            self.emit(self.snapshot(
                ImportPhase::Logs,
                "No logs to record".to_string(),
                ImportPhase::Logs.percent(0, 0),
                doc_total,
                doc_total,
                result,
            ));
            return;
        }

        // Strictly best-effort: failures are traced but stay out of the
        // result's error list.
        let mut side = BestEffort::new();
        for (index, log) in batch.logs.iter().enumerate() {
            let record = LogRecord::new(target.site_id, &target.batch_id, log.clone());
            if side
                .run("log insert", self.store.insert_log(&record))
                .await
                .is_some()
            {
                result.logs_imported += 1;
            }
            self.emit(self.snapshot(
                ImportPhase::Logs,
                format!("Recorded {} of {} log(s)", index + 1, total),
                ImportPhase::Logs.percent(index + 1, total),
                doc_total,
                doc_total,
                result,
            ));
        }
    }

    fn snapshot(
        &self,
        phase: ImportPhase,
        message: String,
        percent: u8,
        documents_processed: usize,
        total_documents: usize,
        result: &ImportResult,
    ) -> ImportProgress {
        ImportProgress {
            phase,
            message,
            percent,
            documents_processed,
            total_documents,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
        }
    }

    fn emit(&self, snapshot: ImportProgress) {
        if let Ok(slot) = self.observer.read() {
            if let Some(observer) = slot.as_ref() {
                observer.on_progress(&snapshot);
            }
        }
    }
}
