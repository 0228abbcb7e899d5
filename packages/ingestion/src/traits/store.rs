//! Persistence traits.
//!
//! Split by concern so callers can depend on exactly what they need;
//! [`HarvestStore`] is the composite the orchestrators take. Implement
//! the four focused traits and the composite comes for free through the
//! blanket impl.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    AnalysisUpdate, DocumentRecord, LogRecord, SiteFieldsUpdate, SiteRecord,
};

/// Storage for harvested documents.
///
/// Implementations must enforce uniqueness of
/// `(site_id, batch_id, url_doc)` and answer inserts that violate it
/// with [`StoreError::Conflict`](crate::error::StoreError::Conflict);
/// import relies on the constraint to make replayed batches harmless.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, record: &DocumentRecord) -> StoreResult<()>;

    /// Most recent documents across all sites, newest first.
    async fn recent_documents(&self, limit: usize) -> StoreResult<Vec<DocumentRecord>>;

    /// All documents of one site, newest first.
    async fn documents_for_site(&self, site_id: Uuid) -> StoreResult<Vec<DocumentRecord>>;

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<DocumentRecord>>;

    /// Apply analysis output onto a stored document.
    async fn update_document_analysis(&self, id: Uuid, update: &AnalysisUpdate)
        -> StoreResult<()>;

    async fn count_documents(&self, site_id: Uuid) -> StoreResult<usize>;
}

/// Storage for harvest log entries.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_log(&self, record: &LogRecord) -> StoreResult<()>;

    /// All log entries of one site, newest first.
    async fn logs_for_site(&self, site_id: Uuid) -> StoreResult<Vec<LogRecord>>;
}

/// Storage for monitored sites.
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get_site(&self, id: Uuid) -> StoreResult<Option<SiteRecord>>;

    /// Insert or fully replace a site.
    async fn upsert_site(&self, site: &SiteRecord) -> StoreResult<()>;

    /// Apply a partial update to a site's harvest-reported fields.
    async fn update_site_fields(&self, id: Uuid, update: &SiteFieldsUpdate) -> StoreResult<()>;

    async fn list_sites(&self) -> StoreResult<Vec<SiteRecord>>;
}

/// Key-value settings the operator can edit at runtime.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_setting(&self, key: &str) -> StoreResult<Option<String>>;

    async fn store_setting(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Everything the import and harvest orchestrators need from storage.
pub trait HarvestStore: DocumentStore + LogStore + SiteStore + SettingsStore {}

impl<T: DocumentStore + LogStore + SiteStore + SettingsStore> HarvestStore for T {}
