//! In-memory store for tests, dry runs, and examples.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, LogStore, SettingsStore, SiteStore};
use crate::types::{
    AnalysisUpdate, DocumentRecord, LogRecord, SiteFieldsUpdate, SiteRecord,
};

/// Thread-safe in-memory implementation of the storage traits.
///
/// Documents and logs keep insertion order (newest last internally,
/// returned newest first). Enforces the same `(site_id, batch_id,
/// url_doc)` uniqueness a relational backend would.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<DocumentRecord>>,
    logs: RwLock<Vec<LogRecord>>,
    sites: RwLock<HashMap<Uuid, SiteRecord>>,
    settings: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents (for tests).
    pub fn document_count(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    /// Number of stored log entries (for tests).
    pub fn log_count(&self) -> usize {
        self.logs.read().unwrap().len()
    }

    /// Number of stored sites (for tests).
    pub fn site_count(&self) -> usize {
        self.sites.read().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap();
        let duplicate = documents.iter().any(|existing| {
            existing.site_id == record.site_id
                && existing.batch_id == record.batch_id
                && existing.document.url_doc == record.document.url_doc
        });
        if duplicate {
            return Err(StoreError::Conflict {
                constraint: "documents_site_batch_url_key".to_string(),
            });
        }
        documents.push(record.clone());
        Ok(())
    }

    async fn recent_documents(&self, limit: usize) -> StoreResult<Vec<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.iter().rev().take(limit).cloned().collect())
    }

    async fn documents_for_site(&self, site_id: Uuid) -> StoreResult<Vec<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents
            .iter()
            .rev()
            .filter(|record| record.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.iter().find(|record| record.id == id).cloned())
    }

    async fn update_document_analysis(
        &self,
        id: Uuid,
        update: &AnalysisUpdate,
    ) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap();
        let record = documents
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(StoreError::NotFound {
                entity: "document",
                id: id.to_string(),
            })?;
        record.document.resume = update.resume.clone();
        record.document.langue = update.langue.clone();
        record.document.contient_texte = update.contient_texte;
        Ok(())
    }

    async fn count_documents(&self, site_id: Uuid) -> StoreResult<usize> {
        let documents = self.documents.read().unwrap();
        Ok(documents
            .iter()
            .filter(|record| record.site_id == site_id)
            .count())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_log(&self, record: &LogRecord) -> StoreResult<()> {
        self.logs.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn logs_for_site(&self, site_id: Uuid) -> StoreResult<Vec<LogRecord>> {
        let logs = self.logs.read().unwrap();
        Ok(logs
            .iter()
            .rev()
            .filter(|record| record.site_id == site_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn get_site(&self, id: Uuid) -> StoreResult<Option<SiteRecord>> {
        Ok(self.sites.read().unwrap().get(&id).cloned())
    }

    async fn upsert_site(&self, site: &SiteRecord) -> StoreResult<()> {
        self.sites.write().unwrap().insert(site.id, site.clone());
        Ok(())
    }

    async fn update_site_fields(&self, id: Uuid, update: &SiteFieldsUpdate) -> StoreResult<()> {
        let mut sites = self.sites.write().unwrap();
        let site = sites.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "site",
            id: id.to_string(),
        })?;
        if let Some(obstacles) = &update.obstacles_globaux {
            site.obstacles_globaux = obstacles.clone();
        }
        if let Some(recommandations) = &update.recommandations {
            site.recommandations = Some(recommandations.clone());
        }
        site.updated_at = Utc::now();
        Ok(())
    }

    async fn list_sites(&self) -> StoreResult<Vec<SiteRecord>> {
        let sites = self.sites.read().unwrap();
        let mut all: Vec<SiteRecord> = sites.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_setting(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.settings.read().unwrap().get(key).cloned())
    }

    async fn store_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.settings
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HarvestLog, HarvestedDocument, LogLevel};

    fn record(site_id: Uuid, batch_id: &str, url: &str) -> DocumentRecord {
        DocumentRecord::new(site_id, batch_id, HarvestedDocument::new(url))
    }

    #[tokio::test]
    async fn insert_and_fetch_documents() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        store
            .insert_document(&record(site_id, "batch-1", "https://example.org/a.pdf"))
            .await
            .unwrap();
        store
            .insert_document(&record(site_id, "batch-1", "https://example.org/b.pdf"))
            .await
            .unwrap();

        assert_eq!(store.document_count(), 2);
        let recent = store.recent_documents(10).await.unwrap();
        assert_eq!(recent[0].document.url_doc, "https://example.org/b.pdf");
        assert_eq!(store.count_documents(site_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        let first = record(site_id, "batch-1", "https://example.org/a.pdf");
        store.insert_document(&first).await.unwrap();

        let replay = record(site_id, "batch-1", "https://example.org/a.pdf");
        let err = store.insert_document(&replay).await.unwrap_err();
        assert!(err.is_conflict());

        // same URL in a different batch is fine
        let other_batch = record(site_id, "batch-2", "https://example.org/a.pdf");
        store.insert_document(&other_batch).await.unwrap();
        assert_eq!(store.document_count(), 2);
    }

    #[tokio::test]
    async fn recent_documents_respects_limit() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        for i in 0..5 {
            store
                .insert_document(&record(
                    site_id,
                    "batch-1",
                    &format!("https://example.org/{i}.pdf"),
                ))
                .await
                .unwrap();
        }
        let recent = store.recent_documents(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].document.url_doc, "https://example.org/4.pdf");
    }

    #[tokio::test]
    async fn analysis_update_mutates_the_stored_document() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        let rec = record(site_id, "batch-1", "https://example.org/a.pdf");
        let id = rec.id;
        store.insert_document(&rec).await.unwrap();

        let update = AnalysisUpdate {
            resume: "Compte rendu du conseil".to_string(),
            langue: "fr".to_string(),
            contient_texte: true,
        };
        store.update_document_analysis(id, &update).await.unwrap();

        let stored = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(stored.document.resume, "Compte rendu du conseil");
        assert!(stored.document.contient_texte);

        let missing = store
            .update_document_analysis(Uuid::new_v4(), &update)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn logs_are_scoped_per_site() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        store
            .insert_log(&LogRecord::new(
                site_id,
                "batch-1",
                HarvestLog::new(LogLevel::Info, "début du parcours"),
            ))
            .await
            .unwrap();
        store
            .insert_log(&LogRecord::new(
                other,
                "batch-1",
                HarvestLog::new(LogLevel::Error, "page introuvable"),
            ))
            .await
            .unwrap();

        assert_eq!(store.log_count(), 2);
        let logs = store.logs_for_site(site_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log.message, "début du parcours");
    }

    #[tokio::test]
    async fn site_fields_update_is_partial() {
        let store = MemoryStore::new();
        let mut site = SiteRecord::new("Ville", "https://ville.example.org");
        site.recommandations = Some("anciennes consignes".to_string());
        store.upsert_site(&site).await.unwrap();
        assert_eq!(store.site_count(), 1);

        let update = SiteFieldsUpdate {
            obstacles_globaux: Some(vec!["captcha".to_string()]),
            recommandations: None,
        };
        store.update_site_fields(site.id, &update).await.unwrap();

        let stored = store.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(stored.obstacles_globaux, vec!["captcha"]);
        // untouched by the partial update
        assert_eq!(stored.recommandations.as_deref(), Some("anciennes consignes"));

        let missing = store
            .update_site_fields(Uuid::new_v4(), &update)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.load_setting("prompt").await.unwrap(), None);
        store.store_setting("prompt", "consignes").await.unwrap();
        assert_eq!(
            store.load_setting("prompt").await.unwrap().as_deref(),
            Some("consignes")
        );
    }
}
