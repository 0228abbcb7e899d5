//! Test utilities and mock implementations.
//!
//! Everything here is deterministic: canned responses, injected
//! failures, a hand-cranked clock. No network, no disk.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::cache::Clock;
use crate::error::{IngestError, LlmError, LlmResult, Result, StoreError, StoreResult};
use crate::import::ProgressObserver;
use crate::traits::{
    DocumentStore, LanguageModel, LogStore, SettingsStore, SiteStore, TextExtractor,
};
use crate::types::{
    AnalysisUpdate, DocumentRecord, ImportPhase, ImportProgress, LogRecord, SiteFieldsUpdate,
    SiteRecord,
};

/// A recorded call against [`MockLanguageModel`].
#[derive(Debug, Clone)]
pub enum MockLlmCall {
    Complete { system: String, user: String },
    Embed { text: String },
}

/// Scriptable [`LanguageModel`]: queued responses, injected failures,
/// optional artificial latency, and a call log.
///
/// Responses are served queued-first, then the default response, then a
/// minimal empty envelope.
pub struct MockLanguageModel {
    default_response: Mutex<Option<String>>,
    queued_responses: Mutex<VecDeque<String>>,
    remaining_failures: AtomicUsize,
    response_delay: Option<StdDuration>,
    embedding_dim: usize,
    calls: Mutex<Vec<MockLlmCall>>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self {
            default_response: Mutex::new(None),
            queued_responses: Mutex::new(VecDeque::new()),
            remaining_failures: AtomicUsize::new(0),
            response_delay: None,
            embedding_dim: 16,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response; queued responses are consumed in order.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.queued_responses.lock().unwrap().push_back(response.into());
        self
    }

    /// Response served whenever the queue is empty.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.lock().unwrap() = Some(response.into());
        self
    }

    /// Make the next `count` calls to `complete` fail with a 503.
    pub fn fail_times(self, count: usize) -> Self {
        self.remaining_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep this long before answering (for timeout tests).
    pub fn with_response_delay(mut self, delay: StdDuration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn calls(&self) -> Vec<MockLlmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn complete_call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, MockLlmCall::Complete { .. }))
            .count()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, system: &str, user: &str) -> LlmResult<String> {
        self.calls.lock().unwrap().push(MockLlmCall::Complete {
            system: system.to_string(),
            user: user.to_string(),
        });
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }
        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(LlmError::Api {
                status: 503,
                message: "mock failure".to_string(),
            });
        }
        if let Some(queued) = self.queued_responses.lock().unwrap().pop_front() {
            return Ok(queued);
        }
        if let Some(default) = self.default_response.lock().unwrap().clone() {
            return Ok(default);
        }
        Ok(r#"{"documents": [], "logs": []}"#.to_string())
    }

    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        self.calls.lock().unwrap().push(MockLlmCall::Embed {
            text: text.to_string(),
        });
        Ok(deterministic_embedding(text, self.embedding_dim))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Embedding derived from a hash of the text: stable across runs,
/// different for different inputs.
pub fn deterministic_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    (0..dim)
        .map(|i| {
            let byte = digest[i % digest.len()];
            (byte as f32 / 255.0) * 2.0 - 1.0
        })
        .collect()
}

/// Canned [`TextExtractor`].
pub struct MockTextExtractor {
    text: String,
    should_fail: bool,
}

impl MockTextExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            should_fail: false,
        }
    }

    /// An extractor whose every call fails.
    pub fn failing() -> Self {
        Self {
            text: String::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract_text(&self, _bytes: &[u8]) -> Result<String> {
        if self.should_fail {
            return Err(IngestError::TextExtraction(
                std::io::Error::new(std::io::ErrorKind::Other, "mock OCR failure").into(),
            ));
        }
        Ok(self.text.clone())
    }
}

/// Store wrapper that injects failures into selected operations and
/// delegates everything else to the wrapped store.
pub struct FlakyStore<S> {
    inner: S,
    failing_insert_calls: Mutex<HashSet<usize>>,
    insert_attempts: AtomicUsize,
    fail_recent: AtomicBool,
    fail_log_inserts: AtomicBool,
    fail_site_updates: AtomicBool,
    fail_settings_loads: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_insert_calls: Mutex::new(HashSet::new()),
            insert_attempts: AtomicUsize::new(0),
            fail_recent: AtomicBool::new(false),
            fail_log_inserts: AtomicBool::new(false),
            fail_site_updates: AtomicBool::new(false),
            fail_settings_loads: AtomicBool::new(false),
        }
    }

    /// Fail the `call`-th (1-based) `insert_document` call.
    pub fn fail_document_insert(self, call: usize) -> Self {
        self.failing_insert_calls.lock().unwrap().insert(call);
        self
    }

    pub fn fail_recent_documents(self) -> Self {
        self.fail_recent.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_log_inserts(self) -> Self {
        self.fail_log_inserts.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_site_updates(self) -> Self {
        self.fail_site_updates.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_settings_loads(self) -> Self {
        self.fail_settings_loads.store(true, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn injected() -> StoreError {
        StoreError::backend(std::io::Error::new(
            std::io::ErrorKind::Other,
            "injected failure",
        ))
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn insert_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        let call = self.insert_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_insert_calls.lock().unwrap().contains(&call) {
            return Err(Self::injected());
        }
        self.inner.insert_document(record).await
    }

    async fn recent_documents(&self, limit: usize) -> StoreResult<Vec<DocumentRecord>> {
        if self.fail_recent.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.recent_documents(limit).await
    }

    async fn documents_for_site(&self, site_id: Uuid) -> StoreResult<Vec<DocumentRecord>> {
        self.inner.documents_for_site(site_id).await
    }

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        self.inner.get_document(id).await
    }

    async fn update_document_analysis(
        &self,
        id: Uuid,
        update: &AnalysisUpdate,
    ) -> StoreResult<()> {
        self.inner.update_document_analysis(id, update).await
    }

    async fn count_documents(&self, site_id: Uuid) -> StoreResult<usize> {
        self.inner.count_documents(site_id).await
    }
}

#[async_trait]
impl<S: LogStore> LogStore for FlakyStore<S> {
    async fn insert_log(&self, record: &LogRecord) -> StoreResult<()> {
        if self.fail_log_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.insert_log(record).await
    }

    async fn logs_for_site(&self, site_id: Uuid) -> StoreResult<Vec<LogRecord>> {
        self.inner.logs_for_site(site_id).await
    }
}

#[async_trait]
impl<S: SiteStore> SiteStore for FlakyStore<S> {
    async fn get_site(&self, id: Uuid) -> StoreResult<Option<SiteRecord>> {
        self.inner.get_site(id).await
    }

    async fn upsert_site(&self, site: &SiteRecord) -> StoreResult<()> {
        self.inner.upsert_site(site).await
    }

    async fn update_site_fields(&self, id: Uuid, update: &SiteFieldsUpdate) -> StoreResult<()> {
        if self.fail_site_updates.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.update_site_fields(id, update).await
    }

    async fn list_sites(&self) -> StoreResult<Vec<SiteRecord>> {
        self.inner.list_sites().await
    }
}

#[async_trait]
impl<S: SettingsStore> SettingsStore for FlakyStore<S> {
    async fn load_setting(&self, key: &str) -> StoreResult<Option<String>> {
        if self.fail_settings_loads.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.load_setting(key).await
    }

    async fn store_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.store_setting(key, value).await
    }
}

/// Progress observer that keeps every snapshot it sees.
#[derive(Default)]
pub struct CollectingObserver {
    snapshots: Mutex<Vec<ImportProgress>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<ImportProgress> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<ImportPhase> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|snapshot| snapshot.phase)
            .collect()
    }
}

impl ProgressObserver for CollectingObserver {
    fn on_progress(&self, snapshot: &ImportProgress) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

/// Hand-cranked [`Clock`].
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Builds import payloads for tests.
#[derive(Default)]
pub struct EnvelopeBuilder {
    documents: Vec<Value>,
    logs: Vec<Value>,
    obstacles: Vec<String>,
    recommandations: Option<String>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fully populated document: validates without findings.
    pub fn document(mut self, url: &str) -> Self {
        let n = self.documents.len() + 1;
        self.documents.push(json!({
            "url_doc": url,
            "document_name": format!("Bulletin municipal n°{n}"),
            "filename": format!("bulletin-{n}.pdf"),
            "date_edition": "1987-03",
            "auteurs": "Commission des archives",
            "langue": "fr",
            "resume": "Compte rendu du conseil municipal",
            "statut": "disponible",
            "issue_number": n.to_string(),
            "annee": 1987,
            "format": "PDF",
            "type_document": "bulletin",
            "contient_texte": true,
            "pattern_verified": true,
            "notes": "numérisation complète",
            "obstacles": "aucun",
            "source_page": "https://ville.example.org/archives",
        }));
        self
    }

    /// Add a document carrying only `url_doc` (warns on every optional).
    pub fn sparse_document(mut self, url: &str) -> Self {
        self.documents.push(json!({ "url_doc": url }));
        self
    }

    /// Add an arbitrary raw entry to `documents`.
    pub fn raw_document(mut self, value: Value) -> Self {
        self.documents.push(value);
        self
    }

    pub fn log(mut self, level: &str, message: &str) -> Self {
        self.logs.push(json!({
            "level": level,
            "message": message,
            "timestamp": "2026-08-25T10:00:00Z",
        }));
        self
    }

    pub fn obstacle(mut self, text: &str) -> Self {
        self.obstacles.push(text.to_string());
        self
    }

    pub fn recommandations(mut self, text: &str) -> Self {
        self.recommandations = Some(text.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut root = json!({
            "documents": self.documents,
            "logs": self.logs,
        });
        if !self.obstacles.is_empty() {
            root["obstacles-globaux"] = json!(self.obstacles);
        }
        if let Some(text) = &self.recommandations {
            root["recommandations"] = json!(text);
        }
        root.to_string()
    }
}
