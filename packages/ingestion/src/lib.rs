//! Harvest Ingestion Library
//!
//! A backend library for a harvest dashboard: validate loosely-structured
//! JSON payloads (from a language model or an uploaded file), extract the
//! usable entries, and project them into document, log, and site records
//! through storage trait seams, reporting per-phase progress along the way.
//!
//! # Design Philosophy
//!
//! **"Recoverable by default"**
//!
//! - Validation reports findings, it never throws
//! - Extraction keeps what it can and defaults the rest
//! - Side writes (logs, site fields) never take a batch down
//! - Only a payload nothing can be made of stops an import
//!
//! # Usage
//!
//! ```rust,ignore
//! use ingestion::{validate_import_json, Importer, ImportTarget, MemoryStore};
//!
//! // Validate first to render an itemized report
//! let report = validate_import_json(&text);
//! if !report.is_valid {
//!     for message in report.error_messages() {
//!         eprintln!("{message}");
//!     }
//!     return;
//! }
//!
//! // Then import
//! let importer = Importer::new(MemoryStore::new());
//! let target = ImportTarget::from_payload(site_id, &text);
//! let result = importer.import_json(&text, &target).await;
//! println!("{}", result.summary());
//! ```
//!
//! # Modules
//!
//! - [`validate`] - Field and envelope validation producing findings
//! - [`extract`] - Permissive decode, dedupe, and defaulting
//! - [`import`] - Import orchestrator and its progress protocol
//! - [`harvest`] - Language-model-driven harvesting of configured sites
//! - [`analysis`] - Best-effort document text analysis
//! - [`traits`] - Seams to storage, language models, and OCR
//! - [`stores`] - Storage implementations (memory, Postgres)
//! - [`testing`] - Mocks and builders for tests

pub mod analysis;
pub mod best_effort;
pub mod cache;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod import;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validate;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{IngestError, LlmError, StoreError};
pub use traits::{
    DocumentStore, HarvestStore, LanguageModel, LogStore, SettingsStore, SiteStore, TextExtractor,
};
pub use types::{
    AnalysisUpdate, DocumentRecord, Finding, HarvestBatch, HarvestLog, HarvestedDocument,
    ImportPhase, ImportProgress, ImportResult, LogLevel, LogRecord, Severity, SiteFieldsUpdate,
    SiteRecord,
};

// Validation and extraction
pub use extract::{decode_document, decode_log, extract_valid_data};
pub use validate::{
    validate_document, validate_import_json, validate_import_json_with, validate_log,
    DuplicatePolicy, ValidationOptions, ValidationReport, ValidationSummary,
    MAX_DOCUMENTS_SOFT_LIMIT,
};

// Import orchestration
pub use import::{
    batch_id_for_payload, was_already_imported, ImportOptions, ImportTarget, Importer,
    ProgressObserver, IDEMPOTENCY_SCAN_WINDOW,
};

// Harvesting
pub use harvest::{
    format_harvest_prompt, harvest_prompt_hash, strip_code_fences, HarvestConfig, HarvestOutcome,
    Harvester, SiteHarvest, DEFAULT_HARVEST_PROMPT, HARVEST_PROMPT_SETTING,
};

// Document analysis
pub use analysis::{analyze_document, parse_summary_response, AnalysisReport};

// Shared machinery
pub use best_effort::BestEffort;
pub use cache::{Clock, SystemClock, TtlCache};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

#[cfg(feature = "openai")]
pub use ai::OpenAI;
