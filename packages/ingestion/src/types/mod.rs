//! Core data types shared across the ingestion pipeline.

mod batch;
mod document;
mod finding;
mod log;
mod progress;
mod record;

pub use batch::{envelope, HarvestBatch};
pub use document::HarvestedDocument;
pub use finding::{Finding, Severity};
pub use log::{HarvestLog, LogLevel};
pub use progress::{ImportPhase, ImportProgress, ImportResult};
pub use record::{
    AnalysisUpdate, DocumentRecord, LogRecord, SiteFieldsUpdate, SiteRecord,
};

pub(crate) use document::current_year;
