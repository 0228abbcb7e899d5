//! Persisted record shapes.
//!
//! Records wrap the wire types with identity and provenance: which site
//! the data belongs to and which batch (payload hash) produced it. The
//! batch id is what makes idempotency checks possible after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::HarvestedDocument;
use super::log::HarvestLog;

/// A harvested document as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    /// SHA-256 hex of the source payload this document arrived in
    pub batch_id: String,
    #[serde(flatten)]
    pub document: HarvestedDocument,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(site_id: Uuid, batch_id: impl Into<String>, document: HarvestedDocument) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            batch_id: batch_id.into(),
            document,
            created_at: Utc::now(),
        }
    }
}

/// A harvest log entry as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub batch_id: String,
    #[serde(flatten)]
    pub log: HarvestLog,
    pub created_at: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(site_id: Uuid, batch_id: impl Into<String>, log: HarvestLog) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            batch_id: batch_id.into(),
            log,
            created_at: Utc::now(),
        }
    }
}

/// A monitored site: the unit a harvest runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    /// Operator guidance woven into the harvest prompt
    #[serde(default)]
    pub harvest_instructions: String,
    /// Site-wide obstacles reported by the latest harvest
    #[serde(default)]
    pub obstacles_globaux: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommandations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            harvest_instructions: String::new(),
            obstacles_globaux: Vec::new(),
            recommandations: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.harvest_instructions = instructions.into();
        self
    }
}

/// Partial update of a site's harvest-reported fields.
///
/// `None` leaves the stored value untouched; `Some` replaces it (the
/// latest harvest wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFieldsUpdate {
    pub obstacles_globaux: Option<Vec<String>>,
    pub recommandations: Option<String>,
}

impl SiteFieldsUpdate {
    pub fn is_empty(&self) -> bool {
        self.obstacles_globaux.is_none() && self.recommandations.is_none()
    }
}

/// Analysis output applied back onto a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisUpdate {
    pub resume: String,
    pub langue: String,
    pub contient_texte: bool,
}
