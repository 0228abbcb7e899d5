//! The normalized harvested document.
//!
//! Field names match the wire format of the import envelope bit for bit,
//! including the French names (`annee`, `auteurs`, `resume`). The harvest
//! prompts instruct the model to produce exactly these keys, and the
//! serde derives reproduce them when a document is rendered back to JSON.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A single harvested document, after extraction and normalization.
///
/// Every field except `url_doc` is optional on the wire; extraction fills
/// the defaults documented on each field, so a value of this type is always
/// complete. Construct with [`HarvestedDocument::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedDocument {
    /// Absolute URL of the document. Required and validated.
    pub url_doc: String,
    /// Display title, `""` when absent
    #[serde(default)]
    pub document_name: String,
    /// Original file name, `""` when absent
    #[serde(default)]
    pub filename: String,
    /// Free-text edition date, loosely validated, `""` when absent
    #[serde(default)]
    pub date_edition: String,
    #[serde(default)]
    pub auteurs: String,
    #[serde(default)]
    pub langue: String,
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub statut: String,
    #[serde(default)]
    pub issue_number: String,
    /// Publication year, defaults to the current year when absent
    #[serde(default = "current_year")]
    pub annee: i32,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub type_document: String,
    /// Whether the document carries machine-readable text
    #[serde(default)]
    pub contient_texte: bool,
    /// Whether the URL was verified against the site's naming pattern
    #[serde(default)]
    pub pattern_verified: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub obstacles: String,
    /// Page the document was discovered on, `""` when absent
    #[serde(default)]
    pub source_page: String,
}

pub(crate) fn current_year() -> i32 {
    Utc::now().year()
}

impl HarvestedDocument {
    /// Create a document with all optional fields at their defaults.
    pub fn new(url_doc: impl Into<String>) -> Self {
        Self {
            url_doc: url_doc.into(),
            document_name: String::new(),
            filename: String::new(),
            date_edition: String::new(),
            auteurs: String::new(),
            langue: String::new(),
            resume: String::new(),
            statut: String::new(),
            issue_number: String::new(),
            annee: current_year(),
            format: String::new(),
            type_document: String::new(),
            contient_texte: false,
            pattern_verified: false,
            notes: String::new(),
            obstacles: String::new(),
            source_page: String::new(),
        }
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn with_annee(mut self, annee: i32) -> Self {
        self.annee = annee;
        self
    }

    pub fn with_langue(mut self, langue: impl Into<String>) -> Self {
        self.langue = langue.into();
        self
    }

    /// Best available label for progress messages and reports:
    /// the title, else the file name, else the URL.
    pub fn display_name(&self) -> &str {
        if !self.document_name.is_empty() {
            &self.document_name
        } else if !self.filename.is_empty() {
            &self.filename
        } else {
            &self.url_doc
        }
    }
}
