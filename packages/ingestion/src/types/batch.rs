//! The parsed import envelope.

use serde::{Deserialize, Serialize};

use super::document::HarvestedDocument;
use super::log::HarvestLog;

/// Wire-format key names of the import envelope.
///
/// `obstacles-globaux` is hyphenated on the wire; inside the crate the
/// field is snake_case and the serde rename restores the hyphen.
pub mod envelope {
    pub const DOCUMENTS: &str = "documents";
    pub const LOGS: &str = "logs";
    pub const OBSTACLES_GLOBAUX: &str = "obstacles-globaux";
    pub const RECOMMANDATIONS: &str = "recommandations";
    /// Accepted alternate spelling of [`RECOMMANDATIONS`]
    pub const RECOMMENDATIONS_ALT: &str = "recommendations";
}

/// A fully parsed, validated, and deduplicated import batch.
///
/// This is what the import orchestrator consumes: extraction guarantees
/// that every document here carries a usable `url_doc` and that no two
/// documents share one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestBatch {
    #[serde(default)]
    pub documents: Vec<HarvestedDocument>,
    #[serde(default)]
    pub logs: Vec<HarvestLog>,
    #[serde(default, rename = "obstacles-globaux")]
    pub obstacles_globaux: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommandations: Option<String>,
}

impl HarvestBatch {
    /// The batch extraction yields for malformed input: nothing to import.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.logs.is_empty()
            && self.obstacles_globaux.is_empty()
            && self.recommandations.is_none()
    }

    /// True when the batch carries site-level fields to write back.
    pub fn has_site_fields(&self) -> bool {
        !self.obstacles_globaux.is_empty() || self.recommandations.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_has_no_site_fields() {
        let batch = HarvestBatch::empty();
        assert!(batch.is_empty());
        assert!(!batch.has_site_fields());
    }

    #[test]
    fn recommandations_alone_count_as_site_fields() {
        let batch = HarvestBatch {
            recommandations: Some("vérifier la pagination".to_string()),
            ..HarvestBatch::empty()
        };
        assert!(batch.has_site_fields());
    }

    #[test]
    fn serializes_hyphenated_obstacles_key() {
        let batch = HarvestBatch {
            obstacles_globaux: vec!["captcha".to_string()],
            ..HarvestBatch::empty()
        };
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value[envelope::OBSTACLES_GLOBAUX][0], "captcha");
        assert!(value.get("obstacles_globaux").is_none());
    }
}
