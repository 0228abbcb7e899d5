//! Permissive extraction of whatever is usable from a payload.
//!
//! Validation and extraction are deliberately separate passes over the
//! same raw JSON: validation reports, extraction salvages. This module
//! never fails; on garbage input it yields an empty
//! [`HarvestBatch`]. A document is excluded only when its `url_doc` is
//! missing, blank, or unparseable. Every other field degrades to a
//! documented default.

use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{
    current_year, envelope, HarvestBatch, HarvestLog, HarvestedDocument, LogLevel,
};
use crate::validate::{is_valid_url, parse_loose_timestamp, parse_year};

/// Extract every usable document, log, and site-level field from `text`.
///
/// Duplicate `url_doc` values keep the first occurrence; later ones are
/// dropped and logged. The output order follows the input order.
pub fn extract_valid_data(text: &str) -> HarvestBatch {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        debug!("payload is not valid JSON; extracting nothing");
        return HarvestBatch::empty();
    };
    let Some(root) = value.as_object() else {
        debug!("payload root is not an object; extracting nothing");
        return HarvestBatch::empty();
    };

    let mut batch = HarvestBatch::empty();

    if let Some(entries) = root.get(envelope::DOCUMENTS).and_then(Value::as_array) {
        let mut seen = std::collections::HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            let Some(document) = decode_document(entry) else {
                debug!(index, "excluding document without usable url_doc");
                continue;
            };
            if !seen.insert(document.url_doc.clone()) {
                debug!(url = %document.url_doc, "dropping duplicate document");
                continue;
            }
            batch.documents.push(document);
        }
    }

    if let Some(entries) = root.get(envelope::LOGS).and_then(Value::as_array) {
        for entry in entries {
            if let Some(log) = decode_log(entry) {
                batch.logs.push(log);
            }
        }
    }

    if let Some(entries) = root.get(envelope::OBSTACLES_GLOBAUX).and_then(Value::as_array) {
        batch.obstacles_globaux = entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    batch.recommandations = root
        .get(envelope::RECOMMANDATIONS)
        .or_else(|| root.get(envelope::RECOMMENDATIONS_ALT))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    batch
}

/// Decode a single raw document entry, or `None` when it cannot be used.
///
/// Only `url_doc` can disqualify an entry; all other fields coerce to
/// their defaults.
pub fn decode_document(value: &Value) -> Option<HarvestedDocument> {
    let obj = value.as_object()?;
    let url_doc = obj.get("url_doc")?.as_str()?.trim();
    if url_doc.is_empty() || !is_valid_url(url_doc) {
        return None;
    }

    Some(HarvestedDocument {
        url_doc: url_doc.to_string(),
        document_name: string_field(obj, "document_name"),
        filename: string_field(obj, "filename"),
        date_edition: string_field(obj, "date_edition"),
        auteurs: string_field(obj, "auteurs"),
        langue: string_field(obj, "langue"),
        resume: string_field(obj, "resume"),
        statut: string_field(obj, "statut"),
        issue_number: string_field(obj, "issue_number"),
        annee: year_field(obj, "annee"),
        format: string_field(obj, "format"),
        type_document: string_field(obj, "type_document"),
        contient_texte: obj.get("contient_texte").map(truthy).unwrap_or(false),
        pattern_verified: obj.get("pattern_verified").map(truthy).unwrap_or(false),
        notes: string_field(obj, "notes"),
        obstacles: string_field(obj, "obstacles"),
        source_page: string_field(obj, "source_page"),
    })
}

/// Decode a single raw log entry. Non-objects are skipped.
pub fn decode_log(value: &Value) -> Option<HarvestLog> {
    let obj = value.as_object()?;

    let level = obj
        .get("level")
        .and_then(Value::as_str)
        .and_then(LogLevel::parse)
        .unwrap_or_default();

    let message = match obj.get("message") {
        Some(value) => {
            let coerced = coerce_string(value);
            if coerced.is_empty() {
                HarvestLog::DEFAULT_MESSAGE.to_string()
            } else {
                coerced
            }
        }
        None => HarvestLog::DEFAULT_MESSAGE.to_string(),
    };

    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_loose_timestamp)
        .unwrap_or_else(chrono::Utc::now);

    let url = obj
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let details = obj
        .get("details")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    Some(HarvestLog {
        level,
        message,
        timestamp,
        url,
        details,
    })
}

/// Coerce any JSON value into the string a text field stores.
///
/// Strings are trimmed; numbers and booleans render as written; null
/// becomes empty; arrays and objects keep their compact JSON form.
pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truth coercion with the semantics harvest payloads rely on:
/// null and absent are false, numbers are true unless zero, strings are
/// true unless empty (whitespace counts as content), arrays and objects
/// are always true.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(coerce_string).unwrap_or_default()
}

fn year_field(obj: &Map<String, Value>, key: &str) -> i32 {
    obj.get(key)
        .and_then(parse_year)
        .and_then(|y| i32::try_from(y).ok())
        .unwrap_or_else(current_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use url::Url;

    #[test]
    fn garbage_input_extracts_nothing() {
        assert!(extract_valid_data("{not json").is_empty());
        assert!(extract_valid_data("[1, 2]").is_empty());
        assert!(extract_valid_data("null").is_empty());
        assert!(extract_valid_data("").is_empty());
    }

    #[test]
    fn documents_without_usable_url_are_excluded() {
        let payload = json!({
            "documents": [
                {"url_doc": "https://example.org/a.pdf"},
                {"document_name": "sans url"},
                {"url_doc": "   "},
                {"url_doc": 42},
                {"url_doc": "not a url"},
                "not an object",
            ]
        })
        .to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].url_doc, "https://example.org/a.pdf");
    }

    #[test]
    fn duplicates_keep_the_first_occurrence() {
        let payload = json!({
            "documents": [
                {"url_doc": "https://example.org/a.pdf", "document_name": "premier"},
                {"url_doc": "https://example.org/b.pdf"},
                {"url_doc": " https://example.org/a.pdf ", "document_name": "second"},
            ]
        })
        .to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.documents.len(), 2);
        assert_eq!(batch.documents[0].document_name, "premier");
        assert_eq!(batch.documents[1].url_doc, "https://example.org/b.pdf");
    }

    #[test]
    fn fields_coerce_and_default() {
        let payload = json!({
            "documents": [{
                "url_doc": "https://example.org/a.pdf",
                "document_name": "  Bulletin  ",
                "issue_number": 42,
                "annee": "1987",
                "contient_texte": "yes",
                "pattern_verified": 0,
                "notes": null,
            }]
        })
        .to_string();
        let batch = extract_valid_data(&payload);
        let doc = &batch.documents[0];
        assert_eq!(doc.document_name, "Bulletin");
        assert_eq!(doc.issue_number, "42");
        assert_eq!(doc.annee, 1987);
        assert!(doc.contient_texte);
        assert!(!doc.pattern_verified);
        assert_eq!(doc.notes, "");
        assert_eq!(doc.filename, "");
    }

    #[test]
    fn missing_annee_defaults_to_current_year() {
        let payload = json!({"documents": [{"url_doc": "https://example.org/a.pdf"}]}).to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.documents[0].annee, current_year());
    }

    #[test]
    fn logs_default_every_field() {
        let payload = json!({
            "documents": [],
            "logs": [
                {"level": "warning", "message": "lent", "timestamp": "2026-08-25T10:00:00Z",
                 "url": "https://example.org", "details": {"elapsed_ms": 1200}},
                {"level": "bogus"},
                "skipped",
            ]
        })
        .to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.logs.len(), 2);

        let full = &batch.logs[0];
        assert_eq!(full.level, LogLevel::Warning);
        assert_eq!(full.details["elapsed_ms"], json!(1200));

        let defaulted = &batch.logs[1];
        assert_eq!(defaulted.level, LogLevel::Info);
        assert_eq!(defaulted.message, HarvestLog::DEFAULT_MESSAGE);
        assert!(defaulted.url.is_none());
    }

    #[test]
    fn site_fields_normalize() {
        let payload = json!({
            "documents": [],
            "obstacles-globaux": ["captcha", "  ", 42, "pagination"],
            "recommandations": "  espacer les requêtes  "
        })
        .to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.obstacles_globaux, vec!["captcha", "pagination"]);
        assert_eq!(batch.recommandations.as_deref(), Some("espacer les requêtes"));
    }

    #[test]
    fn alternate_recommendations_spelling_is_accepted() {
        let payload = json!({"documents": [], "recommendations": "ralentir"}).to_string();
        let batch = extract_valid_data(&payload);
        assert_eq!(batch.recommandations.as_deref(), Some("ralentir"));
    }

    #[test]
    fn blank_recommandations_become_none() {
        let payload = json!({"documents": [], "recommandations": "   "}).to_string();
        assert!(extract_valid_data(&payload).recommandations.is_none());
    }

    #[test]
    fn validation_rejects_what_extraction_salvages() {
        // the two passes disagree on purpose: the validator reports every
        // problem, the extractor keeps whatever is usable
        let payload = json!({
            "documents": [
                {"url_doc": "https://ex.com/a.pdf"},
                {"url_doc": "https://ex.com/a.pdf", "document_name": "dup"},
                {"url_doc": "not-a-url"},
                {"document_name": "no url"},
            ],
            "logs": [],
            "obstacles-globaux": ["x"],
            "recommandations": "y"
        })
        .to_string();

        let report = crate::validate::validate_import_json(&payload);
        assert!(!report.is_valid);
        assert_eq!(report.summary.total_documents, 4);
        assert_eq!(report.summary.valid_documents, 2);
        assert!(report
            .errors
            .iter()
            .any(|f| f.message.contains("duplicate url_doc")));
        assert!(report
            .errors
            .iter()
            .any(|f| f.field == "url_doc" && f.message.contains("not a valid absolute URL")));
        assert!(report
            .errors
            .iter()
            .any(|f| f.field == "url_doc" && f.message.contains("missing required field")));

        let batch = extract_valid_data(&payload);
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].url_doc, "https://ex.com/a.pdf");
        assert_eq!(batch.documents[0].document_name, "");
        assert_eq!(batch.obstacles_globaux, vec!["x"]);
        assert_eq!(batch.recommandations.as_deref(), Some("y"));
    }

    #[test]
    fn truthiness_matches_loose_coercion() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(truthy(&json!(true)));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!(0.5)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(" ")));
        assert!(truthy(&json!("false")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }

    fn arb_entry() -> impl Strategy<Value = serde_json::Value> {
        let urls = prop::sample::select(vec![
            "https://example.org/a.pdf",
            "https://example.org/b.pdf",
            "https://example.org/c.pdf",
            "https://archives.example.org/bulletin-1987.pdf",
        ]);
        (urls, any::<bool>(), any::<bool>()).prop_map(|(url, padded, named)| {
            let url = if padded { format!("  {url} ") } else { url.to_string() };
            let mut entry = json!({ "url_doc": url });
            if named {
                entry["document_name"] = json!("Bulletin");
            }
            entry
        })
    }

    proptest! {
        #[test]
        fn extraction_never_panics(payload in ".*") {
            let _ = extract_valid_data(&payload);
        }

        #[test]
        fn extracted_documents_are_unique_valid_and_stable(
            entries in prop::collection::vec(arb_entry(), 0..12)
        ) {
            let payload = json!({"documents": entries, "logs": []}).to_string();
            let batch = extract_valid_data(&payload);

            let mut seen = HashSet::new();
            for doc in &batch.documents {
                prop_assert!(Url::parse(&doc.url_doc).is_ok());
                prop_assert!(seen.insert(doc.url_doc.clone()), "duplicate {}", doc.url_doc);
            }
            prop_assert!(batch.documents.len() <= entries.len());

            let again = extract_valid_data(&payload);
            prop_assert_eq!(batch, again);
        }
    }
}
