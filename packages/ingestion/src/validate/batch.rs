//! Whole-payload validation: envelope shape, duplicates, and the report.

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Finding, Severity};

use super::fields::{json_type_name, validate_document, validate_log};

/// Soft ceiling on batch size; larger batches warn but still import.
pub const MAX_DOCUMENTS_SOFT_LIMIT: usize = 1000;

/// How duplicate `url_doc` values within one payload are classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Duplicates are error findings and block the import
    #[default]
    Reject,
    /// Duplicates are warnings; extraction keeps the first occurrence
    DropAndWarn,
}

/// Knobs for [`validate_import_json_with`].
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub duplicate_policy: DuplicatePolicy,
    pub max_documents: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            max_documents: MAX_DOCUMENTS_SOFT_LIMIT,
        }
    }
}

impl ValidationOptions {
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Per-collection counts for the validation report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub total_documents: usize,
    pub valid_documents: usize,
    pub total_logs: usize,
    pub valid_logs: usize,
}

/// The full outcome of validating an import payload.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// True when no error-severity finding was raised
    pub is_valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    fn from_findings(findings: Vec<Finding>, summary: ValidationSummary) -> Self {
        let (errors, warnings) = findings
            .into_iter()
            .partition::<Vec<_>, _>(Finding::is_error);
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            summary,
        }
    }

    /// Error findings rendered as display strings.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Warning findings rendered as display strings.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Validate a raw import payload with default options.
pub fn validate_import_json(text: &str) -> ValidationReport {
    validate_import_json_with(text, &ValidationOptions::default())
}

/// Validate a raw import payload.
///
/// Never panics and never short-circuits on recoverable problems: the
/// report carries every finding that can be determined from the payload.
/// Only an unparseable or non-object payload stops inspection early.
pub fn validate_import_json_with(text: &str, options: &ValidationOptions) -> ValidationReport {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "import payload is not valid JSON");
            return ValidationReport::from_findings(
                vec![Finding::error(
                    "json",
                    format!("payload is not valid JSON: {err}"),
                    "produce a single JSON object, with no prose around it",
                )],
                ValidationSummary::default(),
            );
        }
    };

    let Some(root) = value.as_object() else {
        return ValidationReport::from_findings(
            vec![Finding::error(
                "json",
                "top-level value must be a JSON object",
                "wrap the payload in an object with a `documents` array",
            )
            .with_context(json_type_name(&value))],
            ValidationSummary::default(),
        );
    };

    let mut findings = Vec::new();
    let mut summary = ValidationSummary::default();

    match root.get("documents") {
        None => findings.push(Finding::error(
            "documents",
            "missing required field",
            "add a `documents` array (it may be empty)",
        )),
        Some(docs) => match docs.as_array() {
            None => findings.push(
                Finding::error(
                    "documents",
                    "must be an array",
                    "make `documents` a JSON array of document objects",
                )
                .with_context(json_type_name(docs)),
            ),
            Some(entries) => {
                summary.total_documents = entries.len();
                if entries.is_empty() {
                    findings.push(Finding::warning(
                        "documents",
                        "array is empty; nothing will be imported",
                        "run the harvest again if documents were expected",
                    ));
                }
                if entries.len() > options.max_documents {
                    findings.push(Finding::warning(
                        "documents",
                        format!(
                            "unusually large batch ({} entries, soft limit {})",
                            entries.len(),
                            options.max_documents
                        ),
                        "check that the harvest did not loop over the same pages",
                    ));
                }

                findings.extend(duplicate_findings(entries, options.duplicate_policy));

                for (index, entry) in entries.iter().enumerate() {
                    let entry_findings = validate_document(entry, index);
                    if !entry_findings.iter().any(Finding::is_error) {
                        summary.valid_documents += 1;
                    }
                    findings.extend(entry_findings);
                }
            }
        },
    }

    match root.get("logs") {
        None => findings.push(Finding::warning(
            "logs",
            "missing field",
            "add a `logs` array describing how the harvest went",
        )),
        Some(logs) => match logs.as_array() {
            None => findings.push(
                Finding::error(
                    "logs",
                    "must be an array",
                    "make `logs` a JSON array of log objects",
                )
                .with_context(json_type_name(logs)),
            ),
            Some(entries) => {
                summary.total_logs = entries.len();
                for (index, entry) in entries.iter().enumerate() {
                    let entry_findings = validate_log(entry, index);
                    if !entry_findings.iter().any(Finding::is_error) {
                        summary.valid_logs += 1;
                    }
                    findings.extend(entry_findings);
                }
            }
        },
    }

    ValidationReport::from_findings(findings, summary)
}

/// Scan for duplicate `url_doc` values and produce one finding per group.
///
/// Positions are 1-based and listed in the order the duplicates appear,
/// e.g. "positions 1 and 3".
fn duplicate_findings(entries: &[Value], policy: DuplicatePolicy) -> Vec<Finding> {
    let mut positions_by_url: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let Some(url) = entry.get("url_doc").and_then(Value::as_str) else {
            continue;
        };
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        let positions = positions_by_url.entry(url).or_default();
        if positions.is_empty() {
            order.push(url);
        }
        positions.push(index + 1);
    }

    let severity = match policy {
        DuplicatePolicy::Reject => Severity::Error,
        DuplicatePolicy::DropAndWarn => Severity::Warning,
    };

    order
        .into_iter()
        .filter_map(|url| {
            let positions = &positions_by_url[url];
            if positions.len() < 2 {
                return None;
            }
            let message = format!(
                "duplicate url_doc at {}",
                format_positions(positions)
            );
            let finding = match severity {
                Severity::Error => Finding::error(
                    "url_doc",
                    message,
                    "each document must appear once; remove the repeated entries",
                ),
                Severity::Warning => Finding::warning(
                    "url_doc",
                    message,
                    "only the first occurrence will be imported",
                ),
            };
            Some(finding.with_context(url))
        })
        .collect()
}

fn format_positions(positions: &[usize]) -> String {
    match positions {
        [] => String::new(),
        [single] => format!("position {single}"),
        [first, last] => format!("positions {first} and {last}"),
        [head @ .., last] => {
            let head = head
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("positions {head} and {last}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(url: &str) -> Value {
        json!({"url_doc": url})
    }

    #[test]
    fn unparseable_payload_yields_single_json_error() {
        let report = validate_import_json("{not json");
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "json");
        assert_eq!(report.summary.total_documents, 0);
    }

    #[test]
    fn non_object_root_is_rejected() {
        let report = validate_import_json("[1, 2, 3]");
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].field, "json");
        assert_eq!(report.errors[0].context.as_deref(), Some("array"));
    }

    #[test]
    fn missing_documents_is_an_error_but_logs_are_still_checked() {
        let report = validate_import_json(r#"{"logs": [{"level": "bogus", "message": "x"}]}"#);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|f| f.field == "documents"));
        assert!(report.warnings.iter().any(|f| f.field == "level"));
        assert_eq!(report.summary.total_logs, 1);
    }

    #[test]
    fn documents_of_wrong_type_is_an_error() {
        let report = validate_import_json(r#"{"documents": "nope", "logs": []}"#);
        assert!(!report.is_valid);
        let finding = report
            .errors
            .iter()
            .find(|f| f.field == "documents")
            .unwrap();
        assert_eq!(finding.context.as_deref(), Some("string"));
    }

    #[test]
    fn empty_documents_warns_but_validates() {
        let report = validate_import_json(r#"{"documents": [], "logs": []}"#);
        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|f| f.field == "documents" && f.message.contains("empty")));
    }

    #[test]
    fn duplicates_are_blocking_by_default() {
        let payload = json!({
            "documents": [
                doc("https://example.org/a.pdf"),
                doc("https://example.org/a.pdf"),
                doc("https://example.org/b.pdf"),
            ],
            "logs": []
        });
        let report = validate_import_json(&payload.to_string());
        assert!(!report.is_valid);
        let dup = report
            .errors
            .iter()
            .find(|f| f.message.contains("duplicate url_doc"))
            .unwrap();
        assert!(dup.message.contains("positions 1 and 2"), "{}", dup.message);
        assert_eq!(dup.context.as_deref(), Some("https://example.org/a.pdf"));
    }

    #[test]
    fn duplicates_respect_whitespace_trimming() {
        let payload = json!({
            "documents": [
                doc("https://example.org/a.pdf"),
                doc("  https://example.org/a.pdf  "),
            ],
            "logs": []
        });
        let report = validate_import_json(&payload.to_string());
        assert!(report
            .errors
            .iter()
            .any(|f| f.message.contains("duplicate url_doc")));
    }

    #[test]
    fn drop_and_warn_policy_demotes_duplicates() {
        let payload = json!({
            "documents": [
                doc("https://example.org/a.pdf"),
                doc("https://example.org/a.pdf"),
            ],
            "logs": []
        });
        let options =
            ValidationOptions::default().with_duplicate_policy(DuplicatePolicy::DropAndWarn);
        let report = validate_import_json_with(&payload.to_string(), &options);
        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|f| f.message.contains("duplicate url_doc")));
    }

    #[test]
    fn triple_duplicate_lists_all_positions() {
        let payload = json!({
            "documents": [
                doc("https://example.org/a.pdf"),
                doc("https://example.org/b.pdf"),
                doc("https://example.org/a.pdf"),
                doc("https://example.org/a.pdf"),
            ],
            "logs": []
        });
        let report = validate_import_json(&payload.to_string());
        let dup = report
            .errors
            .iter()
            .find(|f| f.message.contains("duplicate"))
            .unwrap();
        assert!(dup.message.contains("positions 1, 3 and 4"), "{}", dup.message);
    }

    #[test]
    fn non_object_log_entry_blocks_validity() {
        let payload = json!({
            "documents": [doc("https://example.org/a.pdf")],
            "logs": [42],
        });
        let report = validate_import_json(&payload.to_string());
        assert!(!report.is_valid);
        assert!(report
            .errors
            .iter()
            .any(|f| f.field == "logs" && f.log_index == Some(1)));
        assert_eq!(report.summary.total_logs, 1);
        assert_eq!(report.summary.valid_logs, 0);
    }

    #[test]
    fn summary_counts_valid_entries() {
        let payload = json!({
            "documents": [
                doc("https://example.org/a.pdf"),
                doc("not a url"),
                42,
            ],
            "logs": [
                {"level": "info", "message": "ok"},
                "not an object",
            ]
        });
        let report = validate_import_json(&payload.to_string());
        assert!(!report.is_valid);
        assert_eq!(report.summary.total_documents, 3);
        assert_eq!(report.summary.valid_documents, 1);
        assert_eq!(report.summary.total_logs, 2);
        assert_eq!(report.summary.valid_logs, 1);
    }

    #[test]
    fn oversized_batch_warns_without_blocking() {
        let options = ValidationOptions {
            max_documents: 3,
            ..ValidationOptions::default()
        };
        let docs: Vec<Value> = (0..5)
            .map(|i| doc(&format!("https://example.org/{i}.pdf")))
            .collect();
        let payload = json!({"documents": docs, "logs": []});
        let report = validate_import_json_with(&payload.to_string(), &options);
        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|f| f.message.contains("unusually large batch")));
    }

    #[test]
    fn warnings_never_flip_validity() {
        // every optional field missing, still valid
        let payload = json!({"documents": [doc("https://example.org/a.pdf")]});
        let report = validate_import_json(&payload.to_string());
        assert!(report.is_valid);
        assert!(!report.warnings.is_empty());
        assert!(report.errors.is_empty());
    }
}
