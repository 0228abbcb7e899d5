//! Field-level validation of raw document and log entries.
//!
//! These functions inspect raw JSON values and emit [`Finding`]s; they
//! never mutate or reject. Only `url_doc` and non-object entries
//! produce error-severity findings. Everything else is optional and
//! degrades to a warning with a recommendation an operator can act on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use url::Url;

use crate::types::{current_year, Finding, LogLevel};

/// Earliest publication year considered plausible.
pub const MIN_YEAR: i32 = 1900;

const URL_DOC_HINT: &str =
    "provide an absolute URL, e.g. \"https://ville.example.org/bulletins/bulletin-42.pdf\"";

/// Optional text fields with an example value for the recommendation.
const OPTIONAL_TEXT_FIELDS: &[(&str, &str)] = &[
    ("document_name", "\"Bulletin municipal n°42\""),
    ("filename", "\"bulletin-42.pdf\""),
    ("auteurs", "\"Commission des archives\""),
    ("langue", "\"fr\""),
    ("resume", "\"Compte rendu du conseil municipal de mars\""),
    ("statut", "\"disponible\""),
    ("issue_number", "\"42\""),
    ("format", "\"PDF\""),
    ("type_document", "\"bulletin\""),
    ("notes", "\"numérisation partielle\""),
    ("obstacles", "\"pagination manquante\""),
    ("source_page", "\"https://ville.example.org/archives\""),
];

/// Validate one raw entry of the `documents` array.
///
/// `index` is the 0-based array position; findings carry it 1-based.
pub fn validate_document(raw: &Value, index: usize) -> Vec<Finding> {
    let position = index + 1;
    let Some(doc) = raw.as_object() else {
        return vec![Finding::error(
            "documents",
            "entry is not a JSON object",
            "each entry of `documents` must be an object with at least `url_doc`",
        )
        .for_document(position)
        .with_context(json_type_name(raw))];
    };

    let mut findings = Vec::new();

    match doc.get("url_doc") {
        None => findings.push(
            Finding::error("url_doc", "missing required field", URL_DOC_HINT)
                .for_document(position),
        ),
        Some(value) => match value.as_str() {
            None => findings.push(
                Finding::error("url_doc", "must be a string", URL_DOC_HINT)
                    .for_document(position)
                    .with_context(json_type_name(value)),
            ),
            Some(s) if s.trim().is_empty() => findings.push(
                Finding::error("url_doc", "must not be blank", URL_DOC_HINT)
                    .for_document(position),
            ),
            Some(s) if !is_valid_url(s.trim()) => findings.push(
                Finding::error("url_doc", "is not a valid absolute URL", URL_DOC_HINT)
                    .for_document(position)
                    .with_context(s.trim()),
            ),
            Some(_) => {}
        },
    }

    for (field, example) in OPTIONAL_TEXT_FIELDS {
        match doc.get(*field) {
            None => findings.push(
                Finding::warning(
                    *field,
                    "missing optional field",
                    format!("provide a value, e.g. {example}"),
                )
                .for_document(position),
            ),
            Some(Value::String(s)) if s.trim().is_empty() => findings.push(
                Finding::warning(
                    *field,
                    "blank value",
                    format!("provide a non-empty value, e.g. {example}"),
                )
                .for_document(position),
            ),
            // Non-string values are coerced during extraction.
            Some(_) => {}
        }
    }

    match doc.get("date_edition") {
        None => findings.push(
            Finding::warning(
                "date_edition",
                "missing optional field",
                "provide the edition date, e.g. \"1987-03\" or \"12/03/1987\"",
            )
            .for_document(position),
        ),
        Some(Value::String(s)) if s.trim().is_empty() => findings.push(
            Finding::warning(
                "date_edition",
                "blank value",
                "provide the edition date, e.g. \"1987-03\" or \"12/03/1987\"",
            )
            .for_document(position),
        ),
        Some(Value::String(s)) if !is_loose_date(s) => findings.push(
            Finding::warning(
                "date_edition",
                "does not look like a date",
                "use an ISO-like date such as \"1987-03-12\", \"12/03/1987\" or \"1987\"",
            )
            .for_document(position)
            .with_context(s.trim()),
        ),
        Some(Value::String(_)) => {}
        Some(other) => findings.push(
            Finding::warning(
                "date_edition",
                "should be a string",
                "use an ISO-like date such as \"1987-03-12\"",
            )
            .for_document(position)
            .with_context(json_type_name(other)),
        ),
    }

    match doc.get("annee") {
        None => findings.push(
            Finding::warning(
                "annee",
                "missing optional field",
                "provide the publication year; absent values default to the current year",
            )
            .for_document(position),
        ),
        Some(value) => match parse_year(value) {
            Some(year) if !year_in_range(year) => findings.push(
                Finding::warning(
                    "annee",
                    format!("out of plausible range ({MIN_YEAR}..={})", current_year() + 1),
                    "check the publication year",
                )
                .for_document(position)
                .with_context(year.to_string()),
            ),
            Some(_) => {}
            None => findings.push(
                Finding::warning(
                    "annee",
                    "must be an integer year",
                    "provide a four-digit year, e.g. 1987",
                )
                .for_document(position)
                .with_context(value.to_string()),
            ),
        },
    }

    for field in ["contient_texte", "pattern_verified"] {
        if doc.get(field).is_none() {
            findings.push(
                Finding::warning(
                    field,
                    "missing optional field",
                    "provide true or false; absent values default to false",
                )
                .for_document(position),
            );
        }
    }

    findings
}

/// Validate one raw entry of the `logs` array.
///
/// A non-object entry is an error finding, same as for documents; every
/// field inside an object entry only warns, since extraction defaults
/// them.
pub fn validate_log(raw: &Value, index: usize) -> Vec<Finding> {
    let position = index + 1;
    let Some(log) = raw.as_object() else {
        return vec![Finding::error(
            "logs",
            "entry is not a JSON object",
            "each entry of `logs` must be an object with `level` and `message`",
        )
        .for_log(position)
        .with_context(json_type_name(raw))];
    };

    let mut findings = Vec::new();

    match log.get("level") {
        None => findings.push(
            Finding::warning(
                "level",
                "missing; defaults to \"info\"",
                "use one of \"error\", \"warning\", \"info\"",
            )
            .for_log(position),
        ),
        Some(Value::String(s)) if LogLevel::parse(s).is_none() => findings.push(
            Finding::warning(
                "level",
                "unknown level; defaults to \"info\"",
                "use one of \"error\", \"warning\", \"info\"",
            )
            .for_log(position)
            .with_context(s.trim()),
        ),
        Some(Value::String(_)) => {}
        Some(other) => findings.push(
            Finding::warning(
                "level",
                "must be a string; defaults to \"info\"",
                "use one of \"error\", \"warning\", \"info\"",
            )
            .for_log(position)
            .with_context(json_type_name(other)),
        ),
    }

    match log.get("message") {
        None => findings.push(
            Finding::warning(
                "message",
                "missing; a placeholder will be stored",
                "describe what happened during the harvest",
            )
            .for_log(position),
        ),
        Some(Value::String(s)) if s.trim().is_empty() => findings.push(
            Finding::warning(
                "message",
                "blank; a placeholder will be stored",
                "describe what happened during the harvest",
            )
            .for_log(position),
        ),
        Some(Value::String(_)) => {}
        Some(other) => findings.push(
            Finding::warning(
                "message",
                "must be a string; a placeholder will be stored",
                "describe what happened during the harvest",
            )
            .for_log(position)
            .with_context(json_type_name(other)),
        ),
    }

    if let Some(value) = log.get("timestamp") {
        match value {
            Value::String(s) if parse_loose_timestamp(s).is_none() => findings.push(
                Finding::warning(
                    "timestamp",
                    "unparseable; the import time will be used",
                    "use an ISO-8601 timestamp, e.g. \"2026-08-25T14:03:00Z\"",
                )
                .for_log(position)
                .with_context(s.trim()),
            ),
            Value::String(_) => {}
            other => findings.push(
                Finding::warning(
                    "timestamp",
                    "should be a string; the import time will be used",
                    "use an ISO-8601 timestamp, e.g. \"2026-08-25T14:03:00Z\"",
                )
                .for_log(position)
                .with_context(json_type_name(other)),
            ),
        }
    }

    findings
}

/// Short JSON type name for finding context.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Absolute-URL check, same acceptance as a URL constructor.
pub(crate) fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Extract an integer year from a JSON number or numeric string.
pub(crate) fn parse_year(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Plausibility window for publication years: [`MIN_YEAR`] through next year.
pub(crate) fn year_in_range(year: i64) -> bool {
    year >= MIN_YEAR as i64 && year <= (current_year() + 1) as i64
}

/// Parse the timestamp formats harvests actually produce.
///
/// Naive values are taken as UTC.
pub(crate) fn parse_loose_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(v, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Loose date check for `date_edition`: anything a timestamp parse accepts,
/// plus year-month (`1987-03`) and bare year (`1987`) forms.
pub(crate) fn is_loose_date(value: &str) -> bool {
    let v = value.trim();
    if parse_loose_timestamp(v).is_some() {
        return true;
    }
    if let Some((year, month)) = v.split_once('-') {
        if let (Ok(y), Ok(m)) = (year.parse::<i32>(), month.parse::<u8>()) {
            return (1000..=9999).contains(&y) && (1..=12).contains(&m);
        }
    }
    matches!(v.parse::<i32>(), Ok(y) if (1000..=9999).contains(&y))
}
