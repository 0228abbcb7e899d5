//! Validation of raw import payloads.
//!
//! Split in two layers: [`fields`] checks individual document and log
//! entries, [`batch`] checks the envelope and cross-entry rules
//! (duplicates, batch size) and assembles the [`ValidationReport`].

mod batch;
mod fields;

pub use batch::{
    validate_import_json, validate_import_json_with, DuplicatePolicy, ValidationOptions,
    ValidationReport, ValidationSummary, MAX_DOCUMENTS_SOFT_LIMIT,
};
pub use fields::{validate_document, validate_log, MIN_YEAR};

pub(crate) use fields::{is_valid_url, parse_loose_timestamp, parse_year};
