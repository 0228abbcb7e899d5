//! Classified validation findings.
//!
//! Validation never panics and never throws: every problem becomes a
//! [`Finding`] with a severity, the offending field, and a human-readable
//! recommendation. Error-severity findings block an import; warnings are
//! advisory and the batch proceeds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the import
    Error,
    /// Advisory only
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single classified finding produced by validation.
///
/// Positions are 1-based: `document_index: Some(3)` refers to the third
/// entry of the `documents` array, matching how the findings read when
/// rendered for an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Field the finding refers to (`url_doc`, `annee`, `documents`, ...)
    pub field: String,
    pub message: String,
    /// Suggested fix, with a concrete example value where possible
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_index: Option<usize>,
    /// Offending value or other context, when useful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Finding {
    /// Create an error-severity finding.
    pub fn error(
        field: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, field, message, recommendation)
    }

    /// Create a warning-severity finding.
    pub fn warning(
        field: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, field, message, recommendation)
    }

    fn new(
        severity: Severity,
        field: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            field: field.into(),
            message: message.into(),
            recommendation: recommendation.into(),
            document_index: None,
            log_index: None,
            context: None,
        }
    }

    /// Attach the 1-based position of the document this finding refers to.
    pub fn for_document(mut self, position: usize) -> Self {
        self.document_index = Some(position);
        self
    }

    /// Attach the 1-based position of the log entry this finding refers to.
    pub fn for_log(mut self, position: usize) -> Self {
        self.log_index = Some(position);
        self
    }

    /// Attach the offending value or other context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = self.document_index {
            write!(f, "document {position}, ")?;
        } else if let Some(position) = self.log_index {
            write!(f, "log {position}, ")?;
        }
        write!(f, "{}: {}", self.field, self.message)
    }
}
