//! Import phases, progress snapshots, and the final result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of an import run.
///
/// Phases advance strictly forward: `Parsing` through `Completed`, with
/// `Error` as the absorbing state when the payload is rejected outright.
/// Each phase owns a fixed slice of the 0..=100 progress range so the
/// percentage is monotonic across phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Parsing,
    Documents,
    SiteUpdate,
    Logs,
    Completed,
    Error,
}

impl ImportPhase {
    /// Inclusive percent band owned by this phase.
    pub fn band(self) -> (u8, u8) {
        match self {
            Self::Parsing => (0, 10),
            Self::Documents => (10, 70),
            Self::SiteUpdate => (70, 80),
            Self::Logs => (80, 95),
            Self::Completed => (100, 100),
            Self::Error => (100, 100),
        }
    }

    /// Map `done` of `total` steps into this phase's percent band.
    ///
    /// A phase with no steps reports the top of its band, so skipped
    /// phases still move the bar forward.
    pub fn percent(self, done: usize, total: usize) -> u8 {
        let (lo, hi) = self.band();
        if total == 0 || done >= total {
            return hi;
        }
        lo + ((hi - lo) as usize * done / total) as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Documents => "documents",
            Self::SiteUpdate => "site_update",
            Self::Logs => "logs",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time snapshot of a running import.
///
/// Snapshots are immutable values; the observer receives a fresh one per
/// progress event, with the error and warning lists accumulated so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub message: String,
    /// 0..=100, monotonically non-decreasing across a run
    pub percent: u8,
    pub documents_processed: usize,
    pub total_documents: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of an import run.
///
/// By default a run counts as successful when it produced no errors or
/// imported at least one document; `strict_success` on
/// [`ImportOptions`](crate::import::ImportOptions) tightens this to
/// "no errors at all".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub documents_imported: usize,
    pub documents_with_errors: usize,
    pub logs_imported: usize,
    pub obstacles_updated: bool,
    pub recommendations_updated: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A failed result carrying the given errors; all counters zero.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            ..Self::default()
        }
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} document(s) imported, {} failed, {} log(s), {} error(s), {} warning(s)",
            if self.success { "ok" } else { "failed" },
            self.documents_imported,
            self.documents_with_errors,
            self.logs_imported,
            self.errors.len(),
            self.warnings.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_the_full_range_in_order() {
        let phases = [
            ImportPhase::Parsing,
            ImportPhase::Documents,
            ImportPhase::SiteUpdate,
            ImportPhase::Logs,
            ImportPhase::Completed,
        ];
        let mut last_hi = 0;
        for phase in phases {
            let (lo, hi) = phase.band();
            assert!(lo <= hi);
            assert!(lo >= last_hi, "bands must not regress at {phase}");
            last_hi = hi;
        }
        assert_eq!(last_hi, 100);
    }

    #[test]
    fn percent_is_monotonic_within_a_phase() {
        let total = 7;
        let mut last = 0;
        for done in 0..=total {
            let pct = ImportPhase::Documents.percent(done, total);
            assert!(pct >= last);
            last = pct;
        }
        assert_eq!(ImportPhase::Documents.percent(total, total), 70);
    }

    #[test]
    fn empty_phase_reports_band_top() {
        assert_eq!(ImportPhase::Documents.percent(0, 0), 70);
        assert_eq!(ImportPhase::Logs.percent(0, 0), 95);
    }

    #[test]
    fn failed_result_has_zero_counters() {
        let result = ImportResult::failed(vec!["json: parse error".to_string()]);
        assert!(!result.success);
        assert_eq!(result.documents_imported, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.summary().starts_with("failed"));
    }
}
