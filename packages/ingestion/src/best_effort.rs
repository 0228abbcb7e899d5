//! Best-effort execution of side-channel writes.
//!
//! Import treats log inserts and site-field updates as side channels:
//! their failures must never take the batch down. [`BestEffort`] runs a
//! fallible future, records the failure, and hands back an `Option` so
//! the caller can keep going.

use std::fmt;
use std::future::Future;
use tracing::warn;

/// Collects failures from operations that must not abort the caller.
#[derive(Debug, Default)]
pub struct BestEffort {
    failures: Vec<String>,
}

impl BestEffort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation`, keeping its failure instead of propagating it.
    ///
    /// Returns `Some(value)` on success, `None` on failure. The failure
    /// is traced and appended to [`failures`](Self::failures) as
    /// `"{label}: {error}"`.
    pub async fn run<T, E, Fut>(&mut self, label: &str, operation: Fut) -> Option<T>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        match operation.await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(operation = label, error = %err, "best-effort operation failed");
                self.failures.push(format!("{label}: {err}"));
                None
            }
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<String> {
        self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
