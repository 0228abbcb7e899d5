//! Text extraction seam for document analysis.

use async_trait::async_trait;

use crate::error::Result;

/// Extracts plain text from raw document bytes (PDF text layer, OCR).
///
/// Failures surface as
/// [`IngestError::TextExtraction`](crate::error::IngestError::TextExtraction);
/// the analysis pipeline treats them as best-effort and records them
/// instead of aborting.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}
