//! Best-effort document analysis: extract text, summarize, patch the
//! record.
//!
//! Every phase may fail without failing the analysis; the caller gets a
//! report saying how far it got and what went wrong.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::best_effort::BestEffort;
use crate::harvest::strip_code_fences;
use crate::traits::{DocumentStore, LanguageModel, TextExtractor};
use crate::types::AnalysisUpdate;

/// Cap on the text handed to the model.
const MAX_ANALYSIS_TEXT_CHARS: usize = 12_000;

/// Prompt for summarizing extracted document text.
pub const ANALYZE_PROMPT: &str = r#"Analyze the text of an archived document.

Report:
1. A short summary of the document (2-3 sentences, written in the document's own language)
2. The language of the document
3. Whether the text carries readable content (as opposed to OCR noise)

Output JSON:
{
    "resume": "2-3 sentence summary",
    "langue": "language name (Français, English, ...)",
    "contient_texte": true | false
}"#;

/// How far an analysis got, phase by phase.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// Text extraction succeeded (possibly with an empty text layer)
    pub text_extracted: bool,
    /// Characters of extracted text
    pub extracted_chars: usize,
    /// The summary that was (or would have been) written to the record
    pub summary: Option<AnalysisUpdate>,
    /// The document record carries the summary now
    pub record_updated: bool,
    /// One entry per failed phase
    pub issues: Vec<String>,
}

impl AnalysisReport {
    /// Every phase ran and the record was patched.
    pub fn is_complete(&self) -> bool {
        self.record_updated && self.issues.is_empty()
    }
}

/// Analyze one document's bytes and patch its record.
///
/// Never fails: OCR, summarization, and the record update are each
/// best-effort, and a failed phase ends up in
/// [`issues`](AnalysisReport::issues) instead of an `Err`. A document
/// whose text layer is empty is recorded as `contient_texte: false`
/// without a model call.
pub async fn analyze_document<S, L, T>(
    store: &S,
    llm: &L,
    extractor: &T,
    document_id: Uuid,
    bytes: &[u8],
) -> AnalysisReport
where
    S: DocumentStore,
    L: LanguageModel,
    T: TextExtractor,
{
    let mut side = BestEffort::new();
    let mut report = AnalysisReport::default();

    let Some(text) = side.run("text extraction", extractor.extract_text(bytes)).await else {
        report.issues = side.into_failures();
        return report;
    };
    report.text_extracted = true;

    let text = text.trim();
    report.extracted_chars = text.chars().count();
    if text.is_empty() {
        let update = AnalysisUpdate {
            resume: String::new(),
            langue: String::new(),
            contient_texte: false,
        };
        report.record_updated = side
            .run(
                "record update",
                store.update_document_analysis(document_id, &update),
            )
            .await
            .is_some();
        report.summary = Some(update);
        report.issues = side.into_failures();
        return report;
    }

    let excerpt: String = text.chars().take(MAX_ANALYSIS_TEXT_CHARS).collect();
    let Some(raw) = side.run("summary", llm.complete(ANALYZE_PROMPT, &excerpt)).await else {
        report.issues = side.into_failures();
        return report;
    };

    let update = match parse_summary_response(&raw) {
        Ok(update) => update,
        Err(err) => {
            warn!(document_id = %document_id, error = %err, "unparseable analysis response");
            report.issues = side.into_failures();
            report.issues.push(format!("summary: {err}"));
            return report;
        }
    };

    report.record_updated = side
        .run(
            "record update",
            store.update_document_analysis(document_id, &update),
        )
        .await
        .is_some();
    report.summary = Some(update);
    report.issues = side.into_failures();

    info!(
        document_id = %document_id,
        chars = report.extracted_chars,
        updated = report.record_updated,
        "document analysis finished"
    );
    report
}

#[derive(Debug, Deserialize)]
struct AiSummaryResponse {
    #[serde(default)]
    resume: String,
    #[serde(default)]
    langue: String,
    #[serde(default)]
    contient_texte: Option<bool>,
}

/// Parse the model's summary JSON (code fences tolerated) into a record
/// update. `contient_texte` defaults to `true` when omitted, since the
/// model only ran because text came out.
pub fn parse_summary_response(raw: &str) -> Result<AnalysisUpdate, serde_json::Error> {
    let response: AiSummaryResponse = serde_json::from_str(strip_code_fences(raw))?;
    Ok(AnalysisUpdate {
        resume: response.resume.trim().to_string(),
        langue: response.langue.trim().to_string(),
        contient_texte: response.contient_texte.unwrap_or(true),
    })
}
