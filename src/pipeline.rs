// src/pipeline.rs

use crate::error::{ExtractError, PdfReadError};
use crate::heuristics::{self, FilterRules, FilteredLines};
use crate::llm_extract::ModelClient;
use crate::pdf_text::TextExtractor;
use crate::prompt;
use crate::schema::{self, UnifiedRow};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{Instrument, info, warn};

/// Runs one uploaded PDF through text extraction, row filtering, the model
/// and schema normalization. Holds no per-request state.
pub struct Extractor {
    text: Arc<dyn TextExtractor>,
    model: Arc<dyn ModelClient>,
    rules: FilterRules,
}

impl Extractor {
    pub fn new(
        text: Arc<dyn TextExtractor>,
        model: Arc<dyn ModelClient>,
        rules: FilterRules,
    ) -> Self {
        Self { text, model, rules }
    }

    /// Check the file name, then run the whole pipeline.
    pub async fn extract_upload(
        &self,
        filename: &str,
        pdf_bytes: Vec<u8>,
    ) -> Result<Vec<UnifiedRow>, ExtractError> {
        if !is_pdf_filename(filename) {
            warn!(filename = %filename, "Rejected non-PDF upload");
            return Err(ExtractError::NotPdf);
        }

        let span = tracing::info_span!(
            "extract",
            filename = %filename,
            doc = %document_id(&pdf_bytes),
            bytes = pdf_bytes.len()
        );
        self.extract(pdf_bytes).instrument(span).await
    }

    /// Full pipeline on PDF bytes. A document with no text gives no rows.
    pub async fn extract(&self, pdf_bytes: Vec<u8>) -> Result<Vec<UnifiedRow>, ExtractError> {
        let Some(filtered) = self.filter_document(pdf_bytes).await? else {
            info!("No extractable text, returning empty result");
            return Ok(Vec::new());
        };

        let prompt = prompt::build_prompt(&filtered.lines).map_err(schema_error)?;
        let raw = self.model.complete(&prompt.system, &prompt.user).await?;
        info!(response_chars = raw.len(), "LLM responded");

        let rows = schema::parse_model_response(&raw)?;
        let filled: usize = rows.iter().map(|r| r.coverage().0).sum();
        info!(rows = rows.len(), filled, "Normalized rows");
        Ok(rows)
    }

    /// Extract and filter the lines that would be sent to the model.
    ///
    /// `None` when the document has no text at all.
    pub async fn filter_document(
        &self,
        pdf_bytes: Vec<u8>,
    ) -> Result<Option<FilteredLines>, ExtractError> {
        let text = Arc::clone(&self.text);
        let pages = tokio::task::spawn_blocking(move || text.extract(&pdf_bytes))
            .await
            .map_err(|e| PdfReadError::new(format!("extraction task failed: {e}")))??;

        let lines = heuristics::normalize_pages(&pages);
        if lines.is_empty() {
            return Ok(None);
        }

        let filtered = heuristics::filter_rows(&lines, &self.rules);
        info!(
            lines = lines.len(),
            kept = filtered.len(),
            halted_at = ?filtered.halted_at,
            fallback = filtered.fallback,
            "Filtered table rows"
        );
        Ok(Some(filtered))
    }
}

/// Case-insensitive `.pdf` suffix check.
pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}

/// Short content fingerprint for log correlation.
pub fn document_id(pdf_bytes: &[u8]) -> String {
    let digest = Sha256::digest(pdf_bytes);
    format!("{digest:x}")[..12].to_string()
}

// Only reachable if serde_json fails on a list of strings.
fn schema_error(e: serde_json::Error) -> ExtractError {
    ExtractError::Parse(e.into())
}


#[cfg(test)]
mod tests {
    use super::fakes::{CannedModel, FixedPages};
    use super::*;
    use std::sync::atomic::Ordering;

    const JOHN_ROWS: &str = r#"{"rows":[{"Name":"John Doe","MemberID":"12345","T1023AuthId":"A100","T1023Range":"04/01-07/01","T1023BillDate":null,"H0044AuthId":null,"H0044Range":null,"H0044BillDate":null,"Paid":null}]}"#;

    fn extractor(text: Arc<FixedPages>, model: Arc<CannedModel>) -> Extractor {
        Extractor::new(text, model, FilterRules::default())
    }

    #[test]
    fn test_pdf_filename_check() {
        assert!(is_pdf_filename("report.pdf"));
        assert!(is_pdf_filename("REPORT.PDF"));
        assert!(is_pdf_filename("a.b.Pdf"));
        assert!(!is_pdf_filename("report.pdf.txt"));
        assert!(!is_pdf_filename("report"));
    }

    #[test]
    fn test_document_id_is_stable() {
        assert_eq!(document_id(b"abc"), document_id(b"abc"));
        assert_ne!(document_id(b"abc"), document_id(b"abd"));
        assert_eq!(document_id(b"abc").len(), 12);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let text = Arc::new(FixedPages::new(&[Some(
            "Ohana billing\nNAME MRN# T1023 AUTH DATE(S) DATE RANGE\n1 John Doe, 12345, A100, 04/01-07/01\nALL INTAKE needed\n2 Later Row, 1",
        )]));
        let model = Arc::new(CannedModel::new(JOHN_ROWS));
        let rows = extractor(text, model.clone())
            .extract_upload("ohana.pdf", b"%PDF-".to_vec())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("John Doe"));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains(r#"["NAME MRN# T1023 AUTH DATE(S) DATE RANGE","1 John Doe, 12345, A100, 04/01-07/01"]"#));
        assert!(!prompts[0].contains("Later Row"));
    }

    #[tokio::test]
    async fn test_non_pdf_skips_everything() {
        let text = Arc::new(FixedPages::new(&[Some("1 a, b")]));
        let model = Arc::new(CannedModel::new(JOHN_ROWS));
        let err = extractor(text.clone(), model.clone())
            .extract_upload("notes.txt", b"hello".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf));
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_document_is_success() {
        let text = Arc::new(FixedPages::new(&[None, Some("   \n ")]));
        let model = Arc::new(CannedModel::new(JOHN_ROWS));
        let rows = extractor(text, model.clone())
            .extract(b"%PDF-".to_vec())
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_pdf_read_error_stops_pipeline() {
        let text = Arc::new(FixedPages::failing("broken xref"));
        let model = Arc::new(CannedModel::new(JOHN_ROWS));
        let err = extractor(text, model.clone())
            .extract(b"junk".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "PDF read error: broken xref");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure() {
        let text = Arc::new(FixedPages::new(&[Some("1 Jane, 999")]));
        let model = Arc::new(CannedModel::http_error(503));
        let err = extractor(text, model)
            .extract(b"%PDF-".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Model(_)));
        assert!(err.to_string().starts_with("AI extraction failed: LLM API error 503"));
    }

    #[tokio::test]
    async fn test_malformed_model_reply() {
        let text = Arc::new(FixedPages::new(&[Some("1 Jane, 999")]));
        let model = Arc::new(CannedModel::new("Sorry, I cannot help."));
        let err = extractor(text, model)
            .extract(b"%PDF-".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
        assert!(err.to_string().starts_with("AI extraction failed: "));
    }

    #[tokio::test]
    async fn test_fallback_sends_all_lines() {
        let text = Arc::new(FixedPages::new(&[Some("Summary\nNo table here")]));
        let model = Arc::new(CannedModel::new(r#"{"rows":[]}"#));
        let ex = extractor(text, model.clone());
        let filtered = ex.filter_document(b"%PDF-".to_vec()).await.unwrap().unwrap();
        assert!(filtered.fallback);
        assert_eq!(filtered.lines, vec!["Summary", "No table here"]);

        let rows = ex.extract(b"%PDF-".to_vec()).await.unwrap();
        assert!(rows.is_empty());
        assert!(model.prompts.lock().unwrap()[0].contains(r#"["Summary","No table here"]"#));
    }
}
