// src/error.rs

use thiserror::Error;

/// The uploaded document could not be turned into page text.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct PdfReadError {
    pub detail: String,
}

impl PdfReadError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Failure talking to the chat-completions endpoint.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("model call timed out after {0}s")]
    Timeout(u64),

    #[error("LLM API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response from LLM")]
    EmptyResponse,

    #[error("could not decode LLM response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// The model's reply could not be turned into rows.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("no rows array found in response")]
    MissingRows,

    #[error("row {index} is not a JSON object")]
    RowNotObject { index: usize },

    #[error("row {index}: field {field} has unsupported type {kind}")]
    InvalidField {
        index: usize,
        field: &'static str,
        kind: &'static str,
    },
}

/// Everything that can end a single `/extract` request.
///
/// The `Display` output is what the client sees in the `error` field.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Please upload a PDF")]
    NotPdf,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("PDF read error: {0}")]
    PdfRead(#[from] PdfReadError),

    #[error("AI extraction failed: {0}")]
    Model(#[from] ModelCallError),

    #[error("AI extraction failed: {0}")]
    Parse(#[from] ParseError),
}

/// Problems found while starting up. None of these are recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set")]
    MissingApiKey(String),

    #[error("invalid bind address {0:?}")]
    InvalidBind(String),

    #[error("llm.timeout_secs must be greater than 0")]
    InvalidTimeout,
}
