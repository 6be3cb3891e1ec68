//! HTTP surface: a liveness check and the `/extract` upload endpoint.
//!
//! Every `/extract` outcome is HTTP 200 with a `{status, data, error}` body;
//! the `status` flag carries success or failure.

use crate::error::ExtractError;
use crate::pipeline::{Extractor, is_pdf_filename};
use crate::schema::UnifiedRow;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// Shared across handlers. The extractor holds no request state.
#[derive(Clone)]
pub struct ApiState {
    pub extractor: Arc<Extractor>,
    pub max_upload_bytes: usize,
}

impl ApiState {
    pub fn new(extractor: Extractor, max_upload_bytes: usize) -> Self {
        Self {
            extractor: Arc::new(extractor),
            max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub status: bool,
    pub data: Vec<UnifiedRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractResponse {
    pub fn rows(data: Vec<UnifiedRow>) -> Self {
        Self {
            status: true,
            data,
            error: None,
        }
    }

    pub fn failed(err: &ExtractError) -> Self {
        Self {
            status: false,
            data: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

impl From<Result<Vec<UnifiedRow>, ExtractError>> for ExtractResponse {
    fn from(result: Result<Vec<UnifiedRow>, ExtractError>) -> Self {
        match result {
            Ok(rows) => Self::rows(rows),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Liveness check.
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: true,
        message: "Billing PDF API is running".to_string(),
    })
}

/// Upload a billing PDF, get back the unified rows.
pub async fn extract(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ExtractResponse> {
    let result = match read_upload(multipart).await {
        Ok((filename, bytes)) => state.extractor.extract_upload(&filename, bytes).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(rows) => info!(rows = rows.len(), "Extraction succeeded"),
        Err(ExtractError::NotPdf | ExtractError::InvalidUpload(_)) => {}
        Err(e) => error!(error = %e, "Extraction failed"),
    }
    Json(result.into())
}

/// Pull the file name and bytes of the `file` field out of the body.
///
/// The name is checked before the body of the field is read.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, Vec<u8>), ExtractError> {
    let mut multipart = multipart.map_err(|e| ExtractError::InvalidUpload(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExtractError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !is_pdf_filename(&filename) {
            warn!(filename = %filename, "Rejected non-PDF upload");
            return Err(ExtractError::NotPdf);
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ExtractError::InvalidUpload(e.body_text()))?;
        return Ok((filename, bytes.to_vec()));
    }

    warn!("Upload has no {FILE_FIELD} field");
    Err(ExtractError::NotPdf)
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/extract", post(extract))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: ApiState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Starting API server");
    }
    axum::serve(listener, build_router(state)).await
}

/// Bind `addr` and serve until the process ends.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}
