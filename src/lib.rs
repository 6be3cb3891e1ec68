//! Billing PDF extraction service.
//!
//! Pulls the text out of an uploaded billing PDF, keeps the lines that look
//! like table rows, has a chat model map them onto one merged schema and
//! returns the normalized rows.

pub mod config;
pub mod error;
pub mod heuristics;
pub mod llm_extract;
pub mod pdf_text;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod server;

pub use error::{ExtractError, ModelCallError, ParseError, PdfReadError};
pub use pipeline::Extractor;
pub use schema::UnifiedRow;
