// src/pdf_text.rs

use crate::error::PdfReadError;
use lopdf::{Dictionary, Document, ObjectId};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Page tree nodes walked upwards when looking for inherited `/Resources`.
const MAX_TREE_DEPTH: usize = 32;

/// Turns PDF bytes into ordered page texts.
///
/// A page that yields nothing is `None`.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<Option<String>>, PdfReadError>;
}

/// Text layer extraction with `pdf-extract`, using `lopdf` to load the
/// document and count image-only (scanned) pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<Option<String>>, PdfReadError> {
        // --- Phase 1: structural check with lopdf ---
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| PdfReadError::new(format!("Failed to parse PDF: {e}")))?;
        let scanned = scanned_pages(&doc).iter().filter(|&&s| s).count();

        // --- Phase 2: per-page text ---
        // Only the text decides whether a page is present; the scan count is
        // for the log.
        let pages: Vec<Option<String>> = extract_pages(pdf_bytes)?
            .into_iter()
            .map(|text| (!text.trim().is_empty()).then_some(text))
            .collect();

        let with_text = pages.iter().filter(|p| p.is_some()).count();
        if with_text == 0 && scanned > 0 {
            warn!(scanned, "No text layer; PDF looks scanned");
        }
        info!(pages = pages.len(), with_text, scanned, "Extracted PDF text");
        Ok(pages)
    }
}

/// `pdf-extract` can panic on malformed input instead of returning an error.
fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<String>, PdfReadError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
    }));
    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(PdfReadError::new(e.to_string())),
        Err(_) => Err(PdfReadError::new(
            "PDF extraction panicked (malformed document)",
        )),
    }
}

/// For each page in order: does it draw images but have no fonts?
///
/// Form XObjects may carry their own fonts, so only `/Subtype /Image`
/// XObjects count as images.
fn scanned_pages(doc: &Document) -> Vec<bool> {
    doc.get_pages()
        .into_iter()
        .map(|(page_num, object_id)| {
            let scanned = is_image_only(doc, object_id);
            if scanned {
                debug!(page = page_num, "Page looks scanned / image-only");
            }
            scanned
        })
        .collect()
}

fn is_image_only(doc: &Document, page_id: ObjectId) -> bool {
    let Some(resources) = page_resources(doc, page_id) else {
        return false;
    };

    let lookup = |key: &[u8]| {
        resources
            .get(key)
            .ok()
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
    };

    let has_fonts = lookup(b"Font").is_some_and(|fonts| !fonts.is_empty());
    let Some(xobjects) = lookup(b"XObject") else {
        return false;
    };

    let mut images = 0;
    for (_, obj) in xobjects.iter() {
        let is_image = doc
            .dereference(obj)
            .ok()
            .and_then(|(_, resolved)| resolved.as_stream().ok())
            .and_then(|stream| stream.dict.get(b"Subtype").ok())
            .and_then(|subtype| subtype.as_name().ok())
            .is_some_and(|name| name == b"Image");
        if !is_image {
            // a form or something unknown may hold text
            return false;
        }
        images += 1;
    }

    images > 0 && !has_fonts
}

/// The page's `/Resources`, or the nearest one inherited from the page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let resources = node
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());
        if resources.is_some() {
            return resources;
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}
