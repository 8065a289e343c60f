#[cfg(test)]
mod tests;

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, warn};

use crate::{AssistantError, Result};

const UNSUPPORTED_FORMAT_MESSAGE: &str = "Only PDF files are supported.";

/// An uploaded PDF, held only until its text has been extracted
#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PdfDocument {
    #[inline]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Reject anything that is not named like a PDF
#[inline]
pub fn validate_pdf_filename(filename: &str) -> Result<()> {
    let is_pdf = filename
        .rsplit_once('.')
        .is_some_and(|(stem, extension)| !stem.is_empty() && extension.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Ok(())
    } else {
        Err(AssistantError::UnsupportedFormat(
            UNSUPPORTED_FORMAT_MESSAGE.to_string(),
        ))
    }
}

/// Extract the text of every page, each followed by a newline
///
/// Pages without a text layer contribute an empty line. Parser panics are
/// caught and reported as extraction errors.
#[inline]
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let pages = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let pages = match pages {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!("PDF extraction failed: {}", e);
            return Err(AssistantError::Extraction(e.to_string()));
        }
        Err(panic_payload) => {
            let message = panic_payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown parser panic".to_string());
            warn!("PDF parser panicked: {}", message);
            return Err(AssistantError::Extraction(format!(
                "unreadable PDF: {message}"
            )));
        }
    };

    let mut text = String::new();
    for page in &pages {
        text.push_str(page);
        text.push('\n');
    }

    debug!(
        "Extracted {} characters from {} pages",
        text.chars().count(),
        pages.len()
    );
    Ok(text)
}

/// Concatenate the text of several documents in upload order
#[inline]
pub fn extract_text_from_pdfs(documents: &[PdfDocument]) -> Result<String> {
    let mut text = String::new();
    for document in documents {
        debug!("Extracting text from {}", document.filename);
        text.push_str(&extract_text(&document.bytes)?);
    }
    Ok(text)
}

/// Run extraction off the async runtime
#[inline]
pub async fn extract_text_blocking(documents: Vec<PdfDocument>) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text_from_pdfs(&documents))
        .await
        .map_err(|e| AssistantError::Extraction(e.to_string()))?
}
