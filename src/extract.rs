//! PDF text extraction.
//!
//! Parsing is delegated to `pdf-extract`; this module only maps failures and
//! empty results into the [`AnalysisError::Extraction`] class. A PDF with no
//! extractable text is almost always a scanned image without OCR, which the
//! user can fix by supplying a different file.

use anyhow::Result;

use crate::error::AnalysisError;

/// Extracts plain text from in-memory PDF bytes.
///
/// Fails with [`AnalysisError::Extraction`] when the bytes are not a
/// readable PDF or when extraction yields only whitespace.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AnalysisError::Extraction(format!("No se pudo leer el PDF: {}", e)))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::Extraction(
            "No se pudo extraer texto del PDF (¿es un escaneo sin OCR?)".to_string(),
        )
        .into());
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_is_an_extraction_error() {
        let err = extract_text(b"not a pdf").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Extraction(_))
        ));
    }
}
