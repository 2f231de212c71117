use prodsplit_core::ExtractError;

/// Parse a PDF into per-page text.
///
/// `pdf-extract` returns the whole document as one string with form feed
/// characters (`\x0C`) separating pages; a document without any form
/// feeds is treated as a single page.
pub fn parse_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractError::CorruptDocument(e.to_string()))?;

    if text.contains('\x0C') {
        Ok(text.split('\x0C').map(|p| p.trim().to_string()).collect())
    } else {
        // Scanned/image pages come back empty; OCR is out of scope, so an
        // empty single page is still a valid one-page document.
        Ok(vec![text.trim().to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_corrupt() {
        let err = parse_pdf(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::CorruptDocument(_)));
    }
}
