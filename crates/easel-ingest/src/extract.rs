//! Subprocess extraction adapters: `pdftotext` (poppler-utils) for PDF
//! text layers and `tesseract` for handwriting OCR.
//!
//! Both tools read from file paths, so inputs land in temp files. Every
//! invocation is guarded by a per-command timeout.

use std::io::Write;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use easel_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use easel_core::{has_pdf_magic, Error, OcrEngine, PdfTextExtractor, Result};

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn write_temp_file(data: &[u8]) -> Result<NamedTempFile> {
    let mut tmpfile = NamedTempFile::new()
        .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Parse the `Pages:` line out of `pdfinfo` output.
fn parse_page_count(pdfinfo_output: &str) -> usize {
    pdfinfo_output
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim() == "Pages" {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

/// PDF text-layer extractor backed by `pdftotext`.
pub struct PdftotextExtractor;

#[async_trait]
impl PdfTextExtractor for PdftotextExtractor {
    async fn extract_pages(&self, data: &[u8]) -> Result<Vec<(u32, String)>> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }
        if !has_pdf_magic(data) {
            return Err(Error::InvalidInput(
                "Data is not a valid PDF (missing %PDF header)".to_string(),
            ));
        }

        let tmpfile = write_temp_file(data)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let pdfinfo_output = run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;
        let page_count = parse_page_count(&pdfinfo_output);
        if page_count == 0 {
            return Err(Error::Extraction(
                "pdfinfo reported zero pages".to_string(),
            ));
        }

        let mut pages = Vec::with_capacity(page_count);
        for page in 1..=page_count as u32 {
            let text = run_cmd_with_timeout(
                Command::new("pdftotext")
                    .arg("-f")
                    .arg(page.to_string())
                    .arg("-l")
                    .arg(page.to_string())
                    .arg("-layout")
                    .arg(&tmp_path)
                    .arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?;
            pages.push((page, text));
        }

        debug!(
            subsystem = "ingest",
            component = "pdftotext",
            op = "extract_pages",
            page_count,
            "Extracted PDF text layer"
        );
        Ok(pages)
    }
}

/// Handwriting OCR backed by `tesseract`.
pub struct TesseractOcr {
    /// Language pack passed via `-l` (default "eng").
    language: String,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        if image.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot OCR an empty image".to_string(),
            ));
        }

        let tmpfile = write_temp_file(image)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let text = run_cmd_with_timeout(
            Command::new("tesseract")
                .arg(&tmp_path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let output = "Title: x\nPages:          12\nEncrypted: no\n";
        assert_eq!(parse_page_count(output), 12);
    }

    #[test]
    fn test_parse_page_count_missing() {
        assert_eq!(parse_page_count("Title: x\n"), 0);
    }

    #[tokio::test]
    async fn test_pdf_extractor_rejects_empty_data() {
        let err = PdftotextExtractor.extract_pages(&[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_pdf_extractor_rejects_bad_magic() {
        let err = PdftotextExtractor
            .extract_pages(b"PNG not a pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_ocr_rejects_empty_image() {
        let err = TesseractOcr::new().recognize(&[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
