//! OCR through the poppler (`pdftoppm`) and `tesseract` command-line tools

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

/// Runs tesseract over images and rendered PDF pages
#[derive(Debug, Clone)]
pub struct OcrEngine {
    dpi: u32,
    language: String,
}

impl OcrEngine {
    /// Create a new OCR engine
    pub fn new(dpi: u32, language: impl Into<String>) -> Self {
        Self {
            dpi,
            language: language.into(),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.ocr_dpi, config.ocr_language.clone())
    }

    /// Check if tesseract is on PATH (checked once per process)
    pub fn has_tesseract() -> bool {
        static TESSERACT: OnceLock<bool> = OnceLock::new();
        *TESSERACT.get_or_init(|| {
            Command::new("tesseract")
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }

    /// Check if pdftoppm is on PATH (checked once per process)
    pub fn has_pdftoppm() -> bool {
        static PDFTOPPM: OnceLock<bool> = OnceLock::new();
        // pdftoppm -v prints to stderr and may exit non-zero; spawning is enough
        *PDFTOPPM.get_or_init(|| Command::new("pdftoppm").arg("-v").output().is_ok())
    }

    /// Render and OCR the given PDF pages (1-indexed)
    ///
    /// The PDF is written to a temp dir once. A page that fails to render or
    /// OCR is logged and left out of the result.
    pub fn ocr_pdf_pages(&self, pdf: &[u8], pages: &[u32]) -> Result<BTreeMap<u32, String>> {
        if !Self::has_pdftoppm() || !Self::has_tesseract() {
            return Err(Error::Ocr(
                "PDF OCR requires pdftoppm and tesseract (apt install poppler-utils tesseract-ocr)"
                    .to_string(),
            ));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("repo-rag-ocr-")
            .tempdir()
            .map_err(|e| Error::Ocr(format!("Failed to create temp dir: {}", e)))?;

        let pdf_path = temp_dir.path().join("input.pdf");
        std::fs::write(&pdf_path, pdf)
            .map_err(|e| Error::Ocr(format!("Failed to write temp PDF: {}", e)))?;

        let mut texts = BTreeMap::new();
        for &page_number in pages {
            let page_dir = temp_dir.path().join(format!("page-{}", page_number));
            match self.ocr_rendered_page(&pdf_path, &page_dir, page_number) {
                Ok(text) => {
                    texts.insert(page_number, text);
                }
                Err(e) => tracing::warn!("OCR failed for page {}: {}", page_number, e),
            }
        }
        Ok(texts)
    }

    fn ocr_rendered_page(&self, pdf_path: &Path, page_dir: &Path, page_number: u32) -> Result<String> {
        std::fs::create_dir_all(page_dir)?;

        let page = page_number.to_string();
        let dpi = self.dpi.to_string();

        let output = Command::new("pdftoppm")
            .arg("-png")
            .args(["-r", &dpi, "-f", &page, "-l", &page])
            .arg(pdf_path)
            .arg(page_dir.join("page"))
            .output()
            .map_err(|e| Error::Ocr(format!("pdftoppm failed: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "pdftoppm error on page {}: {}",
                page_number,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let image = first_png(page_dir)?
            .ok_or_else(|| Error::Ocr(format!("pdftoppm produced no image for page {}", page_number)))?;

        self.run_tesseract(&image)
    }

    /// OCR an image held in memory
    pub fn ocr_image(&self, data: &[u8]) -> Result<String> {
        if !Self::has_tesseract() {
            return Err(Error::Ocr(
                "Image OCR requires tesseract (apt install tesseract-ocr)".to_string(),
            ));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("repo-rag-img-")
            .tempdir()
            .map_err(|e| Error::Ocr(format!("Failed to create temp dir: {}", e)))?;

        // tesseract sniffs the real format; the extension only needs to be an image one
        let image_path = temp_dir.path().join("input.png");
        std::fs::write(&image_path, data)
            .map_err(|e| Error::Ocr(format!("Failed to write temp image: {}", e)))?;

        self.run_tesseract(&image_path)
    }

    fn run_tesseract(&self, image: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| Error::Ocr(format!("tesseract failed: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "tesseract error: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("OCR extracted {} characters from {}", text.len(), image.display());
        Ok(text)
    }
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self::new(300, "eng")
    }
}

fn first_png(dir: &Path) -> Result<Option<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    images.sort();
    Ok(images.into_iter().next())
}
