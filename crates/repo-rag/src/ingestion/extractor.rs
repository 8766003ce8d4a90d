//! Text extraction: plain text, PDFs with per-page OCR fallback, and images

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

use super::ocr::OcrEngine;

/// How a file's text is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Read as (lossy) UTF-8
    Text,
    /// Per-page text extraction, OCR for sparse pages
    Pdf,
    /// OCR
    Image,
    /// Binary content with no text to extract
    Binary,
}

impl FileKind {
    /// Classify by file name
    pub fn from_path(path: &str) -> Self {
        let ext = extension_of(path);
        if ext == "pdf" {
            return Self::Pdf;
        }

        match mime_guess::from_ext(&ext).first() {
            Some(mime) if mime.type_() == mime_guess::mime::IMAGE && ext != "svg" => Self::Image,
            _ => Self::Text,
        }
    }

    /// Classify by name and sniff text files for binary content
    pub fn detect(path: &str, data: &[u8]) -> Self {
        match Self::from_path(path) {
            Self::Text if looks_binary(data) => Self::Binary,
            kind => kind,
        }
    }
}

/// Lower-cased extension without the dot, or empty
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[pos + 1..].to_lowercase(),
        _ => String::new(),
    }
}

fn looks_binary(data: &[u8]) -> bool {
    data.iter().take(8192).any(|&b| b == 0)
}

/// Decode bytes as UTF-8, replacing invalid sequences
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Label used for PDF errors until the caller attaches the real path
const PDF_LABEL: &str = "document.pdf";

/// Text layer of a PDF
enum PdfText {
    /// Trimmed text per page, in page order
    Pages(Vec<(u32, String)>),
    /// Whole-document fallback when page-wise parsing fails
    Whole(String),
}

/// Extracts text from raw file bytes
#[derive(Debug, Clone)]
pub struct Extractor {
    ocr_threshold: usize,
    ocr: OcrEngine,
    pdf_timeout: Duration,
}

impl Extractor {
    /// Create a new extractor
    pub fn new(ocr_threshold: usize, ocr: OcrEngine) -> Self {
        Self {
            ocr_threshold,
            ocr,
            pdf_timeout: Duration::from_secs(60),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.ocr_threshold, OcrEngine::from_config(config))
            .with_pdf_timeout(Duration::from_secs(config.pdf_timeout_secs))
    }

    /// Limit on reading a PDF's text layer
    pub fn with_pdf_timeout(mut self, timeout: Duration) -> Self {
        self.pdf_timeout = timeout;
        self
    }

    /// Extract text from a file. Returns `None` for binary files and blank text.
    pub fn extract(&self, path: &str, data: &[u8]) -> Result<Option<String>> {
        let text = match FileKind::detect(path, data) {
            FileKind::Text => decode_text(data),
            FileKind::Pdf => self.hybrid_pdf_extraction(data).map_err(|e| match e {
                Error::Extraction { message, .. } => Error::extraction(path, message),
                other => other,
            })?,
            FileKind::Image => self.extract_image_text(data),
            FileKind::Binary => {
                tracing::debug!("Skipping binary file: {}", path);
                return Ok(None);
            }
        };

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    /// Extract PDF text page by page
    ///
    /// A page whose trimmed text is shorter than the OCR threshold is rendered
    /// and OCR'd instead; when OCR yields nothing the page is skipped. Pages
    /// are joined with `\n` in page order.
    pub fn hybrid_pdf_extraction(&self, data: &[u8]) -> Result<String> {
        let owned = data.to_vec();
        let pages = match run_with_timeout(self.pdf_timeout, move || read_pdf_text(&owned))? {
            PdfText::Pages(pages) => pages,
            PdfText::Whole(text) => return Ok(text),
        };

        let sparse: Vec<u32> = pages
            .iter()
            .filter(|(_, text)| text.chars().count() < self.ocr_threshold)
            .map(|(page_number, _)| *page_number)
            .collect();

        let mut ocr_texts = if sparse.is_empty() {
            BTreeMap::new()
        } else {
            self.ocr.ocr_pdf_pages(data, &sparse).unwrap_or_else(|e| {
                tracing::warn!("Skipping {} sparse PDF pages: {}", sparse.len(), e);
                BTreeMap::new()
            })
        };

        let total = pages.len();
        let mut parts: Vec<String> = Vec::with_capacity(total);
        let mut ocr_pages = 0usize;

        for (page_number, text) in pages {
            if text.chars().count() >= self.ocr_threshold {
                parts.push(text);
                continue;
            }

            match ocr_texts.remove(&page_number) {
                Some(ocr_text) if !ocr_text.is_empty() => {
                    ocr_pages += 1;
                    parts.push(ocr_text);
                }
                _ => tracing::debug!("No usable text on PDF page {}", page_number),
            }
        }

        tracing::info!("Extracted PDF: {} pages ({} via OCR)", total, ocr_pages);

        Ok(parts.join("\n"))
    }

    /// OCR an image. Failures are logged and yield an empty string.
    pub fn extract_image_text(&self, data: &[u8]) -> String {
        match self.ocr.ocr_image(data) {
            Ok(text) => format!("[OCR]\n{}", text.trim()),
            Err(e) => {
                tracing::error!("Failed to OCR image: {}", e);
                String::new()
            }
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(30, OcrEngine::default())
    }
}

fn read_pdf_text(data: &[u8]) -> Result<PdfText> {
    match lopdf::Document::load_mem(data) {
        Ok(doc) => Ok(PdfText::Pages(
            doc.get_pages()
                .keys()
                .map(|&page_number| {
                    let text = doc.extract_text(&[page_number]).unwrap_or_default();
                    (page_number, text.trim().to_string())
                })
                .collect(),
        )),
        Err(e) => {
            tracing::warn!("Page-wise PDF parsing failed ({}), trying whole-document extraction", e);
            pdf_extract::extract_text_from_mem(data)
                .map(|text| PdfText::Whole(text.trim().to_string()))
                .map_err(|e| Error::extraction(PDF_LABEL, e.to_string()))
        }
    }
}

/// Run PDF parsing on its own thread so a pathological file cannot stall
/// the caller past `timeout`. A timed-out thread is left to finish alone.
fn run_with_timeout<T, F>(timeout: Duration, task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let _ = tx.send(task());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("PDF extraction timed out after {:?}", timeout);
            Err(Error::extraction(
                PDF_LABEL,
                format!("text extraction timed out after {:?}", timeout),
            ))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("PDF extraction thread crashed");
            Err(Error::extraction(PDF_LABEL, "text extraction thread crashed"))
        }
    }
}
