//! Optical recognition for pages that carry no text layer, by shelling out to
//! poppler's `pdftoppm` and `tesseract`.

use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{tool} failed: {stderr}")]
    Tool { tool: &'static str, stderr: String },
    #[error("pdftoppm produced no image for page {0}")]
    NoImage(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Recognizes the text of one page (1-based) of a PDF.
pub trait OcrEngine {
    fn recognize_page(&self, pdf: &Path, page: u32) -> Result<String, OcrError>;
}

pub struct TesseractCli {
    dpi: u32,
    language: String,
}

impl TesseractCli {
    pub fn new(dpi: u32, language: impl Into<String>) -> Self {
        Self {
            dpi,
            language: language.into(),
        }
    }

    /// Both binaries answer a version probe.
    pub fn is_available() -> bool {
        let pdftoppm = Command::new("pdftoppm").arg("-v").output().is_ok();
        let tesseract = Command::new("tesseract").arg("--version").output().is_ok();
        if !pdftoppm {
            debug!("pdftoppm not found, install poppler-utils for OCR");
        }
        if !tesseract {
            debug!("tesseract not found, install tesseract-ocr for OCR");
        }
        pdftoppm && tesseract
    }

    /// `None` when either binary is missing.
    pub fn detect(dpi: u32, language: &str) -> Option<Self> {
        Self::is_available().then(|| Self::new(dpi, language))
    }
}

impl OcrEngine for TesseractCli {
    fn recognize_page(&self, pdf: &Path, page: u32) -> Result<String, OcrError> {
        let scratch = tempfile::tempdir()?;
        let prefix = scratch.path().join("page");
        let page_arg = page.to_string();

        let render = Command::new("pdftoppm")
            .args(["-f", &page_arg, "-l", &page_arg])
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|source| OcrError::Spawn {
                tool: "pdftoppm",
                source,
            })?;
        if !render.status.success() {
            return Err(OcrError::Tool {
                tool: "pdftoppm",
                stderr: String::from_utf8_lossy(&render.stderr).trim().to_string(),
            });
        }

        // pdftoppm zero-pads the page number depending on the page count.
        let image = std::fs::read_dir(scratch.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| path.extension().is_some_and(|ext| ext == "png"))
            .ok_or(OcrError::NoImage(page))?;

        let recognize = Command::new("tesseract")
            .arg(&image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|source| OcrError::Spawn {
                tool: "tesseract",
                source,
            })?;
        if !recognize.status.success() {
            return Err(OcrError::Tool {
                tool: "tesseract",
                stderr: String::from_utf8_lossy(&recognize.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&recognize.stdout).into_owned())
    }
}
