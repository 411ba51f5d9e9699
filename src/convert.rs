//! Batch conversion of downloaded PDFs to plain text. Pages with a usable
//! text layer are read directly; the rest go through OCR when an engine is
//! installed.

use crate::models::ConversionConfig;
use crate::ocr::OcrEngine;
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("input folder not found: {0}")]
    MissingInput(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl ConvertError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// How one page's text was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    Direct(String),
    Ocr(String),
    OcrEmpty,
    OcrUnavailable,
}

/// Join pages, numbered from 1, into the text file layout.
pub fn render_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let n = i + 1;
            match page {
                PageText::Direct(text) => format!("--- Page {n} ---\n{text}"),
                PageText::Ocr(text) => format!("--- Page {n} [OCR] ---\n{text}"),
                PageText::OcrEmpty => format!("--- Page {n} [OCR: no text detected] ---"),
                PageText::OcrUnavailable => {
                    format!("--- Page {n} [scanned, OCR not available] ---")
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Default)]
pub struct ConversionSummary {
    pub output_dir: PathBuf,
    pub total: usize,
    /// File name and character count of each text written.
    pub converted: Vec<(String, usize)>,
    pub failed: Vec<(String, String)>,
}

impl ConversionSummary {
    pub fn render(&self) -> String {
        let mut content = String::new();
        content.push_str(&format!("\n{}\n", "=".repeat(50)));
        content.push_str(&format!(
            "✅ Successfully converted: {}/{}\n",
            self.converted.len(),
            self.total
        ));
        if !self.failed.is_empty() {
            content.push_str(&format!("❌ Failed ({}):\n", self.failed.len()));
            for (name, err) in &self.failed {
                content.push_str(&format!("   • {}: {}\n", name, err));
            }
        }
        content.push_str(&format!("\nText files saved to: {}", self.output_dir.display()));
        content
    }
}

pub struct TextConverter {
    threshold: usize,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl TextConverter {
    pub fn new(config: &ConversionConfig, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self {
            threshold: config.ocr_threshold,
            ocr,
        }
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    pub fn convert_file(&self, pdf: &Path) -> Result<String, ConvertError> {
        let doc = Document::load(pdf)?;
        let mut pages = Vec::new();
        for (number, _) in doc.get_pages() {
            let direct = doc.extract_text(&[number]).unwrap_or_else(|err| {
                warn!(file = %pdf.display(), page = number, error = %err, "text layer unreadable");
                String::new()
            });
            pages.push(self.page_text(pdf, number, direct.trim()));
        }
        Ok(render_pages(&pages))
    }

    fn page_text(&self, pdf: &Path, number: u32, direct: &str) -> PageText {
        if direct.chars().count() >= self.threshold {
            return PageText::Direct(direct.to_string());
        }
        let Some(engine) = &self.ocr else {
            return PageText::OcrUnavailable;
        };
        match engine.recognize_page(pdf, number) {
            Ok(text) if !text.trim().is_empty() => PageText::Ocr(text.trim().to_string()),
            Ok(_) => PageText::OcrEmpty,
            Err(err) => {
                warn!(file = %pdf.display(), page = number, error = %err, "OCR failed");
                PageText::OcrEmpty
            }
        }
    }

    /// Convert every `*.pdf` directly inside `input` into `<stem>.txt` under
    /// `output` (default `<input>/text_output`). Per-file failures are
    /// collected in the summary.
    pub fn convert_folder(
        &self,
        input: &Path,
        output: Option<&Path>,
    ) -> Result<ConversionSummary, ConvertError> {
        if !input.is_dir() {
            return Err(ConvertError::MissingInput(input.display().to_string()));
        }
        let output_dir = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.join("text_output"));
        fs::create_dir_all(&output_dir).map_err(|e| ConvertError::io(&output_dir, e))?;

        let mut pdfs: Vec<PathBuf> = fs::read_dir(input)
            .map_err(|e| ConvertError::io(input, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "pdf"))
            .collect();
        pdfs.sort();

        let mut summary = ConversionSummary {
            output_dir: output_dir.clone(),
            total: pdfs.len(),
            ..ConversionSummary::default()
        };
        if pdfs.is_empty() {
            println!("⚠️  No PDF files found in: {}", input.display());
            return Ok(summary);
        }

        println!("📂 Found {} PDF(s) in: {}", pdfs.len(), input.display());
        println!("💾 Output folder: {}\n", output_dir.display());

        for (i, pdf) in pdfs.iter().enumerate() {
            let name = pdf
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = pdf
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let destination = output_dir.join(format!("{stem}.txt"));
            print!("[{}/{}] Processing: {} ... ", i + 1, pdfs.len(), name);

            let result = self.convert_file(pdf).and_then(|text| {
                fs::write(&destination, &text)
                    .map(|_| text.chars().count())
                    .map_err(|e| ConvertError::io(&destination, e))
            });
            match result {
                Ok(chars) => {
                    println!("✅ ({} chars → {}.txt)", chars, stem);
                    info!(file = %name, chars, "converted");
                    summary.converted.push((name, chars));
                }
                Err(err) => {
                    println!("❌ FAILED: {}", err);
                    warn!(file = %name, error = %err, "conversion failed");
                    summary.failed.push((name, err.to_string()));
                }
            }
        }
        Ok(summary)
    }
}
