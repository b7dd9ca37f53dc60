//! PDF discovery and text extraction.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Text extracted from one PDF file.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfDocument {
    /// File name, used as chunk provenance
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// PDF files directly inside `dir`, sorted by path.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "PDF directory not found: {}",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Extract text from one file. Runs on the blocking pool since parsing is
/// CPU-bound and malformed files may panic inside the parser.
pub async fn extract_text(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;

    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(Error::InvalidArgument(format!(
            "failed to extract {}: {}",
            path.display(),
            err
        ))),
        Err(err) => Err(Error::InvalidArgument(format!(
            "PDF parser crashed on {}: {}",
            path.display(),
            err
        ))),
    }
}

/// PDFs of one directory: the ones with text and the ones that were skipped.
#[derive(Debug, Default)]
pub struct PdfBatch {
    pub documents: Vec<PdfDocument>,
    pub skipped: Vec<PathBuf>,
}

impl PdfBatch {
    /// Every PDF file found, loaded or not.
    pub fn found(&self) -> usize {
        self.documents.len() + self.skipped.len()
    }
}

/// Load every PDF in `dir`. Files that fail extraction or contain no text are
/// logged and skipped.
pub async fn load_pdfs(dir: &Path) -> Result<PdfBatch> {
    let files = find_pdfs(dir)?;
    if files.is_empty() {
        warn!("No PDF files found in {}", dir.display());
        return Ok(PdfBatch::default());
    }
    info!("Found {} PDF files in {}", files.len(), dir.display());

    let mut batch = PdfBatch {
        documents: Vec::with_capacity(files.len()),
        skipped: Vec::new(),
    };
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match extract_text(&path).await {
            Ok(text) if text.trim().is_empty() => {
                warn!(file = %name, "PDF contains no extractable text, skipping");
                batch.skipped.push(path);
            }
            Ok(text) => {
                debug!(file = %name, chars = text.chars().count(), "Extracted PDF text");
                batch.documents.push(PdfDocument { name, path, text });
            }
            Err(err) => {
                warn!(file = %name, "Skipping PDF: {}", err);
                batch.skipped.push(path);
            }
        }
    }

    Ok(batch)
}
