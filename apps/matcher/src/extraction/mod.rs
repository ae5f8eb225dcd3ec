//! Text extraction and batch ingestion for uploaded CVs and job descriptions.
//!
//! PDF parsing is CPU-bound and may panic on malformed input, so it runs on
//! the blocking pool; a panic surfaces as an `ExtractionError` for that file only.

use std::collections::HashSet;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("file is not valid UTF-8 text: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("file is not a readable PDF: {0}")]
    InvalidPdf(String),

    #[error("unsupported file type '{0}'")]
    Unsupported(String),
}

/// Declared kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Detects the kind from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_lowercase();
        match extension.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// Which upload batch a file belongs to. Controls the accepted kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRole {
    /// Job descriptions: plain text or PDF.
    Jobs,
    /// Candidate CVs: PDF only.
    Cvs,
}

impl BatchRole {
    fn accepts(self, kind: DocumentKind) -> bool {
        match self {
            BatchRole::Jobs => true,
            BatchRole::Cvs => kind == DocumentKind::Pdf,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BatchRole::Jobs => "job description",
            BatchRole::Cvs => "CV",
        }
    }
}

/// A raw file as received from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// An ingested document. Identity is the filename, unique within its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub kind: DocumentKind,
    pub content: String,
}

/// A file that was dropped from its batch, with the reason shown to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub filename: String,
    pub reason: String,
}

/// Result of ingesting one upload batch.
#[derive(Debug, Default)]
pub struct IngestedBatch {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

/// Extracts the text of a single file.
///
/// `Text` decodes the bytes as UTF-8 verbatim. `Pdf` joins the per-page text
/// with `\n`, in page order.
pub async fn extract_text(data: Bytes, kind: DocumentKind) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Text => Ok(String::from_utf8(data.to_vec())?),
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || extract_pdf_pages(&data))
            .await
            .map_err(|e| ExtractionError::InvalidPdf(format!("PDF parser aborted: {e}")))?
            .map(|pages| pages.join("\n")),
    }
}

fn extract_pdf_pages(data: &[u8]) -> Result<Vec<String>, ExtractionError> {
    pdf_extract::extract_text_from_mem_by_pages(data)
        .map_err(|e| ExtractionError::InvalidPdf(e.to_string()))
}

/// Ingests an upload batch in upload order.
///
/// Unsupported, duplicate or unreadable files are skipped with a warning;
/// they never fail the batch. When two files share a filename the first
/// readable one is kept and later ones are skipped, rather than the later
/// upload replacing the earlier content.
pub async fn ingest_batch(files: Vec<UploadedFile>, role: BatchRole) -> IngestedBatch {
    let mut batch = IngestedBatch::default();
    let mut seen: HashSet<String> = HashSet::new();

    for file in files {
        let kind = match DocumentKind::from_filename(&file.filename) {
            Some(kind) if role.accepts(kind) => kind,
            _ => {
                let reason = ExtractionError::Unsupported(file.filename.clone()).to_string();
                skip(&mut batch, role, file.filename, reason);
                continue;
            }
        };

        if seen.contains(&file.filename) {
            skip(
                &mut batch,
                role,
                file.filename,
                "duplicate filename in upload batch".to_string(),
            );
            continue;
        }

        match extract_text(file.data, kind).await {
            Ok(content) => {
                seen.insert(file.filename.clone());
                batch.documents.push(Document {
                    name: file.filename,
                    kind,
                    content,
                });
            }
            Err(e) => skip(&mut batch, role, file.filename, format!("document unreadable: {e}")),
        }
    }

    info!(
        "Ingested {} {} document(s), skipped {}",
        batch.documents.len(),
        role.label(),
        batch.skipped.len()
    );
    batch
}

fn skip(batch: &mut IngestedBatch, role: BatchRole, filename: String, reason: String) {
    warn!("Skipping {} '{}': {}", role.label(), filename, reason);
    batch.skipped.push(SkippedDocument { filename, reason });
}
