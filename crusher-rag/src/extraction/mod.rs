//! Content extraction from uploaded files.
//!
//! [`ContentExtractor`] turns an [`UploadedFile`] into [`ExtractedContent`]:
//! the raw text plus one [`LayoutElement`] per discrete textual element, each
//! carrying page, bounding box and typographic hints. PDF files are parsed
//! with `lopdf`; plain text and markdown are classified line by line.

mod pdf;
mod text;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{ChunkType, FontWeight, Position};
use crate::error::{RagError, Result};

/// A file handed to the engine for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    /// MIME type as reported by the uploader, if known.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Create a file from in-memory bytes.
    pub fn new(
        name: impl Into<String>,
        mime_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self { name: name.into(), mime_type: mime_type.map(str::to_string), bytes: bytes.into() }
    }

    /// Create a markdown file from a string.
    pub fn markdown(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, Some("text/markdown"), text.as_bytes())
    }

    /// Read a file from disk. The MIME type is left for extension sniffing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagError::extraction(&name, format!("failed to read file: {e}")))?;
        Ok(Self { name, mime_type: None, bytes })
    }

    /// The file name without directories or extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name).file_stem().and_then(|s| s.to_str()).unwrap_or(&self.name)
    }
}

/// The supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Markdown,
    Text,
}

impl FileKind {
    /// Detect the format from the MIME type, falling back to the extension.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFileType`] when neither identifies a
    /// supported format.
    pub fn detect(file: &UploadedFile) -> Result<Self> {
        let from_mime = file.mime_type.as_deref().and_then(|mime| {
            let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            match essence.as_str() {
                "application/pdf" => Some(FileKind::Pdf),
                "text/markdown" | "text/x-markdown" => Some(FileKind::Markdown),
                "text/plain" => Some(FileKind::Text),
                _ => None,
            }
        });
        if let Some(kind) = from_mime {
            return Ok(kind);
        }

        let extension = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("pdf") => Ok(FileKind::Pdf),
            Some("md" | "markdown" | "mdx") => Ok(FileKind::Markdown),
            Some("txt" | "text") => Ok(FileKind::Text),
            _ => Err(RagError::UnsupportedFileType {
                filename: file.name.clone(),
                mime_type: file.mime_type.clone(),
            }),
        }
    }

    /// The name recorded as the document type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Markdown => "markdown",
            FileKind::Text => "text",
        }
    }
}

/// The structural kind of a layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Text,
    Heading { level: u8 },
    List,
    Code,
    Table,
    Image,
}

impl ElementKind {
    /// The chunk type a chunk starting with this element receives.
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            ElementKind::Text => ChunkType::Text,
            ElementKind::Heading { .. } => ChunkType::Heading,
            ElementKind::List => ChunkType::List,
            ElementKind::Code => ChunkType::Code,
            ElementKind::Table => ChunkType::Table,
            ElementKind::Image => ChunkType::Image,
        }
    }

    /// Heading level for heading elements.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            ElementKind::Heading { level } => Some(*level),
            _ => None,
        }
    }
}

/// One discrete textual (or image) element with its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    pub kind: ElementKind,
    pub content: String,
    pub page: u32,
    pub position: Position,
    pub font_size: f32,
    pub font_weight: FontWeight,
}

/// Document properties read during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    /// Full raw text of the document.
    pub content: String,
    pub total_pages: u32,
    pub layout_elements: Vec<LayoutElement>,
    pub metadata: ExtractedMetadata,
    pub file_kind: FileKind,
}

/// Extracts text and layout from PDF, markdown and plain-text files.
///
/// The extractor holds no state between calls; one instance can serve any
/// number of concurrent extractions.
///
/// # Example
///
/// ```rust,ignore
/// use crusher_rag::{ContentExtractor, UploadedFile};
///
/// let extractor = ContentExtractor::new().with_max_pages(200);
/// let extracted = extractor.extract(&UploadedFile::from_path("report.pdf").await?).await?;
/// println!("{} elements on {} pages", extracted.layout_elements.len(), extracted.total_pages);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    extract_images: bool,
    max_pages: Option<u32>,
}

impl ContentExtractor {
    /// Create an extractor that reads every page and skips images.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit [`ElementKind::Image`] placeholders for images embedded in PDFs.
    pub fn with_images(mut self, extract_images: bool) -> Self {
        self.extract_images = extract_images;
        self
    }

    /// Stop reading PDFs after `max_pages` pages.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Extract raw text and layout elements from `file`.
    ///
    /// PDF parsing yields to the runtime between pages, so dropping the
    /// returned future abandons a long extraction.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFileType`] if the format is not supported.
    /// - [`RagError::Extraction`] if the content is neither a parseable PDF
    ///   nor valid UTF-8 text.
    pub async fn extract(&self, file: &UploadedFile) -> Result<ExtractedContent> {
        let kind = FileKind::detect(file)?;
        debug!(
            file.name = %file.name,
            kind = kind.as_str(),
            bytes = file.bytes.len(),
            "extracting"
        );

        let mut extracted = match kind {
            FileKind::Pdf => {
                match pdf::extract_pdf(&file.bytes, self.extract_images, self.max_pages).await {
                    Ok(extracted) => extracted,
                    Err(e) => {
                        warn!(
                            file.name = %file.name,
                            error = %e,
                            "PDF parsing failed, retrying as plain text"
                        );
                        let text = decode_text(file).map_err(|_| {
                            RagError::extraction(
                                &file.name,
                                format!("PDF parsing failed ({e}) and the content is not text"),
                            )
                        })?;
                        text::extract_text(text, FileKind::Text)
                    }
                }
            }
            FileKind::Markdown | FileKind::Text => text::extract_text(decode_text(file)?, kind),
        };

        if extracted.metadata.title.is_none() {
            extracted.metadata.title = Some(file.stem().to_string());
        }
        Ok(extracted)
    }
}

fn decode_text(file: &UploadedFile) -> Result<&str> {
    let text = std::str::from_utf8(&file.bytes)
        .map_err(|e| RagError::extraction(&file.name, format!("content is not valid UTF-8: {e}")))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_from_mime_then_extension() {
        let file = UploadedFile::new("notes", Some("text/markdown; charset=utf-8"), "x");
        assert_eq!(FileKind::detect(&file).unwrap(), FileKind::Markdown);

        let file = UploadedFile::new("report.PDF", Some("application/octet-stream"), "x");
        assert_eq!(FileKind::detect(&file).unwrap(), FileKind::Pdf);

        let file = UploadedFile::new("readme.txt", None, "x");
        assert_eq!(FileKind::detect(&file).unwrap(), FileKind::Text);
    }

    #[test]
    fn rejects_unsupported_types() {
        let file = UploadedFile::new("photo.png", Some("image/png"), vec![0x89, 0x50]);
        let err = FileKind::detect(&file).unwrap_err();
        assert!(matches!(
            err,
            RagError::UnsupportedFileType { ref filename, .. } if filename == "photo.png"
        ));
    }

    #[tokio::test]
    async fn title_falls_back_to_file_stem() {
        let file = UploadedFile::markdown("docs/guide.md", "Hello there.");
        let extracted = ContentExtractor::new().extract(&file).await.unwrap();
        assert_eq!(extracted.metadata.title.as_deref(), Some("guide"));
        assert_eq!(extracted.file_kind, FileKind::Markdown);
    }

    #[tokio::test]
    async fn invalid_utf8_text_is_an_extraction_error() {
        let file = UploadedFile::new("notes.txt", Some("text/plain"), vec![0xff, 0xfe, 0xfd]);
        let err = ContentExtractor::new().extract(&file).await.unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[tokio::test]
    async fn broken_pdf_falls_back_to_text() {
        let file = UploadedFile::new("plain.pdf", Some("application/pdf"), "Not really a PDF.");
        let extracted = ContentExtractor::new().extract(&file).await.unwrap();
        assert_eq!(extracted.file_kind, FileKind::Text);
        assert_eq!(extracted.layout_elements.len(), 1);
        assert_eq!(extracted.layout_elements[0].content, "Not really a PDF.");
    }

    #[tokio::test]
    async fn binary_non_pdf_fails_without_fabricating_content() {
        let file = UploadedFile::new("scan.pdf", Some("application/pdf"), vec![0x00, 0xc3, 0x28]);
        let err = ContentExtractor::new().extract(&file).await.unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[tokio::test]
    async fn from_path_reads_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nBody.").unwrap();
        let file = UploadedFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.md");
        assert_eq!(FileKind::detect(&file).unwrap(), FileKind::Markdown);

        let err = UploadedFile::from_path(dir.path().join("missing.md")).await.unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
