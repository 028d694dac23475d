//! Error types for the `crusher-rag` crate.

use thiserror::Error;

/// Errors that can occur while processing or searching documents.
///
/// Empty documents and searches without matches are not errors: they produce
/// a [`DocumentStructure`](crate::DocumentStructure) with no chunks and a
/// [`RagResult`](crate::RagResult) with no results respectively.
#[derive(Debug, Error)]
pub enum RagError {
    /// The file could not be read or its content could not be extracted.
    #[error("Extraction error ({filename}): {message}")]
    Extraction {
        /// Name of the file being extracted.
        filename: String,
        /// A description of the failure.
        message: String,
    },

    /// The file is not a PDF, plain-text or markdown document.
    #[error("Unsupported file type for '{filename}'{}", mime_suffix(.mime_type))]
    UnsupportedFileType {
        /// Name of the rejected file.
        filename: String,
        /// The MIME type reported for the file, if any.
        mime_type: Option<String>,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the processing pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    pub(crate) fn extraction(filename: &str, message: impl Into<String>) -> Self {
        Self::Extraction { filename: filename.to_string(), message: message.into() }
    }
}

fn mime_suffix(mime_type: &Option<String>) -> String {
    mime_type.as_deref().map(|m| format!(" ({m})")).unwrap_or_default()
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
