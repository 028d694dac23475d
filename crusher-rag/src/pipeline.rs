//! Document processing orchestrator.
//!
//! The [`DocumentProcessor`] turns an [`UploadedFile`] into a
//! [`DocumentStructure`] by running the stages in order:
//! extract → chunk → hierarchy → embed → link relationships. Every stage is
//! also public on its own ([`ContentExtractor`], [`LayoutChunker`],
//! [`build_hierarchy`], [`EmbeddingProvider`], [`link_relationships`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use crusher_rag::{ChunkingOptions, DocumentProcessor, UploadedFile};
//!
//! let processor = DocumentProcessor::builder()
//!     .options(ChunkingOptions::builder().max_chunk_size(500).build()?)
//!     .build()?;
//!
//! let file = UploadedFile::markdown("notes.md", "# Title\n\nSome text here.");
//! let document = processor.process(&file).await?;
//! println!("{} chunks", document.chunks.len());
//! ```

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::chunking::{LayoutChunker, total_tokens};
use crate::config::ChunkingOptions;
use crate::document::{DocumentMetadata, DocumentStructure};
use crate::embedding::{EmbeddingProvider, HashEmbeddingProvider};
use crate::error::{RagError, Result};
use crate::extraction::{ContentExtractor, ExtractedContent, UploadedFile};
use crate::hierarchy::{build_hierarchy, link_parents};
use crate::keywords::{DOCUMENT_KEYWORD_LIMIT, document_keywords};
use crate::relationships::link_relationships;

/// Language recorded on every processed document.
const DEFAULT_LANGUAGE: &str = "en";

/// Runs the full extraction-to-structure pipeline.
///
/// Holds no mutable state: one processor may handle many files concurrently.
/// Construct one via [`DocumentProcessor::builder()`].
pub struct DocumentProcessor {
    extractor: ContentExtractor,
    chunker: LayoutChunker,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("extractor", &self.extractor)
            .field("options", self.chunker.options())
            .field("dimensions", &self.embedding_provider.dimensions())
            .finish()
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::from_parts(
            ChunkingOptions::default(),
            None,
            Arc::new(HashEmbeddingProvider::default()),
        )
    }
}

impl DocumentProcessor {
    /// Create a new [`DocumentProcessorBuilder`].
    pub fn builder() -> DocumentProcessorBuilder {
        DocumentProcessorBuilder::default()
    }

    fn from_parts(
        options: ChunkingOptions,
        max_pages: Option<u32>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let mut extractor = ContentExtractor::new().with_images(options.extract_images);
        if let Some(max_pages) = max_pages {
            extractor = extractor.with_max_pages(max_pages);
        }
        Self { extractor, chunker: LayoutChunker::new(options), embedding_provider }
    }

    /// Return a reference to the chunking options.
    pub fn options(&self) -> &ChunkingOptions {
        self.chunker.options()
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Process a single file into a [`DocumentStructure`].
    ///
    /// A file with no content yields a structure with zero chunks.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFileType`] / [`RagError::Extraction`] from
    ///   the extraction stage.
    /// - [`RagError::PipelineError`] if embedding fails, including the file
    ///   name in the error message.
    pub async fn process(&self, file: &UploadedFile) -> Result<DocumentStructure> {
        let extracted = self.extractor.extract(file).await?;
        let document_id = Uuid::new_v4().to_string();
        self.structure(&file.name, document_id, extracted).await
    }

    /// Process independent files concurrently.
    ///
    /// Results are returned in input order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; remaining work is dropped.
    pub async fn process_many(&self, files: &[UploadedFile]) -> Result<Vec<DocumentStructure>> {
        try_join_all(files.iter().map(|file| self.process(file))).await
    }

    /// Run every stage after extraction.
    async fn structure(
        &self,
        filename: &str,
        document_id: String,
        extracted: ExtractedContent,
    ) -> Result<DocumentStructure> {
        let mut chunks = self.chunker.chunk(&extracted, &document_id);
        debug!(document.id = %document_id, chunk_count = chunks.len(), "chunked document");

        let hierarchy = build_hierarchy(&chunks);
        link_parents(&mut chunks, &hierarchy);

        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(
                    document.id = %document_id,
                    file.name = filename,
                    error = %e,
                    "embedding failed during processing"
                );
                RagError::PipelineError(format!("embedding failed for '{filename}': {e}"))
            })?;
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.metadata.embedding = Some(embedding);
            }
        }

        link_relationships(&mut chunks);

        let options = self.chunker.options();
        let metadata = DocumentMetadata {
            title: extracted.metadata.title,
            author: extracted.metadata.author,
            subject: extracted.metadata.subject,
            keywords: document_keywords(
                chunks.iter().map(|c| c.metadata.keywords.as_slice()),
                DOCUMENT_KEYWORD_LIMIT,
            ),
            language: DEFAULT_LANGUAGE.to_string(),
            document_type: extracted.file_kind.as_str().to_string(),
            processing_timestamp: Utc::now(),
            chunking_strategy: options.chunking_strategy.as_str().to_string(),
            total_tokens: total_tokens(&chunks),
        };

        info!(
            document.id = %document_id,
            file.name = filename,
            pages = extracted.total_pages,
            chunk_count = chunks.len(),
            section_count = hierarchy.len(),
            total_tokens = metadata.total_tokens,
            "processed document"
        );

        Ok(DocumentStructure {
            id: document_id,
            filename: filename.to_string(),
            total_pages: extracted.total_pages,
            chunks,
            hierarchy,
            metadata,
        })
    }
}

/// Builder for constructing a [`DocumentProcessor`].
///
/// Every field is optional: chunking options default to
/// [`ChunkingOptions::default()`] and embeddings to
/// [`HashEmbeddingProvider`].
///
/// # Example
///
/// ```rust,ignore
/// let processor = DocumentProcessor::builder()
///     .embedding_provider(Arc::new(my_embedder))
///     .max_pages(100)
///     .build()?;
/// ```
#[derive(Default)]
pub struct DocumentProcessorBuilder {
    options: Option<ChunkingOptions>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    max_pages: Option<u32>,
}

impl DocumentProcessorBuilder {
    /// Set the chunking options.
    pub fn options(mut self, options: ChunkingOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Bound the number of PDF pages read per file.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Build the [`DocumentProcessor`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_chunk_size` is zero, the
    /// provider reports zero dimensions, or `max_pages` is zero.
    pub fn build(self) -> Result<DocumentProcessor> {
        let options = self.options.unwrap_or_default();
        if options.max_chunk_size == 0 {
            return Err(RagError::ConfigError(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(RagError::ConfigError("max_pages must be greater than zero".to_string()));
        }
        let embedding_provider =
            self.embedding_provider.unwrap_or_else(|| Arc::new(HashEmbeddingProvider::default()));
        if embedding_provider.dimensions() == 0 {
            return Err(RagError::ConfigError(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(DocumentProcessor::from_parts(options, self.max_pages, embedding_provider))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::document::ChunkType;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::EmbeddingError {
                provider: "failing".to_string(),
                message: "offline".to_string(),
            })
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn processes_markdown_end_to_end() {
        let processor = DocumentProcessor::default();
        let text = "# Title\n\nSome text here.\n\n## Section\nMore text.";
        let file = UploadedFile::markdown("notes.md", text);
        let document = processor.process(&file).await.unwrap();

        assert_eq!(document.filename, "notes.md");
        assert_eq!(document.chunks.len(), 3);
        assert_eq!(document.chunks[0].chunk_type, ChunkType::Heading);
        assert!(document.chunks[0].id.starts_with(&document.id));
        assert!(
            document
                .chunks
                .iter()
                .all(|c| c.metadata.embedding.as_ref().is_some_and(|e| e.len() == 384))
        );
        assert_eq!(document.metadata.title.as_deref(), Some("notes"));
        assert_eq!(document.metadata.document_type, "markdown");
        assert_eq!(document.metadata.chunking_strategy, "semantic");
        assert_eq!(document.metadata.language, "en");
        assert_eq!(document.hierarchy.len(), 1);
        assert_eq!(document.hierarchy[0].children[0].title, "Section");
    }

    #[tokio::test]
    async fn empty_file_yields_empty_structure() {
        let file = UploadedFile::markdown("empty.md", "");
        let document = DocumentProcessor::default().process(&file).await.unwrap();
        assert!(document.chunks.is_empty());
        assert!(document.hierarchy.is_empty());
        assert_eq!(document.metadata.total_tokens, 0);
    }

    #[tokio::test]
    async fn embedding_failure_is_a_pipeline_error() {
        let processor = DocumentProcessor::builder()
            .embedding_provider(Arc::new(FailingProvider))
            .build()
            .unwrap();
        let file = UploadedFile::markdown("a.md", "Some text");
        let err = processor.process(&file).await.unwrap_err();
        assert!(matches!(err, RagError::PipelineError(ref msg) if msg.contains("a.md")));
    }

    #[tokio::test]
    async fn process_many_keeps_input_order() {
        let files = vec![
            UploadedFile::markdown("one.md", "First file."),
            UploadedFile::markdown("two.md", "Second file."),
        ];
        let documents = DocumentProcessor::default().process_many(&files).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].filename, "one.md");
        assert_eq!(documents[1].filename, "two.md");
        assert_ne!(documents[0].id, documents[1].id);
    }

    #[test]
    fn builder_validates() {
        assert!(DocumentProcessor::builder().max_pages(0).build().is_err());
        let options = ChunkingOptions { max_chunk_size: 0, ..Default::default() };
        assert!(DocumentProcessor::builder().options(options).build().is_err());
        let processor = DocumentProcessor::builder().max_pages(3).build().unwrap();
        assert_eq!(processor.options().max_chunk_size, 1000);
    }
}
