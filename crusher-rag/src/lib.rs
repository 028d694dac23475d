//! # crusher-rag
//!
//! Document processing and retrieval for grounding chat answers in uploaded
//! files.
//!
//! ## Overview
//!
//! An uploaded PDF, Markdown or plain-text file goes through the pipeline:
//!
//! 1. [`ContentExtractor`] produces raw text and positioned layout elements.
//! 2. [`LayoutChunker`] groups elements into [`DocumentChunk`]s, splitting at
//!    headings and at a size limit.
//! 3. [`build_hierarchy`] reconstructs the heading tree.
//! 4. An [`EmbeddingProvider`] attaches a vector to each chunk.
//! 5. [`link_relationships`] records neighbours and keyword-related chunks.
//!
//! [`DocumentProcessor`] runs all stages and returns a [`DocumentStructure`].
//! [`SearchEngine`] ranks the chunks of one or more documents against a
//! [`RagQuery`] by keyword, semantic, or hybrid scoring.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crusher_rag::{
//!     DocumentProcessor, HashEmbeddingProvider, RagQuery, SearchEngine, UploadedFile,
//! };
//!
//! let processor = DocumentProcessor::builder().build()?;
//! let document = processor.process(&UploadedFile::from_path("handbook.md").await?).await?;
//!
//! let engine = SearchEngine::new(Arc::new(HashEmbeddingProvider::default()));
//! let result = engine.search(&[document], &RagQuery::new("vacation policy")).await?;
//! for hit in &result.chunks {
//!     println!("{:.2} {}", hit.relevance_score, hit.chunk.content);
//! }
//! ```
//!
//! [`HashEmbeddingProvider`] is a deterministic placeholder; plug in a
//! model-backed [`EmbeddingProvider`] for meaningful semantic scores.

pub mod chunking;
pub mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod hierarchy;
pub mod keywords;
pub mod pipeline;
pub mod relationships;
pub mod search;

pub use chunking::{LayoutChunker, total_tokens};
pub use collection::DocumentCollection;
pub use config::{
    ChunkingOptions, ChunkingOptionsBuilder, ChunkingStrategy, ScoringWeights,
    ScoringWeightsBuilder,
};
pub use document::{
    ChunkMetadata, ChunkRelationships, ChunkType, DocumentChunk, DocumentHierarchy,
    DocumentMetadata, DocumentStructure, FontWeight, Position, estimate_tokens,
};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use extraction::{
    ContentExtractor, ElementKind, ExtractedContent, ExtractedMetadata, FileKind, LayoutElement,
    UploadedFile,
};
pub use hierarchy::{build_hierarchy, link_parents};
pub use pipeline::{DocumentProcessor, DocumentProcessorBuilder};
pub use relationships::link_relationships;
pub use search::{
    ChunkNeighbors, DateRange, QueryFilters, QueryOptions, QueryTerms, RagQuery, RagQueryBuilder,
    RagResult, RankingStrategy, ScoredChunk, SearchContext, SearchEngine, cosine_similarity,
};
