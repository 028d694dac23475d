//! Grouping layout elements into chunks.
//!
//! [`LayoutChunker`] walks the extracted [`LayoutElement`]s in order and
//! accumulates them into a current chunk. A new chunk starts when:
//!
//! - the element is a heading (semantic strategy only),
//! - the previous chunk is a level-1 heading, which always stands alone as the
//!   document or part title (semantic strategy only), or
//! - the accumulated content already exceeds `max_chunk_size` estimated tokens.
//!
//! Finalized chunks carry the union bounding box of their elements, the font
//! of their first element, keywords and a summary. Relationships, parents and
//! embeddings are attached by later pipeline stages.

use crate::config::{ChunkingOptions, ChunkingStrategy};
use crate::document::{
    CHUNK_CONFIDENCE, ChunkMetadata, ChunkRelationships, DocumentChunk, estimate_tokens,
};
use crate::extraction::{ElementKind, ExtractedContent, LayoutElement};
use crate::keywords::{CHUNK_KEYWORD_LIMIT, extract_keywords, summarize};

/// Splits extracted layout elements into [`DocumentChunk`]s.
///
/// Chunk IDs are generated as `{document_id}_chunk_{index}`.
///
/// # Example
///
/// ```rust,ignore
/// use crusher_rag::{ChunkingOptions, LayoutChunker};
///
/// let chunker = LayoutChunker::new(ChunkingOptions::default());
/// let chunks = chunker.chunk(&extracted, "doc-1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayoutChunker {
    options: ChunkingOptions,
}

impl LayoutChunker {
    /// Create a chunker with the given options.
    pub fn new(options: ChunkingOptions) -> Self {
        Self { options }
    }

    /// The options this chunker was built with.
    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Split `extracted` into chunks. No elements means no chunks.
    pub fn chunk(&self, extracted: &ExtractedContent, document_id: &str) -> Vec<DocumentChunk> {
        let mut groups: Vec<Vec<&LayoutElement>> = Vec::new();
        let mut current: Vec<&LayoutElement> = Vec::new();
        let mut current_chars = 0;

        for element in &extracted.layout_elements {
            if !current.is_empty() && self.starts_new_chunk(&current, current_chars, element) {
                groups.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            current_chars += element.content.chars().count() + 1;
            current.push(element);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        groups
            .into_iter()
            .enumerate()
            .map(|(index, elements)| {
                self.finalize(&elements, format!("{document_id}_chunk_{index}"))
            })
            .collect()
    }

    fn starts_new_chunk(
        &self,
        current: &[&LayoutElement],
        current_chars: usize,
        element: &LayoutElement,
    ) -> bool {
        // ceil(chars / 4) > max  <=>  chars > 4 * max
        if current_chars > self.options.max_chunk_size.saturating_mul(4) {
            return true;
        }
        match self.options.chunking_strategy {
            ChunkingStrategy::Fixed => false,
            ChunkingStrategy::Semantic => {
                matches!(element.kind, ElementKind::Heading { .. })
                    || matches!(current[0].kind, ElementKind::Heading { level: 1 })
            }
        }
    }

    fn finalize(&self, elements: &[&LayoutElement], id: String) -> DocumentChunk {
        let separator = if self.options.preserve_formatting { "\n" } else { " " };
        let content = elements
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join(separator)
            .trim()
            .to_string();

        let first = elements[0];
        let position =
            elements.iter().skip(1).fold(first.position, |acc, e| acc.union(&e.position));

        DocumentChunk {
            id,
            chunk_type: first.kind.chunk_type(),
            metadata: ChunkMetadata {
                page: Some(first.page),
                position,
                font_size: Some(first.font_size),
                font_weight: Some(first.font_weight),
                hierarchy: first.kind.heading_level(),
                confidence: CHUNK_CONFIDENCE,
                keywords: extract_keywords(&content, CHUNK_KEYWORD_LIMIT),
                summary: summarize(&content),
                embedding: None,
            },
            content,
            parent: None,
            children: Vec::new(),
            relationships: ChunkRelationships::default(),
        }
    }
}

/// Estimated token count of all chunk contents.
pub fn total_tokens(chunks: &[DocumentChunk]) -> usize {
    chunks.iter().map(|c| estimate_tokens(&c.content)).sum()
}
