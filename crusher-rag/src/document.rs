//! Data types for processed documents, chunks, and the section hierarchy.
//!
//! A [`DocumentStructure`] is built once per uploaded file by the
//! [`DocumentProcessor`](crate::DocumentProcessor) and is never mutated
//! afterwards. Callers own collections of them (see
//! [`DocumentCollection`](crate::DocumentCollection)); removing a document
//! simply drops the reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed extraction confidence assigned to every chunk.
pub const CHUNK_CONFIDENCE: f32 = 0.95;

/// The structural kind of a [`DocumentChunk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    #[default]
    Text,
    Heading,
    List,
    Code,
    Table,
    Image,
}

impl ChunkType {
    /// The lowercase wire name of this chunk type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Heading => "heading",
            ChunkType::List => "list",
            ChunkType::Code => "code",
            ChunkType::Table => "table",
            ChunkType::Image => "image",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Font weight of the element a chunk starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// An axis-aligned bounding box. `y` grows downwards through the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Position {
    /// Create a new bounding box.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Position) -> Position {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Position { x: left, y: top, width: right - left, height: bottom - top }
    }
}

/// Positional, typographic and semantic metadata attached to a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    /// Heading level (1-6), only set for heading chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<u8>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
    /// Most frequent content words, most frequent first.
    pub keywords: Vec<String>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Sequential and topical links between chunks of the same document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRelationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// At most five ids of chunks sharing two or more keywords. Never contains
    /// the chunk's own id.
    pub contextually_related: Vec<String>,
}

/// A contiguous, classified unit of extracted document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    /// Identifier, unique within the owning document.
    pub id: String,
    /// Trimmed text content.
    pub content: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub metadata: ChunkMetadata,
    /// Id of the heading chunk of the enclosing section, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Ids of the chunks nested under this one. Only heading chunks have children.
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub relationships: ChunkRelationships,
}

impl DocumentChunk {
    /// Whether this chunk opens a section.
    pub fn is_heading(&self) -> bool {
        self.chunk_type == ChunkType::Heading
    }
}

/// A heading-rooted node of the reconstructed section tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHierarchy {
    pub id: String,
    /// Heading level, 1 (outermost) through 6.
    pub level: u8,
    /// Heading text with its leading `#` markers stripped.
    pub title: String,
    /// The heading chunk itself followed by the body chunks of this section.
    pub chunk_ids: Vec<String>,
    pub children: Vec<DocumentHierarchy>,
}

impl DocumentHierarchy {
    /// Depth-first iterator over this node and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentHierarchy> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// Document-level metadata gathered during processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Up to twenty keywords that recur most across chunks.
    pub keywords: Vec<String>,
    pub language: String,
    /// `pdf`, `markdown` or `text`.
    pub document_type: String,
    pub processing_timestamp: DateTime<Utc>,
    pub chunking_strategy: String,
    /// Estimated token count over all chunk contents.
    pub total_tokens: usize,
}

/// The processed-document aggregate handed to search and prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStructure {
    pub id: String,
    pub filename: String,
    pub total_pages: u32,
    pub chunks: Vec<DocumentChunk>,
    pub hierarchy: Vec<DocumentHierarchy>,
    pub metadata: DocumentMetadata,
}

impl DocumentStructure {
    /// Look up a chunk by id.
    pub fn chunk(&self, id: &str) -> Option<&DocumentChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// The title if one was found, otherwise the filename.
    pub fn display_title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or(&self.filename)
    }
}

/// Token estimate used for chunk sizing and document totals: one token per
/// four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
