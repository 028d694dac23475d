//! Relevance search across processed documents.
//!
//! [`SearchEngine`] scores every candidate chunk by keyword overlap, cosine
//! similarity of embeddings, position in the document and chunk type, then
//! filters by threshold, ranks and truncates. Search is read-only: the engine
//! holds no mutable state and may serve concurrent requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crusher_rag::{HashEmbeddingProvider, RagQuery, RankingStrategy, SearchEngine};
//!
//! let engine = SearchEngine::new(Arc::new(HashEmbeddingProvider::default()));
//! let query = RagQuery::builder("capital France")
//!     .ranking_strategy(RankingStrategy::Keyword)
//!     .max_chunks(3)
//!     .build()?;
//! let result = engine.search(&documents, &query).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::ScoringWeights;
use crate::document::{ChunkType, DocumentChunk, DocumentStructure};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// How keyword and semantic scores are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingStrategy {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
}

impl RankingStrategy {
    fn uses_embeddings(&self) -> bool {
        !matches!(self, RankingStrategy::Keyword)
    }
}

/// Inclusive bounds on a document's processing timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| *timestamp >= start)
            && self.end.is_none_or(|end| *timestamp <= end)
    }
}

/// Inclusion filters. An absent or empty list does not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_types: Option<Vec<ChunkType>>,
    /// Keep chunks having at least one of these keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl QueryFilters {
    fn admits_document(&self, document: &DocumentStructure) -> bool {
        let id_ok = match self.document_ids.as_deref() {
            Some(ids) if !ids.is_empty() => ids.iter().any(|id| *id == document.id),
            _ => true,
        };
        id_ok
            && self
                .date_range
                .as_ref()
                .is_none_or(|range| range.contains(&document.metadata.processing_timestamp))
    }

    fn admits_chunk(&self, chunk: &DocumentChunk) -> bool {
        let type_ok = match self.chunk_types.as_deref() {
            Some(types) if !types.is_empty() => types.contains(&chunk.chunk_type),
            _ => true,
        };
        let keyword_ok = match self.keywords.as_deref() {
            Some(wanted) if !wanted.is_empty() => wanted.iter().any(|w| {
                let w = w.trim().to_lowercase();
                chunk.metadata.keywords.iter().any(|k| *k == w)
            }),
            _ => true,
        };
        type_ok && keyword_ok
    }
}

/// Result shaping options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    pub max_chunks: usize,
    /// Minimum relevance score in `[0, 1]`. Values above 1 match nothing.
    pub similarity_threshold: f32,
    /// Attach the content of each result's neighbouring chunks.
    pub include_context: bool,
    pub ranking_strategy: RankingStrategy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_chunks: 5,
            similarity_threshold: 0.3,
            include_context: true,
            ranking_strategy: RankingStrategy::Hybrid,
        }
    }
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQuery {
    pub query: String,
    #[serde(default)]
    pub filters: QueryFilters,
    #[serde(default)]
    pub options: QueryOptions,
}

impl RagQuery {
    /// A query with default options and no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: QueryFilters::default(),
            options: QueryOptions::default(),
        }
    }

    /// Create a new builder for constructing a [`RagQuery`].
    pub fn builder(query: impl Into<String>) -> RagQueryBuilder {
        RagQueryBuilder { query: Self::new(query) }
    }
}

/// Builder for validated [`RagQuery`] values.
#[derive(Debug, Clone)]
pub struct RagQueryBuilder {
    query: RagQuery,
}

impl RagQueryBuilder {
    /// Only search the documents with these ids.
    pub fn document_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.filters.document_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Only search chunks of these types.
    pub fn chunk_types(mut self, types: impl IntoIterator<Item = ChunkType>) -> Self {
        self.query.filters.chunk_types = Some(types.into_iter().collect());
        self
    }

    /// Only search chunks having at least one of these keywords.
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.filters.keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Only search documents processed within the given bounds.
    pub fn date_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.query.filters.date_range = Some(DateRange { start, end });
        self
    }

    /// Set the maximum number of results.
    pub fn max_chunks(mut self, max: usize) -> Self {
        self.query.options.max_chunks = max;
        self
    }

    /// Set the minimum relevance score.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.query.options.similarity_threshold = threshold;
        self
    }

    /// Attach neighbouring chunk content to results.
    pub fn include_context(mut self, include: bool) -> Self {
        self.query.options.include_context = include;
        self
    }

    /// Set the ranking strategy.
    pub fn ranking_strategy(mut self, strategy: RankingStrategy) -> Self {
        self.query.options.ranking_strategy = strategy;
        self
    }

    /// Build the query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_chunks == 0` or the
    /// threshold is NaN.
    pub fn build(self) -> Result<RagQuery> {
        if self.query.options.max_chunks == 0 {
            return Err(RagError::ConfigError("max_chunks must be greater than zero".to_string()));
        }
        if self.query.options.similarity_threshold.is_nan() {
            return Err(RagError::ConfigError("similarity_threshold must be a number".to_string()));
        }
        Ok(self.query)
    }
}

/// Content of the chunks adjacent to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkNeighbors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// A chunk returned by search together with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f32,
    /// Id of the document the chunk belongs to.
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surrounding: Option<ChunkNeighbors>,
}

/// Summary information about a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    pub document_title: String,
    /// Chunks that passed the threshold, before truncation to `max_chunks`.
    pub total_matches: usize,
    pub search_strategy: RankingStrategy,
    pub processing_time_ms: f64,
}

/// The ranked output of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub chunks: Vec<ScoredChunk>,
    pub context: SearchContext,
}

impl RagResult {
    fn empty(documents: &[DocumentStructure], strategy: RankingStrategy, started: Instant) -> Self {
        Self {
            chunks: Vec::new(),
            context: SearchContext {
                document_title: collection_title(documents),
                total_matches: 0,
                search_strategy: strategy,
                processing_time_ms: elapsed_ms(started),
            },
        }
    }

    /// Whether no chunk matched.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Cosine similarity of two vectors; 0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A query split into scoring terms, compiled once per search.
#[derive(Debug)]
pub struct QueryTerms {
    words: Vec<String>,
    stems: Vec<Option<Regex>>,
}

impl QueryTerms {
    /// Lowercase words longer than two characters, with surrounding
    /// punctuation removed. Each word also gets a case-insensitive matcher
    /// for the word minus its last character.
    pub fn parse(query: &str) -> Self {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > 2)
            .collect();
        let stems = words
            .iter()
            .map(|word| {
                let mut stem = word.clone();
                stem.pop();
                RegexBuilder::new(&regex::escape(&stem)).case_insensitive(true).build().ok()
            })
            .collect();
        Self { words, stems }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Ranks chunks of processed documents against free-text queries.
///
/// Construct one per configuration and share it; it holds no mutable state.
#[derive(Clone)]
pub struct SearchEngine {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    weights: ScoringWeights,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("dimensions", &self.embedding_provider.dimensions())
            .field("weights", &self.weights)
            .finish()
    }
}

impl SearchEngine {
    /// Create an engine with the default [`ScoringWeights`].
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedding_provider, weights: ScoringWeights::default() }
    }

    /// Replace the scoring weights.
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Return a reference to the scoring weights.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Search `documents` for chunks relevant to `query`.
    ///
    /// The query is embedded for semantic and hybrid ranking, as is any
    /// candidate chunk without a stored embedding. An empty document set or
    /// a blank query yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the embedding provider fails.
    pub async fn search(
        &self,
        documents: &[DocumentStructure],
        query: &RagQuery,
    ) -> Result<RagResult> {
        let started = Instant::now();
        let strategy = query.options.ranking_strategy;
        if documents.is_empty() || query.query.trim().is_empty() {
            return Ok(RagResult::empty(documents, strategy, started));
        }

        let mut generated = HashMap::new();
        let query_embedding = if strategy.uses_embeddings() {
            let embedding = self.embedding_provider.embed(&query.query).await.map_err(|e| {
                error!(error = %e, "embedding failed during search");
                RagError::PipelineError(format!("query embedding failed: {e}"))
            })?;

            let missing: Vec<((usize, usize), &str)> = candidates(documents, query)
                .filter(|(_, _, chunk)| chunk.metadata.embedding.is_none())
                .map(|(d, c, chunk)| ((d, c), chunk.content.as_str()))
                .collect();
            if !missing.is_empty() {
                debug!(count = missing.len(), "embedding chunks without stored vectors");
                let texts: Vec<&str> = missing.iter().map(|(_, text)| *text).collect();
                let vectors = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                    error!(error = %e, "chunk embedding failed during search");
                    RagError::PipelineError(format!("chunk embedding failed: {e}"))
                })?;
                generated = missing.into_iter().map(|(key, _)| key).zip(vectors).collect();
            }
            Some(embedding)
        } else {
            None
        };

        Ok(self.select(documents, query, query_embedding.as_deref(), &generated, started))
    }

    /// Rank without calling the embedding provider.
    ///
    /// Chunks are compared against `query_embedding` using their stored
    /// embeddings; chunks without one get a semantic score of 0.
    pub fn rank(
        &self,
        documents: &[DocumentStructure],
        query: &RagQuery,
        query_embedding: Option<&[f32]>,
    ) -> RagResult {
        let started = Instant::now();
        if documents.is_empty() || query.query.trim().is_empty() {
            return RagResult::empty(documents, query.options.ranking_strategy, started);
        }
        self.select(documents, query, query_embedding, &HashMap::new(), started)
    }

    fn select(
        &self,
        documents: &[DocumentStructure],
        query: &RagQuery,
        query_embedding: Option<&[f32]>,
        generated: &HashMap<(usize, usize), Vec<f32>>,
        started: Instant,
    ) -> RagResult {
        let options = &query.options;
        let terms = QueryTerms::parse(&query.query);

        let mut scored: Vec<(usize, usize, f32)> = Vec::new();
        let mut candidate_count = 0;
        for (d, c, chunk) in candidates(documents, query) {
            candidate_count += 1;
            let chunk_embedding = chunk
                .metadata
                .embedding
                .as_deref()
                .or_else(|| generated.get(&(d, c)).map(Vec::as_slice));
            let score = self.relevance_score(
                &terms,
                chunk,
                query_embedding,
                chunk_embedding,
                options.ranking_strategy,
            );
            if score >= options.similarity_threshold {
                scored.push((d, c, score));
            }
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        let total_matches = scored.len();
        scored.truncate(options.max_chunks);

        let chunks: Vec<ScoredChunk> = scored
            .into_iter()
            .map(|(d, c, score)| {
                let document = &documents[d];
                let chunk = &document.chunks[c];
                ScoredChunk {
                    chunk: chunk.clone(),
                    relevance_score: score,
                    document_id: document.id.clone(),
                    surrounding: options.include_context.then(|| ChunkNeighbors {
                        before: neighbor_content(document, chunk.relationships.before.as_deref()),
                        after: neighbor_content(document, chunk.relationships.after.as_deref()),
                    }),
                }
            })
            .collect();

        let processing_time_ms = elapsed_ms(started);
        info!(
            candidates = candidate_count,
            total_matches,
            returned = chunks.len(),
            strategy = ?options.ranking_strategy,
            processing_time_ms,
            "search completed"
        );

        RagResult {
            chunks,
            context: SearchContext {
                document_title: collection_title(documents),
                total_matches,
                search_strategy: options.ranking_strategy,
                processing_time_ms,
            },
        }
    }

    /// Keyword score of `chunk` in `[0, 1]`.
    ///
    /// Per query word: the exact-match increment if the word occurs in the
    /// content, the keyword increment if a chunk keyword contains it or is
    /// contained by it, and the fuzzy increment per case-insensitive match of
    /// the word minus its last character. The sum is divided by the number
    /// of query words and capped at 1.
    pub fn keyword_score(&self, terms: &QueryTerms, chunk: &DocumentChunk) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let content = chunk.content.to_lowercase();
        let w = &self.weights;
        let mut score = 0.0;
        for (word, stem) in terms.words.iter().zip(&terms.stems) {
            if content.contains(word.as_str()) {
                score += w.exact_match;
            }
            if chunk
                .metadata
                .keywords
                .iter()
                .any(|k| k.contains(word.as_str()) || word.contains(k.as_str()))
            {
                score += w.keyword_match;
            }
            if let Some(stem) = stem {
                score += w.fuzzy_match * stem.find_iter(&chunk.content).count() as f32;
            }
        }
        (score / terms.words.len() as f32).min(1.0)
    }

    /// Bonus favouring chunks near the top of the document.
    pub fn position_bonus(&self, chunk: &DocumentChunk) -> f32 {
        let w = &self.weights;
        (1.0 - chunk.metadata.position.y / w.position_decay).max(0.0) * w.position_bonus
    }

    /// Bonus by chunk type.
    pub fn type_bonus(&self, chunk: &DocumentChunk) -> f32 {
        match chunk.chunk_type {
            ChunkType::Heading => self.weights.heading_bonus,
            ChunkType::Text => self.weights.text_bonus,
            ChunkType::List | ChunkType::Code | ChunkType::Table | ChunkType::Image => 0.0,
        }
    }

    /// Combined relevance score in `[0, 1]`.
    pub fn relevance_score(
        &self,
        terms: &QueryTerms,
        chunk: &DocumentChunk,
        query_embedding: Option<&[f32]>,
        chunk_embedding: Option<&[f32]>,
        strategy: RankingStrategy,
    ) -> f32 {
        let semantic = || match (query_embedding, chunk_embedding) {
            (Some(q), Some(c)) => cosine_similarity(q, c),
            _ => 0.0,
        };
        let w = &self.weights;
        let base = match strategy {
            RankingStrategy::Keyword => self.keyword_score(terms, chunk),
            RankingStrategy::Semantic => semantic(),
            RankingStrategy::Hybrid => {
                w.keyword_weight * self.keyword_score(terms, chunk) + w.semantic_weight * semantic()
            }
        };
        let score = base + self.position_bonus(chunk) + self.type_bonus(chunk);
        if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
    }
}

/// Candidate chunks with their document and chunk indices.
fn candidates<'a>(
    documents: &'a [DocumentStructure],
    query: &'a RagQuery,
) -> impl Iterator<Item = (usize, usize, &'a DocumentChunk)> + 'a {
    documents
        .iter()
        .enumerate()
        .filter(|(_, document)| query.filters.admits_document(document))
        .flat_map(|(d, document)| {
            document.chunks.iter().enumerate().map(move |(c, chunk)| (d, c, chunk))
        })
        .filter(|(_, _, chunk)| query.filters.admits_chunk(chunk))
}

fn neighbor_content(document: &DocumentStructure, id: Option<&str>) -> Option<String> {
    id.and_then(|id| document.chunk(id)).map(|c| c.content.clone())
}

fn collection_title(documents: &[DocumentStructure]) -> String {
    match documents {
        [] => String::new(),
        [single] => single.display_title().to_string(),
        _ => "Multiple documents".to_string(),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
