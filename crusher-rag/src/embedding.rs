//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// Dimensionality of [`HashEmbeddingProvider`] vectors.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// A provider that generates vector embeddings from text input.
///
/// Implementations must return vectors of exactly [`dimensions`] values for
/// every input, and must be deterministic for a given input when used in
/// tests. Swapping the provider never requires changes to scoring: the
/// search engine only compares vectors by cosine similarity.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
///
/// # Example
///
/// ```rust,ignore
/// use crusher_rag::{EmbeddingProvider, HashEmbeddingProvider};
///
/// let provider = HashEmbeddingProvider::default();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Deterministic placeholder embeddings derived from a rolling text hash.
///
/// The hash is `h = h * 31 + unit` over the UTF-16 code units of the text,
/// wrapped to 32 bits; component `i` is `(sin(h + i) + 1) / 2`. Equal texts
/// always map to equal vectors, which keeps tests reproducible, but the
/// vectors carry no semantic meaning. Substitute a model-backed provider
/// for real relevance.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of the given length.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Compute the embedding synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let hash = text
            .encode_utf16()
            .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(i32::from(unit)));
        (0..self.dimensions)
            .map(|i| ((((f64::from(hash) + i as f64).sin()) + 1.0) / 2.0) as f32)
            .collect()
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
