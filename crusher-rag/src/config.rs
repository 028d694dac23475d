//! Configuration for document processing and relevance scoring.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How layout elements are grouped into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Headings open new chunks; body text accumulates up to the size limit.
    #[default]
    Semantic,
    /// Only the size limit closes a chunk.
    Fixed,
}

impl ChunkingStrategy {
    /// The lowercase name recorded in document metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::Semantic => "semantic",
            ChunkingStrategy::Fixed => "fixed",
        }
    }
}

/// Options controlling extraction and chunking of a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingOptions {
    pub chunking_strategy: ChunkingStrategy,
    /// Chunk size limit in estimated tokens (four characters per token).
    pub max_chunk_size: usize,
    /// Join elements with newlines instead of single spaces.
    pub preserve_formatting: bool,
    /// Emit image placeholders for embedded PDF images.
    pub extract_images: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunking_strategy: ChunkingStrategy::Semantic,
            max_chunk_size: 1000,
            preserve_formatting: false,
            extract_images: false,
        }
    }
}

impl ChunkingOptions {
    /// Create a new builder for constructing [`ChunkingOptions`].
    pub fn builder() -> ChunkingOptionsBuilder {
        ChunkingOptionsBuilder::default()
    }
}

/// Builder for validated [`ChunkingOptions`].
#[derive(Debug, Clone, Default)]
pub struct ChunkingOptionsBuilder {
    options: ChunkingOptions,
}

impl ChunkingOptionsBuilder {
    /// Set the chunking strategy.
    pub fn chunking_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.options.chunking_strategy = strategy;
        self
    }

    /// Set the chunk size limit in estimated tokens.
    pub fn max_chunk_size(mut self, tokens: usize) -> Self {
        self.options.max_chunk_size = tokens;
        self
    }

    /// Keep line structure when concatenating element text.
    pub fn preserve_formatting(mut self, preserve: bool) -> Self {
        self.options.preserve_formatting = preserve;
        self
    }

    /// Emit image placeholder chunks for PDF images.
    pub fn extract_images(mut self, extract: bool) -> Self {
        self.options.extract_images = extract;
        self
    }

    /// Build the options.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_chunk_size == 0`.
    pub fn build(self) -> Result<ChunkingOptions> {
        if self.options.max_chunk_size == 0 {
            return Err(RagError::ConfigError(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(self.options)
    }
}

/// Weights and bonuses used to compute relevance scores.
///
/// The defaults are empirically chosen and have not been tuned against
/// relevance-judged data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    /// Weight of the keyword score under the hybrid strategy.
    pub keyword_weight: f32,
    /// Weight of the semantic score under the hybrid strategy.
    pub semantic_weight: f32,
    /// Added per query word found verbatim in the content.
    pub exact_match: f32,
    /// Added per query word contained in (or containing) a chunk keyword.
    pub keyword_match: f32,
    /// Added per case-insensitive stem match in the content.
    pub fuzzy_match: f32,
    /// Maximum bonus for chunks at the very top of the document.
    pub position_bonus: f32,
    /// Vertical distance over which the position bonus decays to zero.
    pub position_decay: f32,
    pub heading_bonus: f32,
    pub text_bonus: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_weight: 0.6,
            semantic_weight: 0.4,
            exact_match: 0.3,
            keyword_match: 0.2,
            fuzzy_match: 0.1,
            position_bonus: 0.1,
            position_decay: 10_000.0,
            heading_bonus: 0.2,
            text_bonus: 0.1,
        }
    }
}

impl ScoringWeights {
    /// Create a new builder starting from the default weights.
    pub fn builder() -> ScoringWeightsBuilder {
        ScoringWeightsBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        let named = [
            ("keyword_weight", self.keyword_weight),
            ("semantic_weight", self.semantic_weight),
            ("exact_match", self.exact_match),
            ("keyword_match", self.keyword_match),
            ("fuzzy_match", self.fuzzy_match),
            ("position_bonus", self.position_bonus),
            ("heading_bonus", self.heading_bonus),
            ("text_bonus", self.text_bonus),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(RagError::ConfigError(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if !self.position_decay.is_finite() || self.position_decay <= 0.0 {
            return Err(RagError::ConfigError(format!(
                "position_decay must be positive, got {}",
                self.position_decay
            )));
        }
        Ok(())
    }
}

/// Builder for validated [`ScoringWeights`].
#[derive(Debug, Clone, Default)]
pub struct ScoringWeightsBuilder {
    weights: ScoringWeights,
}

impl ScoringWeightsBuilder {
    /// Set the hybrid keyword/semantic split.
    pub fn hybrid(mut self, keyword_weight: f32, semantic_weight: f32) -> Self {
        self.weights.keyword_weight = keyword_weight;
        self.weights.semantic_weight = semantic_weight;
        self
    }

    /// Set the per-word keyword scoring increments.
    pub fn keyword_increments(mut self, exact: f32, keyword: f32, fuzzy: f32) -> Self {
        self.weights.exact_match = exact;
        self.weights.keyword_match = keyword;
        self.weights.fuzzy_match = fuzzy;
        self
    }

    /// Set the maximum position bonus and the distance over which it decays.
    pub fn position_bonus(mut self, bonus: f32, decay: f32) -> Self {
        self.weights.position_bonus = bonus;
        self.weights.position_decay = decay;
        self
    }

    /// Set the bonuses for heading and text chunks.
    pub fn type_bonus(mut self, heading: f32, text: f32) -> Self {
        self.weights.heading_bonus = heading;
        self.weights.text_bonus = text;
        self
    }

    /// Build the weights.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any weight is negative or not
    /// finite, or if the position decay is not positive.
    pub fn build(self) -> Result<ScoringWeights> {
        self.weights.validate()?;
        Ok(self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_defaults() {
        let options = ChunkingOptions::default();
        assert_eq!(options.max_chunk_size, 1000);
        assert_eq!(options.chunking_strategy, ChunkingStrategy::Semantic);
        assert!(!options.preserve_formatting);
        assert!(!options.extract_images);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let result = ChunkingOptions::builder().max_chunk_size(0).build();
        assert!(matches!(result, Err(RagError::ConfigError(_))));
    }

    #[test]
    fn chunking_options_deserialize_with_defaults() {
        let options: ChunkingOptions =
            serde_json::from_str(r#"{"maxChunkSize": 200, "chunkingStrategy": "fixed"}"#).unwrap();
        assert_eq!(options.max_chunk_size, 200);
        assert_eq!(options.chunking_strategy, ChunkingStrategy::Fixed);
        assert!(!options.extract_images);
    }

    #[test]
    fn weights_reject_negative_and_nan() {
        assert!(ScoringWeights::builder().hybrid(-0.1, 0.4).build().is_err());
        assert!(ScoringWeights::builder().type_bonus(f32::NAN, 0.1).build().is_err());
        assert!(ScoringWeights::builder().position_bonus(0.1, 0.0).build().is_err());
        let weights = ScoringWeights::builder().hybrid(0.5, 0.5).build().unwrap();
        assert_eq!(weights.keyword_weight, 0.5);
        assert_eq!(weights.heading_bonus, 0.2);
    }
}
