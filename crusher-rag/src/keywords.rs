//! Keyword extraction and one-line summaries for chunk metadata.

use std::collections::HashMap;

/// Number of keywords kept per chunk.
pub const CHUNK_KEYWORD_LIMIT: usize = 10;
/// Number of keywords kept per document.
pub const DOCUMENT_KEYWORD_LIMIT: usize = 20;

const SUMMARY_MIN_SENTENCE_CHARS: usize = 10;
const SUMMARY_FALLBACK_CHARS: usize = 100;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "because", "been", "before", "being",
    "below", "between", "both", "could", "does", "doing", "down", "during", "each", "even",
    "from", "further", "have", "having", "here", "hers", "herself", "himself", "into", "itself",
    "just", "more", "most", "much", "must", "myself", "only", "other", "ours", "ourselves",
    "over", "same", "shall", "should", "some", "such", "than", "that", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "under", "until",
    "upon", "very", "was", "were", "what", "when", "where", "which", "while", "whom", "whose",
    "will", "with", "within", "without", "would", "your", "yours", "yourself", "yourselves",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lowercase word tokens: runs of alphanumeric characters or underscores.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// The `limit` most frequent content words of `text`.
///
/// Content words are longer than three characters and not stopwords. Words
/// are ordered by descending frequency; ties keep the order in which the
/// words first appear.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    rank_by_frequency(
        tokenize(text).filter(|w| w.chars().count() > 3 && !is_stopword(w)),
        limit,
    )
}

/// Keywords recurring most across the given per-chunk keyword lists.
pub fn document_keywords<'a>(
    chunk_keywords: impl IntoIterator<Item = &'a [String]>,
    limit: usize,
) -> Vec<String> {
    rank_by_frequency(chunk_keywords.into_iter().flatten().cloned(), limit)
}

fn rank_by_frequency(words: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, word) in words.enumerate() {
        counts.entry(word).or_insert((0, order)).0 += 1;
    }
    let mut ranked: Vec<(String, usize, usize)> =
        counts.into_iter().map(|(word, (count, first))| (word, count, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(word, _, _)| word).collect()
}

/// A short summary: the first sentence when it is longer than ten
/// characters, otherwise the first hundred characters followed by `...`.
pub fn summarize(text: &str) -> String {
    let text = text.trim();
    if let Some(end) = text.find(['.', '!', '?']) {
        let sentence = text[..=end].trim();
        if sentence.chars().count() > SUMMARY_MIN_SENTENCE_CHARS {
            return sentence.to_string();
        }
    }
    let prefix: String = text.chars().take(SUMMARY_FALLBACK_CHARS).collect();
    format!("{}...", prefix.trim_end())
}
