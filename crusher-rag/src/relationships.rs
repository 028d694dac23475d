//! Sequential and topical links between the chunks of one document.

use std::collections::HashSet;

use crate::document::{ChunkRelationships, DocumentChunk};

/// Maximum number of contextually related chunks per chunk.
pub const MAX_RELATED: usize = 5;
/// Minimum number of shared keywords for two chunks to be related.
pub const MIN_SHARED_KEYWORDS: usize = 2;

/// Populate `relationships` on every chunk.
///
/// `before`/`after` link each chunk to its neighbours in extraction order.
/// `contextually_related` lists, in document order, the first
/// [`MAX_RELATED`] other chunks sharing at least [`MIN_SHARED_KEYWORDS`]
/// keywords.
pub fn link_relationships(chunks: &mut [DocumentChunk]) {
    let relationships: Vec<ChunkRelationships> = {
        let keyword_sets: Vec<HashSet<&str>> = chunks
            .iter()
            .map(|c| c.metadata.keywords.iter().map(String::as_str).collect())
            .collect();
        let shares_keywords = |i: usize, j: usize| {
            keyword_sets[i].intersection(&keyword_sets[j]).count() >= MIN_SHARED_KEYWORDS
        };

        (0..chunks.len())
            .map(|i| ChunkRelationships {
                before: i.checked_sub(1).map(|p| chunks[p].id.clone()),
                after: chunks.get(i + 1).map(|n| n.id.clone()),
                contextually_related: (0..chunks.len())
                    .filter(|&j| j != i && chunks[j].id != chunks[i].id && shares_keywords(i, j))
                    .take(MAX_RELATED)
                    .map(|j| chunks[j].id.clone())
                    .collect(),
            })
            .collect()
    };

    for (chunk, links) in chunks.iter_mut().zip(relationships) {
        chunk.relationships = links;
    }
}
