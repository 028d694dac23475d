//! In-memory set of processed documents.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::document::DocumentStructure;
use crate::error::Result;
use crate::search::{RagQuery, RagResult, SearchEngine};

#[derive(Debug, Default)]
struct Entries {
    documents: HashMap<String, DocumentStructure>,
    order: Vec<String>,
}

impl Entries {
    fn ordered(&self) -> Vec<DocumentStructure> {
        self.order.iter().filter_map(|id| self.documents.get(id)).cloned().collect()
    }
}

/// Caller-owned store of [`DocumentStructure`]s keyed by document id.
///
/// Safe to share across tasks behind an `Arc`. Iteration order is insertion
/// order; replacing a document keeps its original slot.
#[derive(Debug, Default)]
pub struct DocumentCollection {
    inner: RwLock<Entries>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, replacing any document with the same id.
    ///
    /// Returns the replaced document, if any.
    pub async fn add(&self, document: DocumentStructure) -> Option<DocumentStructure> {
        let mut entries = self.inner.write().await;
        let id = document.id.clone();
        let previous = entries.documents.insert(id.clone(), document);
        let replaced = previous.is_some();
        if !replaced {
            entries.order.push(id.clone());
        }
        debug!(document.id = %id, replaced, "added document");
        previous
    }

    /// Remove and return a document.
    pub async fn remove(&self, id: &str) -> Option<DocumentStructure> {
        let mut entries = self.inner.write().await;
        let removed = entries.documents.remove(id);
        if removed.is_some() {
            entries.order.retain(|existing| existing != id);
        }
        removed
    }

    /// A copy of the document with `id`.
    pub async fn get(&self, id: &str) -> Option<DocumentStructure> {
        self.inner.read().await.documents.get(id).cloned()
    }

    /// Document ids in insertion order.
    pub async fn ids(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.order.is_empty()
    }

    /// Search every document in the collection.
    ///
    /// Documents are snapshotted before searching, so the lock is not held
    /// while the query is embedded.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`SearchEngine::search`].
    pub async fn search(&self, engine: &SearchEngine, query: &RagQuery) -> Result<RagResult> {
        let documents = self.inner.read().await.ordered();
        engine.search(&documents, query).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use crate::extraction::UploadedFile;
    use crate::pipeline::DocumentProcessor;
    use crate::search::RankingStrategy;

    async fn process(name: &str, text: &str) -> DocumentStructure {
        DocumentProcessor::default().process(&UploadedFile::markdown(name, text)).await.unwrap()
    }

    #[tokio::test]
    async fn add_replace_remove() {
        let collection = DocumentCollection::new();
        let a = process("a.md", "Alpha text.").await;
        let b = process("b.md", "Beta text.").await;
        let a_id = a.id.clone();

        assert!(collection.add(a.clone()).await.is_none());
        assert!(collection.add(b.clone()).await.is_none());
        assert_eq!(collection.ids().await, vec![a_id.clone(), b.id.clone()]);

        let mut renamed = a.clone();
        renamed.filename = "renamed.md".to_string();
        assert!(collection.add(renamed).await.is_some());
        assert_eq!(collection.len().await, 2);
        assert_eq!(collection.ids().await[0], a_id);
        assert_eq!(collection.get(&a_id).await.unwrap().filename, "renamed.md");

        assert!(collection.remove(&a_id).await.is_some());
        assert!(collection.remove(&a_id).await.is_none());
        assert_eq!(collection.ids().await, vec![b.id]);
        assert!(!collection.is_empty().await);
    }

    #[tokio::test]
    async fn search_spans_all_documents() {
        let collection = DocumentCollection::new();
        collection.add(process("geo.md", "The capital of France is Paris.").await).await;
        collection.add(process("fruit.md", "Bananas are yellow.").await).await;

        let engine = SearchEngine::new(Arc::new(HashEmbeddingProvider::default()));
        let query = RagQuery::builder("capital France")
            .ranking_strategy(RankingStrategy::Keyword)
            .build()
            .unwrap();
        let result = collection.search(&engine, &query).await.unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].chunk.content.contains("Paris"));
        assert_eq!(result.context.document_title, "Multiple documents");
    }
}
