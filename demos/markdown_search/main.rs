//! # Markdown Search Example
//!
//! Processes a markdown handbook into chunks, prints the reconstructed
//! section tree, then runs the same queries under each ranking strategy.
//!
//! Uses `HashEmbeddingProvider`, so semantic scores are placeholders and no
//! model or API key is needed.
//!
//! Run: `cargo run --example markdown_search`
//! Set `RUST_LOG=crusher_rag=debug` to see per-stage logging.

use std::sync::Arc;

use crusher_rag::{
    DocumentHierarchy, DocumentProcessor, HashEmbeddingProvider, RagQuery, RankingStrategy,
    SearchEngine, UploadedFile,
};
use tracing_subscriber::EnvFilter;

const HANDBOOK: &str = r#"# Employee Handbook

Welcome to the team. This handbook covers the policies every employee should know.

## Vacation Policy

Full-time employees accrue vacation at a rate of two days per month.
Unused vacation days carry over to the next year, up to a maximum of ten days.

### Requesting Time Off

Submit vacation requests through the HR portal at least two weeks in advance.

## Travel Expenses

Travel expenses are reimbursed within thirty days of submitting receipts.
- Economy airfare for flights under six hours
- Standard hotel rooms near the client site
- Meals up to the daily budget limit

## Remote Work

Employees may work remotely up to three days per week with manager approval.
"#;

fn print_tree(nodes: &[DocumentHierarchy], depth: usize) {
    for node in nodes {
        println!("  {}{} ({} chunks)", "  ".repeat(depth), node.title, node.chunk_ids.len());
        print_tree(&node.children, depth + 1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // -- 1. Process the document -----------------------------------------
    let processor = DocumentProcessor::builder().build()?;
    let document = processor.process(&UploadedFile::markdown("handbook.md", HANDBOOK)).await?;

    println!("Processed '{}' into {} chunks:\n", document.display_title(), document.chunks.len());
    for chunk in &document.chunks {
        let preview: String = chunk.content.chars().take(60).collect();
        println!("  [{:<7}] {preview}", chunk.chunk_type);
    }

    println!("\nSection tree:");
    print_tree(&document.hierarchy, 0);
    println!("\nDocument keywords: {}", document.metadata.keywords.join(", "));

    // -- 2. Query under each strategy ------------------------------------
    let engine = SearchEngine::new(Arc::new(HashEmbeddingProvider::default()));
    let documents = [document];
    let queries = ["vacation days carry over", "travel reimbursement receipts", "remote work"];

    for strategy in [RankingStrategy::Keyword, RankingStrategy::Hybrid] {
        println!("\n=== {strategy:?} ranking ===");
        for query in queries {
            let query = RagQuery::builder(query).ranking_strategy(strategy).max_chunks(2).build()?;
            let result = engine.search(&documents, &query).await?;
            println!(
                "\nQuery: \"{}\" ({} matches, {:.2} ms)",
                query.query, result.context.total_matches, result.context.processing_time_ms
            );
            if result.chunks.is_empty() {
                println!("  (no results)");
            }
            for (i, hit) in result.chunks.iter().enumerate() {
                println!(
                    "  {}. [score={:.3}] {}",
                    i + 1,
                    hit.relevance_score,
                    hit.chunk.metadata.summary
                );
                if let Some(after) = hit.surrounding.as_ref().and_then(|s| s.after.as_deref()) {
                    let preview: String = after.chars().take(50).collect();
                    println!("     next: {preview}...");
                }
            }
        }
    }

    println!("\nDone.");
    Ok(())
}
