//! # Search Files Example
//!
//! Processes PDF, markdown or text files from disk into a shared
//! `DocumentCollection` and prints the ranked results as JSON.
//!
//! Run: `cargo run --example search_files -- README.md notes.pdf --query "install steps"`

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use crusher_rag::{
    ChunkingOptions, ChunkingStrategy, DocumentCollection, DocumentProcessor,
    HashEmbeddingProvider, RagQuery, RankingStrategy, SearchEngine, UploadedFile,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Keyword,
    Semantic,
    Hybrid,
}

impl From<Strategy> for RankingStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Keyword => RankingStrategy::Keyword,
            Strategy::Semantic => RankingStrategy::Semantic,
            Strategy::Hybrid => RankingStrategy::Hybrid,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Process documents and search them")]
struct Args {
    /// Files to process (.pdf, .md, .txt)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Free-text query
    #[arg(short, long)]
    query: String,

    #[arg(long, value_enum, default_value = "hybrid")]
    strategy: Strategy,

    /// Maximum number of results
    #[arg(long, default_value_t = 5)]
    max_chunks: usize,

    /// Minimum relevance score
    #[arg(long, default_value_t = 0.3)]
    threshold: f32,

    /// Chunk size limit in estimated tokens
    #[arg(long, default_value_t = 1000)]
    max_chunk_size: usize,

    /// Split by size only, ignoring headings
    #[arg(long)]
    fixed: bool,

    /// Stop reading PDFs after this many pages
    #[arg(long)]
    max_pages: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let strategy = if args.fixed { ChunkingStrategy::Fixed } else { ChunkingStrategy::Semantic };
    let options = ChunkingOptions::builder()
        .chunking_strategy(strategy)
        .max_chunk_size(args.max_chunk_size)
        .build()?;
    let mut builder = DocumentProcessor::builder().options(options);
    if let Some(max_pages) = args.max_pages {
        builder = builder.max_pages(max_pages);
    }
    let processor = builder.build()?;

    let mut uploads = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match UploadedFile::from_path(path).await {
            Ok(file) => uploads.push(file),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }

    let collection = DocumentCollection::new();
    for document in processor.process_many(&uploads).await? {
        info!(file = %document.filename, chunks = document.chunks.len(), "indexed");
        collection.add(document).await;
    }

    let query = RagQuery::builder(args.query)
        .ranking_strategy(args.strategy.into())
        .max_chunks(args.max_chunks)
        .similarity_threshold(args.threshold)
        .build()?;
    let engine = SearchEngine::new(Arc::new(HashEmbeddingProvider::default()));
    let result = collection.search(&engine, &query).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
