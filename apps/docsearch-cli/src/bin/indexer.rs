use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use docsearch_cli::init_tracing;
use docsearch_core::chunker::{Chunker, ChunkingConfig, CommandSectioner, HeadingSectioner};
use docsearch_core::config::{Config, Sectioning};
use docsearch_core::corpus;
use docsearch_core::data_processor::DataProcessor;
use docsearch_embed::get_default_embedder;
use docsearch_vector::embed_corpus;

#[derive(Clone, Copy, ValueEnum)]
enum SectioningArg {
    Off,
    Headings,
    Command,
}

/// Chunk a markdown directory and write the corpus and embedding artifacts.
#[derive(Parser)]
#[command(name = "docsearch-indexer", version)]
struct Args {
    /// Directory of .md/.mdx files (defaults to data.docs_dir)
    dir: Option<PathBuf>,
    #[arg(long)]
    window: Option<usize>,
    #[arg(long)]
    step: Option<usize>,
    /// Only read the first N files
    #[arg(long)]
    limit: Option<usize>,
    /// Write the corpus only; search will be keyword-only
    #[arg(long)]
    no_embed: bool,
    #[arg(long, value_enum)]
    sectioning: Option<SectioningArg>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = Config::load()?.settings()?;
    if let Some(w) = args.window {
        settings.chunking.window_size = w;
    }
    if let Some(s) = args.step {
        settings.chunking.step_size = s;
    }
    if let Some(s) = args.sectioning {
        settings.chunking.sectioning = match s {
            SectioningArg::Off => Sectioning::Off,
            SectioningArg::Headings => Sectioning::Headings,
            SectioningArg::Command => Sectioning::Command,
        };
    }

    let data_dir = args.dir.unwrap_or_else(|| settings.data.docs_dir.clone());
    info!(dir = %data_dir.display(), "loading documents");
    let processor = DataProcessor::new();
    let docs = match args.limit {
        Some(limit) => processor.load_directory_limited(&data_dir, limit),
        None => processor.load_directory(&data_dir),
    }
    .with_context(|| format!("reading documents from {}", data_dir.display()))?;

    let chunker = Chunker::new(ChunkingConfig::from(&settings.chunking))?;
    let chunker = match settings.chunking.sectioning {
        Sectioning::Off => chunker,
        Sectioning::Headings => chunker.with_sectioner(Arc::new(HeadingSectioner)),
        Sectioning::Command => {
            let sectioner = CommandSectioner::new(&settings.chunking.section_command)?
                .with_timeout(Duration::from_millis(settings.chunking.section_timeout_ms));
            chunker.with_sectioner(Arc::new(sectioner))
        }
    };
    let batch = chunker.chunk(&docs);
    corpus::save(&settings.data.corpus_path, &batch.chunks)
        .with_context(|| format!("writing corpus to {}", settings.data.corpus_path.display()))?;

    let embeddings_path = &settings.data.embeddings_path;
    let mut embedded = false;
    if !args.no_embed && !batch.chunks.is_empty() {
        let result = get_default_embedder(&settings.embedding)
            .and_then(|e| embed_corpus(e.as_ref(), &batch.chunks, settings.embedding.batch_size).map_err(anyhow::Error::from));
        match result {
            Ok(matrix) => {
                matrix.save(embeddings_path)?;
                embedded = true;
            }
            Err(e) => warn!(error = %e, "embedding failed, continuing with keyword search only"),
        }
    }
    if !embedded && embeddings_path.exists() {
        fs::remove_file(embeddings_path)?;
        info!(path = %embeddings_path.display(), "removed stale embedding artifact");
    }

    println!("Documents: {}", docs.len());
    println!("Chunks:    {}", batch.chunks.len());
    if !batch.skipped.is_empty() {
        println!("Skipped {} empty documents", batch.skipped.len());
    }
    if !batch.fallbacks.is_empty() {
        println!("{} documents fell back to sliding-window chunking", batch.fallbacks.len());
    }
    println!("Corpus:     {}", settings.data.corpus_path.display());
    if embedded {
        println!("Embeddings: {}", embeddings_path.display());
    } else {
        println!("Embeddings: none (keyword search only)");
    }
    Ok(())
}
