use clap::{Parser, Subcommand};

use docsearch_cli::init_tracing;
use docsearch_core::config::Config;
use docsearch_hybrid::{Retriever, SearchMode, Status};

/// Hybrid keyword + semantic search over an indexed documentation corpus.
#[derive(Parser)]
#[command(name = "docsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the corpus
    Search {
        query: String,
        /// Number of results (defaults to search.num_results)
        #[arg(short)]
        k: Option<usize>,
        /// Skip the dense index
        #[arg(long)]
        keyword_only: bool,
        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether the indexes load
    Status,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Command::Status => {
            let retriever = Retriever::new(settings);
            println!("{}", retriever.initialize());
        }
        Command::Search { query, k, keyword_only, json } => {
            let k = k.unwrap_or(settings.search.num_results);
            let mut retriever = Retriever::new(settings);
            if keyword_only {
                retriever = retriever.keyword_only();
            }
            if let Status::Unavailable(reason) = retriever.initialize() {
                anyhow::bail!("index unavailable ({reason}); run docsearch-indexer first");
            }
            let result = retriever.search(&query, k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.hits)?);
                return Ok(());
            }
            if result.hits.is_empty() {
                println!("No relevant documentation found.");
            }
            for (i, hit) in result.hits.iter().enumerate() {
                println!("{}. [{:.3}] {} (offset {})", i + 1, hit.score, hit.chunk.filename, hit.chunk.start);
                let preview: String = hit.chunk.content.chars().take(200).collect();
                println!("   {}", preview.replace('\n', " "));
            }
            if let SearchMode::SparseOnly { reason } = result.mode {
                if !keyword_only {
                    eprintln!("note: semantic search unavailable ({reason})");
                }
            }
        }
    }
    Ok(())
}
