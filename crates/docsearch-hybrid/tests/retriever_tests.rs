use std::path::Path;
use std::sync::Arc;

use docsearch_core::chunker::chunk_documents;
use docsearch_core::config::Settings;
use docsearch_core::corpus;
use docsearch_core::types::{Document, Fusion};
use docsearch_embed::HashEmbedder;
use docsearch_hybrid::facade::{NOT_INITIALIZED, NO_RESULTS};
use docsearch_hybrid::{Retriever, SearchMode, Status};
use docsearch_vector::embed_corpus;

fn settings_in(dir: &Path) -> Settings {
    let mut s = Settings::default();
    s.data.corpus_path = dir.join("chunks.json");
    s.data.embeddings_path = dir.join("embeddings.npy");
    s
}

fn write_corpus(dir: &Path, docs: &[Document]) -> Vec<docsearch_core::types::Chunk> {
    let chunks = chunk_documents(docs, 2000, 1000).unwrap().chunks;
    corpus::save(&dir.join("chunks.json"), &chunks).unwrap();
    chunks
}

fn docs() -> Vec<Document> {
    vec![
        Document::new("install.md", "Install the toolkit with cargo install and run the setup wizard."),
        Document::new("faq.md", "Frequently asked questions about licensing and support."),
    ]
}

#[test]
fn missing_corpus_yields_diagnostic_not_panic() {
    let dir = tempfile::tempdir().unwrap();
    let r = Retriever::new(settings_in(dir.path()));
    assert!(matches!(r.initialize(), Status::Unavailable(_)));
    assert_eq!(r.text_search("install"), NOT_INITIALIZED);
}

#[test]
fn malformed_corpus_is_reported_as_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chunks.json"), "{ not json").unwrap();
    let r = Retriever::new(settings_in(dir.path()));

    assert!(matches!(r.initialize(), Status::Unavailable(_)));
    let text = r.text_search("install");
    assert_ne!(text, NOT_INITIALIZED);
    assert!(text.starts_with("Error during search: "), "got {text}");
}

#[test]
fn corpus_without_embeddings_is_degraded_but_searchable() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), &docs());
    let r = Retriever::new(settings_in(dir.path()));

    assert!(matches!(r.initialize(), Status::Degraded(_)));
    let result = r.search("install", 2).unwrap();
    assert!(matches!(result.mode, SearchMode::SparseOnly { .. }));
    assert_eq!(result.hits[0].chunk.filename, "install.md");

    let text = r.text_search("install");
    assert!(text.starts_with("Source 1 [install.md]:\n"));
    assert!(text.contains("semantic search unavailable"));
}

#[test]
fn full_artifacts_give_ready_hybrid_search() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = write_corpus(dir.path(), &docs());
    let embedder = Arc::new(HashEmbedder::new(64));
    embed_corpus(embedder.as_ref(), &chunks, 8).unwrap().save(&dir.path().join("embeddings.npy")).unwrap();

    let r = Retriever::with_embedder(settings_in(dir.path()), embedder);
    assert_eq!(r.initialize(), Status::Ready);
    let result = r.search("licensing questions", 2).unwrap();
    assert_eq!(result.mode, SearchMode::Hybrid);
    assert_eq!(result.hits[0].chunk.filename, "faq.md");
    assert_eq!(result.hits.len(), 2);
}

#[test]
fn embedding_rows_out_of_step_with_corpus_degrade() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = write_corpus(dir.path(), &docs());
    let embedder = Arc::new(HashEmbedder::new(16));
    embed_corpus(embedder.as_ref(), &chunks[..1], 8).unwrap().save(&dir.path().join("embeddings.npy")).unwrap();

    let r = Retriever::with_embedder(settings_in(dir.path()), embedder);
    match r.initialize() {
        Status::Degraded(reason) => assert!(reason.contains("Dimension mismatch")),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn initialize_is_idempotent_until_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), &docs());
    let r = Retriever::new(settings_in(dir.path()));
    r.initialize();
    assert_eq!(r.text_search("kubernetes"), NO_RESULTS);

    write_corpus(dir.path(), &[Document::new("k8s.md", "Deploying to kubernetes clusters.")]);
    r.initialize();
    assert_eq!(r.text_search("kubernetes"), NO_RESULTS, "second initialize must not rebuild");

    r.reload();
    assert!(r.text_search("kubernetes").starts_with("Source 1 [k8s.md]:"));
}

#[test]
fn first_query_initializes_lazily() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), &docs());
    let r = Retriever::new(settings_in(dir.path()));
    assert!(r.query("faq licensing").contains("[faq.md]"));
    assert!(matches!(r.status(), Status::Degraded(_)));
}

#[test]
fn long_content_is_truncated_in_output() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), &[Document::new("long.md", format!("needle {}", "hay ".repeat(400)))]);
    let mut settings = settings_in(dir.path());
    settings.search.fusion = Fusion::Blended { alpha: 0.5 };
    let r = Retriever::new(settings);
    let text = r.text_search("needle");
    let body = text.lines().nth(1).unwrap();
    assert_eq!(body.chars().count(), 603);
    assert!(body.ends_with("..."));
}
