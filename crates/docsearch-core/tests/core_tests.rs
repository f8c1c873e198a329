use std::fs;

use tempfile::TempDir;

use docsearch_core::chunker::chunk_documents;
use docsearch_core::corpus;
use docsearch_core::data_processor::DataProcessor;
use docsearch_core::types::ChunkingMethod;
use docsearch_core::Error;

#[test]
fn load_directory_reads_markdown_with_front_matter() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("guide")).unwrap();
    fs::write(dir.join("README.md"), "# Readme\nhello").unwrap();
    fs::write(dir.join("guide/setup.MDX"), "---\ntitle: Setup\n---\nInstall it").unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let docs = DataProcessor::new().load_directory(dir).expect("load");

    let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
    assert_eq!(names, vec!["README.md", "guide/setup.MDX"]);
    assert_eq!(docs[1].content, "Install it");
    assert_eq!(docs[1].metadata["title"], "Setup");
    assert!(docs[1].metadata.contains_key("path"));
}

#[test]
fn load_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.md"), "alpha bravo").unwrap();
    fs::write(dir.join("b.md"), "charlie delta").unwrap();

    let docs = DataProcessor::new().load_directory_limited(dir, 1).expect("load limited");

    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].filename, "a.md");
}

#[test]
fn corpus_round_trips_through_disk_in_order() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.md"), "---\nurl: https://example.org/a\n---\n0123456789").unwrap();
    let docs = DataProcessor::new().load_directory(dir).expect("load");
    let batch = chunk_documents(&docs, 4, 2).expect("chunk");

    let path = dir.join("out/chunks.json");
    corpus::save(&path, &batch.chunks).expect("save");
    let loaded = corpus::load(&path).expect("load");

    assert_eq!(loaded, batch.chunks);
    let starts: Vec<usize> = loaded.iter().map(|c| c.start).collect();
    assert_eq!(starts, vec![0, 2, 4, 6]);
    assert!(loaded.iter().all(|c| c.chunking_method == ChunkingMethod::SlidingWindow));
    assert!(loaded.iter().all(|c| c.metadata["url"] == "https://example.org/a"));
}

#[test]
fn missing_corpus_is_upstream_unavailable() {
    let tmp = TempDir::new().unwrap();
    let err = corpus::load(&tmp.path().join("chunks.json")).unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)));
}

#[test]
fn malformed_corpus_is_a_json_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("chunks.json");
    fs::write(&path, "[{\"content\": 1}]").unwrap();
    assert!(matches!(corpus::load(&path), Err(Error::Json(_))));
}
