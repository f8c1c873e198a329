//! Fusion of sparse and dense retrieval, plus the `Retriever` façade that
//! owns both indexes and answers tool-style text queries.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use docsearch_core::traits::{Embedder, TextIndex, VectorIndex};
use docsearch_core::types::{Chunk, Fusion, ScoredChunk, SourceKind};
use docsearch_core::Result;

pub mod facade;

pub use facade::{Retriever, Status};

/// Characters of content that, together with the filename, identify a chunk during dedup.
pub const DEDUP_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchMode {
    Hybrid,
    /// Semantic matching was skipped; `reason` says why.
    SparseOnly { reason: String },
}

#[derive(Debug, Clone)]
pub struct HybridSearch {
    pub hits: Vec<ScoredChunk>,
    pub mode: SearchMode,
}

/// `(filename, first 100 chars of content)`.
pub fn dedup_key(chunk: &Chunk) -> (&str, &str) {
    let content = chunk.content.as_str();
    let prefix = content.char_indices().nth(DEDUP_PREFIX_CHARS).map_or(content, |(i, _)| &content[..i]);
    (chunk.filename.as_str(), prefix)
}

fn owned_key(chunk: &Chunk) -> (String, String) {
    let (f, p) = dedup_key(chunk);
    (f.to_string(), p.to_string())
}

/// Retrieve `2k` candidates from each index and fuse them into at most `k` hits.
///
/// With [`Fusion::FirstSeen`] the sparse list is followed by the dense list and
/// the first copy of each dedup key is kept, so a chunk found by both paths
/// keeps its sparse score and position. No re-ranking happens.
///
/// Without a dense index or embedder, or when embedding the query fails, the
/// result is the sparse top `k` and `mode` records why.
pub fn hybrid_search(
    query: &str,
    sparse: &dyn TextIndex,
    dense: Option<&dyn VectorIndex>,
    embedder: Option<&dyn Embedder>,
    k: usize,
    fusion: &Fusion,
) -> Result<HybridSearch> {
    let pool = k.saturating_mul(2);
    let sparse_hits = sparse.search(query, pool);

    let (dense, embedder) = match (dense, embedder) {
        (Some(d), Some(e)) => (d, e),
        (None, _) => return Ok(sparse_only(sparse_hits, k, "dense index unavailable".into())),
        (_, None) => return Ok(sparse_only(sparse_hits, k, "embedding function unavailable".into())),
    };
    let query_vec = match embedder.embed(query) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "query embedding failed, falling back to keyword search");
            return Ok(sparse_only(sparse_hits, k, format!("query embedding failed: {e}")));
        }
    };
    let dense_hits = dense.search_vec(&query_vec, pool)?;
    debug!(sparse = sparse_hits.len(), dense = dense_hits.len(), "fusing candidates");

    let hits = match fusion {
        Fusion::FirstSeen => first_seen(sparse_hits, dense_hits, k),
        Fusion::Blended { alpha } => blended(sparse_hits, dense_hits, k, *alpha),
    };
    Ok(HybridSearch { hits, mode: SearchMode::Hybrid })
}

fn sparse_only(mut hits: Vec<ScoredChunk>, k: usize, reason: String) -> HybridSearch {
    hits.truncate(k);
    HybridSearch { hits, mode: SearchMode::SparseOnly { reason } }
}

fn first_seen(sparse: Vec<ScoredChunk>, dense: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(k);
    for hit in sparse.into_iter().chain(dense) {
        if out.len() == k {
            break;
        }
        if seen.insert(owned_key(&hit.chunk)) {
            out.push(hit);
        }
    }
    out
}

/// Min-max scale to `[0, 1]`; a list of equal scores maps to all ones.
fn normalize_scores(hits: &[ScoredChunk]) -> Vec<f32> {
    let min = hits.iter().map(|h| h.score).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|h| h.score).fold(f32::NEG_INFINITY, f32::max);
    hits.iter()
        .map(|h| if (max - min).abs() < f32::EPSILON { 1.0 } else { (h.score - min) / (max - min) })
        .collect()
}

fn blended(sparse: Vec<ScoredChunk>, dense: Vec<ScoredChunk>, k: usize, alpha: f32) -> Vec<ScoredChunk> {
    struct Entry {
        hit: ScoredChunk,
        sparse: f32,
        dense: f32,
    }

    let sparse_norm = normalize_scores(&sparse);
    let dense_norm = normalize_scores(&dense);
    let mut entries: Vec<Entry> = Vec::new();
    let mut by_key: HashMap<(String, String), usize> = HashMap::new();

    for (hit, s) in sparse.into_iter().zip(sparse_norm) {
        by_key.entry(owned_key(&hit.chunk)).or_insert_with(|| {
            entries.push(Entry { hit, sparse: s, dense: 0.0 });
            entries.len() - 1
        });
    }
    for (hit, d) in dense.into_iter().zip(dense_norm) {
        match by_key.get(&owned_key(&hit.chunk)) {
            Some(&i) => {
                let e = &mut entries[i];
                if e.hit.source == SourceKind::Text {
                    e.dense = d;
                    e.hit.source = SourceKind::Hybrid;
                }
            }
            None => {
                by_key.insert(owned_key(&hit.chunk), entries.len());
                entries.push(Entry { hit, sparse: 0.0, dense: d });
            }
        }
    }

    let mut out: Vec<ScoredChunk> = entries
        .into_iter()
        .map(|e| {
            let mut hit = e.hit;
            hit.score = (1.0 - alpha) * e.sparse + alpha * e.dense;
            hit
        })
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(k);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsearch_core::types::ChunkingMethod;
    use docsearch_core::Error;

    fn chunk(filename: &str, content: &str) -> Chunk {
        Chunk {
            content: content.into(),
            filename: filename.into(),
            start: 0,
            chunking_method: ChunkingMethod::SlidingWindow,
            metadata: Default::default(),
        }
    }

    fn hit(filename: &str, content: &str, score: f32, source: SourceKind) -> ScoredChunk {
        ScoredChunk { chunk: chunk(filename, content), score, source }
    }

    struct FixedText(Vec<ScoredChunk>);
    impl TextIndex for FixedText {
        fn search(&self, _query: &str, k: usize) -> Vec<ScoredChunk> {
            self.0.iter().take(k).cloned().collect()
        }
    }

    struct FixedDense(Vec<ScoredChunk>);
    impl VectorIndex for FixedDense {
        fn search_vec(&self, q: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
            if q.len() != 2 {
                return Err(Error::QueryDimension { expected: 2, got: q.len() });
            }
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    struct Fixed(usize);
    impl Embedder for Fixed {
        fn dim(&self) -> usize {
            self.0
        }
        fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; self.0]).collect())
        }
    }

    struct Broken;
    impl Embedder for Broken {
        fn dim(&self) -> usize {
            2
        }
        fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("model offline")
        }
    }

    fn sources() -> (FixedText, FixedDense) {
        let text = FixedText(vec![
            hit("a.md", "shared chunk", 0.9, SourceKind::Text),
            hit("b.md", "keyword only", 0.4, SourceKind::Text),
        ]);
        let dense = FixedDense(vec![
            hit("a.md", "shared chunk", 0.7, SourceKind::Vector),
            hit("c.md", "semantic only", 0.6, SourceKind::Vector),
        ]);
        (text, dense)
    }

    #[test]
    fn duplicate_across_paths_keeps_sparse_copy() {
        let (text, dense) = sources();
        let r = hybrid_search("q", &text, Some(&dense), Some(&Fixed(2)), 2, &Fusion::FirstSeen).unwrap();
        assert_eq!(r.mode, SearchMode::Hybrid);
        assert_eq!(r.hits.len(), 2);
        assert_eq!(r.hits[0].chunk.filename, "a.md");
        assert_eq!(r.hits[0].score, 0.9);
        assert_eq!(r.hits[0].source, SourceKind::Text);
        assert_eq!(r.hits[1].chunk.filename, "b.md");
    }

    #[test]
    fn dense_novelty_follows_sparse_results() {
        let (text, dense) = sources();
        let r = hybrid_search("q", &text, Some(&dense), Some(&Fixed(2)), 5, &Fusion::FirstSeen).unwrap();
        let names: Vec<&str> = r.hits.iter().map(|h| h.chunk.filename.as_str()).collect();
        assert_eq!(names, ["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn same_file_different_prefix_is_not_collapsed() {
        let text = FixedText(vec![hit("a.md", "first part", 1.0, SourceKind::Text)]);
        let dense = FixedDense(vec![hit("a.md", "second part", 1.0, SourceKind::Vector)]);
        let r = hybrid_search("q", &text, Some(&dense), Some(&Fixed(2)), 5, &Fusion::FirstSeen).unwrap();
        assert_eq!(r.hits.len(), 2);
    }

    #[test]
    fn dedup_key_uses_first_hundred_chars() {
        let long_a = format!("{}{}", "x".repeat(100), "tail one");
        let long_b = format!("{}{}", "x".repeat(100), "tail two");
        assert_eq!(dedup_key(&chunk("f.md", &long_a)), dedup_key(&chunk("f.md", &long_b)));
        assert_eq!(dedup_key(&chunk("f.md", "short")).1, "short");
    }

    #[test]
    fn missing_embedder_degrades_to_sparse_only() {
        let (text, dense) = sources();
        let r = hybrid_search("q", &text, Some(&dense), None, 1, &Fusion::FirstSeen).unwrap();
        assert!(matches!(r.mode, SearchMode::SparseOnly { .. }));
        assert_eq!(r.hits.len(), 1);
        assert_eq!(r.hits[0].chunk.filename, "a.md");
    }

    #[test]
    fn embedding_failure_degrades_to_sparse_only() {
        let (text, dense) = sources();
        let r = hybrid_search("q", &text, Some(&dense), Some(&Broken), 3, &Fusion::FirstSeen).unwrap();
        match r.mode {
            SearchMode::SparseOnly { reason } => assert!(reason.contains("model offline")),
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(r.hits.len(), 2);
    }

    #[test]
    fn query_dimension_mismatch_propagates() {
        let (text, dense) = sources();
        let err = hybrid_search("q", &text, Some(&dense), Some(&Fixed(3)), 2, &Fusion::FirstSeen).unwrap_err();
        assert!(matches!(err, Error::QueryDimension { expected: 2, got: 3 }));
    }

    #[test]
    fn blended_fusion_merges_scores() {
        let (text, dense) = sources();
        let r = hybrid_search("q", &text, Some(&dense), Some(&Fixed(2)), 3, &Fusion::Blended { alpha: 0.5 }).unwrap();
        assert_eq!(r.hits[0].chunk.filename, "a.md");
        assert_eq!(r.hits[0].source, SourceKind::Hybrid);
        assert!((r.hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(r.hits.len(), 3);
        assert!(r.hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn normalize_equal_scores_is_one() {
        let hits = vec![hit("a", "x", 0.3, SourceKind::Text), hit("b", "y", 0.3, SourceKind::Text)];
        assert_eq!(normalize_scores(&hits), vec![1.0, 1.0]);
        assert!(normalize_scores(&[]).is_empty());
    }
}
