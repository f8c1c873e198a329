use crate::types::ScoredChunk;

/// Text → fixed-length vector. Supplied by an embedding backend.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Splits one document into semantically coherent sections.
///
/// Implementations may call out to a generative model; any error they return
/// sends the chunker down its sliding-window fallback.
pub trait Sectioner: Send + Sync {
    fn name(&self) -> &str;
    fn section(&self, text: &str) -> anyhow::Result<Vec<String>>;
}

/// Keyword retrieval over a fitted corpus.
pub trait TextIndex: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk>;
}

/// Nearest-neighbour retrieval over pre-computed embeddings.
pub trait VectorIndex: Send + Sync {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> crate::Result<Vec<ScoredChunk>>;
}
