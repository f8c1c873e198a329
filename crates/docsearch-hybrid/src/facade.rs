use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use docsearch_core::config::Settings;
use docsearch_core::corpus;
use docsearch_core::traits::{Embedder, VectorIndex};
use docsearch_core::types::Chunk;
use docsearch_core::{Error, Result};
use docsearch_embed::get_default_embedder;
use docsearch_text::SparseIndex;
use docsearch_vector::{DenseIndex, EmbeddingMatrix};

use crate::{hybrid_search, HybridSearch, SearchMode};

pub const NOT_INITIALIZED: &str = "Search index not initialized. Please run ingestion first.";
pub const NO_RESULTS: &str = "No relevant documentation found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Sparse and dense indexes are both serving.
    Ready,
    /// Keyword search only.
    Degraded(String),
    /// No corpus; every query gets a diagnostic.
    Unavailable(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => write!(f, "ready"),
            Status::Degraded(reason) => write!(f, "degraded: {reason}"),
            Status::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

struct Loaded {
    sparse: SparseIndex,
    dense: Option<DenseIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    status: Status,
}

/// Owns the fitted indexes built from the on-disk corpus and embedding artifacts.
///
/// Indexes are built on the first `initialize` (or first query) and reused
/// afterwards. `reload` rebuilds them off to the side and swaps the new set in
/// only once fitting has finished, so concurrent readers never see a partial
/// index.
pub struct Retriever {
    settings: Settings,
    embedder: Option<Arc<dyn Embedder>>,
    semantic: bool,
    state: RwLock<Option<Arc<Loaded>>>,
    build_lock: Mutex<()>,
}

impl Retriever {
    /// The embedder is built from `settings.embedding` at load time.
    pub fn new(settings: Settings) -> Self {
        Self { settings, embedder: None, semantic: true, state: RwLock::new(None), build_lock: Mutex::new(()) }
    }

    pub fn with_embedder(settings: Settings, embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder: Some(embedder), ..Self::new(settings) }
    }

    /// Never load the dense index; every search is keyword-only.
    #[must_use]
    pub fn keyword_only(mut self) -> Self {
        self.semantic = false;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the indexes unless a previous call already did.
    ///
    /// `Unavailable` is not remembered: the next call tries again, so queries
    /// start working as soon as an ingestion run writes the corpus.
    pub fn initialize(&self) -> Status {
        match self.ensure_loaded() {
            Ok(loaded) => loaded.status.clone(),
            Err(e) => Status::Unavailable(e.to_string()),
        }
    }

    /// Rebuild from disk even if already initialized. On failure the previous
    /// indexes, if any, keep serving.
    pub fn reload(&self) -> Status {
        let _guard = self.build_lock.lock();
        match self.install() {
            Ok(loaded) => loaded.status.clone(),
            Err(e) => Status::Unavailable(e.to_string()),
        }
    }

    pub fn status(&self) -> Status {
        self.current().map_or_else(|| Status::Unavailable("not initialized".into()), |l| l.status.clone())
    }

    /// Structured search over the current indexes, initializing them on first use.
    pub fn search(&self, query: &str, k: usize) -> Result<HybridSearch> {
        let loaded = self.loaded()?;
        let dense = loaded.dense.as_ref().map(|d| d as &dyn VectorIndex);
        let mut result =
            hybrid_search(query, &loaded.sparse, dense, loaded.embedder.as_deref(), k, &self.settings.search.fusion)?;
        if let Status::Degraded(reason) = &loaded.status {
            if matches!(result.mode, SearchMode::SparseOnly { .. }) {
                result.mode = SearchMode::SparseOnly { reason: reason.clone() };
            }
        }
        Ok(result)
    }

    /// Tool-facing search. Always returns a string: formatted sources or a diagnostic.
    pub fn text_search(&self, query: &str) -> String {
        let k = self.settings.search.tool_results;
        let outcome = catch_unwind(AssertUnwindSafe(|| self.search(query, k)));
        match outcome {
            Ok(Ok(result)) if result.hits.is_empty() => NO_RESULTS.to_string(),
            Ok(Ok(result)) => format_results(&result, self.settings.search.snippet_chars),
            Ok(Err(Error::IndexNotReady(_))) => NOT_INITIALIZED.to_string(),
            Ok(Err(e)) => {
                error!(error = %e, query, "search failed");
                format!("Error during search: {e}")
            }
            Err(_) => {
                error!(query, "search panicked");
                "Error during search: internal failure".to_string()
            }
        }
    }

    /// Alias of [`Retriever::text_search`].
    pub fn query(&self, text: &str) -> String {
        self.text_search(text)
    }

    fn current(&self) -> Option<Arc<Loaded>> {
        self.state.read().clone()
    }

    /// Only a missing corpus means "not initialized"; a corpus that exists but
    /// cannot be read surfaces as its own error.
    fn loaded(&self) -> Result<Arc<Loaded>> {
        self.ensure_loaded().map_err(|e| match e {
            Error::UpstreamUnavailable(reason) => Error::IndexNotReady(reason),
            other => other,
        })
    }

    fn ensure_loaded(&self) -> Result<Arc<Loaded>> {
        if let Some(loaded) = self.current() {
            return Ok(loaded);
        }
        let _guard = self.build_lock.lock();
        if let Some(loaded) = self.current() {
            return Ok(loaded);
        }
        self.install()
    }

    /// Caller holds `build_lock`.
    fn install(&self) -> Result<Arc<Loaded>> {
        match self.build() {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                *self.state.write() = Some(Arc::clone(&loaded));
                info!(status = %loaded.status, "retriever initialized");
                Ok(loaded)
            }
            Err(e) => {
                warn!(error = %e, "retriever unavailable");
                Err(e)
            }
        }
    }

    fn build(&self) -> Result<Loaded> {
        let chunks = corpus::load(&self.settings.data.corpus_path)?;
        let docs: Arc<[Chunk]> = chunks.into();
        let sparse = SparseIndex::new(self.settings.search.text_fields.clone()).fit(Arc::clone(&docs));

        match self.build_dense(docs) {
            Ok((dense, embedder)) => Ok(Loaded { sparse, dense: Some(dense), embedder: Some(embedder), status: Status::Ready }),
            Err(reason) => {
                warn!(%reason, "semantic search disabled");
                Ok(Loaded { sparse, dense: None, embedder: None, status: Status::Degraded(reason) })
            }
        }
    }

    fn build_dense(&self, docs: Arc<[Chunk]>) -> std::result::Result<(DenseIndex, Arc<dyn Embedder>), String> {
        if !self.semantic {
            return Err("semantic search disabled".into());
        }
        let matrix = EmbeddingMatrix::load(&self.settings.data.embeddings_path).map_err(|e| e.to_string())?;
        let dense = DenseIndex::new().fit(matrix, docs).map_err(|e| e.to_string())?;
        let embedder: Arc<dyn Embedder> = match &self.embedder {
            Some(e) => Arc::clone(e),
            None => get_default_embedder(&self.settings.embedding)
                .map(Arc::from)
                .map_err(|e| format!("embedding function unavailable: {e}"))?,
        };
        if embedder.dim() != dense.dim() {
            return Err(format!("embedder produces {} dimensions but the embedding matrix has {}", embedder.dim(), dense.dim()));
        }
        Ok((dense, embedder))
    }
}

/// `Source {i} [{filename}]:\n{snippet}\n` per hit, joined by newlines.
pub fn format_results(result: &HybridSearch, snippet_chars: usize) -> String {
    let mut out = result
        .hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("Source {} [{}]:\n{}\n", i + 1, hit.chunk.filename, snippet(&hit.chunk.content, snippet_chars)))
        .collect::<Vec<_>>()
        .join("\n");
    if let SearchMode::SparseOnly { reason } = &result.mode {
        out.push_str(&format!("\nNote: semantic search unavailable ({reason}); showing keyword matches only.\n"));
    }
    out
}

fn snippet(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
