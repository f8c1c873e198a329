//! docsearch-text
//!
//! Sparse keyword retrieval: a tantivy analyzer pipeline (tokenize, lowercase,
//! stop-words) feeding an in-memory TF-IDF index ranked by cosine similarity.

pub mod analyzer;
pub mod index;

pub use index::SparseIndex;
