//! Dense retrieval: the embedding matrix artifact and a brute-force cosine index over it.

pub mod index;
pub mod matrix;

pub use index::DenseIndex;
pub use matrix::{embed_corpus, EmbeddingMatrix};
