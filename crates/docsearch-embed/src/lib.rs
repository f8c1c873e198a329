//! Embedding backends behind the `docsearch_core::traits::Embedder` seam.
//!
//! `HashEmbedder` is always available and needs no model files. The BERT
//! sentence embedder is compiled in with the `model` feature.

use std::hash::{Hash, Hasher};

use anyhow::{bail, Result};
use tracing::info;
use twox_hash::XxHash64;

use docsearch_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use docsearch_core::traits::Embedder;

#[cfg(feature = "model")]
mod device;
#[cfg(feature = "model")]
mod model;
mod pool;
#[cfg(feature = "model")]
mod tokenize;

#[cfg(feature = "model")]
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;

/// Feature-hashing embedder: each lowercased word lands in a bucket picked by
/// its XxHash64, and the vector is L2 normalized. Texts sharing words get
/// positive cosine similarity, which is enough for tests and offline demos.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the embedder named by `settings.backend`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    match settings.backend {
        EmbeddingBackend::Hash => {
            info!(dim = settings.dim, "using hash embedder");
            Ok(Box::new(HashEmbedder::new(settings.dim)))
        }
        EmbeddingBackend::Bert => {
            let Some(dir) = settings.model_dir.as_deref() else {
                bail!("embedding.model_dir must be set for the bert backend");
            };
            load_bert(&expand_path(dir), settings.max_len)
        }
    }
}

#[cfg(feature = "model")]
fn load_bert(dir: &std::path::Path, max_len: usize) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(BertEmbedder::load(dir, max_len)?))
}

#[cfg(not(feature = "model"))]
fn load_bert(dir: &std::path::Path, _max_len: usize) -> Result<Box<dyn Embedder>> {
    bail!("bert backend requested for {} but docsearch-embed was built without the `model` feature", dir.display())
}
