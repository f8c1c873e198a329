use std::sync::Arc;

use tracing::{debug, info};

use docsearch_core::traits::VectorIndex;
use docsearch_core::types::{Chunk, ScoredChunk, SourceKind};
use docsearch_core::{Error, Result};

use crate::matrix::EmbeddingMatrix;

/// Brute-force cosine similarity over a pre-computed embedding matrix.
///
/// Every chunk is scored on every query, so low and negative similarities are
/// still returned when `k` reaches them.
#[derive(Debug, Clone)]
pub struct DenseIndex {
	matrix: EmbeddingMatrix,
	norms: Vec<f32>,
	docs: Arc<[Chunk]>,
}

impl Default for DenseIndex {
	fn default() -> Self {
		Self { matrix: EmbeddingMatrix::default(), norms: Vec::new(), docs: Arc::from(Vec::new()) }
	}
}

impl DenseIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Pair `matrix` row `i` with `corpus[i]`. Row and chunk counts must agree.
	pub fn fit(self, matrix: EmbeddingMatrix, corpus: impl Into<Arc<[Chunk]>>) -> Result<Self> {
		let docs: Arc<[Chunk]> = corpus.into();
		if matrix.rows() != docs.len() {
			return Err(Error::DimensionMismatch { rows: matrix.rows(), chunks: docs.len() });
		}
		let norms = matrix.iter_rows().map(|r| r.iter().map(|x| x * x).sum::<f32>().sqrt()).collect();
		info!(chunks = docs.len(), dim = matrix.dim(), "fitted dense index");
		Ok(Self { matrix, norms, docs })
	}

	pub fn dim(&self) -> usize {
		self.matrix.dim()
	}

	pub fn len(&self) -> usize {
		self.docs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.docs.is_empty()
	}

	/// Top `k` chunks by cosine similarity to `query_vec`, descending; ties keep corpus order.
	pub fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		if self.docs.is_empty() || k == 0 {
			return Ok(Vec::new());
		}
		if query_vec.len() != self.matrix.dim() {
			return Err(Error::QueryDimension { expected: self.matrix.dim(), got: query_vec.len() });
		}

		let q_norm = query_vec.iter().map(|x| x * x).sum::<f32>().sqrt();
		let mut ranked: Vec<(usize, f32)> = self
			.matrix
			.iter_rows()
			.zip(&self.norms)
			.enumerate()
			.map(|(i, (row, norm))| {
				let denom = q_norm * norm;
				let dot: f32 = row.iter().zip(query_vec).map(|(a, b)| a * b).sum();
				(i, if denom > 0.0 { dot / denom } else { 0.0 })
			})
			.collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked.truncate(k);
		debug!(hits = ranked.len(), "dense search");

		Ok(ranked
			.into_iter()
			.map(|(i, score)| ScoredChunk { chunk: self.docs[i].clone(), score, source: SourceKind::Vector })
			.collect())
	}
}

impl VectorIndex for DenseIndex {
	fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		Self::search_vec(self, query_vec, k)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use docsearch_core::types::Document;

	fn corpus(n: usize) -> Vec<Chunk> {
		(0..n)
			.map(|i| {
				let d = Document::new(format!("{i}.md"), format!("chunk {i}"));
				Chunk { content: d.content, filename: d.filename, start: 0, chunking_method: Default::default(), metadata: d.metadata }
			})
			.collect()
	}

	fn index() -> DenseIndex {
		let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![-1.0, 0.0]]).unwrap();
		DenseIndex::new().fit(m, corpus(3)).unwrap()
	}

	#[test]
	fn ranks_by_cosine_and_keeps_negative_scores() {
		let hits = index().search_vec(&[2.0, 0.0], 3).unwrap();
		let names: Vec<&str> = hits.iter().map(|h| h.chunk.filename.as_str()).collect();
		assert_eq!(names, ["0.md", "1.md", "2.md"]);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
		assert!((hits[1].score - 0.6).abs() < 1e-6);
		assert!((hits[2].score + 1.0).abs() < 1e-6);
		assert!(hits.iter().all(|h| h.source == SourceKind::Vector));
	}

	#[test]
	fn k_larger_than_corpus_returns_everything() {
		assert_eq!(index().search_vec(&[0.0, 1.0], 10).unwrap().len(), 3);
	}

	#[test]
	fn row_count_must_match_corpus() {
		let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
		let err = DenseIndex::new().fit(m, corpus(2)).unwrap_err();
		assert!(matches!(err, Error::DimensionMismatch { rows: 1, chunks: 2 }));
	}

	#[test]
	fn wrong_query_width_is_an_error() {
		let err = index().search_vec(&[1.0, 0.0, 0.0], 1).unwrap_err();
		assert!(matches!(err, Error::QueryDimension { expected: 2, got: 3 }));
	}

	#[test]
	fn unfitted_index_returns_nothing() {
		assert!(DenseIndex::new().search_vec(&[1.0], 5).unwrap().is_empty());
	}
}
