use std::path::Path;

use candle_core::{DType, Device, Tensor};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docsearch_core::traits::Embedder;
use docsearch_core::types::Chunk;
use docsearch_core::{Error, Result};

/// Row-major `rows x dim` matrix of chunk embeddings. Row `i` belongs to corpus chunk `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
	data: Vec<f32>,
	rows: usize,
	dim: usize,
}

impl EmbeddingMatrix {
	pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
		let dim = rows.first().map_or(0, Vec::len);
		if let Some((i, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
			return Err(Error::Artifact(format!("row {i} has {} columns, expected {dim}", bad.len())));
		}
		let n = rows.len();
		Ok(Self { data: rows.into_iter().flatten().collect(), rows: n, dim })
	}

	/// Read a 2-D `.npy` array. Any float dtype is accepted and converted to f32.
	pub fn load(path: &Path) -> Result<Self> {
		if !path.exists() {
			return Err(Error::UpstreamUnavailable(format!("embedding artifact {} not found", path.display())));
		}
		let tensor = Tensor::read_npy(path).map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))?;
		let (rows, dim) = match tensor.dims() {
			&[rows, dim] => (rows, dim),
			other => return Err(Error::Artifact(format!("{}: expected a 2-D array, got shape {other:?}", path.display()))),
		};
		let data = tensor
			.to_dtype(DType::F32)
			.and_then(|t| t.flatten_all())
			.and_then(|t| t.to_vec1::<f32>())
			.map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))?;
		info!(path = %path.display(), rows, dim, "loaded embedding matrix");
		Ok(Self { data, rows, dim })
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)?;
		}
		Tensor::from_slice(&self.data, (self.rows, self.dim), &Device::Cpu)
			.and_then(|t| t.write_npy(path))
			.map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))?;
		info!(path = %path.display(), rows = self.rows, dim = self.dim, "saved embedding matrix");
		Ok(())
	}

	pub fn rows(&self) -> usize {
		self.rows
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn row(&self, i: usize) -> Option<&[f32]> {
		(i < self.rows).then(|| &self.data[i * self.dim..(i + 1) * self.dim])
	}

	pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
		(0..self.rows).filter_map(move |i| self.row(i))
	}
}

/// Embed every chunk's content in corpus order, `batch_size` texts at a time.
pub fn embed_corpus(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize) -> Result<EmbeddingMatrix> {
	let pb = ProgressBar::new(chunks.len() as u64);
	if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)") {
		pb.set_style(style.progress_chars("#>-"));
	}

	let mut rows = Vec::with_capacity(chunks.len());
	for batch in chunks.chunks(batch_size.max(1)) {
		let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
		let vectors = embedder.embed_batch(&texts).map_err(|e| Error::ExternalCapability(format!("embedding failed: {e}")))?;
		if vectors.len() != texts.len() {
			return Err(Error::ExternalCapability(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
		}
		rows.extend(vectors);
		pb.inc(batch.len() as u64);
	}
	pb.finish_and_clear();

	let matrix = EmbeddingMatrix::from_rows(rows)?;
	info!(rows = matrix.rows(), dim = matrix.dim(), "embedded corpus");
	Ok(matrix)
}
