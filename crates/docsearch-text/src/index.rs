use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tantivy::tokenizer::TextAnalyzer;
use tracing::{debug, info};

use docsearch_core::traits::TextIndex;
use docsearch_core::types::{Chunk, ScoredChunk, SourceKind};

use crate::analyzer::{build_analyzer, tokenize};

/// TF-IDF vector-space index with cosine ranking.
///
/// Each chunk becomes an L2-normalized sparse vector of `tf * idf` weights
/// with `idf = ln((1 + n) / (1 + df)) + 1`. The vocabulary is frozen at fit
/// time; query terms outside it carry no weight. Weights are kept as
/// per-term postings so a query only touches chunks sharing a term with it.
#[derive(Clone)]
pub struct SparseIndex {
	text_fields: Vec<String>,
	analyzer: TextAnalyzer,
	vocabulary: HashMap<String, usize>,
	idf: Vec<f32>,
	postings: Vec<Vec<(usize, f32)>>,
	docs: Arc<[Chunk]>,
}

impl Default for SparseIndex {
	fn default() -> Self {
		Self::new(vec!["content".to_string(), "filename".to_string()])
	}
}

impl SparseIndex {
	/// An unfitted index over the given chunk fields. Searching it returns nothing.
	pub fn new(text_fields: Vec<String>) -> Self {
		Self {
			text_fields,
			analyzer: build_analyzer(),
			vocabulary: HashMap::new(),
			idf: Vec::new(),
			postings: Vec::new(),
			docs: Arc::from(Vec::new()),
		}
	}

	/// Build the vector space over `corpus`, replacing any previous fit.
	#[must_use]
	pub fn fit(mut self, corpus: impl Into<Arc<[Chunk]>>) -> Self {
		let docs: Arc<[Chunk]> = corpus.into();
		let mut vocabulary: HashMap<String, usize> = HashMap::new();
		let mut doc_counts: Vec<BTreeMap<usize, u32>> = Vec::with_capacity(docs.len());
		let mut df: Vec<u32> = Vec::new();

		for chunk in docs.iter() {
			let text = self.document_text(chunk);
			let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
			for term in tokenize(&mut self.analyzer, &text) {
				let next = vocabulary.len();
				let id = *vocabulary.entry(term).or_insert(next);
				if id == df.len() {
					df.push(0);
				}
				*counts.entry(id).or_insert(0) += 1;
			}
			for id in counts.keys() {
				df[*id] += 1;
			}
			doc_counts.push(counts);
		}

		#[allow(clippy::cast_precision_loss)]
		let n = docs.len() as f32;
		#[allow(clippy::cast_precision_loss)]
		let idf: Vec<f32> = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0).collect();

		let mut postings: Vec<Vec<(usize, f32)>> = vec![Vec::new(); vocabulary.len()];
		for (doc, counts) in doc_counts.iter().enumerate() {
			#[allow(clippy::cast_precision_loss)]
			let weights: Vec<(usize, f32)> = counts.iter().map(|(&t, &c)| (t, c as f32 * idf[t])).collect();
			let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
			if norm <= f32::EPSILON {
				continue;
			}
			for (t, w) in weights {
				postings[t].push((doc, w / norm));
			}
		}

		info!(chunks = docs.len(), vocabulary = vocabulary.len(), "fitted sparse index");
		self.vocabulary = vocabulary;
		self.idf = idf;
		self.postings = postings;
		self.docs = docs;
		self
	}

	/// Top `k` chunks by cosine similarity, descending. Chunks scoring zero are left out.
	pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
		if self.docs.is_empty() || k == 0 {
			return Vec::new();
		}

		let mut analyzer = self.analyzer.clone();
		let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
		for term in tokenize(&mut analyzer, query) {
			if let Some(&id) = self.vocabulary.get(&term) {
				*counts.entry(id).or_insert(0) += 1;
			}
		}
		#[allow(clippy::cast_precision_loss)]
		let weights: Vec<(usize, f32)> = counts.iter().map(|(&t, &c)| (t, c as f32 * self.idf[t])).collect();
		let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
		if norm <= f32::EPSILON {
			debug!(query, "no query terms in vocabulary");
			return Vec::new();
		}

		let mut scores = vec![0f32; self.docs.len()];
		for (t, w) in &weights {
			let qw = w / norm;
			for &(doc, dw) in &self.postings[*t] {
				scores[doc] += qw * dw;
			}
		}

		let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().filter(|(_, s)| *s > 0.0).collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked.truncate(k);
		debug!(query, hits = ranked.len(), "sparse search");

		ranked
			.into_iter()
			.map(|(i, score)| ScoredChunk { chunk: self.docs[i].clone(), score, source: SourceKind::Text })
			.collect()
	}

	pub fn len(&self) -> usize {
		self.docs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.docs.is_empty()
	}

	pub fn vocabulary_size(&self) -> usize {
		self.vocabulary.len()
	}

	fn document_text(&self, chunk: &Chunk) -> String {
		self.text_fields.iter().filter_map(|f| chunk.field_text(f)).collect::<Vec<_>>().join(" ")
	}
}

impl TextIndex for SparseIndex {
	fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
		Self::search(self, query, k)
	}
}
