//! Domain types shared by the chunker, both indexes and the façade.

use serde::{Deserialize, Serialize};

/// Open-ended provenance fields (source URL, front matter, ...).
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// A unit of source content handed to the chunker.
///
/// `filename` identifies the document and is copied into every chunk derived
/// from it. Everything that is not `filename` or `content` lives in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub metadata: Meta,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self { filename: filename.into(), content: content.into(), metadata: Meta::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    #[default]
    SlidingWindow,
    /// Produced by an external sectioner.
    Sectioned,
    /// Sliding window used after the sectioner failed for this document.
    Fallback,
}

/// The atomic indexed and retrieved unit.
///
/// - `content`: contiguous slice of the document text, or a generated section
/// - `filename`: parent document identity, always present
/// - `start`: char offset of `content` inside the document (0 for sections)
/// - `chunking_method`: which path produced the chunk
/// - `metadata`: shallow copy of the parent document's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub filename: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub chunking_method: ChunkingMethod,
    #[serde(flatten)]
    pub metadata: Meta,
}

impl Chunk {
    /// Text of a named field: `content`, `filename`, or a metadata entry.
    /// Non-string metadata values are rendered as JSON.
    pub fn field_text(&self, field: &str) -> Option<String> {
        match field {
            "content" => Some(self.content.clone()),
            "filename" => Some(self.filename.clone()),
            other => self.metadata.get(other).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Vector,
    Text,
    /// Score blended from both engines.
    Hybrid,
}

/// A chunk copy with its per-query relevance score. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
    pub source: SourceKind,
}

/// Strategy used to merge sparse and dense candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Fusion {
    /// Sparse candidates first, then dense; the first copy of a chunk wins.
    #[default]
    FirstSeen,
    /// Min-max normalized scores combined as `(1 - alpha) * sparse + alpha * dense`.
    Blended { alpha: f32 },
}
