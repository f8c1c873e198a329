use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Non-positive chunk window or step.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Embedding matrix rows do not line up with the corpus.
    #[error("Dimension mismatch: embedding matrix has {rows} rows but corpus has {chunks} chunks")]
    DimensionMismatch { rows: usize, chunks: usize },

    #[error("Query vector has {got} dimensions, index expects {expected}")]
    QueryDimension { expected: usize, got: usize },

    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    /// A required artifact (corpus or embedding file) is missing.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("External capability failed: {0}")]
    ExternalCapability(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed artifact: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
