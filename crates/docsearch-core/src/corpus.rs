//! Corpus artifact: the ordered chunk list both indexes are fitted from.
//!
//! Stored as a pretty-printed JSON array, one object per chunk. Row order is
//! the index space shared by the sparse and dense indexes and the embedding
//! matrix, so it must never be reordered between save and load.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::types::Chunk;

pub fn save(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut out, chunks)?;
    out.flush()?;
    info!(path = %path.display(), chunks = chunks.len(), "saved corpus");
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<Chunk>> {
    if !path.exists() {
        return Err(Error::UpstreamUnavailable(format!("corpus artifact {} not found", path.display())));
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let chunks: Vec<Chunk> = serde_json::from_reader(reader)?;
    info!(path = %path.display(), chunks = chunks.len(), "loaded corpus");
    Ok(chunks)
}
