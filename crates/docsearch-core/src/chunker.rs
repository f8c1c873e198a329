//! Sliding-window chunker with an optional external sectioning path.
//!
//! The window walks the document in char offsets `0, step, 2*step, ...` and
//! stops after the first window that reaches the end of the text, so the tail
//! is covered without emitting a trailing near-duplicate. When a [`Sectioner`]
//! is attached, each document is offered to it first; any failure falls back
//! to the window for that document only.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};

use tracing::{debug, warn};

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::traits::Sectioner;
use crate::types::{Chunk, ChunkingMethod, Document};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub step_size: usize,
    pub max_section_chars: usize,
    pub section_timeout: Duration,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&ChunkingSettings::default())
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self {
            window_size: s.window_size,
            step_size: s.step_size,
            max_section_chars: s.max_section_chars,
            section_timeout: Duration::from_millis(s.section_timeout_ms),
        }
    }
}

/// Result of offering one document to the sectioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Sections(Vec<String>),
    Fallback(String),
}

/// Output of a chunking run.
#[derive(Debug, Default)]
pub struct ChunkBatch {
    pub chunks: Vec<Chunk>,
    /// Filenames of documents with no content.
    pub skipped: Vec<String>,
    /// `(filename, reason)` for documents the sectioner could not handle.
    pub fallbacks: Vec<(String, String)>,
}

pub struct Chunker {
    config: ChunkingConfig,
    sectioner: Option<Arc<dyn Sectioner>>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        check_window(config.window_size, config.step_size)?;
        Ok(Self { config, sectioner: None })
    }

    #[must_use]
    pub fn with_sectioner(mut self, sectioner: Arc<dyn Sectioner>) -> Self {
        self.sectioner = Some(sectioner);
        self
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk documents in order. Chunks come out in document order, then offset order.
    ///
    /// Documents whose content is empty or only whitespace produce no chunks and
    /// are listed in [`ChunkBatch::skipped`].
    pub fn chunk(&self, documents: &[Document]) -> ChunkBatch {
        let mut batch = ChunkBatch::default();
        for doc in documents {
            if doc.content.trim().is_empty() {
                warn!(filename = %doc.filename, "skipping document with empty content");
                batch.skipped.push(doc.filename.clone());
                continue;
            }

            let Some(sectioner) = &self.sectioner else {
                batch.chunks.extend(self.window_chunks(doc, ChunkingMethod::SlidingWindow));
                continue;
            };

            match self.offer(sectioner, doc) {
                SectionOutcome::Sections(sections) => {
                    debug!(filename = %doc.filename, sections = sections.len(), "sectioned document");
                    let total = sections.len();
                    for (i, section) in sections.into_iter().enumerate() {
                        let mut chunk = chunk_from(doc, section, 0, ChunkingMethod::Sectioned);
                        chunk.metadata.insert("chunk_index".into(), i.into());
                        chunk.metadata.insert("total_chunks".into(), total.into());
                        chunk.metadata.insert("chunking_provider".into(), sectioner.name().into());
                        batch.chunks.push(chunk);
                    }
                }
                SectionOutcome::Fallback(reason) => {
                    warn!(filename = %doc.filename, provider = sectioner.name(), %reason, "sectioning failed, using sliding window");
                    batch.chunks.extend(self.window_chunks(doc, ChunkingMethod::Fallback));
                    batch.fallbacks.push((doc.filename.clone(), reason));
                }
            }
        }
        batch
    }

    /// Runs the sectioner on a worker thread so a hung capability cannot stall
    /// the run past `section_timeout`.
    fn offer(&self, sectioner: &Arc<dyn Sectioner>, doc: &Document) -> SectionOutcome {
        let len = doc.content.chars().count();
        if len > self.config.max_section_chars {
            return SectionOutcome::Fallback(format!(
                "content length ({len}) exceeds sectioning limit ({})",
                self.config.max_section_chars
            ));
        }

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(sectioner);
        let text = doc.content.clone();
        thread::spawn(move || {
            let _ = tx.send(worker.section(&text));
        });
        let sections = match rx.recv_timeout(self.config.section_timeout) {
            Ok(Ok(sections)) => sections,
            Ok(Err(e)) => return SectionOutcome::Fallback(format!("{e:#}")),
            Err(RecvTimeoutError::Timeout) => {
                return SectionOutcome::Fallback(format!(
                    "sectioning exceeded the {}ms limit",
                    self.config.section_timeout.as_millis()
                ))
            }
            Err(RecvTimeoutError::Disconnected) => return SectionOutcome::Fallback("sectioner worker panicked".into()),
        };

        let sections: Vec<String> = sections
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if sections.is_empty() {
            return SectionOutcome::Fallback("sectioner returned no sections".into());
        }
        SectionOutcome::Sections(sections)
    }

    fn window_chunks(&self, doc: &Document, method: ChunkingMethod) -> Vec<Chunk> {
        windows(&doc.content, self.config.window_size, self.config.step_size)
            .into_iter()
            .map(|(start, content)| chunk_from(doc, content.to_string(), start, method))
            .collect()
    }
}

/// Chunk documents with the plain sliding window.
pub fn chunk_documents(documents: &[Document], window_size: usize, step_size: usize) -> Result<ChunkBatch> {
    let chunker = Chunker::new(ChunkingConfig { window_size, step_size, ..ChunkingConfig::default() })?;
    Ok(chunker.chunk(documents))
}

/// `(start, content)` windows over `text`, offsets in chars.
pub fn sliding_window(text: &str, window_size: usize, step_size: usize) -> Result<Vec<(usize, &str)>> {
    check_window(window_size, step_size)?;
    Ok(windows(text, window_size, step_size))
}

fn windows(text: &str, window_size: usize, step_size: usize) -> Vec<(usize, &str)> {
    // byte offset of every char, plus the end of the text
    let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let n = bounds.len() - 1;

    let mut out = Vec::new();
    let mut i = 0;
    while i < n {
        let end = (i + window_size).min(n);
        out.push((i, &text[bounds[i]..bounds[end]]));
        if i + window_size >= n {
            break;
        }
        i += step_size;
    }
    out
}

fn check_window(window_size: usize, step_size: usize) -> Result<()> {
    if window_size == 0 || step_size == 0 {
        return Err(Error::InvalidParameter(format!(
            "window_size and step_size must be positive (got {window_size} / {step_size})"
        )));
    }
    if step_size > window_size {
        warn!(window_size, step_size, "step larger than window, text between windows is not chunked");
    }
    Ok(())
}

fn chunk_from(doc: &Document, content: String, start: usize, method: ChunkingMethod) -> Chunk {
    Chunk {
        content,
        filename: doc.filename.clone(),
        start,
        chunking_method: method,
        metadata: doc.metadata.clone(),
    }
}

/// Split a generated sectioning response on `---` separator lines.
pub fn parse_sections(raw: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in raw.lines() {
        if line.trim() == "---" {
            sections.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    sections.push(current);
    sections.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Splits markdown at `#` and `##` headings, ignoring fenced code blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingSectioner;

impl Sectioner for HeadingSectioner {
    fn name(&self) -> &str {
        "headings"
    }

    fn section(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut in_fence = false;
        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
            }
            let is_heading = !in_fence && (line.starts_with("# ") || line.starts_with("## "));
            if is_heading && !current.trim().is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            current.push('\n');
        }
        if !current.trim().is_empty() {
            sections.push(current);
        }
        Ok(sections.into_iter().map(|s| s.trim().to_string()).collect())
    }
}

/// Hands each document to an external program on stdin and reads sections
/// back from stdout, separated by `---` lines (see [`parse_sections`]).
///
/// A non-zero exit status is a sectioning failure, so the chunker falls back
/// to the sliding window for that document. With a timeout set, a child still
/// running at the deadline is killed.
#[derive(Debug, Clone)]
pub struct CommandSectioner {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl CommandSectioner {
    /// `argv[0]` is the program, the rest its arguments.
    pub fn new(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidConfig("section command is empty".into()))?;
        Ok(Self { program: program.clone(), args: args.to_vec(), timeout: None })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn read_pipe(mut pipe: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

impl Sectioner for CommandSectioner {
    fn name(&self) -> &str {
        &self.program
    }

    fn section(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.program))?;

        let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("child stdin unavailable"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("child stdout unavailable"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("child stderr unavailable"))?;
        let input = text.to_owned();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));
        let out_reader = thread::spawn(move || read_pipe(stdout));
        let err_reader = thread::spawn(move || read_pipe(stderr));

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = self.timeout.filter(|t| started.elapsed() >= *t) {
                // Reader threads are left to finish on their own; a grandchild may still hold the pipes.
                let _ = child.kill();
                let _ = child.wait();
                bail!("{} timed out after {}ms", self.program, limit.as_millis());
            }
            thread::sleep(CHILD_POLL_INTERVAL);
        };

        let stdout = out_reader.join().map_err(|_| anyhow!("stdout reader panicked"))??;
        let stderr = err_reader.join().map_err(|_| anyhow!("stderr reader panicked"))??;
        if !status.success() {
            bail!("{} exited with {}: {}", self.program, status, String::from_utf8_lossy(&stderr).trim());
        }
        writer.join().map_err(|_| anyhow!("stdin writer panicked"))??;
        Ok(parse_sections(&String::from_utf8_lossy(&stdout)))
    }
}
