//! Local documentation ingestion: markdown files with optional front matter.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::types::{Document, Meta};

#[derive(Default)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Load every `.md` / `.mdx` file under `data_dir`, sorted by path.
    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.load_files(data_dir, self.list_markdown_files(data_dir))
    }

    pub fn load_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_markdown_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited to first {} files", limit);
        }
        self.load_files(data_dir, files)
    }

    fn load_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Document>> {
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no markdown files found");
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for file_path in &files {
            let raw = self.read_file_content(file_path)?;
            let filename = relative_name(file_path, data_dir);
            let (mut metadata, body) = split_front_matter(&raw);
            metadata.insert("path".into(), file_path.to_string_lossy().into_owned().into());
            documents.push(Document { filename, content: body.to_string(), metadata });
        }
        info!(dir = %data_dir.display(), documents = documents.len(), "loaded documents");
        Ok(documents)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_markdown_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("mdx"))
            })
            .collect();
        files.sort();
        files
    }
}

fn relative_name(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split `---` delimited front matter from the body. Only flat `key: value`
/// lines are read; anything without a closing delimiter is all body.
pub fn split_front_matter(raw: &str) -> (Meta, &str) {
    let mut meta = Meta::new();
    let Some(rest) = raw.strip_prefix("---") else {
        return (meta, raw);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (meta, raw);
    };

    let mut offset = 0;
    let mut close = None;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let Some((yaml_end, body_start)) = close else {
        return (meta, raw);
    };

    for line in rest[..yaml_end].lines() {
        if line.starts_with([' ', '\t', '-']) {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if !key.trim().is_empty() && !value.is_empty() {
                meta.insert(key.trim().to_string(), value.into());
            }
        }
    }
    (meta, &rest[body_start..])
}
