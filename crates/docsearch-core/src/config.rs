//! Layered configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge compiled-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_CHUNKING__WINDOW_SIZE=500`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::Fusion;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and the `RUST_ENV` overlay from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment. Relative paths resolve against `base_dir`.
    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated settings with data paths resolved against the config directory.
    pub fn settings(&self) -> crate::Result<Settings> {
        let mut settings: Settings =
            self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        settings.data.resolve_paths(&self.base_dir);
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunking.window_size == 0 || self.chunking.step_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "chunking.window_size and chunking.step_size must be positive (got {} / {})",
                self.chunking.window_size, self.chunking.step_size
            )));
        }
        if self.chunking.sectioning == Sectioning::Command && self.chunking.section_command.is_empty() {
            return Err(Error::InvalidConfig("chunking.section_command is required when sectioning = \"command\"".into()));
        }
        if let Fusion::Blended { alpha } = self.search.fusion {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(Error::InvalidConfig(format!("search.fusion.alpha must be within [0, 1], got {alpha}")));
            }
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_dir: PathBuf,
    pub corpus_path: PathBuf,
    pub embeddings_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            corpus_path: PathBuf::from("chunks.json"),
            embeddings_path: PathBuf::from("embeddings.npy"),
        }
    }
}

impl DataSettings {
    fn resolve_paths(&mut self, base: &Path) {
        for p in [&mut self.docs_dir, &mut self.corpus_path, &mut self.embeddings_path] {
            *p = resolve_with_base(base, p.to_string_lossy());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sectioning {
    #[default]
    Off,
    Headings,
    /// Pipe each document through `chunking.section_command`.
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub window_size: usize,
    pub step_size: usize,
    /// Documents longer than this (in chars) skip the sectioner.
    pub max_section_chars: usize,
    pub section_timeout_ms: u64,
    pub sectioning: Sectioning,
    /// Program and arguments for `sectioning = "command"`.
    pub section_command: Vec<String>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            window_size: 2000,
            step_size: 1000,
            max_section_chars: 20_000,
            section_timeout_ms: 30_000,
            sectioning: Sectioning::Off,
            section_command: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub text_fields: Vec<String>,
    pub num_results: usize,
    /// Results returned through the tool-facing `text_search`.
    pub tool_results: usize,
    pub snippet_chars: usize,
    pub fusion: Fusion,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            text_fields: vec!["content".to_string(), "filename".to_string()],
            num_results: 5,
            tool_results: 2,
            snippet_chars: 600,
            fusion: Fusion::FirstSeen,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Hash,
    Bert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub dim: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Hash, dim: 384, model_dir: None, max_len: 256, batch_size: 32 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Config::from_figment(figment, Path::new("/srv/docs"))
    }

    #[test]
    fn defaults_match_ingestion_pipeline() {
        let s = from_toml("").settings().expect("settings");
        assert_eq!(s.chunking.window_size, 2000);
        assert_eq!(s.chunking.step_size, 1000);
        assert_eq!(s.search.text_fields, vec!["content", "filename"]);
        assert_eq!(s.search.fusion, Fusion::FirstSeen);
        assert_eq!(s.data.corpus_path, PathBuf::from("/srv/docs/chunks.json"));
    }

    #[test]
    fn toml_overrides_nested_keys() {
        let s = from_toml(
            r#"
            [chunking]
            window_size = 500
            step_size = 250
            sectioning = "headings"

            [search.fusion]
            strategy = "blended"
            alpha = 0.3
            "#,
        )
        .settings()
        .expect("settings");
        assert_eq!(s.chunking.window_size, 500);
        assert_eq!(s.chunking.sectioning, Sectioning::Headings);
        assert_eq!(s.search.fusion, Fusion::Blended { alpha: 0.3 });
        assert_eq!(s.search.num_results, 5);
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = from_toml("[chunking]\nstep_size = 0").settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn command_sectioning_needs_a_command() {
        let err = from_toml("[chunking]\nsectioning = \"command\"").settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        let ok = from_toml("[chunking]\nsectioning = \"command\"\nsection_command = [\"llm-sections\", \"--json\"]").settings().unwrap();
        assert_eq!(ok.chunking.section_command, vec!["llm-sections", "--json"]);
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        let err = from_toml("[search.fusion]\nstrategy = \"blended\"\nalpha = 1.5").settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let p = resolve_with_base(Path::new("/base"), "/abs/file.json");
        assert_eq!(p, PathBuf::from("/abs/file.json"));
        let p = resolve_with_base(Path::new("/base"), "rel/file.json");
        assert_eq!(p, PathBuf::from("/base/rel/file.json"));
    }
}
