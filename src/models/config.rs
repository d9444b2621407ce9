use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const EMBEDDING_URL_ENV: &str = "Embedding_URL";
pub const LLM_URL_ENV: &str = "LLM_URL";
pub const PORT_ENV: &str = "PORT";
pub const HOST_ENV: &str = "DSA_RAG_HOST";
pub const INDEX_PATH_ENV: &str = "DSA_RAG_INDEX_PATH";
pub const METADATA_PATH_ENV: &str = "DSA_RAG_METADATA_PATH";

pub const DEFAULT_VECTORS_PATH: &str = "DSAdataFaiss.faiss";
pub const DEFAULT_METADATA_PATH: &str = "DSAdataMeta.json";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_PORT: u16 = 8001;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dsa-rag").join("config.toml"))
    }

    pub fn metrics_db_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("dsa-rag").join("metrics.db"))
    }

    /// Load defaults, then the TOML file (explicit path or the global one), then
    /// the process environment (including a `.env` file in the working directory).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay environment settings read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(EMBEDDING_URL_ENV) {
            self.embedding.url = Some(url);
        }
        if let Some(url) = lookup(LLM_URL_ENV) {
            self.generation.url = Some(url);
        }
        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(path) = lookup(INDEX_PATH_ENV) {
            self.index.vectors_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(METADATA_PATH_ENV) {
            self.index.metadata_path = PathBuf::from(path);
        }
    }

    /// Both provider URLs must be present before the service can answer anything.
    pub fn require_endpoints(&self) -> Result<(), ConfigError> {
        if is_blank(self.embedding.url.as_deref()) {
            return Err(ConfigError::ValidationError(
                "missing Embedding URL in env variables".to_string(),
            ));
        }
        if is_blank(self.generation.url.as_deref()) {
            return Err(ConfigError::ValidationError(
                "missing LLM URL in env variables".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_vectors_path")]
    pub vectors_path: PathBuf,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_vectors_path() -> PathBuf {
    PathBuf::from(DEFAULT_VECTORS_PATH)
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from(DEFAULT_METADATA_PATH)
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            vectors_path: default_vectors_path(),
            metadata_path: default_metadata_path(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// End-to-end deadline for one query; 0 disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    7
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention_days: default_retention_days(),
        }
    }
}
