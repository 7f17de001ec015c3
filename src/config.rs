//! TOML configuration.
//!
//! Every section is optional and falls back to defaults, so an empty file is
//! a valid configuration:
//!
//! ```toml
//! [documents]
//! new_dir = "./data/new"
//! processed_dir = "./data/processed"
//!
//! [vector_store]
//! path = "./data/vectors.sqlite"
//! collection = "documents"
//!
//! [embedding]
//! provider = "openai"            # openai | ollama | disabled
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! model = "gpt-4o-mini"
//! temperature = 0.5
//!
//! [sql]
//! path = "./data/sqlite_data.db"
//! ```

use anyhow::{bail, Context, Result};
use docchat_core::chunk::ChunkingParams;
use docchat_core::prompt::{self, PromptConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_new_dir")]
    pub new_dir: PathBuf,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            new_dir: default_new_dir(),
            processed_dir: default_processed_dir(),
        }
    }
}

fn default_new_dir() -> PathBuf {
    PathBuf::from("./data/new")
}
fn default_processed_dir() -> PathBuf {
    PathBuf::from("./data/processed")
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_vector_path(),
            collection: default_collection(),
        }
    }
}

fn default_vector_path() -> PathBuf {
    PathBuf::from("./data/vectors.sqlite")
}
fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
        }
    }
}

fn default_max_chars() -> usize {
    2048
}
fn default_overlap_chars() -> usize {
    280
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default = "default_embedding_dims")]
    pub dims: Option<usize>,
    /// Base URL of the embedding API. Defaults to the OpenAI API for
    /// `openai` and to `http://localhost:11434` for `ollama`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-3-small".to_string())
}
fn default_embedding_dims() -> Option<usize> {
    Some(1536)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    512
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_window: default_history_window(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_history_window() -> usize {
    docchat_core::chat::DEFAULT_HISTORY_WINDOW
}

/// Prompt template overrides. Unset fields keep the built-in templates.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    pub system: Option<String>,
    pub context_template: Option<String>,
    pub rewrite_system: Option<String>,
    pub rewrite_template: Option<String>,
    pub sql_agent: Option<String>,
}

impl PromptsConfig {
    pub fn to_prompt_config(&self) -> PromptConfig {
        let pick = |v: &Option<String>, default: &str| v.clone().unwrap_or_else(|| default.to_string());
        PromptConfig {
            system: pick(&self.system, prompt::DEFAULT_SYSTEM_PROMPT),
            context_template: pick(&self.context_template, prompt::DEFAULT_CONTEXT_TEMPLATE),
            rewrite_system: pick(&self.rewrite_system, prompt::DEFAULT_REWRITE_SYSTEM_PROMPT),
            rewrite_template: pick(&self.rewrite_template, prompt::DEFAULT_REWRITE_TEMPLATE),
            sql_agent: pick(&self.sql_agent, prompt::DEFAULT_SQL_AGENT_PROMPT),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlConfig {
    #[serde(default = "default_sql_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            path: default_sql_path(),
            max_iterations: default_max_iterations(),
            temperature: 0.0,
        }
    }
}

fn default_sql_path() -> PathBuf {
    PathBuf::from("./data/sqlite_data.db")
}
fn default_max_iterations() -> usize {
    docchat_core::agent::DEFAULT_MAX_ITERATIONS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily rolling log files. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn prompt_config(&self) -> PromptConfig {
        self.prompts.to_prompt_config()
    }

    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            bail!("chunking.overlap_chars must be < chunking.max_chars");
        }

        // Validate retrieval
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.history_window < 1 {
            bail!("retrieval.history_window must be >= 1");
        }

        if self.vector_store.collection.trim().is_empty() {
            bail!("vector_store.collection must not be empty");
        }

        // Validate llm
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }
        if !(0.0..=2.0).contains(&self.sql.temperature) {
            bail!("sql.temperature must be in [0.0, 2.0]");
        }
        if self.sql.max_iterations < 1 {
            bail!("sql.max_iterations must be >= 1");
        }

        // Validate embedding
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.batch_size == 0 {
                bail!("embedding.batch_size must be > 0");
            }
        }

        if !self.prompts.to_prompt_config().context_template.contains("{context_str}") {
            bail!("prompts.context_template must contain {{context_str}}");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
