use anyhow::{Context, Result};
use newsroll_core::scoring::KeywordRule;
use newsroll_core::summarize::SummarySettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub media: MediaConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
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
pub struct MediaConfig {
    pub root: PathBuf,
    #[serde(default = "default_media_base_url")]
    pub base_url: String,
}

fn default_media_base_url() -> String {
    "/storage".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: default_llm_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl SummarizerConfig {
    /// Resolve the API key (config value first, then the environment) into
    /// the settings the summarizer runs with. No key means summaries are off.
    pub fn settings(&self) -> SummarySettings {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty());

        SummarySettings {
            api_key,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens_default: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub keywords: Vec<KeywordRule>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=2.0).contains(&config.summarizer.temperature) {
        anyhow::bail!("summarizer.temperature must be in [0.0, 2.0]");
    }

    if config.summarizer.max_tokens == 0 {
        anyhow::bail!("summarizer.max_tokens must be > 0");
    }

    for (i, rule) in config.scoring.keywords.iter().enumerate() {
        if rule.keyword.trim().is_empty() {
            anyhow::bail!("scoring.keywords[{}].keyword must not be empty", i);
        }
        if rule.tag.trim().is_empty() {
            anyhow::bail!("scoring.keywords[{}].tag must not be empty", i);
        }
    }

    Ok(config)
}
