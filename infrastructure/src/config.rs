use anyhow::Context;
use domain::models::Metric;
use domain::sampling::SamplingParams;
use dotenvy::dotenv;
use shared::types::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::corpus::DEFAULT_QUESTION;

/// Runtime settings. Defaults, then `.env`, then the process environment;
/// the CLI layers its flags on top.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: String,
    pub embed_model: String,
    pub generation_model: String,
    pub tokenizer: String,
    /// `None` keeps the store in memory.
    pub db_path: Option<PathBuf>,
    pub collection: String,
    pub top_k: usize,
    pub metric: Metric,
    pub sampling: SamplingParams,
    /// `None` uses the built-in corpus.
    pub corpus_path: Option<PathBuf>,
    pub question: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            generation_model: "qwen3:0.6b".to_string(),
            tokenizer: "Qwen/Qwen3-0.6B".to_string(),
            db_path: None,
            collection: "xyz".to_string(),
            top_k: 2,
            metric: Metric::Cosine,
            sampling: SamplingParams::default(),
            corpus_path: None,
            question: DEFAULT_QUESTION.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sampling = SamplingParams {
            max_new_tokens: parse_or(&get, "RAG_MAX_NEW_TOKENS", defaults.sampling.max_new_tokens)?,
            temperature: parse_or(&get, "RAG_TEMPERATURE", defaults.sampling.temperature)?,
            top_p: parse_or(&get, "RAG_TOP_P", defaults.sampling.top_p)?,
            top_k: parse_or(&get, "RAG_SAMPLING_TOP_K", defaults.sampling.top_k)?,
            seed: get("RAG_SEED")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .context("RAG_SEED must be an unsigned integer")?,
        };

        let config = Self {
            ollama_base_url: get("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            embed_model: get("RAG_EMBED_MODEL").unwrap_or(defaults.embed_model),
            generation_model: get("RAG_GENERATION_MODEL").unwrap_or(defaults.generation_model),
            tokenizer: get("RAG_TOKENIZER").unwrap_or(defaults.tokenizer),
            db_path: get("RAG_DB_PATH").map(PathBuf::from),
            collection: get("RAG_COLLECTION").unwrap_or(defaults.collection),
            top_k: parse_or(&get, "RAG_TOP_K", defaults.top_k)?,
            metric: parse_or(&get, "RAG_METRIC", defaults.metric)?,
            sampling,
            corpus_path: get("RAG_CORPUS").map(PathBuf::from),
            question: get("RAG_QUESTION").unwrap_or(defaults.question),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            anyhow::bail!("collection name must not be empty");
        }
        self.sampling.validate()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key} ('{raw}'): {e}")),
        None => Ok(default),
    }
}
