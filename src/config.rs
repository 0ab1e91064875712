//! Environment-driven configuration, loaded once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub qdrant_url: String,
    pub database_url: String,
    /// Similarity below this short-circuits the RAG answer.
    pub rag_min_score: f32,
    /// Default match count when the caller does not override it.
    pub rag_top_k: u64,
    pub rag_max_top_k: u64,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            openai_api_key: env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY must be set")?,
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            qdrant_url: var_or("QDRANT_URL", "http://localhost:6334"),
            database_url: var_or("DATABASE_URL", "sqlite://pitchdesk.db?mode=rwc"),
            rag_min_score: parse_or("RAG_MIN_SCORE", 0.65)?,
            rag_top_k: parse_or("RAG_TOP_K", 4)?,
            rag_max_top_k: parse_or("RAG_MAX_TOP_K", 12)?,
            rate_limit_max: parse_or("RATE_LIMIT_MAX", 10)?,
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 60)?),
            chunk_size: parse_or("CHUNK_SIZE", 1200)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 150)?,
        };
        anyhow::ensure!(
            config.chunk_overlap < config.chunk_size,
            "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
            config.chunk_overlap,
            config.chunk_size
        );
        Ok(config)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
