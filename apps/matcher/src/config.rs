use std::str::FromStr;

use anyhow::{Context, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional: a request may supply its own key via the `api_key` form field.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// Total attempts per completion call. 1 means no retry.
    pub llm_max_attempts: u32,
    pub llm_timeout_secs: u64,
    pub match_concurrency: usize,
    pub lenient_score_parsing: bool,
    pub max_upload_mb: usize,
    pub run_retention: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            openai_model: optional_env("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_temperature: parse_env("LLM_TEMPERATURE", 0.2)?,
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", 500)?,
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 1)?,
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            match_concurrency: parse_env("MATCH_CONCURRENCY", 1)?,
            lenient_score_parsing: parse_env("LENIENT_SCORE_PARSING", false)?,
            max_upload_mb: parse_env("MAX_UPLOAD_MB", 25)?,
            run_retention: parse_env("RUN_RETENTION", 32)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        anyhow::ensure!(
            config.llm_max_attempts >= 1,
            "LLM_MAX_ATTEMPTS must be at least 1"
        );
        anyhow::ensure!(
            config.match_concurrency >= 1,
            "MATCH_CONCURRENCY must be at least 1"
        );
        anyhow::ensure!(config.run_retention >= 1, "RUN_RETENTION must be at least 1");

        Ok(config)
    }
}

/// Returns the variable's value, treating unset and blank the same way.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
