use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::sync::DEFAULT_DEBOUNCE;

/// Client configuration loaded from environment variables.
/// Command-line values, when given, take precedence over the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub debounce: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env(api_url: Option<String>, state_dir: Option<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_url: match api_url {
                Some(url) => url,
                None => require_env("WIZARD_API_URL")?,
            },
            state_dir: state_dir.unwrap_or_else(|| {
                std::env::var("WIZARD_STATE_DIR")
                    .unwrap_or_else(|_| ".wizard".to_string())
                    .into()
            }),
            debounce: parse_debounce(std::env::var("WIZARD_DEBOUNCE_MS").ok().as_deref())?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_debounce(raw: Option<&str>) -> Result<Duration> {
    match raw {
        None => Ok(DEFAULT_DEBOUNCE),
        Some(ms) => ms
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .context("WIZARD_DEBOUNCE_MS must be a whole number of milliseconds"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
