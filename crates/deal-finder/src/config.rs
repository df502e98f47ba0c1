use std::path::PathBuf;
use std::time::Duration;

use deal_common::openai::{OPENAI_BASE_URL, PERPLEXITY_BASE_URL};

use crate::error::AppError;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Endpoint and model for one vendor.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub model: String,
}

impl Endpoint {
    fn from_env(prefix: &str, default_base_url: &str, default_model: &str) -> Self {
        let base_url = std::env::var(format!("{prefix}_BASE_URL"))
            .unwrap_or_else(|_| default_base_url.to_string());
        let model =
            std::env::var(format!("{prefix}_MODEL")).unwrap_or_else(|_| default_model.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

/// Settings for building provider adapters. API keys are not part of this;
/// they live in the settings store.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub openai: Endpoint,
    pub anthropic: Endpoint,
    pub gemini: Endpoint,
    pub perplexity: Endpoint,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 0,
            openai: Endpoint {
                base_url: OPENAI_BASE_URL.to_string(),
                model: "gpt-4o-mini".to_string(),
            },
            anthropic: Endpoint {
                base_url: ANTHROPIC_BASE_URL.to_string(),
                model: "claude-3-5-sonnet-latest".to_string(),
            },
            gemini: Endpoint {
                base_url: GEMINI_BASE_URL.to_string(),
                model: "gemini-1.5-flash".to_string(),
            },
            perplexity: Endpoint {
                base_url: PERPLEXITY_BASE_URL.to_string(),
                model: "sonar".to_string(),
            },
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL. When set, settings are stored in Redis instead of a file.
    pub redis_url: Option<String>,
    /// Location of the JSON settings file used when Redis is not configured.
    pub settings_path: PathBuf,
    pub providers: ProviderConfig,
}

impl Config {
    /// All variables are optional:
    /// - `REDIS_URL`
    /// - `DEAL_FINDER_SETTINGS_PATH` (default: `$HOME/.config/deal-finder/settings.json`)
    /// - `DEAL_FINDER_TIMEOUT_SECS` (default: 60)
    /// - `DEAL_FINDER_MAX_RETRIES` (default: 0)
    /// - `{OPENAI,ANTHROPIC,GEMINI,PERPLEXITY}_BASE_URL` and `..._MODEL`
    pub fn from_env() -> Result<Self, AppError> {
        let settings_path = match std::env::var("DEAL_FINDER_SETTINGS_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let home = std::env::var("HOME").map_err(|_| {
                    AppError::Config(
                        "DEAL_FINDER_SETTINGS_PATH is unset and HOME is unavailable".to_string(),
                    )
                })?;
                PathBuf::from(home)
                    .join(".config")
                    .join("deal-finder")
                    .join("settings.json")
            }
        };

        let timeout = parse_env::<u64>("DEAL_FINDER_TIMEOUT_SECS")?
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let max_retries = parse_env::<u32>("DEAL_FINDER_MAX_RETRIES")?.unwrap_or(0);

        let defaults = ProviderConfig::default();
        let providers = ProviderConfig {
            timeout,
            max_retries,
            openai: Endpoint::from_env("OPENAI", &defaults.openai.base_url, &defaults.openai.model),
            anthropic: Endpoint::from_env(
                "ANTHROPIC",
                &defaults.anthropic.base_url,
                &defaults.anthropic.model,
            ),
            gemini: Endpoint::from_env("GEMINI", &defaults.gemini.base_url, &defaults.gemini.model),
            perplexity: Endpoint::from_env(
                "PERPLEXITY",
                &defaults.perplexity.base_url,
                &defaults.perplexity.model,
            ),
        };

        Ok(Self {
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            settings_path,
            providers,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} must be a number, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}
