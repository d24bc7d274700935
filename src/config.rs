use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const HEALTH_TIMEOUT_SECS: u64 = 10;

/// How to reach the agent backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Sent as `X-API-Key` when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(HEALTH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub backend: BackendConfig,
}

/// Command line values that win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Resolve configuration from the process environment (after `.env`).
    pub fn load(overrides: Overrides) -> Result<Self> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration, reading variables through `lookup`.
    ///
    /// `AGENT_API_URL`, `UI_API_KEY`, `UI_HTTP_TIMEOUT`, `UI_CACHE_DIR`.
    pub fn from_lookup<F>(overrides: Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = overrides.data_dir.unwrap_or_else(default_data_dir);

        let cache_dir = overrides
            .cache_dir
            .or_else(|| lookup("UI_CACHE_DIR").filter(|s| !s.trim().is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join("cache"));

        let raw_url = overrides
            .backend_url
            .or_else(|| lookup("AGENT_API_URL"))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let base_url = normalize_base_url(&raw_url)?;

        let api_key = overrides
            .api_key
            .or_else(|| lookup("UI_API_KEY"))
            .filter(|key| !key.trim().is_empty());

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => secs,
            None => match lookup("UI_HTTP_TIMEOUT") {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .context("UI_HTTP_TIMEOUT must be a whole number of seconds")?,
                None => DEFAULT_TIMEOUT_SECS,
            },
        };
        if timeout_secs == 0 {
            bail!("HTTP timeout must be at least one second");
        }

        Ok(Config {
            data_dir,
            cache_dir,
            backend: BackendConfig {
                base_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
                health_timeout: Duration::from_secs(HEALTH_TIMEOUT_SECS),
            },
        })
    }

    pub fn profile_file(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }

    /// Weigh-ins and the start/target overrides.
    pub fn weights_file(&self) -> PathBuf {
        self.data_dir.join("weights.json")
    }

    /// Consultation requests sent to coaches.
    pub fn consultations_file(&self) -> PathBuf {
        self.data_dir.join("consultations.json")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weightpilot")
}

/// Validate an http(s) base URL and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("Invalid backend URL: {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Backend URL must use http or https: {raw:?}");
    }
    Ok(trimmed.to_string())
}
