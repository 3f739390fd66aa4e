use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_CHANNEL: &str = "mindriot101";

const API_KEY: &str = "API_KEY";
const CHANNEL: &str = "YOUTUBE_CHANNEL";
const API_BASE: &str = "YOUTUBE_API_BASE";
const ECHO_API_KEY: &str = "ECHO_API_KEY";

/// A non-empty API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for empty input. Any other value is accepted as-is.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// At most two leading characters followed by `****`, always fewer
    /// characters than the key itself.
    pub fn masked(&self) -> String {
        let shown = self.0.chars().count().saturating_sub(1).min(2);
        let prefix: String = self.0.chars().take(shown).collect();
        format!("{}****", prefix)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.masked()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<ApiKey>,
    pub channel: String,
    pub api_base: Url,
    pub echo_api_key: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            channel: DEFAULT_CHANNEL.to_string(),
            api_base: Url::parse(DEFAULT_API_BASE).expect("default api base is a valid url"),
            echo_api_key: true,
        }
    }
}

impl Config {
    /// Builds a config from an arbitrary key lookup, so callers can supply
    /// values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            api_key: lookup(API_KEY).and_then(ApiKey::new),
            ..Config::default()
        };

        if let Some(channel) = lookup(CHANNEL).filter(|c| !c.trim().is_empty()) {
            config.channel = channel.trim().to_string();
        }

        if let Some(base) = lookup(API_BASE).filter(|b| !b.trim().is_empty()) {
            config.api_base = Url::parse(base.trim()).map_err(|e| ConfigError::InvalidUrl {
                key: API_BASE,
                reason: e.to_string(),
            })?;
        }

        if let Some(echo) = lookup(ECHO_API_KEY) {
            config.echo_api_key = parse_bool(ECHO_API_KEY, &echo)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

/// Builds the config from the process environment, falling back to the
/// values in the env file at `path`. A missing file is not an error and the
/// process environment is never modified.
pub fn load(path: &Path) -> Result<Config> {
    load_with(path, |key| std::env::var(key).ok())
}

fn load_with<F>(path: &Path, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let file_vars = read_env_file(path)?;
    let config = Config::from_lookup(|key| {
        env(key).or_else(|| {
            file_vars
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
    })?;
    Ok(config)
}

fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => {
            debug!("no env file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(err) => return Err(err).with_context(|| format!("opening {}", path.display())),
    };
    let vars: Vec<(String, String)> = iter
        .collect::<Result<_, _>>()
        .with_context(|| format!("parsing {}", path.display()))?;
    debug!("read {} entries from {}", vars.len(), path.display());
    Ok(vars)
}
