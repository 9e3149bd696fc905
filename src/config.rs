use std::{env, path::Path, time::Duration};

use hpit_client::{http_transport::DEFAULT_URL_ROOT, Identity};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

pub const URL_ROOT_KEY: &str = "HPIT_URL_ROOT";
pub const POLL_WAIT_KEY: &str = "HPIT_POLL_WAIT_MS";
pub const REQUEST_TIMEOUT_KEY: &str = "HPIT_REQUEST_TIMEOUT_SECS";
pub const ENTITY_ID_KEY: &str = "HPIT_ENTITY_ID";
pub const API_KEY_KEY: &str = "HPIT_API_KEY";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Where the hub lives and who we are when talking to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubSettings {
    pub url_root: String,
    pub poll_wait_ms: u64,
    pub request_timeout_secs: u64,
    pub entity_id: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            url_root: DEFAULT_URL_ROOT.to_string(),
            poll_wait_ms: 500,
            request_timeout_secs: 30,
            entity_id: None,
            api_key: None,
        }
    }
}

impl HubSettings {
    /// Primes the process environment from `env_file` (when it exists) and
    /// reads the settings from it.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(env_file) = env_file {
            if env_file.exists() {
                dotenvy::from_path(env_file).ok();
                info!("Loaded .env from {}", env_file.display());
            } else {
                error!("could not load .env from {}", env_file.display())
            }
        } else {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads every key through `lookup`, falling back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            url_root: non_empty(URL_ROOT_KEY).unwrap_or(defaults.url_root),
            poll_wait_ms: parse_number(POLL_WAIT_KEY, non_empty(POLL_WAIT_KEY))?
                .unwrap_or(defaults.poll_wait_ms),
            request_timeout_secs: parse_number(REQUEST_TIMEOUT_KEY, non_empty(REQUEST_TIMEOUT_KEY))?
                .unwrap_or(defaults.request_timeout_secs),
            entity_id: non_empty(ENTITY_ID_KEY),
            api_key: non_empty(API_KEY_KEY),
        })
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Credentials are only required for commands that talk to the hub.
    pub fn identity(&self) -> Result<Identity, ConfigError> {
        let entity_id = self.entity_id.as_ref().ok_or(ConfigError::Missing(ENTITY_ID_KEY))?;
        let api_key = self.api_key.as_ref().ok_or(ConfigError::Missing(API_KEY_KEY))?;
        Ok(Identity::new(entity_id, api_key))
    }
}

fn parse_number(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { key, value: v })
        })
        .transpose()
}
