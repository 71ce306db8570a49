//! Configuration loading from the process environment.
//!
//! Recognized variables:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `USE_PERSISTENT_STORES` | `true` | `true` runs against Postgres, `false` against a seeded in-memory store |
//! | `DATABASE_URL` | none | Postgres connection string, required when persistent stores are used |
//! | `EXCLUSIVE_SESSIONS` | `false` | in-memory only: reject overlapping operations on one session |
//!
//! Values may also come from a `.env` file in the working directory or one of
//! its parents. Variables already set in the process environment win.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Number of trials each strategy runs per invocation.
pub const DEFAULT_TRIALS: u32 = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}' (expected true/false)")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read .env file: {0}")]
    EnvFile(String),
}

/// Which store the harness talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    InMemory { exclusive_sessions: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub backend: StoreBackend,
    pub trials: u32,
}

impl HarnessConfig {
    /// Process environment first, then the nearest `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = env_file_entries(dotenvy::dotenv_iter())?;
        Self::from_sources(|key| std::env::var(key).ok(), &file)
    }

    /// Like [`from_lookup`](Self::from_lookup), falling back to `file` for
    /// keys `env` does not know.
    pub fn from_sources<F>(env: F, file: &HashMap<String, String>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| env(key).or_else(|| file.get(key).cloned()))
    }

    /// Build a config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let persistent = parse_flag(&lookup, "USE_PERSISTENT_STORES", true)?;

        let backend = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory {
                exclusive_sessions: parse_flag(&lookup, "EXCLUSIVE_SESSIONS", false)?,
            }
        };

        Ok(Self {
            backend,
            trials: DEFAULT_TRIALS,
        })
    }
}

/// Entries of the dotenv file at `path`. A missing file yields no entries.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    env_file_entries(dotenvy::from_path_iter(path))
}

fn env_file_entries<R: std::io::Read>(
    found: Result<dotenvy::Iter<R>, dotenvy::Error>,
) -> Result<HashMap<String, String>, ConfigError> {
    match found {
        Ok(iter) => iter
            .map(|entry| entry.map_err(|e| ConfigError::EnvFile(e.to_string())))
            .collect(),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(ConfigError::EnvFile(e.to_string())),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}
