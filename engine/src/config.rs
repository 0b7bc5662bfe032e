//! Configuration for the engine and its binary front end.
//!
//! Two layers: [`NutcrackerConfig`] is the on-disk TOML file at
//! `~/.nutcracker/config.toml`, every field optional; [`EngineConfig`] is the
//! resolved set of runtime tunables an engine instance actually runs with.
//! Secrets in the file may reference environment variables with `${VAR}`
//! syntax so the key never has to live in the file itself.

use nutcracker_client::{DEFAULT_ORACLE_URL, DEFAULT_STATS_URL};
use nutcracker_types::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use thiserror::Error;

/// Guesses per submitted batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Pause between cycle completion and the next generation.
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(10);
/// Window after which the whole engine log is cleared.
pub const DEFAULT_LOG_RETENTION: Duration = Duration::from_secs(60 * 60);
/// Cadence of the display pollers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Resolved runtime tunables for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub oracle_url: String,
    pub stats_url: String,
    pub batch_size: usize,
    pub cycle_delay: Duration,
    pub log_retention: Duration,
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            stats_url: DEFAULT_STATS_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            cycle_delay: DEFAULT_CYCLE_DELAY,
            log_retention: DEFAULT_LOG_RETENTION,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// On-disk configuration file.
///
/// ```toml
/// [account]
/// api_key = "${NUTCRACKER_API_KEY}"
/// wallet_address = "5Kd3NBUAdUnhyzenEwVLy9pBKxSwXvE9FMPyR4UKZvpe"
///
/// [engine]
/// batch_size = 50
/// cycle_delay_secs = 10
///
/// [api]
/// oracle_url = "https://api.erwin.lol"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct NutcrackerConfig {
    pub account: Option<AccountSection>,
    pub engine: Option<EngineSection>,
    pub api: Option<ApiSection>,
}

#[derive(Default, Deserialize)]
pub struct AccountSection {
    pub api_key: Option<String>,
    pub wallet_address: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for AccountSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = if self.api_key.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("AccountSection")
            .field("api_key", &masked)
            .field("wallet_address", &self.wallet_address)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    pub batch_size: Option<usize>,
    pub cycle_delay_secs: Option<u64>,
    pub log_retention_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSection {
    pub oracle_url: Option<String>,
    pub stats_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl NutcrackerConfig {
    /// Load from the default location. An absent file is not an error; the
    /// defaults carry a usable read-only setup.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Account credentials with `${VAR}` references expanded. A missing
    /// account section yields credentials with a blank key, which the
    /// engine refuses to start with.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        let account = self.account.as_ref();
        let api_key = account
            .and_then(|a| a.api_key.as_deref())
            .map(expand_env_vars)
            .unwrap_or_default();
        let wallet_address = account
            .and_then(|a| a.wallet_address.as_deref())
            .map(expand_env_vars)
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty());
        Credentials::new(api_key, wallet_address)
    }

    /// Resolve runtime tunables, file values overriding defaults. A batch
    /// holds at least one guess; a configured `batch_size` of zero is
    /// ignored in favor of the default.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut resolved = EngineConfig::default();
        if let Some(api) = &self.api {
            if let Some(url) = &api.oracle_url {
                resolved.oracle_url = url.clone();
            }
            if let Some(url) = &api.stats_url {
                resolved.stats_url = url.clone();
            }
        }
        if let Some(engine) = &self.engine {
            match engine.batch_size {
                Some(0) => tracing::warn!("ignoring batch_size = 0; keeping the default"),
                Some(size) => resolved.batch_size = size,
                None => {}
            }
            if let Some(secs) = engine.cycle_delay_secs {
                resolved.cycle_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = engine.log_retention_secs {
                resolved.log_retention = Duration::from_secs(secs);
            }
            if let Some(secs) = engine.poll_interval_secs {
                resolved.poll_interval = Duration::from_secs(secs);
            }
        }
        resolved
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".nutcracker").join("config.toml"))
}

/// Expand `${VAR}` references against the process environment. Missing
/// variables expand to nothing; an unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
