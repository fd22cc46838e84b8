//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "handoff.toml";
pub const ENV_PREFIX: &str = "HANDOFF_";

const MAX_KEY_LENGTH: usize = 64;

/// Fully resolved server configuration after all layers merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Characters keys are drawn from
    pub key_charset: String,
    pub key_length: usize,
    pub port: u16,
    /// How long an uploader waits for a downloader
    pub timeout_minutes: u64,
    /// Reaper sweep interval
    pub check_minutes: u64,
    /// Fallback directory for static assets
    pub static_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_charset: "abcdefghijklmnopqrstuvwxyz0123456789".to_string(),
            key_length: 10,
            port: 8080,
            timeout_minutes: 3,
            check_minutes: 3,
            static_dir: PathBuf::from("htdocs"),
        }
    }
}

impl AppConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.check_minutes * 60)
    }

    /// Rejects configurations the key generator or timers cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.key_charset.is_empty(),
            "Invalid config: key_charset must not be empty"
        );
        let mut seen = HashSet::new();
        for c in self.key_charset.chars() {
            ensure!(
                seen.insert(c),
                "Invalid config: key_charset contains '{c}' more than once"
            );
        }
        ensure!(
            self.key_length >= 1,
            "Invalid config: key_length must be >= 1"
        );
        ensure!(
            self.key_length <= MAX_KEY_LENGTH,
            "Invalid config: key_length must be <= {MAX_KEY_LENGTH}"
        );
        ensure!(
            self.timeout_minutes >= 1,
            "Invalid config: timeout_minutes must be >= 1"
        );
        ensure!(
            self.check_minutes >= 1,
            "Invalid config: check_minutes must be >= 1"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Loads config from defaults/file/env. A missing file is not an error.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(port) = overrides.port {
        config.port = port;
    }

    config
}
