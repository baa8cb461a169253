//! Optional TOML configuration.
//!
//! ```toml
//! [exec]
//! timeout_secs = 1800
//!
//! [inventory]
//! ttl_secs = 3600
//! cache_dir = "/var/tmp/macprov"
//!
//! [fetch]
//! backend = "curl"   # or "native"
//! verbose = false
//!
//! [install]
//! target = "/"
//! ```
//!
//! Every key is optional; a missing file yields [`Config::default`].
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::exec::DEFAULT_TIMEOUT;
use crate::install::DEFAULT_TARGET;
use crate::inventory::DEFAULT_TTL;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MACPROV_CONFIG";

/// Config file used when neither `--config` nor [`CONFIG_ENV`] is set.
pub const DEFAULT_CONFIG_PATH: &str = "/Library/Preferences/macprov.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Process execution settings.
    pub exec: ExecConfig,
    /// Inventory cache settings.
    pub inventory: InventoryConfig,
    /// Download settings.
    pub fetch: FetchConfig,
    /// Package installation settings.
    pub install: InstallConfig,
}

/// `[exec]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecConfig {
    /// Seconds before a running command is killed.
    pub timeout_secs: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// `[inventory]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InventoryConfig {
    /// Snapshot lifetime in seconds.
    pub ttl_secs: u64,
    /// Directory holding the cache slots; the temporary directory when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            cache_dir: None,
        }
    }
}

/// How URLs are downloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// `/usr/bin/curl`.
    #[default]
    Curl,
    /// In-process HTTP(S) client.
    Native,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Download backend.
    pub backend: FetchBackend,
    /// Show transfer diagnostics by default.
    pub verbose: bool,
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Default install target volume.
    pub target: PathBuf,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from(DEFAULT_TARGET),
        }
    }
}

impl Config {
    /// Choose the config file: `explicit`, then `$MACPROV_CONFIG`, then
    /// [`DEFAULT_CONFIG_PATH`].
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV)
                    .filter(|v| !v.is_empty())
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
            },
            Path::to_path_buf,
        )
    }

    /// Load `path`, returning defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid TOML, unknown keys or a zero
    /// `exec.timeout_secs`.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.exec.timeout_secs == 0 {
            anyhow::bail!("exec.timeout_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Per-invocation command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.exec.timeout_secs)
    }

    /// Inventory snapshot lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.inventory.ttl_secs)
    }

    /// Directory for inventory cache slots.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.inventory
            .cache_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
