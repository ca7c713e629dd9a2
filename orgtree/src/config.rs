//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/orgtree/orgtree.toml`
//! 3. Explicit config file (`--config PATH`)
//! 4. Environment variables: `ORGTREE_*` prefix
//! 5. Command line flags (`--url`, `--policy`), see [`Settings::apply_overrides`]

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::services::{SyncOptions, SyncPolicy};
use crate::application::ApplicationError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:7000";

/// Unified configuration for orgtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Root of the REST service; the collection lives at `<base_url>/tree`
    pub base_url: String,
    /// Per-request timeout for remote calls
    pub request_timeout_secs: u64,
    /// Extra attempts for a failed remote write
    pub retry_count: u32,
    /// Pause between write retries, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// When local state changes relative to remote confirmation
    pub sync_policy: SyncPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
            retry_count: 0,
            retry_backoff_ms: 250,
            sync_policy: SyncPolicy::default(),
        }
    }
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RawSettings {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub retry_count: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub sync_policy: Option<SyncPolicy>,
}

/// Get the XDG config directory for orgtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "orgtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("orgtree.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// The `ORGTREE_*` environment source, e.g. `ORGTREE_BASE_URL`.
pub fn env_source() -> Environment {
    Environment::with_prefix("ORGTREE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Value of `key`, `None` when unset.
fn get_opt<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get::<T>(key) {
        Ok(v) => Ok(Some(v)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

impl Settings {
    /// Merge overlay onto self; overlay wins where specified.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            base_url: overlay
                .base_url
                .clone()
                .unwrap_or_else(|| self.base_url.clone()),
            request_timeout_secs: overlay
                .request_timeout_secs
                .unwrap_or(self.request_timeout_secs),
            retry_count: overlay.retry_count.unwrap_or(self.retry_count),
            retry_backoff_ms: overlay.retry_backoff_ms.unwrap_or(self.retry_backoff_ms),
            sync_policy: overlay.sync_policy.unwrap_or(self.sync_policy),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line; must exist
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_layers(global_config_path().as_deref(), explicit, env_source())
    }

    /// Layered loading with every source supplied by the caller.
    pub fn load_layers(
        global: Option<&Path>,
        explicit: Option<&Path>,
        env: Environment,
    ) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config, skipped when absent
        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(global_path)?);
            }
        }

        // 3. Explicit config file
        if let Some(path) = explicit {
            debug!("loading config {}", path.display());
            current = current.merge_with(&load_raw_settings(path)?);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current, env)?;

        current.validate()?;
        Ok(current)
    }

    /// Apply ORGTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(settings: Self, env: Environment) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        let sync_policy = match get_opt::<String>(&config, "sync_policy")? {
            Some(raw) => Some(
                raw.parse::<SyncPolicy>()
                    .map_err(|message| ApplicationError::Config { message })?,
            ),
            None => None,
        };
        let overlay = RawSettings {
            base_url: get_opt(&config, "base_url")?,
            request_timeout_secs: get_opt(&config, "request_timeout_secs")?,
            retry_count: get_opt(&config, "retry_count")?,
            retry_backoff_ms: get_opt(&config, "retry_backoff_ms")?,
            sync_policy,
        };
        Ok(settings.merge_with(&overlay))
    }

    /// Apply command line flags, the highest layer.
    pub fn apply_overrides(&mut self, url: Option<&str>, policy: Option<SyncPolicy>) {
        if let Some(url) = url {
            self.base_url = url.to_string();
        }
        if let Some(policy) = policy {
            self.sync_policy = policy;
        }
    }

    /// Reject values no remote client can work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApplicationError::Config {
                message: format!("base_url must start with http:// or https://: '{url}'"),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ApplicationError::Config {
                message: "request_timeout_secs must be greater than 0".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retry_count: self.retry_count,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# orgtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/orgtree/orgtree.toml
#   Explicit: orgtree --config <file>
#   Env:     ORGTREE_* environment variables (e.g. ORGTREE_BASE_URL)
#   Flags:   --url, --policy

# Root of the REST service, the collection lives at <base_url>/tree
# base_url = "http://localhost:7000"

# Timeout for a single remote request
# request_timeout_secs = 10

# Extra attempts for a failed remote write, and the pause between them
# retry_count = 0
# retry_backoff_ms = 250

# optimistic-no-rollback | optimistic-with-rollback | pessimistic
# sync_policy = "optimistic-no-rollback"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
