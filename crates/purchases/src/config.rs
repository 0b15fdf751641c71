//! Settings for the purchase sync daemon
//!
//! Settings are loaded from (in order of priority):
//! 1. The JSON file named by `TALLY_CONFIG`
//! 2. `~/.config/tally/settings.json`
//! 3. Environment variables
//!
//! Credentials left empty in a settings file are filled from
//! `PAYPAL_CLIENT_ID` / `PAYPAL_SECRET`, so secrets can stay out of the file.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Checkpoint, parse_api_time};
use crate::paypal::PaypalClient;
use crate::storage::FileCheckpointStore;
use crate::sync::{DEFAULT_ORIGIN_ID, SyncOptions, max_window};

/// Settings filename in the Tally config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable pointing at an explicit settings file
pub const SETTINGS_PATH_ENV: &str = "TALLY_CONFIG";

/// Default database filename in the Tally config directory
const DATABASE_FILE: &str = "purchases.sqlite";

const DEFAULT_INTERVAL_MINUTES: u64 = 20;

/// Complete daemon settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub paypal: PaypalSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Which PayPal environment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaypalEnvironment {
    #[default]
    Live,
    Sandbox,
}

/// REST app credentials and endpoint
#[derive(Clone, Deserialize)]
pub struct PaypalSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub environment: PaypalEnvironment,
    /// Overrides the environment's base URL (e.g. a local mock)
    pub base_url: Option<String>,
}

/// Destination database
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file; defaults to ~/.config/tally/purchases.sqlite
    pub path: Option<PathBuf>,
}

/// Sync engine tunables
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_origin_id")]
    pub origin_id: i64,
    /// Where to start when no checkpoint exists (`YYYY-MM-DDTHH:MM:SSZ`)
    pub epoch: Option<String>,
    /// Checkpoint file; defaults to ~/.config/tally/lastrun.json
    pub checkpoint_path: Option<PathBuf>,
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "purchases=debug")
    pub level: Option<String>,
}

fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_origin_id() -> i64 {
    DEFAULT_ORIGIN_ID
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            origin_id: DEFAULT_ORIGIN_ID,
            epoch: None,
            checkpoint_path: None,
        }
    }
}

impl fmt::Debug for PaypalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaypalSettings")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl PaypalSettings {
    /// Base URL of the REST API
    pub fn api_url(&self) -> &str {
        match (&self.base_url, self.environment) {
            (Some(url), _) => url,
            (None, PaypalEnvironment::Live) => PaypalClient::LIVE_URL,
            (None, PaypalEnvironment::Sandbox) => PaypalClient::SANDBOX_URL,
        }
    }
}

impl Settings {
    /// Load settings using the following priority:
    /// 1. File named by `TALLY_CONFIG`
    /// 2. ~/.config/tally/settings.json
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let mut settings = if let Some(path) = env(SETTINGS_PATH_ENV) {
            Self::from_file(Path::new(&path))?
        } else if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            Self::from_env_with(env)?
        };

        settings.fill_credentials_with(env);
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    /// Build settings from environment variables, using defaults for
    /// everything that is not a credential
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let client_id = lookup("PAYPAL_CLIENT_ID").context("PAYPAL_CLIENT_ID environment variable not set")?;
        let secret = lookup("PAYPAL_SECRET").context("PAYPAL_SECRET environment variable not set")?;

        let environment = match lookup("PAYPAL_ENVIRONMENT").as_deref() {
            None | Some("live") => PaypalEnvironment::Live,
            Some("sandbox") => PaypalEnvironment::Sandbox,
            Some(other) => bail!("Unknown PAYPAL_ENVIRONMENT: {}", other),
        };

        Ok(Self {
            paypal: PaypalSettings {
                client_id,
                secret,
                environment,
                base_url: None,
            },
            database: DatabaseSettings {
                path: lookup("TALLY_DATABASE_PATH").map(PathBuf::from),
            },
            sync: SyncSettings::default(),
            logging: LoggingSettings::default(),
        })
    }

    /// Fill empty credentials from `PAYPAL_CLIENT_ID` / `PAYPAL_SECRET`
    pub fn fill_credentials_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.paypal.client_id.is_empty() {
            if let Some(id) = lookup("PAYPAL_CLIENT_ID") {
                self.paypal.client_id = id;
            }
        }
        if self.paypal.secret.is_empty() {
            if let Some(secret) = lookup("PAYPAL_SECRET") {
                self.paypal.secret = secret;
            }
        }
    }

    /// Check settings that would otherwise only fail at the first cycle
    pub fn validate(&self) -> Result<()> {
        if self.paypal.client_id.trim().is_empty() {
            bail!("paypal.client_id is empty");
        }
        if self.paypal.secret.trim().is_empty() {
            bail!("paypal.secret is empty");
        }
        if self.sync.interval_minutes == 0 {
            bail!("sync.interval_minutes must be at least 1");
        }
        self.epoch()?;
        Ok(())
    }

    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_minutes.saturating_mul(60))
    }

    /// Starting checkpoint for a fresh install
    pub fn epoch(&self) -> Result<Checkpoint> {
        match &self.sync.epoch {
            None => Ok(Checkpoint::epoch()),
            Some(s) => parse_api_time(s)
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)))
                .map(Checkpoint::new)
                .with_context(|| format!("Invalid sync.epoch: {}", s)),
        }
    }

    /// Engine options derived from these settings
    pub fn sync_options(&self) -> Result<SyncOptions> {
        Ok(SyncOptions {
            origin_id: self.sync.origin_id,
            epoch: self.epoch()?,
            max_window: max_window(),
        })
    }

    /// Resolved SQLite database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => config::config_path(DATABASE_FILE).context("Could not determine config directory"),
        }
    }

    /// Checkpoint store at the configured (or default) location
    pub fn checkpoint_store(&self) -> Result<FileCheckpointStore> {
        match &self.sync.checkpoint_path {
            Some(path) => Ok(FileCheckpointStore::new(path)),
            None => FileCheckpointStore::in_config_dir(),
        }
    }

    /// Default settings file path (~/.config/tally/settings.json)
    pub fn default_settings_path() -> Option<PathBuf> {
        config::config_path(SETTINGS_FILE)
    }
}
