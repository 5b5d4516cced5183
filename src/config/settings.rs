//! Fixture settings
//!
//! Controls how the fixture provisions its instance and what the per-test
//! reset touches. Settings come from an optional `pgharness.toml`, then
//! `PGHARNESS_*` environment variables override individual keys.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit settings file
pub const CONFIG_PATH_ENV: &str = "PGHARNESS_CONFIG";

/// Environment variable pointing the fixture at an existing database
pub const DATABASE_URL_ENV: &str = "PGHARNESS_DATABASE_URL";

const IMAGE_TAG_ENV: &str = "PGHARNESS_IMAGE_TAG";
const STARTUP_TIMEOUT_ENV: &str = "PGHARNESS_STARTUP_TIMEOUT_SECS";
const SCHEMA_ENV: &str = "PGHARNESS_SCHEMA";

/// Settings file looked up in the working directory
const LOCAL_FILE: &str = "pgharness.toml";

/// Fixture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSettings {
    /// Tag of the `postgres` image to run
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Upper bound for start-up plus readiness probing
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Delay between readiness probe attempts
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Schema whose tables are truncated before each test
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Tables left untouched by the reset (reference or seed data)
    #[serde(default)]
    pub preserve_tables: Vec<String>,

    /// Prefix of the keys written by `register_properties`
    #[serde(default = "default_property_prefix")]
    pub property_prefix: String,

    /// Fixed container name; random when unset
    #[serde(default)]
    pub container_name: Option<String>,

    /// Use this database instead of starting a container
    #[serde(default)]
    pub external_url: Option<String>,
}

fn default_image_tag() -> String {
    "16".to_string()
}

fn default_database() -> String {
    "test_db".to_string()
}

fn default_username() -> String {
    "test_user".to_string()
}

fn default_password() -> String {
    "test_password".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    60
}

fn default_probe_interval_ms() -> u64 {
    250
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_property_prefix() -> String {
    "datasource".to_string()
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            image_tag: default_image_tag(),
            database: default_database(),
            username: default_username(),
            password: default_password(),
            startup_timeout_secs: default_startup_timeout_secs(),
            probe_interval_ms: default_probe_interval_ms(),
            schema: default_schema(),
            preserve_tables: Vec::new(),
            property_prefix: default_property_prefix(),
            container_name: None,
            external_url: None,
        }
    }
}

impl FixtureSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Load settings from the first settings file found, then apply
    /// environment overrides
    pub fn load() -> ConfigResult<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_locations().into_iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file; a missing file is an error here
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let settings: FixtureSettings = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded fixture settings");
        Ok(settings)
    }

    /// Candidate settings files, in lookup order
    pub fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Ok(dir) = Self::config_dir() {
            paths.push(dir.join("config.toml"));
        }
        paths
    }

    /// Get the per-user config directory (`<config_dir>/pgharness/`)
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("pgharness"))
    }

    /// Apply `PGHARNESS_*` overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.external_url = Some(url);
        }
        if let Some(tag) = lookup(IMAGE_TAG_ENV) {
            self.image_tag = tag;
        }
        if let Some(secs) = lookup(STARTUP_TIMEOUT_ENV) {
            self.startup_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", STARTUP_TIMEOUT_ENV, secs))
            })?;
        }
        if let Some(schema) = lookup(SCHEMA_ENV) {
            self.schema = schema;
        }
        Ok(())
    }

    /// Reject settings no fixture could work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid("startup_timeout_secs must be > 0".into()));
        }
        if self.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid("probe_interval_ms must be > 0".into()));
        }
        for (key, value) in [
            ("schema", &self.schema),
            ("database", &self.database),
            ("username", &self.username),
            ("image_tag", &self.image_tag),
            ("property_prefix", &self.property_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}
