/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Configuration for the scan-job core.
//!
//! A [`ScanJobConfig`] is built once by the host process and handed to
//! [`Database::new`](crate::database::Database::new). Nothing in this crate
//! reads settings from global state.
//!
//! ```rust,ignore
//! let config = ScanJobConfig::builder()
//!     .database_url("/var/lib/scanjob/scanjob.db")
//!     .busy_timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! Configuration can also be loaded from a TOML file (with `${VAR}`,
//! `${VAR:-default}` and `${VAR:?message}` substitution) through
//! [`ConfigLoader`], or from `SCANJOB_*` environment variables through
//! [`ScanJobConfig::from_env`].

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_DATABASE_URL: &str = "SCANJOB_DATABASE_URL";
const ENV_DB_POOL_SIZE: &str = "SCANJOB_DB_POOL_SIZE";
const ENV_BUSY_TIMEOUT_MS: &str = "SCANJOB_BUSY_TIMEOUT_MS";
const ENV_LOG_LEVEL: &str = "SCANJOB_LOG_LEVEL";
const ENV_CONFIG_FILE: &str = "SCANJOB_CONFIG";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Runtime configuration for the scan-job core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanJobConfig {
    database_url: String,
    db_pool_size: u32,
    busy_timeout_ms: u64,
    log_level: String,
}

impl Default for ScanJobConfig {
    fn default() -> Self {
        Self {
            database_url: "scanjob.db".to_string(),
            // SQLite serializes writers; a single pooled connection avoids
            // "database is locked" errors under concurrent lifecycle calls.
            db_pool_size: 1,
            busy_timeout_ms: 30_000,
            log_level: "info".to_string(),
        }
    }
}

impl ScanJobConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> ScanJobConfigBuilder {
        ScanJobConfigBuilder::default()
    }

    /// Builds a configuration from `SCANJOB_*` environment variables.
    ///
    /// A `.env` file in the working directory is honoured if present. Unset
    /// variables keep their default values.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Path or `sqlite://` URL of the database.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Number of connections in the pool.
    pub fn db_pool_size(&self) -> u32 {
        self.db_pool_size
    }

    /// How long a connection waits on a locked database before failing.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Default log level used by [`init_logging`](crate::init_logging) when
    /// `RUST_LOG` is not set.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if self.db_pool_size == 0 || self.db_pool_size > 100 {
            return Err(ConfigError::InvalidPoolSize {
                size: self.db_pool_size,
            });
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel {
                level: self.log_level.clone(),
            });
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Ok(size) = env::var(ENV_DB_POOL_SIZE) {
            self.db_pool_size = parse_env(ENV_DB_POOL_SIZE, &size)?;
        }
        if let Ok(timeout) = env::var(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = parse_env(ENV_BUSY_TIMEOUT_MS, &timeout)?;
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Builder for [`ScanJobConfig`].
#[derive(Debug, Clone, Default)]
pub struct ScanJobConfigBuilder {
    config: ScanJobConfig,
}

impl ScanJobConfigBuilder {
    /// Sets the database path or URL.
    pub fn database_url(mut self, value: impl Into<String>) -> Self {
        self.config.database_url = value.into();
        self
    }

    /// Sets the database pool size.
    pub fn db_pool_size(mut self, value: u32) -> Self {
        self.config.db_pool_size = value;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, value: Duration) -> Self {
        self.config.busy_timeout_ms = value.as_millis() as u64;
        self
    }

    /// Sets the default log level.
    pub fn log_level(mut self, value: impl Into<String>) -> Self {
        self.config.log_level = value.into();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ScanJobConfig {
        self.config
    }
}

/// Locates and parses TOML configuration files.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./scanjob.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("scanjob").join("config.toml"));
        }

        search_paths.push(PathBuf::from("/etc/scanjob/config.toml"));

        Self { search_paths }
    }

    /// Create a config loader with custom search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration from the given file, `SCANJOB_CONFIG`, or the
    /// first existing search path, then apply `SCANJOB_*` overrides.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<ScanJobConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var(ENV_CONFIG_FILE) {
            PathBuf::from(env_config)
        } else {
            self.find_config_file().ok_or(ConfigError::ConfigNotFound)?
        };

        let mut config = self.load_config_from_file(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_config_from_file(&self, path: &Path) -> Result<ScanJobConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let substituted = substitute_env_vars(&content)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => Ok(toml::from_str::<ScanJobConfig>(&substituted)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `${VAR}`, `${VAR:-default}` and `${VAR:?error}` expressions.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let replacement = process_var_expression(&cap[1])?;
        result = result.replace(&cap[0], &replacement);
    }

    Ok(result)
}

fn process_var_expression(expr: &str) -> Result<String, ConfigError> {
    if let Some((name, default)) = expr.split_once(":-") {
        Ok(env::var(name).unwrap_or_else(|_| default.to_string()))
    } else if let Some((name, message)) = expr.split_once(":?") {
        env::var(name).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set: {}",
                name, message
            ))
        })
    } else {
        env::var(expr).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set",
                expr
            ))
        })
    }
}
