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

//! Error types for the scan-job core.
//!
//! State-machine violations are never errors: they are reported through
//! [`TransitionOutcome`](crate::models::status::TransitionOutcome). The types
//! here cover storage failures, missing records, corrupt stored values and
//! configuration problems.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the data access layer and the task graph.
#[derive(Debug, Error)]
pub enum ScanJobError {
    /// The connection pool could not hand out a connection, or the blocking
    /// database closure panicked or was aborted.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored value could not be mapped back onto a domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task {task} lists prerequisite {prerequisite} which belongs to another job")]
    ForeignPrerequisite { task: String, prerequisite: String },

    #[error("Cyclic task dependency detected: {}", tasks.join(" -> "))]
    CyclicDependency { tasks: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ScanJobError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ScanJobError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors raised while loading or validating [`ScanJobConfig`](crate::config::ScanJobConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in any search location")]
    ConfigNotFound,

    #[error("Failed to read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Environment variable substitution failed: {0}")]
    EnvSubstitutionError(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid pool size: {size} (must be between 1 and 100)")]
    InvalidPoolSize { size: u32 },

    #[error("Invalid log level: {level} (must be one of: error, warn, info, debug, trace)")]
    InvalidLogLevel { level: String },

    #[error("Database URL must not be empty")]
    EmptyDatabaseUrl,

    #[error("Unsupported configuration file format: {extension}")]
    UnsupportedFormat { extension: String },
}
