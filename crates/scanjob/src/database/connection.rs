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

//! SQLite connection management.
//!
//! This module wraps a `deadpool-diesel` pool of SQLite connections. Diesel
//! connections are synchronous, so every query runs inside
//! [`deadpool_diesel::sqlite::Object::interact`], which moves the closure to
//! a blocking thread and hands back its result.
//!
//! # Example
//!
//! ```rust,ignore
//! use scanjob::{Database, ScanJobConfig};
//!
//! let config = ScanJobConfig::builder().database_url("scanjob.db").build();
//! let db = Database::new(&config)?;
//! db.run_migrations().await?;
//! ```

use crate::config::ScanJobConfig;
use crate::error::ScanJobError;
use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::prelude::*;
use tracing::{debug, info};

/// A pooled SQLite connection.
pub type PooledConnection = deadpool::managed::Object<Manager>;

/// Represents a pool of SQLite connections.
///
/// The `Database` struct is `Clone` and can be shared between tasks. Each
/// clone references the same underlying connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    busy_timeout_ms: u64,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_status", &self.pool.status())
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl Database {
    /// Creates a new connection pool from the given configuration.
    ///
    /// The database file is not opened until the first connection is
    /// checked out.
    pub fn new(config: &ScanJobConfig) -> Result<Self, ScanJobError> {
        config.validate()?;

        let connection_url = Self::build_sqlite_url(config.database_url());
        let manager = Manager::new(connection_url.clone(), Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(config.db_pool_size() as usize)
            .build()
            .map_err(|e| ScanJobError::ConnectionPool(e.to_string()))?;

        info!(
            "SQLite connection pool initialized for {} (size: {})",
            connection_url,
            config.db_pool_size()
        );

        Ok(Self {
            pool,
            busy_timeout_ms: config.busy_timeout().as_millis() as u64,
        })
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Busy timeout applied to each connection before it is used.
    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms
    }

    /// Checks a connection out of the pool.
    pub async fn get_connection(&self) -> Result<PooledConnection, ScanJobError> {
        self.pool
            .get()
            .await
            .map_err(|e| ScanJobError::ConnectionPool(e.to_string()))
    }

    /// Strips an optional `sqlite://` prefix.
    fn build_sqlite_url(connection_string: &str) -> String {
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending embedded migrations.
    ///
    /// Also switches the database to WAL mode so readers are not blocked by
    /// the single writer.
    pub async fn run_migrations(&self) -> Result<(), ScanJobError> {
        use diesel_migrations::MigrationHarness;

        let busy_timeout_ms = self.busy_timeout_ms;
        let conn = self.get_connection().await?;
        let applied = conn
            .interact(move |conn| -> Result<usize, ScanJobError> {
                diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
                diesel::sql_query(format!("PRAGMA busy_timeout={};", busy_timeout_ms))
                    .execute(conn)?;

                let versions = conn
                    .run_pending_migrations(crate::database::MIGRATIONS)
                    .map_err(|e| ScanJobError::Migration(e.to_string()))?;
                Ok(versions.len())
            })
            .await
            .map_err(|e| ScanJobError::ConnectionPool(e.to_string()))??;

        debug!("Applied {} pending migrations", applied);
        Ok(())
    }
}
