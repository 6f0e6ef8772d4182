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

//! Data Access Layer
//!
//! Every operation checks a connection out of the pool and runs its queries
//! inside `interact`. Operations that change state run in a SQLite
//! `BEGIN IMMEDIATE` transaction, which takes the write lock before anything
//! is read. Two lifecycle operations on the same job are therefore
//! serialized, and the status each one validates is the status it mutates.
//!
//! # Example
//!
//! ```rust,ignore
//! use scanjob::{Database, DAL, ScanJobConfig};
//!
//! let db = Database::new(&ScanJobConfig::default())?;
//! db.run_migrations().await?;
//! let dal = DAL::new(db);
//!
//! let outcome = dal.scan_job().queue(job_id).await?;
//! if outcome.is_applied() {
//!     let ready = dal.scan_task().ready_tasks(job_id).await?;
//! }
//! ```

use crate::database::Database;
use crate::error::ScanJobError;
use diesel::prelude::*;
use diesel::SqliteConnection;

pub mod models;
pub mod report;
pub mod scan;
pub mod scan_job;
pub mod scan_task;
pub mod source;

pub use report::ReportDAL;
pub use scan::ScanDAL;
pub use scan_job::ScanJobDAL;
pub use scan_task::ScanTaskDAL;
pub use source::SourceDAL;

/// The Data Access Layer struct.
///
/// The `DAL` struct is `Clone` and can be safely shared between tasks. Each
/// clone references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn source(&self) -> SourceDAL {
        SourceDAL::new(self)
    }

    pub fn scan(&self) -> ScanDAL {
        ScanDAL::new(self)
    }

    pub fn scan_job(&self) -> ScanJobDAL {
        ScanJobDAL::new(self)
    }

    pub fn scan_task(&self) -> ScanTaskDAL {
        ScanTaskDAL::new(self)
    }

    pub fn report(&self) -> ReportDAL {
        ReportDAL::new(self)
    }

    /// Runs `f` in an immediate (write-locking) transaction.
    ///
    /// Any `Err` returned by `f` rolls the transaction back.
    pub(crate) async fn write<T, F>(&self, f: F) -> Result<T, ScanJobError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, ScanJobError> + Send + 'static,
    {
        let busy_timeout_ms = self.database.busy_timeout_ms();
        let conn = self.database.get_connection().await?;
        conn.interact(move |conn| {
            set_busy_timeout(conn, busy_timeout_ms)?;
            conn.immediate_transaction(f)
        })
        .await
        .map_err(|e| ScanJobError::ConnectionPool(e.to_string()))?
    }

    /// Runs `f` in a deferred transaction, giving multi-query reads a
    /// consistent snapshot.
    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T, ScanJobError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, ScanJobError> + Send + 'static,
    {
        let busy_timeout_ms = self.database.busy_timeout_ms();
        let conn = self.database.get_connection().await?;
        conn.interact(move |conn| {
            set_busy_timeout(conn, busy_timeout_ms)?;
            conn.transaction(f)
        })
        .await
        .map_err(|e| ScanJobError::ConnectionPool(e.to_string()))?
    }
}

fn set_busy_timeout(conn: &mut SqliteConnection, busy_timeout_ms: u64) -> Result<(), ScanJobError> {
    diesel::sql_query(format!("PRAGMA busy_timeout={};", busy_timeout_ms)).execute(conn)?;
    Ok(())
}
