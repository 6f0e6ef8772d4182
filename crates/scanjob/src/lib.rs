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

//! # scanjob
//!
//! The orchestration core of a network inventory scanner. A [`Scan`] is a
//! reusable definition (sources, scan type, options). Running it creates a
//! [`ScanJob`], which snapshots the scan's sources and deep-copies its options
//! when queued, then expands into a dependency graph of [`ScanTask`]s:
//!
//! - one CONNECT task per source,
//! - for INSPECT jobs, one INSPECT task per connect task,
//! - a single FINGERPRINT task depending on every connect and inspect task.
//!
//! An external runner asks for [`ready_tasks`](dal::ScanTaskDAL::ready_tasks),
//! executes them, and reports back through the task transitions and counter
//! updates. Job-level pause, restart and cancel cascade to the tasks in the
//! same transaction.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scanjob::models::scan::{NewScan, ScanType};
//! use scanjob::models::scan_job::NewScanJob;
//! use scanjob::models::source::NewSource;
//! use scanjob::{Database, ScanJobConfig, DAL};
//!
//! scanjob::init_logging(None);
//!
//! let config = ScanJobConfig::builder().database_url("scans.db").build();
//! let database = Database::new(&config)?;
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//!
//! let source = dal.source().create(NewSource::new("lab", "network").with_hosts(["10.0.0.0/24"])).await?;
//! let scan = dal
//!     .scan()
//!     .create(NewScan::new("nightly", ScanType::Inspect).with_sources(vec![source.id]))
//!     .await?;
//! let job = dal.scan_job().create(NewScanJob::from_scan(&scan)).await?;
//!
//! assert!(dal.scan_job().queue(job.id).await?.is_applied());
//! ```
//!
//! ## Transition outcomes
//!
//! Lifecycle operations never fail because of the current status. They
//! return a [`TransitionOutcome`]: `Applied`, `NoOp` when the entity is
//! already in the target status, or `Rejected` when the target is not
//! reachable from the current status. `Err` is reserved for storage
//! failures and unknown ids.

pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod graph;
pub mod models;

pub use config::{ConfigLoader, ScanJobConfig, ScanJobConfigBuilder};
pub use dal::DAL;
pub use database::{Database, UniversalTimestamp, UniversalUuid};
pub use error::{ConfigError, ScanJobError};
pub use graph::{TaskGraph, TaskPlan};
pub use models::scan::{Scan, ScanOptions, ScanType};
pub use models::scan_job::{ScanCounts, ScanJob};
pub use models::scan_task::ScanTask;
pub use models::status::{ScanStatus, Transition, TransitionOutcome};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (default INFO) is used.
/// Calling this more than once, or after another subscriber was installed,
/// leaves the existing subscriber in place.
pub fn init_logging(level: Option<Level>) {
    let default_level = level.unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Installs the global subscriber at the level named by `config`.
pub fn init_logging_from_config(config: &ScanJobConfig) {
    let level = config.log_level().parse::<Level>().ok();
    init_logging(level);
}

