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

//! Scan Job Model
//!
//! A [`ScanJob`] is one concrete execution of a scan. This module holds the
//! in-memory part of the job lifecycle: option cloning, transition
//! validation, count aggregation and job-scoped logging. Loading, persisting
//! and cascading to tasks is done by [`ScanJobDAL`](crate::dal::ScanJobDAL)
//! inside a single transaction.
//!
//! Once a job has been queued its `source_ids`, `scan_type` and `options` are
//! frozen; only status, status message, timestamps and tasks change.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::scan::{
    DisabledOptionalProducts, ExtendedProductSearch, Scan, ScanOptions, ScanType,
};
use crate::models::scan_task::ScanTask;
use crate::models::status::{ScanStatus, StatusCheck, Transition, TransitionOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn, Level};

/// Status message stored on a job after entering `status`.
pub fn job_status_message(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Created => "Job is created.",
        ScanStatus::Pending => "Job is pending.",
        ScanStatus::Running => "Job is running.",
        ScanStatus::Paused => "Job is paused.",
        ScanStatus::Canceled => "Job is cancelled.",
        ScanStatus::Completed => "Job is complete.",
        ScanStatus::Failed => "Job failed.",
    }
}

/// Represents a scan job record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: UniversalUuid,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub status_message: Option<String>,
    /// Row holding this job's own copy of the options
    pub options_id: Option<UniversalUuid>,
    pub options: Option<ScanOptions>,
    /// Assigned by the report collaborator
    pub report_id: Option<i32>,
    pub start_time: Option<UniversalTimestamp>,
    pub end_time: Option<UniversalTimestamp>,
    /// Originating scan; cleared when the scan is deleted
    pub scan_id: Option<UniversalUuid>,
    /// Snapshot of the sources this job scans
    pub source_ids: Vec<UniversalUuid>,
    pub connection_results_id: Option<UniversalUuid>,
    pub inspection_results_id: Option<UniversalUuid>,
    pub details_report_id: Option<UniversalUuid>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for creating a new scan job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScanJob {
    pub scan_type: ScanType,
    pub scan_id: Option<UniversalUuid>,
    pub source_ids: Vec<UniversalUuid>,
    pub options: Option<ScanOptions>,
    pub details_report_id: Option<UniversalUuid>,
}

impl NewScanJob {
    /// A job that runs `scan`. Sources and options are copied from the scan
    /// when the job is queued.
    pub fn from_scan(scan: &Scan) -> Self {
        Self {
            scan_type: scan.scan_type,
            scan_id: Some(scan.id),
            source_ids: Vec::new(),
            options: None,
            details_report_id: None,
        }
    }

    /// A job with an explicit source list and options and no originating scan.
    pub fn adhoc(
        scan_type: ScanType,
        source_ids: Vec<UniversalUuid>,
        options: Option<ScanOptions>,
    ) -> Self {
        Self {
            scan_type,
            scan_id: None,
            source_ids,
            options,
            details_report_id: None,
        }
    }

    /// A fingerprint-only job over an existing details report.
    pub fn fingerprint(details_report_id: UniversalUuid) -> Self {
        Self {
            scan_type: ScanType::Fingerprint,
            scan_id: None,
            source_ids: Vec::new(),
            options: None,
            details_report_id: Some(details_report_id),
        }
    }
}

/// Aggregated system counters for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    pub systems_count: i64,
    pub systems_scanned: i64,
    pub systems_failed: i64,
    pub systems_unreachable: i64,
    pub system_fingerprint_count: i64,
}

#[derive(Default)]
struct PhaseTotals {
    count: i64,
    scanned: i64,
    failed: i64,
    unreachable: i64,
}

fn phase_totals(tasks: &[ScanTask], scan_type: ScanType) -> PhaseTotals {
    let mut phase: Vec<&ScanTask> = tasks.iter().filter(|t| t.scan_type == scan_type).collect();
    phase.sort_by_key(|t| t.sequence_number);
    phase.into_iter().fold(PhaseTotals::default(), |acc, t| PhaseTotals {
        count: acc.count + i64::from(t.systems_count),
        scanned: acc.scanned + i64::from(t.systems_scanned),
        failed: acc.failed + i64::from(t.systems_failed),
        unreachable: acc.unreachable + i64::from(t.systems_unreachable),
    })
}

/// Independent copy of the scan's disabled-products flags, if it has any.
pub fn copy_scan_disabled_product_options(scan: Option<&Scan>) -> Option<DisabledOptionalProducts> {
    let flags = scan?.options.as_ref()?.disabled_optional_products.as_ref()?;
    Some(DisabledOptionalProducts {
        jboss_eap: flags.jboss_eap,
        jboss_fuse: flags.jboss_fuse,
        jboss_brms: flags.jboss_brms,
        jboss_ws: flags.jboss_ws,
    })
}

/// Independent copy of the scan's extended-search flags, if it has any.
///
/// An empty directory list is copied as absent.
pub fn copy_scan_extended_product_options(scan: Option<&Scan>) -> Option<ExtendedProductSearch> {
    let flags = scan?
        .options
        .as_ref()?
        .enabled_extended_product_search
        .as_ref()?;
    Some(ExtendedProductSearch {
        jboss_eap: flags.jboss_eap,
        jboss_fuse: flags.jboss_fuse,
        jboss_brms: flags.jboss_brms,
        jboss_ws: flags.jboss_ws,
        search_directories: flags
            .search_directories
            .as_ref()
            .filter(|dirs| !dirs.is_empty())
            .cloned(),
    })
}

impl ScanJob {
    /// Copies sources, scan type and options from the originating scan.
    ///
    /// Sources are added to the existing snapshot. Returns `true` when a new
    /// options value was built; the caller must persist it as a fresh row.
    /// Does nothing when `scan` is `None`.
    pub fn copy_scan_options(&mut self, scan: Option<&Scan>) -> bool {
        let Some(scan) = scan else {
            return false;
        };

        for source_id in &scan.source_ids {
            if !self.source_ids.contains(source_id) {
                self.source_ids.push(*source_id);
            }
        }
        self.scan_type = scan.scan_type;

        match &scan.options {
            Some(scan_options) => {
                self.options = Some(ScanOptions {
                    max_concurrency: scan_options.max_concurrency,
                    disabled_optional_products: copy_scan_disabled_product_options(Some(scan)),
                    enabled_extended_product_search: copy_scan_extended_product_options(Some(
                        scan,
                    )),
                });
                self.options_id = None;
                true
            }
            None => false,
        }
    }

    /// Checks a status change and logs no-ops at debug and rejections at
    /// error level.
    pub fn validate_status_change(&self, target: ScanStatus, allowed: &[ScanStatus]) -> StatusCheck {
        let check = crate::models::status::validate_status_change(self.status, target, allowed);
        match check {
            StatusCheck::NoOp => {
                self.log_message(Level::DEBUG, &format!("ScanJob status is already {}", target))
            }
            StatusCheck::Rejected => self.log_message(
                Level::ERROR,
                &format!(
                    "Cannot change job state to {} when it is {}",
                    target, self.status
                ),
            ),
            StatusCheck::Proceed => {}
        }
        check
    }

    /// Validates `transition` and, if allowed, mutates status, message and
    /// timestamps in memory.
    pub fn apply_transition(
        &mut self,
        transition: &Transition,
        now: UniversalTimestamp,
    ) -> TransitionOutcome {
        let target = transition.target();
        let check = self.validate_status_change(target, transition.allowed_from());
        if check != StatusCheck::Proceed {
            return check.into();
        }

        if transition.records_start_time() {
            self.start_time = Some(now);
        }
        if transition.records_end_time() {
            self.end_time = Some(now);
        }
        self.status = target;
        self.status_message = Some(match transition {
            Transition::Fail { message } => message.clone(),
            _ => job_status_message(target).to_string(),
        });
        self.updated_at = now;
        TransitionOutcome::Applied
    }

    /// Marks the job as queued.
    pub(crate) fn mark_pending(&mut self, now: UniversalTimestamp) {
        self.status = ScanStatus::Pending;
        self.status_message = Some(job_status_message(ScanStatus::Pending).to_string());
        self.updated_at = now;
    }

    /// Aggregates task counters into job-level counts.
    ///
    /// Returns `None` while the job is CREATED or PENDING. CONNECT jobs, or
    /// callers passing `connect_only`, get the connect-phase totals. Other
    /// jobs count every host that attempted a connection, report hosts
    /// scanned by inspection, and add failures and unreachable hosts from
    /// both phases.
    pub fn calculate_counts(
        &self,
        tasks: &[ScanTask],
        connect_only: bool,
        system_fingerprint_count: i64,
    ) -> Option<ScanCounts> {
        if self.status.is_unstarted() {
            return None;
        }

        let connect = phase_totals(tasks, ScanType::Connect);
        let counts = if self.scan_type == ScanType::Connect || connect_only {
            ScanCounts {
                systems_count: connect.count,
                systems_scanned: connect.scanned,
                systems_failed: connect.failed,
                systems_unreachable: connect.unreachable,
                system_fingerprint_count,
            }
        } else {
            let inspect = phase_totals(tasks, ScanType::Inspect);
            ScanCounts {
                systems_count: connect.count,
                systems_scanned: inspect.scanned,
                systems_failed: inspect.failed + connect.failed,
                systems_unreachable: inspect.unreachable + connect.unreachable,
                system_fingerprint_count,
            }
        };
        Some(counts)
    }

    fn elapsed_seconds(&self) -> f64 {
        match &self.start_time {
            Some(start) => start.seconds_until(&UniversalTimestamp::now()),
            None => 0.0,
        }
    }

    /// Logs `message` prefixed with the job id, scan type and elapsed time.
    pub fn log_message(&self, level: Level, message: &str) {
        let line = format!(
            "Job {} ({}, elapsed_time: {:.0}s) - {}",
            self.id,
            self.scan_type,
            self.elapsed_seconds(),
            message
        );
        match level {
            Level::ERROR => error!(job_id = %self.id, "{}", line),
            Level::WARN => warn!(job_id = %self.id, "{}", line),
            Level::INFO => info!(job_id = %self.id, "{}", line),
            Level::DEBUG => debug!(job_id = %self.id, "{}", line),
            _ => trace!(job_id = %self.id, "{}", line),
        }
    }

    pub fn log_current_status(&self, show_status_message: bool, level: Level) {
        let message = match (&self.status_message, show_status_message) {
            (Some(details), true) => format!(
                "STATE UPDATE ({}).  Additional State information: {}",
                self.status, details
            ),
            _ => format!("STATE UPDATE ({})", self.status),
        };
        self.log_message(level, &message);
    }

    pub fn log_stats(&self, prefix: &str, counts: &ScanCounts) {
        self.log_message(
            Level::INFO,
            &format!(
                "{} Stats: systems_count={}, systems_scanned={}, systems_failed={}, systems_unreachable={}, system_fingerprint_count={}",
                prefix,
                counts.systems_count,
                counts.systems_scanned,
                counts.systems_failed,
                counts.systems_unreachable,
                counts.system_fingerprint_count
            ),
        );
    }

    /// Logs the result of an applied transition. Completion and failure also
    /// log the aggregate counts.
    pub(crate) fn log_transition(&self, transition: &Transition, counts: Option<&ScanCounts>) {
        match transition {
            Transition::Complete => {
                if let Some(counts) = counts {
                    self.log_stats("COMPLETION STATS.", counts);
                }
                self.log_current_status(false, Level::INFO);
            }
            Transition::Fail { message } => {
                self.log_message(Level::ERROR, message);
                if let Some(counts) = counts {
                    self.log_stats("FAILURE STATS.", counts);
                }
                self.log_current_status(true, Level::ERROR);
            }
            _ => self.log_current_status(false, Level::INFO),
        }
    }
}
