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

//! Scan Task Model
//!
//! A task is one unit of work inside a job: a connect, inspect or fingerprint
//! step. Tasks are created only by queueing their job and are driven through
//! their lifecycle either by the job's cascades or by the external runner.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ScanJobError;
use crate::models::scan::ScanType;
use crate::models::status::{ScanStatus, StatusCheck, Transition, TransitionOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn, Level};

/// Status message stored on a task after entering `status`.
pub fn task_status_message(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Created => "Task is created.",
        ScanStatus::Pending => "Task is pending.",
        ScanStatus::Running => "Task is running.",
        ScanStatus::Paused => "Task is paused.",
        ScanStatus::Canceled => "Task is cancelled.",
        ScanStatus::Completed => "Task is complete.",
        ScanStatus::Failed => "Task failed.",
    }
}

/// Represents a scan task record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTask {
    pub id: UniversalUuid,
    pub job_id: UniversalUuid,
    /// Absent for fingerprint tasks
    pub source_id: Option<UniversalUuid>,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub status_message: Option<String>,
    /// Creation and display order within the job, starting at 1
    pub sequence_number: i32,
    /// Tasks of the same job that must complete before this one may start
    pub prerequisites: Vec<UniversalUuid>,
    pub connection_result_id: Option<UniversalUuid>,
    pub inspection_result_id: Option<UniversalUuid>,
    pub details_report_id: Option<UniversalUuid>,
    pub systems_count: i32,
    pub systems_scanned: i32,
    pub systems_failed: i32,
    pub systems_unreachable: i32,
    pub start_time: Option<UniversalTimestamp>,
    pub end_time: Option<UniversalTimestamp>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// The four system counters maintained by a running task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub systems_count: i32,
    pub systems_scanned: i32,
    pub systems_failed: i32,
    pub systems_unreachable: i32,
}

impl TaskStats {
    pub(crate) fn ensure_non_negative(&self) -> Result<(), ScanJobError> {
        let values = [
            self.systems_count,
            self.systems_scanned,
            self.systems_failed,
            self.systems_unreachable,
        ];
        if values.iter().any(|v| *v < 0) {
            return Err(ScanJobError::InvalidData(format!(
                "task counters must not be negative: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Partial overwrite of task counters; `None` leaves a counter unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub systems_count: Option<i32>,
    pub systems_scanned: Option<i32>,
    pub systems_failed: Option<i32>,
    pub systems_unreachable: Option<i32>,
}

impl ScanTask {
    pub fn stats(&self) -> TaskStats {
        TaskStats {
            systems_count: self.systems_count,
            systems_scanned: self.systems_scanned,
            systems_failed: self.systems_failed,
            systems_unreachable: self.systems_unreachable,
        }
    }

    /// Overwrites the counters present in `update`.
    pub fn apply_stats_update(&mut self, update: &StatsUpdate) -> Result<(), ScanJobError> {
        let mut stats = self.stats();
        if let Some(v) = update.systems_count {
            stats.systems_count = v;
        }
        if let Some(v) = update.systems_scanned {
            stats.systems_scanned = v;
        }
        if let Some(v) = update.systems_failed {
            stats.systems_failed = v;
        }
        if let Some(v) = update.systems_unreachable {
            stats.systems_unreachable = v;
        }
        stats.ensure_non_negative()?;
        self.set_stats(stats);
        Ok(())
    }

    /// Adds `increments` to the counters.
    pub fn apply_stats_increment(&mut self, increments: &TaskStats) -> Result<(), ScanJobError> {
        increments.ensure_non_negative()?;
        let add = |a: i32, b: i32| {
            a.checked_add(b)
                .ok_or_else(|| ScanJobError::InvalidData("task counter overflow".to_string()))
        };
        let stats = TaskStats {
            systems_count: add(self.systems_count, increments.systems_count)?,
            systems_scanned: add(self.systems_scanned, increments.systems_scanned)?,
            systems_failed: add(self.systems_failed, increments.systems_failed)?,
            systems_unreachable: add(self.systems_unreachable, increments.systems_unreachable)?,
        };
        self.set_stats(stats);
        Ok(())
    }

    fn set_stats(&mut self, stats: TaskStats) {
        self.systems_count = stats.systems_count;
        self.systems_scanned = stats.systems_scanned;
        self.systems_failed = stats.systems_failed;
        self.systems_unreachable = stats.systems_unreachable;
    }

    /// Validates `transition` against the current status and, if allowed,
    /// mutates status, message and timestamps in memory.
    pub fn apply_transition(
        &mut self,
        transition: &Transition,
        now: UniversalTimestamp,
    ) -> TransitionOutcome {
        let target = transition.target();
        match transition.check(self.status) {
            StatusCheck::NoOp => {
                self.log_message(
                    Level::DEBUG,
                    &format!("ScanTask status is already {}", target),
                );
                return TransitionOutcome::NoOp;
            }
            StatusCheck::Rejected => {
                self.log_message(
                    Level::ERROR,
                    &format!(
                        "Cannot change task state to {} when it is {}",
                        target, self.status
                    ),
                );
                return TransitionOutcome::Rejected;
            }
            StatusCheck::Proceed => {}
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
            _ => task_status_message(target).to_string(),
        });
        self.updated_at = now;
        TransitionOutcome::Applied
    }

    fn elapsed_seconds(&self) -> f64 {
        match &self.start_time {
            Some(start) => start.seconds_until(&UniversalTimestamp::now()),
            None => 0.0,
        }
    }

    /// Logs `message` prefixed with the task's identity.
    pub fn log_message(&self, level: Level, message: &str) {
        let line = format!(
            "Job {}, Task {} ({}, elapsed_time: {:.0}s) - {}",
            self.job_id,
            self.sequence_number,
            self.scan_type,
            self.elapsed_seconds(),
            message
        );
        match level {
            Level::ERROR => error!(task_id = %self.id, "{}", line),
            Level::WARN => warn!(task_id = %self.id, "{}", line),
            Level::INFO => info!(task_id = %self.id, "{}", line),
            Level::DEBUG => debug!(task_id = %self.id, "{}", line),
            _ => trace!(task_id = %self.id, "{}", line),
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

    /// Logs the result of an applied transition.
    pub(crate) fn log_transition(&self, transition: &Transition) {
        match transition {
            Transition::Fail { .. } => self.log_current_status(true, Level::ERROR),
            _ => self.log_current_status(false, Level::INFO),
        }
    }
}
