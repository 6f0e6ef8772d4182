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

//! Status state machine shared by jobs and tasks.
//!
//! ```text
//! CREATED -> PENDING -> RUNNING -> COMPLETED
//!               ^         |  ^  \-> FAILED
//!               |         v  |
//!               +------ PAUSED
//!
//! CANCELED is reachable from CREATED, PENDING, RUNNING and PAUSED.
//! ```
//!
//! Every lifecycle operation is a [`Transition`]. Checking it against the
//! current status yields a [`StatusCheck`]; the result reported to callers is
//! a [`TransitionOutcome`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job or task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Created,
    Pending,
    Running,
    Paused,
    Canceled,
    Completed,
    Failed,
}

impl ScanStatus {
    pub const ALL: [ScanStatus; 7] = [
        ScanStatus::Created,
        ScanStatus::Pending,
        ScanStatus::Running,
        ScanStatus::Paused,
        ScanStatus::Canceled,
        ScanStatus::Completed,
        ScanStatus::Failed,
    ];

    /// Returns the stored string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Created => "created",
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Paused => "paused",
            ScanStatus::Canceled => "canceled",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    /// Parses a status from its stored string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ScanStatus::Created),
            "pending" => Some(ScanStatus::Pending),
            "running" => Some(ScanStatus::Running),
            "paused" => Some(ScanStatus::Paused),
            "canceled" => Some(ScanStatus::Canceled),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    /// COMPLETED, FAILED and CANCELED admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Canceled
        )
    }

    /// Work has not started; counts are meaningless.
    pub fn is_unstarted(&self) -> bool {
        matches!(self, ScanStatus::Created | ScanStatus::Pending)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    /// The change is allowed and should be applied.
    Proceed,
    /// The requested status equals the current one.
    NoOp,
    /// The current status is not a valid source for the change.
    Rejected,
}

/// Checks a status change against the set of allowed source states.
///
/// A same-state request is always a no-op, even when the current status is
/// absent from `allowed`.
pub fn validate_status_change(
    current: ScanStatus,
    target: ScanStatus,
    allowed: &[ScanStatus],
) -> StatusCheck {
    if current == target {
        StatusCheck::NoOp
    } else if !allowed.contains(&current) {
        StatusCheck::Rejected
    } else {
        StatusCheck::Proceed
    }
}

/// Outcome of a lifecycle operation as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The status changed and the change was persisted.
    Applied,
    /// Nothing to do; the entity already had the requested status.
    NoOp,
    /// The operation is not valid from the current status; nothing changed.
    Rejected,
}

impl TransitionOutcome {
    /// Boolean success signal: only `Applied` counts as success.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

impl From<StatusCheck> for TransitionOutcome {
    fn from(check: StatusCheck) -> Self {
        match check {
            StatusCheck::Proceed => TransitionOutcome::Applied,
            StatusCheck::NoOp => TransitionOutcome::NoOp,
            StatusCheck::Rejected => TransitionOutcome::Rejected,
        }
    }
}

const FROM_PENDING: &[ScanStatus] = &[ScanStatus::Pending];
const FROM_RUNNING: &[ScanStatus] = &[ScanStatus::Running];
const RESTARTABLE: &[ScanStatus] = &[ScanStatus::Pending, ScanStatus::Paused, ScanStatus::Running];
const PAUSABLE: &[ScanStatus] = &[ScanStatus::Pending, ScanStatus::Running];
const CANCELABLE: &[ScanStatus] = &[
    ScanStatus::Created,
    ScanStatus::Pending,
    ScanStatus::Running,
    ScanStatus::Paused,
];

/// A lifecycle operation on a job or task.
///
/// Queueing is not listed here: it is a job-only operation that also builds
/// the task graph, see [`ScanJobDAL::queue`](crate::dal::ScanJobDAL::queue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    Restart,
    Pause,
    Cancel,
    Complete,
    Fail { message: String },
}

impl Transition {
    /// Status the entity ends up in when the transition is applied.
    pub fn target(&self) -> ScanStatus {
        match self {
            Transition::Start => ScanStatus::Running,
            Transition::Restart => ScanStatus::Pending,
            Transition::Pause => ScanStatus::Paused,
            Transition::Cancel => ScanStatus::Canceled,
            Transition::Complete => ScanStatus::Completed,
            Transition::Fail { .. } => ScanStatus::Failed,
        }
    }

    /// Statuses from which the transition may be applied.
    pub fn allowed_from(&self) -> &'static [ScanStatus] {
        match self {
            Transition::Start => FROM_PENDING,
            Transition::Restart => RESTARTABLE,
            Transition::Pause => PAUSABLE,
            Transition::Cancel => CANCELABLE,
            Transition::Complete | Transition::Fail { .. } => FROM_RUNNING,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Restart => "restart",
            Transition::Pause => "pause",
            Transition::Cancel => "cancel",
            Transition::Complete => "complete",
            Transition::Fail { .. } => "fail",
        }
    }

    /// Checks this transition against `current`.
    pub fn check(&self, current: ScanStatus) -> StatusCheck {
        validate_status_change(current, self.target(), self.allowed_from())
    }

    /// Whether a job-level application of this transition must also be
    /// applied to a child task currently in `task_status`.
    ///
    /// Restart only revives paused tasks; pause and cancel reach every task
    /// that is not terminal.
    pub fn cascades_to(&self, task_status: ScanStatus) -> bool {
        match self {
            Transition::Restart => task_status == ScanStatus::Paused,
            Transition::Pause | Transition::Cancel => !task_status.is_terminal(),
            _ => false,
        }
    }

    pub(crate) fn records_start_time(&self) -> bool {
        matches!(self, Transition::Start)
    }

    pub(crate) fn records_end_time(&self) -> bool {
        matches!(
            self,
            Transition::Cancel | Transition::Complete | Transition::Fail { .. }
        )
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
