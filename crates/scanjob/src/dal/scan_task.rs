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

//! Scan Task DAL
//!
//! The runner-facing side of the task lifecycle: reading a job's tasks,
//! finding the ones ready to start, driving individual task transitions and
//! maintaining task counters. Each call is one transaction.

use super::models::{SqliteScanTask, SqliteTaskPrerequisite};
use super::DAL;
use crate::database::schema::{scan_tasks, task_prerequisites};
use crate::database::universal_types::{blob_to_uuid, uuid_to_blob, UniversalTimestamp, UniversalUuid};
use crate::error::ScanJobError;
use crate::graph::TaskGraph;
use crate::models::scan_task::{ScanTask, StatsUpdate, TaskStats};
use crate::models::status::{Transition, TransitionOutcome};
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::collections::HashMap;

/// Data access layer for scan task operations.
#[derive(Clone)]
pub struct ScanTaskDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ScanTaskDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn get(&self, id: UniversalUuid) -> Result<ScanTask, ScanJobError> {
        self.dal.read(move |conn| load_task(conn, &id)).await
    }

    /// All tasks of a job ordered by sequence number.
    pub async fn list_for_job(&self, job_id: UniversalUuid) -> Result<Vec<ScanTask>, ScanJobError> {
        self.dal.read(move |conn| load_tasks(conn, &job_id)).await
    }

    /// The job's validated dependency graph.
    pub async fn graph(&self, job_id: UniversalUuid) -> Result<TaskGraph, ScanJobError> {
        let tasks = self.list_for_job(job_id).await?;
        TaskGraph::from_tasks(&tasks)
    }

    /// PENDING tasks of the job whose prerequisites are all COMPLETED, in
    /// sequence order.
    pub async fn ready_tasks(&self, job_id: UniversalUuid) -> Result<Vec<ScanTask>, ScanJobError> {
        let tasks = self.list_for_job(job_id).await?;
        let graph = TaskGraph::from_tasks(&tasks)?;
        let mut by_id: HashMap<UniversalUuid, ScanTask> =
            tasks.into_iter().map(|t| (t.id, t)).collect();
        Ok(graph
            .ready_tasks()
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }

    /// Applies `transition` to a single task.
    pub async fn transition(
        &self,
        id: UniversalUuid,
        transition: Transition,
    ) -> Result<TransitionOutcome, ScanJobError> {
        let applied = transition.clone();
        let (outcome, task) = self
            .dal
            .write(move |conn| {
                let mut task = load_task(conn, &id)?;
                let outcome = task.apply_transition(&applied, UniversalTimestamp::now());
                if !outcome.is_applied() {
                    return Ok((outcome, None));
                }
                persist_task(conn, &task)?;
                Ok((outcome, Some(task)))
            })
            .await?;

        if let Some(task) = task {
            task.log_transition(&transition);
        }
        Ok(outcome)
    }

    /// PENDING -> RUNNING; records the start time.
    pub async fn status_start(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Start).await
    }

    /// {PENDING, PAUSED, RUNNING} -> PENDING.
    pub async fn status_restart(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Restart).await
    }

    /// {PENDING, RUNNING} -> PAUSED.
    pub async fn status_pause(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Pause).await
    }

    /// {CREATED, PENDING, RUNNING, PAUSED} -> CANCELED; records the end time.
    pub async fn status_cancel(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Cancel).await
    }

    /// RUNNING -> COMPLETED; records the end time.
    pub async fn status_complete(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Complete).await
    }

    /// RUNNING -> FAILED; records the end time and stores `message`.
    pub async fn status_fail(
        &self,
        id: UniversalUuid,
        message: impl Into<String>,
    ) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(
            id,
            Transition::Fail {
                message: message.into(),
            },
        )
        .await
    }

    /// Overwrites the counters present in `update`.
    pub async fn update_stats(
        &self,
        id: UniversalUuid,
        update: StatsUpdate,
    ) -> Result<ScanTask, ScanJobError> {
        self.dal
            .write(move |conn| {
                let mut task = load_task(conn, &id)?;
                task.apply_stats_update(&update)?;
                task.updated_at = UniversalTimestamp::now();
                persist_task(conn, &task)?;
                Ok(task)
            })
            .await
    }

    /// Adds `increments` to the counters.
    pub async fn increment_stats(
        &self,
        id: UniversalUuid,
        increments: TaskStats,
    ) -> Result<ScanTask, ScanJobError> {
        self.dal
            .write(move |conn| {
                let mut task = load_task(conn, &id)?;
                task.apply_stats_increment(&increments)?;
                task.updated_at = UniversalTimestamp::now();
                persist_task(conn, &task)?;
                Ok(task)
            })
            .await
    }
}

fn load_prerequisites(
    conn: &mut SqliteConnection,
    task_ids: Vec<Vec<u8>>,
) -> Result<HashMap<Vec<u8>, Vec<UniversalUuid>>, ScanJobError> {
    let edges = task_prerequisites::table
        .filter(task_prerequisites::task_id.eq_any(task_ids))
        .select(SqliteTaskPrerequisite::as_select())
        .load(conn)?;

    let mut by_task: HashMap<Vec<u8>, Vec<UniversalUuid>> = HashMap::new();
    for edge in edges {
        by_task
            .entry(edge.task_id)
            .or_default()
            .push(blob_to_uuid(&edge.prerequisite_id)?);
    }
    Ok(by_task)
}

fn rows_into_tasks(
    conn: &mut SqliteConnection,
    rows: Vec<SqliteScanTask>,
) -> Result<Vec<ScanTask>, ScanJobError> {
    let ids = rows.iter().map(|r| r.id.clone()).collect();
    let mut prerequisites = load_prerequisites(conn, ids)?;
    rows.into_iter()
        .map(|row| {
            let prereqs = prerequisites.remove(&row.id).unwrap_or_default();
            row.into_domain(prereqs)
        })
        .collect()
}

pub(crate) fn load_task(conn: &mut SqliteConnection, id: &UniversalUuid) -> Result<ScanTask, ScanJobError> {
    let row = scan_tasks::table
        .find(uuid_to_blob(id))
        .select(SqliteScanTask::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("ScanTask", id))?;
    rows_into_tasks(conn, vec![row])?
        .pop()
        .ok_or_else(|| ScanJobError::not_found("ScanTask", id))
}

/// Loads every task of a job, ordered by sequence number.
pub(crate) fn load_tasks(
    conn: &mut SqliteConnection,
    job_id: &UniversalUuid,
) -> Result<Vec<ScanTask>, ScanJobError> {
    let rows = scan_tasks::table
        .filter(scan_tasks::job_id.eq(uuid_to_blob(job_id)))
        .order(scan_tasks::sequence_number.asc())
        .select(SqliteScanTask::as_select())
        .load(conn)?;
    rows_into_tasks(conn, rows)
}

pub(crate) fn count_tasks(conn: &mut SqliteConnection, job_id: &UniversalUuid) -> Result<i64, ScanJobError> {
    Ok(scan_tasks::table
        .filter(scan_tasks::job_id.eq(uuid_to_blob(job_id)))
        .count()
        .get_result(conn)?)
}

/// Inserts new tasks followed by their prerequisite edges.
pub(crate) fn insert_tasks(conn: &mut SqliteConnection, tasks: &[ScanTask]) -> Result<(), ScanJobError> {
    let rows: Vec<SqliteScanTask> = tasks.iter().map(SqliteScanTask::from_domain).collect();
    for row in &rows {
        diesel::insert_into(scan_tasks::table).values(row).execute(conn)?;
    }

    let edges: Vec<SqliteTaskPrerequisite> = tasks
        .iter()
        .flat_map(|task| {
            task.prerequisites.iter().map(move |p| SqliteTaskPrerequisite {
                task_id: uuid_to_blob(&task.id),
                prerequisite_id: uuid_to_blob(p),
            })
        })
        .collect();
    for edge in &edges {
        diesel::insert_into(task_prerequisites::table)
            .values(edge)
            .execute(conn)?;
    }
    Ok(())
}

/// Writes every mutable column of `task` back to its row.
pub(crate) fn persist_task(conn: &mut SqliteConnection, task: &ScanTask) -> Result<(), ScanJobError> {
    let row = SqliteScanTask::from_domain(task);
    let updated = diesel::update(scan_tasks::table.find(uuid_to_blob(&task.id)))
        .set(&row)
        .execute(conn)?;
    if updated == 0 {
        return Err(ScanJobError::not_found("ScanTask", task.id));
    }
    Ok(())
}

/// Deletes every task of a job together with all prerequisite edges that
/// touch them. Returns the number of tasks removed.
pub(crate) fn delete_tasks_for_job(
    conn: &mut SqliteConnection,
    job_id: &UniversalUuid,
) -> Result<usize, ScanJobError> {
    let task_ids: Vec<Vec<u8>> = scan_tasks::table
        .filter(scan_tasks::job_id.eq(uuid_to_blob(job_id)))
        .select(scan_tasks::id)
        .load(conn)?;

    diesel::delete(
        task_prerequisites::table.filter(
            task_prerequisites::task_id
                .eq_any(task_ids.clone())
                .or(task_prerequisites::prerequisite_id.eq_any(task_ids)),
        ),
    )
    .execute(conn)?;

    Ok(
        diesel::delete(scan_tasks::table.filter(scan_tasks::job_id.eq(uuid_to_blob(job_id))))
            .execute(conn)?,
    )
}
