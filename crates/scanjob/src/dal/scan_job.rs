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

//! Scan Job DAL
//!
//! Job lifecycle operations. Each operation loads the job, applies the
//! in-memory state machine from [`crate::models::scan_job`], and writes the
//! result back inside one immediate transaction. Cascades to tasks happen in
//! the same transaction, so no reader can observe a paused job with a running
//! task. Log lines are emitted after the transaction commits.
//!
//! `queue` is the only operation that creates tasks. It copies the
//! originating scan's sources and options onto the job, validates
//! CREATED -> PENDING, and materializes the task graph planned by
//! [`TaskPlan`].

use super::models::{
    NewSqliteJobConnectionResult, NewSqliteJobInspectionResult, SqliteJobSource, SqliteScanJob,
    SqliteTaskConnectionResult, SqliteTaskInspectionResult,
};
use super::report::{count_job_fingerprints, delete_job_fingerprints, load_details_report};
use super::scan::{delete_options, insert_options, load_options, load_scan, set_most_recent_scanjob};
use super::scan_task::{delete_tasks_for_job, insert_tasks, load_tasks, persist_task};
use super::source::{order_sources, set_most_recent_connect_scan};
use super::DAL;
use crate::database::schema::{
    job_connection_results, job_inspection_results, job_sources, scan_jobs, task_connection_results,
    task_inspection_results,
};
use crate::database::universal_types::{blob_to_uuid, uuid_to_blob, UniversalTimestamp, UniversalUuid};
use crate::error::ScanJobError;
use crate::graph::TaskPlan;
use crate::models::results::{TaskConnectionResult, TaskInspectionResult};
use crate::models::scan::ScanType;
use crate::models::scan_job::{job_status_message, NewScanJob, ScanCounts, ScanJob};
use crate::models::scan_task::{task_status_message, ScanTask};
use crate::models::status::{ScanStatus, StatusCheck, Transition, TransitionOutcome};
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::collections::HashMap;
use tracing::Level;

/// Data access layer for scan job operations.
#[derive(Clone)]
pub struct ScanJobDAL<'a> {
    dal: &'a DAL,
}

/// What a successful `queue` did, carried out of the transaction for logging.
struct QueueReport {
    job: ScanJob,
    tasks_created: usize,
    tasks_purged: usize,
}

/// What an applied job transition did, carried out of the transaction for
/// logging.
struct TransitionReport {
    job: ScanJob,
    cascaded: Vec<ScanTask>,
    counts: Option<ScanCounts>,
}

impl<'a> ScanJobDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a job in the CREATED state.
    ///
    /// Explicit sources are stored in name order and must exist. Explicit
    /// options are stored as the job's own row.
    pub async fn create(&self, new_job: NewScanJob) -> Result<ScanJob, ScanJobError> {
        let job = self
            .dal
            .write(move |conn| {
                if let Some(scan_id) = &new_job.scan_id {
                    load_scan(conn, scan_id)?;
                }
                if let Some(details_report_id) = &new_job.details_report_id {
                    load_details_report(conn, details_report_id)?;
                }
                let source_ids = order_sources(conn, &new_job.source_ids)?;

                let now = UniversalTimestamp::now();
                let options_id = match &new_job.options {
                    Some(options) => Some(insert_options(conn, options, &now.to_rfc3339())?),
                    None => None,
                };

                let job = ScanJob {
                    id: UniversalUuid::new_v4(),
                    scan_type: new_job.scan_type,
                    status: ScanStatus::Created,
                    status_message: Some(job_status_message(ScanStatus::Created).to_string()),
                    options_id,
                    options: new_job.options,
                    report_id: None,
                    start_time: None,
                    end_time: None,
                    scan_id: new_job.scan_id,
                    source_ids,
                    connection_results_id: None,
                    inspection_results_id: None,
                    details_report_id: new_job.details_report_id,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(scan_jobs::table)
                    .values(&SqliteScanJob::from_domain(&job))
                    .execute(conn)?;
                replace_job_sources(conn, &job.id, &job.source_ids)?;
                Ok(job)
            })
            .await?;

        job.log_current_status(false, Level::INFO);
        Ok(job)
    }

    pub async fn get(&self, id: UniversalUuid) -> Result<ScanJob, ScanJobError> {
        self.dal.read(move |conn| load_job(conn, &id)).await
    }

    /// Jobs created from `scan_id`, oldest first.
    pub async fn list_for_scan(&self, scan_id: UniversalUuid) -> Result<Vec<ScanJob>, ScanJobError> {
        self.dal
            .read(move |conn| {
                let ids: Vec<Vec<u8>> = scan_jobs::table
                    .filter(scan_jobs::scan_id.eq(uuid_to_blob(&scan_id)))
                    .order((scan_jobs::created_at.asc(), scan_jobs::id.asc()))
                    .select(scan_jobs::id)
                    .load(conn)?;
                ids.iter()
                    .map(|blob| load_job(conn, &blob_to_uuid(blob)?))
                    .collect()
            })
            .await
    }

    /// The job's tasks ordered by sequence number.
    pub async fn list_tasks(&self, id: UniversalUuid) -> Result<Vec<ScanTask>, ScanJobError> {
        self.dal
            .read(move |conn| {
                load_job(conn, &id)?;
                load_tasks(conn, &id)
            })
            .await
    }

    /// Task results held by the job's connection container.
    pub async fn connection_results(
        &self,
        id: UniversalUuid,
    ) -> Result<Vec<TaskConnectionResult>, ScanJobError> {
        self.dal
            .read(move |conn| {
                let job = load_job(conn, &id)?;
                let Some(container) = job.connection_results_id else {
                    return Ok(Vec::new());
                };
                task_connection_results::table
                    .filter(task_connection_results::job_connection_result_id.eq(uuid_to_blob(&container)))
                    .order(task_connection_results::created_at.asc())
                    .select(SqliteTaskConnectionResult::as_select())
                    .load(conn)?
                    .into_iter()
                    .map(TaskConnectionResult::try_from)
                    .collect()
            })
            .await
    }

    /// Task results held by the job's inspection container.
    pub async fn inspection_results(
        &self,
        id: UniversalUuid,
    ) -> Result<Vec<TaskInspectionResult>, ScanJobError> {
        self.dal
            .read(move |conn| {
                let job = load_job(conn, &id)?;
                let Some(container) = job.inspection_results_id else {
                    return Ok(Vec::new());
                };
                task_inspection_results::table
                    .filter(task_inspection_results::job_inspection_result_id.eq(uuid_to_blob(&container)))
                    .order(task_inspection_results::created_at.asc())
                    .select(SqliteTaskInspectionResult::as_select())
                    .load(conn)?
                    .into_iter()
                    .map(TaskInspectionResult::try_from)
                    .collect()
            })
            .await
    }

    /// Moves the job from CREATED to PENDING and builds its task graph.
    ///
    /// The scan's sources and options are copied onto the job first. A job
    /// that is not CREATED is left untouched and the outcome reports why.
    /// Tasks left by an earlier partial attempt are purged and rebuilt.
    pub async fn queue(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        let (outcome, report) = self
            .dal
            .write(move |conn| {
                let mut job = load_job(conn, &id)?;
                let scan = match &job.scan_id {
                    Some(scan_id) => Some(load_scan(conn, scan_id)?),
                    None => None,
                };

                let previous_options_id = job.options_id;
                let options_replaced = job.copy_scan_options(scan.as_ref());

                let check = job.validate_status_change(ScanStatus::Pending, &[ScanStatus::Created]);
                if check != StatusCheck::Proceed {
                    return Ok((TransitionOutcome::from(check), None));
                }

                let now = UniversalTimestamp::now();
                let now_str = now.to_rfc3339();

                if options_replaced {
                    if let Some(previous) = &previous_options_id {
                        delete_options(conn, previous)?;
                    }
                    job.options_id = match &job.options {
                        Some(options) => Some(insert_options(conn, options, &now_str)?),
                        None => None,
                    };
                }

                if job.connection_results_id.is_none() {
                    job.connection_results_id = Some(create_connection_container(conn, &now_str)?);
                }
                if job.scan_type == ScanType::Inspect && job.inspection_results_id.is_none() {
                    job.inspection_results_id = Some(create_inspection_container(conn, &now_str)?);
                }

                let tasks_purged = purge_tasks(conn, &job)?;

                let ordered_sources = order_sources(conn, &job.source_ids)?;
                let plan = TaskPlan::build(job.scan_type, &ordered_sources);
                let tasks = materialize_plan(conn, &job, &plan, now)?;
                insert_tasks(conn, &tasks)?;

                if plan.runs_scan() {
                    if let Some(scan_id) = &job.scan_id {
                        set_most_recent_scanjob(conn, scan_id, &job.id, &now_str)?;
                    }
                    set_most_recent_connect_scan(conn, &ordered_sources, &job.id, &now_str)?;
                }

                job.source_ids = ordered_sources;
                job.mark_pending(now);
                persist_job(conn, &job)?;
                replace_job_sources(conn, &job.id, &job.source_ids)?;

                Ok((
                    TransitionOutcome::Applied,
                    Some(QueueReport {
                        job,
                        tasks_created: tasks.len(),
                        tasks_purged,
                    }),
                ))
            })
            .await?;

        if let Some(report) = report {
            if report.tasks_purged > 0 {
                report.job.log_message(
                    Level::WARN,
                    &format!(
                        "Removed {} tasks left by an earlier queue attempt",
                        report.tasks_purged
                    ),
                );
            }
            report
                .job
                .log_message(Level::DEBUG, &format!("Created {} tasks", report.tasks_created));
            report.job.log_current_status(false, Level::INFO);
        }
        Ok(outcome)
    }

    /// Applies `transition` to the job and cascades it to the job's tasks
    /// where [`Transition::cascades_to`] says so.
    pub async fn transition(
        &self,
        id: UniversalUuid,
        transition: Transition,
    ) -> Result<TransitionOutcome, ScanJobError> {
        let applied = transition.clone();
        let (outcome, report) = self
            .dal
            .write(move |conn| {
                let mut job = load_job(conn, &id)?;
                let now = UniversalTimestamp::now();
                let outcome = job.apply_transition(&applied, now);
                if !outcome.is_applied() {
                    return Ok((outcome, None));
                }

                let mut tasks = load_tasks(conn, &id)?;
                let mut cascaded = Vec::new();
                for task in tasks.iter_mut() {
                    if applied.cascades_to(task.status)
                        && task.apply_transition(&applied, now).is_applied()
                    {
                        persist_task(conn, task)?;
                        cascaded.push(task.clone());
                    }
                }
                persist_job(conn, &job)?;

                let counts = match applied {
                    Transition::Complete | Transition::Fail { .. } => {
                        let fingerprints = count_job_fingerprints(conn, &job)?;
                        job.calculate_counts(&tasks, false, fingerprints)
                    }
                    _ => None,
                };

                Ok((
                    outcome,
                    Some(TransitionReport {
                        job,
                        cascaded,
                        counts,
                    }),
                ))
            })
            .await?;

        if let Some(report) = report {
            for task in &report.cascaded {
                task.log_transition(&transition);
            }
            report.job.log_transition(&transition, report.counts.as_ref());
        }
        Ok(outcome)
    }

    /// PENDING -> RUNNING; records the start time.
    pub async fn status_start(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Start).await
    }

    /// {PENDING, PAUSED, RUNNING} -> PENDING; paused tasks are restarted too.
    pub async fn status_restart(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Restart).await
    }

    /// {PENDING, RUNNING} -> PAUSED; every non-terminal task is paused.
    pub async fn status_pause(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Pause).await
    }

    /// {CREATED, PENDING, RUNNING, PAUSED} -> CANCELED; records the end time
    /// and cancels every non-terminal task.
    pub async fn status_cancel(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Cancel).await
    }

    /// RUNNING -> COMPLETED; records the end time and logs completion stats.
    pub async fn status_complete(&self, id: UniversalUuid) -> Result<TransitionOutcome, ScanJobError> {
        self.transition(id, Transition::Complete).await
    }

    /// RUNNING -> FAILED; records the end time, stores `message` as the
    /// status message and logs failure stats.
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

    /// Aggregated task counters; `None` while the job is CREATED or PENDING.
    pub async fn calculate_counts(
        &self,
        id: UniversalUuid,
        connect_only: bool,
    ) -> Result<Option<ScanCounts>, ScanJobError> {
        self.dal
            .read(move |conn| {
                let job = load_job(conn, &id)?;
                if job.status.is_unstarted() {
                    return Ok(None);
                }
                let tasks = load_tasks(conn, &id)?;
                let fingerprints = count_job_fingerprints(conn, &job)?;
                Ok(job.calculate_counts(&tasks, connect_only, fingerprints))
            })
            .await
    }
}

pub(crate) fn load_job(conn: &mut SqliteConnection, id: &UniversalUuid) -> Result<ScanJob, ScanJobError> {
    let row = scan_jobs::table
        .find(uuid_to_blob(id))
        .select(SqliteScanJob::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("ScanJob", id))?;

    let source_ids = job_sources::table
        .filter(job_sources::job_id.eq(uuid_to_blob(id)))
        .select(job_sources::source_id)
        .load::<Vec<u8>>(conn)?;
    let source_ids = order_sources(
        conn,
        &source_ids
            .iter()
            .map(|b| blob_to_uuid(b))
            .collect::<Result<Vec<_>, _>>()?,
    )?;

    let options = match &row.options_id {
        Some(options_id) => Some(load_options(conn, &blob_to_uuid(options_id)?)?),
        None => None,
    };

    row.into_domain(source_ids, options)
}

fn persist_job(conn: &mut SqliteConnection, job: &ScanJob) -> Result<(), ScanJobError> {
    let updated = diesel::update(scan_jobs::table.find(uuid_to_blob(&job.id)))
        .set(&SqliteScanJob::from_domain(job))
        .execute(conn)?;
    if updated == 0 {
        return Err(ScanJobError::not_found("ScanJob", job.id));
    }
    Ok(())
}

fn replace_job_sources(
    conn: &mut SqliteConnection,
    job_id: &UniversalUuid,
    source_ids: &[UniversalUuid],
) -> Result<(), ScanJobError> {
    diesel::delete(job_sources::table.filter(job_sources::job_id.eq(uuid_to_blob(job_id))))
        .execute(conn)?;
    let rows: Vec<SqliteJobSource> = source_ids
        .iter()
        .map(|source_id| SqliteJobSource {
            job_id: uuid_to_blob(job_id),
            source_id: uuid_to_blob(source_id),
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(job_sources::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

fn create_connection_container(conn: &mut SqliteConnection, now: &str) -> Result<UniversalUuid, ScanJobError> {
    let id = UniversalUuid::new_v4();
    diesel::insert_into(job_connection_results::table)
        .values(&NewSqliteJobConnectionResult {
            id: uuid_to_blob(&id),
            created_at: now.to_string(),
        })
        .execute(conn)?;
    Ok(id)
}

fn create_inspection_container(conn: &mut SqliteConnection, now: &str) -> Result<UniversalUuid, ScanJobError> {
    let id = UniversalUuid::new_v4();
    diesel::insert_into(job_inspection_results::table)
        .values(&NewSqliteJobInspectionResult {
            id: uuid_to_blob(&id),
            created_at: now.to_string(),
        })
        .execute(conn)?;
    Ok(id)
}

/// Removes everything a previous queue attempt built: tasks, their edges,
/// the task result records of both containers and the fingerprints of the
/// job's deployment report. Returns the number of tasks removed.
fn purge_tasks(conn: &mut SqliteConnection, job: &ScanJob) -> Result<usize, ScanJobError> {
    let removed = delete_tasks_for_job(conn, &job.id)?;
    if removed == 0 {
        return Ok(0);
    }

    if let Some(container) = &job.connection_results_id {
        diesel::delete(
            task_connection_results::table
                .filter(task_connection_results::job_connection_result_id.eq(uuid_to_blob(container))),
        )
        .execute(conn)?;
    }
    if let Some(container) = &job.inspection_results_id {
        diesel::delete(
            task_inspection_results::table
                .filter(task_inspection_results::job_inspection_result_id.eq(uuid_to_blob(container))),
        )
        .execute(conn)?;
    }
    delete_job_fingerprints(conn, job)?;
    Ok(removed)
}

fn missing_container(job: &ScanJob, kind: &str) -> ScanJobError {
    ScanJobError::InvalidData(format!("job {} has no {} results container", job.id, kind))
}

/// Turns a plan into tasks with fresh ids, creating one result record per
/// connect and inspect task.
fn materialize_plan(
    conn: &mut SqliteConnection,
    job: &ScanJob,
    plan: &TaskPlan,
    now: UniversalTimestamp,
) -> Result<Vec<ScanTask>, ScanJobError> {
    let now_str = now.to_rfc3339();
    let mut ids_by_sequence: HashMap<i32, UniversalUuid> = HashMap::new();
    let mut tasks = Vec::with_capacity(plan.len());

    for planned in plan.tasks() {
        let id = UniversalUuid::new_v4();
        let prerequisites = planned
            .prerequisites
            .iter()
            .map(|seq| {
                ids_by_sequence.get(seq).copied().ok_or_else(|| {
                    ScanJobError::InvalidData(format!(
                        "task {} depends on unplanned task {}",
                        planned.sequence_number, seq
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ids_by_sequence.insert(planned.sequence_number, id);

        let mut task = ScanTask {
            id,
            job_id: job.id,
            source_id: planned.source_id,
            scan_type: planned.scan_type,
            status: ScanStatus::Pending,
            status_message: Some(task_status_message(ScanStatus::Pending).to_string()),
            sequence_number: planned.sequence_number,
            prerequisites,
            connection_result_id: None,
            inspection_result_id: None,
            details_report_id: None,
            systems_count: 0,
            systems_scanned: 0,
            systems_failed: 0,
            systems_unreachable: 0,
            start_time: None,
            end_time: None,
            created_at: now,
            updated_at: now,
        };

        match planned.scan_type {
            ScanType::Connect => {
                let container = job
                    .connection_results_id
                    .ok_or_else(|| missing_container(job, "connection"))?;
                let result_id = UniversalUuid::new_v4();
                diesel::insert_into(task_connection_results::table)
                    .values(&SqliteTaskConnectionResult {
                        id: uuid_to_blob(&result_id),
                        job_connection_result_id: uuid_to_blob(&container),
                        created_at: now_str.clone(),
                    })
                    .execute(conn)?;
                task.connection_result_id = Some(result_id);
            }
            ScanType::Inspect => {
                let container = job
                    .inspection_results_id
                    .ok_or_else(|| missing_container(job, "inspection"))?;
                let result_id = UniversalUuid::new_v4();
                diesel::insert_into(task_inspection_results::table)
                    .values(&SqliteTaskInspectionResult {
                        id: uuid_to_blob(&result_id),
                        job_inspection_result_id: uuid_to_blob(&container),
                        created_at: now_str.clone(),
                    })
                    .execute(conn)?;
                task.inspection_result_id = Some(result_id);
            }
            ScanType::Fingerprint => {
                if job.scan_type == ScanType::Fingerprint {
                    task.details_report_id = job.details_report_id;
                }
            }
        }
        tasks.push(task);
    }
    Ok(tasks)
}
