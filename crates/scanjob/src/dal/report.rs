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

//! Report DAL
//!
//! The minimal surface the report collaborator needs: creating details and
//! deployment reports, attaching them to jobs, and recording system
//! fingerprints. Job counts read the fingerprint total through
//! [`count_job_fingerprints`].

use super::models::{SqliteDeploymentReport, SqliteDetailsReport, SqliteSystemFingerprint};
use super::DAL;
use crate::database::schema::{deployment_reports, details_reports, scan_jobs, system_fingerprints};
use crate::database::universal_types::{current_timestamp_string, uuid_to_blob, UniversalUuid};
use crate::error::ScanJobError;
use crate::models::report::{DeploymentReport, DetailsReport, SystemFingerprint};
use crate::models::scan_job::ScanJob;
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::debug;

/// Data access layer for report operations.
#[derive(Clone)]
pub struct ReportDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ReportDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates an empty details report.
    pub async fn create_details_report(&self) -> Result<DetailsReport, ScanJobError> {
        self.dal
            .write(|conn| {
                let id = UniversalUuid::new_v4();
                let row = SqliteDetailsReport {
                    id: uuid_to_blob(&id),
                    deployment_report_id: None,
                    created_at: current_timestamp_string(),
                };
                diesel::insert_into(details_reports::table)
                    .values(&row)
                    .execute(conn)?;
                load_details_report(conn, &id)
            })
            .await
    }

    pub async fn get_details_report(&self, id: UniversalUuid) -> Result<DetailsReport, ScanJobError> {
        self.dal.read(move |conn| load_details_report(conn, &id)).await
    }

    /// Links a job to its details report and records the externally assigned
    /// report id.
    pub async fn attach_details_report(
        &self,
        job_id: UniversalUuid,
        details_report_id: UniversalUuid,
        report_id: i32,
    ) -> Result<(), ScanJobError> {
        self.dal
            .write(move |conn| {
                load_details_report(conn, &details_report_id)?;
                let updated = diesel::update(scan_jobs::table.find(uuid_to_blob(&job_id)))
                    .set((
                        scan_jobs::details_report_id.eq(Some(uuid_to_blob(&details_report_id))),
                        scan_jobs::report_id.eq(Some(report_id)),
                        scan_jobs::updated_at.eq(current_timestamp_string()),
                    ))
                    .execute(conn)?;
                if updated == 0 {
                    return Err(ScanJobError::not_found("ScanJob", job_id));
                }
                debug!(
                    "Attached details report {} (report {}) to job {}",
                    details_report_id, report_id, job_id
                );
                Ok(())
            })
            .await
    }

    /// Returns the deployment report of a details report, creating it on
    /// first use.
    pub async fn attach_deployment_report(
        &self,
        details_report_id: UniversalUuid,
    ) -> Result<DeploymentReport, ScanJobError> {
        self.dal
            .write(move |conn| {
                let details = load_details_report(conn, &details_report_id)?;
                if let Some(existing) = details.deployment_report_id {
                    return load_deployment_report(conn, &existing);
                }

                let id = UniversalUuid::new_v4();
                let row = SqliteDeploymentReport {
                    id: uuid_to_blob(&id),
                    created_at: current_timestamp_string(),
                };
                diesel::insert_into(deployment_reports::table)
                    .values(&row)
                    .execute(conn)?;
                diesel::update(details_reports::table.find(uuid_to_blob(&details_report_id)))
                    .set(details_reports::deployment_report_id.eq(Some(uuid_to_blob(&id))))
                    .execute(conn)?;
                load_deployment_report(conn, &id)
            })
            .await
    }

    /// Records one fingerprint per name under a deployment report.
    pub async fn add_system_fingerprints(
        &self,
        deployment_report_id: UniversalUuid,
        names: Vec<String>,
    ) -> Result<Vec<SystemFingerprint>, ScanJobError> {
        self.dal
            .write(move |conn| {
                load_deployment_report(conn, &deployment_report_id)?;
                let now = current_timestamp_string();
                let rows: Vec<SqliteSystemFingerprint> = names
                    .into_iter()
                    .map(|name| SqliteSystemFingerprint {
                        id: uuid_to_blob(&UniversalUuid::new_v4()),
                        deployment_report_id: uuid_to_blob(&deployment_report_id),
                        name,
                        created_at: now.clone(),
                    })
                    .collect();
                for row in &rows {
                    diesel::insert_into(system_fingerprints::table)
                        .values(row)
                        .execute(conn)?;
                }
                rows.into_iter().map(SystemFingerprint::try_from).collect()
            })
            .await
    }

    /// Number of fingerprints recorded under a deployment report.
    pub async fn count_fingerprints(&self, deployment_report_id: UniversalUuid) -> Result<i64, ScanJobError> {
        self.dal
            .read(move |conn| count_fingerprints(conn, &deployment_report_id))
            .await
    }
}

pub(crate) fn load_details_report(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<DetailsReport, ScanJobError> {
    details_reports::table
        .find(uuid_to_blob(id))
        .select(SqliteDetailsReport::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("DetailsReport", id))
        .and_then(DetailsReport::try_from)
}

fn load_deployment_report(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<DeploymentReport, ScanJobError> {
    deployment_reports::table
        .find(uuid_to_blob(id))
        .select(SqliteDeploymentReport::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("DeploymentReport", id))
        .and_then(DeploymentReport::try_from)
}

fn count_fingerprints(
    conn: &mut SqliteConnection,
    deployment_report_id: &UniversalUuid,
) -> Result<i64, ScanJobError> {
    Ok(system_fingerprints::table
        .filter(system_fingerprints::deployment_report_id.eq(uuid_to_blob(deployment_report_id)))
        .count()
        .get_result(conn)?)
}

/// The deployment report reachable from the job's details report, if any.
fn job_deployment_report_id(
    conn: &mut SqliteConnection,
    job: &ScanJob,
) -> Result<Option<UniversalUuid>, ScanJobError> {
    let Some(details_report_id) = &job.details_report_id else {
        return Ok(None);
    };
    let details = details_reports::table
        .find(uuid_to_blob(details_report_id))
        .select(SqliteDetailsReport::as_select())
        .first(conn)
        .optional()?;
    match details {
        Some(row) => Ok(DetailsReport::try_from(row)?.deployment_report_id),
        None => Ok(None),
    }
}

/// Fingerprint total used by job counts: zero when the job has no report
/// id, no details report or no deployment report.
pub(crate) fn count_job_fingerprints(conn: &mut SqliteConnection, job: &ScanJob) -> Result<i64, ScanJobError> {
    if job.report_id.is_none() {
        return Ok(0);
    }
    match job_deployment_report_id(conn, job)? {
        Some(deployment_report_id) => count_fingerprints(conn, &deployment_report_id),
        None => Ok(0),
    }
}

/// Removes every fingerprint of the job's deployment report. Returns the
/// number removed.
pub(crate) fn delete_job_fingerprints(conn: &mut SqliteConnection, job: &ScanJob) -> Result<usize, ScanJobError> {
    match job_deployment_report_id(conn, job)? {
        Some(deployment_report_id) => Ok(diesel::delete(
            system_fingerprints::table
                .filter(system_fingerprints::deployment_report_id.eq(uuid_to_blob(&deployment_report_id))),
        )
        .execute(conn)?),
        None => Ok(0),
    }
}
