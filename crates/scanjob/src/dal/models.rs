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

//! SQLite-specific database models
//!
//! This module contains Diesel model definitions that use SQLite-compatible types.
//! UUIDs are stored as BLOB (Vec<u8>), timestamps as TEXT (RFC3339 strings),
//! and option sub-records as JSON TEXT.
//!
//! These models are used internally by the DAL and converted to/from domain
//! types at the DAL boundary. Conversions fail with
//! [`ScanJobError::InvalidData`] when a stored value cannot be mapped back.

use crate::database::schema::*;
use crate::database::universal_types::{
    blob_to_uuid, string_to_timestamp, uuid_to_blob, UniversalTimestamp, UniversalUuid,
};
use crate::error::ScanJobError;
use crate::models::report::{DeploymentReport, DetailsReport, SystemFingerprint};
use crate::models::results::{TaskConnectionResult, TaskInspectionResult};
use crate::models::scan::{Scan, ScanOptions, ScanType};
use crate::models::scan_job::ScanJob;
use crate::models::scan_task::ScanTask;
use crate::models::source::Source;
use crate::models::status::ScanStatus;
use diesel::prelude::*;

// ============================================================================
// Source Models
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteSource {
    pub id: Vec<u8>,
    pub name: String,
    pub source_type: String,
    pub hosts: String,
    pub port: Option<i32>,
    pub most_recent_connect_scan_id: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Scan Models
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = scan_options)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteScanOptions {
    pub id: Vec<u8>,
    pub max_concurrency: i32,
    pub disabled_optional_products: Option<String>,
    pub enabled_extended_product_search: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = scans)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteScan {
    pub id: Vec<u8>,
    pub name: String,
    pub scan_type: String,
    pub options_id: Option<Vec<u8>>,
    pub most_recent_scanjob_id: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = scan_sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteScanSource {
    pub scan_id: Vec<u8>,
    pub source_id: Vec<u8>,
    pub position: i32,
}

// ============================================================================
// Scan Job Models
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = scan_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SqliteScanJob {
    pub id: Vec<u8>,
    pub scan_type: String,
    pub status: String,
    pub status_message: Option<String>,
    pub options_id: Option<Vec<u8>>,
    pub report_id: Option<i32>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub scan_id: Option<Vec<u8>>,
    pub connection_results_id: Option<Vec<u8>>,
    pub inspection_results_id: Option<Vec<u8>>,
    pub details_report_id: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteJobSource {
    pub job_id: Vec<u8>,
    pub source_id: Vec<u8>,
}

// ============================================================================
// Scan Task Models
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = scan_tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SqliteScanTask {
    pub id: Vec<u8>,
    pub job_id: Vec<u8>,
    pub source_id: Option<Vec<u8>>,
    pub scan_type: String,
    pub status: String,
    pub status_message: Option<String>,
    pub sequence_number: i32,
    pub connection_result_id: Option<Vec<u8>>,
    pub inspection_result_id: Option<Vec<u8>>,
    pub details_report_id: Option<Vec<u8>>,
    pub systems_count: i32,
    pub systems_scanned: i32,
    pub systems_failed: i32,
    pub systems_unreachable: i32,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_prerequisites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteTaskPrerequisite {
    pub task_id: Vec<u8>,
    pub prerequisite_id: Vec<u8>,
}

// ============================================================================
// Result Container Models
// ============================================================================

#[derive(Debug, Insertable)]
#[diesel(table_name = job_connection_results)]
pub struct NewSqliteJobConnectionResult {
    pub id: Vec<u8>,
    pub created_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_connection_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteTaskConnectionResult {
    pub id: Vec<u8>,
    pub job_connection_result_id: Vec<u8>,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_inspection_results)]
pub struct NewSqliteJobInspectionResult {
    pub id: Vec<u8>,
    pub created_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_inspection_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteTaskInspectionResult {
    pub id: Vec<u8>,
    pub job_inspection_result_id: Vec<u8>,
    pub created_at: String,
}

// ============================================================================
// Report Models
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = details_reports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteDetailsReport {
    pub id: Vec<u8>,
    pub deployment_report_id: Option<Vec<u8>>,
    pub created_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = deployment_reports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteDeploymentReport {
    pub id: Vec<u8>,
    pub created_at: String,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = system_fingerprints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteSystemFingerprint {
    pub id: Vec<u8>,
    pub deployment_report_id: Vec<u8>,
    pub name: String,
    pub created_at: String,
}

// ============================================================================
// Column helpers
// ============================================================================

pub(crate) fn opt_uuid_to_blob(id: &Option<UniversalUuid>) -> Option<Vec<u8>> {
    id.as_ref().map(uuid_to_blob)
}

pub(crate) fn opt_blob_to_uuid(blob: Option<Vec<u8>>) -> Result<Option<UniversalUuid>, ScanJobError> {
    blob.map(|b| blob_to_uuid(&b)).transpose()
}

fn opt_timestamp(value: Option<String>) -> Result<Option<UniversalTimestamp>, ScanJobError> {
    value.map(|s| string_to_timestamp(&s)).transpose()
}

fn parse_status(value: &str) -> Result<ScanStatus, ScanJobError> {
    ScanStatus::from_str(value)
        .ok_or_else(|| ScanJobError::InvalidData(format!("unknown status '{}'", value)))
}

fn parse_scan_type(value: &str) -> Result<ScanType, ScanJobError> {
    ScanType::from_str(value)
        .ok_or_else(|| ScanJobError::InvalidData(format!("unknown scan type '{}'", value)))
}

// ============================================================================
// Conversion Implementations: SQLite models <-> Domain models
// ============================================================================

impl TryFrom<SqliteSource> for Source {
    type Error = ScanJobError;

    fn try_from(s: SqliteSource) -> Result<Self, Self::Error> {
        Ok(Source {
            id: blob_to_uuid(&s.id)?,
            name: s.name,
            source_type: s.source_type,
            hosts: serde_json::from_str(&s.hosts)?,
            port: s.port,
            most_recent_connect_scan_id: opt_blob_to_uuid(s.most_recent_connect_scan_id)?,
            created_at: string_to_timestamp(&s.created_at)?,
            updated_at: string_to_timestamp(&s.updated_at)?,
        })
    }
}

impl SqliteScanOptions {
    pub fn from_domain(
        id: &UniversalUuid,
        options: &ScanOptions,
        created_at: String,
    ) -> Result<Self, ScanJobError> {
        let max_concurrency = i32::try_from(options.max_concurrency).map_err(|_| {
            ScanJobError::InvalidData(format!(
                "max_concurrency out of range: {}",
                options.max_concurrency
            ))
        })?;
        Ok(Self {
            id: uuid_to_blob(id),
            max_concurrency,
            disabled_optional_products: options
                .disabled_optional_products
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            enabled_extended_product_search: options
                .enabled_extended_product_search
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            created_at,
        })
    }
}

impl TryFrom<SqliteScanOptions> for ScanOptions {
    type Error = ScanJobError;

    fn try_from(s: SqliteScanOptions) -> Result<Self, Self::Error> {
        let max_concurrency = u32::try_from(s.max_concurrency).map_err(|_| {
            ScanJobError::InvalidData(format!("negative max_concurrency: {}", s.max_concurrency))
        })?;
        Ok(ScanOptions {
            max_concurrency,
            disabled_optional_products: s
                .disabled_optional_products
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            enabled_extended_product_search: s
                .enabled_extended_product_search
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

impl SqliteScan {
    pub fn into_domain(
        self,
        source_ids: Vec<UniversalUuid>,
        options: Option<ScanOptions>,
    ) -> Result<Scan, ScanJobError> {
        Ok(Scan {
            id: blob_to_uuid(&self.id)?,
            name: self.name,
            scan_type: parse_scan_type(&self.scan_type)?,
            source_ids,
            options_id: opt_blob_to_uuid(self.options_id)?,
            options,
            most_recent_scanjob_id: opt_blob_to_uuid(self.most_recent_scanjob_id)?,
            created_at: string_to_timestamp(&self.created_at)?,
            updated_at: string_to_timestamp(&self.updated_at)?,
        })
    }
}

impl SqliteScanJob {
    pub fn from_domain(job: &ScanJob) -> Self {
        Self {
            id: uuid_to_blob(&job.id),
            scan_type: job.scan_type.as_str().to_string(),
            status: job.status.as_str().to_string(),
            status_message: job.status_message.clone(),
            options_id: opt_uuid_to_blob(&job.options_id),
            report_id: job.report_id,
            start_time: job.start_time.map(|t| t.to_rfc3339()),
            end_time: job.end_time.map(|t| t.to_rfc3339()),
            scan_id: opt_uuid_to_blob(&job.scan_id),
            connection_results_id: opt_uuid_to_blob(&job.connection_results_id),
            inspection_results_id: opt_uuid_to_blob(&job.inspection_results_id),
            details_report_id: opt_uuid_to_blob(&job.details_report_id),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }

    pub fn into_domain(
        self,
        source_ids: Vec<UniversalUuid>,
        options: Option<ScanOptions>,
    ) -> Result<ScanJob, ScanJobError> {
        Ok(ScanJob {
            id: blob_to_uuid(&self.id)?,
            scan_type: parse_scan_type(&self.scan_type)?,
            status: parse_status(&self.status)?,
            status_message: self.status_message,
            options_id: opt_blob_to_uuid(self.options_id)?,
            options,
            report_id: self.report_id,
            start_time: opt_timestamp(self.start_time)?,
            end_time: opt_timestamp(self.end_time)?,
            scan_id: opt_blob_to_uuid(self.scan_id)?,
            source_ids,
            connection_results_id: opt_blob_to_uuid(self.connection_results_id)?,
            inspection_results_id: opt_blob_to_uuid(self.inspection_results_id)?,
            details_report_id: opt_blob_to_uuid(self.details_report_id)?,
            created_at: string_to_timestamp(&self.created_at)?,
            updated_at: string_to_timestamp(&self.updated_at)?,
        })
    }
}

impl SqliteScanTask {
    pub fn from_domain(task: &ScanTask) -> Self {
        Self {
            id: uuid_to_blob(&task.id),
            job_id: uuid_to_blob(&task.job_id),
            source_id: opt_uuid_to_blob(&task.source_id),
            scan_type: task.scan_type.as_str().to_string(),
            status: task.status.as_str().to_string(),
            status_message: task.status_message.clone(),
            sequence_number: task.sequence_number,
            connection_result_id: opt_uuid_to_blob(&task.connection_result_id),
            inspection_result_id: opt_uuid_to_blob(&task.inspection_result_id),
            details_report_id: opt_uuid_to_blob(&task.details_report_id),
            systems_count: task.systems_count,
            systems_scanned: task.systems_scanned,
            systems_failed: task.systems_failed,
            systems_unreachable: task.systems_unreachable,
            start_time: task.start_time.map(|t| t.to_rfc3339()),
            end_time: task.end_time.map(|t| t.to_rfc3339()),
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }

    pub fn into_domain(self, prerequisites: Vec<UniversalUuid>) -> Result<ScanTask, ScanJobError> {
        Ok(ScanTask {
            id: blob_to_uuid(&self.id)?,
            job_id: blob_to_uuid(&self.job_id)?,
            source_id: opt_blob_to_uuid(self.source_id)?,
            scan_type: parse_scan_type(&self.scan_type)?,
            status: parse_status(&self.status)?,
            status_message: self.status_message,
            sequence_number: self.sequence_number,
            prerequisites,
            connection_result_id: opt_blob_to_uuid(self.connection_result_id)?,
            inspection_result_id: opt_blob_to_uuid(self.inspection_result_id)?,
            details_report_id: opt_blob_to_uuid(self.details_report_id)?,
            systems_count: self.systems_count,
            systems_scanned: self.systems_scanned,
            systems_failed: self.systems_failed,
            systems_unreachable: self.systems_unreachable,
            start_time: opt_timestamp(self.start_time)?,
            end_time: opt_timestamp(self.end_time)?,
            created_at: string_to_timestamp(&self.created_at)?,
            updated_at: string_to_timestamp(&self.updated_at)?,
        })
    }
}

impl TryFrom<SqliteTaskConnectionResult> for TaskConnectionResult {
    type Error = ScanJobError;

    fn try_from(s: SqliteTaskConnectionResult) -> Result<Self, Self::Error> {
        Ok(TaskConnectionResult {
            id: blob_to_uuid(&s.id)?,
            job_connection_result_id: blob_to_uuid(&s.job_connection_result_id)?,
            created_at: string_to_timestamp(&s.created_at)?,
        })
    }
}

impl TryFrom<SqliteTaskInspectionResult> for TaskInspectionResult {
    type Error = ScanJobError;

    fn try_from(s: SqliteTaskInspectionResult) -> Result<Self, Self::Error> {
        Ok(TaskInspectionResult {
            id: blob_to_uuid(&s.id)?,
            job_inspection_result_id: blob_to_uuid(&s.job_inspection_result_id)?,
            created_at: string_to_timestamp(&s.created_at)?,
        })
    }
}

impl TryFrom<SqliteDetailsReport> for DetailsReport {
    type Error = ScanJobError;

    fn try_from(s: SqliteDetailsReport) -> Result<Self, Self::Error> {
        Ok(DetailsReport {
            id: blob_to_uuid(&s.id)?,
            deployment_report_id: opt_blob_to_uuid(s.deployment_report_id)?,
            created_at: string_to_timestamp(&s.created_at)?,
        })
    }
}

impl TryFrom<SqliteDeploymentReport> for DeploymentReport {
    type Error = ScanJobError;

    fn try_from(s: SqliteDeploymentReport) -> Result<Self, Self::Error> {
        Ok(DeploymentReport {
            id: blob_to_uuid(&s.id)?,
            created_at: string_to_timestamp(&s.created_at)?,
        })
    }
}

impl TryFrom<SqliteSystemFingerprint> for SystemFingerprint {
    type Error = ScanJobError;

    fn try_from(s: SqliteSystemFingerprint) -> Result<Self, Self::Error> {
        Ok(SystemFingerprint {
            id: blob_to_uuid(&s.id)?,
            deployment_report_id: blob_to_uuid(&s.deployment_report_id)?,
            name: s.name,
            created_at: string_to_timestamp(&s.created_at)?,
        })
    }
}
