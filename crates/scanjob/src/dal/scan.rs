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

//! Scan DAL
//!
//! Scans are user-managed definitions. Editing or deleting a scan never
//! touches the jobs created from it: jobs hold their own options row, and
//! deleting a scan only clears the jobs' weak `scan_id` reference.

use super::models::{SqliteScan, SqliteScanOptions, SqliteScanSource};
use super::DAL;
use crate::database::schema::{scan_jobs, scan_options, scan_sources, scans};
use crate::database::universal_types::{
    blob_to_uuid, current_timestamp_string, uuid_to_blob, UniversalUuid,
};
use crate::error::ScanJobError;
use crate::models::scan::{NewScan, Scan, ScanOptions};
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::info;

/// Data access layer for scan operations.
#[derive(Clone)]
pub struct ScanDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ScanDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a scan with its source list and optional options row.
    pub async fn create(&self, new_scan: NewScan) -> Result<Scan, ScanJobError> {
        self.dal
            .write(move |conn| {
                let id = UniversalUuid::new_v4();
                let now = current_timestamp_string();

                let options_id = match &new_scan.options {
                    Some(options) => Some(insert_options(conn, options, &now)?),
                    None => None,
                };

                let row = SqliteScan {
                    id: uuid_to_blob(&id),
                    name: new_scan.name,
                    scan_type: new_scan.scan_type.as_str().to_string(),
                    options_id: options_id.as_ref().map(uuid_to_blob),
                    most_recent_scanjob_id: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                diesel::insert_into(scans::table).values(&row).execute(conn)?;

                let mut links = Vec::new();
                for source_id in &new_scan.source_ids {
                    if links
                        .iter()
                        .any(|l: &SqliteScanSource| l.source_id == uuid_to_blob(source_id))
                    {
                        continue;
                    }
                    links.push(SqliteScanSource {
                        scan_id: uuid_to_blob(&id),
                        source_id: uuid_to_blob(source_id),
                        position: links.len() as i32,
                    });
                }
                if !links.is_empty() {
                    diesel::insert_into(scan_sources::table)
                        .values(&links)
                        .execute(conn)?;
                }

                load_scan(conn, &id)
            })
            .await
    }

    pub async fn get(&self, id: UniversalUuid) -> Result<Scan, ScanJobError> {
        self.dal.read(move |conn| load_scan(conn, &id)).await
    }

    /// Replaces the scan's options. Jobs already queued from this scan keep
    /// their own copies.
    pub async fn update_options(
        &self,
        id: UniversalUuid,
        options: Option<ScanOptions>,
    ) -> Result<Scan, ScanJobError> {
        self.dal
            .write(move |conn| {
                let scan = load_scan(conn, &id)?;
                let now = current_timestamp_string();

                let options_id = match (&scan.options_id, &options) {
                    (Some(existing), Some(options)) => {
                        let row = SqliteScanOptions::from_domain(existing, options, now.clone())?;
                        diesel::update(scan_options::table.find(uuid_to_blob(existing)))
                            .set((
                                scan_options::max_concurrency.eq(row.max_concurrency),
                                scan_options::disabled_optional_products
                                    .eq(row.disabled_optional_products),
                                scan_options::enabled_extended_product_search
                                    .eq(row.enabled_extended_product_search),
                            ))
                            .execute(conn)?;
                        Some(*existing)
                    }
                    (None, Some(options)) => Some(insert_options(conn, options, &now)?),
                    (Some(existing), None) => {
                        delete_options(conn, existing)?;
                        None
                    }
                    (None, None) => None,
                };

                diesel::update(scans::table.find(uuid_to_blob(&id)))
                    .set((
                        scans::options_id.eq(options_id.as_ref().map(uuid_to_blob)),
                        scans::updated_at.eq(&now),
                    ))
                    .execute(conn)?;

                load_scan(conn, &id)
            })
            .await
    }

    /// Deletes a scan and its options. Jobs created from it survive with
    /// `scan_id` cleared.
    pub async fn delete(&self, id: UniversalUuid) -> Result<(), ScanJobError> {
        self.dal
            .write(move |conn| {
                let scan = load_scan(conn, &id)?;
                let blob = uuid_to_blob(&id);

                let detached = diesel::update(scan_jobs::table.filter(scan_jobs::scan_id.eq(&blob)))
                    .set(scan_jobs::scan_id.eq(None::<Vec<u8>>))
                    .execute(conn)?;
                diesel::delete(scan_sources::table.filter(scan_sources::scan_id.eq(&blob)))
                    .execute(conn)?;
                diesel::delete(scans::table.find(&blob)).execute(conn)?;
                if let Some(options_id) = &scan.options_id {
                    delete_options(conn, options_id)?;
                }

                info!("Deleted scan {} ({} jobs detached)", id, detached);
                Ok(())
            })
            .await
    }
}

pub(crate) fn load_scan(conn: &mut SqliteConnection, id: &UniversalUuid) -> Result<Scan, ScanJobError> {
    let row = scans::table
        .find(uuid_to_blob(id))
        .select(SqliteScan::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("Scan", id))?;

    let source_ids = scan_sources::table
        .filter(scan_sources::scan_id.eq(uuid_to_blob(id)))
        .order(scan_sources::position.asc())
        .select(scan_sources::source_id)
        .load::<Vec<u8>>(conn)?
        .iter()
        .map(|b| blob_to_uuid(b))
        .collect::<Result<Vec<_>, _>>()?;

    let options = match &row.options_id {
        Some(options_id) => Some(load_options(conn, &blob_to_uuid(options_id)?)?),
        None => None,
    };

    row.into_domain(source_ids, options)
}

pub(crate) fn load_options(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<ScanOptions, ScanJobError> {
    let row = scan_options::table
        .find(uuid_to_blob(id))
        .select(SqliteScanOptions::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("ScanOptions", id))?;
    ScanOptions::try_from(row)
}

/// Inserts `options` as a new row and returns its id.
pub(crate) fn insert_options(
    conn: &mut SqliteConnection,
    options: &ScanOptions,
    now: &str,
) -> Result<UniversalUuid, ScanJobError> {
    let id = UniversalUuid::new_v4();
    let row = SqliteScanOptions::from_domain(&id, options, now.to_string())?;
    diesel::insert_into(scan_options::table)
        .values(&row)
        .execute(conn)?;
    Ok(id)
}

pub(crate) fn delete_options(conn: &mut SqliteConnection, id: &UniversalUuid) -> Result<(), ScanJobError> {
    diesel::delete(scan_options::table.find(uuid_to_blob(id))).execute(conn)?;
    Ok(())
}

/// Points the scan's most recent job at `job_id`.
pub(crate) fn set_most_recent_scanjob(
    conn: &mut SqliteConnection,
    scan_id: &UniversalUuid,
    job_id: &UniversalUuid,
    now: &str,
) -> Result<(), ScanJobError> {
    diesel::update(scans::table.find(uuid_to_blob(scan_id)))
        .set((
            scans::most_recent_scanjob_id.eq(Some(uuid_to_blob(job_id))),
            scans::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}
