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

//! Source DAL: minimal create and read access to scan targets.

use super::models::SqliteSource;
use super::DAL;
use crate::database::schema::sources;
use crate::database::universal_types::{
    blob_to_uuid, current_timestamp_string, uuid_to_blob, UniversalUuid,
};
use crate::error::ScanJobError;
use crate::models::source::{NewSource, Source};
use diesel::prelude::*;
use diesel::SqliteConnection;

/// Data access layer for source operations.
#[derive(Clone)]
pub struct SourceDAL<'a> {
    dal: &'a DAL,
}

impl<'a> SourceDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new source.
    pub async fn create(&self, new_source: NewSource) -> Result<Source, ScanJobError> {
        let id = UniversalUuid::new_v4();
        let now = current_timestamp_string();
        let row = SqliteSource {
            id: uuid_to_blob(&id),
            name: new_source.name,
            source_type: new_source.source_type,
            hosts: serde_json::to_string(&new_source.hosts)?,
            port: new_source.port,
            most_recent_connect_scan_id: None,
            created_at: now.clone(),
            updated_at: now,
        };

        self.dal
            .write(move |conn| {
                diesel::insert_into(sources::table).values(&row).execute(conn)?;
                load_source(conn, &id)
            })
            .await
    }

    pub async fn get(&self, id: UniversalUuid) -> Result<Source, ScanJobError> {
        self.dal.read(move |conn| load_source(conn, &id)).await
    }

    /// Lists sources ordered by name.
    pub async fn list(&self) -> Result<Vec<Source>, ScanJobError> {
        self.dal
            .read(|conn| {
                sources::table
                    .order((sources::name.asc(), sources::id.asc()))
                    .select(SqliteSource::as_select())
                    .load(conn)?
                    .into_iter()
                    .map(Source::try_from)
                    .collect()
            })
            .await
    }
}

pub(crate) fn load_source(conn: &mut SqliteConnection, id: &UniversalUuid) -> Result<Source, ScanJobError> {
    let row = sources::table
        .find(uuid_to_blob(id))
        .select(SqliteSource::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ScanJobError::not_found("Source", id))?;
    Source::try_from(row)
}

/// Orders `ids` by source name, then id, the order in which connect tasks
/// are created. Unknown ids are an error.
pub(crate) fn order_sources(
    conn: &mut SqliteConnection,
    ids: &[UniversalUuid],
) -> Result<Vec<UniversalUuid>, ScanJobError> {
    let blobs: Vec<Vec<u8>> = ids.iter().map(uuid_to_blob).collect();
    let rows: Vec<(Vec<u8>, String)> = sources::table
        .filter(sources::id.eq_any(blobs))
        .order((sources::name.asc(), sources::id.asc()))
        .select((sources::id, sources::name))
        .load(conn)?;

    let ordered: Vec<UniversalUuid> = rows
        .into_iter()
        .map(|(id, _)| blob_to_uuid(&id))
        .collect::<Result<_, _>>()?;

    if let Some(missing) = ids.iter().find(|id| !ordered.contains(id)) {
        return Err(ScanJobError::not_found("Source", missing));
    }
    Ok(ordered)
}

/// Points each source's most recent connect scan at `job_id`.
pub(crate) fn set_most_recent_connect_scan(
    conn: &mut SqliteConnection,
    source_ids: &[UniversalUuid],
    job_id: &UniversalUuid,
    now: &str,
) -> Result<(), ScanJobError> {
    let blobs: Vec<Vec<u8>> = source_ids.iter().map(uuid_to_blob).collect();
    diesel::update(sources::table.filter(sources::id.eq_any(blobs)))
        .set((
            sources::most_recent_connect_scan_id.eq(Some(uuid_to_blob(job_id))),
            sources::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}
