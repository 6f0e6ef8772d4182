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

//! Shared test fixture: a freshly migrated SQLite database in a temporary
//! directory per test, plus helpers for the usual scan/job setup.

#![allow(dead_code)]

use diesel::prelude::*;
use scanjob::database::schema::scan_jobs;
use scanjob::database::universal_types::uuid_to_blob;
use scanjob::models::scan::{NewScan, Scan, ScanOptions, ScanType};
use scanjob::models::scan_job::{NewScanJob, ScanJob};
use scanjob::models::scan_task::ScanTask;
use scanjob::models::source::{NewSource, Source};
use scanjob::{Database, ScanJobConfig, ScanStatus, UniversalUuid, DAL};
use tempfile::TempDir;

pub struct TestFixture {
    // Held so the database file outlives the test
    _dir: TempDir,
    pub database: Database,
    pub dal: DAL,
}

impl TestFixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("scanjob-test.db");
        let config = ScanJobConfig::builder()
            .database_url(path.to_string_lossy())
            .db_pool_size(4)
            .build();

        let database = Database::new(&config).expect("Failed to create database");
        database
            .run_migrations()
            .await
            .expect("Failed to run migrations");

        Self {
            _dir: dir,
            dal: DAL::new(database.clone()),
            database,
        }
    }

    pub async fn create_sources(&self, names: &[&str]) -> Vec<Source> {
        let mut sources = Vec::new();
        for name in names {
            let source = self
                .dal
                .source()
                .create(
                    NewSource::new(*name, "network")
                        .with_hosts([format!("{}.example.com", name)])
                        .with_port(22),
                )
                .await
                .expect("Failed to create source");
            sources.push(source);
        }
        sources
    }

    pub async fn create_scan(
        &self,
        scan_type: ScanType,
        sources: &[Source],
        options: Option<ScanOptions>,
    ) -> Scan {
        let mut new_scan =
            NewScan::new("test-scan", scan_type).with_sources(sources.iter().map(|s| s.id).collect());
        if let Some(options) = options {
            new_scan = new_scan.with_options(options);
        }
        self.dal
            .scan()
            .create(new_scan)
            .await
            .expect("Failed to create scan")
    }

    /// Creates a scan over `source_names` and a CREATED job for it.
    pub async fn create_scan_job(
        &self,
        scan_type: ScanType,
        source_names: &[&str],
        options: Option<ScanOptions>,
    ) -> (Scan, ScanJob) {
        let sources = self.create_sources(source_names).await;
        let scan = self.create_scan(scan_type, &sources, options).await;
        let job = self
            .dal
            .scan_job()
            .create(NewScanJob::from_scan(&scan))
            .await
            .expect("Failed to create job");
        (scan, job)
    }

    /// Creates and queues a job, asserting that queueing was applied.
    pub async fn queued_job(&self, scan_type: ScanType, source_names: &[&str]) -> (Scan, ScanJob) {
        let (scan, job) = self.create_scan_job(scan_type, source_names, None).await;
        let outcome = self
            .dal
            .scan_job()
            .queue(job.id)
            .await
            .expect("Failed to queue job");
        assert!(outcome.is_applied());
        let job = self.dal.scan_job().get(job.id).await.expect("Failed to reload job");
        (scan, job)
    }

    pub async fn tasks(&self, job_id: UniversalUuid) -> Vec<ScanTask> {
        self.dal
            .scan_job()
            .list_tasks(job_id)
            .await
            .expect("Failed to list tasks")
    }

    /// Writes a status directly, bypassing the state machine. Used to stage
    /// states that the public API cannot reach, such as leftover tasks under
    /// a CREATED job.
    pub async fn force_job_status(&self, job_id: UniversalUuid, status: ScanStatus) {
        let conn = self
            .database
            .get_connection()
            .await
            .expect("Failed to get connection");
        let blob = uuid_to_blob(&job_id);
        conn.interact(move |conn| {
            diesel::update(scan_jobs::table.find(blob))
                .set(scan_jobs::status.eq(status.as_str()))
                .execute(conn)
        })
        .await
        .expect("interact failed")
        .expect("Failed to force job status");
    }
}
