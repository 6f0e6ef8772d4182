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

//! Integration tests for job-level count aggregation.

use crate::fixtures::TestFixture;
use scanjob::models::scan::ScanType;
use scanjob::models::scan_task::StatsUpdate;
use scanjob::ScanCounts;

fn stats(count: i32, scanned: i32, failed: i32, unreachable: i32) -> StatsUpdate {
    StatsUpdate {
        systems_count: Some(count),
        systems_scanned: Some(scanned),
        systems_failed: Some(failed),
        systems_unreachable: Some(unreachable),
    }
}

#[tokio::test]
async fn test_counts_absent_until_job_runs() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .create_scan_job(ScanType::Connect, &["alpha"], None)
        .await;
    let jobs = fixture.dal.scan_job();

    assert_eq!(jobs.calculate_counts(job.id, false).await.unwrap(), None);
    jobs.queue(job.id).await.unwrap();
    assert_eq!(jobs.calculate_counts(job.id, false).await.unwrap(), None);

    jobs.status_start(job.id).await.unwrap();
    assert_eq!(
        jobs.calculate_counts(job.id, false).await.unwrap(),
        Some(ScanCounts::default())
    );
}

#[tokio::test]
async fn test_inspect_counts_combine_connect_and_inspect_phases() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .queued_job(ScanType::Inspect, &["alpha", "bravo"])
        .await;
    let tasks = fixture.tasks(job.id).await;
    let task_dal = fixture.dal.scan_task();

    fixture.dal.scan_job().status_start(job.id).await.unwrap();
    task_dal.update_stats(tasks[0].id, stats(10, 8, 1, 1)).await.unwrap();
    task_dal.update_stats(tasks[1].id, stats(5, 4, 0, 1)).await.unwrap();
    task_dal.update_stats(tasks[2].id, stats(8, 7, 1, 0)).await.unwrap();
    task_dal.update_stats(tasks[3].id, stats(4, 3, 0, 1)).await.unwrap();

    let counts = fixture
        .dal
        .scan_job()
        .calculate_counts(job.id, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        counts,
        ScanCounts {
            systems_count: 15,
            systems_scanned: 10,
            systems_failed: 2,
            systems_unreachable: 3,
            system_fingerprint_count: 0,
        }
    );

    let connect_only = fixture
        .dal
        .scan_job()
        .calculate_counts(job.id, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connect_only.systems_count, 15);
    assert_eq!(connect_only.systems_scanned, 12);
    assert_eq!(connect_only.systems_failed, 1);
    assert_eq!(connect_only.systems_unreachable, 2);
}

#[tokio::test]
async fn test_fingerprint_count_requires_report_id() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Inspect, &["alpha"]).await;
    fixture.dal.scan_job().status_start(job.id).await.unwrap();

    let reports = fixture.dal.report();
    let details = reports.create_details_report().await.unwrap();
    let deployment = reports.attach_deployment_report(details.id).await.unwrap();
    reports
        .add_system_fingerprints(
            deployment.id,
            vec!["web-01".into(), "web-02".into(), "db-01".into()],
        )
        .await
        .unwrap();

    // Report exists but is not attached to the job yet
    let counts = fixture
        .dal
        .scan_job()
        .calculate_counts(job.id, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counts.system_fingerprint_count, 0);

    reports
        .attach_details_report(job.id, details.id, 42)
        .await
        .unwrap();
    let counts = fixture
        .dal
        .scan_job()
        .calculate_counts(job.id, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counts.system_fingerprint_count, 3);
    assert_eq!(
        fixture.dal.scan_job().get(job.id).await.unwrap().report_id,
        Some(42)
    );
}
