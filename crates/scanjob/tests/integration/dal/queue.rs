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

//! Integration tests for `ScanJobDAL::queue` and the task graph it builds.

use crate::fixtures::TestFixture;
use scanjob::models::scan::{ScanOptions, ScanType};
use scanjob::models::scan_job::NewScanJob;
use scanjob::models::scan_task::ScanTask;
use scanjob::{ScanJobError, ScanStatus, TransitionOutcome, UniversalUuid};
use std::collections::BTreeSet;

fn prerequisite_sequences(tasks: &[ScanTask], task: &ScanTask) -> BTreeSet<i32> {
    task.prerequisites
        .iter()
        .map(|id| {
            tasks
                .iter()
                .find(|t| t.id == *id)
                .expect("prerequisite not in job")
                .sequence_number
        })
        .collect()
}

/// Sequence number, type, source and prerequisite sequences of every task.
fn graph_shape(tasks: &[ScanTask]) -> Vec<(i32, ScanType, Option<UniversalUuid>, BTreeSet<i32>)> {
    tasks
        .iter()
        .map(|t| {
            (
                t.sequence_number,
                t.scan_type,
                t.source_id,
                prerequisite_sequences(tasks, t),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_inspect_job_builds_connect_inspect_fingerprint_graph() {
    let fixture = TestFixture::new().await;
    let options = ScanOptions {
        max_concurrency: 4,
        ..Default::default()
    };
    let (scan, job) = fixture
        .create_scan_job(ScanType::Inspect, &["charlie", "alpha", "bravo"], Some(options))
        .await;

    let outcome = fixture.dal.scan_job().queue(job.id).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Applied);

    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert_eq!(job.status, ScanStatus::Pending);
    assert_eq!(job.status_message.as_deref(), Some("Job is pending."));
    assert!(job.connection_results_id.is_some());
    assert!(job.inspection_results_id.is_some());

    let tasks = fixture.tasks(job.id).await;
    assert_eq!(tasks.len(), 7);
    assert_eq!(
        tasks.iter().map(|t| t.sequence_number).collect::<Vec<_>>(),
        (1..=7).collect::<Vec<_>>()
    );
    assert!(tasks.iter().all(|t| t.status == ScanStatus::Pending));

    // Connect tasks follow source name order
    let sources = fixture.dal.source().list().await.unwrap();
    let names: Vec<&str> = tasks[..3]
        .iter()
        .map(|t| {
            sources
                .iter()
                .find(|s| Some(s.id) == t.source_id)
                .unwrap()
                .name
                .as_str()
        })
        .collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie"]);

    for connect in &tasks[..3] {
        assert_eq!(connect.scan_type, ScanType::Connect);
        assert!(connect.prerequisites.is_empty());
        assert!(connect.connection_result_id.is_some());
        assert!(connect.inspection_result_id.is_none());
    }
    for (i, inspect) in tasks[3..6].iter().enumerate() {
        assert_eq!(inspect.scan_type, ScanType::Inspect);
        assert_eq!(inspect.prerequisites, vec![tasks[i].id]);
        assert_eq!(inspect.source_id, tasks[i].source_id);
        assert!(inspect.inspection_result_id.is_some());
    }

    let fingerprint = &tasks[6];
    assert_eq!(fingerprint.scan_type, ScanType::Fingerprint);
    assert!(fingerprint.source_id.is_none());
    assert!(fingerprint.details_report_id.is_none());
    assert_eq!(
        prerequisite_sequences(&tasks, fingerprint),
        (1..=6).collect::<BTreeSet<_>>()
    );

    // The job owns a distinct copy of the scan's options
    assert_ne!(job.options_id, scan.options_id);
    assert_eq!(job.options.as_ref().unwrap().max_concurrency, 4);

    let connection_results = fixture.dal.scan_job().connection_results(job.id).await.unwrap();
    let inspection_results = fixture.dal.scan_job().inspection_results(job.id).await.unwrap();
    assert_eq!(connection_results.len(), 3);
    assert_eq!(inspection_results.len(), 3);

    let scan = fixture.dal.scan().get(scan.id).await.unwrap();
    assert_eq!(scan.most_recent_scanjob_id, Some(job.id));
    for source in fixture.dal.source().list().await.unwrap() {
        assert_eq!(source.most_recent_connect_scan_id, Some(job.id));
    }
}

#[tokio::test]
async fn test_connect_job_has_only_connect_tasks() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .queued_job(ScanType::Connect, &["alpha", "bravo"])
        .await;

    let tasks = fixture.tasks(job.id).await;
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.scan_type == ScanType::Connect));
    assert!(job.connection_results_id.is_some());
    assert!(job.inspection_results_id.is_none());
}

#[tokio::test]
async fn test_inspect_job_without_sources_creates_no_tasks() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.create_scan_job(ScanType::Inspect, &[], None).await;

    let outcome = fixture.dal.scan_job().queue(job.id).await.unwrap();
    assert!(outcome.is_applied());
    assert!(fixture.tasks(job.id).await.is_empty());
}

#[tokio::test]
async fn test_fingerprint_job_carries_details_report() {
    let fixture = TestFixture::new().await;
    let details = fixture.dal.report().create_details_report().await.unwrap();
    let job = fixture
        .dal
        .scan_job()
        .create(NewScanJob::fingerprint(details.id))
        .await
        .unwrap();

    assert!(fixture.dal.scan_job().queue(job.id).await.unwrap().is_applied());

    let tasks = fixture.tasks(job.id).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].scan_type, ScanType::Fingerprint);
    assert_eq!(tasks[0].sequence_number, 1);
    assert_eq!(tasks[0].details_report_id, Some(details.id));
    assert!(tasks[0].prerequisites.is_empty());

    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert!(job.connection_results_id.is_some());
    assert!(job.inspection_results_id.is_none());
}

#[tokio::test]
async fn test_queue_twice_is_noop() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Inspect, &["alpha"]).await;
    let before = fixture.tasks(job.id).await;

    let outcome = fixture.dal.scan_job().queue(job.id).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::NoOp);

    let after = fixture.tasks(job.id).await;
    assert_eq!(
        before.iter().map(|t| t.id).collect::<Vec<_>>(),
        after.iter().map(|t| t.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_queue_running_job_is_rejected() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Connect, &["alpha"]).await;
    fixture.dal.scan_job().status_start(job.id).await.unwrap();

    let outcome = fixture.dal.scan_job().queue(job.id).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Rejected);

    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert_eq!(job.status, ScanStatus::Running);
    assert_eq!(fixture.tasks(job.id).await.len(), 1);
}

#[tokio::test]
async fn test_requeue_purges_leftover_tasks() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .queued_job(ScanType::Inspect, &["alpha", "bravo"])
        .await;
    let first = fixture.tasks(job.id).await;

    // Leftover fingerprints under the job's deployment report
    let details = fixture.dal.report().create_details_report().await.unwrap();
    fixture
        .dal
        .report()
        .attach_details_report(job.id, details.id, 7)
        .await
        .unwrap();
    let deployment = fixture
        .dal
        .report()
        .attach_deployment_report(details.id)
        .await
        .unwrap();
    fixture
        .dal
        .report()
        .add_system_fingerprints(deployment.id, vec!["host-a".into(), "host-b".into()])
        .await
        .unwrap();

    // Stage a CREATED job that still has tasks from a previous attempt
    fixture.force_job_status(job.id, ScanStatus::Created).await;

    let outcome = fixture.dal.scan_job().queue(job.id).await.unwrap();
    assert!(outcome.is_applied());

    let second = fixture.tasks(job.id).await;
    assert_eq!(second.len(), first.len());
    assert_eq!(graph_shape(&second), graph_shape(&first));
    assert!(second.iter().all(|t| !first.iter().any(|f| f.id == t.id)));

    // Containers are reused and hold only the new task results
    let reloaded = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert_eq!(reloaded.connection_results_id, job.connection_results_id);
    assert_eq!(reloaded.inspection_results_id, job.inspection_results_id);
    assert_eq!(
        fixture.dal.scan_job().connection_results(job.id).await.unwrap().len(),
        2
    );
    assert_eq!(
        fixture.dal.scan_job().inspection_results(job.id).await.unwrap().len(),
        2
    );
    assert_eq!(
        fixture.dal.report().count_fingerprints(deployment.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_adhoc_job_keeps_its_own_options() {
    let fixture = TestFixture::new().await;
    let sources = fixture.create_sources(&["bravo", "alpha"]).await;
    let options = ScanOptions {
        max_concurrency: 9,
        ..Default::default()
    };
    let job = fixture
        .dal
        .scan_job()
        .create(NewScanJob::adhoc(
            ScanType::Connect,
            sources.iter().map(|s| s.id).collect(),
            Some(options.clone()),
        ))
        .await
        .unwrap();
    assert!(job.options_id.is_some());

    assert!(fixture.dal.scan_job().queue(job.id).await.unwrap().is_applied());

    let queued = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert_eq!(queued.options_id, job.options_id);
    assert_eq!(queued.options, Some(options));
    assert!(queued.scan_id.is_none());
    assert_eq!(fixture.tasks(job.id).await.len(), 2);

    // No scan, but the sources still point at the job that scanned them
    for source in fixture.dal.source().list().await.unwrap() {
        assert_eq!(source.most_recent_connect_scan_id, Some(job.id));
    }
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let fixture = TestFixture::new().await;
    let result = fixture.dal.scan_job().queue(UniversalUuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(ScanJobError::NotFound { entity: "ScanJob", .. })
    ));
}

#[tokio::test]
async fn test_create_with_unknown_source_fails() {
    let fixture = TestFixture::new().await;
    let result = fixture
        .dal
        .scan_job()
        .create(NewScanJob::adhoc(
            ScanType::Connect,
            vec![UniversalUuid::new_v4()],
            None,
        ))
        .await;
    assert!(matches!(
        result,
        Err(ScanJobError::NotFound { entity: "Source", .. })
    ));
}
