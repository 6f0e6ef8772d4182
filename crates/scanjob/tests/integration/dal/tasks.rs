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

//! Integration tests for the runner-facing task API.

use crate::fixtures::TestFixture;
use scanjob::models::scan::ScanType;
use scanjob::models::scan_task::{StatsUpdate, TaskStats};
use scanjob::{ScanJobError, ScanStatus, TransitionOutcome, UniversalUuid};

#[tokio::test]
async fn test_ready_tasks_follow_the_graph() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .queued_job(ScanType::Inspect, &["alpha", "bravo"])
        .await;
    let tasks = fixture.tasks(job.id).await;
    let task_dal = fixture.dal.scan_task();

    let ready: Vec<UniversalUuid> = task_dal
        .ready_tasks(job.id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ready, vec![tasks[0].id, tasks[1].id]);

    // Finishing one connect task unlocks exactly its inspect task
    task_dal.status_start(tasks[0].id).await.unwrap();
    task_dal.status_complete(tasks[0].id).await.unwrap();
    let ready: Vec<UniversalUuid> = task_dal
        .ready_tasks(job.id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ready, vec![tasks[1].id, tasks[2].id]);

    for task in &tasks[1..4] {
        task_dal.status_start(task.id).await.unwrap();
        task_dal.status_complete(task.id).await.unwrap();
    }
    let ready = task_dal.ready_tasks(job.id).await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].scan_type, ScanType::Fingerprint);
}

#[tokio::test]
async fn test_graph_execution_order_ends_with_fingerprint() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture
        .queued_job(ScanType::Inspect, &["alpha", "bravo", "charlie"])
        .await;
    let tasks = fixture.tasks(job.id).await;

    let graph = fixture.dal.scan_task().graph(job.id).await.unwrap();
    assert_eq!(graph.len(), 7);

    let order = graph.execution_order();
    assert_eq!(order, tasks.iter().map(|t| t.id).collect::<Vec<_>>());
    assert_eq!(graph.dependents_of(&tasks[0].id), vec![tasks[3].id, tasks[6].id]);
    assert_eq!(graph.prerequisites_of(&tasks[6].id).len(), 6);
}

#[tokio::test]
async fn test_task_transitions_follow_the_state_machine() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Connect, &["alpha"]).await;
    let task_id = fixture.tasks(job.id).await[0].id;
    let task_dal = fixture.dal.scan_task();

    assert_eq!(
        task_dal.status_complete(task_id).await.unwrap(),
        TransitionOutcome::Rejected
    );
    assert_eq!(
        task_dal.status_restart(task_id).await.unwrap(),
        TransitionOutcome::NoOp
    );

    assert!(task_dal.status_start(task_id).await.unwrap().is_applied());
    let running = task_dal.get(task_id).await.unwrap();
    assert_eq!(running.status, ScanStatus::Running);
    assert_eq!(running.status_message.as_deref(), Some("Task is running."));
    assert!(running.start_time.is_some());

    assert!(task_dal.status_pause(task_id).await.unwrap().is_applied());
    assert!(task_dal.status_restart(task_id).await.unwrap().is_applied());
    assert!(task_dal.status_start(task_id).await.unwrap().is_applied());
    assert!(task_dal.status_fail(task_id, "timed out").await.unwrap().is_applied());

    let failed = task_dal.get(task_id).await.unwrap();
    assert_eq!(failed.status, ScanStatus::Failed);
    assert_eq!(failed.status_message.as_deref(), Some("timed out"));
    assert!(failed.end_time.is_some());

    // The job is not affected by task transitions
    assert_eq!(
        fixture.dal.scan_job().get(job.id).await.unwrap().status,
        ScanStatus::Pending
    );
}

#[tokio::test]
async fn test_update_and_increment_stats() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Connect, &["alpha"]).await;
    let task_id = fixture.tasks(job.id).await[0].id;
    let task_dal = fixture.dal.scan_task();

    let task = task_dal
        .update_stats(
            task_id,
            StatsUpdate {
                systems_count: Some(20),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(task.systems_count, 20);
    assert_eq!(task.systems_scanned, 0);

    for _ in 0..3 {
        task_dal
            .increment_stats(
                task_id,
                TaskStats {
                    systems_scanned: 2,
                    systems_unreachable: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let task = task_dal.get(task_id).await.unwrap();
    assert_eq!(
        task.stats(),
        TaskStats {
            systems_count: 20,
            systems_scanned: 6,
            systems_failed: 0,
            systems_unreachable: 3,
        }
    );
}

#[tokio::test]
async fn test_negative_stats_are_rejected() {
    let fixture = TestFixture::new().await;
    let (_, job) = fixture.queued_job(ScanType::Connect, &["alpha"]).await;
    let task_id = fixture.tasks(job.id).await[0].id;

    let result = fixture
        .dal
        .scan_task()
        .update_stats(
            task_id,
            StatsUpdate {
                systems_failed: Some(-1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ScanJobError::InvalidData(_))));

    let task = fixture.dal.scan_task().get(task_id).await.unwrap();
    assert_eq!(task.systems_failed, 0);
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let fixture = TestFixture::new().await;
    let result = fixture.dal.scan_task().status_start(UniversalUuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(ScanJobError::NotFound { entity: "ScanTask", .. })
    ));
}
