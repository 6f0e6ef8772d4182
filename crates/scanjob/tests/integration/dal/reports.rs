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

//! Integration tests for the report collaborator surface.

use crate::fixtures::TestFixture;
use scanjob::{ScanJobError, UniversalUuid};

#[tokio::test]
async fn test_deployment_report_is_created_once() {
    let fixture = TestFixture::new().await;
    let reports = fixture.dal.report();

    let details = reports.create_details_report().await.unwrap();
    assert!(details.deployment_report_id.is_none());

    let first = reports.attach_deployment_report(details.id).await.unwrap();
    let second = reports.attach_deployment_report(details.id).await.unwrap();
    assert_eq!(first.id, second.id);

    let details = reports.get_details_report(details.id).await.unwrap();
    assert_eq!(details.deployment_report_id, Some(first.id));
}

#[tokio::test]
async fn test_fingerprints_accumulate() {
    let fixture = TestFixture::new().await;
    let reports = fixture.dal.report();
    let details = reports.create_details_report().await.unwrap();
    let deployment = reports.attach_deployment_report(details.id).await.unwrap();

    let added = reports
        .add_system_fingerprints(deployment.id, vec!["a".into(), "b".into()])
        .await
        .unwrap();
    assert_eq!(added.len(), 2);
    assert!(added.iter().all(|f| f.deployment_report_id == deployment.id));

    reports
        .add_system_fingerprints(deployment.id, vec!["c".into()])
        .await
        .unwrap();
    assert_eq!(reports.count_fingerprints(deployment.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_attach_to_unknown_job_fails() {
    let fixture = TestFixture::new().await;
    let reports = fixture.dal.report();
    let details = reports.create_details_report().await.unwrap();

    let result = reports
        .attach_details_report(UniversalUuid::new_v4(), details.id, 1)
        .await;
    assert!(matches!(
        result,
        Err(ScanJobError::NotFound { entity: "ScanJob", .. })
    ));
}
