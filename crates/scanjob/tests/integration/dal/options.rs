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

//! Integration tests for copying scan options onto jobs and keeping the
//! copies independent.

use crate::fixtures::TestFixture;
use scanjob::models::scan::{
    DisabledOptionalProducts, ExtendedProductSearch, ScanOptions, ScanType,
};
use scanjob::models::scan_job::NewScanJob;

fn jboss_options() -> ScanOptions {
    ScanOptions {
        max_concurrency: 4,
        disabled_optional_products: Some(DisabledOptionalProducts {
            jboss_eap: true,
            jboss_ws: true,
            ..Default::default()
        }),
        enabled_extended_product_search: Some(ExtendedProductSearch {
            jboss_fuse: true,
            search_directories: Some(vec!["/opt/jboss".to_string(), "/srv".to_string()]),
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn test_queued_job_owns_a_copy_of_scan_options() {
    let fixture = TestFixture::new().await;
    let (scan, job) = fixture
        .create_scan_job(ScanType::Inspect, &["alpha", "bravo", "charlie"], Some(jboss_options()))
        .await;
    assert!(job.options.is_none());

    fixture.dal.scan_job().queue(job.id).await.unwrap();
    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert!(job.options_id.is_some());
    assert_ne!(job.options_id, scan.options_id);
    assert_eq!(job.options, Some(jboss_options()));
    assert_eq!(job.source_ids.len(), 3);
    assert_eq!(fixture.tasks(job.id).await.len(), 7);

    // Editing the scan afterwards does not reach the job
    let mut edited = jboss_options();
    edited.max_concurrency = 50;
    if let Some(flags) = edited.disabled_optional_products.as_mut() {
        flags.jboss_eap = false;
    }
    let scan = fixture
        .dal
        .scan()
        .update_options(scan.id, Some(edited.clone()))
        .await
        .unwrap();
    assert_eq!(scan.options, Some(edited));

    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert_eq!(job.options, Some(jboss_options()));
}

#[tokio::test]
async fn test_empty_search_directories_are_dropped() {
    let fixture = TestFixture::new().await;
    let options = ScanOptions {
        enabled_extended_product_search: Some(ExtendedProductSearch {
            jboss_brms: true,
            search_directories: Some(Vec::new()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let (_, job) = fixture
        .create_scan_job(ScanType::Connect, &["alpha"], Some(options))
        .await;

    fixture.dal.scan_job().queue(job.id).await.unwrap();
    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    let extended = job
        .options
        .and_then(|o| o.enabled_extended_product_search)
        .unwrap();
    assert!(extended.jboss_brms);
    assert!(extended.search_directories.is_none());
}

#[tokio::test]
async fn test_deleting_scan_detaches_its_jobs() {
    let fixture = TestFixture::new().await;
    let (scan, job) = fixture
        .create_scan_job(ScanType::Connect, &["alpha"], Some(jboss_options()))
        .await;
    fixture.dal.scan_job().queue(job.id).await.unwrap();

    fixture.dal.scan().delete(scan.id).await.unwrap();

    let job = fixture.dal.scan_job().get(job.id).await.unwrap();
    assert!(job.scan_id.is_none());
    assert_eq!(job.options, Some(jboss_options()));
    assert_eq!(fixture.tasks(job.id).await.len(), 1);
    assert!(fixture.dal.scan().get(scan.id).await.is_err());
}

#[tokio::test]
async fn test_jobs_listed_per_scan() {
    let fixture = TestFixture::new().await;
    let (scan, first) = fixture
        .create_scan_job(ScanType::Connect, &["alpha"], None)
        .await;
    let second = fixture
        .dal
        .scan_job()
        .create(NewScanJob::from_scan(&scan))
        .await
        .unwrap();

    let jobs = fixture.dal.scan_job().list_for_scan(scan.id).await.unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&second.id));
}
