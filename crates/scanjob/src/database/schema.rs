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

//! Diesel schema for the SQLite store.
//!
//! UUIDs are BLOB columns, timestamps are RFC3339 TEXT columns and option
//! sub-records are JSON TEXT columns.

diesel::table! {
    sources (id) {
        id -> Binary,
        name -> Text,
        source_type -> Text,
        hosts -> Text,
        port -> Nullable<Integer>,
        most_recent_connect_scan_id -> Nullable<Binary>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    scan_options (id) {
        id -> Binary,
        max_concurrency -> Integer,
        disabled_optional_products -> Nullable<Text>,
        enabled_extended_product_search -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    scans (id) {
        id -> Binary,
        name -> Text,
        scan_type -> Text,
        options_id -> Nullable<Binary>,
        most_recent_scanjob_id -> Nullable<Binary>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    scan_sources (scan_id, source_id) {
        scan_id -> Binary,
        source_id -> Binary,
        position -> Integer,
    }
}

diesel::table! {
    scan_jobs (id) {
        id -> Binary,
        scan_type -> Text,
        status -> Text,
        status_message -> Nullable<Text>,
        options_id -> Nullable<Binary>,
        report_id -> Nullable<Integer>,
        start_time -> Nullable<Text>,
        end_time -> Nullable<Text>,
        scan_id -> Nullable<Binary>,
        connection_results_id -> Nullable<Binary>,
        inspection_results_id -> Nullable<Binary>,
        details_report_id -> Nullable<Binary>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    job_sources (job_id, source_id) {
        job_id -> Binary,
        source_id -> Binary,
    }
}

diesel::table! {
    scan_tasks (id) {
        id -> Binary,
        job_id -> Binary,
        source_id -> Nullable<Binary>,
        scan_type -> Text,
        status -> Text,
        status_message -> Nullable<Text>,
        sequence_number -> Integer,
        connection_result_id -> Nullable<Binary>,
        inspection_result_id -> Nullable<Binary>,
        details_report_id -> Nullable<Binary>,
        systems_count -> Integer,
        systems_scanned -> Integer,
        systems_failed -> Integer,
        systems_unreachable -> Integer,
        start_time -> Nullable<Text>,
        end_time -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    task_prerequisites (task_id, prerequisite_id) {
        task_id -> Binary,
        prerequisite_id -> Binary,
    }
}

diesel::table! {
    job_connection_results (id) {
        id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    task_connection_results (id) {
        id -> Binary,
        job_connection_result_id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    job_inspection_results (id) {
        id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    task_inspection_results (id) {
        id -> Binary,
        job_inspection_result_id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    details_reports (id) {
        id -> Binary,
        deployment_report_id -> Nullable<Binary>,
        created_at -> Text,
    }
}

diesel::table! {
    deployment_reports (id) {
        id -> Binary,
        created_at -> Text,
    }
}

diesel::table! {
    system_fingerprints (id) {
        id -> Binary,
        deployment_report_id -> Binary,
        name -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    sources,
    scan_options,
    scans,
    scan_sources,
    scan_jobs,
    job_sources,
    scan_tasks,
    task_prerequisites,
    job_connection_results,
    task_connection_results,
    job_inspection_results,
    task_inspection_results,
    details_reports,
    deployment_reports,
    system_fingerprints,
);
