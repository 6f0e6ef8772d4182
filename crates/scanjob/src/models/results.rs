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

//! Connection and inspection result containers.
//!
//! Each job owns at most one container per phase, created the first time the
//! job is queued. A container holds one task result per connect (or inspect)
//! task. The per-system facts recorded inside a task result belong to the
//! fact collectors and are not modelled here.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// One connect task's result record inside the job's connection container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConnectionResult {
    pub id: UniversalUuid,
    pub job_connection_result_id: UniversalUuid,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInspectionResult {
    pub id: UniversalUuid,
    pub job_inspection_result_id: UniversalUuid,
    pub created_at: UniversalTimestamp,
}
