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

//! Report records.
//!
//! Only what the job core needs: the link from a details report to its
//! deployment report, and the deployment report's fingerprints so they can be
//! counted and purged. Report contents are produced elsewhere.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsReport {
    pub id: UniversalUuid,
    pub deployment_report_id: Option<UniversalUuid>,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub id: UniversalUuid,
    pub created_at: UniversalTimestamp,
}

/// One fingerprinted system in a deployment report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFingerprint {
    pub id: UniversalUuid,
    pub deployment_report_id: UniversalUuid,
    pub name: String,
    pub created_at: UniversalTimestamp,
}
