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

//! Source Model
//!
//! A source is a connectable target definition. Credentials are managed
//! elsewhere and are not part of this model.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// Represents a source record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: UniversalUuid,
    pub name: String,
    /// Free-form kind, such as "network", "vcenter", "satellite" or "openshift"
    pub source_type: String,
    pub hosts: Vec<String>,
    pub port: Option<i32>,
    /// Job that most recently ran a connect or inspect scan over this source
    pub most_recent_connect_scan_id: Option<UniversalUuid>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for creating a new source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub source_type: String,
    pub hosts: Vec<String>,
    pub port: Option<i32>,
}

impl NewSource {
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            hosts: Vec::new(),
            port: None,
        }
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port(mut self, port: i32) -> Self {
        self.port = Some(port);
        self
    }
}
