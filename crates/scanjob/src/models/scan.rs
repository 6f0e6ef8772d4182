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

//! Scan definitions and their options.
//!
//! A [`Scan`] is a reusable, user-managed configuration. Jobs never share a
//! scan's [`ScanOptions`]: queueing a job stores a deep copy in its own row.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a job or task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Connect,
    Inspect,
    Fingerprint,
}

impl ScanType {
    /// Returns the stored string representation of the scan type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Connect => "connect",
            ScanType::Inspect => "inspect",
            ScanType::Fingerprint => "fingerprint",
        }
    }

    /// Parses a scan type from its stored string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "connect" => Some(ScanType::Connect),
            "inspect" => Some(ScanType::Inspect),
            "fingerprint" => Some(ScanType::Fingerprint),
            _ => None,
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional products excluded from inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisabledOptionalProducts {
    pub jboss_eap: bool,
    pub jboss_fuse: bool,
    pub jboss_brms: bool,
    pub jboss_ws: bool,
}

/// Products for which the extended filesystem search is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedProductSearch {
    pub jboss_eap: bool,
    pub jboss_fuse: bool,
    pub jboss_brms: bool,
    pub jboss_ws: bool,
    /// Directories searched instead of the defaults.
    pub search_directories: Option<Vec<String>>,
}

pub const DEFAULT_MAX_CONCURRENCY: u32 = 25;

/// Options controlling how a scan runs.
///
/// `Clone` is a deep copy; a cloned value shares nothing with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub max_concurrency: u32,
    pub disabled_optional_products: Option<DisabledOptionalProducts>,
    pub enabled_extended_product_search: Option<ExtendedProductSearch>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            disabled_optional_products: None,
            enabled_extended_product_search: None,
        }
    }
}

/// A reusable scan definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: UniversalUuid,
    pub name: String,
    pub scan_type: ScanType,
    /// Sources in the order they were attached.
    pub source_ids: Vec<UniversalUuid>,
    /// Row holding `options`, absent when the scan has none.
    pub options_id: Option<UniversalUuid>,
    pub options: Option<ScanOptions>,
    pub most_recent_scanjob_id: Option<UniversalUuid>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for creating a new scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScan {
    pub name: String,
    pub scan_type: ScanType,
    pub source_ids: Vec<UniversalUuid>,
    pub options: Option<ScanOptions>,
}

impl NewScan {
    pub fn new(name: impl Into<String>, scan_type: ScanType) -> Self {
        Self {
            name: name.into(),
            scan_type,
            source_ids: Vec::new(),
            options: None,
        }
    }

    pub fn with_sources(mut self, source_ids: Vec<UniversalUuid>) -> Self {
        self.source_ids = source_ids;
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = Some(options);
        self
    }
}
