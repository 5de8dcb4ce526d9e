// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Wire Entities
//!
//! The things that travel to the collection server: a `Batch` of rendered
//! rows, the `UploadAcknowledgment` that comes back, and the end-of-run
//! `UploadSummary`.

use crate::domain::column::ColumnDefinition;
use crate::domain::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of canonical strings, in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub results: Vec<String>,
}

/// A bounded group of rendered rows plus the metadata needed to upload them.
///
/// Rows can only be added through `push_row`, which keeps the row list and
/// `success_count` in step, and a checksum can only be attached once the
/// batch is known not to be truncated.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    name: String,
    columns: Vec<ColumnDefinition>,
    rows: Vec<BatchRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<i64>,
    #[serde(rename = "rowCount")]
    success_count: usize,
    #[serde(rename = "wasCutShort")]
    was_truncated: bool,
    #[serde(rename = "lakeOnly")]
    lake_only: bool,
    #[serde(rename = "queryTime", skip_serializing_if = "Option::is_none")]
    source_run_duration_ms: Option<u64>,
}

impl Batch {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>, lake_only: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            checksum: None,
            success_count: 0,
            was_truncated: false,
            lake_only,
            source_run_duration_ms: None,
        }
    }

    pub fn push_row(&mut self, values: Vec<String>) {
        self.rows.push(BatchRow { results: values });
        self.success_count += 1;
    }

    pub fn mark_truncated(&mut self) {
        self.was_truncated = true;
        self.checksum = None;
    }

    /// Attaches the checksum of the whole source. Ignored on a truncated batch.
    pub fn attach_checksum(&mut self, checksum: Option<i64>) {
        if !self.was_truncated {
            self.checksum = checksum;
        }
    }

    pub fn set_source_run_duration_ms(&mut self, ms: Option<u64>) {
        self.source_run_duration_ms = ms;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn rows(&self) -> &[BatchRow] {
        &self.rows
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn was_truncated(&self) -> bool {
        self.was_truncated
    }

    pub fn checksum(&self) -> Option<i64> {
        self.checksum
    }

    pub fn lake_only(&self) -> bool {
        self.lake_only
    }

    pub fn source_run_duration_ms(&self) -> Option<u64> {
        self.source_run_duration_ms
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The server's reply to one upload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAcknowledgment {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub rows_uploaded: u64,
    #[serde(default)]
    pub success: bool,
}

impl UploadAcknowledgment {
    /// The server HTML-escapes quotes in its JSON body.
    pub fn from_response_body(body: &str) -> Result<Self> {
        let restored = body.replace("&#034;", "\"");
        Ok(serde_json::from_str(restored.trim())?)
    }
}

/// End-of-run report sent once per upload kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSummary {
    pub username: String,
    #[serde(rename = "starttime")]
    pub start_time: i64,
    #[serde(rename = "endtime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(rename = "totalRowsSent")]
    pub total_rows_sent: u64,
    /// Rows acknowledged per dataset name.
    #[serde(rename = "queryInfo")]
    pub query_info: BTreeMap<String, u64>,
    pub messages: Vec<String>,
}

impl UploadSummary {
    pub fn new(username: impl Into<String>, start_time: i64) -> Self {
        Self {
            username: username.into(),
            start_time,
            end_time: None,
            total_rows_sent: 0,
            query_info: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
