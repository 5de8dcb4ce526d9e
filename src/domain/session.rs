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

//! Per-run upload counters.

use crate::domain::batch::UploadSummary;
use serde::Serialize;

/// How sending one dataset ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SendOutcome {
    Completed,
    /// Checksum unchanged since the last run; nothing was read.
    Skipped,
    /// Server stopped accepting data, or the time limit expired.
    Stopped,
    /// The attempt budget ran out before the source was drained.
    Incomplete,
}

/// Counters shared by every send of one run. Owned by the upload client.
#[derive(Debug)]
pub struct UploadSession {
    total_rows_sent: u64,
    rows_for_current_table: u64,
    server_accepting_data: bool,
    last_ack_count: u64,
    summary: UploadSummary,
}

impl UploadSession {
    pub fn new(username: impl Into<String>, start_time: i64) -> Self {
        Self {
            total_rows_sent: 0,
            rows_for_current_table: 0,
            server_accepting_data: true,
            last_ack_count: 0,
            summary: UploadSummary::new(username, start_time),
        }
    }

    pub fn total_rows_sent(&self) -> u64 {
        self.total_rows_sent
    }

    pub fn rows_for_current_table(&self) -> u64 {
        self.rows_for_current_table
    }

    pub fn server_accepting_data(&self) -> bool {
        self.server_accepting_data
    }

    pub fn last_ack_count(&self) -> u64 {
        self.last_ack_count
    }

    pub fn start_table(&mut self) {
        self.rows_for_current_table = 0;
    }

    /// Records rows the server says it accepted for `table`.
    pub fn record_ack(&mut self, table: &str, rows: u64) {
        self.total_rows_sent += rows;
        self.rows_for_current_table += rows;
        self.last_ack_count = rows;
        self.summary.total_rows_sent = self.total_rows_sent;
        *self.summary.query_info.entry(table.to_string()).or_insert(0) += rows;
    }

    /// Makes sure a dataset shows up in the summary even with zero rows.
    pub fn touch_table(&mut self, table: &str) {
        self.summary.query_info.entry(table.to_string()).or_insert(0);
    }

    /// Terminal: once the server refuses data nothing turns it back on.
    /// Returns true only on the first call.
    pub fn stop_accepting(&mut self) -> bool {
        let transitioned = self.server_accepting_data;
        self.server_accepting_data = false;
        transitioned
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.summary.messages.contains(&message) {
            self.summary.messages.push(message);
        }
    }

    pub fn summary(&self) -> &UploadSummary {
        &self.summary
    }

    pub fn finish_summary(&mut self, end_time: i64) -> &UploadSummary {
        self.summary.end_time = Some(end_time);
        &self.summary
    }
}
