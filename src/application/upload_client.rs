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

//! # Upload Client
//!
//! The batch/acknowledgment state machine. For every source it alternates
//! between the Batch Builder and the `UploadPort`:
//!
//! ```text
//!   build batch ──(0 rows)──────────────────────────────> Completed
//!        │
//!        v
//!      post ──200──> record ack ──(not truncated)───────> Completed
//!        │                 └──(truncated)──> build batch
//!        ├──503 + disabled message──────────────────────> Stopped
//!        └──anything else──────────────────────────────> ServerError
//! ```
//!
//! The inner loop runs at most `max_attempts` batches. The outer loop calls it
//! at most `max_iterations` times and fails with `StuckUpload` when a call
//! makes no progress on `totalRowsSent`.

use crate::application::batch_builder::BatchBuilder;
use crate::application::query_plan::{run_query_plan, CursorOutcome};
use crate::config::{ServerConfig, UploadConfig};
use crate::domain::batch::{Batch, UploadAcknowledgment};
use crate::domain::errors::{MoverError, Result};
use crate::domain::file_schema::FileSchema;
use crate::domain::query::QueryDefinition;
use crate::domain::session::{SendOutcome, UploadSession};
use crate::ports::query_port::QueryPort;
use crate::ports::row_source::RowSource;
use crate::ports::upload_port::{UploadCommand, UploadPort, UploadRequest, UploadResponse};
use chrono::{NaiveDateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const DISABLED_SUMMARY_MESSAGE: &str = "Upload disabled on server, sending has stopped.";
const SERVICE_UNAVAILABLE: u16 = 503;

/// The knobs of the send loops.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub max_iterations: u32,
    pub max_error_rows: u64,
    pub max_run_time: Option<Duration>,
    pub disabled_message: String,
}

impl UploadSettings {
    pub fn from_config(upload: &UploadConfig, server: &ServerConfig) -> Self {
        Self {
            batch_size: upload.batch_size,
            max_attempts: upload.max_attempts,
            max_iterations: upload.max_iterations,
            max_error_rows: upload.max_error_rows,
            max_run_time: upload.max_run_time_secs.map(Duration::from_secs),
            disabled_message: server.disabled_message.clone(),
        }
    }
}

/// Good and bad row counts from a dry run over a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub good_rows: u64,
    pub bad_rows: u64,
}

#[derive(Serialize)]
struct FileDefinitions<'a> {
    #[serde(rename = "fileDefinitions")]
    file_definitions: [&'a FileSchema; 1],
}

pub struct UploadClient<'p> {
    port: &'p dyn UploadPort,
    settings: UploadSettings,
    session: UploadSession,
    deadline: Option<Instant>,
}

impl<'p> UploadClient<'p> {
    /// The time limit counts from `started`, the beginning of the whole run,
    /// so a retried attempt only gets what is left of it.
    pub fn new(
        port: &'p dyn UploadPort,
        settings: UploadSettings,
        session: UploadSession,
        started: Instant,
    ) -> Self {
        let deadline = settings.max_run_time.map(|d| started + d);
        Self {
            port,
            settings,
            session,
            deadline,
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Whether another batch may be sent. Records why not in the summary.
    fn may_send(&mut self) -> bool {
        if !self.session.server_accepting_data() {
            return false;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                let limit = self.settings.max_run_time.map_or(0, |d| d.as_secs());
                let message = format!("Max time limit has expired.  Max time limit was [{}]", limit);
                warn!("{}", message);
                self.session.add_message(message);
                false
            }
            _ => true,
        }
    }

    /// Sends every row of `query`, skipping it when its checksum says the
    /// data has not changed since the last run.
    pub fn send_query(
        &mut self,
        db: &dyn QueryPort,
        query: &QueryDefinition,
        now: NaiveDateTime,
    ) -> Result<SendOutcome> {
        self.session.touch_table(&query.name);
        if !self.may_send() {
            return Ok(SendOutcome::Stopped);
        }

        let mut checksum = None;
        if let Some(sql) = query.checksum_sql.as_deref().filter(|_| query.can_calculate_checksum()) {
            checksum = db.query_i64(sql)?;
            if query.checksum_unchanged(checksum) {
                info!("Checksum matches for {}", query.name);
                return Ok(SendOutcome::Skipped);
            }
        }

        let mut last = SendOutcome::Completed;
        let stats = run_query_plan(db, query, now, |source| {
            let before = self.session.total_rows_sent();
            last = self.send_source(source, UploadCommand::QueryResult, checksum, query.lake_only)?;
            let rows = self.session.total_rows_sent() - before;
            Ok(match last {
                SendOutcome::Completed => CursorOutcome::continue_after(rows),
                _ => CursorOutcome::stop_after(rows),
            })
        })?;
        info!(
            "Sent {} rows for {} in {} chunk(s)",
            stats.rows, query.name, stats.chunks
        );
        Ok(if stats.stopped { last } else { SendOutcome::Completed })
    }

    /// Sends all remaining rows of one source under `command`.
    pub fn send_source(
        &mut self,
        source: &mut dyn RowSource,
        command: UploadCommand,
        checksum: Option<i64>,
        lake_only: bool,
    ) -> Result<SendOutcome> {
        self.session.start_table();
        self.session.touch_table(source.name());
        let mut builder = BatchBuilder::new(self.settings.batch_size, self.settings.max_error_rows);
        let mut previous_total = self.session.total_rows_sent();

        for _ in 0..self.settings.max_iterations {
            if !self.may_send() {
                source.close()?;
                return Ok(SendOutcome::Stopped);
            }
            match self.send_batches(source, &mut builder, command, checksum, lake_only)? {
                SendOutcome::Incomplete => {
                    let total = self.session.total_rows_sent();
                    if total == previous_total {
                        source.close()?;
                        return Err(MoverError::StuckUpload { total_rows_sent: total });
                    }
                    previous_total = total;
                }
                outcome => return Ok(outcome),
            }
        }

        warn!(
            "Gave up on {} after {} iterations; {} rows sent",
            source.name(),
            self.settings.max_iterations,
            self.session.rows_for_current_table()
        );
        source.close()?;
        Ok(SendOutcome::Incomplete)
    }

    fn send_batches(
        &mut self,
        source: &mut dyn RowSource,
        builder: &mut BatchBuilder,
        command: UploadCommand,
        checksum: Option<i64>,
        lake_only: bool,
    ) -> Result<SendOutcome> {
        for _ in 0..self.settings.max_attempts {
            if !self.may_send() {
                return Ok(SendOutcome::Stopped);
            }
            let batch = match builder.build(source, checksum, lake_only) {
                Ok(batch) => batch,
                Err(e) => {
                    if let Err(close) = source.close() {
                        warn!("Could not close {}: {}", source.name(), close);
                    }
                    return Err(e);
                }
            };
            if batch.is_empty() {
                self.check_expected_rows(source);
                return Ok(SendOutcome::Completed);
            }

            let payload = urlencoding::encode(&batch.to_json()?).into_owned();
            let response = self.port.post(&UploadRequest { command, payload })?;

            if response.is_ok() {
                self.record_response(&batch, &response.body);
                if !batch.was_truncated() {
                    self.check_expected_rows(source);
                    return Ok(SendOutcome::Completed);
                }
            } else if self.is_disabled(&response) {
                if self.session.stop_accepting() {
                    warn!("{}", DISABLED_SUMMARY_MESSAGE);
                }
                self.session.add_message(DISABLED_SUMMARY_MESSAGE);
                source.close()?;
                return Ok(SendOutcome::Stopped);
            } else {
                source.close()?;
                return Err(MoverError::ServerError {
                    status: response.status,
                    reason: response.reason,
                });
            }
        }
        Ok(SendOutcome::Incomplete)
    }

    /// The server's count is what gets recorded, whatever we think we sent.
    fn record_response(&mut self, batch: &Batch, body: &str) {
        let ack = UploadAcknowledgment::from_response_body(body).unwrap_or_else(|e| {
            error!("Could not read acknowledgment for {}: {} [{}]", batch.name(), e, body);
            UploadAcknowledgment::default()
        });
        let sent = batch.success_count() as u64;
        if ack.rows_uploaded != sent {
            warn!(
                "Server acknowledged [{}] rows for {} but [{}] were sent",
                ack.rows_uploaded,
                batch.name(),
                sent
            );
        }
        self.session.record_ack(batch.name(), ack.rows_uploaded);
        info!(
            "Uploaded {} rows for {} ({} total)",
            ack.rows_uploaded,
            batch.name(),
            self.session.total_rows_sent()
        );
    }

    /// A 503 whose acknowledgment carries the configured message means the
    /// server has switched uploads off. Any other 503 is an ordinary failure.
    fn is_disabled(&self, response: &UploadResponse) -> bool {
        response.status == SERVICE_UNAVAILABLE
            && UploadAcknowledgment::from_response_body(&response.body)
                .ok()
                .and_then(|ack| ack.message)
                .is_some_and(|m| m == self.settings.disabled_message)
    }

    /// False when the source announced a row count the server did not confirm.
    fn check_expected_rows(&self, source: &dyn RowSource) -> bool {
        let Some(expected) = source.expected_rows() else {
            return true;
        };
        let sent = self.session.rows_for_current_table();
        if expected != sent {
            error!(
                "Expected [{}] rows for {} but [{}] were uploaded, the data may be corrupt",
                expected,
                source.name(),
                sent
            );
            return false;
        }
        true
    }

    /// Posts the run summary for `kind`. Failures are logged, not raised.
    pub fn send_summary(&mut self, kind: UploadCommand) {
        let Some(command) = kind.summary_command() else {
            warn!("No summary command for {}", kind);
            return;
        };
        let payload = match self.session.finish_summary(Utc::now().timestamp_millis()).to_json() {
            Ok(p) => p,
            Err(e) => {
                error!("Could not serialize summary: {}", e);
                return;
            }
        };
        match self.port.post(&UploadRequest { command, payload }) {
            Ok(r) if r.is_ok() => info!("Sent summary: {} rows", self.session.total_rows_sent()),
            Ok(r) => error!("Summary rejected: {} {}", r.status, r.reason),
            Err(e) => error!("Summary not sent: {}", e),
        }
    }

    /// Registers a customer file layout with the server.
    pub fn send_file_definition(&mut self, schema: &FileSchema) -> Result<SendOutcome> {
        if !self.may_send() {
            return Ok(SendOutcome::Stopped);
        }
        let payload = serde_json::to_string(&FileDefinitions {
            file_definitions: [schema],
        })?;
        let response = self.port.post(&UploadRequest {
            command: UploadCommand::FileDefinition,
            payload,
        })?;
        if response.is_ok() {
            info!("Sent file definition for {}", schema.table_name);
            Ok(SendOutcome::Completed)
        } else if self.is_disabled(&response) {
            self.session.stop_accepting();
            self.session.add_message(DISABLED_SUMMARY_MESSAGE);
            Ok(SendOutcome::Stopped)
        } else {
            Err(MoverError::ServerError {
                status: response.status,
                reason: response.reason,
            })
        }
    }
}

/// Drains `source` through the Batch Builder without sending anything.
pub fn validate_file(settings: &UploadSettings, source: &mut dyn RowSource) -> Result<ValidationReport> {
    let mut builder = BatchBuilder::new(settings.batch_size, settings.max_error_rows);
    let mut report = ValidationReport::default();
    loop {
        let batch = builder.build(source, None, true)?;
        report.good_rows += batch.success_count() as u64;
        if !batch.was_truncated() {
            break;
        }
    }
    report.bad_rows = builder.failed_rows();
    info!(
        "Validated {}: {} good rows, {} bad rows",
        source.name(),
        report.good_rows,
        report.bad_rows
    );
    Ok(report)
}
