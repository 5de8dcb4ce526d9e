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

//! Mock ports shared by the application tests.

use crate::domain::column::{ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use crate::infrastructure::memory_source::MemoryRowSource;
use crate::ports::query_port::QueryPort;
use crate::ports::row_source::RowSource;
use crate::ports::upload_port::{UploadPort, UploadRequest, UploadResponse};
use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Serves canned cursors in the order they are opened. Once the canned
/// results run out every cursor is empty.
#[derive(Default)]
pub struct MockQueryPort {
    ints: HashMap<String, Option<i64>>,
    dates: HashMap<String, Option<NaiveDateTime>>,
    columns: Vec<ColumnDefinition>,
    results: RefCell<VecDeque<Vec<Vec<String>>>>,
    opened: RefCell<Vec<(String, Vec<NaiveDateTime>)>>,
}

impl MockQueryPort {
    pub fn new() -> Self {
        Self {
            columns: vec![ColumnDefinition::new("ID", LogicalType::Integer)],
            ..Default::default()
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDefinition>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_result(self, rows: Vec<Vec<&str>>) -> Self {
        self.results.borrow_mut().push_back(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        );
        self
    }

    pub fn with_int(mut self, sql: &str, value: Option<i64>) -> Self {
        self.ints.insert(sql.to_string(), value);
        self
    }

    pub fn with_datetime(mut self, sql: &str, value: Option<NaiveDateTime>) -> Self {
        self.dates.insert(sql.to_string(), value);
        self
    }

    /// SQL and binds of every cursor opened so far.
    pub fn opened(&self) -> Vec<(String, Vec<NaiveDateTime>)> {
        self.opened.borrow().clone()
    }
}

impl QueryPort for MockQueryPort {
    fn query_i64(&self, sql: &str) -> Result<Option<i64>> {
        self.ints
            .get(sql)
            .copied()
            .ok_or_else(|| MoverError::OracleError(format!("unexpected query {}", sql)))
    }

    fn query_datetime(&self, sql: &str) -> Result<Option<NaiveDateTime>> {
        self.dates
            .get(sql)
            .copied()
            .ok_or_else(|| MoverError::OracleError(format!("unexpected query {}", sql)))
    }

    fn open<'a>(
        &'a self,
        name: &str,
        sql: &str,
        binds: &[NaiveDateTime],
        columns: &[ColumnDefinition],
    ) -> Result<Box<dyn RowSource + 'a>> {
        self.opened.borrow_mut().push((sql.to_string(), binds.to_vec()));
        let columns = if columns.is_empty() { self.columns.clone() } else { columns.to_vec() };
        let mut source = MemoryRowSource::new(name, columns).with_run_duration_ms(5);
        if let Some(rows) = self.results.borrow_mut().pop_front() {
            for row in &rows {
                let cells: Vec<&str> = row.iter().map(String::as_str).collect();
                source = source.with_row(&cells);
            }
        }
        Ok(Box::new(source))
    }
}

/// Replays scripted responses and records every request.
#[derive(Default)]
pub struct MockUploadPort {
    responses: Mutex<VecDeque<Result<UploadResponse>>>,
    requests: Mutex<Vec<UploadRequest>>,
}

impl MockUploadPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(UploadResponse {
            status,
            reason: if status == 200 { "OK".into() } else { "Error".into() },
            body: body.to_string(),
        }));
        self
    }

    pub fn ack(self, rows: u64) -> Self {
        let body = format!(r#"{{"message":"ok","rowsUploaded":{},"success":true}}"#, rows);
        self.respond(200, &body)
    }

    /// A 503 whose acknowledgment says uploads are switched off.
    pub fn disabled(self, message: &str) -> Self {
        let body = serde_json::json!({"message": message, "rowsUploaded": 0, "success": false});
        self.respond(503, &body.to_string())
    }

    pub fn fail_transport(self) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(MoverError::TransportError("connection refused".into())));
        self
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl UploadPort for MockUploadPort {
    /// Unscripted requests are answered with a zero-row acknowledgment.
    fn post(&self, request: &UploadRequest) -> Result<UploadResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(UploadResponse {
                status: 200,
                reason: "OK".into(),
                body: r#"{"message":"ok","rowsUploaded":0,"success":true}"#.into(),
            })
        })
    }
}
