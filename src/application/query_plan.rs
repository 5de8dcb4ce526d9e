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

//! # Query Plan
//!
//! Turns one `QueryDefinition` into the sequence of cursors that must be
//! read to cover it. A query runs in one of three modes:
//!
//! 1. **Incremental**: `incremental_sql` with the last update date as bind.
//! 2. **Chunked**: date windows from the `ChunkPlanner`, then a final chunk
//!    for rows whose chunk column is null.
//! 3. **Plain**: `sql` as is.
//!
//! The caller gets each cursor in turn and reports how many rows it took,
//! which is what drives the window width in chunked mode.

use crate::domain::chunking::ChunkPlanner;
use crate::domain::errors::Result;
use crate::domain::query::QueryDefinition;
use crate::ports::query_port::QueryPort;
use crate::ports::row_source::RowSource;
use chrono::NaiveDateTime;
use log::info;

const LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the caller did with one cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOutcome {
    pub rows: u64,
    /// False stops the plan; no further cursor is opened.
    pub keep_going: bool,
}

impl CursorOutcome {
    pub fn continue_after(rows: u64) -> Self {
        Self { rows, keep_going: true }
    }

    pub fn stop_after(rows: u64) -> Self {
        Self { rows, keep_going: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub chunks: u32,
    pub rows: u64,
    pub total_query_ms: u64,
    pub max_query_ms: u64,
    /// True when the plan was cut short by the caller.
    pub stopped: bool,
}

impl PlanStats {
    fn record(&mut self, source: &dyn RowSource, outcome: CursorOutcome) {
        let ms = source.run_duration_ms().unwrap_or(0);
        info!("Query took [{}] ms", ms);
        self.total_query_ms += ms;
        self.max_query_ms = self.max_query_ms.max(ms);
        self.rows += outcome.rows;
    }
}

/// Walks every cursor `query` needs, handing each to `each`.
pub fn run_query_plan<F>(
    port: &dyn QueryPort,
    query: &QueryDefinition,
    now: NaiveDateTime,
    mut each: F,
) -> Result<PlanStats>
where
    F: FnMut(&mut dyn RowSource) -> Result<CursorOutcome>,
{
    let mut stats = PlanStats::default();

    if let Some((sql, since)) = query.incremental() {
        info!("Running incremental: {}", sql);
        let mut source = port.open(&query.name, sql, &[since], &query.columns)?;
        let outcome = each(source.as_mut())?;
        stats.record(source.as_ref(), outcome);
        stats.stopped = !outcome.keep_going;
        return Ok(stats);
    }

    let Some(chunk) = query.chunk.as_ref() else {
        info!("Running: {}", query.sql);
        let mut source = port.open(&query.name, &query.sql, &[], &query.columns)?;
        let outcome = each(source.as_mut())?;
        stats.record(source.as_ref(), outcome);
        stats.stopped = !outcome.keep_going;
        return Ok(stats);
    };

    let mut earliest = chunk.earliest_date;
    if let Some(sql) = chunk.earliest_date_sql.as_deref() {
        let queried = port.query_datetime(sql)?;
        info!(
            "Queried for earliest date [{}]",
            queried.map(|d| d.format(LOG_DATE_FORMAT).to_string()).unwrap_or_default()
        );
        if let Some(queried) = queried.filter(|q| *q < earliest) {
            info!(
                "Setting earliest date from [{}] to [{}]",
                earliest.format(LOG_DATE_FORMAT),
                queried.format(LOG_DATE_FORMAT)
            );
            earliest = queried;
        }
    }
    info!("earliest date is [{}]", earliest.format(LOG_DATE_FORMAT));

    let mut planner = ChunkPlanner::new(now, chunk.days_per_chunk, earliest);
    while let Some(window) = planner.next_window() {
        let (sql, binds) = chunk.window_sql(&query.sql, &window);
        info!(
            "Running chunk with dates earlier [{}] later [{}]: {}",
            window.earlier.map(|d| d.format(LOG_DATE_FORMAT).to_string()).unwrap_or_default(),
            window.later.map(|d| d.format(LOG_DATE_FORMAT).to_string()).unwrap_or_default(),
            sql
        );
        let mut source = port.open(&query.name, &sql, &binds, &query.columns)?;
        let outcome = each(source.as_mut())?;
        stats.record(source.as_ref(), outcome);
        if outcome.rows > 0 {
            info!("{} rows returned", outcome.rows);
        }
        planner.record_rows(outcome.rows);
        if !outcome.keep_going {
            stats.chunks = planner.chunks();
            stats.stopped = true;
            return Ok(stats);
        }
    }
    stats.chunks = planner.chunks();

    let null_sql = chunk.null_sql(&query.sql);
    info!("Running null sql chunk: {}", null_sql);
    let mut source = port.open(&query.name, &null_sql, &[], &query.columns)?;
    let outcome = each(source.as_mut())?;
    stats.record(source.as_ref(), outcome);
    info!("{} rows returned", outcome.rows);
    stats.stopped = !outcome.keep_going;
    Ok(stats)
}
