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

//! # Extract Writer
//!
//! Writes the result of one query to a generated file that can be shipped
//! and uploaded later (see `GeneratedFileSource` for the reading side).

use crate::application::query_plan::{run_query_plan, CursorOutcome};
use crate::domain::errors::Result;
use crate::domain::query::QueryDefinition;
use crate::infrastructure::files::generated_file_source::{
    DATA_END_MARKER, DATA_START_MARKER, EXPECTED_ROWS_PREFIX,
};
use crate::ports::query_port::QueryPort;
use crate::ports::row_source::RowSource;
use chrono::Local;
use csv::{Writer, WriterBuilder};
use log::{error, info};
use std::io::Write;
use std::time::Instant;

const STATS_HEADER: [&str; 7] = [
    "Date of Run",
    "Chunks",
    "Total Query Time",
    "Max Query Time",
    "Processing Time",
    "DB Name",
    "Customer Code",
];
const RUN_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Who the extract is for; printed in the stats block.
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    pub db_name: String,
    pub customer_code: String,
}

/// Writes `query` to `sink` and returns the number of data rows written.
pub fn write_query<W: Write>(
    port: &dyn QueryPort,
    query: &QueryDefinition,
    sink: W,
    context: &ExtractContext,
) -> Result<u64> {
    let started = Instant::now();
    let expected_rows = match query.count_sql.as_deref() {
        Some(sql) => port.query_i64(sql)?.unwrap_or(-1),
        None => -1,
    };
    if expected_rows >= 0 {
        info!("Expecting [{}] rows", expected_rows);
    }

    let mut writer = WriterBuilder::new().flexible(true).from_writer(sink);
    writer.write_record([format!("{} {}", EXPECTED_ROWS_PREFIX, expected_rows)])?;
    writer.write_record([DATA_START_MARKER])?;

    let mut header_written = false;
    let stats = run_query_plan(port, query, Local::now().naive_local(), |source| {
        if !header_written {
            write_header_rows(&mut writer, source)?;
            header_written = true;
        }
        let rows = write_rows(&mut writer, source)?;
        source.close()?;
        Ok(CursorOutcome::continue_after(rows))
    })?;
    if !header_written {
        writer.write_record(query.columns.iter().map(|c| c.name.as_str()))?;
        writer.write_record(query.columns.iter().map(|c| c.logical_type.tag()))?;
    }

    let processing_secs = started.elapsed().as_secs();
    writer.write_record([DATA_END_MARKER])?;
    writer.write_record(["Stats:"])?;
    writer.write_record(STATS_HEADER)?;
    writer.write_record([
        Local::now().format(RUN_DATE_FORMAT).to_string(),
        stats.chunks.to_string(),
        stats.total_query_ms.to_string(),
        stats.max_query_ms.to_string(),
        processing_secs.to_string(),
        context.db_name.clone(),
        context.customer_code.clone(),
    ])?;
    writer.write_record([format!(
        "Query: {} version: {}",
        query.name,
        query.version.as_deref().unwrap_or("")
    )])?;
    writer.flush()?;

    info!(
        "Wrote: {} rows (expected [{}] rows) for {}",
        stats.rows, expected_rows, query.name
    );
    Ok(stats.rows)
}

fn write_header_rows<W: Write>(writer: &mut Writer<W>, source: &dyn RowSource) -> Result<()> {
    writer.write_record(source.columns().iter().map(|c| c.name.as_str()))?;
    writer.write_record(source.columns().iter().map(|c| c.logical_type.tag()))?;
    Ok(())
}

/// Rows that fail to render are logged and left out of the file.
fn write_rows<W: Write>(writer: &mut Writer<W>, source: &mut dyn RowSource) -> Result<u64> {
    let mut written = 0;
    let columns = source.columns().to_vec();
    while source.next()? {
        let rendered: Result<Vec<String>> = columns.iter().map(|c| c.render(&*source)).collect();
        match rendered {
            Ok(values) => {
                writer.write_record(&values)?;
                written += 1;
            }
            Err(e) => error!(
                "Skipping row [{}] of {}: {}",
                source.current_row_ordinal(),
                source.name(),
                e
            ),
        }
    }
    Ok(written)
}
