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

//! # Generated File Source
//!
//! Reads back files written by the extract writer:
//!
//! ```text
//! Expected Rows: 25
//! <data start>
//! ID,NAME,UPDATED
//! INTEGER,STRING,DATETIME
//! ...data rows...
//! <data end>
//! Stats: ...
//! ```
//!
//! We produced these files ourselves, so a malformed row means the file was
//! cut short or tampered with. The read stops there rather than guessing.

use crate::domain::column::{CellValue, ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use crate::ports::row_source::{parse_text_cell, RowSource};
use csv::{Reader, ReaderBuilder, StringRecord};
use log::{error, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const EXPECTED_ROWS_PREFIX: &str = "Expected Rows:";
pub const DATA_START_MARKER: &str = "<data start>";
pub const DATA_END_MARKER: &str = "<data end>";

pub struct GeneratedFileSource<R: Read = File> {
    name: String,
    columns: Vec<ColumnDefinition>,
    /// File position of each output column.
    positions: Vec<usize>,
    field_count: usize,
    reader: Option<Reader<R>>,
    record: StringRecord,
    expected_rows: Option<u64>,
    current_row: u64,
    exhausted: bool,
}

impl GeneratedFileSource<File> {
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading generated file {}", path.display());
        Self::from_reader(name, File::open(path)?)
    }
}

impl<R: Read> GeneratedFileSource<R> {
    /// Consumes the four metadata records and positions the reader on the
    /// first data row.
    pub fn from_reader(name: impl Into<String>, input: R) -> Result<Self> {
        let name = name.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut record = StringRecord::new();
        let first = read_required(&mut reader, &mut record, &name, "expected rows")?;
        let expected_rows = parse_expected_rows(&first, &name)?;

        // Blank lines are skipped by the reader, so the separator may already
        // be gone and this is the names row.
        let mut names = read_required(&mut reader, &mut record, &name, "column names")?;
        if names.first().map_or(false, |f| f.contains(DATA_START_MARKER)) {
            names = read_required(&mut reader, &mut record, &name, "column names")?;
        }
        let types = read_required(&mut reader, &mut record, &name, "column types")?;

        let mut columns = Vec::new();
        let mut positions = Vec::new();
        for (i, column_name) in names.iter().enumerate() {
            if column_name.is_empty() {
                continue;
            }
            let tag = types.get(i).ok_or_else(|| MoverError::SourceError {
                name: name.clone(),
                row: 0,
                reason: format!("no type given for column {}", column_name),
            })?;
            columns.push(ColumnDefinition::from_tag(column_name, tag, None)?);
            positions.push(i);
        }

        Ok(Self {
            name,
            columns,
            positions,
            field_count: names.len(),
            reader: Some(reader),
            record: StringRecord::new(),
            expected_rows,
            current_row: 0,
            exhausted: false,
        })
    }

    fn log_truncation(&self) {
        error!("current row is [{}]", self.current_row);
        error!(
            "row.length [{}] columns size [{}]",
            self.record.len(),
            self.field_count
        );
        for (i, field) in self.record.iter().enumerate() {
            error!("row[{}] is [{}]", i, field);
        }
        error!("data file has been truncated");
    }
}

fn read_required<R: Read>(
    reader: &mut Reader<R>,
    record: &mut StringRecord,
    name: &str,
    what: &str,
) -> Result<Vec<String>> {
    if !reader.read_record(record)? {
        return Err(MoverError::SourceError {
            name: name.to_string(),
            row: 0,
            reason: format!("file ended before the {} record", what),
        });
    }
    Ok(record.iter().map(str::to_string).collect())
}

/// `Expected Rows: 25` -> 25. A negative count means the writer did not know.
fn parse_expected_rows(fields: &[String], name: &str) -> Result<Option<u64>> {
    let line = fields.first().map(String::as_str).unwrap_or("");
    let bad = |reason: String| MoverError::SourceError {
        name: name.to_string(),
        row: 0,
        reason,
    };
    let (_, value) = line
        .split_once(':')
        .ok_or_else(|| bad(format!("Did not find expected rows header - got [{}]", line)))?;
    let count: i64 = value
        .trim()
        .parse()
        .map_err(|_| bad(format!("Expected rows is not a number - got [{}]", line)))?;
    Ok(u64::try_from(count).ok())
}

impl<R: Read> RowSource for GeneratedFileSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    fn next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        match reader.read_record(&mut self.record) {
            Ok(true) => {}
            Ok(false) => {
                warn!("{} ended without a {} marker", self.name, DATA_END_MARKER);
                self.exhausted = true;
                return Ok(false);
            }
            Err(e) => {
                error!("{}", e);
                self.log_truncation();
                self.exhausted = true;
                return Ok(false);
            }
        }
        if self.record.get(0).map_or(false, |f| f.contains(DATA_END_MARKER)) {
            self.exhausted = true;
            return Ok(false);
        }
        if self.record.len() != self.field_count {
            self.log_truncation();
            self.exhausted = true;
            return Ok(false);
        }
        self.current_row += 1;
        Ok(true)
    }

    fn current_row_ordinal(&self) -> u64 {
        self.current_row
    }

    fn expected_rows(&self) -> Option<u64> {
        self.expected_rows
    }

    fn value(&self, column: &str, _logical_type: LogicalType) -> Result<CellValue> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| MoverError::ColumnNotAvailable(column.to_string()))?;
        let raw = self.record.get(self.positions[index]);
        parse_text_cell(&self.columns, column, raw)
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.exhausted = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}
