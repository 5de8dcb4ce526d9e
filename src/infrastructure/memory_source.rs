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

//! In-memory `RowSource` used as a test double and for small fixed datasets.

use crate::domain::column::{CellValue, ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use crate::ports::row_source::{parse_text_cell, RowSource};
use std::collections::HashSet;

#[derive(Debug)]
pub struct MemoryRowSource {
    name: String,
    columns: Vec<ColumnDefinition>,
    rows: Vec<Vec<Option<String>>>,
    position: usize,
    expected_rows: Option<u64>,
    run_duration_ms: Option<u64>,
    fail_at: Option<usize>,
    unclean: HashSet<u64>,
    quarantined: Vec<u64>,
    closed: bool,
    close_calls: u32,
}

impl MemoryRowSource {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            position: 0,
            expected_rows: None,
            run_duration_ms: None,
            fail_at: None,
            unclean: HashSet::new(),
            quarantined: Vec::new(),
            closed: false,
            close_calls: 0,
        }
    }

    /// Adds a row of raw cells. An empty cell is null.
    pub fn with_row(mut self, cells: &[&str]) -> Self {
        self.rows.push(
            cells
                .iter()
                .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                .collect(),
        );
        self
    }

    pub fn with_expected_rows(mut self, rows: u64) -> Self {
        self.expected_rows = Some(rows);
        self
    }

    pub fn with_run_duration_ms(mut self, ms: u64) -> Self {
        self.run_duration_ms = Some(ms);
        self
    }

    /// The `ordinal`-th call to `next()` fails instead of advancing.
    pub fn failing_at(mut self, ordinal: usize) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    /// Marks a row (1-based) as consumed but not cleanly read.
    pub fn with_unclean_row(mut self, ordinal: u64) -> Self {
        self.unclean.insert(ordinal);
        self
    }

    /// Ordinals of rows that were quarantined, in order.
    pub fn quarantined(&self) -> &[u64] {
        &self.quarantined
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls
    }
}

impl RowSource for MemoryRowSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.fail_at == Some(self.position + 1) {
            return Err(MoverError::SourceError {
                name: self.name.clone(),
                row: self.position as u64 + 1,
                reason: "injected failure".to_string(),
            });
        }
        if self.position >= self.rows.len() {
            return Ok(false);
        }
        self.position += 1;
        Ok(true)
    }

    fn row_successfully_read(&self) -> bool {
        !self.unclean.contains(&(self.position as u64))
    }

    fn current_row_ordinal(&self) -> u64 {
        self.position as u64
    }

    fn expected_rows(&self) -> Option<u64> {
        self.expected_rows
    }

    fn run_duration_ms(&self) -> Option<u64> {
        self.run_duration_ms
    }

    fn value(&self, column: &str, _logical_type: LogicalType) -> Result<CellValue> {
        let row = self
            .position
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| MoverError::SourceError {
                name: self.name.clone(),
                row: self.position as u64,
                reason: "no current row".to_string(),
            })?;
        let index = self
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| MoverError::ColumnNotAvailable(column.to_string()))?;
        let raw = row.get(index).and_then(|c| c.as_deref());
        parse_text_cell(&self.columns, column, raw)
    }

    fn quarantine_current_row(&mut self) -> Result<bool> {
        self.quarantined.push(self.position as u64);
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("ID", LogicalType::Integer),
            ColumnDefinition::new("NAME", LogicalType::String),
        ]
    }

    #[test]
    fn test_reads_rows_in_order() {
        let mut source = MemoryRowSource::new("t", cols())
            .with_row(&["1", "a"])
            .with_row(&["2", ""]);
        assert!(source.next().unwrap());
        assert_eq!(source.get_i64("ID").unwrap(), Some(1));
        assert!(source.next().unwrap());
        assert_eq!(source.current_row_ordinal(), 2);
        assert_eq!(source.get_string("NAME").unwrap(), None);
        assert!(!source.next().unwrap());
    }

    #[test]
    fn test_injected_failure() {
        let mut source = MemoryRowSource::new("t", cols())
            .with_row(&["1", "a"])
            .with_row(&["2", "b"])
            .failing_at(2);
        assert!(source.next().unwrap());
        assert!(matches!(source.next(), Err(MoverError::SourceError { row: 2, .. })));
    }

    #[test]
    fn test_unknown_column() {
        let mut source = MemoryRowSource::new("t", cols()).with_row(&["1", "a"]);
        source.next().unwrap();
        assert!(matches!(
            source.get_string("MISSING"),
            Err(MoverError::ColumnNotAvailable(_))
        ));
    }
}
