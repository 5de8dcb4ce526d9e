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

//! # Row Source Port
//!
//! This Port is the one shape every data origin takes before it reaches the
//! Batch Builder: a database cursor, a generated extract file, a customer
//! supplied CSV, or an in-memory test double.
//!
//! A source is a forward-only cursor: `next()` advances, the getters read
//! columns of the current row by name. Implementors provide `value`; the
//! typed getters are derived from it.

use crate::domain::column::{CellValue, ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use chrono::{NaiveDate, NaiveDateTime};

pub trait RowSource {
    /// Dataset name, used in logs and in the upload payload.
    fn name(&self) -> &str;

    /// The output columns, in order.
    fn columns(&self) -> &[ColumnDefinition];

    /// Advances to the next row. `Ok(false)` means the source is exhausted.
    fn next(&mut self) -> Result<bool>;

    /// False when the current row was consumed but must not be used.
    fn row_successfully_read(&self) -> bool {
        true
    }

    /// 1-based ordinal of the current row. 0 before the first `next()`.
    fn current_row_ordinal(&self) -> u64;

    /// Row count announced up front, if the origin knows it.
    fn expected_rows(&self) -> Option<u64> {
        None
    }

    /// How long the origin took to produce its rows, when measured.
    fn run_duration_ms(&self) -> Option<u64> {
        None
    }

    /// Reads one column of the current row as `logical_type`.
    fn value(&self, column: &str, logical_type: LogicalType) -> Result<CellValue>;

    fn get_string(&self, column: &str) -> Result<Option<String>> {
        Ok(self.value(column, LogicalType::String)?.into_text())
    }

    fn get_i64(&self, column: &str) -> Result<Option<i64>> {
        self.value(column, LogicalType::Integer)?.into_i64(column)
    }

    fn get_f64(&self, column: &str) -> Result<Option<f64>> {
        self.value(column, LogicalType::Decimal)?.into_f64(column)
    }

    fn get_bool(&self, column: &str) -> Result<Option<bool>> {
        self.value(column, LogicalType::Boolean)?.into_bool(column)
    }

    fn get_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        self.value(column, LogicalType::Date)?.into_date(column)
    }

    fn get_datetime(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        self.value(column, LogicalType::DateTime)?.into_datetime(column)
    }

    /// Writes the current raw row to the side artifact. Returns false when
    /// this source has nowhere to put it.
    fn quarantine_current_row(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Releases the underlying resource. Safe to call more than once.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Parses a raw text cell for text-backed sources. A column the source does
/// not know is an error; a missing cell is null.
pub fn parse_text_cell(
    columns: &[ColumnDefinition],
    column: &str,
    raw: Option<&str>,
) -> Result<CellValue> {
    let def = columns
        .iter()
        .find(|c| c.name == column)
        .ok_or_else(|| MoverError::ColumnNotAvailable(column.to_string()))?;
    match raw {
        Some(raw) => def.parse(raw),
        None => Ok(CellValue::Null),
    }
}
