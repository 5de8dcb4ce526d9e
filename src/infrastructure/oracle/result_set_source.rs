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

//! `RowSource` over an open Oracle cursor.

use crate::domain::column::{CellValue, ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use crate::ports::row_source::RowSource;
use chrono::{NaiveDate, NaiveDateTime};
use oracle::{ResultSet, Row};

pub struct ResultSetSource<'conn> {
    name: String,
    columns: Vec<ColumnDefinition>,
    rows: Option<ResultSet<'conn, Row>>,
    current: Option<Row>,
    current_row: u64,
    run_duration_ms: u64,
}

impl<'conn> ResultSetSource<'conn> {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        rows: ResultSet<'conn, Row>,
        run_duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Some(rows),
            current: None,
            current_row: 0,
            run_duration_ms,
        }
    }

    fn row(&self) -> Result<&Row> {
        self.current.as_ref().ok_or_else(|| MoverError::SourceError {
            name: self.name.clone(),
            row: self.current_row,
            reason: "no current row".to_string(),
        })
    }
}

impl RowSource for ResultSetSource<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    fn next(&mut self) -> Result<bool> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(false);
        };
        match rows.next() {
            Some(row) => {
                self.current = Some(row?);
                self.current_row += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn current_row_ordinal(&self) -> u64 {
        self.current_row
    }

    fn run_duration_ms(&self) -> Option<u64> {
        Some(self.run_duration_ms)
    }

    fn value(&self, column: &str, logical_type: LogicalType) -> Result<CellValue> {
        let row = self.row()?;
        let value = match logical_type {
            LogicalType::Integer => row.get::<_, Option<i64>>(column)?.map(CellValue::Integer),
            LogicalType::Decimal => row.get::<_, Option<f64>>(column)?.map(CellValue::Decimal),
            LogicalType::String | LogicalType::TypeCode => {
                row.get::<_, Option<String>>(column)?.map(CellValue::Text)
            }
            LogicalType::Boolean => row.get::<_, Option<bool>>(column)?.map(CellValue::Boolean),
            LogicalType::Date => row.get::<_, Option<NaiveDate>>(column)?.map(CellValue::Date),
            LogicalType::DateTime => row
                .get::<_, Option<NaiveDateTime>>(column)?
                .map(CellValue::DateTime),
        };
        Ok(value.unwrap_or(CellValue::Null))
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.rows = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.rows.is_none()
    }
}
