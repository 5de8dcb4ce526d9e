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

//! Infrastructure adapter running dataset queries against Oracle.

use crate::domain::column::ColumnDefinition;
use crate::domain::errors::{MoverError, Result};
use crate::domain::mapping;
use crate::infrastructure::oracle::connection_manager::OracleConnectionManager;
use crate::infrastructure::oracle::result_set_source::ResultSetSource;
use crate::ports::query_port::QueryPort;
use crate::ports::row_source::RowSource;
use chrono::NaiveDateTime;
use log::debug;
use oracle::sql_type::{FromSql, ToSql};
use r2d2::{Pool, PooledConnection};
use std::time::Instant;

/// Concrete implementation of `QueryPort` for Oracle databases.
///
/// Holds a single pooled connection for the life of one run attempt.
pub struct OracleQueryAdapter {
    conn: PooledConnection<OracleConnectionManager>,
}

impl OracleQueryAdapter {
    pub fn connect(pool: &Pool<OracleConnectionManager>) -> Result<Self> {
        let conn = pool
            .get()
            .map_err(|e| MoverError::OracleError(e.to_string()))?;
        Ok(Self { conn })
    }

    fn query_single<T: FromSql>(&self, sql: &str) -> Result<Option<T>> {
        debug!("Executing: {}", sql);
        let mut rows = self.conn.query(sql, &[])?;
        match rows.next() {
            Some(row) => Ok(row?.get::<_, Option<T>>(0)?),
            None => Ok(None),
        }
    }
}

impl QueryPort for OracleQueryAdapter {
    fn query_i64(&self, sql: &str) -> Result<Option<i64>> {
        self.query_single(sql)
    }

    fn query_datetime(&self, sql: &str) -> Result<Option<NaiveDateTime>> {
        self.query_single(sql)
    }

    fn open<'a>(
        &'a self,
        name: &str,
        sql: &str,
        binds: &[NaiveDateTime],
        columns: &[ColumnDefinition],
    ) -> Result<Box<dyn RowSource + 'a>> {
        let params: Vec<&dyn ToSql> = binds.iter().map(|b| b as &dyn ToSql).collect();
        let started = Instant::now();
        let rows = self.conn.query(sql, &params)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let columns = if columns.is_empty() {
            mapping::columns_from_cursor(
                rows.column_info()
                    .iter()
                    .map(|c| (c.name(), c.oracle_type())),
            )
        } else {
            columns.to_vec()
        };
        Ok(Box::new(ResultSetSource::new(name, columns, rows, elapsed_ms)))
    }
}
