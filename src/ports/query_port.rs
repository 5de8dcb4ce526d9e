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

//! # Query Port
//!
//! What the Upload Client and the Extract Writer need from a database:
//! single-value lookups (counts, checksums, earliest dates) and cursors
//! wrapped as `RowSource`s.

use crate::domain::column::ColumnDefinition;
use crate::domain::errors::Result;
use crate::ports::row_source::RowSource;
use chrono::NaiveDateTime;

pub trait QueryPort {
    /// First column of the first row as an integer; `None` for no row or null.
    fn query_i64(&self, sql: &str) -> Result<Option<i64>>;

    fn query_datetime(&self, sql: &str) -> Result<Option<NaiveDateTime>>;

    /// Runs `sql` with positional date binds. When `columns` is empty the
    /// output columns are derived from the cursor.
    fn open<'a>(
        &'a self,
        name: &str,
        sql: &str,
        binds: &[NaiveDateTime],
        columns: &[ColumnDefinition],
    ) -> Result<Box<dyn RowSource + 'a>>;
}
