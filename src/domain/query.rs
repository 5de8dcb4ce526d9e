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

//! Query-backed dataset definitions.
//!
//! SQL arrives fully resolved. The only rewriting done here is the date
//! window filter used by chunked extraction.

use crate::domain::chunking::ChunkWindow;
use crate::domain::column::ColumnDefinition;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Placeholder a chunked query may carry to say where the window filter goes.
pub const CHUNK_FILTER_MARKER: &str = "{chunk_filter}";

/// Shortest checksum query considered real. Anything shorter is a stub.
const MIN_CHECKSUM_SQL_LEN: usize = 5;

fn default_lake_only() -> bool {
    true
}

fn default_days_per_chunk() -> i64 {
    30
}

fn default_earliest_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    pub sql: String,
    /// Output columns. When empty they are derived from the cursor.
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub count_sql: Option<String>,
    #[serde(default)]
    pub checksum_sql: Option<String>,
    /// Checksum reported by the previous run, if any.
    #[serde(default)]
    pub last_checksum: Option<i64>,
    /// Variant of `sql` taking one date bind: rows changed since.
    #[serde(default)]
    pub incremental_sql: Option<String>,
    #[serde(default)]
    pub latest_update_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub chunk: Option<ChunkSettings>,
    #[serde(default = "default_lake_only")]
    pub lake_only: bool,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSettings {
    /// Timestamp column the windows are cut on.
    pub column: String,
    #[serde(default = "default_days_per_chunk")]
    pub days_per_chunk: i64,
    #[serde(default = "default_earliest_date")]
    pub earliest_date: NaiveDateTime,
    /// Optional `SELECT MIN(column)` style query that may push the earliest
    /// date further back.
    #[serde(default)]
    pub earliest_date_sql: Option<String>,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            columns: Vec::new(),
            count_sql: None,
            checksum_sql: None,
            last_checksum: None,
            incremental_sql: None,
            latest_update_date: None,
            chunk: None,
            lake_only: true,
            version: None,
        }
    }

    pub fn can_calculate_checksum(&self) -> bool {
        self.checksum_sql
            .as_deref()
            .map(|s| s.trim().len() > MIN_CHECKSUM_SQL_LEN)
            .unwrap_or(false)
    }

    /// A zero or missing checksum never proves anything.
    pub fn checksum_unchanged(&self, checksum: Option<i64>) -> bool {
        match (self.last_checksum, checksum) {
            (Some(last), Some(current)) if current != 0 => last == current,
            _ => false,
        }
    }

    /// The incremental statement and its bind, when this run is incremental.
    pub fn incremental(&self) -> Option<(&str, NaiveDateTime)> {
        match (&self.incremental_sql, self.latest_update_date) {
            (Some(sql), Some(since)) => Some((sql.as_str(), since)),
            _ => None,
        }
    }
}

impl ChunkSettings {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            days_per_chunk: default_days_per_chunk(),
            earliest_date: default_earliest_date(),
            earliest_date_sql: None,
        }
    }

    /// SQL and positional binds for one date window.
    pub fn window_sql(&self, base_sql: &str, window: &ChunkWindow) -> (String, Vec<NaiveDateTime>) {
        let col = &self.column;
        let (filter, binds) = match (window.earlier, window.later) {
            (Some(e), Some(l)) => (format!("{col} >= :1 AND {col} < :2"), vec![e, l]),
            (Some(e), None) => (format!("{col} >= :1"), vec![e]),
            (None, Some(l)) => (format!("{col} < :1"), vec![l]),
            (None, None) => ("1 = 1".to_string(), vec![]),
        };
        (apply_filter(base_sql, &filter), binds)
    }

    /// SQL for rows whose chunk column is null; they fall outside every window.
    pub fn null_sql(&self, base_sql: &str) -> String {
        apply_filter(base_sql, &format!("{} IS NULL", self.column))
    }
}

fn apply_filter(base_sql: &str, filter: &str) -> String {
    if base_sql.contains(CHUNK_FILTER_MARKER) {
        base_sql.replace(CHUNK_FILTER_MARKER, filter)
    } else {
        format!("SELECT * FROM ({}) chunked WHERE {}", base_sql, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_checksum_rules() {
        let mut q = QueryDefinition::new("claims", "SELECT * FROM claims");
        q.checksum_sql = Some("SUM".into());
        assert!(!q.can_calculate_checksum());
        q.checksum_sql = Some("SELECT SUM(ORA_HASH(id)) FROM claims".into());
        assert!(q.can_calculate_checksum());

        assert!(!q.checksum_unchanged(Some(42)));
        q.last_checksum = Some(42);
        assert!(q.checksum_unchanged(Some(42)));
        assert!(!q.checksum_unchanged(Some(43)));
        assert!(!q.checksum_unchanged(None));
        q.last_checksum = Some(0);
        assert!(!q.checksum_unchanged(Some(0)));
    }

    #[test]
    fn test_window_sql_uses_marker_or_wraps() {
        let chunk = ChunkSettings::new("createtime");
        let window = ChunkWindow {
            earlier: Some(at(2024, 1, 1)),
            later: Some(at(2024, 2, 1)),
        };
        let (sql, binds) =
            chunk.window_sql("SELECT id FROM t WHERE {chunk_filter} AND retired = 0", &window);
        assert_eq!(
            sql,
            "SELECT id FROM t WHERE createtime >= :1 AND createtime < :2 AND retired = 0"
        );
        assert_eq!(binds.len(), 2);

        let open = ChunkWindow { earlier: None, later: Some(at(2000, 1, 1)) };
        let (sql, binds) = chunk.window_sql("SELECT id, createtime FROM t", &open);
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT id, createtime FROM t) chunked WHERE createtime < :1"
        );
        assert_eq!(binds, vec![at(2000, 1, 1)]);

        assert!(chunk.null_sql("SELECT * FROM t WHERE {chunk_filter}").ends_with("createtime IS NULL"));
    }

    #[test]
    fn test_defaults_from_yaml() {
        let yaml = r#"
name: claims
sql: SELECT * FROM claims
chunk:
  column: createtime
"#;
        let q: QueryDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(q.lake_only);
        let chunk = q.chunk.unwrap();
        assert_eq!(chunk.days_per_chunk, 30);
        assert_eq!(chunk.earliest_date, at(2000, 1, 1));
    }
}
