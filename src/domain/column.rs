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

//! # Column Definitions
//!
//! A `ColumnDefinition` describes one output column: its name, its logical type
//! and an optional format pattern. It converts values in both directions:
//! - **render**: ask a `RowSource` for a typed value and turn it into the
//!   canonical wire string (empty string for null).
//! - **parse**: turn an incoming string (a cell of a delimited file) back into
//!   a typed `CellValue`.
//!
//! The canonical forms are locale independent: integers and decimals are never
//! grouped, decimals carry at most 10 fraction digits, and date-times are
//! written in UTC.

use crate::domain::errors::{MoverError, Result};
use crate::ports::row_source::RowSource;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Stand-in for `\` in canonical strings, so the server's loader never sees escapes.
pub const BACKSLASH_TOKEN: &str = "<%gwrebkslsh%>";

pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y%m%d %H:%M:%S%.3f%z";

const MAX_FRACTION_DIGITS: usize = 10;

/// Historical date-time layouts accepted from external files, in the order
/// they are attempted. Every layout is tried and the last one that parses
/// wins, so the order matters and must not be "improved".
const DATETIME_FALLBACK_FORMATS: [&str; 8] = [
    DEFAULT_DATETIME_FORMAT,
    "%Y%m%d %H:%M:%S%.3f",
    "%d%b%Y:%H:%M:%S",
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S%.3f%z",
    "%m/%d/%Y %H:%M:%S%.3f%z",
    "%Y-%m-%d %H:%M:%S%.3f",
    "%m/%d/%Y %H:%M:%S%.3f",
];

/// The logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalType {
    Integer,
    String,
    Date,
    DateTime,
    Decimal,
    Boolean,
    TypeCode,
}

impl LogicalType {
    /// Resolves a type tag as found in configuration and in the type row of
    /// generated files.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let upper = tag.trim().to_uppercase();
        let logical_type = match upper.as_str() {
            "INTEGER" | "ID" | "TYPECODEID" => LogicalType::Integer,
            "STRING" => LogicalType::String,
            "TYPECODE" => LogicalType::TypeCode,
            "DATE" => LogicalType::Date,
            "DATETIME" => LogicalType::DateTime,
            "DECIMAL" => LogicalType::Decimal,
            "BIT" | "BOOLEAN" => LogicalType::Boolean,
            other if other.ends_with("FROM_DATE") => LogicalType::String,
            _ => {
                return Err(MoverError::ConfigError(format!(
                    "Unknown type: {}; valid types are INTEGER, STRING, DATETIME, and DECIMAL",
                    tag
                )))
            }
        };
        Ok(logical_type)
    }

    /// The tag written to the type row of generated files.
    pub fn tag(&self) -> &'static str {
        match self {
            LogicalType::Integer => "INTEGER",
            LogicalType::String => "STRING",
            LogicalType::Date => "DATE",
            LogicalType::DateTime => "DATETIME",
            LogicalType::Decimal => "DECIMAL",
            LogicalType::Boolean => "BIT",
            LogicalType::TypeCode => "TYPECODE",
        }
    }

    pub fn is_date_type(&self) -> bool {
        matches!(self, LogicalType::Date | LogicalType::DateTime)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl TryFrom<String> for LogicalType {
    type Error = MoverError;

    fn try_from(tag: String) -> Result<Self> {
        LogicalType::from_tag(&tag)
    }
}

impl From<LogicalType> for String {
    fn from(t: LogicalType) -> Self {
        t.tag().to_string()
    }
}

/// A typed cell value, the result of parsing or reading one column of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Decimal(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn into_i64(self, column: &str) -> Result<Option<i64>> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Integer(v) => Ok(Some(v)),
            CellValue::Boolean(b) => Ok(Some(i64::from(b))),
            other => Err(other.mismatch(column, "an integer")),
        }
    }

    pub fn into_f64(self, column: &str) -> Result<Option<f64>> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Decimal(v) => Ok(Some(v)),
            CellValue::Integer(v) => Ok(Some(v as f64)),
            other => Err(other.mismatch(column, "a decimal")),
        }
    }

    pub fn into_bool(self, column: &str) -> Result<Option<bool>> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Boolean(b) => Ok(Some(b)),
            CellValue::Integer(v) => Ok(Some(v != 0)),
            other => Err(other.mismatch(column, "a boolean")),
        }
    }

    pub fn into_date(self, column: &str) -> Result<Option<NaiveDate>> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::Date(d) => Ok(Some(d)),
            CellValue::DateTime(dt) => Ok(Some(dt.date())),
            other => Err(other.mismatch(column, "a date")),
        }
    }

    pub fn into_datetime(self, column: &str) -> Result<Option<NaiveDateTime>> {
        match self {
            CellValue::Null => Ok(None),
            CellValue::DateTime(dt) => Ok(Some(dt)),
            CellValue::Date(d) => Ok(Some(d.and_time(NaiveTime::default()))),
            other => Err(other.mismatch(column, "a date-time")),
        }
    }

    /// Strings are always available: every typed value has a textual form.
    pub fn into_text(self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s),
            CellValue::Integer(v) => Some(v.to_string()),
            CellValue::Decimal(v) => Some(format_decimal(v)),
            CellValue::Boolean(b) => Some(b.to_string()),
            CellValue::Date(d) => Some(d.to_string()),
            CellValue::DateTime(dt) => Some(dt.to_string()),
        }
    }

    fn mismatch(&self, column: &str, wanted: &str) -> MoverError {
        MoverError::ValueParse {
            column: column.to_string(),
            value: format!("{:?}", self),
            reason: format!("value is not {}", wanted),
        }
    }
}

/// Describes one output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    #[serde(
        rename = "formatString",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub format_pattern: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            format_pattern: None,
        }
    }

    /// Builds a definition from a type tag, ignoring empty format patterns.
    pub fn from_tag(name: &str, tag: &str, format_pattern: Option<&str>) -> Result<Self> {
        let logical_type = LogicalType::from_tag(tag)?;
        let mut def = Self::new(name, logical_type);
        if let Some(p) = format_pattern.filter(|p| !p.trim().is_empty()) {
            def.format_pattern = Some(p.to_string());
        }
        Ok(def)
    }

    pub fn with_format(mut self, pattern: impl Into<String>) -> Self {
        self.format_pattern = Some(pattern.into());
        self
    }

    /// Reads this column from the current row of `row` and returns its
    /// canonical string. Null renders as the empty string.
    pub fn render(&self, row: &dyn RowSource) -> Result<String> {
        let name = self.name.as_str();
        let value = match self.logical_type {
            LogicalType::Integer => row.get_i64(name)?.map(CellValue::Integer),
            LogicalType::Decimal => row.get_f64(name)?.map(CellValue::Decimal),
            LogicalType::String | LogicalType::TypeCode => {
                row.get_string(name)?.map(CellValue::Text)
            }
            LogicalType::Date => row.get_date(name)?.map(CellValue::Date),
            LogicalType::DateTime => row.get_datetime(name)?.map(CellValue::DateTime),
            LogicalType::Boolean => self.read_boolean(row)?.map(CellValue::Boolean),
        };
        match value {
            Some(v) => self.format_value(&v),
            None => Ok(String::new()),
        }
    }

    /// Some drivers cannot hand back a native boolean, so fall back to the
    /// textual form before giving up.
    fn read_boolean(&self, row: &dyn RowSource) -> Result<Option<bool>> {
        match row.get_bool(&self.name) {
            Ok(v) => Ok(v),
            Err(_) => Ok(row
                .get_string(&self.name)?
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1"))),
        }
    }

    /// Canonical text for an already typed value.
    pub fn format_value(&self, value: &CellValue) -> Result<String> {
        let mut out = String::new();
        let written = match value {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(out, "{}", v),
            CellValue::Decimal(v) => out.write_str(&format_decimal(*v)),
            CellValue::Text(s) => out.write_str(&escape_text(s)),
            CellValue::Boolean(b) => out.write_str(if *b { "1" } else { "0" }),
            CellValue::Date(d) => {
                let pattern = self.format_pattern.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                write!(out, "{}", d.format(pattern))
            }
            CellValue::DateTime(dt) => write!(out, "{}", dt.and_utc().format(DEFAULT_DATETIME_FORMAT)),
        };
        written.map_err(|_| MoverError::ConfigError(format!(
            "Column {} has an invalid format pattern {:?}",
            self.name, self.format_pattern
        )))?;
        Ok(out)
    }

    /// Parses a raw cell. Empty (after trimming) is null; anything else must
    /// parse as this column's type.
    pub fn parse(&self, raw: &str) -> Result<CellValue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(CellValue::Null);
        }
        match self.logical_type {
            LogicalType::Integer => trimmed
                .parse::<i64>()
                .map(CellValue::Integer)
                .map_err(|e| self.parse_error(raw, e.to_string())),
            LogicalType::Decimal => trimmed
                .parse::<f64>()
                .map(CellValue::Decimal)
                .map_err(|e| self.parse_error(raw, e.to_string())),
            LogicalType::String | LogicalType::TypeCode => Ok(CellValue::Text(unescape_text(raw))),
            LogicalType::Boolean => match trimmed.to_lowercase().as_str() {
                "true" | "1" => Ok(CellValue::Boolean(true)),
                "false" | "0" => Ok(CellValue::Boolean(false)),
                _ => Err(self.parse_error(raw, "not a boolean".to_string())),
            },
            LogicalType::Date => {
                let pattern = self.format_pattern.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                NaiveDate::parse_and_remainder(trimmed, pattern)
                    .map(|(d, _)| CellValue::Date(d))
                    .map_err(|e| self.parse_error(raw, e.to_string()))
            }
            LogicalType::DateTime => self.parse_datetime(trimmed).map(CellValue::DateTime),
        }
    }

    fn parse_datetime(&self, s: &str) -> Result<NaiveDateTime> {
        let custom = self.format_pattern.as_deref();
        let mut result = None;
        let mut last_error = None;
        for format in custom.into_iter().chain(DATETIME_FALLBACK_FORMATS) {
            match parse_with_layout(s, format) {
                Ok(dt) => result = Some(dt),
                Err(e) => last_error = Some(e),
            }
        }
        match (result, last_error) {
            (Some(dt), _) => Ok(dt),
            (None, e) => Err(self.parse_error(
                s,
                e.map(|e| e.to_string()).unwrap_or_else(|| "no date formats".to_string()),
            )),
        }
    }

    fn parse_error(&self, value: &str, reason: String) -> MoverError {
        MoverError::ValueParse {
            column: self.name.clone(),
            value: value.to_string(),
            reason,
        }
    }
}

/// Parses using one layout, tolerating trailing text after the match.
fn parse_with_layout(s: &str, layout: &str) -> chrono::ParseResult<NaiveDateTime> {
    if layout.contains("%z") {
        DateTime::parse_and_remainder(s, layout).map(|(dt, _)| dt.naive_utc())
    } else if layout.contains("%H") || layout.contains("%T") {
        NaiveDateTime::parse_and_remainder(s, layout).map(|(dt, _)| dt)
    } else {
        NaiveDate::parse_and_remainder(s, layout).map(|(d, _)| d.and_time(NaiveTime::default()))
    }
}

/// Renders a decimal without grouping and with at most 10 fraction digits.
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut s = format!("{:.*}", MAX_FRACTION_DIGITS, value);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

pub fn escape_text(s: &str) -> String {
    s.replace('\\', BACKSLASH_TOKEN).replace('\r', "\n")
}

pub fn unescape_text(s: &str) -> String {
    s.replace(BACKSLASH_TOKEN, "\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_source::MemoryRowSource;

    fn single_value_source(column: ColumnDefinition, value: &str) -> MemoryRowSource {
        let mut source = MemoryRowSource::new("t", vec![column]).with_row(&[value]);
        source.next().unwrap();
        source
    }

    #[test]
    fn test_decimal_caps_fraction_digits() {
        assert_eq!(format_decimal(10000.01234567890123), "10000.0123456789");
        assert_eq!(format_decimal(5.0), "5");
        assert_eq!(format_decimal(1234567.5), "1234567.5");
        assert_eq!(format_decimal(-0.0), "0");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(LogicalType::from_tag("id").unwrap(), LogicalType::Integer);
        assert_eq!(LogicalType::from_tag("TYPECODEID").unwrap(), LogicalType::Integer);
        assert_eq!(LogicalType::from_tag("BIT").unwrap(), LogicalType::Boolean);
        assert_eq!(LogicalType::from_tag("EFFECTIVE_FROM_DATE").unwrap(), LogicalType::String);
        let err = LogicalType::from_tag("BLOB").unwrap_err();
        assert!(err.to_string().contains("Unknown type: BLOB"));
    }

    #[test]
    fn test_render_null_is_empty() {
        let col = ColumnDefinition::new("AMOUNT", LogicalType::Decimal);
        let source = single_value_source(col.clone(), "");
        assert_eq!(col.render(&source).unwrap(), "");
    }

    #[test]
    fn test_render_string_escapes_backslash_and_cr() {
        let col = ColumnDefinition::new("NOTE", LogicalType::String);
        assert_eq!(
            col.format_value(&CellValue::Text("a\\b\rc".into())).unwrap(),
            "a<%gwrebkslsh%>b\nc"
        );
        // Parsing a canonical string restores the backslash.
        assert_eq!(
            col.parse("a<%gwrebkslsh%>b").unwrap(),
            CellValue::Text("a\\b".into())
        );
    }

    #[test]
    fn test_render_boolean_as_bit() {
        let col = ColumnDefinition::new("ACTIVE", LogicalType::Boolean);
        let source = single_value_source(col.clone(), "true");
        assert_eq!(col.render(&source).unwrap(), "1");
        let source = single_value_source(col.clone(), "0");
        assert_eq!(col.render(&source).unwrap(), "0");
    }

    #[test]
    fn test_datetime_round_trip_canonical() {
        let col = ColumnDefinition::new("UPDATED", LogicalType::DateTime);
        let parsed = col.parse("20210315 13:45:10.250+0000").unwrap();
        let expected = NaiveDate::from_ymd_opt(2021, 3, 15)
            .unwrap()
            .and_hms_milli_opt(13, 45, 10, 250)
            .unwrap();
        assert_eq!(parsed, CellValue::DateTime(expected));
        assert_eq!(col.format_value(&parsed).unwrap(), "20210315 13:45:10.250+0000");
    }

    #[test]
    fn test_datetime_fallback_formats() {
        let col = ColumnDefinition::new("UPDATED", LogicalType::DateTime);
        let midnight = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_time(NaiveTime::default());
        assert_eq!(col.parse("2020-01-02").unwrap(), CellValue::DateTime(midnight));
        assert_eq!(
            col.parse("02Jan2020:00:00:00").unwrap(),
            CellValue::DateTime(midnight)
        );
        assert_eq!(
            col.parse("01/02/2020 00:00:00.000").unwrap(),
            CellValue::DateTime(midnight)
        );
    }

    #[test]
    fn test_datetime_last_successful_layout_wins() {
        // "yyyy-MM-dd" matches the prefix, but the later full layout also
        // matches and is the one that counts.
        let col = ColumnDefinition::new("UPDATED", LogicalType::DateTime);
        let parsed = col.parse("2020-01-02 10:11:12.000").unwrap();
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(10, 11, 12)
            .unwrap();
        assert_eq!(parsed, CellValue::DateTime(expected));
    }

    #[test]
    fn test_datetime_reports_failure_when_nothing_parses() {
        let col = ColumnDefinition::new("UPDATED", LogicalType::DateTime);
        match col.parse("not a date") {
            Err(MoverError::ValueParse { column, .. }) => assert_eq!(column, "UPDATED"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_custom_date_pattern() {
        let col = ColumnDefinition::new("BORN", LogicalType::Date).with_format("%d.%m.%Y");
        let parsed = col.parse("31.12.1999").unwrap();
        assert_eq!(
            parsed,
            CellValue::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())
        );
        assert_eq!(col.format_value(&parsed).unwrap(), "31.12.1999");
    }

    #[test]
    fn test_integer_parse_error_is_typed() {
        let col = ColumnDefinition::new("QTY", LogicalType::Integer);
        assert!(matches!(col.parse("12x"), Err(MoverError::ValueParse { .. })));
        assert_eq!(col.parse("  ").unwrap(), CellValue::Null);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let col = ColumnDefinition::new("BORN", LogicalType::Date).with_format("%Y%m%d");
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["name"], "BORN");
        assert_eq!(json["type"], "DATE");
        assert_eq!(json["formatString"], "%Y%m%d");
        let back: ColumnDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, col);
    }
}
