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

//! Core error definitions for the Row Mover.
//!
//! This module provides a centralized `MoverError` enum and a `Result` type
//! used throughout the application. Errors fall into three tiers:
//! 1. **Row-level**: a value cannot be rendered or parsed. Always recoverable,
//!    the row is quarantined and the file keeps going.
//! 2. **Source-level**: a header does not validate, a source cannot be read,
//!    or too many rows failed. Reading that one source stops.
//! 3. **Run-level**: network, server, database and configuration faults.
//!    Only these are ever retried, and only by the outermost runner.

use thiserror::Error;

/// Error types encountered while extracting and uploading rows.
#[derive(Error, Debug)]
pub enum MoverError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Null value found for required field {column} of type {logical_type}")]
    RequiredValueMissing { column: String, logical_type: String },

    #[error("Unable to parse [{value}] for column {column}: {reason}")]
    ValueParse {
        column: String,
        value: String,
        reason: String,
    },

    #[error("Column {0} is not available")]
    ColumnNotAvailable(String),

    #[error("Header validation failed for {table}: {reason}")]
    HeaderValidation { table: String, reason: String },

    #[error("Read failed for {name} at row {row}: {reason}")]
    SourceError {
        name: String,
        row: u64,
        reason: String,
    },

    #[error("Too many errors in {name}: {count} rows failed")]
    TooManyRowErrors { name: String, count: u64 },

    #[error("Error uploading data.  TotalRowsSent was the same value for two sends [{total_rows_sent}]")]
    StuckUpload { total_rows_sent: u64 },

    #[error("Received server error code: {status} {reason}")]
    ServerError { status: u16, reason: String },

    #[error("Error sending data to server: {0}")]
    TransportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("CSV error: {0}")]
    CsvError(String),
}

impl MoverError {
    /// Whether the outermost runner may try the whole run again.
    ///
    /// Data problems (tiers 1 and 2), configuration mistakes and a stuck
    /// upload are deterministic, so waiting would not change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            MoverError::TransportError(_) | MoverError::OracleError(_) => true,
            MoverError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors that end one source but leave the rest of the run intact.
    pub fn is_source_level(&self) -> bool {
        matches!(
            self,
            MoverError::HeaderValidation { .. }
                | MoverError::SourceError { .. }
                | MoverError::TooManyRowErrors { .. }
        )
    }
}

impl From<oracle::Error> for MoverError {
    fn from(e: oracle::Error) -> Self {
        MoverError::OracleError(e.to_string())
    }
}

impl From<csv::Error> for MoverError {
    fn from(e: csv::Error) -> Self {
        MoverError::CsvError(e.to_string())
    }
}

impl From<serde_json::Error> for MoverError {
    fn from(e: serde_json::Error) -> Self {
        MoverError::SerializationError(e.to_string())
    }
}

impl From<reqwest::Error> for MoverError {
    fn from(e: reqwest::Error) -> Self {
        MoverError::TransportError(e.to_string())
    }
}

/// A specialized Result type for the Row Mover.
pub type Result<T> = std::result::Result<T, MoverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_tiers() {
        assert!(MoverError::TransportError("reset".into()).is_retryable());
        assert!(MoverError::ServerError { status: 502, reason: "Bad Gateway".into() }.is_retryable());
        assert!(!MoverError::ServerError { status: 400, reason: "Bad Request".into() }.is_retryable());
        assert!(!MoverError::StuckUpload { total_rows_sent: 10 }.is_retryable());
        assert!(!MoverError::ConfigError("bad".into()).is_retryable());
        assert!(!MoverError::TooManyRowErrors { name: "t".into(), count: 3 }.is_retryable());
    }

    #[test]
    fn test_source_level_errors() {
        assert!(MoverError::HeaderValidation { table: "t".into(), reason: "x".into() }.is_source_level());
        assert!(MoverError::TooManyRowErrors { name: "t".into(), count: 3 }.is_source_level());
        assert!(!MoverError::StuckUpload { total_rows_sent: 1 }.is_source_level());
        assert!(!MoverError::TransportError("reset".into()).is_source_level());
    }

    #[test]
    fn test_required_message() {
        let e = MoverError::RequiredValueMissing {
            column: "PolicyNumber".into(),
            logical_type: "STRING".into(),
        };
        assert_eq!(
            e.to_string(),
            "Null value found for required field PolicyNumber of type STRING"
        );
    }
}
