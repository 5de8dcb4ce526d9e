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

//! # Upload Port
//!
//! This Port defines the contract for talking to the collection server.
//!
//! The port knows nothing about batches or acknowledgments: it posts one
//! form field to the endpoint of a command and hands back the raw status and
//! body. Interpreting the answer is the Upload Client's job, which keeps the
//! protocol rules testable without a network.

use crate::domain::errors::Result;
use std::fmt;

/// Numeric commands understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadCommand {
    QueryResult,
    QuerySummary,
    InitialCsv,
    InitialCsvSummary,
    CustomerCsv,
    CustomerCsvSummary,
    FileDefinition,
}

impl UploadCommand {
    pub fn code(&self) -> u32 {
        match self {
            UploadCommand::QueryResult => 1,
            UploadCommand::QuerySummary => 2,
            UploadCommand::InitialCsv => 3,
            UploadCommand::InitialCsvSummary => 6,
            UploadCommand::CustomerCsv => 12,
            UploadCommand::CustomerCsvSummary => 13,
            UploadCommand::FileDefinition => 14,
        }
    }

    /// Path relative to the server URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            UploadCommand::QueryResult
            | UploadCommand::QuerySummary
            | UploadCommand::InitialCsv
            | UploadCommand::InitialCsvSummary => "/upload.htm",
            UploadCommand::CustomerCsv | UploadCommand::CustomerCsvSummary => {
                "/upload/submitCSVFileUpload.htm"
            }
            UploadCommand::FileDefinition => "/admin/submitCSVFileDef.htm",
        }
    }

    /// The command that carries the summary for this kind of upload.
    pub fn summary_command(&self) -> Option<UploadCommand> {
        match self {
            UploadCommand::QueryResult => Some(UploadCommand::QuerySummary),
            UploadCommand::InitialCsv => Some(UploadCommand::InitialCsvSummary),
            UploadCommand::CustomerCsv => Some(UploadCommand::CustomerCsvSummary),
            _ => None,
        }
    }
}

impl fmt::Display for UploadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// One POST to the server. `payload` goes into the `results` form field as is.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub command: UploadCommand,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl UploadResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// `UploadPort` is the transport seam.
///
/// `Err` means the request never produced an HTTP answer. Any answer, good or
/// bad, comes back as an `UploadResponse`.
pub trait UploadPort: Send + Sync {
    fn post(&self, request: &UploadRequest) -> Result<UploadResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        assert_eq!(UploadCommand::QueryResult.code(), 1);
        assert_eq!(UploadCommand::InitialCsvSummary.code(), 6);
        assert_eq!(UploadCommand::CustomerCsv.endpoint(), "/upload/submitCSVFileUpload.htm");
        assert_eq!(UploadCommand::FileDefinition.endpoint(), "/admin/submitCSVFileDef.htm");
        assert_eq!(
            UploadCommand::CustomerCsv.summary_command(),
            Some(UploadCommand::CustomerCsvSummary)
        );
    }
}
