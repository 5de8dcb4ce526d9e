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

//! Side artifact for rows that could not be used.
//!
//! The file is only created when the first bad row shows up, so a clean
//! input never leaves an empty `.bad` file behind.

use crate::domain::errors::Result;
use csv::{Writer, WriterBuilder};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const QUARANTINE_SUFFIX: &str = ".bad";

/// `data.csv` -> `data.csv.bad`
pub fn quarantine_path_for(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(QUARANTINE_SUFFIX);
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct QuarantineWriter {
    path: PathBuf,
    header: Vec<String>,
    writer: Option<Writer<File>>,
    rows_written: u64,
}

impl QuarantineWriter {
    pub fn new(path: impl Into<PathBuf>, header: Vec<String>) -> Self {
        Self {
            path: path.into(),
            header,
            writer: None,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Appends one raw row, creating the file and its header on first use.
    pub fn write<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if self.writer.is_none() {
            info!("Writing rejected rows to {}", self.path.display());
            // Rejected rows are often the wrong width.
            let mut writer = WriterBuilder::new().flexible(true).from_path(&self.path)?;
            writer.write_record(&self.header)?;
            self.writer = Some(writer);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_record(record)?;
            self.rows_written += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for QuarantineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::{ByteRecord, StringRecord};
    use tempfile::tempdir;

    #[test]
    fn test_lazy_creation_and_header() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("policies.csv");
        let path = quarantine_path_for(&input);
        assert!(path.to_string_lossy().ends_with("policies.csv.bad"));

        let mut q = QuarantineWriter::new(&path, vec!["PolicyNumber".into(), "Premium".into()]);
        q.flush().unwrap();
        assert!(!path.exists());

        q.write(&StringRecord::from(vec!["P-1", "10", "extra"])).unwrap();
        q.write(&StringRecord::from(vec!["P-2, Inc", "5"])).unwrap();
        q.write(&ByteRecord::from(vec![&b"P-3"[..], &b"caf\xe9"[..]])).unwrap();
        q.flush().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(
            bytes,
            b"PolicyNumber,Premium\nP-1,10,extra\n\"P-2, Inc\",5\nP-3,caf\xe9\n".to_vec()
        );
        assert_eq!(q.rows_written(), 3);
    }
}
