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

//! # Customer File Source
//!
//! Reads delimited files supplied by customers. Unlike generated files these
//! are expected to be dirty, so the source works hard to keep going:
//!
//! 1. The header row is resolved against a `FileSchema` (aliases, any order).
//!    If that fails no data row is read at all.
//! 2. A row with the wrong number of fields is logged with a diagnostic,
//!    written to the `.bad` file and skipped. The Batch Builder never sees it.
//! 3. A row that has the right shape but bad values is handed on; the Batch
//!    Builder reports it and asks us to quarantine it.
//!
//! Records are read as raw bytes. Bytes that are not UTF-8 (Latin-1 exports
//! are common) are replaced when values are read, and written to the `.bad`
//! file unchanged.
//!
//! The CSV parser treats a quote that is never closed as running to the end
//! of the input. The input is watched with the same quoting rules the parser
//! uses, so when the stream ends inside a quoted field the final record is
//! known to be swallowed and the read ends there.

use crate::domain::column::{CellValue, ColumnDefinition, LogicalType};
use crate::domain::errors::{MoverError, Result};
use crate::domain::file_schema::{FileSchema, HeaderMapping};
use crate::infrastructure::files::quarantine::{quarantine_path_for, QuarantineWriter};
use crate::ports::row_source::RowSource;
use csv::{ByteRecord, Reader, ReaderBuilder, Trim};
use log::{error, info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const MAX_FIELD_DUMP_LEN: usize = 20;
const MAX_MULTILINE_DUMP_LEN: usize = 100;
const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Follows the parser's quoting state over the raw bytes. A quote only opens
/// a field at its first byte; anywhere else it is data.
struct QuoteTrackingReader<R> {
    inner: R,
    state: QuoteState,
}

impl<R> QuoteTrackingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            state: QuoteState::FieldStart,
        }
    }

    fn inside_quotes(&self) -> bool {
        self.state == QuoteState::Quoted
    }

    fn advance(&mut self, byte: u8) {
        use QuoteState::*;
        self.state = match (self.state, byte) {
            (Quoted, b'"') => QuoteInQuoted,
            (Quoted, _) => Quoted,
            (QuoteInQuoted, b'"') => Quoted,
            (FieldStart, b'"') => Quoted,
            (_, b',' | b'\n' | b'\r') => FieldStart,
            _ => Unquoted,
        };
    }
}

impl<R: Read> Read for QuoteTrackingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for byte in &buf[..n] {
            self.advance(*byte);
        }
        Ok(n)
    }
}

pub struct CustomerFileSource<R: Read = BufReader<File>> {
    name: String,
    schema: FileSchema,
    columns: Vec<ColumnDefinition>,
    mapping: HeaderMapping,
    reader: Option<Reader<QuoteTrackingReader<R>>>,
    pending: Option<ByteRecord>,
    current: Option<ByteRecord>,
    values: HashMap<String, String>,
    quarantine: Option<QuarantineWriter>,
    current_row: u64,
    exhausted: bool,
}

impl CustomerFileSource<BufReader<File>> {
    /// Opens `path` and writes rejected rows next to it as `<path>.bad`.
    pub fn open(path: impl AsRef<Path>, schema: &FileSchema) -> Result<Self> {
        let path = path.as_ref();
        info!("Verifying customer csv file [{}] exists and is readable", path.display());
        let file = File::open(path)?;
        let mut source = Self::from_reader(BufReader::new(file), schema)?;
        source.quarantine = Some(QuarantineWriter::new(
            quarantine_path_for(path),
            source.mapping.headings().to_vec(),
        ));
        Ok(source)
    }
}

impl<R: Read> CustomerFileSource<R> {
    /// Reads and resolves the header. No quarantine file is attached.
    pub fn from_reader(input: R, schema: &FileSchema) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(QuoteTrackingReader::new(input));

        let mut header = ByteRecord::new();
        if !reader.read_byte_record(&mut header)? {
            return Err(MoverError::HeaderValidation {
                table: schema.table_name.clone(),
                reason: "the file is empty".to_string(),
            });
        }
        let headings: Vec<String> = header
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .enumerate()
            .map(|(i, h)| if i == 0 { h.trim_start_matches(UTF8_BOM).trim().to_string() } else { h })
            .collect();
        let mapping = schema.resolve_header(&headings)?;

        let mut source = Self {
            name: schema.table_name.clone(),
            schema: schema.without_omitted(),
            columns: schema.output_columns(),
            mapping,
            reader: Some(reader),
            pending: None,
            current: None,
            values: HashMap::new(),
            quarantine: None,
            current_row: 0,
            exhausted: false,
        };
        source.pending = source.read_ahead()?;
        Ok(source)
    }

    pub fn rows_quarantined(&self) -> u64 {
        self.quarantine.as_ref().map_or(0, QuarantineWriter::rows_written)
    }

    /// Reads the record after the current one.
    fn read_ahead(&mut self) -> Result<Option<ByteRecord>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut record = ByteRecord::new();
        match reader.read_byte_record(&mut record) {
            Ok(true) => Ok(Some(record)),
            Ok(false) => Ok(None),
            Err(e) => Err(MoverError::SourceError {
                name: self.name.clone(),
                row: self.current_row + 1,
                reason: e.to_string(),
            }),
        }
    }

    /// The last record swallowed the rest of the file behind an open quote.
    fn is_runaway_quote(&self) -> bool {
        self.pending.is_none()
            && self
                .reader
                .as_ref()
                .is_some_and(|r| r.get_ref().inside_quotes())
    }

    fn wrong_shape_message(&self, record: &ByteRecord) -> String {
        let expected = self.mapping.field_count();
        let actual = record.len();
        let mut msg = format!(
            "Row [{}]  contains the wrong number of fields; expected: [{}] got [{}]; ",
            self.current_row, expected, actual
        );
        if actual > expected {
            msg.push_str("it may have an unquoted field containing a comma or have mismatched quotes, ");
        } else {
            msg.push_str("at least one column is missing from this record ");
        }
        if self.quarantine.is_some() {
            msg.push_str("skipping and writing to bad file ");
        }
        msg.push_str(&dump_fields(record));
        msg
    }

    fn quarantine_record(&mut self, record: &ByteRecord) -> Result<bool> {
        match self.quarantine.as_mut() {
            Some(q) => {
                q.write(record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// `[f1, f2, ...]` with long fields cut, logging any multi-line field.
fn dump_fields(record: &ByteRecord) -> String {
    let mut parts = Vec::with_capacity(record.len());
    for field in record.iter() {
        let field = String::from_utf8_lossy(field);
        if field.contains('\n') {
            error!(
                "Row may contain mismatched quotes - field contains carriage returns [{}]",
                cut(&field, MAX_MULTILINE_DUMP_LEN)
            );
        }
        parts.push(cut(&field, MAX_FIELD_DUMP_LEN));
    }
    format!("[{}]", parts.join(", "))
}

fn cut(field: &str, max: usize) -> String {
    if field.chars().count() < max {
        field.to_string()
    } else {
        let head: String = field.chars().take(max).collect();
        format!("{}...", head)
    }
}

impl<R: Read> RowSource for CustomerFileSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    fn next(&mut self) -> Result<bool> {
        self.current = None;
        self.values.clear();
        loop {
            if self.exhausted {
                return Ok(false);
            }
            let Some(record) = self.pending.take() else {
                self.exhausted = true;
                return Ok(false);
            };
            self.current_row += 1;
            self.pending = self.read_ahead()?;

            if self.is_runaway_quote() {
                error!(
                    "current row is [{}], this row has an open quote without a corresponding close quote",
                    self.current_row
                );
                self.exhausted = true;
                return Ok(false);
            }
            if record.len() != self.mapping.field_count() {
                error!("{}", self.wrong_shape_message(&record));
                self.quarantine_record(&record)?;
                continue;
            }
            if std::str::from_utf8(record.as_slice()).is_err() {
                warn!(
                    "Row [{}] is not valid UTF-8, unreadable bytes were replaced",
                    self.current_row
                );
            }
            self.values = self
                .mapping
                .project(record.iter().map(String::from_utf8_lossy));
            self.current = Some(record);
            return Ok(true);
        }
    }

    fn row_successfully_read(&self) -> bool {
        self.current.is_some()
    }

    fn current_row_ordinal(&self) -> u64 {
        self.current_row
    }

    /// Columns missing from the file read as null; the header check has
    /// already rejected files missing a Required column.
    fn value(&self, column: &str, _logical_type: LogicalType) -> Result<CellValue> {
        let file_column = self
            .schema
            .column(column)
            .ok_or_else(|| MoverError::ColumnNotAvailable(column.to_string()))?;
        file_column.parse(self.values.get(column).map(String::as_str))
    }

    fn quarantine_current_row(&mut self) -> Result<bool> {
        match self.current.take() {
            Some(record) => {
                let written = self.quarantine_record(&record)?;
                self.current = Some(record);
                Ok(written)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.pending = None;
        self.exhausted = true;
        if let Some(q) = self.quarantine.as_mut() {
            q.flush()?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}
