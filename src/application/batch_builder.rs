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

//! # Batch Builder
//!
//! Drains a `RowSource` into bounded `Batch`es.
//!
//! Each call to `build` reads rows until either the batch holds `cap` rows
//! (the batch is marked truncated and the source stays open for the next
//! call) or the source runs dry (the source is closed and the batch gets the
//! checksum and run duration).
//!
//! Rows whose columns fail to render are reported, quarantined and left out.
//! A source-wide error budget stops runaway files.

use crate::domain::batch::Batch;
use crate::domain::errors::{MoverError, Result};
use crate::ports::row_source::RowSource;
use log::{debug, error};

const PARTIAL_VALUE_LEN: usize = 20;

/// Builds consecutive batches from one source. Keep one builder per source
/// so the error budget covers the whole source.
#[derive(Debug)]
pub struct BatchBuilder {
    cap: usize,
    max_error_rows: u64,
    failed_rows: u64,
}

impl BatchBuilder {
    pub fn new(cap: usize, max_error_rows: u64) -> Self {
        Self {
            cap: cap.max(1),
            max_error_rows,
            failed_rows: 0,
        }
    }

    /// Rows rejected so far because a column failed to render.
    pub fn failed_rows(&self) -> u64 {
        self.failed_rows
    }

    /// Reads the next batch from `source`.
    ///
    /// `checksum` is the precomputed checksum of the whole source; it only
    /// ends up on the batch that exhausts the source.
    pub fn build(
        &mut self,
        source: &mut dyn RowSource,
        checksum: Option<i64>,
        lake_only: bool,
    ) -> Result<Batch> {
        let mut batch = Batch::new(source.name(), source.columns().to_vec(), lake_only);

        while source.next()? {
            if !source.row_successfully_read() {
                debug!("Skipping row [{}] of {}", source.current_row_ordinal(), source.name());
                continue;
            }

            let mut values = Vec::with_capacity(batch.columns().len());
            let mut failures = Vec::new();
            for column in batch.columns() {
                match column.render(&*source) {
                    Ok(v) => values.push(v),
                    Err(e) => failures.push(format!(", column [{}], error is [{}]", column.name, e)),
                }
            }

            if failures.is_empty() {
                batch.push_row(values);
            } else {
                self.reject_row(source, &values, &failures)?;
                continue;
            }

            if batch.success_count() >= self.cap {
                batch.mark_truncated();
                return Ok(batch);
            }
        }

        source.close()?;
        batch.attach_checksum(checksum);
        batch.set_source_run_duration_ms(source.run_duration_ms());
        Ok(batch)
    }

    fn reject_row(
        &mut self,
        source: &mut dyn RowSource,
        partial: &[String],
        failures: &[String],
    ) -> Result<()> {
        let partial: Vec<String> = partial
            .iter()
            .map(|v| v.chars().take(PARTIAL_VALUE_LEN).collect())
            .collect();
        error!(
            "Error handling data source row [{}] with data [{}] {}",
            source.current_row_ordinal(),
            partial.join(", "),
            failures.concat()
        );
        source.quarantine_current_row()?;

        self.failed_rows += 1;
        if self.failed_rows > self.max_error_rows {
            return Err(MoverError::TooManyRowErrors {
                name: source.name().to_string(),
                count: self.failed_rows,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::column::{ColumnDefinition, LogicalType};
    use crate::infrastructure::memory_source::MemoryRowSource;

    fn cols() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("ID", LogicalType::Integer),
            ColumnDefinition::new("AMOUNT", LogicalType::Decimal),
        ]
    }

    fn source(rows: usize) -> MemoryRowSource {
        let mut source = MemoryRowSource::new("claims", cols()).with_run_duration_ms(42);
        for i in 0..rows {
            let id = (i + 1).to_string();
            source = source.with_row(&[id.as_str(), "1.5"]);
        }
        source
    }

    #[test]
    fn test_caps_and_truncates_without_closing() {
        let mut source = source(5);
        let mut builder = BatchBuilder::new(2, 100);

        let first = builder.build(&mut source, Some(7), true).unwrap();
        assert_eq!(first.success_count(), 2);
        assert_eq!(first.rows().len(), first.success_count());
        assert!(first.was_truncated());
        assert_eq!(first.checksum(), None);
        assert!(!source.is_closed());

        builder.build(&mut source, Some(7), true).unwrap();
        let last = builder.build(&mut source, Some(7), true).unwrap();
        assert_eq!(last.success_count(), 1);
        assert!(!last.was_truncated());
        assert_eq!(last.checksum(), Some(7));
        assert_eq!(last.source_run_duration_ms(), Some(42));
        assert!(source.is_closed());
    }

    #[test]
    fn test_rows_rendered_in_column_order() {
        let mut source = source(1);
        let batch = BatchBuilder::new(10, 100).build(&mut source, None, false).unwrap();
        assert_eq!(batch.rows()[0].results, vec!["1", "1.5"]);
        assert!(!batch.lake_only());
    }

    #[test]
    fn test_unclean_rows_are_skipped() {
        let mut source = source(3).with_unclean_row(2);
        let batch = BatchBuilder::new(10, 100).build(&mut source, None, true).unwrap();
        assert_eq!(batch.success_count(), 2);
        assert!(source.quarantined().is_empty());
    }

    #[test]
    fn test_render_failures_are_quarantined() {
        let mut source = MemoryRowSource::new("claims", cols())
            .with_row(&["1", "1.5"])
            .with_row(&["two", "1.5"])
            .with_row(&["3", "abc"]);
        let mut builder = BatchBuilder::new(10, 100);
        let batch = builder.build(&mut source, None, true).unwrap();
        assert_eq!(batch.success_count(), 1);
        assert_eq!(source.quarantined(), &[2, 3]);
        assert_eq!(builder.failed_rows(), 2);
    }

    #[test]
    fn test_error_budget() {
        let mut source = MemoryRowSource::new("claims", cols())
            .with_row(&["x", "1"])
            .with_row(&["y", "1"])
            .with_row(&["z", "1"]);
        let result = BatchBuilder::new(10, 1).build(&mut source, None, true);
        match result {
            Err(MoverError::TooManyRowErrors { name, count }) => {
                assert_eq!(name, "claims");
                assert_eq!(count, 2);
            }
            other => panic!("expected TooManyRowErrors, got {:?}", other.map(|b| b.success_count())),
        }
    }

    #[test]
    fn test_exact_cap_leaves_empty_final_batch() {
        let mut source = source(2);
        let mut builder = BatchBuilder::new(2, 100);
        assert!(builder.build(&mut source, Some(1), true).unwrap().was_truncated());
        let tail = builder.build(&mut source, Some(1), true).unwrap();
        assert!(tail.is_empty());
        assert!(!tail.was_truncated());
        assert_eq!(tail.checksum(), Some(1));
    }
}
