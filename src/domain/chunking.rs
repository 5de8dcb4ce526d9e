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

//! # Date-Range Chunking
//!
//! Large historical tables are not read in one query. Instead we walk
//! backwards from "now" in date windows over a timestamp column:
//!
//! ```text
//!   [now, open)  [now-30d, now)  [now-60d, now-30d) ...  (open, earliest)
//! ```
//!
//! The step is kept as a signed day offset. When a window comes back empty
//! the step is adjusted with `step = step - (1 - trunc(0.1 * step))`, which
//! for a negative step reaches further back on every consecutive empty
//! window (-30, -34, -38, -42, -47, ...). Any window that returns rows
//! resets the step to the configured default. Once the window's upper bound
//! passes the earliest known date, one last open-ended window picks up
//! anything older and the walk ends.

use chrono::{Duration, NaiveDateTime};

/// One `[earlier, later)` window. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub earlier: Option<NaiveDateTime>,
    pub later: Option<NaiveDateTime>,
}

/// The step after an empty window.
pub fn next_step_after_empty(step_days: i64) -> i64 {
    step_days - (1 - (0.1 * step_days as f64) as i64)
}

/// Plans the sequence of windows, one at a time, from the row counts the
/// caller reports back.
#[derive(Debug)]
pub struct ChunkPlanner {
    default_step: i64,
    step_days: i64,
    earlier: Option<NaiveDateTime>,
    later: Option<NaiveDateTime>,
    earliest: NaiveDateTime,
    finished: bool,
    chunks: u32,
}

impl ChunkPlanner {
    /// `days_per_chunk` is floored at one day so the walk always moves.
    pub fn new(now: NaiveDateTime, days_per_chunk: i64, earliest: NaiveDateTime) -> Self {
        let default_step = -days_per_chunk.max(1);
        Self {
            default_step,
            step_days: default_step,
            earlier: Some(now),
            later: None,
            earliest,
            finished: false,
            chunks: 0,
        }
    }

    /// The next window to run, or `None` when the walk is complete.
    pub fn next_window(&mut self) -> Option<ChunkWindow> {
        if self.finished {
            return None;
        }
        if let Some(later) = self.later {
            if later < self.earliest {
                self.finished = true;
                self.earlier = None;
            }
        }
        Some(ChunkWindow {
            earlier: self.earlier,
            later: self.later,
        })
    }

    /// Reports how many rows the window returned by the last `next_window` had.
    pub fn record_rows(&mut self, rows: u64) {
        if rows == 0 {
            self.step_days = next_step_after_empty(self.step_days);
        } else {
            self.step_days = self.default_step;
        }
        if let Some(earlier) = self.earlier {
            self.later = Some(earlier);
            self.earlier = Some(earlier + Duration::days(self.step_days));
        }
        self.chunks += 1;
    }

    pub fn step_days(&self) -> i64 {
        self.step_days
    }

    pub fn chunks(&self) -> u32 {
        self.chunks
    }
}
