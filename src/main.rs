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

use clap::Parser;
use log::{error, info};
use oracle_row_mover::application::runner::{self, RunMode};
use oracle_row_mover::config::{AppConfig, CliArgs};
use std::path::PathBuf;
use std::process;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = match AppConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let mode = if args.validate_only {
        RunMode::ValidateOnly
    } else if let Some(dir) = &args.extract_to {
        RunMode::ExtractTo(PathBuf::from(dir))
    } else {
        RunMode::Upload
    };

    // 4. Run
    info!("Starting {:?} run...", mode);
    match runner::run(&config, &mode) {
        Ok(report) => {
            for (name, outcome) in &report.outcomes {
                info!("{}: {:?}", name, outcome);
            }
            for (name, v) in &report.validations {
                info!("{}: {} good rows, {} bad rows", name, v.good_rows, v.bad_rows);
            }
            for (name, rows) in &report.extracted {
                info!("{}: {} rows written", name, rows);
            }
            info!("Run finished. {} rows sent.", report.total_rows_sent);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            process::exit(1);
        }
    }
}
