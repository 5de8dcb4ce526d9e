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

//! # Runner
//!
//! The outermost layer. It wires the adapters together and drives one run:
//! 1. **Retry**: the whole run is attempted up to `upload.retries` times, with
//!    the wait multiplied after every failure. Only transient faults
//!    (network, server 5xx, database) are retried.
//! 2. **Plan**: queries first, then generated files, then customer files,
//!    each kind closed by a summary.
//! 3. **Modes**: besides uploading, a run can just validate the customer
//!    files or write the queries to generated files.

use crate::application::extract_writer::{write_query, ExtractContext};
use crate::application::upload_client::{validate_file, UploadClient, UploadSettings, ValidationReport};
use crate::config::{AppConfig, FileJob, GeneratedFileJob, UploadConfig};
use crate::domain::errors::{MoverError, Result};
use crate::domain::session::{SendOutcome, UploadSession};
use crate::infrastructure::files::customer_file_source::CustomerFileSource;
use crate::infrastructure::files::generated_file_source::GeneratedFileSource;
use crate::infrastructure::http::http_upload_adapter::HttpUploadAdapter;
use crate::infrastructure::oracle::connection_manager::{build_pool, OracleConnectionManager};
use crate::infrastructure::oracle::oracle_query_adapter::OracleQueryAdapter;
use crate::ports::query_port::QueryPort;
use crate::ports::upload_port::{UploadCommand, UploadPort};
use chrono::{Local, Utc};
use log::{error, info, warn};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Upload,
    /// Read the customer files and report bad rows; nothing is sent.
    ValidateOnly,
    /// Write each query to `<dir>/<name>.csv` in the generated format.
    ExtractTo(PathBuf),
}

/// What one run did, per dataset.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, SendOutcome)>,
    pub validations: Vec<(String, ValidationReport)>,
    pub extracted: Vec<(String, u64)>,
    pub total_rows_sent: u64,
    pub server_accepting_data: bool,
}

/// Bounded retry with multiplicative backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub multiplier: u32,
    /// No attempt starts after this instant.
    pub deadline: Option<Instant>,
}

impl RetryPolicy {
    pub fn from_config(upload: &UploadConfig, started: Instant) -> Self {
        Self {
            attempts: upload.retries.max(1),
            interval: Duration::from_secs(upload.retry_interval_secs),
            multiplier: upload.retry_multiplier.max(1),
            deadline: upload
                .max_run_time_secs
                .map(|s| started + Duration::from_secs(s)),
        }
    }

    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut wait = self.interval;
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    if let Some(deadline) = self.deadline {
                        if Instant::now() + wait > deadline {
                            warn!("Not retrying: the next attempt would start past the max run time");
                            return Err(e);
                        }
                    }
                    warn!(
                        "Attempt {} of {} failed: {}.  Retrying in {} seconds",
                        attempt,
                        self.attempts,
                        e,
                        wait.as_secs()
                    );
                    thread::sleep(wait);
                    wait *= self.multiplier;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Runs `config` in `mode`, retrying transient failures.
pub fn run(config: &AppConfig, mode: &RunMode) -> Result<RunReport> {
    let started = Instant::now();
    let policy = RetryPolicy::from_config(&config.upload, started);
    policy.run(|attempt| {
        info!("Starting run, attempt {}", attempt);
        match mode {
            RunMode::Upload => {
                let transport = HttpUploadAdapter::new(&config.server)?;
                with_database(config, |db| execute_plan(config, &transport, db, started))
            }
            RunMode::ValidateOnly => validate_files(config),
            RunMode::ExtractTo(dir) => with_database(config, |db| {
                let db = db.ok_or_else(|| {
                    MoverError::ConfigError("Extracting requires a database section".to_string())
                })?;
                extract_queries(config, db, dir)
            }),
        }
    })
}

/// Opens the database only when there are queries to run.
fn with_database<T, F>(config: &AppConfig, f: F) -> Result<T>
where
    F: FnOnce(Option<&dyn QueryPort>) -> Result<T>,
{
    match &config.database {
        Some(db) if !config.queries.is_empty() => {
            info!("Connecting to {}", db.connect_string());
            let pool = build_pool(OracleConnectionManager::from_config(db)?)?;
            let adapter = OracleQueryAdapter::connect(&pool)?;
            f(Some(&adapter))
        }
        _ => f(None),
    }
}

/// Sends every query, then every file, through `upload`. The time limit runs
/// from `started`, which stays fixed across retried attempts.
pub fn execute_plan(
    config: &AppConfig,
    upload: &dyn UploadPort,
    db: Option<&dyn QueryPort>,
    started: Instant,
) -> Result<RunReport> {
    let settings = UploadSettings::from_config(&config.upload, &config.server);
    let session = UploadSession::new(config.upload.username.clone(), Utc::now().timestamp_millis());
    let mut client = UploadClient::new(upload, settings, session, started);
    let mut report = RunReport::default();

    if !config.queries.is_empty() {
        let db = db.ok_or_else(|| {
            MoverError::ConfigError("Queries are configured but there is no database".to_string())
        })?;
        let now = Local::now().naive_local();
        for query in &config.queries {
            let outcome = skip_bad_source(&query.name, client.send_query(db, query, now))?;
            info!("Query {} finished: {:?}", query.name, outcome);
            report.outcomes.push((query.name.clone(), outcome));
        }
        client.send_summary(UploadCommand::QueryResult);
    }

    if !config.generated_files.is_empty() {
        for job in &config.generated_files {
            let outcome = skip_bad_source(&job.name, send_generated_file(&mut client, job))?;
            info!("File {} finished: {:?}", job.path, outcome);
            report.outcomes.push((job.name.clone(), outcome));
        }
        client.send_summary(UploadCommand::InitialCsv);
    }

    if !config.files.is_empty() {
        for job in &config.files {
            let name = job.schema.table_name.clone();
            let outcome = skip_bad_source(&name, send_file(&mut client, job))?;
            info!("File {} finished: {:?}", job.path, outcome);
            report.outcomes.push((name, outcome));
        }
        client.send_summary(UploadCommand::CustomerCsv);
    }

    report.total_rows_sent = client.session().total_rows_sent();
    report.server_accepting_data = client.session().server_accepting_data();
    info!("Run finished: {} rows sent", report.total_rows_sent);
    Ok(report)
}

/// A broken source is reported and the run moves on.
fn skip_bad_source(name: &str, result: Result<SendOutcome>) -> Result<SendOutcome> {
    match result {
        Err(e) if e.is_source_level() => {
            error!("Giving up on {}: {}", name, e);
            Ok(SendOutcome::Incomplete)
        }
        other => other,
    }
}

fn send_generated_file(client: &mut UploadClient<'_>, job: &GeneratedFileJob) -> Result<SendOutcome> {
    let mut source = GeneratedFileSource::open(job.name.as_str(), &job.path)?;
    client.send_source(&mut source, UploadCommand::InitialCsv, None, true)
}

fn send_file(client: &mut UploadClient<'_>, job: &FileJob) -> Result<SendOutcome> {
    let schema = job.effective_schema()?;
    let mut source = CustomerFileSource::open(&job.path, &schema)?;
    let outcome = client.send_source(&mut source, UploadCommand::CustomerCsv, None, true)?;
    if source.rows_quarantined() > 0 {
        warn!(
            "{} rows of {} were written to the bad file",
            source.rows_quarantined(),
            job.path
        );
    }
    Ok(outcome)
}

fn validate_files(config: &AppConfig) -> Result<RunReport> {
    let settings = UploadSettings::from_config(&config.upload, &config.server);
    let mut report = RunReport {
        server_accepting_data: true,
        ..Default::default()
    };
    for job in &config.files {
        let name = job.schema.table_name.clone();
        let schema = job.effective_schema()?;
        let validation = match CustomerFileSource::open(&job.path, &schema) {
            Ok(mut source) => {
                let mut validation = validate_file(&settings, &mut source)?;
                // Shape failures never reach the builder.
                validation.bad_rows = validation.bad_rows.max(source.rows_quarantined());
                validation
            }
            Err(e) if e.is_source_level() => {
                error!("{} cannot be read: {}", job.path, e);
                ValidationReport::default()
            }
            Err(e) => return Err(e),
        };
        info!(
            "{}: {} good rows, {} bad rows",
            job.path, validation.good_rows, validation.bad_rows
        );
        report.validations.push((name, validation));
    }
    Ok(report)
}

fn extract_queries(config: &AppConfig, db: &dyn QueryPort, dir: &Path) -> Result<RunReport> {
    fs::create_dir_all(dir)?;
    let context = ExtractContext {
        db_name: config
            .database
            .as_ref()
            .map(|d| d.service.clone())
            .unwrap_or_default(),
        customer_code: config.server.client.clone().unwrap_or_default(),
    };
    let mut report = RunReport::default();
    for query in &config.queries {
        let path = dir.join(format!("{}.csv", query.name));
        info!("Writing {} to {}", query.name, path.display());
        let rows = write_query(db, query, BufWriter::new(File::create(&path)?), &context)?;
        report.extracted.push((query.name.clone(), rows));
    }
    Ok(report)
}
