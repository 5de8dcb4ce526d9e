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

use crate::domain::errors::{MoverError, Result};
use crate::domain::file_schema::FileSchema;
use crate::domain::query::QueryDefinition;
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;

pub const DEFAULT_DISABLED_MESSAGE: &str =
    "The server is temporarily not accepting data.  Please try again later.";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
    /// Files written earlier by `--extract-to`, uploaded as is.
    #[serde(default)]
    pub generated_files: Vec<GeneratedFileJob>,
    #[serde(default)]
    pub files: Vec<FileJob>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub service: String,
    /// Full connect descriptor; wins over host/port/service.
    pub connection_string: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub url: String,
    /// Sent as the `client` query parameter.
    pub client: Option<String>,
    pub auth_token: Option<String>,
    #[serde(default = "default_disabled_message")]
    pub disabled_message: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub max_iterations: u32,
    pub max_error_rows: u64,
    /// Wall-clock limit for the whole run. None means unlimited.
    pub max_run_time_secs: Option<u64>,
    pub retries: u32,
    pub retry_interval_secs: u64,
    pub retry_multiplier: u32,
    /// Name reported in the upload summary.
    pub username: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratedFileJob {
    pub name: String,
    pub path: String,
}

/// One customer-supplied file and the schema it must follow.
#[derive(Debug, Deserialize, Clone)]
pub struct FileJob {
    pub path: String,
    pub schema: FileSchema,
    /// Customer-specific overrides composed onto `schema`.
    pub overrides: Option<FileSchema>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_attempts: 1000,
            max_iterations: 1000,
            max_error_rows: 10_000,
            max_run_time_secs: None,
            retries: 3,
            retry_interval_secs: 30,
            retry_multiplier: 2,
            username: "row_mover".to_string(),
        }
    }
}

fn default_port() -> u16 {
    1521
}

fn default_disabled_message() -> String {
    DEFAULT_DISABLED_MESSAGE.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl ServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            auth_token: None,
            disabled_message: default_disabled_message(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_string(&self) -> String {
        match &self.connection_string {
            Some(c) => c.clone(),
            None => format!("//{}:{}/{}", self.host, self.port, self.service),
        }
    }

    /// The YAML password, falling back to the `ORACLE_PASSWORD` environment variable.
    pub fn resolved_password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var("ORACLE_PASSWORD").ok())
    }
}

impl FileJob {
    /// The schema this file is validated against, overrides applied.
    pub fn effective_schema(&self) -> Result<FileSchema> {
        match &self.overrides {
            Some(o) => o.apply_to(&self.schema),
            None => Ok(self.schema.clone()),
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: String,

    // Overrides for ad-hoc runs
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub service: Option<String>,
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub max_run_time_secs: Option<u64>,
    /// Only run the named queries/files
    #[arg(long)]
    pub only: Vec<String>,
    /// Check customer files and report bad rows without uploading anything
    #[arg(long)]
    pub validate_only: bool,
    /// Write each query to `<dir>/<name>.csv` instead of uploading
    #[arg(long)]
    pub extract_to: Option<String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| MoverError::ConfigError(format!("{}: {}", path, e)))?
        };

        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(db) = self.database.as_mut() {
            if let Some(u) = &args.username { db.username = u.clone(); }
            if let Some(p) = &args.password { db.password = Some(p.clone()); }
            if let Some(h) = &args.host { db.host = h.clone(); }
            if let Some(s) = &args.service { db.service = s.clone(); }
        }
        if let Some(url) = &args.server_url { self.server.url = url.clone(); }
        if let Some(c) = &args.client { self.server.client = Some(c.clone()); }
        if let Some(b) = args.batch_size { self.upload.batch_size = b; }
        if let Some(t) = args.max_run_time_secs { self.upload.max_run_time_secs = Some(t); }
        if !args.only.is_empty() {
            self.queries.retain(|q| args.only.contains(&q.name));
            self.generated_files.retain(|g| args.only.contains(&g.name));
            self.files.retain(|f| args.only.contains(&f.schema.table_name));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload.batch_size == 0 {
            return Err(MoverError::ConfigError("upload.batch_size must be at least 1".into()));
        }
        if self.upload.max_attempts == 0 || self.upload.max_iterations == 0 {
            return Err(MoverError::ConfigError(
                "upload.max_attempts and upload.max_iterations must be at least 1".into(),
            ));
        }
        if self.queries.is_empty() && self.files.is_empty() && self.generated_files.is_empty() {
            return Err(MoverError::ConfigError("Nothing to do: no queries and no files configured".into()));
        }
        if !self.queries.is_empty() && self.database.is_none() {
            return Err(MoverError::ConfigError("Queries are configured but there is no database section".into()));
        }
        for q in &self.queries {
            if let Some(chunk) = &q.chunk {
                if chunk.days_per_chunk < 1 {
                    return Err(MoverError::ConfigError(format!(
                        "Query {}: chunk.days_per_chunk must be at least 1",
                        q.name
                    )));
                }
            }
        }
        for f in &self.files {
            f.schema.check_unique_names()?;
            f.effective_schema()?;
        }
        Ok(())
    }
}
