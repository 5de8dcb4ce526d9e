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

//! # File Schemas
//!
//! A `FileSchema` describes what an externally supplied file is expected to
//! contain: an ordered list of columns, each with a canonical name, a set of
//! aliases and a requirement status.
//!
//! Files arrive with headers written by people, so matching is forgiving:
//! "Policy Number", "policynumber" and "POLICY_NUMBER" all name the same
//! column. Forgiving is not the same as guessing though. A heading that
//! matches nothing (or more than one column) fails the whole header.

use crate::domain::column::{CellValue, ColumnDefinition};
use crate::domain::errors::{MoverError, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Whether a column must be present (and non-empty) in every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Requirement {
    #[serde(rename = "REQUIRED", alias = "Required", alias = "required")]
    Required,
    #[default]
    #[serde(
        rename = "NOTREQUIRED",
        alias = "OPTIONAL",
        alias = "Optional",
        alias = "optional"
    )]
    Optional,
    #[serde(rename = "OMITTED", alias = "Omitted", alias = "omitted")]
    Omitted,
}

/// Lower-cases and strips underscores and whitespace.
pub fn normalize_heading(heading: &str) -> String {
    heading
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One column of a file schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileColumn {
    #[serde(rename = "actualColumnDef")]
    pub column: ColumnDefinition,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(rename = "columnStatus", default)]
    pub requirement: Requirement,
}

impl FileColumn {
    pub fn new(column: ColumnDefinition, requirement: Requirement) -> Self {
        Self {
            column,
            aliases: Vec::new(),
            requirement,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }

    /// True when `heading` names this column, by canonical name or alias.
    pub fn matches(&self, heading: &str) -> bool {
        let wanted = normalize_heading(heading);
        normalize_heading(self.name()) == wanted
            || self.aliases.iter().any(|a| normalize_heading(a) == wanted)
    }

    /// Trims and validates one raw cell, then parses it.
    ///
    /// A missing or blank value is an error only for Required columns; a
    /// present value that fails to parse is a `ValueParse` error either way.
    pub fn parse(&self, raw: Option<&str>) -> Result<CellValue> {
        let trimmed = raw.map(str::trim).unwrap_or("");
        if trimmed.is_empty() {
            if self.is_required() {
                return Err(MoverError::RequiredValueMissing {
                    column: self.name().to_string(),
                    logical_type: self.column.logical_type.to_string(),
                });
            }
            return Ok(CellValue::Null);
        }
        self.column.parse(trimmed)
    }

    /// Applies this column, as a customer-specific override, to `base`.
    ///
    /// Aliases and status may change; a date pattern is carried over. A
    /// Required base column may never be relaxed.
    pub fn apply_to(&self, base: &FileColumn) -> Result<FileColumn> {
        if base.is_required() && !self.is_required() {
            return Err(MoverError::ConfigError(format!(
                "A required column cannot be changed to not required or omitted status: {}",
                base.name()
            )));
        }
        let mut merged = base.clone();
        if !self.aliases.is_empty() {
            merged.aliases = self.aliases.clone();
        }
        if base.column.logical_type.is_date_type() && self.column.format_pattern.is_some() {
            merged.column.format_pattern = self.column.format_pattern.clone();
        }
        merged.requirement = self.requirement;
        Ok(merged)
    }
}

/// What an externally supplied file for one table looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSchema {
    #[serde(rename = "name")]
    pub table_name: String,
    pub columns: Vec<FileColumn>,
}

/// The result of resolving a header row: which canonical column lives at
/// each position.
#[derive(Debug, Clone)]
pub struct HeaderMapping {
    headings: Vec<String>,
    by_index: Vec<Option<String>>,
}

impl HeaderMapping {
    /// Number of fields a well formed data row carries.
    pub fn field_count(&self) -> usize {
        self.headings.len()
    }

    /// The header cells as they appeared in the file.
    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    /// Projects one data row into canonical name -> trimmed value. Omitted
    /// columns are dropped.
    pub fn project<I, S>(&self, fields: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.by_index
            .iter()
            .zip(fields)
            .filter_map(|(name, value)| {
                name.as_ref()
                    .map(|n| (n.clone(), value.as_ref().trim().to_string()))
            })
            .collect()
    }
}

impl FileSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<FileColumn>) -> Result<Self> {
        let schema = Self {
            table_name: table_name.into(),
            columns,
        };
        schema.check_unique_names()?;
        Ok(schema)
    }

    /// Canonical names must be unique; this is checked again after
    /// deserialization since serde cannot.
    pub fn check_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name().to_string()) {
                return Err(MoverError::ConfigError(format!(
                    "Column {} is defined more than once in {}",
                    c.name(),
                    self.table_name
                )));
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&FileColumn> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// The columns a source built from this schema emits: everything except
    /// Omitted columns.
    pub fn output_columns(&self) -> Vec<ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| c.requirement != Requirement::Omitted)
            .map(|c| c.column.clone())
            .collect()
    }

    /// A copy without the Omitted columns.
    pub fn without_omitted(&self) -> FileSchema {
        FileSchema {
            table_name: self.table_name.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| c.requirement != Requirement::Omitted)
                .cloned()
                .collect(),
        }
    }

    /// Resolves a header row against this schema.
    ///
    /// Both checks always run (and log) so the operator sees every problem
    /// with a header at once, not one per attempt.
    pub fn resolve_header(&self, headings: &[String]) -> Result<HeaderMapping> {
        let mut problems = Vec::new();

        let mut unmatched = Vec::new();
        let mut duplicates = Vec::new();
        let mut resolved: Vec<Option<&FileColumn>> = Vec::with_capacity(headings.len());
        let mut seen = HashSet::new();
        for (position, heading) in headings.iter().enumerate() {
            let candidates: Vec<&FileColumn> =
                self.columns.iter().filter(|c| c.matches(heading)).collect();
            match candidates.as_slice() {
                [only] => {
                    if !seen.insert(only.name()) {
                        duplicates.push(format!("{} at column position {}", heading, position));
                    }
                    resolved.push(Some(*only));
                }
                _ => {
                    unmatched.push(format!("{} at column position {}", heading, position));
                    resolved.push(None);
                }
            }
        }
        if !unmatched.is_empty() {
            let msg = format!(
                "Unmatched Columns found with the following column headings : {}",
                unmatched.join(",")
            );
            error!("{}", msg);
            problems.push(msg);
        }
        if !duplicates.is_empty() {
            let msg = format!(
                "Duplicate Columns found with the following column headings : {}",
                duplicates.join(",")
            );
            error!("{}", msg);
            problems.push(msg);
        }

        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.is_required() && !seen.contains(c.name()))
            .map(|c| format!("[{}]", c.name()))
            .collect();
        if !missing.is_empty() {
            let msg = format!("The file is missing required columns : {}", missing.join(", "));
            error!("{}", msg);
            problems.push(msg);
        }

        if !problems.is_empty() {
            return Err(MoverError::HeaderValidation {
                table: self.table_name.clone(),
                reason: problems.join("; "),
            });
        }

        let by_index = resolved
            .into_iter()
            .map(|c| {
                c.and_then(|c| match c.requirement {
                    Requirement::Omitted => {
                        warn!("Ignoring values of omitted column {}", c.name());
                        None
                    }
                    _ => Some(c.name().to_string()),
                })
            })
            .collect();

        Ok(HeaderMapping {
            headings: headings.to_vec(),
            by_index,
        })
    }

    /// Composes this schema, as customer overrides, onto `base`.
    ///
    /// Every overriding column must exist in the base. Columns the overrides
    /// do not mention keep their base definition.
    pub fn apply_to(&self, base: &FileSchema) -> Result<FileSchema> {
        let mut merged = base.clone();
        for modifier in &self.columns {
            let slot = merged
                .columns
                .iter_mut()
                .find(|c| c.name() == modifier.name())
                .ok_or_else(|| MoverError::ColumnNotAvailable(modifier.name().to_string()))?;
            *slot = modifier.apply_to(slot)?;
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::column::LogicalType;

    fn policy_schema() -> FileSchema {
        FileSchema::new(
            "policy",
            vec![
                FileColumn::new(
                    ColumnDefinition::new("PolicyNumber", LogicalType::String),
                    Requirement::Required,
                )
                .with_alias("Policy Num"),
                FileColumn::new(
                    ColumnDefinition::new("Premium", LogicalType::Decimal),
                    Requirement::Optional,
                ),
                FileColumn::new(
                    ColumnDefinition::new("Agent", LogicalType::String),
                    Requirement::Omitted,
                ),
            ],
        )
        .unwrap()
    }

    fn headings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_matching_ignores_case_space_underscore() {
        let schema = policy_schema();
        let col = schema.column("PolicyNumber").unwrap();
        assert!(col.matches("Policy Number"));
        assert!(col.matches("policynumber"));
        assert!(col.matches("POLICY_NUMBER"));
        assert!(col.matches("policy_num"));
        assert!(!col.matches("Policy"));
    }

    #[test]
    fn test_header_resolution_is_order_insensitive() {
        let schema = policy_schema();
        let a = schema.resolve_header(&headings(&["Policy Number", "premium"])).unwrap();
        let b = schema.resolve_header(&headings(&["PREMIUM", "policy_number"])).unwrap();
        let row_a = a.project(["P-1", " 10.5 "]);
        let row_b = b.project(["10.5", "P-1"]);
        assert_eq!(row_a, row_b);
        assert_eq!(row_a.get("Premium").map(String::as_str), Some("10.5"));
    }

    #[test]
    fn test_unmatched_and_missing_are_both_reported() {
        let schema = policy_schema();
        let err = schema
            .resolve_header(&headings(&["Premium", "Colour"]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Colour at column position 1"), "{}", msg);
        assert!(msg.contains("The file is missing required columns : [PolicyNumber]"), "{}", msg);
    }

    #[test]
    fn test_duplicate_heading_fails() {
        let schema = policy_schema();
        let err = schema
            .resolve_header(&headings(&["PolicyNumber", "policy number"]))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate Columns"));
    }

    #[test]
    fn test_omitted_heading_resolves_but_is_dropped() {
        let schema = policy_schema();
        let mapping = schema
            .resolve_header(&headings(&["PolicyNumber", "Agent"]))
            .unwrap();
        let row = mapping.project(["P-9", "Smith"]);
        assert_eq!(row.len(), 1);
        assert_eq!(schema.output_columns().len(), 2);
        assert_eq!(schema.without_omitted().columns.len(), 2);
    }

    #[test]
    fn test_required_empty_differs_from_unparseable() {
        let schema = policy_schema();
        let required = schema.column("PolicyNumber").unwrap();
        assert!(matches!(
            required.parse(Some("  ")),
            Err(MoverError::RequiredValueMissing { .. })
        ));
        let optional = schema.column("Premium").unwrap();
        assert_eq!(optional.parse(None).unwrap(), CellValue::Null);
        assert!(matches!(
            optional.parse(Some("ten")),
            Err(MoverError::ValueParse { .. })
        ));
    }

    #[test]
    fn test_composition_rejects_weakening_required() {
        let base = policy_schema();
        let overrides = FileSchema::new(
            "policy",
            vec![FileColumn::new(
                ColumnDefinition::new("PolicyNumber", LogicalType::String),
                Requirement::Optional,
            )],
        )
        .unwrap();
        let err = overrides.apply_to(&base).unwrap_err();
        assert!(matches!(err, MoverError::ConfigError(_)));
        assert!(err.to_string().contains("A required column cannot be changed"));
    }

    #[test]
    fn test_composition_overrides_alias_and_status() {
        let base = policy_schema();
        let overrides = FileSchema::new(
            "policy",
            vec![FileColumn::new(
                ColumnDefinition::new("Premium", LogicalType::Decimal),
                Requirement::Required,
            )
            .with_alias("Written Premium")],
        )
        .unwrap();
        let merged = overrides.apply_to(&base).unwrap();
        let premium = merged.column("Premium").unwrap();
        assert!(premium.is_required());
        assert!(premium.matches("written_premium"));
        assert!(merged.column("PolicyNumber").unwrap().matches("Policy Num"));
    }

    #[test]
    fn test_composition_rejects_unknown_column() {
        let base = policy_schema();
        let overrides = FileSchema::new(
            "policy",
            vec![FileColumn::new(
                ColumnDefinition::new("Region", LogicalType::String),
                Requirement::Optional,
            )],
        )
        .unwrap();
        match overrides.apply_to(&base) {
            Err(MoverError::ColumnNotAvailable(name)) => assert_eq!(name, "Region"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_schema_deserializes_from_yaml() {
        let yaml = r#"
name: policy
columns:
  - actualColumnDef: { name: PolicyNumber, type: STRING }
    aliases: ["Policy No"]
    columnStatus: REQUIRED
  - actualColumnDef: { name: Issued, type: DATE, formatString: "%m/%d/%Y" }
"#;
        let schema: FileSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.columns.len(), 2);
        assert!(schema.columns[0].is_required());
        assert_eq!(schema.columns[1].requirement, Requirement::Optional);
        assert_eq!(
            schema.columns[1].column.format_pattern.as_deref(),
            Some("%m/%d/%Y")
        );
    }
}
