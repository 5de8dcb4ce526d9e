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

//! # Type Mapping Logic
//!
//! This module is the "Translator" for queries that do not list their output
//! columns. Oracle describes each cursor column with an `OracleType`; we
//! reduce that to one of our `LogicalType`s so the column can be rendered.
//!
//! A `NUMBER(10,0)` becomes an `INTEGER`, a `NUMBER(12,2)` or a plain `NUMBER`
//! becomes a `DECIMAL`, and every date or timestamp flavour becomes a
//! `DATETIME`. Anything we cannot read natively is carried as a `STRING`.

use crate::domain::column::{ColumnDefinition, LogicalType};
use oracle::sql_type::OracleType;

/// Returns the logical type used to render values of `oracle_type`.
pub fn map_oracle_to_logical(oracle_type: &OracleType) -> LogicalType {
    match oracle_type {
        // Precision 0 is Oracle's way of saying "NUMBER" without precision.
        OracleType::Number(prec, 0) if *prec > 0 => LogicalType::Integer,
        OracleType::Int64 | OracleType::UInt64 => LogicalType::Integer,

        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble => LogicalType::Decimal,

        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => LogicalType::DateTime,

        OracleType::Boolean => LogicalType::Boolean,

        _ => LogicalType::String,
    }
}

/// Builds output columns from a cursor description.
pub fn columns_from_cursor<'a, I>(described: I) -> Vec<ColumnDefinition>
where
    I: IntoIterator<Item = (&'a str, &'a OracleType)>,
{
    described
        .into_iter()
        .map(|(name, oracle_type)| ColumnDefinition::new(name, map_oracle_to_logical(oracle_type)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_mapping() {
        assert_eq!(map_oracle_to_logical(&OracleType::Number(10, 0)), LogicalType::Integer);
        assert_eq!(map_oracle_to_logical(&OracleType::Number(12, 2)), LogicalType::Decimal);
        // Unconstrained NUMBER may hold fractions.
        assert_eq!(map_oracle_to_logical(&OracleType::Number(0, -127)), LogicalType::Decimal);
        assert_eq!(map_oracle_to_logical(&OracleType::BinaryDouble), LogicalType::Decimal);
    }

    #[test]
    fn test_temporal_and_text_mapping() {
        assert_eq!(map_oracle_to_logical(&OracleType::Date), LogicalType::DateTime);
        assert_eq!(map_oracle_to_logical(&OracleType::TimestampTZ(6)), LogicalType::DateTime);
        assert_eq!(map_oracle_to_logical(&OracleType::Varchar2(40)), LogicalType::String);
        assert_eq!(map_oracle_to_logical(&OracleType::CLOB), LogicalType::String);
    }

    #[test]
    fn test_columns_from_cursor() {
        let id = OracleType::Number(19, 0);
        let name = OracleType::Varchar2(100);
        let cols = columns_from_cursor(vec![("ID", &id), ("NAME", &name)]);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].logical_type, LogicalType::Integer);
        assert_eq!(cols[1].name, "NAME");
    }
}
