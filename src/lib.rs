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

//! # Oracle Row Mover
//!
//! Moves validated rows from Oracle queries and customer supplied delimited
//! files to a remote collection server, in bounded batches that can be
//! resumed and skipped when the data has not changed.
//!
//! The crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! `domain` holds the rules, `ports` the seams, `infrastructure` the Oracle,
//! file and HTTP adapters, and `application` the send loops.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
