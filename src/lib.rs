// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Transcoding between Arrow columnar data and an ORC-style stripe file
//! format: stripe-organized rows, a typed column tree, and a checksummed
//! footer.
//!
//! The reader side materializes Arrow schemas and record batches from
//! stripe files (whole-table, per-stripe, projected, or via a lazy
//! per-stripe iterator); the writer side encodes tables of record
//! batches into stripes in fixed-size row chunks.

pub mod builder;
pub mod common;
pub mod decode;
pub mod encode;
pub mod error;
pub mod io;
pub mod reader;
pub mod schema;
pub mod stripe;
pub mod types;
pub mod vector;
pub mod writer;

pub use common::logging as orcbridge_logging;

pub use error::{OrcError, Result};
pub use io::{MemoryInput, MemorySink, OutputSink, RangeInput};
pub use reader::{OrcFileReader, StripeRecordBatchReader};
pub use types::{OrcType, StripeInformation};
pub use writer::OrcFileWriter;
