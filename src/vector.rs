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
//! In-memory column batches exchanged with the stripe container.
//!
//! One `VectorBatch` holds up to `capacity` rows of a single column.
//! Integer-like values widen to i64, floats to f64; binary-like rows own
//! one heap buffer per row slot which is replaced on write, never
//! appended to. List and map offsets have `rows + 1` entries and are
//! monotone non-decreasing; a null row contributes zero child rows.

use crate::error::{OrcError, Result};
use crate::types::OrcType;

#[derive(Clone, Debug)]
pub struct VectorBatch {
    /// Rows currently filled.
    pub num_elements: usize,
    /// True when at least one row of this batch is null.
    pub has_nulls: bool,
    /// Per-row validity, true = present. Always `capacity` long.
    pub not_null: Vec<bool>,
    pub payload: VectorPayload,
}

#[derive(Clone, Debug)]
pub enum VectorPayload {
    /// Booleans, all integer widths and dates, widened to i64.
    Long { data: Vec<i64> },
    /// f32 and f64, widened to f64.
    Double { data: Vec<f64> },
    /// Split seconds/nanos representation.
    Timestamp { seconds: Vec<i64>, nanos: Vec<i64> },
    /// Decimals with precision 1..=18.
    Decimal64 { data: Vec<i64> },
    /// Decimals with precision 0 (unspecified) or 19..=38.
    Decimal128 { data: Vec<i128> },
    /// String, binary and char rows; each slot owns its buffer.
    Bytes { data: Vec<Option<Vec<u8>>> },
    List {
        offsets: Vec<i64>,
        child: Box<VectorBatch>,
    },
    Map {
        offsets: Vec<i64>,
        keys: Box<VectorBatch>,
        values: Box<VectorBatch>,
    },
    Struct { children: Vec<VectorBatch> },
}

impl VectorBatch {
    /// Allocate an empty batch shaped for `orc_type` with room for
    /// `capacity` rows.
    pub fn for_type(orc_type: &OrcType, capacity: usize) -> Result<Self> {
        let payload = match orc_type {
            OrcType::Boolean
            | OrcType::Byte
            | OrcType::Short
            | OrcType::Int
            | OrcType::Long
            | OrcType::Date => VectorPayload::Long {
                data: vec![0; capacity],
            },
            OrcType::Float | OrcType::Double => VectorPayload::Double {
                data: vec![0.0; capacity],
            },
            OrcType::Timestamp => VectorPayload::Timestamp {
                seconds: vec![0; capacity],
                nanos: vec![0; capacity],
            },
            OrcType::Decimal { precision, .. } => {
                if OrcType::decimal_is_wide(*precision) {
                    VectorPayload::Decimal128 {
                        data: vec![0; capacity],
                    }
                } else {
                    VectorPayload::Decimal64 {
                        data: vec![0; capacity],
                    }
                }
            }
            OrcType::String | OrcType::Binary | OrcType::Char { .. } => VectorPayload::Bytes {
                data: vec![None; capacity],
            },
            OrcType::List { child } => VectorPayload::List {
                offsets: vec![0; capacity + 1],
                child: Box::new(VectorBatch::for_type(child, capacity)?),
            },
            OrcType::Map { key, value } => VectorPayload::Map {
                offsets: vec![0; capacity + 1],
                keys: Box::new(VectorBatch::for_type(key, capacity)?),
                values: Box::new(VectorBatch::for_type(value, capacity)?),
            },
            OrcType::Struct { fields } => {
                let mut children = Vec::with_capacity(fields.len());
                for (_name, child) in fields {
                    children.push(VectorBatch::for_type(child, capacity)?);
                }
                VectorPayload::Struct { children }
            }
            OrcType::Union { .. } => {
                return Err(OrcError::NotImplemented(
                    "vector batch for union type".to_string(),
                ));
            }
        };
        Ok(Self {
            num_elements: 0,
            has_nulls: false,
            not_null: vec![true; capacity],
            payload,
        })
    }

    /// Row capacity of this batch.
    pub fn capacity(&self) -> usize {
        self.not_null.len()
    }

    /// Grow the batch to hold at least `rows` rows, preserving content.
    ///
    /// List and map children are not resized here; the encoder grows
    /// them by element count as offsets are produced. Struct children
    /// stay row-aligned with the parent.
    pub fn resize(&mut self, rows: usize) {
        if rows > self.not_null.len() {
            self.not_null.resize(rows, true);
        }
        match &mut self.payload {
            VectorPayload::Long { data } => {
                if rows > data.len() {
                    data.resize(rows, 0);
                }
            }
            VectorPayload::Double { data } => {
                if rows > data.len() {
                    data.resize(rows, 0.0);
                }
            }
            VectorPayload::Timestamp { seconds, nanos } => {
                if rows > seconds.len() {
                    seconds.resize(rows, 0);
                    nanos.resize(rows, 0);
                }
            }
            VectorPayload::Decimal64 { data } => {
                if rows > data.len() {
                    data.resize(rows, 0);
                }
            }
            VectorPayload::Decimal128 { data } => {
                if rows > data.len() {
                    data.resize(rows, 0);
                }
            }
            VectorPayload::Bytes { data } => {
                if rows > data.len() {
                    data.resize(rows, None);
                }
            }
            VectorPayload::List { offsets, .. } | VectorPayload::Map { offsets, .. } => {
                if rows + 1 > offsets.len() {
                    offsets.resize(rows + 1, 0);
                }
            }
            VectorPayload::Struct { children } => {
                for child in children {
                    child.resize(rows);
                }
            }
        }
    }

    /// Reset row accounting for reuse; allocations are kept.
    pub fn clear(&mut self) {
        self.num_elements = 0;
        self.has_nulls = false;
        for flag in &mut self.not_null {
            *flag = true;
        }
        match &mut self.payload {
            VectorPayload::List { child, .. } => child.clear(),
            VectorPayload::Map { keys, values, .. } => {
                keys.clear();
                values.clear();
            }
            VectorPayload::Struct { children } => {
                for child in children {
                    child.clear();
                }
            }
            _ => {}
        }
    }
}
