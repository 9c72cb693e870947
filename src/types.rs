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
//! Column type tree and stripe metadata for the stripe file format.

/// One node of the file's column type tree.
///
/// Decimal precision 0 is a legacy marker meaning "unspecified"; the
/// schema mapper widens it to decimal128(38, 6) on read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrcType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Binary,
    /// Fixed-width character payload; `width` is the byte length of
    /// every value.
    Char { width: u32 },
    Date,
    Timestamp,
    Decimal { precision: u8, scale: i8 },
    List { child: Box<OrcType> },
    Map { key: Box<OrcType>, value: Box<OrcType> },
    Struct { fields: Vec<(String, OrcType)> },
    Union { children: Vec<OrcType> },
}

impl OrcType {
    /// Lower-case kind name used in error context.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OrcType::Boolean => "boolean",
            OrcType::Byte => "byte",
            OrcType::Short => "short",
            OrcType::Int => "int",
            OrcType::Long => "long",
            OrcType::Float => "float",
            OrcType::Double => "double",
            OrcType::String => "string",
            OrcType::Binary => "binary",
            OrcType::Char { .. } => "char",
            OrcType::Date => "date",
            OrcType::Timestamp => "timestamp",
            OrcType::Decimal { .. } => "decimal",
            OrcType::List { .. } => "list",
            OrcType::Map { .. } => "map",
            OrcType::Struct { .. } => "struct",
            OrcType::Union { .. } => "union",
        }
    }

    /// Whether the decimal payload for this node is 128-bit wide.
    ///
    /// Precision 0 (unspecified) and precisions above 18 use the wide
    /// payload; 1..=18 fit in 64 bits.
    pub fn decimal_is_wide(precision: u8) -> bool {
        precision == 0 || precision > 18
    }
}

/// Location and row accounting for one stripe inside a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StripeInformation {
    /// Byte offset of the stripe from the start of the file.
    pub offset: u64,
    /// Serialized byte length of the stripe.
    pub length: u64,
    /// Rows stored in the stripe.
    pub num_rows: u64,
    /// Absolute row number of the stripe's first row, accumulated while
    /// enumerating stripes at open time.
    pub first_row_of_stripe: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_width_routing() {
        assert!(OrcType::decimal_is_wide(0));
        assert!(!OrcType::decimal_is_wide(1));
        assert!(!OrcType::decimal_is_wide(18));
        assert!(OrcType::decimal_is_wide(19));
        assert!(OrcType::decimal_is_wide(38));
    }

    #[test]
    fn kind_names_cover_composites() {
        let ty = OrcType::Map {
            key: Box::new(OrcType::String),
            value: Box::new(OrcType::List {
                child: Box::new(OrcType::Int),
            }),
        };
        assert_eq!(ty.kind_name(), "map");
    }
}
