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
//! Type mapping between Arrow data types and the stripe column type tree.
//!
//! Responsibilities:
//! - Arrow schema/type to stripe type tree for the writer.
//! - Stripe type tree to Arrow schema/type for the reader, including
//!   metadata key/values and column-pruned schemas.
//!
//! Current limitations:
//! - Large string/binary and fixed-size binary collapse to plain
//!   string/binary on write; the round-tripped schema loses them.
//! - Union children lose their names on write; on read they come back
//!   as `_union_<i>` sparse union fields.
//! - Timestamps always read back at nanosecond precision without a
//!   timezone.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{
    DataType, Field, Fields, Schema, TimeUnit, UnionFields, UnionMode,
};

use crate::error::{OrcError, Result};
use crate::types::OrcType;

/// Decimal precision/scale assumed when the file says "unspecified"
/// (precision 0).
pub const UNSPECIFIED_DECIMAL_PRECISION: u8 = 38;
pub const UNSPECIFIED_DECIMAL_SCALE: i8 = 6;

/// Map one Arrow type to its stripe type node (write direction).
pub fn orc_type_from_arrow(data_type: &DataType) -> Result<OrcType> {
    match data_type {
        DataType::Boolean => Ok(OrcType::Boolean),
        DataType::Int8 => Ok(OrcType::Byte),
        DataType::Int16 => Ok(OrcType::Short),
        DataType::Int32 => Ok(OrcType::Int),
        DataType::Int64 => Ok(OrcType::Long),
        DataType::Float32 => Ok(OrcType::Float),
        DataType::Float64 => Ok(OrcType::Double),
        DataType::Utf8 | DataType::LargeUtf8 => Ok(OrcType::String),
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => {
            Ok(OrcType::Binary)
        }
        DataType::Date32 => Ok(OrcType::Date),
        // Date64 carries milliseconds since epoch, so it encodes as a
        // millisecond timestamp.
        DataType::Date64 => Ok(OrcType::Timestamp),
        DataType::Timestamp(_, _) => Ok(OrcType::Timestamp),
        DataType::Decimal128(precision, scale) => Ok(OrcType::Decimal {
            precision: *precision,
            scale: *scale,
        }),
        DataType::List(field) | DataType::LargeList(field) => Ok(OrcType::List {
            child: Box::new(orc_type_from_arrow(field.data_type())?),
        }),
        DataType::FixedSizeList(field, _) => Ok(OrcType::List {
            child: Box::new(orc_type_from_arrow(field.data_type())?),
        }),
        DataType::Struct(fields) => {
            let mut children = Vec::with_capacity(fields.len());
            for field in fields {
                children.push((
                    field.name().clone(),
                    orc_type_from_arrow(field.data_type())?,
                ));
            }
            Ok(OrcType::Struct { fields: children })
        }
        DataType::Map(entries, _ordered) => {
            let DataType::Struct(entry_fields) = entries.data_type() else {
                return Err(OrcError::InvalidArgument(format!(
                    "map entries must be a struct: entries_type={:?}",
                    entries.data_type()
                )));
            };
            if entry_fields.len() != 2 {
                return Err(OrcError::InvalidArgument(format!(
                    "map entries must have two fields: entries_fields={}",
                    entry_fields.len()
                )));
            }
            Ok(OrcType::Map {
                key: Box::new(orc_type_from_arrow(entry_fields[0].data_type())?),
                value: Box::new(orc_type_from_arrow(entry_fields[1].data_type())?),
            })
        }
        DataType::Union(fields, _mode) => {
            let mut children = Vec::with_capacity(fields.len());
            for (_type_id, field) in fields.iter() {
                children.push(orc_type_from_arrow(field.data_type())?);
            }
            Ok(OrcType::Union { children })
        }
        DataType::Dictionary(_, value_type) => orc_type_from_arrow(value_type),
        other => Err(OrcError::NotImplemented(format!(
            "unsupported arrow type for write: type={other:?}"
        ))),
    }
}

/// Map an Arrow schema to the root struct type node, translated exactly
/// once at writer open.
pub fn orc_schema_from_arrow(schema: &Schema) -> Result<OrcType> {
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        fields.push((
            field.name().clone(),
            orc_type_from_arrow(field.data_type())?,
        ));
    }
    Ok(OrcType::Struct { fields })
}

/// Map one stripe type node to its Arrow type (read direction).
///
/// `None` is the pruned-column sentinel and maps to `DataType::Null`.
pub fn arrow_type_from_orc(orc_type: Option<&OrcType>) -> Result<DataType> {
    let Some(orc_type) = orc_type else {
        return Ok(DataType::Null);
    };
    match orc_type {
        OrcType::Boolean => Ok(DataType::Boolean),
        OrcType::Byte => Ok(DataType::Int8),
        OrcType::Short => Ok(DataType::Int16),
        OrcType::Int => Ok(DataType::Int32),
        OrcType::Long => Ok(DataType::Int64),
        OrcType::Float => Ok(DataType::Float32),
        OrcType::Double => Ok(DataType::Float64),
        OrcType::String => Ok(DataType::Utf8),
        OrcType::Binary => Ok(DataType::Binary),
        OrcType::Char { width } => {
            let width = i32::try_from(*width).map_err(|_| {
                OrcError::Format(format!("char width overflow: width={width}"))
            })?;
            Ok(DataType::FixedSizeBinary(width))
        }
        OrcType::Date => Ok(DataType::Date32),
        OrcType::Timestamp => Ok(DataType::Timestamp(TimeUnit::Nanosecond, None)),
        OrcType::Decimal { precision, scale } => {
            if *precision == 0 {
                Ok(DataType::Decimal128(
                    UNSPECIFIED_DECIMAL_PRECISION,
                    UNSPECIFIED_DECIMAL_SCALE,
                ))
            } else {
                Ok(DataType::Decimal128(*precision, *scale))
            }
        }
        OrcType::List { child } => {
            let item = arrow_type_from_orc(Some(child))?;
            Ok(DataType::List(Arc::new(Field::new("item", item, true))))
        }
        OrcType::Map { key, value } => {
            let key_type = arrow_type_from_orc(Some(key))?;
            let value_type = arrow_type_from_orc(Some(value))?;
            let entries = Field::new(
                "entries",
                DataType::Struct(Fields::from(vec![
                    Field::new("keys", key_type, false),
                    Field::new("values", value_type, true),
                ])),
                false,
            );
            Ok(DataType::Map(Arc::new(entries), false))
        }
        OrcType::Struct { fields } => {
            let mut arrow_fields = Vec::with_capacity(fields.len());
            for (name, child) in fields {
                arrow_fields.push(Field::new(
                    name.clone(),
                    arrow_type_from_orc(Some(child))?,
                    true,
                ));
            }
            Ok(DataType::Struct(Fields::from(arrow_fields)))
        }
        OrcType::Union { children } => {
            let mut type_ids = Vec::with_capacity(children.len());
            let mut fields = Vec::with_capacity(children.len());
            for (index, child) in children.iter().enumerate() {
                let type_id = i8::try_from(index).map_err(|_| {
                    OrcError::Format(format!(
                        "union child count overflow: children={}",
                        children.len()
                    ))
                })?;
                type_ids.push(type_id);
                fields.push(Field::new(
                    format!("_union_{index}"),
                    arrow_type_from_orc(Some(child))?,
                    true,
                ));
            }
            Ok(DataType::Union(
                UnionFields::new(type_ids, fields),
                UnionMode::Sparse,
            ))
        }
    }
}

/// Materialize an Arrow schema from the root struct type node.
///
/// `include` selects a subset of top-level columns (already validated
/// and sorted); the resulting schema keeps file field order. Metadata
/// key/values from the file footer are attached to the schema.
pub fn arrow_schema_from_orc(
    root: &OrcType,
    include: Option<&[usize]>,
    metadata: &[(String, String)],
) -> Result<Schema> {
    let OrcType::Struct { fields } = root else {
        return Err(OrcError::NotImplemented(format!(
            "top level type must be a struct: kind={}",
            root.kind_name()
        )));
    };
    let selected: Vec<usize> = match include {
        Some(indices) => indices.to_vec(),
        None => (0..fields.len()).collect(),
    };
    let mut arrow_fields = Vec::with_capacity(selected.len());
    for index in selected {
        let Some((name, child)) = fields.get(index) else {
            return Err(OrcError::InvalidArgument(format!(
                "field index out of range: index={}, field_count={}",
                index,
                fields.len()
            )));
        };
        arrow_fields.push(Field::new(
            name.clone(),
            arrow_type_from_orc(Some(child))?,
            true,
        ));
    }
    let metadata: HashMap<String, String> = metadata.iter().cloned().collect();
    Ok(Schema::new_with_metadata(Fields::from(arrow_fields), metadata))
}
