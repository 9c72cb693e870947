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
//! Column builder tree for the decode pipeline.
//!
//! A `ColumnBuilder` mirrors one node of the target Arrow type: scalar
//! nodes wrap the concrete Arrow builder, nested nodes keep their own
//! offsets/validity and recurse into child builders. Dispatch is by
//! variant tag, so the decode pipeline never goes through trait
//! objects.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder,
    FixedSizeBinaryBuilder, Float32Builder, Float64Builder, Int8Builder, Int16Builder,
    Int32Builder, Int64Builder, LargeBinaryBuilder, LargeStringBuilder, ListArray, MapArray,
    StringBuilder, StructArray, TimestampNanosecondBuilder,
};
use arrow::datatypes::{DataType, FieldRef, Fields, TimeUnit};
use arrow_buffer::{NullBufferBuilder, OffsetBuffer, ScalarBuffer};

use crate::error::{OrcError, Result};

#[derive(Debug)]
pub enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Date32(Date32Builder),
    Timestamp(TimestampNanosecondBuilder),
    Decimal128(Decimal128Builder),
    Utf8(StringBuilder),
    LargeUtf8(LargeStringBuilder),
    Binary(BinaryBuilder),
    LargeBinary(LargeBinaryBuilder),
    FixedSizeBinary {
        builder: FixedSizeBinaryBuilder,
        width: i32,
    },
    List {
        item_field: FieldRef,
        offsets: Vec<i32>,
        nulls: NullBufferBuilder,
        child: Box<ColumnBuilder>,
    },
    Map {
        entries_field: FieldRef,
        entry_fields: Fields,
        offsets: Vec<i32>,
        nulls: NullBufferBuilder,
        keys: Box<ColumnBuilder>,
        values: Box<ColumnBuilder>,
    },
    Struct {
        fields: Fields,
        nulls: NullBufferBuilder,
        children: Vec<ColumnBuilder>,
        rows: usize,
    },
}

impl ColumnBuilder {
    /// Build the builder tree for one target Arrow type.
    pub fn for_data_type(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Boolean => Ok(ColumnBuilder::Boolean(BooleanBuilder::new())),
            DataType::Int8 => Ok(ColumnBuilder::Int8(Int8Builder::new())),
            DataType::Int16 => Ok(ColumnBuilder::Int16(Int16Builder::new())),
            DataType::Int32 => Ok(ColumnBuilder::Int32(Int32Builder::new())),
            DataType::Int64 => Ok(ColumnBuilder::Int64(Int64Builder::new())),
            DataType::Float32 => Ok(ColumnBuilder::Float32(Float32Builder::new())),
            DataType::Float64 => Ok(ColumnBuilder::Float64(Float64Builder::new())),
            DataType::Date32 => Ok(ColumnBuilder::Date32(Date32Builder::new())),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => Ok(ColumnBuilder::Timestamp(
                TimestampNanosecondBuilder::new().with_data_type(data_type.clone()),
            )),
            DataType::Decimal128(_, _) => Ok(ColumnBuilder::Decimal128(
                Decimal128Builder::new().with_data_type(data_type.clone()),
            )),
            DataType::Utf8 => Ok(ColumnBuilder::Utf8(StringBuilder::new())),
            DataType::LargeUtf8 => Ok(ColumnBuilder::LargeUtf8(LargeStringBuilder::new())),
            DataType::Binary => Ok(ColumnBuilder::Binary(BinaryBuilder::new())),
            DataType::LargeBinary => Ok(ColumnBuilder::LargeBinary(LargeBinaryBuilder::new())),
            DataType::FixedSizeBinary(width) => Ok(ColumnBuilder::FixedSizeBinary {
                builder: FixedSizeBinaryBuilder::new(*width),
                width: *width,
            }),
            DataType::List(item_field) => Ok(ColumnBuilder::List {
                item_field: item_field.clone(),
                offsets: vec![0],
                nulls: NullBufferBuilder::new(0),
                child: Box::new(ColumnBuilder::for_data_type(item_field.data_type())?),
            }),
            DataType::Map(entries_field, _ordered) => {
                let DataType::Struct(entry_fields) = entries_field.data_type() else {
                    return Err(OrcError::InvalidArgument(format!(
                        "map entries must be a struct: entries_type={:?}",
                        entries_field.data_type()
                    )));
                };
                if entry_fields.len() != 2 {
                    return Err(OrcError::InvalidArgument(format!(
                        "map entries must have two fields: entries_fields={}",
                        entry_fields.len()
                    )));
                }
                Ok(ColumnBuilder::Map {
                    entries_field: entries_field.clone(),
                    entry_fields: entry_fields.clone(),
                    offsets: vec![0],
                    nulls: NullBufferBuilder::new(0),
                    keys: Box::new(ColumnBuilder::for_data_type(entry_fields[0].data_type())?),
                    values: Box::new(ColumnBuilder::for_data_type(entry_fields[1].data_type())?),
                })
            }
            DataType::Struct(fields) => {
                let mut children = Vec::with_capacity(fields.len());
                for field in fields {
                    children.push(ColumnBuilder::for_data_type(field.data_type())?);
                }
                Ok(ColumnBuilder::Struct {
                    fields: fields.clone(),
                    nulls: NullBufferBuilder::new(0),
                    children,
                    rows: 0,
                })
            }
            other => Err(OrcError::NotImplemented(format!(
                "builder for arrow type: type={other:?}"
            ))),
        }
    }

    /// Finish the builder tree into one Arrow array.
    pub fn finish(self) -> Result<ArrayRef> {
        match self {
            ColumnBuilder::Boolean(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Int8(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Int16(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Int32(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Int64(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Float32(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Float64(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Date32(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Timestamp(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Decimal128(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Utf8(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::LargeUtf8(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::Binary(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::LargeBinary(mut b) => Ok(Arc::new(b.finish())),
            ColumnBuilder::FixedSizeBinary { mut builder, .. } => Ok(Arc::new(builder.finish())),
            ColumnBuilder::List {
                item_field,
                offsets,
                mut nulls,
                child,
            } => {
                let values = child.finish()?;
                let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
                Ok(Arc::new(ListArray::new(
                    item_field,
                    offsets,
                    values,
                    nulls.finish(),
                )))
            }
            ColumnBuilder::Map {
                entries_field,
                entry_fields,
                offsets,
                mut nulls,
                keys,
                values,
            } => {
                let key_array = keys.finish()?;
                let value_array = values.finish()?;
                let entries =
                    StructArray::try_new(entry_fields, vec![key_array, value_array], None)
                        .map_err(|e| {
                            OrcError::Format(format!("assemble map entries failed: error={e}"))
                        })?;
                let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
                let map = MapArray::try_new(entries_field, offsets, entries, nulls.finish(), false)
                    .map_err(|e| {
                        OrcError::Format(format!("assemble map array failed: error={e}"))
                    })?;
                Ok(Arc::new(map))
            }
            ColumnBuilder::Struct {
                fields,
                mut nulls,
                children,
                rows,
            } => {
                if fields.is_empty() {
                    return Ok(Arc::new(StructArray::new_empty_fields(rows, nulls.finish())));
                }
                let mut arrays = Vec::with_capacity(children.len());
                for child in children {
                    arrays.push(child.finish()?);
                }
                let array = StructArray::try_new(fields, arrays, nulls.finish()).map_err(|e| {
                    OrcError::Format(format!("assemble struct array failed: error={e}"))
                })?;
                Ok(Arc::new(array))
            }
        }
    }
}

/// Extend a prefix-sum offset vector by one entry, checking i32 range.
pub(crate) fn push_offset_delta(offsets: &mut Vec<i32>, delta: usize) -> Result<()> {
    let last = i64::from(*offsets.last().unwrap_or(&0));
    let next = last + delta as i64;
    if next > i32::MAX as i64 {
        return Err(OrcError::Format(format!(
            "offset overflow while decoding: last_offset={last}, delta={delta}"
        )));
    }
    offsets.push(next as i32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::Field;

    #[test]
    fn list_builder_assembles_offsets_and_nulls() {
        let item_field: FieldRef = Arc::new(Field::new("item", DataType::Int32, true));
        let list_type = DataType::List(item_field);
        let mut builder = ColumnBuilder::for_data_type(&list_type).expect("builder");
        let ColumnBuilder::List {
            offsets,
            nulls,
            child,
            ..
        } = &mut builder
        else {
            panic!("expected list builder");
        };
        let ColumnBuilder::Int32(ints) = child.as_mut() else {
            panic!("expected int32 child");
        };
        ints.append_value(1);
        ints.append_value(2);
        push_offset_delta(offsets, 2).expect("offsets");
        nulls.append_non_null();
        push_offset_delta(offsets, 0).expect("offsets");
        nulls.append_null();

        let array = builder.finish().expect("finish");
        let list = array.as_any().downcast_ref::<ListArray>().expect("list");
        assert_eq!(list.len(), 2);
        assert!(list.is_valid(0));
        assert!(list.is_null(1));
        let values = list
            .values()
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("values");
        assert_eq!(values.values(), &[1, 2]);
    }

    #[test]
    fn empty_struct_keeps_row_count() {
        let builder = ColumnBuilder::Struct {
            fields: Fields::empty(),
            nulls: NullBufferBuilder::new(0),
            children: vec![],
            rows: 3,
        };
        let array = builder.finish().expect("finish");
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let mut offsets = vec![i32::MAX - 1];
        let err = push_offset_delta(&mut offsets, 2).expect_err("overflow");
        assert!(matches!(err, OrcError::Format(_)), "err={}", err);
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let err = ColumnBuilder::for_data_type(&DataType::Duration(TimeUnit::Second))
            .expect_err("duration");
        assert!(matches!(err, OrcError::NotImplemented(_)), "err={}", err);
    }
}
