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
//! Decode pipeline: append a window of a stripe vector batch into the
//! Arrow builder tree.
//!
//! The recursion is driven by `(type node, batch, row offset, row
//! count)`. Struct children are appended over the same row range as the
//! parent; list and map rows recurse into the child sub-range named by
//! their offsets. Timestamps always land at nanosecond precision.

use crate::builder::{ColumnBuilder, push_offset_delta};
use crate::error::{OrcError, Result};
use crate::types::OrcType;
use crate::vector::{VectorBatch, VectorPayload};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn is_present(batch: &VectorBatch, row: usize) -> bool {
    !batch.has_nulls || batch.not_null[row]
}

fn target_mismatch(kind: &str) -> OrcError {
    OrcError::InvalidArgument(format!(
        "decode target type mismatch: kind={kind}"
    ))
}

fn payload_mismatch(kind: &str) -> OrcError {
    OrcError::Format(format!("decode payload mismatch: kind={kind}"))
}

/// Append `row_count` rows of `batch` starting at `row_offset` into
/// `builder`.
///
/// `orc_type` of `None` is the pruned-column sentinel and is a no-op.
pub fn append_batch(
    orc_type: Option<&OrcType>,
    batch: &VectorBatch,
    row_offset: usize,
    row_count: usize,
    builder: &mut ColumnBuilder,
) -> Result<()> {
    let Some(orc_type) = orc_type else {
        return Ok(());
    };
    if row_count == 0 {
        return Ok(());
    }
    match orc_type {
        OrcType::Boolean => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Boolean(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] != 0);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Byte => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Int8(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] as i8);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Short => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Int16(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] as i16);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Int => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Int32(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] as i32);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Long => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Int64(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row]);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Date => {
            let data = long_payload(batch, orc_type)?;
            let ColumnBuilder::Date32(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] as i32);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Float => {
            let data = double_payload(batch, orc_type)?;
            let ColumnBuilder::Float32(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row] as f32);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Double => {
            let data = double_payload(batch, orc_type)?;
            let ColumnBuilder::Float64(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(data[row]);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Timestamp => {
            let VectorPayload::Timestamp { seconds, nanos } = &batch.payload else {
                return Err(payload_mismatch(orc_type.kind_name()));
            };
            let ColumnBuilder::Timestamp(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    b.append_value(seconds[row] * NANOS_PER_SECOND + nanos[row]);
                } else {
                    b.append_null();
                }
            }
            Ok(())
        }
        OrcType::Decimal { precision, .. } => {
            let ColumnBuilder::Decimal128(b) = builder else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            if OrcType::decimal_is_wide(*precision) {
                let VectorPayload::Decimal128 { data } = &batch.payload else {
                    return Err(payload_mismatch(orc_type.kind_name()));
                };
                for row in row_offset..row_offset + row_count {
                    if is_present(batch, row) {
                        b.append_value(data[row]);
                    } else {
                        b.append_null();
                    }
                }
            } else {
                let VectorPayload::Decimal64 { data } = &batch.payload else {
                    return Err(payload_mismatch(orc_type.kind_name()));
                };
                for row in row_offset..row_offset + row_count {
                    if is_present(batch, row) {
                        b.append_value(i128::from(data[row]));
                    } else {
                        b.append_null();
                    }
                }
            }
            Ok(())
        }
        OrcType::String | OrcType::Binary | OrcType::Char { .. } => {
            append_bytes(orc_type, batch, row_offset, row_count, builder)
        }
        OrcType::Struct { fields } => {
            let VectorPayload::Struct { children } = &batch.payload else {
                return Err(payload_mismatch(orc_type.kind_name()));
            };
            let ColumnBuilder::Struct {
                nulls,
                children: child_builders,
                rows,
                ..
            } = builder
            else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            if children.len() != fields.len() || child_builders.len() != fields.len() {
                return Err(OrcError::Format(format!(
                    "struct child count mismatch: type_fields={}, batch_children={}, builder_children={}",
                    fields.len(),
                    children.len(),
                    child_builders.len()
                )));
            }
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    nulls.append_non_null();
                } else {
                    nulls.append_null();
                }
            }
            *rows += row_count;
            for (index, (_name, child_type)) in fields.iter().enumerate() {
                append_batch(
                    Some(child_type),
                    &children[index],
                    row_offset,
                    row_count,
                    &mut child_builders[index],
                )?;
            }
            Ok(())
        }
        OrcType::List { child } => {
            let VectorPayload::List {
                offsets,
                child: child_batch,
            } = &batch.payload
            else {
                return Err(payload_mismatch(orc_type.kind_name()));
            };
            let ColumnBuilder::List {
                offsets: out_offsets,
                nulls,
                child: child_builder,
                ..
            } = builder
            else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    let (start, length) = child_range(offsets, row)?;
                    append_batch(
                        Some(child),
                        child_batch,
                        start,
                        length,
                        child_builder,
                    )?;
                    push_offset_delta(out_offsets, length)?;
                    nulls.append_non_null();
                } else {
                    push_offset_delta(out_offsets, 0)?;
                    nulls.append_null();
                }
            }
            Ok(())
        }
        OrcType::Map { key, value } => {
            let VectorPayload::Map {
                offsets,
                keys,
                values,
            } = &batch.payload
            else {
                return Err(payload_mismatch(orc_type.kind_name()));
            };
            let ColumnBuilder::Map {
                offsets: out_offsets,
                nulls,
                keys: key_builder,
                values: value_builder,
                ..
            } = builder
            else {
                return Err(target_mismatch(orc_type.kind_name()));
            };
            for row in row_offset..row_offset + row_count {
                if is_present(batch, row) {
                    let (start, length) = child_range(offsets, row)?;
                    append_batch(Some(key), keys, start, length, key_builder)?;
                    append_batch(Some(value), values, start, length, value_builder)?;
                    push_offset_delta(out_offsets, length)?;
                    nulls.append_non_null();
                } else {
                    push_offset_delta(out_offsets, 0)?;
                    nulls.append_null();
                }
            }
            Ok(())
        }
        OrcType::Union { .. } => Err(OrcError::NotImplemented(format!(
            "not implemented type kind: kind={}",
            orc_type.kind_name()
        ))),
    }
}

fn long_payload<'a>(batch: &'a VectorBatch, orc_type: &OrcType) -> Result<&'a [i64]> {
    let VectorPayload::Long { data } = &batch.payload else {
        return Err(payload_mismatch(orc_type.kind_name()));
    };
    Ok(data)
}

fn double_payload<'a>(batch: &'a VectorBatch, orc_type: &OrcType) -> Result<&'a [f64]> {
    let VectorPayload::Double { data } = &batch.payload else {
        return Err(payload_mismatch(orc_type.kind_name()));
    };
    Ok(data)
}

fn child_range(offsets: &[i64], row: usize) -> Result<(usize, usize)> {
    let start = offsets[row];
    let end = offsets[row + 1];
    if start < 0 || end < start {
        return Err(OrcError::Format(format!(
            "corrupt child offsets: row={row}, start={start}, end={end}"
        )));
    }
    Ok((start as usize, (end - start) as usize))
}

fn append_bytes(
    orc_type: &OrcType,
    batch: &VectorBatch,
    row_offset: usize,
    row_count: usize,
    builder: &mut ColumnBuilder,
) -> Result<()> {
    let VectorPayload::Bytes { data } = &batch.payload else {
        return Err(payload_mismatch(orc_type.kind_name()));
    };
    for row in row_offset..row_offset + row_count {
        if !is_present(batch, row) {
            match builder {
                ColumnBuilder::Utf8(b) => b.append_null(),
                ColumnBuilder::LargeUtf8(b) => b.append_null(),
                ColumnBuilder::Binary(b) => b.append_null(),
                ColumnBuilder::LargeBinary(b) => b.append_null(),
                ColumnBuilder::FixedSizeBinary { builder: b, .. } => b.append_null(),
                _ => return Err(target_mismatch(orc_type.kind_name())),
            }
            continue;
        }
        let Some(bytes) = data[row].as_deref() else {
            return Err(OrcError::Format(format!(
                "missing bytes payload for present row: kind={}, row={}",
                orc_type.kind_name(),
                row
            )));
        };
        match builder {
            ColumnBuilder::Utf8(b) => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    OrcError::Format(format!(
                        "invalid utf8 in string column: row={row}, error={e}"
                    ))
                })?;
                b.append_value(text);
            }
            ColumnBuilder::LargeUtf8(b) => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    OrcError::Format(format!(
                        "invalid utf8 in string column: row={row}, error={e}"
                    ))
                })?;
                b.append_value(text);
            }
            ColumnBuilder::Binary(b) => b.append_value(bytes),
            ColumnBuilder::LargeBinary(b) => b.append_value(bytes),
            ColumnBuilder::FixedSizeBinary { builder: b, width } => {
                if bytes.len() != *width as usize {
                    return Err(OrcError::Format(format!(
                        "char width mismatch: row={}, length={}, width={}",
                        row,
                        bytes.len(),
                        width
                    )));
                }
                b.append_value(bytes).map_err(|e| {
                    OrcError::Format(format!(
                        "append fixed-size value failed: row={row}, error={e}"
                    ))
                })?;
            }
            _ => return Err(target_mismatch(orc_type.kind_name())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, ListArray, TimestampNanosecondArray};
    use arrow::datatypes::DataType;

    fn long_batch(values: Vec<i64>, nulls: Vec<usize>) -> VectorBatch {
        let capacity = values.len();
        let mut batch = VectorBatch::for_type(&OrcType::Long, capacity).expect("batch");
        batch.num_elements = capacity;
        let VectorPayload::Long { data } = &mut batch.payload else {
            unreachable!();
        };
        data.copy_from_slice(&values);
        for row in nulls {
            batch.not_null[row] = false;
            batch.has_nulls = true;
        }
        batch
    }

    #[test]
    fn pruned_sentinel_is_a_no_op() {
        let batch = long_batch(vec![1, 2], vec![]);
        let mut builder = ColumnBuilder::for_data_type(&DataType::Int64).expect("builder");
        append_batch(None, &batch, 0, 2, &mut builder).expect("append");
        let array = builder.finish().expect("finish");
        assert_eq!(array.len(), 0);
    }

    #[test]
    fn long_window_respects_offset_and_nulls() {
        let batch = long_batch(vec![10, 20, 30, 40], vec![2]);
        let mut builder = ColumnBuilder::for_data_type(&DataType::Int64).expect("builder");
        append_batch(Some(&OrcType::Long), &batch, 1, 3, &mut builder).expect("append");
        let array = builder.finish().expect("finish");
        let ints = array.as_any().downcast_ref::<Int64Array>().expect("int64");
        assert_eq!(ints.len(), 3);
        assert_eq!(ints.value(0), 20);
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), 40);
    }

    #[test]
    fn timestamp_combines_seconds_and_nanos() {
        let mut batch = VectorBatch::for_type(&OrcType::Timestamp, 2).expect("batch");
        batch.num_elements = 2;
        let VectorPayload::Timestamp { seconds, nanos } = &mut batch.payload else {
            unreachable!();
        };
        seconds[0] = 1;
        nanos[0] = 5;
        seconds[1] = -1;
        nanos[1] = 999_999_999;
        let ts_type = DataType::Timestamp(arrow::datatypes::TimeUnit::Nanosecond, None);
        let mut builder = ColumnBuilder::for_data_type(&ts_type).expect("builder");
        append_batch(Some(&OrcType::Timestamp), &batch, 0, 2, &mut builder).expect("append");
        let array = builder.finish().expect("finish");
        let ts = array
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()
            .expect("timestamps");
        assert_eq!(ts.value(0), 1_000_000_005);
        assert_eq!(ts.value(1), -1);
    }

    #[test]
    fn list_rows_recurse_into_child_ranges() {
        let list_type = OrcType::List {
            child: Box::new(OrcType::Long),
        };
        let mut batch = VectorBatch::for_type(&list_type, 3).expect("batch");
        batch.num_elements = 3;
        batch.has_nulls = true;
        batch.not_null[1] = false;
        let VectorPayload::List { offsets, child } = &mut batch.payload else {
            unreachable!();
        };
        offsets.copy_from_slice(&[0, 2, 2, 3]);
        child.num_elements = 3;
        let VectorPayload::Long { data } = &mut child.payload else {
            unreachable!();
        };
        data.copy_from_slice(&[7, 8, 9]);

        let arrow_type = crate::schema::arrow_type_from_orc(Some(&list_type)).expect("type");
        let mut builder = ColumnBuilder::for_data_type(&arrow_type).expect("builder");
        append_batch(Some(&list_type), &batch, 0, 3, &mut builder).expect("append");
        let array = builder.finish().expect("finish");
        let list = array.as_any().downcast_ref::<ListArray>().expect("list");
        assert_eq!(list.len(), 3);
        assert!(list.is_valid(0));
        assert!(list.is_null(1));
        assert_eq!(list.value_offsets(), &[0, 2, 2, 3]);
    }

    #[test]
    fn corrupt_offsets_are_rejected() {
        let list_type = OrcType::List {
            child: Box::new(OrcType::Long),
        };
        let mut batch = VectorBatch::for_type(&list_type, 2).expect("batch");
        batch.num_elements = 2;
        let VectorPayload::List { offsets, .. } = &mut batch.payload else {
            unreachable!();
        };
        offsets.copy_from_slice(&[0, 3, 1]);
        let arrow_type = crate::schema::arrow_type_from_orc(Some(&list_type)).expect("type");
        let mut builder = ColumnBuilder::for_data_type(&arrow_type).expect("builder");
        let err = append_batch(Some(&list_type), &batch, 0, 2, &mut builder)
            .expect_err("corrupt offsets");
        assert!(matches!(err, OrcError::Format(_)), "err={}", err);
    }

    #[test]
    fn union_kind_is_not_implemented() {
        let union_type = OrcType::Union {
            children: vec![OrcType::Int],
        };
        let batch = long_batch(vec![0], vec![]);
        let mut builder = ColumnBuilder::for_data_type(&DataType::Int64).expect("builder");
        let err =
            append_batch(Some(&union_type), &batch, 0, 1, &mut builder).expect_err("union");
        assert!(matches!(err, OrcError::NotImplemented(_)), "err={}", err);
    }
}
