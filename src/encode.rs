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
//! Encode pipeline: fill stripe vector batches from Arrow arrays.
//!
//! Every call consumes `min(capacity - orc_offset, array_len -
//! arrow_offset)` rows and advances both cursors by that amount, so a
//! chunked column can stream through fixed-capacity batches without
//! chunk boundaries leaking into stripe boundaries.
//!
//! Struct encoding synthesizes a validity mask (struct validity AND the
//! incoming mask) and threads it into each child; rows under a null
//! struct row come out null regardless of the child's own validity.

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Date64Array, Decimal128Array,
    FixedSizeBinaryArray, FixedSizeListArray, Float32Array, Float64Array, Int8Array, Int16Array,
    Int32Array, Int64Array, LargeBinaryArray, LargeListArray, LargeStringArray, ListArray,
    MapArray, StringArray, StructArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};

use crate::error::{OrcError, Result};
use crate::vector::{VectorBatch, VectorPayload};

/// Source and destination positions for one encode call.
///
/// `arrow_offset` indexes into the source array, `orc_offset` into the
/// destination batch. Both advance together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPair {
    pub arrow_offset: usize,
    pub orc_offset: usize,
}

fn mask_valid(mask: Option<&[bool]>, index: usize) -> bool {
    mask.is_none_or(|mask| mask[index])
}

fn payload_mismatch(data_type: &DataType) -> OrcError {
    OrcError::Format(format!("encode payload mismatch: type={data_type:?}"))
}

fn downcast_failed(data_type: &DataType) -> OrcError {
    OrcError::Format(format!("encode downcast failed: type={data_type:?}"))
}

/// Write up to `capacity - orc_offset` rows of `array` (starting at
/// `arrow_offset`) into `batch`, advancing both cursors. Returns the
/// number of rows written.
pub fn write_array_batch(
    batch: &mut VectorBatch,
    cursors: &mut CursorPair,
    capacity: usize,
    array: &dyn Array,
    incoming_mask: Option<&[bool]>,
) -> Result<usize> {
    let available = array.len().saturating_sub(cursors.arrow_offset);
    let room = capacity.saturating_sub(cursors.orc_offset);
    let rows = available.min(room);
    if rows == 0 {
        return Ok(0);
    }
    if let Some(mask) = incoming_mask
        && mask.len() != rows
    {
        return Err(OrcError::Format(format!(
            "encode mask length mismatch: mask={}, rows={}",
            mask.len(),
            rows
        )));
    }
    batch.resize(cursors.orc_offset + rows);

    let start_arrow = cursors.arrow_offset;
    let start_orc = cursors.orc_offset;
    let data_type = array.data_type().clone();
    match &data_type {
        DataType::Boolean => {
            let arr = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| i64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Int8 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int8Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| i64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Int16 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int16Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| i64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Int32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| i64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Int64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j))
            })?;
        }
        DataType::Date32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_long(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| i64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Float32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_double(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| f64::from(arr.value(start_arrow + j)))
            })?;
        }
        DataType::Float64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_double(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j))
            })?;
        }
        // Date64 carries milliseconds since epoch and encodes as a
        // millisecond timestamp.
        DataType::Date64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Date64Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_timestamp(
                batch,
                start_orc,
                rows,
                incoming_mask,
                &data_type,
                1_000,
                1_000_000,
                |j| {
                    arr.is_valid(start_arrow + j)
                        .then(|| arr.value(start_arrow + j))
                },
            )?;
        }
        DataType::Timestamp(unit, _tz) => {
            let (units_per_second, unit_to_nano) = match unit {
                TimeUnit::Second => (1, 1_000_000_000),
                TimeUnit::Millisecond => (1_000, 1_000_000),
                TimeUnit::Microsecond => (1_000_000, 1_000),
                TimeUnit::Nanosecond => (1_000_000_000, 1),
            };
            let values: Box<dyn Fn(usize) -> Option<i64> + '_> = match unit {
                TimeUnit::Second => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampSecondArray>()
                        .ok_or_else(|| downcast_failed(&data_type))?;
                    Box::new(move |j| {
                        arr.is_valid(start_arrow + j)
                            .then(|| arr.value(start_arrow + j))
                    })
                }
                TimeUnit::Millisecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampMillisecondArray>()
                        .ok_or_else(|| downcast_failed(&data_type))?;
                    Box::new(move |j| {
                        arr.is_valid(start_arrow + j)
                            .then(|| arr.value(start_arrow + j))
                    })
                }
                TimeUnit::Microsecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampMicrosecondArray>()
                        .ok_or_else(|| downcast_failed(&data_type))?;
                    Box::new(move |j| {
                        arr.is_valid(start_arrow + j)
                            .then(|| arr.value(start_arrow + j))
                    })
                }
                TimeUnit::Nanosecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampNanosecondArray>()
                        .ok_or_else(|| downcast_failed(&data_type))?;
                    Box::new(move |j| {
                        arr.is_valid(start_arrow + j)
                            .then(|| arr.value(start_arrow + j))
                    })
                }
            };
            fill_timestamp(
                batch,
                start_orc,
                rows,
                incoming_mask,
                &data_type,
                units_per_second,
                unit_to_nano,
                values,
            )?;
        }
        DataType::Decimal128(precision, _scale) => {
            let arr = array
                .as_any()
                .downcast_ref::<Decimal128Array>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_decimal(batch, start_orc, rows, incoming_mask, &data_type, *precision, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j))
            })?;
        }
        DataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_bytes(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j).as_bytes().to_vec())
            })?;
        }
        DataType::LargeUtf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_bytes(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j).as_bytes().to_vec())
            })?;
        }
        DataType::Binary => {
            let arr = array
                .as_any()
                .downcast_ref::<BinaryArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_bytes(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j).to_vec())
            })?;
        }
        DataType::LargeBinary => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeBinaryArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_bytes(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j).to_vec())
            })?;
        }
        DataType::FixedSizeBinary(_) => {
            let arr = array
                .as_any()
                .downcast_ref::<FixedSizeBinaryArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            fill_bytes(batch, start_orc, rows, incoming_mask, &data_type, |j| {
                arr.is_valid(start_arrow + j)
                    .then(|| arr.value(start_arrow + j).to_vec())
            })?;
        }
        DataType::Struct(_) => {
            let arr = array
                .as_any()
                .downcast_ref::<StructArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            write_struct(batch, start_arrow, start_orc, rows, capacity, arr, incoming_mask)?;
        }
        DataType::List(_) => {
            let arr = array
                .as_any()
                .downcast_ref::<ListArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            let offsets = arr.value_offsets().to_vec();
            let values = arr.values().clone();
            write_list(batch, start_arrow, start_orc, rows, incoming_mask, arr, &values, |i| {
                offsets[i] as usize
            })?;
        }
        DataType::LargeList(_) => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeListArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            let offsets = arr.value_offsets().to_vec();
            let values = arr.values().clone();
            write_list(batch, start_arrow, start_orc, rows, incoming_mask, arr, &values, |i| {
                offsets[i] as usize
            })?;
        }
        DataType::FixedSizeList(_, value_length) => {
            let arr = array
                .as_any()
                .downcast_ref::<FixedSizeListArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            let values = arr.values().clone();
            let length = *value_length as usize;
            let base = arr.value_offset(0) as usize;
            write_list(batch, start_arrow, start_orc, rows, incoming_mask, arr, &values, |i| {
                base + i * length
            })?;
        }
        DataType::Map(_, _) => {
            let arr = array
                .as_any()
                .downcast_ref::<MapArray>()
                .ok_or_else(|| downcast_failed(&data_type))?;
            write_map(batch, start_arrow, start_orc, rows, incoming_mask, arr)?;
        }
        other => {
            return Err(OrcError::NotImplemented(format!(
                "writing arrow type: type={other:?}"
            )));
        }
    }

    cursors.arrow_offset += rows;
    cursors.orc_offset += rows;
    batch.num_elements = batch.num_elements.max(cursors.orc_offset);
    Ok(rows)
}

fn fill_long(
    batch: &mut VectorBatch,
    start: usize,
    rows: usize,
    mask: Option<&[bool]>,
    data_type: &DataType,
    value: impl Fn(usize) -> Option<i64>,
) -> Result<()> {
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::Long { data } = payload else {
        return Err(payload_mismatch(data_type));
    };
    for j in 0..rows {
        let row = start + j;
        match value(j).filter(|_| mask_valid(mask, j)) {
            Some(v) => {
                not_null[row] = true;
                data[row] = v;
            }
            None => {
                not_null[row] = false;
                *has_nulls = true;
            }
        }
    }
    Ok(())
}

fn fill_double(
    batch: &mut VectorBatch,
    start: usize,
    rows: usize,
    mask: Option<&[bool]>,
    data_type: &DataType,
    value: impl Fn(usize) -> Option<f64>,
) -> Result<()> {
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::Double { data } = payload else {
        return Err(payload_mismatch(data_type));
    };
    for j in 0..rows {
        let row = start + j;
        match value(j).filter(|_| mask_valid(mask, j)) {
            Some(v) => {
                not_null[row] = true;
                data[row] = v;
            }
            None => {
                not_null[row] = false;
                *has_nulls = true;
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fill_timestamp(
    batch: &mut VectorBatch,
    start: usize,
    rows: usize,
    mask: Option<&[bool]>,
    data_type: &DataType,
    units_per_second: i64,
    unit_to_nano: i64,
    value: impl Fn(usize) -> Option<i64>,
) -> Result<()> {
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::Timestamp { seconds, nanos } = payload else {
        return Err(payload_mismatch(data_type));
    };
    for j in 0..rows {
        let row = start + j;
        match value(j).filter(|_| mask_valid(mask, j)) {
            Some(v) => {
                not_null[row] = true;
                seconds[row] = v.div_euclid(units_per_second);
                nanos[row] = v.rem_euclid(units_per_second) * unit_to_nano;
            }
            None => {
                not_null[row] = false;
                *has_nulls = true;
            }
        }
    }
    Ok(())
}

fn fill_decimal(
    batch: &mut VectorBatch,
    start: usize,
    rows: usize,
    mask: Option<&[bool]>,
    data_type: &DataType,
    precision: u8,
    value: impl Fn(usize) -> Option<i128>,
) -> Result<()> {
    use crate::types::OrcType;
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    if OrcType::decimal_is_wide(precision) {
        let VectorPayload::Decimal128 { data } = payload else {
            return Err(payload_mismatch(data_type));
        };
        for j in 0..rows {
            let row = start + j;
            match value(j).filter(|_| mask_valid(mask, j)) {
                Some(v) => {
                    not_null[row] = true;
                    data[row] = v;
                }
                None => {
                    not_null[row] = false;
                    *has_nulls = true;
                }
            }
        }
    } else {
        let VectorPayload::Decimal64 { data } = payload else {
            return Err(payload_mismatch(data_type));
        };
        for j in 0..rows {
            let row = start + j;
            match value(j).filter(|_| mask_valid(mask, j)) {
                Some(v) => {
                    not_null[row] = true;
                    // Precision <= 18 fits in the low 64 bits.
                    data[row] = v as i64;
                }
                None => {
                    not_null[row] = false;
                    *has_nulls = true;
                }
            }
        }
    }
    Ok(())
}

fn fill_bytes(
    batch: &mut VectorBatch,
    start: usize,
    rows: usize,
    mask: Option<&[bool]>,
    data_type: &DataType,
    value: impl Fn(usize) -> Option<Vec<u8>>,
) -> Result<()> {
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::Bytes { data } = payload else {
        return Err(payload_mismatch(data_type));
    };
    for j in 0..rows {
        let row = start + j;
        match value(j).filter(|_| mask_valid(mask, j)) {
            Some(buffer) => {
                not_null[row] = true;
                // Replace the row slot; the old buffer is dropped.
                data[row] = Some(buffer);
            }
            None => {
                not_null[row] = false;
                *has_nulls = true;
            }
        }
    }
    Ok(())
}

fn write_struct(
    batch: &mut VectorBatch,
    start_arrow: usize,
    start_orc: usize,
    rows: usize,
    capacity: usize,
    array: &StructArray,
    incoming_mask: Option<&[bool]>,
) -> Result<()> {
    // Pass 1: struct validity AND incoming mask becomes both this
    // level's validity and the mask threaded into every child.
    let mut child_mask = vec![false; rows];
    {
        let VectorBatch {
            has_nulls,
            not_null,
            ..
        } = batch;
        for j in 0..rows {
            let present = mask_valid(incoming_mask, j) && array.is_valid(start_arrow + j);
            child_mask[j] = present;
            not_null[start_orc + j] = present;
            if !present {
                *has_nulls = true;
            }
        }
    }

    let VectorPayload::Struct { children } = &mut batch.payload else {
        return Err(payload_mismatch(array.data_type()));
    };
    if children.len() != array.num_columns() {
        return Err(OrcError::Format(format!(
            "struct child count mismatch: batch_children={}, array_columns={}",
            children.len(),
            array.num_columns()
        )));
    }
    // Pass 2: each child consumes the same row range with its own
    // cursor pair.
    for (child, column) in children.iter_mut().zip(array.columns()) {
        child.resize(start_orc + rows);
        let mut child_cursors = CursorPair {
            arrow_offset: start_arrow,
            orc_offset: start_orc,
        };
        write_array_batch(
            child,
            &mut child_cursors,
            capacity,
            column.as_ref(),
            Some(&child_mask),
        )?;
    }
    Ok(())
}

fn write_list(
    batch: &mut VectorBatch,
    start_arrow: usize,
    start_orc: usize,
    rows: usize,
    incoming_mask: Option<&[bool]>,
    array: &dyn Array,
    values: &ArrayRef,
    value_offset: impl Fn(usize) -> usize,
) -> Result<()> {
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::List { offsets, child } = payload else {
        return Err(payload_mismatch(array.data_type()));
    };
    // The first offset is seeded exactly once per batch.
    if start_orc == 0 {
        offsets[0] = 0;
    }
    for j in 0..rows {
        let row = start_orc + j;
        let index = start_arrow + j;
        let present = mask_valid(incoming_mask, j) && array.is_valid(index);
        if present {
            let delta = value_offset(index + 1) - value_offset(index);
            offsets[row + 1] = offsets[row] + delta as i64;
            not_null[row] = true;
        } else {
            offsets[row + 1] = offsets[row];
            not_null[row] = false;
            *has_nulls = true;
        }
    }
    let child_end = offsets[start_orc + rows] as usize;
    child.resize(child_end);
    for j in 0..rows {
        let row = start_orc + j;
        if !not_null[row] {
            continue;
        }
        let index = start_arrow + j;
        let mut child_cursors = CursorPair {
            arrow_offset: value_offset(index),
            orc_offset: offsets[row] as usize,
        };
        write_array_batch(
            child,
            &mut child_cursors,
            offsets[row + 1] as usize,
            values.as_ref(),
            None,
        )?;
    }
    child.num_elements = child.num_elements.max(child_end);
    Ok(())
}

fn write_map(
    batch: &mut VectorBatch,
    start_arrow: usize,
    start_orc: usize,
    rows: usize,
    incoming_mask: Option<&[bool]>,
    array: &MapArray,
) -> Result<()> {
    let value_offsets = array.value_offsets().to_vec();
    let key_array = array.keys().clone();
    let value_array = array.values().clone();
    let VectorBatch {
        has_nulls,
        not_null,
        payload,
        ..
    } = batch;
    let VectorPayload::Map {
        offsets,
        keys,
        values,
    } = payload
    else {
        return Err(payload_mismatch(array.data_type()));
    };
    if start_orc == 0 {
        offsets[0] = 0;
    }
    for j in 0..rows {
        let row = start_orc + j;
        let index = start_arrow + j;
        let present = mask_valid(incoming_mask, j) && array.is_valid(index);
        if present {
            let delta = (value_offsets[index + 1] - value_offsets[index]) as i64;
            offsets[row + 1] = offsets[row] + delta;
            not_null[row] = true;
        } else {
            offsets[row + 1] = offsets[row];
            not_null[row] = false;
            *has_nulls = true;
        }
    }
    let child_end = offsets[start_orc + rows] as usize;
    keys.resize(child_end);
    values.resize(child_end);
    for j in 0..rows {
        let row = start_orc + j;
        if !not_null[row] {
            continue;
        }
        let index = start_arrow + j;
        let child_start = value_offsets[index] as usize;
        let child_capacity = offsets[row + 1] as usize;
        let mut key_cursors = CursorPair {
            arrow_offset: child_start,
            orc_offset: offsets[row] as usize,
        };
        write_array_batch(keys, &mut key_cursors, child_capacity, key_array.as_ref(), None)?;
        let mut value_cursors = CursorPair {
            arrow_offset: child_start,
            orc_offset: offsets[row] as usize,
        };
        write_array_batch(
            values,
            &mut value_cursors,
            child_capacity,
            value_array.as_ref(),
            None,
        )?;
    }
    keys.num_elements = keys.num_elements.max(child_end);
    values.num_elements = values.num_elements.max(child_end);
    Ok(())
}

/// Stream one chunked column into `batch` until either the batch is
/// full or the chunks run out.
///
/// `chunk_index`/`chunk_offset` persist across calls so consecutive
/// batches pick up exactly where the previous one stopped.
pub fn write_chunked_column(
    batch: &mut VectorBatch,
    chunk_index: &mut usize,
    chunk_offset: &mut usize,
    capacity: usize,
    chunks: &[ArrayRef],
) -> Result<usize> {
    let mut orc_offset = 0usize;
    while *chunk_index < chunks.len() && orc_offset < capacity {
        let array = &chunks[*chunk_index];
        let mut cursors = CursorPair {
            arrow_offset: *chunk_offset,
            orc_offset,
        };
        write_array_batch(batch, &mut cursors, capacity, array.as_ref(), None)?;
        orc_offset = cursors.orc_offset;
        *chunk_offset = cursors.arrow_offset;
        if orc_offset < capacity {
            // Chunk exhausted with room to spare; move to the next one.
            *chunk_offset = 0;
            *chunk_index += 1;
        }
    }
    batch.num_elements = orc_offset;
    Ok(orc_offset)
}
