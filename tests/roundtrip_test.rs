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
/// End-to-end tests: Arrow tables through the stripe file and back.
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, Date64Array, Decimal128Array, FixedSizeBinaryArray,
    Int32Array, Int64Array, Int64Builder, ListBuilder, MapBuilder, StringArray, StringBuilder,
    StructBuilder, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Fields, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;

use orcbridge::{MemoryInput, MemorySink, OrcError, OrcFileReader, OrcFileWriter};

fn make_batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

fn write_to_memory(batches: &[RecordBatch]) -> Vec<u8> {
    let mut writer = OrcFileWriter::open(batches[0].schema(), MemorySink::new()).unwrap();
    writer.write(batches).unwrap();
    writer.close().unwrap().into_bytes()
}

fn reopen(bytes: Vec<u8>) -> OrcFileReader {
    OrcFileReader::open(Box::new(MemoryInput::new(bytes))).unwrap()
}

fn round_trip(batch: &RecordBatch) -> RecordBatch {
    reopen(write_to_memory(std::slice::from_ref(batch)))
        .read()
        .unwrap()
}

#[test]
fn test_scalar_columns_with_nulls_round_trip() {
    let batch = make_batch(vec![
        (
            "rank",
            Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])) as ArrayRef,
        ),
        (
            "id",
            Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])) as ArrayRef,
        ),
        (
            "name",
            Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])) as ArrayRef,
        ),
    ]);
    assert_eq!(round_trip(&batch), batch);
}

#[test]
fn test_list_and_map_columns_round_trip() {
    let mut tags = ListBuilder::new(Int64Builder::new());
    tags.values().append_value(1);
    tags.values().append_value(2);
    tags.append(true);
    tags.append(false); // null row
    tags.append(true); // empty row
    let tags = Arc::new(tags.finish()) as ArrayRef;

    let mut attrs = MapBuilder::new(None, StringBuilder::new(), Int64Builder::new());
    attrs.keys().append_value("k1");
    attrs.values().append_value(10);
    attrs.keys().append_value("k2");
    attrs.values().append_null();
    attrs.append(true).unwrap();
    attrs.append(false).unwrap(); // null row
    attrs.keys().append_value("k3");
    attrs.values().append_value(30);
    attrs.append(true).unwrap();
    let attrs = Arc::new(attrs.finish()) as ArrayRef;

    let batch = make_batch(vec![("tags", tags), ("attrs", attrs)]);
    assert_eq!(round_trip(&batch), batch);
}

#[test]
fn test_struct_of_list_and_map_round_trip() {
    let entries = Field::new(
        "entries",
        DataType::Struct(Fields::from(vec![
            Field::new("keys", DataType::Utf8, false),
            Field::new("values", DataType::Int64, true),
        ])),
        false,
    );
    let fields = Fields::from(vec![
        Field::new("x", DataType::Int64, true),
        Field::new(
            "names",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            true,
        ),
        Field::new("attrs", DataType::Map(Arc::new(entries), false), true),
    ]);
    let mut info = StructBuilder::new(
        fields.clone(),
        vec![
            Box::new(Int64Builder::new()),
            Box::new(ListBuilder::new(StringBuilder::new())),
            Box::new(MapBuilder::new(None, StringBuilder::new(), Int64Builder::new())),
        ],
    );
    // row 0: x=7, names=["p", "q"], attrs={"k": 1, "n": null}
    info.field_builder::<Int64Builder>(0).unwrap().append_value(7);
    let names = info.field_builder::<ListBuilder<StringBuilder>>(1).unwrap();
    names.values().append_value("p");
    names.values().append_value("q");
    names.append(true);
    let attrs = info
        .field_builder::<MapBuilder<StringBuilder, Int64Builder>>(2)
        .unwrap();
    attrs.keys().append_value("k");
    attrs.values().append_value(1);
    attrs.keys().append_value("n");
    attrs.values().append_null();
    attrs.append(true).unwrap();
    info.append(true);
    // row 1: null struct
    info.field_builder::<Int64Builder>(0).unwrap().append_null();
    info.field_builder::<ListBuilder<StringBuilder>>(1)
        .unwrap()
        .append(false);
    info.field_builder::<MapBuilder<StringBuilder, Int64Builder>>(2)
        .unwrap()
        .append(false)
        .unwrap();
    info.append(false);
    let info = Arc::new(info.finish()) as ArrayRef;

    let batch = make_batch(vec![("info", info)]);
    assert_eq!(round_trip(&batch), batch);
}

#[test]
fn test_timestamp_units_normalize_to_nanoseconds() {
    let millis = Arc::new(TimestampMillisecondArray::from(vec![
        Some(-1500),
        Some(2000),
        None,
    ])) as ArrayRef;
    let seconds = Arc::new(TimestampSecondArray::from(vec![Some(3), Some(-4), None]))
        as ArrayRef;
    let micros = Arc::new(TimestampMicrosecondArray::from(vec![
        Some(1_000_001),
        Some(-7),
        None,
    ])) as ArrayRef;
    let nanos = Arc::new(TimestampNanosecondArray::from(vec![
        Some(1_000_000_009),
        Some(-7),
        None,
    ])) as ArrayRef;
    let batch = make_batch(vec![("ms", millis), ("s", seconds), ("us", micros), ("ns", nanos)]);
    let out = round_trip(&batch);

    assert_eq!(
        out.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Nanosecond, None)
    );
    let ms = out
        .column(0)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(ms.value(0), -1_500_000_000);
    assert_eq!(ms.value(1), 2_000_000_000);
    assert!(ms.is_null(2));
    let s = out
        .column(1)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(s.value(0), 3_000_000_000);
    assert_eq!(s.value(1), -4_000_000_000);
    let us = out
        .column(2)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(us.value(0), 1_000_001_000);
    assert_eq!(us.value(1), -7_000);
    let ns = out
        .column(3)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(ns.value(0), 1_000_000_009);
    assert_eq!(ns.value(1), -7);
}

#[test]
fn test_date64_reads_back_as_timestamp() {
    let dates = Arc::new(Date64Array::from(vec![Some(86_400_000), None])) as ArrayRef;
    let out = round_trip(&make_batch(vec![("d", dates)]));
    assert_eq!(
        out.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Nanosecond, None)
    );
    let values = out
        .column(0)
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(values.value(0), 86_400_000_000_000);
    assert!(values.is_null(1));
}

#[test]
fn test_decimal_precision_routes_storage_width() {
    let narrow = Arc::new(
        Decimal128Array::from(vec![Some(12345_i128), Some(-67_i128), None])
            .with_precision_and_scale(10, 2)
            .unwrap(),
    ) as ArrayRef;
    let wide = Arc::new(
        Decimal128Array::from(vec![
            Some(i128::from(i64::MAX) * 100),
            Some(-1_i128),
            None,
        ])
        .with_precision_and_scale(30, 4)
        .unwrap(),
    ) as ArrayRef;
    let batch = make_batch(vec![("narrow", narrow), ("wide", wide)]);
    assert_eq!(round_trip(&batch), batch);
}

#[test]
fn test_fixed_size_binary_collapses_to_binary() {
    let fsb = Arc::new(
        FixedSizeBinaryArray::try_from_iter(vec![b"abcd".to_vec(), b"wxyz".to_vec()].into_iter())
            .unwrap(),
    ) as ArrayRef;
    let out = round_trip(&make_batch(vec![("b", fsb)]));
    assert_eq!(out.schema().field(0).data_type(), &DataType::Binary);
    let values = out
        .column(0)
        .as_any()
        .downcast_ref::<BinaryArray>()
        .unwrap();
    assert_eq!(values.value(0), b"abcd");
    assert_eq!(values.value(1), b"wxyz");
}

#[test]
fn test_multi_stripe_iteration_and_seek() {
    let ids: Vec<i64> = (0..2500).collect();
    let batch = make_batch(vec![(
        "id",
        Arc::new(Int64Array::from(ids)) as ArrayRef,
    )]);
    let mut reader = reopen(write_to_memory(&[batch]));
    assert_eq!(reader.number_of_stripes(), 3);
    assert_eq!(reader.number_of_rows(), 2500);

    let mut batch_rows = Vec::new();
    while let Some(stripe_reader) = reader.next_stripe_reader(1000).unwrap() {
        for batch in stripe_reader {
            batch_rows.push(batch.unwrap().num_rows());
        }
    }
    // 1024-row stripes sliced into 1000-row batches.
    assert_eq!(batch_rows, vec![1000, 24, 1000, 24, 452]);

    reader.seek(2000).unwrap();
    let mut stripe_reader = reader.next_stripe_reader(1000).unwrap().unwrap();
    let batch = stripe_reader.next_batch().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 48);
    let ids = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(ids.value(0), 2000);
    assert_eq!(ids.value(47), 2047);
}

#[test]
fn test_projection_is_sorted_and_deduplicated() {
    let batch = make_batch(vec![
        ("a", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
        (
            "b",
            Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef,
        ),
        ("c", Arc::new(Int64Array::from(vec![10, 20])) as ArrayRef),
    ]);
    let reader = reopen(write_to_memory(&[batch]));
    let out = reader.read_projected(&[2, 0, 2]).unwrap();
    assert_eq!(out.num_columns(), 2);
    assert_eq!(out.schema().field(0).name(), "a");
    assert_eq!(out.schema().field(1).name(), "c");
    let c = out
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(c.values(), &[10, 20]);
}

#[test]
fn test_empty_table_round_trip() {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
    let writer = OrcFileWriter::open(schema, MemorySink::new()).unwrap();
    let reader = reopen(writer.close().unwrap().into_bytes());
    assert_eq!(reader.number_of_rows(), 0);
    assert_eq!(reader.number_of_stripes(), 0);
    let out = reader.read().unwrap();
    assert_eq!(out.num_rows(), 0);
    assert_eq!(out.num_columns(), 1);
}

#[test]
fn test_corrupted_footer_is_rejected() {
    let batch = make_batch(vec![(
        "id",
        Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
    )]);
    let mut bytes = write_to_memory(&[batch]);
    let len = bytes.len();
    bytes[len - 20] ^= 0xff;
    let err = OrcFileReader::open(Box::new(MemoryInput::new(bytes))).unwrap_err();
    assert!(matches!(err, OrcError::Format(_)), "err={}", err);
}

#[test]
fn test_on_disk_round_trip() {
    orcbridge::orcbridge_logging::init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.orb");
    let batch = make_batch(vec![
        (
            "id",
            Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef,
        ),
        (
            "name",
            Arc::new(StringArray::from(vec![Some("a"), Some("b")])) as ArrayRef,
        ),
    ]);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = OrcFileWriter::open(batch.schema(), file).unwrap();
    writer.write(std::slice::from_ref(&batch)).unwrap();
    writer.close().unwrap();

    let reader = OrcFileReader::open_path(&path).unwrap();
    assert_eq!(reader.read().unwrap(), batch);
}
