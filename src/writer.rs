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
//! Arrow-facing write facade over stripe files.
//!
//! The schema is translated to the column type tree once at open.
//! `write` re-chunks the incoming record batches into fixed-size row
//! chunks; every chunk becomes one stripe. Chunk boundaries do not have
//! to line up with record batch boundaries, so each column keeps its own
//! position across the incoming arrays. The root batch is allocated once
//! and reused between chunks.

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::encode::write_chunked_column;
use crate::error::{OrcError, Result};
use crate::io::OutputSink;
use crate::schema::orc_schema_from_arrow;
use crate::stripe::StripeWriter;
use crate::types::OrcType;
use crate::vector::{VectorBatch, VectorPayload};

/// Rows per stripe.
const WRITE_BATCH_SIZE: usize = 1024;

pub struct OrcFileWriter<S: OutputSink> {
    schema: SchemaRef,
    root_type: OrcType,
    stripe_writer: StripeWriter<S>,
}

impl<S: OutputSink> OrcFileWriter<S> {
    /// Translate `schema` and prepare an empty file on `sink`.
    pub fn open(schema: SchemaRef, sink: S) -> Result<Self> {
        let root_type = orc_schema_from_arrow(&schema)?;
        let mut metadata: Vec<(String, String)> = schema
            .metadata()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        // Schema metadata is a hash map; fix the on-disk order.
        metadata.sort();
        let stripe_writer = StripeWriter::new(sink, root_type.clone(), metadata)?;
        Ok(Self {
            schema,
            root_type,
            stripe_writer,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Append a table given as record batches. May be called repeatedly;
    /// every call starts a new stripe.
    pub fn write(&mut self, batches: &[RecordBatch]) -> Result<()> {
        for (index, batch) in batches.iter().enumerate() {
            if batch.schema().fields() != self.schema.fields() {
                return Err(OrcError::InvalidArgument(format!(
                    "record batch schema mismatch: batch={index}"
                )));
            }
        }
        let column_count = self.schema.fields().len();
        let total_rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let mut chunks: Vec<Vec<ArrayRef>> = (0..column_count).map(|_| Vec::new()).collect();
        for batch in batches {
            for (column, chunk_list) in batch.columns().iter().zip(&mut chunks) {
                chunk_list.push(column.clone());
            }
        }
        let mut chunk_index = vec![0usize; column_count];
        let mut chunk_offset = vec![0usize; column_count];
        let mut root = VectorBatch::for_type(&self.root_type, WRITE_BATCH_SIZE)?;
        let mut remaining = total_rows;
        while remaining > 0 {
            root.clear();
            let capacity = remaining.min(WRITE_BATCH_SIZE);
            let VectorPayload::Struct { children } = &mut root.payload else {
                return Err(OrcError::Format(
                    "root batch payload is not a struct".to_string(),
                ));
            };
            let mut rows_written = capacity;
            for (index, child) in children.iter_mut().enumerate() {
                let rows = write_chunked_column(
                    child,
                    &mut chunk_index[index],
                    &mut chunk_offset[index],
                    capacity,
                    &chunks[index],
                )?;
                if index == 0 {
                    rows_written = rows;
                } else if rows != rows_written {
                    return Err(OrcError::Format(format!(
                        "column chunk lengths diverge: column={index}, rows={rows}, expected={rows_written}"
                    )));
                }
            }
            if rows_written == 0 {
                break;
            }
            root.num_elements = rows_written;
            self.stripe_writer.add_stripe(&root)?;
            remaining -= rows_written;
        }
        debug!(
            "wrote table: rows={}, stripes={}",
            total_rows,
            self.stripe_writer.stripes().len()
        );
        Ok(())
    }

    /// Write footer and trailer, close the sink and hand it back.
    pub fn close(self) -> Result<S> {
        self.stripe_writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::io::{MemoryInput, MemorySink};
    use crate::reader::OrcFileReader;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]))
    }

    fn batch(ids: &[i64], names: &[Option<&str>]) -> RecordBatch {
        RecordBatch::try_new(
            test_schema(),
            vec![
                Arc::new(Int64Array::from(ids.to_vec())),
                Arc::new(StringArray::from(names.to_vec())),
            ],
        )
        .expect("record batch")
    }

    #[test]
    fn small_table_becomes_one_stripe() {
        let mut writer = OrcFileWriter::open(test_schema(), MemorySink::new()).expect("open");
        writer
            .write(&[
                batch(&[1, 2], &[Some("a"), Some("b")]),
                batch(&[3], &[None]),
            ])
            .expect("write");
        let bytes = writer.close().expect("close").into_bytes();

        let reader = OrcFileReader::open(Box::new(MemoryInput::new(bytes))).expect("reopen");
        assert_eq!(reader.number_of_stripes(), 1);
        assert_eq!(reader.number_of_rows(), 3);
        let table = reader.read().expect("read");
        let ids = table
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("ids");
        assert_eq!(ids.values(), &[1, 2, 3]);
    }

    #[test]
    fn large_table_splits_into_fixed_stripes() {
        let ids: Vec<i64> = (0..2500).collect();
        let names: Vec<Option<&str>> = (0..2500).map(|_| Some("x")).collect();
        let mut writer = OrcFileWriter::open(test_schema(), MemorySink::new()).expect("open");
        writer.write(&[batch(&ids, &names)]).expect("write");
        let bytes = writer.close().expect("close").into_bytes();

        let reader = OrcFileReader::open(Box::new(MemoryInput::new(bytes))).expect("reopen");
        assert_eq!(reader.number_of_stripes(), 3);
        let info = reader.stripe_information();
        assert_eq!(info[0].num_rows, 1024);
        assert_eq!(info[1].num_rows, 1024);
        assert_eq!(info[2].num_rows, 452);
        assert_eq!(reader.read().expect("read").num_rows(), 2500);
    }

    #[test]
    fn mismatched_batch_schema_is_rejected() {
        let other = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]));
        let wrong = RecordBatch::try_new(
            other,
            vec![Arc::new(arrow::array::Int32Array::from(vec![1])) as ArrayRef],
        )
        .expect("record batch");
        let mut writer = OrcFileWriter::open(test_schema(), MemorySink::new()).expect("open");
        let err = writer.write(&[wrong]).expect_err("schema mismatch");
        assert!(matches!(err, OrcError::InvalidArgument(_)), "err={}", err);
    }

    #[test]
    fn metadata_round_trips_through_the_file() {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("owner".to_string(), "ingest".to_string());
        let schema = Arc::new(
            Schema::new(vec![Field::new("id", DataType::Int64, true)]).with_metadata(metadata),
        );
        let mut writer = OrcFileWriter::open(schema.clone(), MemorySink::new()).expect("open");
        let ids = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from(vec![7])) as ArrayRef],
        )
        .expect("record batch");
        writer.write(&[ids]).expect("write");
        let bytes = writer.close().expect("close").into_bytes();

        let reader = OrcFileReader::open(Box::new(MemoryInput::new(bytes))).expect("reopen");
        assert_eq!(
            reader.metadata(),
            &[("owner".to_string(), "ingest".to_string())]
        );
        let schema = reader.read_schema().expect("schema");
        assert_eq!(schema.metadata().get("owner").map(String::as_str), Some("ingest"));
    }
}
