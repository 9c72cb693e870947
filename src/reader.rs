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
//! Arrow-facing read facade over stripe files.
//!
//! Responsibilities:
//! - whole-table and per-stripe reads, with optional top-level column
//!   projection validated before any I/O
//! - a seekable row position feeding a lazy per-stripe batch iterator
//! - Arrow schema materialization including file metadata key/values
//!
//! Decoding always proceeds in sub-chunks of at most `READ_ROWS_BATCH`
//! rows so one oversized stripe does not dictate peak builder growth.

use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatchOptions;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::builder::ColumnBuilder;
use crate::decode::append_batch;
use crate::error::{OrcError, Result};
use crate::io::RangeInput;
use crate::schema::arrow_schema_from_orc;
use crate::stripe::{BatchWindow, RowCursor, StripeFile};
use crate::types::{OrcType, StripeInformation};
use crate::vector::VectorPayload;

/// Rows decoded per pass while filling one output batch.
const READ_ROWS_BATCH: usize = 1000;

pub struct OrcFileReader {
    file: StripeFile,
    current_row: u64,
}

impl std::fmt::Debug for OrcFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrcFileReader")
            .field("current_row", &self.current_row)
            .finish_non_exhaustive()
    }
}

impl OrcFileReader {
    pub fn open(input: Box<dyn RangeInput>) -> Result<Self> {
        let file = StripeFile::open(input)?;
        Ok(Self {
            file,
            current_row: 0,
        })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            OrcError::Io(format!(
                "open file failed: path={}, error={}",
                path.display(),
                e
            ))
        })?;
        Self::open(Box::new(file))
    }

    pub fn number_of_rows(&self) -> u64 {
        self.file.num_rows()
    }

    pub fn number_of_stripes(&self) -> u64 {
        self.file.stripes().len() as u64
    }

    pub fn stripe_information(&self) -> &[StripeInformation] {
        self.file.stripes()
    }

    pub fn metadata(&self) -> &[(String, String)] {
        self.file.metadata()
    }

    /// Arrow schema of the full column tree, metadata included.
    pub fn read_schema(&self) -> Result<SchemaRef> {
        self.projected_schema(None)
    }

    fn projected_schema(&self, include: Option<&[usize]>) -> Result<SchemaRef> {
        Ok(Arc::new(arrow_schema_from_orc(
            self.file.schema(),
            include,
            self.file.metadata(),
        )?))
    }

    fn validated_include(&self, include: &[i64]) -> Result<Vec<usize>> {
        let OrcType::Struct { fields } = self.file.schema() else {
            return Err(OrcError::Format(
                "stripe file root is not a struct".to_string(),
            ));
        };
        let mut indices = Vec::with_capacity(include.len());
        for &index in include {
            if index < 0 {
                return Err(OrcError::InvalidArgument(format!(
                    "negative field index: index={index}"
                )));
            }
            if index as usize >= fields.len() {
                return Err(OrcError::InvalidArgument(format!(
                    "field index out of range: index={}, field_count={}",
                    index,
                    fields.len()
                )));
            }
            indices.push(index as usize);
        }
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    /// Read the whole file as one record batch.
    pub fn read(&self) -> Result<RecordBatch> {
        let schema = self.projected_schema(None)?;
        self.read_rows(0, self.file.num_rows(), schema, None)
    }

    /// Read the whole file restricted to the given top-level fields.
    pub fn read_projected(&self, include: &[i64]) -> Result<RecordBatch> {
        let include = self.validated_include(include)?;
        let schema = self.projected_schema(Some(&include))?;
        self.read_rows(0, self.file.num_rows(), schema, Some(include))
    }

    /// Read the whole file, decoding into the caller's schema instead of
    /// the one derived from the file. Field count must match the file.
    pub fn read_with_schema(&self, schema: SchemaRef) -> Result<RecordBatch> {
        let OrcType::Struct { fields } = self.file.schema() else {
            return Err(OrcError::Format(
                "stripe file root is not a struct".to_string(),
            ));
        };
        if schema.fields().len() != fields.len() {
            return Err(OrcError::InvalidArgument(format!(
                "schema field count mismatch: requested={}, file={}",
                schema.fields().len(),
                fields.len()
            )));
        }
        self.read_rows(0, self.file.num_rows(), schema, None)
    }

    /// Read a single stripe by index.
    pub fn read_stripe(&self, stripe: i64) -> Result<RecordBatch> {
        self.read_stripe_inner(stripe, None)
    }

    /// Read a single stripe restricted to the given top-level fields.
    pub fn read_stripe_projected(&self, stripe: i64, include: &[i64]) -> Result<RecordBatch> {
        let include = self.validated_include(include)?;
        self.read_stripe_inner(stripe, Some(include))
    }

    fn read_stripe_inner(&self, stripe: i64, include: Option<Vec<usize>>) -> Result<RecordBatch> {
        let stripe_count = self.file.stripes().len();
        if stripe < 0 || stripe as usize >= stripe_count {
            return Err(OrcError::InvalidArgument(format!(
                "out of bounds stripe: stripe={stripe}, stripe_count={stripe_count}"
            )));
        }
        let info = &self.file.stripes()[stripe as usize];
        let start = info.first_row_of_stripe;
        let end = start + info.num_rows;
        let schema = self.projected_schema(include.as_deref())?;
        self.read_rows(start, end, schema, include)
    }

    /// Move the row position used by [`Self::next_stripe_reader`].
    pub fn seek(&mut self, row: i64) -> Result<()> {
        if row < 0 || row as u64 >= self.file.num_rows() {
            return Err(OrcError::InvalidArgument(format!(
                "seek out of range: row={}, num_rows={}",
                row,
                self.file.num_rows()
            )));
        }
        self.current_row = row as u64;
        Ok(())
    }

    /// Batch iterator over the remainder of the stripe containing the
    /// current row, or `None` past the last row. Advances the current
    /// row to the end of that stripe.
    pub fn next_stripe_reader(
        &mut self,
        batch_size: usize,
    ) -> Result<Option<StripeRecordBatchReader<'_>>> {
        self.next_stripe_reader_inner(batch_size, None)
    }

    /// Projected variant of [`Self::next_stripe_reader`].
    pub fn next_stripe_reader_projected(
        &mut self,
        batch_size: usize,
        include: &[i64],
    ) -> Result<Option<StripeRecordBatchReader<'_>>> {
        let include = self.validated_include(include)?;
        self.next_stripe_reader_inner(batch_size, Some(include))
    }

    fn next_stripe_reader_inner(
        &mut self,
        batch_size: usize,
        include: Option<Vec<usize>>,
    ) -> Result<Option<StripeRecordBatchReader<'_>>> {
        if batch_size == 0 {
            return Err(OrcError::InvalidArgument(
                "batch size must be positive".to_string(),
            ));
        }
        if self.current_row >= self.file.num_rows() {
            return Ok(None);
        }
        let row = self.current_row;
        let stripe_end = self
            .file
            .stripes()
            .iter()
            .find(|s| s.first_row_of_stripe <= row && row < s.first_row_of_stripe + s.num_rows)
            .map(|s| s.first_row_of_stripe + s.num_rows)
            .ok_or_else(|| OrcError::Format(format!("row outside every stripe: row={row}")))?;
        self.current_row = stripe_end;
        let schema = self.projected_schema(include.as_deref())?;
        let cursor = self.file.row_cursor(row, stripe_end, include.as_deref())?;
        let types = cursor.selected_types().into_iter().cloned().collect();
        debug!(
            "stripe reader: start_row={}, end_row={}, batch_size={}",
            row, stripe_end, batch_size
        );
        Ok(Some(StripeRecordBatchReader {
            cursor,
            schema,
            types,
            batch_size,
        }))
    }

    fn read_rows(
        &self,
        start_row: u64,
        end_row: u64,
        schema: SchemaRef,
        include: Option<Vec<usize>>,
    ) -> Result<RecordBatch> {
        let mut cursor = self.file.row_cursor(start_row, end_row, include.as_deref())?;
        let types: Vec<OrcType> = cursor.selected_types().into_iter().cloned().collect();
        let mut builders = builders_for(&schema)?;
        let mut total_rows = 0usize;
        while let Some(window) = cursor.next_window(READ_ROWS_BATCH)? {
            append_window(&mut builders, &types, &window)?;
            total_rows += window.length;
        }
        assemble_batch(schema, builders, total_rows)
    }
}

fn builders_for(schema: &SchemaRef) -> Result<Vec<ColumnBuilder>> {
    schema
        .fields()
        .iter()
        .map(|field| ColumnBuilder::for_data_type(field.data_type()))
        .collect()
}

fn append_window(
    builders: &mut [ColumnBuilder],
    types: &[OrcType],
    window: &BatchWindow<'_>,
) -> Result<()> {
    let VectorPayload::Struct { children } = &window.batch.payload else {
        return Err(OrcError::Format(
            "stripe root batch is not a struct".to_string(),
        ));
    };
    if children.len() != builders.len() {
        return Err(OrcError::Format(format!(
            "decoded column count mismatch: decoded={}, schema={}",
            children.len(),
            builders.len()
        )));
    }
    for (index, builder) in builders.iter_mut().enumerate() {
        append_batch(
            Some(&types[index]),
            &children[index],
            window.offset,
            window.length,
            builder,
        )?;
    }
    Ok(())
}

fn assemble_batch(
    schema: SchemaRef,
    builders: Vec<ColumnBuilder>,
    rows: usize,
) -> Result<RecordBatch> {
    let arrays = builders
        .into_iter()
        .map(ColumnBuilder::finish)
        .collect::<Result<Vec<_>>>()?;
    // Row count must be carried explicitly for zero-column projections.
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    RecordBatch::try_new_with_options(schema, arrays, &options)
        .map_err(|e| OrcError::Format(format!("assemble record batch failed: error={e}")))
}

/// Iterator over fixed-size record batches of one stripe's remainder.
pub struct StripeRecordBatchReader<'a> {
    cursor: RowCursor<'a>,
    schema: SchemaRef,
    types: Vec<OrcType>,
    batch_size: usize,
}

impl StripeRecordBatchReader<'_> {
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Produce the next batch of at most `batch_size` rows, or `None`
    /// when the stripe is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.cursor.remaining_rows() == 0 {
            return Ok(None);
        }
        let mut builders = builders_for(&self.schema)?;
        let mut total_rows = 0usize;
        while total_rows < self.batch_size {
            let want = (self.batch_size - total_rows).min(READ_ROWS_BATCH);
            let Some(window) = self.cursor.next_window(want)? else {
                break;
            };
            append_window(&mut builders, &self.types, &window)?;
            total_rows += window.length;
        }
        if total_rows == 0 {
            return Ok(None);
        }
        Ok(Some(assemble_batch(
            self.schema.clone(),
            builders,
            total_rows,
        )?))
    }
}

impl Iterator for StripeRecordBatchReader<'_> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::io::{MemoryInput, MemorySink};
    use crate::stripe::StripeWriter;
    use crate::vector::VectorBatch;

    fn two_column_schema() -> OrcType {
        OrcType::Struct {
            fields: vec![
                ("id".to_string(), OrcType::Long),
                ("name".to_string(), OrcType::String),
            ],
        }
    }

    fn two_column_stripe(ids: &[i64], names: &[Option<&str>]) -> VectorBatch {
        let rows = ids.len();
        let mut id_col = VectorBatch::for_type(&OrcType::Long, rows).expect("ids");
        id_col.num_elements = rows;
        let VectorPayload::Long { data } = &mut id_col.payload else {
            unreachable!();
        };
        data.copy_from_slice(ids);
        let mut name_col = VectorBatch::for_type(&OrcType::String, rows).expect("names");
        name_col.num_elements = rows;
        let VectorPayload::Bytes { data } = &mut name_col.payload else {
            unreachable!();
        };
        for (row, name) in names.iter().enumerate() {
            match name {
                Some(s) => data[row] = Some(s.as_bytes().to_vec()),
                None => {
                    name_col.not_null[row] = false;
                    name_col.has_nulls = true;
                }
            }
        }
        VectorBatch {
            num_elements: rows,
            has_nulls: false,
            not_null: vec![true; rows],
            payload: VectorPayload::Struct {
                children: vec![id_col, name_col],
            },
        }
    }

    fn sample_file() -> Vec<u8> {
        let mut writer = StripeWriter::new(
            MemorySink::new(),
            two_column_schema(),
            vec![("writer".to_string(), "tests".to_string())],
        )
        .expect("writer");
        writer
            .add_stripe(&two_column_stripe(&[1, 2, 3], &[Some("a"), None, Some("c")]))
            .expect("stripe 0");
        writer
            .add_stripe(&two_column_stripe(&[4, 5], &[Some("d"), Some("e")]))
            .expect("stripe 1");
        writer.close().expect("close").into_bytes()
    }

    fn open_sample() -> OrcFileReader {
        OrcFileReader::open(Box::new(MemoryInput::new(sample_file()))).expect("open")
    }

    #[test]
    fn read_returns_whole_table() {
        let reader = open_sample();
        assert_eq!(reader.number_of_rows(), 5);
        assert_eq!(reader.number_of_stripes(), 2);
        let batch = reader.read().expect("read");
        assert_eq!(batch.num_rows(), 5);
        assert_eq!(batch.num_columns(), 2);
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("ids");
        assert_eq!(ids.values(), &[1, 2, 3, 4, 5]);
        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("names");
        assert!(names.is_null(1));
        assert_eq!(names.value(4), "e");
    }

    #[test]
    fn schema_carries_metadata() {
        let reader = open_sample();
        let schema = reader.read_schema().expect("schema");
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        assert_eq!(schema.metadata().get("writer").map(String::as_str), Some("tests"));
    }

    #[test]
    fn projection_validates_before_reading() {
        let reader = open_sample();
        let err = reader.read_projected(&[-1]).expect_err("negative");
        assert!(matches!(err, OrcError::InvalidArgument(_)), "err={}", err);
        let err = reader.read_projected(&[2]).expect_err("out of range");
        assert!(err.to_string().contains("field index out of range"), "err={}", err);

        let batch = reader.read_projected(&[1, 1]).expect("projected");
        assert_eq!(batch.num_columns(), 1);
        assert_eq!(batch.schema().field(0).name(), "name");
    }

    #[test]
    fn empty_projection_keeps_row_count() {
        let reader = open_sample();
        let batch = reader.read_projected(&[]).expect("empty projection");
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 5);
    }

    #[test]
    fn read_stripe_bounds_are_checked() {
        let reader = open_sample();
        let batch = reader.read_stripe(1).expect("stripe 1");
        assert_eq!(batch.num_rows(), 2);
        let err = reader.read_stripe(2).expect_err("past end");
        assert!(err.to_string().contains("out of bounds stripe"), "err={}", err);
        let err = reader.read_stripe(-1).expect_err("negative");
        assert!(matches!(err, OrcError::InvalidArgument(_)), "err={}", err);
    }

    #[test]
    fn stripe_reader_walks_stripes_in_batches() {
        let mut reader = open_sample();
        let mut stripe_rows = Vec::new();
        while let Some(stripe_reader) = reader.next_stripe_reader(2).expect("stripe reader") {
            let mut rows = 0;
            for batch in stripe_reader {
                rows += batch.expect("batch").num_rows();
            }
            stripe_rows.push(rows);
        }
        assert_eq!(stripe_rows, vec![3, 2]);
        assert!(reader.next_stripe_reader(2).expect("done").is_none());
    }

    #[test]
    fn seek_scopes_stripe_reader_to_remainder() {
        let mut reader = open_sample();
        reader.seek(1).expect("seek");
        let mut stripe_reader = reader
            .next_stripe_reader(10)
            .expect("stripe reader")
            .expect("some");
        let batch = stripe_reader.next_batch().expect("batch").expect("some");
        assert_eq!(batch.num_rows(), 2);
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("ids");
        assert_eq!(ids.values(), &[2, 3]);
        assert!(stripe_reader.next_batch().expect("end").is_none());

        let err = reader.seek(5).expect_err("past end");
        assert!(err.to_string().contains("seek out of range"), "err={}", err);
    }

    #[test]
    fn read_with_schema_checks_field_count() {
        let reader = open_sample();
        let narrow = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
        let err = reader.read_with_schema(narrow).expect_err("narrow");
        assert!(err.to_string().contains("schema field count mismatch"), "err={}", err);

        let wide = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::LargeUtf8, true),
        ]));
        let batch = reader.read_with_schema(wide).expect("large utf8");
        assert_eq!(batch.schema().field(1).data_type(), &DataType::LargeUtf8);
    }
}
