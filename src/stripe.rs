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
//! Stripe container codec.
//!
//! File layout: stripes back to back, then a footer, then a 12-byte
//! trailer (footer size u32 LE, crc32c of the footer u32 LE, magic
//! `ORB1`). The footer holds total rows, the stripe table, the column
//! type tree and metadata key/values. A stripe is one serialized root
//! struct batch; every top-level column carries a byte-length prefix so
//! projection can skip it without decoding.
//!
//! Current limitations:
//! - No compression; all scalars are little-endian fixed width.
//! - Union columns are not serialized.

use crc32c::crc32c;
use tracing::debug;

use crate::error::{OrcError, Result};
use crate::io::{OutputSink, RangeInput};
use crate::types::{OrcType, StripeInformation};
use crate::vector::{VectorBatch, VectorPayload};

const TRAILER_SIZE: u64 = 12;
const MAGIC: &[u8; 4] = b"ORB1";

mod kind_tag {
    pub const BOOLEAN: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const SHORT: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const FLOAT: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const STRING: u8 = 7;
    pub const BINARY: u8 = 8;
    pub const CHAR: u8 = 9;
    pub const DATE: u8 = 10;
    pub const TIMESTAMP: u8 = 11;
    pub const DECIMAL: u8 = 12;
    pub const LIST: u8 = 13;
    pub const MAP: u8 = 14;
    pub const STRUCT: u8 = 15;
    pub const UNION: u8 = 16;
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(OrcError::Format(format!(
                "truncated {}: position={}, need={}, available={}",
                what,
                self.pos,
                len,
                self.buf.len()
            )));
        };
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| {
            OrcError::Format(format!("decode u32 failed: field={what}"))
        })?))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let bytes = self.take(8, what)?;
        Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| {
            OrcError::Format(format!("decode u64 failed: field={what}"))
        })?))
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        let bytes = self.take(8, what)?;
        Ok(i64::from_le_bytes(bytes.try_into().map_err(|_| {
            OrcError::Format(format!("decode i64 failed: field={what}"))
        })?))
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        let bytes = self.take(8, what)?;
        Ok(f64::from_le_bytes(bytes.try_into().map_err(|_| {
            OrcError::Format(format!("decode f64 failed: field={what}"))
        })?))
    }

    fn i128(&mut self, what: &str) -> Result<i128> {
        let bytes = self.take(16, what)?;
        Ok(i128::from_le_bytes(bytes.try_into().map_err(|_| {
            OrcError::Format(format!("decode i128 failed: field={what}"))
        })?))
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = self.u32(what)? as usize;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| OrcError::Format(format!("invalid utf8: field={what}, error={e}")))
    }
}

fn put_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn encode_type(orc_type: &OrcType, out: &mut Vec<u8>) {
    match orc_type {
        OrcType::Boolean => out.push(kind_tag::BOOLEAN),
        OrcType::Byte => out.push(kind_tag::BYTE),
        OrcType::Short => out.push(kind_tag::SHORT),
        OrcType::Int => out.push(kind_tag::INT),
        OrcType::Long => out.push(kind_tag::LONG),
        OrcType::Float => out.push(kind_tag::FLOAT),
        OrcType::Double => out.push(kind_tag::DOUBLE),
        OrcType::String => out.push(kind_tag::STRING),
        OrcType::Binary => out.push(kind_tag::BINARY),
        OrcType::Char { width } => {
            out.push(kind_tag::CHAR);
            out.extend_from_slice(&width.to_le_bytes());
        }
        OrcType::Date => out.push(kind_tag::DATE),
        OrcType::Timestamp => out.push(kind_tag::TIMESTAMP),
        OrcType::Decimal { precision, scale } => {
            out.push(kind_tag::DECIMAL);
            out.push(*precision);
            out.push(*scale as u8);
        }
        OrcType::List { child } => {
            out.push(kind_tag::LIST);
            encode_type(child, out);
        }
        OrcType::Map { key, value } => {
            out.push(kind_tag::MAP);
            encode_type(key, out);
            encode_type(value, out);
        }
        OrcType::Struct { fields } => {
            out.push(kind_tag::STRUCT);
            out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
            for (name, child) in fields {
                put_string(out, name);
                encode_type(child, out);
            }
        }
        OrcType::Union { children } => {
            out.push(kind_tag::UNION);
            out.extend_from_slice(&(children.len() as u32).to_le_bytes());
            for child in children {
                encode_type(child, out);
            }
        }
    }
}

fn decode_type(reader: &mut ByteReader<'_>) -> Result<OrcType> {
    let tag = reader.u8("type tag")?;
    match tag {
        kind_tag::BOOLEAN => Ok(OrcType::Boolean),
        kind_tag::BYTE => Ok(OrcType::Byte),
        kind_tag::SHORT => Ok(OrcType::Short),
        kind_tag::INT => Ok(OrcType::Int),
        kind_tag::LONG => Ok(OrcType::Long),
        kind_tag::FLOAT => Ok(OrcType::Float),
        kind_tag::DOUBLE => Ok(OrcType::Double),
        kind_tag::STRING => Ok(OrcType::String),
        kind_tag::BINARY => Ok(OrcType::Binary),
        kind_tag::CHAR => Ok(OrcType::Char {
            width: reader.u32("char width")?,
        }),
        kind_tag::DATE => Ok(OrcType::Date),
        kind_tag::TIMESTAMP => Ok(OrcType::Timestamp),
        kind_tag::DECIMAL => {
            let precision = reader.u8("decimal precision")?;
            let scale = reader.u8("decimal scale")? as i8;
            Ok(OrcType::Decimal { precision, scale })
        }
        kind_tag::LIST => Ok(OrcType::List {
            child: Box::new(decode_type(reader)?),
        }),
        kind_tag::MAP => Ok(OrcType::Map {
            key: Box::new(decode_type(reader)?),
            value: Box::new(decode_type(reader)?),
        }),
        kind_tag::STRUCT => {
            let field_count = reader.u32("struct field count")? as usize;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                let name = reader.string("struct field name")?;
                fields.push((name, decode_type(reader)?));
            }
            Ok(OrcType::Struct { fields })
        }
        kind_tag::UNION => {
            let child_count = reader.u32("union child count")? as usize;
            let mut children = Vec::with_capacity(child_count);
            for _ in 0..child_count {
                children.push(decode_type(reader)?);
            }
            Ok(OrcType::Union { children })
        }
        other => Err(OrcError::Format(format!(
            "unknown type tag: tag={other}"
        ))),
    }
}

fn encode_column(
    orc_type: &OrcType,
    batch: &VectorBatch,
    rows: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.extend_from_slice(&(rows as u32).to_le_bytes());
    out.push(u8::from(batch.has_nulls));
    if batch.has_nulls {
        for row in 0..rows {
            out.push(u8::from(batch.not_null[row]));
        }
    }
    match orc_type {
        OrcType::Boolean
        | OrcType::Byte
        | OrcType::Short
        | OrcType::Int
        | OrcType::Long
        | OrcType::Date => {
            let VectorPayload::Long { data } = &batch.payload else {
                return Err(serialize_mismatch(orc_type));
            };
            for row in 0..rows {
                out.extend_from_slice(&data[row].to_le_bytes());
            }
        }
        OrcType::Float | OrcType::Double => {
            let VectorPayload::Double { data } = &batch.payload else {
                return Err(serialize_mismatch(orc_type));
            };
            for row in 0..rows {
                out.extend_from_slice(&data[row].to_le_bytes());
            }
        }
        OrcType::Timestamp => {
            let VectorPayload::Timestamp { seconds, nanos } = &batch.payload else {
                return Err(serialize_mismatch(orc_type));
            };
            for row in 0..rows {
                out.extend_from_slice(&seconds[row].to_le_bytes());
            }
            for row in 0..rows {
                out.extend_from_slice(&nanos[row].to_le_bytes());
            }
        }
        OrcType::Decimal { precision, .. } => {
            if OrcType::decimal_is_wide(*precision) {
                let VectorPayload::Decimal128 { data } = &batch.payload else {
                    return Err(serialize_mismatch(orc_type));
                };
                for row in 0..rows {
                    out.extend_from_slice(&data[row].to_le_bytes());
                }
            } else {
                let VectorPayload::Decimal64 { data } = &batch.payload else {
                    return Err(serialize_mismatch(orc_type));
                };
                for row in 0..rows {
                    out.extend_from_slice(&data[row].to_le_bytes());
                }
            }
        }
        OrcType::String | OrcType::Binary | OrcType::Char { .. } => {
            let VectorPayload::Bytes { data } = &batch.payload else {
                return Err(serialize_mismatch(orc_type));
            };
            for row in 0..rows {
                let bytes = data[row].as_deref().unwrap_or(&[]);
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }
        OrcType::List { child } => {
            let VectorPayload::List {
                offsets,
                child: child_batch,
            } = &batch.payload
            else {
                return Err(serialize_mismatch(orc_type));
            };
            let child_rows = check_offsets(offsets, rows)?;
            for row in 0..=rows {
                out.extend_from_slice(&offsets[row].to_le_bytes());
            }
            encode_column(child, child_batch, child_rows, out)?;
        }
        OrcType::Map { key, value } => {
            let VectorPayload::Map {
                offsets,
                keys,
                values,
            } = &batch.payload
            else {
                return Err(serialize_mismatch(orc_type));
            };
            let child_rows = check_offsets(offsets, rows)?;
            for row in 0..=rows {
                out.extend_from_slice(&offsets[row].to_le_bytes());
            }
            encode_column(key, keys, child_rows, out)?;
            encode_column(value, values, child_rows, out)?;
        }
        OrcType::Struct { fields } => {
            let VectorPayload::Struct { children } = &batch.payload else {
                return Err(serialize_mismatch(orc_type));
            };
            if children.len() != fields.len() {
                return Err(OrcError::Format(format!(
                    "struct child count mismatch while serializing: type_fields={}, batch_children={}",
                    fields.len(),
                    children.len()
                )));
            }
            for ((_name, child_type), child) in fields.iter().zip(children) {
                encode_column(child_type, child, rows, out)?;
            }
        }
        OrcType::Union { .. } => {
            return Err(OrcError::NotImplemented(
                "serializing union columns".to_string(),
            ));
        }
    }
    Ok(())
}

fn serialize_mismatch(orc_type: &OrcType) -> OrcError {
    OrcError::Format(format!(
        "serialize payload mismatch: kind={}",
        orc_type.kind_name()
    ))
}

fn check_offsets(offsets: &[i64], rows: usize) -> Result<usize> {
    if offsets.len() < rows + 1 {
        return Err(OrcError::Format(format!(
            "offsets shorter than rows: offsets={}, rows={}",
            offsets.len(),
            rows
        )));
    }
    for row in 0..rows {
        if offsets[row] > offsets[row + 1] || offsets[row] < 0 {
            return Err(OrcError::Format(format!(
                "offsets not monotone: row={}, start={}, end={}",
                row,
                offsets[row],
                offsets[row + 1]
            )));
        }
    }
    Ok(offsets[rows] as usize)
}

fn decode_column(orc_type: &OrcType, reader: &mut ByteReader<'_>) -> Result<VectorBatch> {
    let rows = reader.u32("column row count")? as usize;
    let null_flag = reader.u8("column null flag")?;
    let has_nulls = match null_flag {
        0 => false,
        1 => true,
        other => {
            return Err(OrcError::Format(format!(
                "invalid null flag value: null_flag={other}, expected=[0,1]"
            )));
        }
    };
    let mut not_null = vec![true; rows];
    if has_nulls {
        let flags = reader.take(rows, "column validity")?;
        for (row, flag) in flags.iter().enumerate() {
            match flag {
                0 => not_null[row] = false,
                1 => not_null[row] = true,
                other => {
                    return Err(OrcError::Format(format!(
                        "invalid validity value: row={row}, value={other}, expected=[0,1]"
                    )));
                }
            }
        }
    }
    let payload = match orc_type {
        OrcType::Boolean
        | OrcType::Byte
        | OrcType::Short
        | OrcType::Int
        | OrcType::Long
        | OrcType::Date => {
            let mut data = Vec::with_capacity(rows);
            for _ in 0..rows {
                data.push(reader.i64("long value")?);
            }
            VectorPayload::Long { data }
        }
        OrcType::Float | OrcType::Double => {
            let mut data = Vec::with_capacity(rows);
            for _ in 0..rows {
                data.push(reader.f64("double value")?);
            }
            VectorPayload::Double { data }
        }
        OrcType::Timestamp => {
            let mut seconds = Vec::with_capacity(rows);
            for _ in 0..rows {
                seconds.push(reader.i64("timestamp seconds")?);
            }
            let mut nanos = Vec::with_capacity(rows);
            for _ in 0..rows {
                nanos.push(reader.i64("timestamp nanos")?);
            }
            VectorPayload::Timestamp { seconds, nanos }
        }
        OrcType::Decimal { precision, .. } => {
            if OrcType::decimal_is_wide(*precision) {
                let mut data = Vec::with_capacity(rows);
                for _ in 0..rows {
                    data.push(reader.i128("decimal value")?);
                }
                VectorPayload::Decimal128 { data }
            } else {
                let mut data = Vec::with_capacity(rows);
                for _ in 0..rows {
                    data.push(reader.i64("decimal value")?);
                }
                VectorPayload::Decimal64 { data }
            }
        }
        OrcType::String | OrcType::Binary | OrcType::Char { .. } => {
            let mut data = Vec::with_capacity(rows);
            for row in 0..rows {
                let len = reader.u32("bytes length")? as usize;
                let bytes = reader.take(len, "bytes value")?;
                if not_null[row] {
                    data.push(Some(bytes.to_vec()));
                } else {
                    data.push(None);
                }
            }
            VectorPayload::Bytes { data }
        }
        OrcType::List { child } => {
            let mut offsets = Vec::with_capacity(rows + 1);
            for _ in 0..=rows {
                offsets.push(reader.i64("list offset")?);
            }
            let child_rows = check_offsets(&offsets, rows)?;
            let child_batch = decode_column(child, reader)?;
            if child_batch.num_elements != child_rows {
                return Err(OrcError::Format(format!(
                    "list child row mismatch: expected={}, actual={}",
                    child_rows, child_batch.num_elements
                )));
            }
            VectorPayload::List {
                offsets,
                child: Box::new(child_batch),
            }
        }
        OrcType::Map { key, value } => {
            let mut offsets = Vec::with_capacity(rows + 1);
            for _ in 0..=rows {
                offsets.push(reader.i64("map offset")?);
            }
            let child_rows = check_offsets(&offsets, rows)?;
            let key_batch = decode_column(key, reader)?;
            let value_batch = decode_column(value, reader)?;
            if key_batch.num_elements != child_rows || value_batch.num_elements != child_rows {
                return Err(OrcError::Format(format!(
                    "map child row mismatch: expected={}, keys={}, values={}",
                    child_rows, key_batch.num_elements, value_batch.num_elements
                )));
            }
            VectorPayload::Map {
                offsets,
                keys: Box::new(key_batch),
                values: Box::new(value_batch),
            }
        }
        OrcType::Struct { fields } => {
            let mut children = Vec::with_capacity(fields.len());
            for (_name, child_type) in fields {
                let child = decode_column(child_type, reader)?;
                if child.num_elements != rows {
                    return Err(OrcError::Format(format!(
                        "struct child row mismatch: expected={}, actual={}",
                        rows, child.num_elements
                    )));
                }
                children.push(child);
            }
            VectorPayload::Struct { children }
        }
        OrcType::Union { .. } => {
            return Err(OrcError::NotImplemented(
                "deserializing union columns".to_string(),
            ));
        }
    };
    Ok(VectorBatch {
        num_elements: rows,
        has_nulls,
        not_null,
        payload,
    })
}

/// Streaming stripe-file writer over an [`OutputSink`].
pub struct StripeWriter<S: OutputSink> {
    sink: S,
    schema: OrcType,
    metadata: Vec<(String, String)>,
    stripes: Vec<StripeInformation>,
    length: u64,
    num_rows: u64,
}

impl<S: OutputSink> StripeWriter<S> {
    pub fn new(sink: S, schema: OrcType, metadata: Vec<(String, String)>) -> Result<Self> {
        let OrcType::Struct { .. } = &schema else {
            return Err(OrcError::NotImplemented(format!(
                "top level type must be a struct: kind={}",
                schema.kind_name()
            )));
        };
        Ok(Self {
            sink,
            schema,
            metadata,
            stripes: Vec::new(),
            length: 0,
            num_rows: 0,
        })
    }

    /// Serialize one root batch as a stripe.
    pub fn add_stripe(&mut self, root: &VectorBatch) -> Result<()> {
        let OrcType::Struct { fields } = &self.schema else {
            return Err(OrcError::Format("stripe schema is not a struct".to_string()));
        };
        let VectorPayload::Struct { children } = &root.payload else {
            return Err(OrcError::Format(
                "root batch payload is not a struct".to_string(),
            ));
        };
        if children.len() != fields.len() {
            return Err(OrcError::Format(format!(
                "root batch column count mismatch: schema_fields={}, batch_children={}",
                fields.len(),
                children.len()
            )));
        }
        let rows = root.num_elements;
        let mut buf = Vec::new();
        buf.extend_from_slice(&(rows as u32).to_le_bytes());
        buf.extend_from_slice(&(children.len() as u32).to_le_bytes());
        for ((_name, child_type), child) in fields.iter().zip(children) {
            let mut column = Vec::new();
            encode_column(child_type, child, rows, &mut column)?;
            buf.extend_from_slice(&(column.len() as u64).to_le_bytes());
            buf.extend_from_slice(&column);
        }
        self.sink.write_all(&buf)?;
        self.stripes.push(StripeInformation {
            offset: self.length,
            length: buf.len() as u64,
            num_rows: rows as u64,
            first_row_of_stripe: self.num_rows,
        });
        self.length += buf.len() as u64;
        self.num_rows += rows as u64;
        Ok(())
    }

    /// Write footer and trailer, close the sink and hand it back.
    pub fn close(mut self) -> Result<S> {
        let mut footer = Vec::new();
        footer.extend_from_slice(&self.num_rows.to_le_bytes());
        footer.extend_from_slice(&(self.stripes.len() as u32).to_le_bytes());
        for stripe in &self.stripes {
            footer.extend_from_slice(&stripe.offset.to_le_bytes());
            footer.extend_from_slice(&stripe.length.to_le_bytes());
            footer.extend_from_slice(&stripe.num_rows.to_le_bytes());
        }
        encode_type(&self.schema, &mut footer);
        footer.extend_from_slice(&(self.metadata.len() as u32).to_le_bytes());
        for (key, value) in &self.metadata {
            put_string(&mut footer, key);
            put_string(&mut footer, value);
        }
        let checksum = crc32c(&footer);
        self.sink.write_all(&footer)?;
        let mut trailer = Vec::with_capacity(TRAILER_SIZE as usize);
        trailer.extend_from_slice(&(footer.len() as u32).to_le_bytes());
        trailer.extend_from_slice(&checksum.to_le_bytes());
        trailer.extend_from_slice(MAGIC);
        self.sink.write_all(&trailer)?;
        self.sink.close()?;
        debug!(
            "closed stripe file: stripes={}, rows={}, bytes={}",
            self.stripes.len(),
            self.num_rows,
            self.length + footer.len() as u64 + TRAILER_SIZE
        );
        Ok(self.sink)
    }

    pub fn stripes(&self) -> &[StripeInformation] {
        &self.stripes
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }
}

/// Parsed stripe file over a [`RangeInput`].
pub struct StripeFile {
    input: Box<dyn RangeInput>,
    schema: OrcType,
    stripes: Vec<StripeInformation>,
    metadata: Vec<(String, String)>,
    num_rows: u64,
}

impl std::fmt::Debug for StripeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeFile")
            .field("schema", &self.schema)
            .field("stripes", &self.stripes)
            .field("metadata", &self.metadata)
            .field("num_rows", &self.num_rows)
            .finish_non_exhaustive()
    }
}

impl StripeFile {
    /// Validate the trailer, parse the footer and enumerate stripes.
    pub fn open(input: Box<dyn RangeInput>) -> Result<Self> {
        let size = input.size()?;
        if size < TRAILER_SIZE {
            return Err(OrcError::Format(format!(
                "invalid stripe file: file too small, size={size}"
            )));
        }
        let mut trailer = [0u8; TRAILER_SIZE as usize];
        input.read_at(size - TRAILER_SIZE, &mut trailer)?;
        let footer_size = u32::from_le_bytes(
            trailer[0..4]
                .try_into()
                .map_err(|_| OrcError::Format("decode footer size failed".to_string()))?,
        ) as u64;
        let footer_checksum = u32::from_le_bytes(
            trailer[4..8]
                .try_into()
                .map_err(|_| OrcError::Format("decode footer checksum failed".to_string()))?,
        );
        let magic = &trailer[8..12];
        if magic != MAGIC {
            return Err(OrcError::Format(format!(
                "invalid magic number: actual={:?}, expected={:?}",
                magic, MAGIC
            )));
        }
        if footer_size == 0 || footer_size > size - TRAILER_SIZE {
            return Err(OrcError::Format(format!(
                "invalid footer size: file_size={size}, footer_size={footer_size}"
            )));
        }
        let footer_offset = size - TRAILER_SIZE - footer_size;
        let mut footer = vec![0u8; footer_size as usize];
        input.read_at(footer_offset, &mut footer)?;
        let actual_checksum = crc32c(&footer);
        if actual_checksum != footer_checksum {
            return Err(OrcError::Format(format!(
                "footer checksum mismatch: actual={actual_checksum}, expected={footer_checksum}"
            )));
        }

        let mut reader = ByteReader::new(&footer);
        let num_rows = reader.u64("total row count")?;
        let stripe_count = reader.u32("stripe count")? as usize;
        let mut stripes = Vec::with_capacity(stripe_count);
        let mut first_row = 0u64;
        for index in 0..stripe_count {
            let offset = reader.u64("stripe offset")?;
            let length = reader.u64("stripe length")?;
            let stripe_rows = reader.u64("stripe row count")?;
            if offset + length > footer_offset {
                return Err(OrcError::Format(format!(
                    "stripe out of file bounds: stripe={index}, offset={offset}, length={length}, data_end={footer_offset}"
                )));
            }
            stripes.push(StripeInformation {
                offset,
                length,
                num_rows: stripe_rows,
                first_row_of_stripe: first_row,
            });
            first_row += stripe_rows;
        }
        if first_row != num_rows {
            return Err(OrcError::Format(format!(
                "stripe rows do not sum to total: stripe_sum={first_row}, total={num_rows}"
            )));
        }
        let schema = decode_type(&mut reader)?;
        let OrcType::Struct { .. } = &schema else {
            return Err(OrcError::NotImplemented(format!(
                "top level type must be a struct: kind={}",
                schema.kind_name()
            )));
        };
        let metadata_count = reader.u32("metadata count")? as usize;
        let mut metadata = Vec::with_capacity(metadata_count);
        for _ in 0..metadata_count {
            let key = reader.string("metadata key")?;
            let value = reader.string("metadata value")?;
            metadata.push((key, value));
        }
        debug!(
            "opened stripe file: stripes={}, rows={}, metadata_entries={}",
            stripes.len(),
            num_rows,
            metadata.len()
        );
        Ok(Self {
            input,
            schema,
            stripes,
            metadata,
            num_rows,
        })
    }

    pub fn schema(&self) -> &OrcType {
        &self.schema
    }

    pub fn stripes(&self) -> &[StripeInformation] {
        &self.stripes
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn root_fields(&self) -> &[(String, OrcType)] {
        match &self.schema {
            OrcType::Struct { fields } => fields,
            // open() rejects non-struct roots.
            _ => &[],
        }
    }

    /// Cursor over the row range `[start_row, end_row)`, optionally
    /// restricted to the given top-level columns (sorted, in range).
    pub fn row_cursor(
        &self,
        start_row: u64,
        end_row: u64,
        include: Option<&[usize]>,
    ) -> Result<RowCursor<'_>> {
        let fields = self.root_fields();
        if let Some(indices) = include {
            for &index in indices {
                if index >= fields.len() {
                    return Err(OrcError::InvalidArgument(format!(
                        "field index out of range: index={}, field_count={}",
                        index,
                        fields.len()
                    )));
                }
            }
        }
        Ok(RowCursor {
            file: self,
            include: include.map(|indices| indices.to_vec()),
            row: start_row,
            end_row: end_row.min(self.num_rows),
            current: None,
        })
    }
}

struct LoadedStripe {
    first_row: u64,
    num_rows: u64,
    batch: VectorBatch,
}

/// One window of rows inside a decoded stripe batch.
pub struct BatchWindow<'a> {
    pub batch: &'a VectorBatch,
    pub offset: usize,
    pub length: usize,
}

/// Lazily loads one stripe at a time and serves fixed-size row windows.
pub struct RowCursor<'a> {
    file: &'a StripeFile,
    include: Option<Vec<usize>>,
    row: u64,
    end_row: u64,
    current: Option<LoadedStripe>,
}

impl<'a> RowCursor<'a> {
    /// Type nodes of the columns this cursor decodes, aligned with the
    /// children of every window's root batch.
    pub fn selected_types(&self) -> Vec<&'a OrcType> {
        let fields = self.file.root_fields();
        match &self.include {
            Some(indices) => indices.iter().map(|&i| &fields[i].1).collect(),
            None => fields.iter().map(|(_name, ty)| ty).collect(),
        }
    }

    /// Rows not yet served.
    pub fn remaining_rows(&self) -> u64 {
        self.end_row.saturating_sub(self.row)
    }

    fn load_stripe_containing(&self, row: u64) -> Result<LoadedStripe> {
        let stripe = self
            .file
            .stripes()
            .iter()
            .find(|s| s.first_row_of_stripe <= row && row < s.first_row_of_stripe + s.num_rows)
            .ok_or_else(|| {
                OrcError::Format(format!("row outside every stripe: row={row}"))
            })?;
        let length = usize::try_from(stripe.length).map_err(|_| {
            OrcError::Format(format!("stripe length overflow: length={}", stripe.length))
        })?;
        let mut bytes = vec![0u8; length];
        self.file.input.read_at(stripe.offset, &mut bytes)?;

        let fields = self.file.root_fields();
        let mut reader = ByteReader::new(&bytes);
        let rows = reader.u32("stripe row count")? as u64;
        if rows != stripe.num_rows {
            return Err(OrcError::Format(format!(
                "stripe row count mismatch: header={}, footer={}",
                rows, stripe.num_rows
            )));
        }
        let columns = reader.u32("stripe column count")? as usize;
        if columns != fields.len() {
            return Err(OrcError::Format(format!(
                "stripe column count mismatch: header={}, schema={}",
                columns,
                fields.len()
            )));
        }
        let rows = rows as usize;
        let mut children = Vec::new();
        for (index, (_name, child_type)) in fields.iter().enumerate() {
            let column_len = reader.u64("column byte length")? as usize;
            let column_bytes = reader.take(column_len, "column bytes")?;
            let selected = match &self.include {
                Some(indices) => indices.contains(&index),
                None => true,
            };
            if !selected {
                continue;
            }
            let mut column_reader = ByteReader::new(column_bytes);
            let child = decode_column(child_type, &mut column_reader)?;
            if child.num_elements != rows {
                return Err(OrcError::Format(format!(
                    "column row count mismatch: column={}, expected={}, actual={}",
                    index, rows, child.num_elements
                )));
            }
            children.push(child);
        }
        Ok(LoadedStripe {
            first_row: stripe.first_row_of_stripe,
            num_rows: stripe.num_rows,
            batch: VectorBatch {
                num_elements: rows,
                has_nulls: false,
                not_null: vec![true; rows],
                payload: VectorPayload::Struct { children },
            },
        })
    }

    /// Serve the next window of at most `max_rows` rows, or `None` when
    /// the range is exhausted.
    pub fn next_window(&mut self, max_rows: usize) -> Result<Option<BatchWindow<'_>>> {
        if self.row >= self.end_row || max_rows == 0 {
            return Ok(None);
        }
        let needs_load = match &self.current {
            Some(current) => self.row >= current.first_row + current.num_rows
                || self.row < current.first_row,
            None => true,
        };
        if needs_load {
            self.current = Some(self.load_stripe_containing(self.row)?);
        }
        let Some(current) = self.current.as_ref() else {
            return Err(OrcError::Format(
                "stripe load left no current stripe".to_string(),
            ));
        };
        let offset = (self.row - current.first_row) as usize;
        let stripe_remaining = (current.first_row + current.num_rows - self.row) as usize;
        let range_remaining = (self.end_row - self.row) as usize;
        let length = max_rows.min(stripe_remaining).min(range_remaining);
        self.row += length as u64;
        Ok(Some(BatchWindow {
            batch: &current.batch,
            offset,
            length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryInput, MemorySink};

    fn long_schema() -> OrcType {
        OrcType::Struct {
            fields: vec![("v".to_string(), OrcType::Long)],
        }
    }

    fn one_column_batch(values: &[i64]) -> VectorBatch {
        let mut child = VectorBatch::for_type(&OrcType::Long, values.len()).expect("child");
        child.num_elements = values.len();
        let VectorPayload::Long { data } = &mut child.payload else {
            unreachable!();
        };
        data.copy_from_slice(values);
        VectorBatch {
            num_elements: values.len(),
            has_nulls: false,
            not_null: vec![true; values.len()],
            payload: VectorPayload::Struct {
                children: vec![child],
            },
        }
    }

    fn write_file(stripes: &[&[i64]]) -> Vec<u8> {
        let mut writer = StripeWriter::new(
            MemorySink::new(),
            long_schema(),
            vec![("origin".to_string(), "unit-test".to_string())],
        )
        .expect("writer");
        for values in stripes {
            writer.add_stripe(&one_column_batch(values)).expect("stripe");
        }
        writer.close().expect("close").into_bytes()
    }

    #[test]
    fn round_trip_two_stripes() {
        let bytes = write_file(&[[1, 2, 3].as_slice(), [4, 5].as_slice()]);
        let file = StripeFile::open(Box::new(MemoryInput::new(bytes))).expect("open");
        assert_eq!(file.num_rows(), 5);
        assert_eq!(file.stripes().len(), 2);
        assert_eq!(file.stripes()[1].first_row_of_stripe, 3);
        assert_eq!(file.metadata(), &[("origin".to_string(), "unit-test".to_string())]);

        let mut cursor = file.row_cursor(0, 5, None).expect("cursor");
        let window = cursor.next_window(10).expect("window").expect("some");
        assert_eq!(window.offset, 0);
        assert_eq!(window.length, 3);
        let window = cursor.next_window(10).expect("window").expect("some");
        assert_eq!(window.length, 2);
        assert!(cursor.next_window(10).expect("window").is_none());
    }

    #[test]
    fn cursor_starts_mid_stripe() {
        let bytes = write_file(&[[1, 2, 3, 4].as_slice(), [5, 6].as_slice()]);
        let file = StripeFile::open(Box::new(MemoryInput::new(bytes))).expect("open");
        let mut cursor = file.row_cursor(2, 6, None).expect("cursor");
        let window = cursor.next_window(10).expect("window").expect("some");
        assert_eq!(window.offset, 2);
        assert_eq!(window.length, 2);
        let window = cursor.next_window(1).expect("window").expect("some");
        assert_eq!(window.offset, 0);
        assert_eq!(window.length, 1);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write_file(&[[1].as_slice()]);
        let len = bytes.len();
        bytes[len - 1] = b'X';
        let err = StripeFile::open(Box::new(MemoryInput::new(bytes))).expect_err("magic");
        assert!(matches!(err, OrcError::Format(_)), "err={}", err);
        assert!(err.to_string().contains("invalid magic number"), "err={}", err);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut bytes = write_file(&[[1].as_slice()]);
        let len = bytes.len();
        // Flip one footer byte; the trailer itself stays valid.
        bytes[len - 13] ^= 0xff;
        let err = StripeFile::open(Box::new(MemoryInput::new(bytes))).expect_err("checksum");
        assert!(err.to_string().contains("checksum mismatch"), "err={}", err);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let err = StripeFile::open(Box::new(MemoryInput::new(vec![1, 2, 3])))
            .expect_err("too small");
        assert!(err.to_string().contains("file too small"), "err={}", err);
    }

    #[test]
    fn projection_skips_unselected_columns() {
        let schema = OrcType::Struct {
            fields: vec![
                ("a".to_string(), OrcType::Long),
                ("b".to_string(), OrcType::Long),
            ],
        };
        let mut a = VectorBatch::for_type(&OrcType::Long, 2).expect("a");
        a.num_elements = 2;
        let VectorPayload::Long { data } = &mut a.payload else {
            unreachable!();
        };
        data.copy_from_slice(&[1, 2]);
        let mut b = VectorBatch::for_type(&OrcType::Long, 2).expect("b");
        b.num_elements = 2;
        let VectorPayload::Long { data } = &mut b.payload else {
            unreachable!();
        };
        data.copy_from_slice(&[10, 20]);
        let root = VectorBatch {
            num_elements: 2,
            has_nulls: false,
            not_null: vec![true; 2],
            payload: VectorPayload::Struct {
                children: vec![a, b],
            },
        };
        let mut writer =
            StripeWriter::new(MemorySink::new(), schema, Vec::new()).expect("writer");
        writer.add_stripe(&root).expect("stripe");
        let bytes = writer.close().expect("close").into_bytes();

        let file = StripeFile::open(Box::new(MemoryInput::new(bytes))).expect("open");
        let include = vec![1usize];
        let mut cursor = file.row_cursor(0, 2, Some(&include)).expect("cursor");
        assert_eq!(cursor.selected_types(), vec![&OrcType::Long]);
        let window = cursor.next_window(10).expect("window").expect("some");
        let VectorPayload::Struct { children } = &window.batch.payload else {
            panic!("expected struct root");
        };
        assert_eq!(children.len(), 1);
        let VectorPayload::Long { data } = &children[0].payload else {
            panic!("expected long child");
        };
        assert_eq!(data, &[10, 20]);
    }

    #[test]
    fn type_tree_round_trip() {
        let ty = OrcType::Struct {
            fields: vec![
                (
                    "m".to_string(),
                    OrcType::Map {
                        key: Box::new(OrcType::String),
                        value: Box::new(OrcType::Decimal {
                            precision: 30,
                            scale: 4,
                        }),
                    },
                ),
                ("c".to_string(), OrcType::Char { width: 3 }),
            ],
        };
        let mut buf = Vec::new();
        encode_type(&ty, &mut buf);
        let mut reader = ByteReader::new(&buf);
        assert_eq!(decode_type(&mut reader).expect("decode"), ty);
    }
}
