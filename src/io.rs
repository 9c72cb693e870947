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
//! Byte-level I/O seams for the stripe reader and writer.
//!
//! Responsibilities:
//! - `RangeInput`: positioned reads over an immutable byte source. A
//!   short read is a fatal `Io` error, never a partial success.
//! - `OutputSink`: append-only byte sink. The stripe writer tracks the
//!   cumulative length itself and never queries the sink for position.

use std::fs::File;
use std::os::unix::fs::FileExt;

use crate::error::{OrcError, Result};

/// Immutable byte source with positioned reads.
pub trait RangeInput {
    /// Total size in bytes.
    fn size(&self) -> Result<u64>;

    /// Fill `buf` entirely from `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

impl RangeInput for File {
    fn size(&self) -> Result<u64> {
        let meta = self
            .metadata()
            .map_err(|e| OrcError::Io(format!("stat input file failed: error={e}")))?;
        Ok(meta.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_exact_at(buf, offset).map_err(|e| {
            OrcError::Io(format!(
                "read input file failed: offset={}, length={}, error={}",
                offset,
                buf.len(),
                e
            ))
        })
    }
}

/// In-memory input over an owned byte buffer.
pub struct MemoryInput {
    data: Vec<u8>,
}

impl MemoryInput {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl RangeInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset).map_err(|_| {
            OrcError::Io(format!("read offset overflow: offset={offset}"))
        })?;
        let end = start.checked_add(buf.len()).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(OrcError::Io(format!(
                "short read from memory input: offset={}, length={}, available={}",
                offset,
                buf.len(),
                self.data.len()
            )));
        };
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

/// Append-only byte sink.
pub trait OutputSink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush and release the sink. Further writes are an error.
    fn close(&mut self) -> Result<()>;
}

impl OutputSink for File {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf).map_err(|e| {
            OrcError::Io(format!(
                "write output file failed: length={}, error={}",
                buf.len(),
                e
            ))
        })
    }

    fn close(&mut self) -> Result<()> {
        std::io::Write::flush(self)
            .map_err(|e| OrcError::Io(format!("flush output file failed: error={e}")))
    }
}

/// In-memory sink collecting all written bytes.
#[derive(Default)]
pub struct MemorySink {
    data: Vec<u8>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the sink and hand back the collected bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl OutputSink for MemorySink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(OrcError::Io(
                "write to closed memory sink".to_string(),
            ));
        }
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_input_reads_exact_range() {
        let input = MemoryInput::new(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        input.read_at(1, &mut buf).expect("read");
        assert_eq!(buf, [2, 3, 4]);
        assert_eq!(input.size().expect("size"), 5);
    }

    #[test]
    fn memory_input_rejects_short_read() {
        let input = MemoryInput::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let err = input.read_at(1, &mut buf).expect_err("short read");
        assert!(matches!(err, OrcError::Io(_)), "err={}", err);
    }

    #[test]
    fn memory_sink_rejects_write_after_close() {
        let mut sink = MemorySink::new();
        sink.write_all(b"abc").expect("write");
        sink.close().expect("close");
        let err = sink.write_all(b"d").expect_err("closed");
        assert!(matches!(err, OrcError::Io(_)), "err={}", err);
    }
}
