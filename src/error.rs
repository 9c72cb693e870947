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
//! Error classes for the stripe transcoder.
//!
//! Callers need to tell apart fatal I/O, corrupt container bytes, bad
//! arguments (rejected before any I/O happens), and type kinds the
//! pipelines do not handle, so errors are a small enum rather than bare
//! strings.

use std::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrcError>;

#[derive(Debug)]
pub enum OrcError {
    /// Fatal I/O failure, short reads included.
    Io(String),
    /// Corrupt or truncated container bytes (magic, checksum, offsets).
    Format(String),
    /// Caller error detected before any I/O.
    InvalidArgument(String),
    /// Type kind or operation outside the supported mapping.
    NotImplemented(String),
}

impl fmt::Display for OrcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrcError::Io(msg) => write!(f, "io error: {msg}"),
            OrcError::Format(msg) => write!(f, "format error: {msg}"),
            OrcError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            OrcError::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
        }
    }
}

impl std::error::Error for OrcError {}

impl From<io::Error> for OrcError {
    fn from(err: io::Error) -> Self {
        OrcError::Io(err.to_string())
    }
}
