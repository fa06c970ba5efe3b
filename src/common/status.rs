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
//! Execution status returned by the set-operation engine.
//!
//! Mirrors the StarRocks BE `Status` codes that can surface from a set-operation node.
//! `InternalError` is reserved for contract violations (call order, key schema drift,
//! corrupt serialized keys) so callers can tell them apart from resource failures.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Status {
    #[error("memory alloc failed: {0}")]
    MemAllocFailed(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("expr evaluation failed: {0}")]
    ExprEvalFailed(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl Status {
    pub fn mem_alloc_failed(msg: impl Into<String>) -> Self {
        Status::MemAllocFailed(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Status::InternalError(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Status::NotSupported(msg.into())
    }

    pub fn is_internal_error(&self) -> bool {
        matches!(self, Status::InternalError(_))
    }

    pub fn is_mem_alloc_failed(&self) -> bool {
        matches!(self, Status::MemAllocFailed(_))
    }
}

pub type StatusResult<T> = Result<T, Status>;
