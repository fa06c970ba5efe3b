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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tempfile::TempDir;

use novarocks_setop::common::ids::SlotId;
use novarocks_setop::common::types::UniqueId;
use novarocks_setop::exec::chunk::{Chunk, field_with_slot_id};
use novarocks_setop::exec::expr::{ExprArena, ExprId, ExprNode};
use novarocks_setop::novarocks_config;
use novarocks_setop::novarocks_logging;

/// One row of the (BIGINT, VARCHAR) relations used across tests.
pub type Row = (Option<i64>, Option<String>);

pub const KEY_SLOT: SlotId = SlotId::new(1);
pub const VALUE_SLOT: SlotId = SlotId::new(2);

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a test configuration with small chunks and tiny arena regions.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_novarocks.toml");

        let config_content = r#"
log_level = "debug"

[runtime]
chunk_size = 3

[setop]
hash_set_initial_capacity = 16
mem_pool_initial_chunk_bytes = 64
mem_pool_max_chunk_bytes = 256
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        novarocks_logging::init_with_level("debug");
    }

    /// Load the test configuration.
    pub fn load_config(&self) -> anyhow::Result<&'static novarocks_config::NovaRocksConfig> {
        novarocks_config::init_from_path(&self.config_path)
    }
}

/// Generate a test query ID.
pub fn test_query_id() -> UniqueId {
    UniqueId {
        hi: 1234567890,
        lo: 9876543210,
    }
}

pub fn rows_chunk(rows: &[Row]) -> Chunk {
    let schema = Arc::new(Schema::new(vec![
        field_with_slot_id(Field::new("k", DataType::Int64, true), KEY_SLOT),
        field_with_slot_id(Field::new("v", DataType::Utf8, true), VALUE_SLOT),
    ]));
    let keys = rows.iter().map(|r| r.0).collect::<Vec<_>>();
    let values = rows.iter().map(|r| r.1.as_deref()).collect::<Vec<_>>();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(keys)) as ArrayRef,
            Arc::new(StringArray::from(values)) as ArrayRef,
        ],
    )
    .expect("record batch");
    Chunk::try_new(batch).expect("chunk")
}

/// Slot references for the key and value columns.
pub fn slot_exprs(arena: &mut ExprArena) -> Vec<ExprId> {
    vec![
        arena.push_typed(ExprNode::SlotId(KEY_SLOT), DataType::Int64),
        arena.push_typed(ExprNode::SlotId(VALUE_SLOT), DataType::Utf8),
    ]
}

pub fn key_types() -> Vec<DataType> {
    vec![DataType::Int64, DataType::Utf8]
}

/// Read every row of an output chunk whose key and value columns carry `slots`.
pub fn chunk_rows(chunk: &Chunk, slots: &[SlotId]) -> Vec<Row> {
    let keys = chunk.column_by_slot_id(slots[0]).expect("key column");
    let keys = keys
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64 key column");
    let values = chunk.column_by_slot_id(slots[1]).expect("value column");
    let values = values
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("utf8 value column");
    (0..chunk.len())
        .map(|i| {
            let k = (!keys.is_null(i)).then(|| keys.value(i));
            let v = (!values.is_null(i)).then(|| values.value(i).to_string());
            (k, v)
        })
        .collect()
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}
