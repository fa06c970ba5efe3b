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
//! Integration tests driven by a TOML config file.
//!
//! Kept in its own test binary: the config is a process-wide `OnceLock`.

use std::collections::BTreeSet;

use crate::common::{TestConfig, chunk_rows, key_types, rows_chunk, slot_exprs};
use novarocks_setop::common::ids::{PlanNodeId, SlotId};
use novarocks_setop::exec::expr::ExprArena;
use novarocks_setop::exec::operators::setop::IntersectContext;
use novarocks_setop::runtime::runtime_state::RuntimeState;

mod common;

#[test]
fn config_file_drives_chunk_size_and_arena_sizes() {
    let test_config = TestConfig::new().expect("test config");
    let cfg = assert_ok!(test_config.load_config(), "load config");
    test_config.init_logging();
    assert_eq!(cfg.runtime.chunk_size, 3);
    assert_eq!(cfg.setop.hash_set_initial_capacity, 16);
    assert_eq!(cfg.setop.mem_pool_initial_chunk_bytes, 64);
    assert_eq!(cfg.setop.mem_pool_max_chunk_bytes, 256);

    let state = RuntimeState::default();
    assert_eq!(state.chunk_size(), 3);

    let out_slots = vec![SlotId::new(30), SlotId::new(31)];
    let mut arena = ExprArena::default();
    let exprs = slot_exprs(&mut arena);
    let mut ctx = IntersectContext::new(
        PlanNodeId(9),
        vec![exprs.clone(), exprs],
        out_slots.clone(),
        key_types(),
        vec![1, 1],
    )
    .expect("context");
    ctx.prepare(&state).expect("prepare");

    // Far more key bytes than the largest arena region holds.
    let rows = (0..200)
        .map(|i| (Some(i), Some(format!("row-{:04}", i))))
        .collect::<Vec<_>>();
    let initial_usage = ctx.mem_usage();
    for window in rows.chunks(state.chunk_size()) {
        ctx.push_chunk(&state, 0, &rows_chunk(window), &arena)
            .expect("build");
    }
    ctx.finish_stage(0).expect("stage 0");
    assert!(ctx.mem_usage() > initial_usage);

    let evens = rows.iter().step_by(2).cloned().collect::<Vec<_>>();
    for window in evens.chunks(state.chunk_size()) {
        ctx.push_chunk(&state, 1, &rows_chunk(window), &arena)
            .expect("probe");
    }
    ctx.finish_stage(1).expect("stage 1");

    let mut got = BTreeSet::new();
    let mut chunks = 0;
    while let Some(chunk) = ctx.pull_chunk(&state).expect("pull") {
        assert!(chunk.len() <= 3);
        chunks += 1;
        got.extend(chunk_rows(&chunk, &out_slots));
    }
    assert_eq!(got, evens.into_iter().collect::<BTreeSet<_>>());
    assert_eq!(chunks, 34);
}
