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
use crate::exec::hash_table::except_hash_set::ExceptSemantics;

use super::set_op_context::SetOpContext;

/// `R0 EXCEPT R1 EXCEPT ... Rk` over distinct rows of `R0`.
pub type ExceptContext = SetOpContext<ExceptSemantics>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::{PlanNodeId, SlotId};
    use crate::exec::hash_table::set_op_hash_set::test_util::{
        int_str_chunk, key_types, slot_exprs,
    };
    use crate::exec::expr::{ExprArena, ExprNode};
    use crate::runtime::mem_tracker::MemTracker;
    use crate::runtime::runtime_state::RuntimeState;
    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::DataType;

    fn output_keys(ctx: &mut ExceptContext, state: &RuntimeState) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(chunk) = ctx.pull_chunk(state).expect("pull") {
            assert!(chunk.len() <= state.chunk_size());
            let col = chunk.column_by_slot_id(SlotId::new(10)).expect("slot 10");
            let col = col.as_any().downcast_ref::<Int32Array>().expect("int32");
            out.extend((0..col.len()).map(|i| col.value(i)));
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn multiway_except_with_batched_output() {
        let tracker = MemTracker::new_root("query");
        let state = RuntimeState::default()
            .with_chunk_size(2)
            .with_mem_tracker(tracker.clone());
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut ctx = ExceptContext::new(
            PlanNodeId(3),
            vec![exprs.clone(), exprs.clone(), exprs],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1, 2, 1],
        )
        .expect("context");
        ctx.prepare(&state).expect("prepare");
        assert!(tracker.current() > 0);

        let r0 = (1..=6).map(|i| (Some(i), Some("v"))).collect::<Vec<_>>();
        ctx.push_chunk(&state, 0, &int_str_chunk(&r0), &arena)
            .expect("build");
        ctx.finish_stage(0).expect("finish build");

        ctx.push_chunk(&state, 1, &int_str_chunk(&[(Some(2), Some("v"))]), &arena)
            .expect("probe 1a");
        ctx.finish_stage(1).expect("producer 1a");
        assert!(!ctx.is_output_ready());
        ctx.push_chunk(&state, 1, &int_str_chunk(&[(Some(4), Some("v"))]), &arena)
            .expect("probe 1b");
        ctx.finish_stage(1).expect("producer 1b");

        // Different payload means a different row.
        ctx.push_chunk(&state, 2, &int_str_chunk(&[(Some(5), Some("w")), (Some(6), Some("v"))]), &arena)
            .expect("probe 2");
        assert!(ctx.pull_chunk(&state).expect("not ready").is_none());
        ctx.finish_stage(2).expect("finish probe 2");

        assert!(ctx.is_output_ready());
        assert_eq!(ctx.hash_set_size(), 6);
        assert_eq!(output_keys(&mut ctx, &state), vec![1, 3, 5]);
        assert!(ctx.is_finished());
        assert!(ctx.pull_chunk(&state).expect("drained").is_none());
    }

    #[test]
    fn wrong_stage_and_cancellation_are_rejected() {
        let state = RuntimeState::default().with_chunk_size(4);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut ctx = ExceptContext::new(
            PlanNodeId(1),
            vec![exprs.clone(), exprs],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1, 1],
        )
        .expect("context");
        let chunk = int_str_chunk(&[(Some(1), Some("a"))]);
        let err = ctx
            .push_chunk(&state, 0, &chunk, &arena)
            .expect_err("before prepare");
        assert!(err.is_internal_error());

        ctx.prepare(&state).expect("prepare");
        let err = ctx
            .push_chunk(&state, 1, &chunk, &arena)
            .expect_err("probe before build finished");
        assert!(err.is_internal_error());

        state.cancel();
        let err = ctx
            .push_chunk(&state, 0, &chunk, &arena)
            .expect_err("cancelled");
        assert!(matches!(err, crate::common::status::Status::Cancelled(_)));
    }

    #[test]
    fn push_after_last_stage_is_rejected_and_recorded() {
        let state = RuntimeState::default().with_chunk_size(4);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut ctx = ExceptContext::new(
            PlanNodeId(4),
            vec![exprs.clone(), exprs],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1, 1],
        )
        .expect("context");
        ctx.prepare(&state).expect("prepare");
        let chunk = int_str_chunk(&[(Some(1), Some("a"))]);
        ctx.push_chunk(&state, 0, &chunk, &arena).expect("build");
        ctx.finish_stage(0).expect("stage 0");
        ctx.finish_stage(1).expect("stage 1");
        assert!(state.error().is_none());

        for stage in [2, 3] {
            let err = ctx
                .push_chunk(&state, stage, &chunk, &arena)
                .expect_err("stage past the last relation");
            assert!(err.is_internal_error());
        }
        let recorded = state.error().expect("first error recorded");
        assert!(recorded.contains("stage 2"), "{}", recorded);

        assert_eq!(output_keys(&mut ctx, &state), vec![1]);
    }

    #[test]
    fn mistyped_keys_are_rejected_on_empty_build() {
        let state = RuntimeState::default().with_chunk_size(4);
        let mut arena = ExprArena::default();
        let build_exprs = slot_exprs(&mut arena);
        let k = arena.push_typed(ExprNode::SlotId(SlotId::new(1)), DataType::Int32);
        let wide = arena.push_typed(ExprNode::Cast(k), DataType::Int64);
        let mut ctx = ExceptContext::new(
            PlanNodeId(5),
            vec![build_exprs, vec![wide, wide]],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1, 1],
        )
        .expect("context");
        ctx.prepare(&state).expect("prepare");
        ctx.push_chunk(&state, 0, &int_str_chunk(&[]), &arena)
            .expect("empty build");
        ctx.finish_stage(0).expect("stage 0");
        assert_eq!(ctx.hash_set_size(), 0);

        let err = ctx
            .push_chunk(&state, 1, &int_str_chunk(&[(Some(1), Some("a"))]), &arena)
            .expect_err("mistyped keys");
        assert!(err.is_internal_error());
        let err = ctx
            .push_chunk(&state, 1, &int_str_chunk(&[]), &arena)
            .expect_err("mistyped keys on an empty chunk");
        assert!(err.is_internal_error());
    }

    #[test]
    fn mismatched_expression_lists_are_rejected() {
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let err = ExceptContext::new(
            PlanNodeId(1),
            vec![exprs.clone(), exprs[..1].to_vec()],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1, 1],
        )
        .err()
        .expect("short expression list");
        assert!(err.is_internal_error());

        let err = ExceptContext::new(
            PlanNodeId(1),
            vec![exprs],
            vec![SlotId::new(10), SlotId::new(11)],
            key_types(),
            vec![1],
        )
        .err()
        .expect("single input");
        assert!(err.is_internal_error());
    }
}
