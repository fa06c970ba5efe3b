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
use crate::exec::hash_table::intersect_hash_set::IntersectSemantics;

use super::set_op_context::SetOpContext;

/// `R0 INTERSECT R1 INTERSECT ... Rk` over distinct rows.
pub type IntersectContext = SetOpContext<IntersectSemantics>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::{PlanNodeId, SlotId};
    use crate::exec::hash_table::set_op_hash_set::test_util::{
        int_str_chunk, key_types, slot_exprs,
    };
    use crate::exec::expr::ExprArena;
    use crate::runtime::runtime_state::RuntimeState;
    use arrow::array::{Array, Int32Array, StringArray};

    #[test]
    fn intersect_emits_rows_present_everywhere() {
        let state = RuntimeState::default().with_chunk_size(8);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut ctx = IntersectContext::new(
            PlanNodeId(7),
            vec![exprs.clone(), exprs.clone(), exprs],
            vec![SlotId::new(20), SlotId::new(21)],
            key_types(),
            vec![1, 1, 1],
        )
        .expect("context");
        ctx.prepare(&state).expect("prepare");

        let r0 = int_str_chunk(&[(Some(1), Some("a")), (Some(2), None), (Some(3), Some("c"))]);
        ctx.push_chunk(&state, 0, &r0, &arena).expect("build");
        ctx.finish_stage(0).expect("stage 0");
        let r1 = int_str_chunk(&[(Some(2), None), (Some(3), Some("c")), (Some(9), Some("z"))]);
        ctx.push_chunk(&state, 1, &r1, &arena).expect("stage 1");
        ctx.finish_stage(1).expect("stage 1");
        let r2 = int_str_chunk(&[(Some(2), None), (Some(1), Some("a"))]);
        ctx.push_chunk(&state, 2, &r2, &arena).expect("stage 2");
        ctx.finish_stage(2).expect("stage 2");

        let chunk = ctx.pull_chunk(&state).expect("pull").expect("one chunk");
        assert_eq!(chunk.len(), 1);
        let k = chunk.column_by_slot_id(SlotId::new(20)).expect("slot 20");
        let k = k.as_any().downcast_ref::<Int32Array>().expect("int32");
        assert_eq!(k.value(0), 2);
        let v = chunk.column_by_slot_id(SlotId::new(21)).expect("slot 21");
        assert!(v.as_any().downcast_ref::<StringArray>().expect("utf8").is_null(0));
        assert!(ctx.pull_chunk(&state).expect("drained").is_none());
        assert!(ctx.is_finished());
    }

    #[test]
    fn empty_probe_stage_empties_the_result() {
        let state = RuntimeState::default().with_chunk_size(8);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut ctx = IntersectContext::new(
            PlanNodeId(8),
            vec![exprs.clone(), exprs],
            vec![SlotId::new(20), SlotId::new(21)],
            key_types(),
            vec![1, 1],
        )
        .expect("context");
        ctx.prepare(&state).expect("prepare");
        let r0 = int_str_chunk(&[(Some(1), Some("a"))]);
        ctx.push_chunk(&state, 0, &r0, &arena).expect("build");
        ctx.finish_stage(0).expect("stage 0");
        ctx.finish_stage(1).expect("stage 1");
        assert!(ctx.pull_chunk(&state).expect("pull").is_none());
        assert!(ctx.is_finished());
        assert_eq!(ctx.hash_set_size(), 1);
    }
}
