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
use crate::common::status::Status;
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::runtime::runtime_state::RuntimeState;

use super::set_op_hash_set::{SetOpHashSet, SetOpSemantics, SliceFlag};

/// INTERSECT marker: number of consecutive probe stages that hit the key.
pub struct IntersectSemantics;

fn stage_to_u16(stage: usize) -> Result<u16, Status> {
    u16::try_from(stage)
        .map_err(|_| Status::internal_error(format!("intersect stage {} overflows u16", stage)))
}

impl SetOpSemantics for IntersectSemantics {
    type Marker = u16;

    const NAME: &'static str = "IntersectHashSet";

    fn new_marker() -> Self::Marker {
        0
    }

    fn apply_probe(marker: &mut Self::Marker, stage: usize) -> Result<(), Status> {
        let stage = stage_to_u16(stage)?;
        if stage > 0 && *marker == stage - 1 {
            *marker = stage;
        }
        Ok(())
    }

    fn marker_selected(marker: &Self::Marker, stage_total: usize) -> Result<bool, Status> {
        let final_hit = stage_to_u16(stage_total.saturating_sub(1))?;
        Ok(*marker == final_hit)
    }
}

pub type IntersectHashSet = SetOpHashSet<IntersectSemantics>;

impl SliceFlag<u16> {
    pub fn hit_times(&self) -> u16 {
        *self.marker()
    }
}

impl SetOpHashSet<IntersectSemantics> {
    /// Advance `hit_times` of keys in `chunk` that were hit by every earlier probe stage.
    pub fn refine_intersect_row(
        &mut self,
        state: &RuntimeState,
        stage: usize,
        chunk: &Chunk,
        exprs: &[ExprId],
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        self.probe(state, stage, chunk, exprs, expr_arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::hash_table::set_op_hash_set::test_util::{
        int_str_chunk, key_types, slot_exprs,
    };
    use arrow::array::{Array, Int32Array};

    fn survivors(set: &IntersectHashSet, stage_total: usize) -> Vec<i32> {
        let keys = set.survivor_keys(stage_total).expect("survivors");
        let columns = set
            .deserialize_to_columns(&keys, keys.len().max(1))
            .expect("decode");
        let k = columns[0]
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("int32");
        let mut out = (0..k.len()).map(|i| k.value(i)).collect::<Vec<_>>();
        out.sort_unstable();
        out
    }

    #[test]
    fn hit_times_only_advance_from_previous_stage() {
        let mut marker = IntersectSemantics::new_marker();
        IntersectSemantics::apply_probe(&mut marker, 2).expect("skip");
        assert_eq!(marker, 0);
        IntersectSemantics::apply_probe(&mut marker, 1).expect("stage 1");
        IntersectSemantics::apply_probe(&mut marker, 1).expect("stage 1 again");
        assert_eq!(marker, 1);
        IntersectSemantics::apply_probe(&mut marker, 2).expect("stage 2");
        assert_eq!(marker, 2);
        assert!(IntersectSemantics::marker_selected(&marker, 3).expect("selected"));
        assert!(!IntersectSemantics::marker_selected(&marker, 4).expect("not selected"));
        assert!(IntersectSemantics::apply_probe(&mut marker, 70_000).is_err());
    }

    #[test]
    fn three_way_intersect_requires_every_stage() {
        let state = RuntimeState::default().with_chunk_size(8);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut set = IntersectHashSet::new(key_types()).expect("new set");
        set.init(&state).expect("init");

        let r0 = int_str_chunk(&[
            (Some(1), Some("a")),
            (Some(2), Some("b")),
            (Some(3), Some("c")),
            (Some(1), Some("a")),
        ]);
        set.build_set(&state, &r0, &exprs, &arena).expect("build");

        // key 3 misses stage 1 and must not come back at stage 2.
        let r1 = int_str_chunk(&[(Some(1), Some("a")), (Some(2), Some("b")), (Some(2), Some("b"))]);
        set.refine_intersect_row(&state, 1, &r1, &exprs, &arena)
            .expect("stage 1");
        let r2 = int_str_chunk(&[(Some(1), Some("a")), (Some(3), Some("c"))]);
        set.refine_intersect_row(&state, 2, &r2, &exprs, &arena)
            .expect("stage 2");

        assert_eq!(set.size(), 3);
        assert_eq!(survivors(&set, 3), vec![1]);
        let hits = set.iter().map(|e| e.hit_times()).max();
        assert_eq!(hits, Some(2));
    }

    #[test]
    fn null_keys_match_each_other() {
        let state = RuntimeState::default().with_chunk_size(8);
        let mut arena = ExprArena::default();
        let exprs = slot_exprs(&mut arena);
        let mut set = IntersectHashSet::new(key_types()).expect("new set");
        set.init(&state).expect("init");

        let r0 = int_str_chunk(&[(Some(7), None), (Some(8), Some(""))]);
        set.build_set(&state, &r0, &exprs, &arena).expect("build");
        let r1 = int_str_chunk(&[(Some(7), None), (Some(8), None)]);
        set.refine_intersect_row(&state, 1, &r1, &exprs, &arena)
            .expect("probe");

        let keys = set.survivor_keys(2).expect("survivors");
        assert_eq!(keys.len(), 1);
        let columns = set.deserialize_to_columns(&keys, 4).expect("decode");
        assert!(columns[1].is_null(0));
        assert!(set.deserialize_to_columns(&keys, 0).is_err());
    }
}
