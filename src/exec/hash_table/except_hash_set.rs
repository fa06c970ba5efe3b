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

/// EXCEPT marker: `true` once any probe relation produced the key.
pub struct ExceptSemantics;

impl SetOpSemantics for ExceptSemantics {
    type Marker = bool;

    const NAME: &'static str = "ExceptHashSet";

    fn new_marker() -> Self::Marker {
        false
    }

    fn apply_probe(marker: &mut Self::Marker, _stage: usize) -> Result<(), Status> {
        *marker = true;
        Ok(())
    }

    fn marker_selected(marker: &Self::Marker, _stage_total: usize) -> Result<bool, Status> {
        Ok(!*marker)
    }
}

pub type ExceptHashSet = SetOpHashSet<ExceptSemantics>;

impl SliceFlag<bool> {
    pub fn deleted(&self) -> bool {
        *self.marker()
    }
}

impl SetOpHashSet<ExceptSemantics> {
    /// Flag every key of `chunk` that exists in the set as deleted.
    pub fn erase_duplicate_row(
        &mut self,
        state: &RuntimeState,
        stage: usize,
        chunk: &Chunk,
        exprs: &[ExprId],
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        self.probe(state, stage, chunk, exprs, expr_arena)
    }

    /// Entries not flagged by any probe relation.
    pub fn remaining(&self) -> usize {
        self.iter().filter(|entry| !entry.deleted()).count()
    }
}
