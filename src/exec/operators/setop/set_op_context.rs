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
//! Multiway EXCEPT/INTERSECT driver.
//!
//! Responsibilities:
//! - Routes chunks of stage 0 into the hash set build and later stages into probes.
//! - Gates every chunk on the stage controller and the query cancellation flag.
//! - Emits surviving keys as chunks of at most `chunk_size` rows once the last stage finished.
//!
//! Key exported interfaces:
//! - Types: `SetOpContext`.

use arrow::datatypes::DataType;

use crate::common::ids::{PlanNodeId, SlotId};
use crate::common::status::Status;
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::hash_table::key_storage::Slice;
use crate::exec::hash_table::set_op_hash_set::{SetOpHashSet, SetOpSemantics};
use crate::novarocks_logging::{debug, info, warn};
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

use super::set_op_stage::SetOpStageController;

#[derive(Debug, Default, Clone, Copy)]
struct StageStats {
    chunks: usize,
    rows: usize,
}

/// Survivor snapshot taken once all stages finished.
struct OutputCursor {
    slices: Vec<Slice>,
    offset: usize,
}

pub struct SetOpContext<S: SetOpSemantics> {
    node_id: PlanNodeId,
    controller: SetOpStageController,
    stage_exprs: Vec<Vec<ExprId>>,
    output_slots: Vec<SlotId>,
    output_types: Vec<DataType>,
    hash_set: SetOpHashSet<S>,
    stage_stats: Vec<StageStats>,
    prepared: bool,
    output: Option<OutputCursor>,
    finished: bool,
}

impl<S: SetOpSemantics> SetOpContext<S> {
    /// `stage_exprs[i]` evaluates the key columns of relation `i`; relation 0 is the build side.
    pub fn new(
        node_id: PlanNodeId,
        stage_exprs: Vec<Vec<ExprId>>,
        output_slots: Vec<SlotId>,
        output_types: Vec<DataType>,
        producer_counts: Vec<usize>,
    ) -> Result<Self, Status> {
        if stage_exprs.len() != producer_counts.len() {
            return Err(Status::internal_error(format!(
                "{} (id={}) has {} expression lists for {} inputs",
                S::NAME,
                node_id,
                stage_exprs.len(),
                producer_counts.len()
            )));
        }
        if output_slots.len() != output_types.len() {
            return Err(Status::internal_error(format!(
                "{} (id={}) output slot mismatch: slots={} types={}",
                S::NAME,
                node_id,
                output_slots.len(),
                output_types.len()
            )));
        }
        for (stage, exprs) in stage_exprs.iter().enumerate() {
            if exprs.len() != output_types.len() {
                return Err(Status::internal_error(format!(
                    "{} (id={}) stage {} has {} key expressions, expected {}",
                    S::NAME,
                    node_id,
                    stage,
                    exprs.len(),
                    output_types.len()
                )));
            }
        }
        let controller = SetOpStageController::new(S::NAME, producer_counts)?;
        let hash_set = SetOpHashSet::new(output_types.clone())?;
        let stage_stats = vec![StageStats::default(); controller.stage_total()];
        Ok(Self {
            node_id,
            controller,
            stage_exprs,
            output_slots,
            output_types,
            hash_set,
            stage_stats,
            prepared: false,
            output: None,
            finished: false,
        })
    }

    pub fn node_id(&self) -> PlanNodeId {
        self.node_id
    }

    pub fn controller(&self) -> &SetOpStageController {
        &self.controller
    }

    pub fn output_slots(&self) -> &[SlotId] {
        &self.output_slots
    }

    pub fn prepare(&mut self, state: &RuntimeState) -> Result<(), Status> {
        if self.prepared {
            return Ok(());
        }
        if let Some(parent) = state.mem_tracker() {
            let tracker =
                MemTracker::new_child(format!("{} (id={})", S::NAME, self.node_id), &parent);
            self.hash_set.set_mem_tracker(&tracker);
        }
        self.hash_set.init(state)?;
        self.prepared = true;
        debug!(
            op = S::NAME,
            node_id = self.node_id.0,
            stage_total = self.controller.stage_total(),
            "set operation prepared"
        );
        Ok(())
    }

    /// Feed one chunk of relation `stage`. Failures are also recorded in `state`'s error slot.
    pub fn push_chunk(
        &mut self,
        state: &RuntimeState,
        stage: usize,
        chunk: &Chunk,
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        self.push_chunk_impl(state, stage, chunk, expr_arena)
            .inspect_err(|err| state.error_state().set_error(err.to_string()))
    }

    fn push_chunk_impl(
        &mut self,
        state: &RuntimeState,
        stage: usize,
        chunk: &Chunk,
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        if state.is_cancelled() {
            return Err(Status::Cancelled(format!(
                "{} (id={}) cancelled at stage {}",
                S::NAME,
                self.node_id,
                stage
            )));
        }
        if !self.prepared {
            return Err(Status::internal_error(format!(
                "{} (id={}) received input before prepare",
                S::NAME,
                self.node_id
            )));
        }
        if stage >= self.controller.stage_total() {
            return Err(Status::internal_error(format!(
                "{} (id={}) got a chunk for stage {} but has only {} stages",
                S::NAME,
                self.node_id,
                stage,
                self.controller.stage_total()
            )));
        }
        if stage != self.controller.current_stage() {
            warn!(
                op = S::NAME,
                node_id = self.node_id.0,
                stage,
                current_stage = self.controller.current_stage(),
                "chunk pushed to a stage that is not running"
            );
            return Err(Status::internal_error(format!(
                "{} (id={}) got a chunk for stage {} while stage {} is running",
                S::NAME,
                self.node_id,
                stage,
                self.controller.current_stage()
            )));
        }
        let exprs = &self.stage_exprs[stage];
        if stage == 0 {
            self.hash_set.build_set(state, chunk, exprs, expr_arena)?;
        } else {
            self.hash_set
                .probe(state, stage, chunk, exprs, expr_arena)?;
        }
        let stats = &mut self.stage_stats[stage];
        stats.chunks += 1;
        stats.rows += chunk.len();
        Ok(())
    }

    /// One producer of `stage` reached end of input.
    pub fn finish_stage(&mut self, stage: usize) -> Result<(), Status> {
        let completed = self.controller.producer_finished(stage)?;
        if completed {
            let stats = self.stage_stats[stage];
            debug!(
                op = S::NAME,
                node_id = self.node_id.0,
                stage,
                chunks = stats.chunks,
                rows = stats.rows,
                hash_set_size = self.hash_set.size(),
                mem_usage = self.hash_set.mem_usage(),
                "set operation stage finished"
            );
        }
        Ok(())
    }

    pub fn is_output_ready(&self) -> bool {
        !self.finished && self.controller.is_all_finished()
    }

    /// Next output chunk, or `None` when output is not ready yet or fully drained.
    pub fn pull_chunk(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, Status> {
        self.pull_chunk_impl(state)
            .inspect_err(|err| state.error_state().set_error(err.to_string()))
    }

    fn pull_chunk_impl(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, Status> {
        if !self.is_output_ready() {
            return Ok(None);
        }
        if state.is_cancelled() {
            return Err(Status::Cancelled(format!(
                "{} (id={}) cancelled while emitting output",
                S::NAME,
                self.node_id
            )));
        }
        if self.output.is_none() {
            let slices = self
                .hash_set
                .survivor_slices(self.controller.stage_total())?;
            self.output = Some(OutputCursor { slices, offset: 0 });
        }
        let Some(cursor) = self.output.as_mut() else {
            return Ok(None);
        };
        if cursor.offset >= cursor.slices.len() {
            info!(
                op = S::NAME,
                node_id = self.node_id.0,
                output_rows = cursor.slices.len(),
                hash_set_size = self.hash_set.size(),
                "set operation output finished"
            );
            self.finished = true;
            return Ok(None);
        }

        let chunk_size = state.chunk_size().max(1);
        let end = (cursor.offset + chunk_size).min(cursor.slices.len());
        let keys = cursor.slices[cursor.offset..end]
            .iter()
            .map(Slice::as_bytes)
            .collect::<Vec<_>>();
        let columns = self.hash_set.deserialize_to_columns(&keys, chunk_size)?;
        cursor.offset = end;

        let chunk = Chunk::from_columns(&self.output_slots, &self.output_types, columns)
            .map_err(Status::InternalError)?;
        Ok(Some(chunk))
    }

    pub fn hash_set_size(&self) -> usize {
        self.hash_set.size()
    }

    pub fn mem_usage(&self) -> usize {
        self.hash_set.mem_usage()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
