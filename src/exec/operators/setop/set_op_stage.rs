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
//! Set-operation stage controller.
//!
//! Responsibilities:
//! - Tracks per-stage completion for multi-input set operations such as EXCEPT and INTERSECT.
//! - Stage 0 is the build relation; stages `1..stage_total` are probe relations, run in order.
//!
//! Current limitations:
//! - Single-threaded: one controller drives one hash set and is never shared.

use crate::common::status::Status;

/// Controller tracking stage completion boundaries for multi-input set operations.
#[derive(Debug, Clone)]
pub struct SetOpStageController {
    op_name: &'static str,
    current_stage: usize,
    remaining_producers: Vec<usize>,
}

impl SetOpStageController {
    pub fn new(op_name: &'static str, stage_producer_counts: Vec<usize>) -> Result<Self, Status> {
        if stage_producer_counts.len() < 2 {
            return Err(Status::internal_error(format!(
                "{} expects at least 2 inputs, got {}",
                op_name,
                stage_producer_counts.len()
            )));
        }
        let remaining_producers = stage_producer_counts
            .into_iter()
            .map(|n| n.max(1))
            .collect::<Vec<_>>();
        Ok(Self {
            op_name,
            current_stage: 0,
            remaining_producers,
        })
    }

    pub fn stage_total(&self) -> usize {
        self.remaining_producers.len()
    }

    /// Stage accepting input; equals `stage_total()` once every stage finished.
    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    pub fn is_stage_ready(&self, stage: usize) -> bool {
        self.current_stage >= stage
    }

    pub fn is_all_finished(&self) -> bool {
        self.current_stage >= self.stage_total()
    }

    /// Producers of `stage` that have not finished yet.
    pub fn remaining_producers(&self, stage: usize) -> Option<usize> {
        self.remaining_producers.get(stage).copied()
    }

    /// Record one producer of `stage` as done; returns true when that completed the stage.
    pub fn producer_finished(&mut self, stage: usize) -> Result<bool, Status> {
        if stage >= self.stage_total() {
            return Err(Status::internal_error(format!(
                "{} stage out of bounds: stage={} stage_total={}",
                self.op_name,
                stage,
                self.stage_total()
            )));
        }
        if stage != self.current_stage {
            return Err(Status::internal_error(format!(
                "{} cannot finish stage {} while stage {} is running",
                self.op_name, stage, self.current_stage
            )));
        }
        let remaining = &mut self.remaining_producers[stage];
        *remaining -= 1;
        if *remaining == 0 {
            self.current_stage = stage + 1;
            return Ok(true);
        }
        Ok(false)
    }
}
