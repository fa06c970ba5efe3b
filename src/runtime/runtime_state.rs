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
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::config;
use crate::common::types::UniqueId;
use crate::runtime::mem_tracker::{self, MemTracker};

/// RuntimeState is a per-fragment-instance execution context, similar to StarRocks BE RuntimeState.
///
/// The set-operation engine only reads the chunk size, the memory tracker and the cancellation
/// flag from it; everything else belongs to the surrounding execution framework.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    chunk_size: Option<usize>,
    query_id: Option<UniqueId>,
    mem_tracker: Option<Arc<MemTracker>>,
    error_state: Arc<RuntimeErrorState>,
    cancelled: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
pub struct RuntimeErrorState {
    error: std::sync::Mutex<Option<String>>,
}

impl RuntimeErrorState {
    /// Keeps the first reported error; later ones are dropped.
    pub fn set_error(&self, err: String) {
        let mut guard = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            chunk_size: None,
            query_id: None,
            mem_tracker: None,
            error_state: Arc::new(RuntimeErrorState::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RuntimeState {
    /// Build a state whose memory is accounted under `process -> query_<id>`.
    pub fn for_query(query_id: UniqueId, chunk_size: Option<usize>) -> Self {
        let process = mem_tracker::process_mem_tracker();
        let label = format!("query_{:x}_{:x}", query_id.hi, query_id.lo);
        Self {
            chunk_size,
            query_id: Some(query_id),
            mem_tracker: Some(MemTracker::new_child(label, &process)),
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_mem_tracker(mut self, tracker: Arc<MemTracker>) -> Self {
        self.mem_tracker = Some(tracker);
        self
    }

    pub fn query_id(&self) -> Option<UniqueId> {
        self.query_id
    }

    pub fn mem_tracker(&self) -> Option<Arc<MemTracker>> {
        self.mem_tracker.clone()
    }

    /// Return the maximum row count per in-memory chunk/RecordBatch.
    ///
    /// StarRocks BE uses `TQueryOptions.batch_size` (aka `RuntimeState::chunk_size()`).
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
            .filter(|v| *v > 0)
            .unwrap_or_else(config::chunk_size)
            .max(1)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn error_state(&self) -> Arc<RuntimeErrorState> {
        Arc::clone(&self.error_state)
    }

    pub fn error(&self) -> Option<String> {
        self.error_state.error()
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeState;
    use crate::common::types::UniqueId;

    #[test]
    fn explicit_chunk_size_wins_over_config() {
        let state = RuntimeState::default().with_chunk_size(7);
        assert_eq!(state.chunk_size(), 7);
    }

    #[test]
    fn cancellation_is_shared_by_clones() {
        let state = RuntimeState::default();
        let clone = state.clone();
        assert!(!clone.is_cancelled());
        state.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn first_error_is_kept() {
        let state = RuntimeState::default();
        state.error_state().set_error("first".to_string());
        state.error_state().set_error("second".to_string());
        assert_eq!(state.error().as_deref(), Some("first"));
    }

    #[test]
    fn query_state_has_tracker_under_process() {
        let state = RuntimeState::for_query(UniqueId { hi: 1, lo: 2 }, Some(16));
        let tracker = state.mem_tracker().expect("query tracker");
        assert_eq!(tracker.label(), "query_1_2");
        assert_eq!(state.chunk_size(), 16);
        assert_eq!(state.query_id(), Some(UniqueId { hi: 1, lo: 2 }));
    }
}
