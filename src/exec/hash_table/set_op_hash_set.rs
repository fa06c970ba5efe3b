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
//! Serialized-key hash set shared by EXCEPT and INTERSECT.
//!
//! Responsibilities:
//! - Serializes key expressions of every chunk into canonical byte keys.
//! - Inserts keys of the build relation (deduplicated) into an arena-backed table.
//! - Updates the per-entry marker of probe relations in place, never inserting or removing.
//!
//! Call order is build chunks first, then probe chunks stage by stage. A build after any
//! probe is rejected with `Status::InternalError`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use hashbrown::HashTable;

use crate::common::config;
use crate::common::status::Status;
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use crate::novarocks_logging::{debug, warn};
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

use super::hash::slice_hash;
use super::key_codec::{
    build_key_column_views, check_key_types, deserialize_to_arrays, max_one_row_size,
    max_serialize_size, serialize_columns,
};
use super::key_storage::{MemPool, Slice};

/// Per-row stride assumed when sizing the scratch buffer at init.
const INITIAL_MAX_ONE_ROW_SIZE: usize = 8;

/// Per-operation marker behavior.
pub trait SetOpSemantics: 'static {
    type Marker: Clone + fmt::Debug + Send + 'static;

    const NAME: &'static str;

    fn new_marker() -> Self::Marker;
    /// Update the marker of a key hit by probe stage `stage` (1-based).
    fn apply_probe(marker: &mut Self::Marker, stage: usize) -> Result<(), Status>;
    /// Whether a key belongs to the output once all `stage_total` stages ran.
    fn marker_selected(marker: &Self::Marker, stage_total: usize) -> Result<bool, Status>;
}

/// One distinct key plus its mutable marker.
///
/// Hash and equality only ever look at the key bytes, so the marker can change in place.
#[derive(Debug)]
pub struct SliceFlag<M> {
    slice: Slice,
    hash: u64,
    marker: M,
}

impl<M> SliceFlag<M> {
    pub fn key(&self) -> &[u8] {
        self.slice.as_bytes()
    }

    pub fn key_len(&self) -> usize {
        self.slice.len()
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn marker(&self) -> &M {
        &self.marker
    }
}

pub struct SetOpHashSet<S: SetOpSemantics> {
    key_types: Vec<DataType>,
    hash_set: HashTable<SliceFlag<S::Marker>>,
    // Owns every key referenced by `hash_set`; must outlive it.
    key_pool: MemPool,
    buffer: Vec<u8>,
    max_one_row_size: usize,
    slice_sizes: Vec<u32>,
    initialized: bool,
    probed: bool,
    _semantics: PhantomData<S>,
}

impl<S: SetOpSemantics> fmt::Debug for SetOpHashSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetOpHashSet")
            .field("op", &S::NAME)
            .field("key_types", &self.key_types)
            .field("size", &self.hash_set.len())
            .field("pool_regions", &self.key_pool.chunk_count())
            .field("probed", &self.probed)
            .finish()
    }
}

impl<S: SetOpSemantics> SetOpHashSet<S> {
    pub fn new(key_types: Vec<DataType>) -> Result<Self, Status> {
        if key_types.is_empty() {
            return Err(Status::not_supported(format!(
                "{} with zero key columns",
                S::NAME
            )));
        }
        check_key_types(&key_types)?;
        Ok(Self {
            key_types,
            hash_set: HashTable::new(),
            key_pool: MemPool::new(
                config::setop_mem_pool_initial_chunk_bytes(),
                config::setop_mem_pool_max_chunk_bytes(),
            ),
            buffer: Vec::new(),
            max_one_row_size: INITIAL_MAX_ONE_ROW_SIZE,
            slice_sizes: Vec::new(),
            initialized: false,
            probed: false,
            _semantics: PhantomData,
        })
    }

    pub fn key_types(&self) -> &[DataType] {
        &self.key_types
    }

    /// Allocate the initial table, the first arena region and the scratch buffer.
    pub fn init(&mut self, state: &RuntimeState) -> Result<(), Status> {
        if self.initialized {
            return Ok(());
        }
        let capacity = config::setop_hash_set_initial_capacity();
        self.hash_set
            .try_reserve(capacity, |entry| entry.hash)
            .map_err(|e| {
                Status::mem_alloc_failed(format!(
                    "{} hash set reserve {} entries failed: {:?}",
                    S::NAME,
                    capacity,
                    e
                ))
            })?;
        self.key_pool
            .reserve(config::setop_mem_pool_initial_chunk_bytes())?;
        let scratch = self
            .max_one_row_size
            .checked_mul(state.chunk_size())
            .ok_or_else(|| Status::mem_alloc_failed("scratch buffer size overflow"))?;
        self.grow_buffer(scratch)?;
        self.initialized = true;
        debug!(
            op = S::NAME,
            capacity,
            scratch_bytes = scratch,
            "set operation hash set initialized"
        );
        Ok(())
    }

    pub fn set_mem_tracker(&mut self, tracker: &Arc<MemTracker>) {
        let child = MemTracker::new_child(format!("{}KeyPool", S::NAME), tracker);
        self.key_pool.set_mem_tracker(child);
    }

    pub fn size(&self) -> usize {
        self.hash_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_set.is_empty()
    }

    pub fn has_probed(&self) -> bool {
        self.probed
    }

    /// All entries, flagged or not, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &SliceFlag<S::Marker>> + '_ {
        self.hash_set.iter()
    }

    /// Table footprint plus arena and scratch reservations.
    pub fn mem_usage(&self) -> usize {
        self.hash_set.allocation_size()
            + self.key_pool.total_reserved_bytes()
            + self.buffer.capacity()
            + self.slice_sizes.capacity() * std::mem::size_of::<u32>()
    }

    pub fn key_pool_allocated_bytes(&self) -> usize {
        self.key_pool.total_allocated_bytes()
    }

    fn grow_buffer(&mut self, size: usize) -> Result<(), Status> {
        if self.buffer.len() >= size {
            return Ok(());
        }
        let additional = size - self.buffer.len();
        self.buffer.try_reserve_exact(additional).map_err(|e| {
            Status::mem_alloc_failed(format!(
                "{} serialize buffer of {} bytes: {}",
                S::NAME,
                size,
                e
            ))
        })?;
        self.buffer.resize(size, 0);
        Ok(())
    }

    fn check_initialized(&self) -> Result<(), Status> {
        if self.initialized {
            Ok(())
        } else {
            Err(Status::internal_error(format!(
                "{} hash set used before init",
                S::NAME
            )))
        }
    }

    fn evaluate_keys(
        &self,
        chunk: &Chunk,
        exprs: &[ExprId],
        expr_arena: &ExprArena,
    ) -> Result<Vec<ArrayRef>, Status> {
        if exprs.len() != self.key_types.len() {
            return Err(Status::internal_error(format!(
                "{} expects {} key expressions, got {}",
                S::NAME,
                self.key_types.len(),
                exprs.len()
            )));
        }
        let mut columns = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let column = expr_arena
                .eval(*expr, chunk)
                .map_err(Status::ExprEvalFailed)?;
            if column.len() != chunk.len() {
                return Err(Status::internal_error(format!(
                    "{} key expression produced {} rows for a chunk of {}",
                    S::NAME,
                    column.len(),
                    chunk.len()
                )));
            }
            columns.push(column);
        }
        Ok(columns)
    }

    /// Serialize every row of `columns` into the scratch buffer.
    ///
    /// The stride is this chunk's row bound; the buffer keeps its high-water size.
    /// Afterwards row `i` is `buffer[i * max_one_row_size..][..slice_sizes[i]]`.
    fn serialize_chunk(&mut self, columns: &[ArrayRef], num_rows: usize) -> Result<(), Status> {
        let views = build_key_column_views(columns, &self.key_types)?;
        let needed = max_serialize_size(&views, num_rows)?;
        self.grow_buffer(needed)?;
        self.max_one_row_size = max_one_row_size(&views);
        serialize_columns(
            &views,
            num_rows,
            &mut self.buffer,
            self.max_one_row_size,
            &mut self.slice_sizes,
        )
    }

    /// Insert the distinct keys of `chunk`; keys already present are left untouched.
    pub fn build_set(
        &mut self,
        _state: &RuntimeState,
        chunk: &Chunk,
        exprs: &[ExprId],
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        self.check_initialized()?;
        if self.probed {
            warn!(op = S::NAME, "build_set called after probe");
            return Err(Status::internal_error(format!(
                "{} hash set cannot build after probing started",
                S::NAME
            )));
        }
        let columns = self.evaluate_keys(chunk, exprs, expr_arena)?;
        let num_rows = chunk.len();
        if num_rows == 0 {
            build_key_column_views(&columns, &self.key_types)?;
            return Ok(());
        }
        self.serialize_chunk(&columns, num_rows)?;

        self.hash_set
            .try_reserve(num_rows, |entry| entry.hash)
            .map_err(|e| {
                Status::mem_alloc_failed(format!(
                    "{} hash set reserve {} entries failed: {:?}",
                    S::NAME,
                    num_rows,
                    e
                ))
            })?;

        let stride = self.max_one_row_size;
        for row in 0..num_rows {
            let start = row * stride;
            let key = &self.buffer[start..start + self.slice_sizes[row] as usize];
            let hash = slice_hash(key);
            let entry = self.hash_set.entry(
                hash,
                |stored| stored.hash == hash && stored.slice.as_bytes() == key,
                |stored| stored.hash,
            );
            if let hashbrown::hash_table::Entry::Vacant(vacant) = entry {
                let slice = self.key_pool.allocate_copy(key)?;
                vacant.insert(SliceFlag {
                    slice,
                    hash,
                    marker: S::new_marker(),
                });
            }
        }
        Ok(())
    }

    /// Look up every key of `chunk` and apply probe stage `stage` to the hits.
    pub fn probe(
        &mut self,
        _state: &RuntimeState,
        stage: usize,
        chunk: &Chunk,
        exprs: &[ExprId],
        expr_arena: &ExprArena,
    ) -> Result<(), Status> {
        self.check_initialized()?;
        if stage == 0 {
            return Err(Status::internal_error(format!(
                "{} probe stage must be positive",
                S::NAME
            )));
        }
        self.probed = true;
        let columns = self.evaluate_keys(chunk, exprs, expr_arena)?;
        let num_rows = chunk.len();
        if num_rows == 0 || self.hash_set.is_empty() {
            build_key_column_views(&columns, &self.key_types)?;
            return Ok(());
        }
        self.serialize_chunk(&columns, num_rows)?;

        let stride = self.max_one_row_size;
        for row in 0..num_rows {
            let start = row * stride;
            let key = &self.buffer[start..start + self.slice_sizes[row] as usize];
            let hash = slice_hash(key);
            if let Some(entry) = self
                .hash_set
                .find_mut(hash, |stored| stored.hash == hash && stored.slice.as_bytes() == key)
            {
                S::apply_probe(&mut entry.marker, stage)?;
            }
        }
        Ok(())
    }

    /// Keys whose marker is selected after `stage_total` stages.
    pub fn survivor_keys(&self, stage_total: usize) -> Result<Vec<&[u8]>, Status> {
        let mut keys = Vec::new();
        for entry in self.hash_set.iter() {
            if S::marker_selected(&entry.marker, stage_total)? {
                keys.push(entry.key());
            }
        }
        Ok(keys)
    }

    /// Same as `survivor_keys`, as pool views that stay valid while the set is alive.
    pub(crate) fn survivor_slices(&self, stage_total: usize) -> Result<Vec<Slice>, Status> {
        let mut slices = Vec::new();
        for entry in self.hash_set.iter() {
            if S::marker_selected(&entry.marker, stage_total)? {
                slices.push(entry.slice);
            }
        }
        Ok(slices)
    }

    /// Decode `keys` into one array per key column, in declared order.
    pub fn deserialize_to_columns(
        &self,
        keys: &[&[u8]],
        chunk_size: usize,
    ) -> Result<Vec<ArrayRef>, Status> {
        if keys.len() > chunk_size {
            return Err(Status::internal_error(format!(
                "{} decode batch of {} rows exceeds chunk size {}",
                S::NAME,
                keys.len(),
                chunk_size
            )));
        }
        deserialize_to_arrays(keys, &self.key_types)
    }
}
