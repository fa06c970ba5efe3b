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
//! Arena storage for serialized set-operation keys.
//!
//! `MemPool` hands out byte ranges from boxed regions that are never reallocated, so a
//! `Slice` pointing into it stays valid until the pool is dropped. Owners must keep the
//! pool alive at least as long as any slice they store.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::common::status::Status;
use crate::runtime::mem_tracker::MemTracker;

/// Non-owning view over bytes stored in a `MemPool`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Slice {
    ptr: usize,
    len: usize,
}

impl Slice {
    pub(crate) fn empty() -> Self {
        Self {
            ptr: NonNull::<u8>::dangling().as_ptr() as usize,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The caller must hold a borrow of the owning pool (or of a structure that owns it).
    pub(crate) fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

pub(crate) struct MemPool {
    chunks: Vec<Box<[u8]>>,
    cursor: usize,
    next_chunk_size: usize,
    max_chunk_size: usize,
    total_reserved_bytes: usize,
    total_allocated_bytes: usize,
    mem_tracker: Option<Arc<MemTracker>>,
}

impl MemPool {
    pub(crate) fn new(initial_chunk_size: usize, max_chunk_size: usize) -> Self {
        let initial_chunk_size = initial_chunk_size.max(1);
        Self {
            chunks: Vec::new(),
            cursor: 0,
            next_chunk_size: initial_chunk_size,
            max_chunk_size: max_chunk_size.max(initial_chunk_size),
            total_reserved_bytes: 0,
            total_allocated_bytes: 0,
            mem_tracker: None,
        }
    }

    pub(crate) fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        if let Some(current) = self.mem_tracker.as_ref() {
            if Arc::ptr_eq(current, &tracker) {
                return;
            }
            current.release(bytes_i64(self.total_reserved_bytes));
        }
        tracker.consume(bytes_i64(self.total_reserved_bytes));
        self.mem_tracker = Some(tracker);
    }

    pub(crate) fn total_reserved_bytes(&self) -> usize {
        self.total_reserved_bytes
    }

    pub(crate) fn total_allocated_bytes(&self) -> usize {
        self.total_allocated_bytes
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn remaining_in_current(&self) -> usize {
        self.chunks
            .last()
            .map(|c| c.len() - self.cursor)
            .unwrap_or(0)
    }

    /// Make sure the current region can serve `size` more bytes without another allocation.
    pub(crate) fn reserve(&mut self, size: usize) -> Result<(), Status> {
        if self.remaining_in_current() >= size && !self.chunks.is_empty() {
            return Ok(());
        }
        self.find_chunk(size)
    }

    fn find_chunk(&mut self, min_size: usize) -> Result<(), Status> {
        let chunk_size = self.next_chunk_size.max(min_size).max(1);
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(chunk_size).map_err(|e| {
            Status::mem_alloc_failed(format!(
                "mem pool failed to allocate chunk of {} bytes: {}",
                chunk_size, e
            ))
        })?;
        buf.resize(chunk_size, 0);
        self.chunks.push(buf.into_boxed_slice());
        self.cursor = 0;
        self.total_reserved_bytes += chunk_size;
        self.next_chunk_size = self
            .next_chunk_size
            .saturating_mul(2)
            .min(self.max_chunk_size);
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.consume(bytes_i64(chunk_size));
        }
        Ok(())
    }

    /// Copy `bytes` into the pool and return a stable view of the copy.
    pub(crate) fn allocate_copy(&mut self, bytes: &[u8]) -> Result<Slice, Status> {
        if bytes.is_empty() {
            return Ok(Slice::empty());
        }
        if self.chunks.is_empty() || self.remaining_in_current() < bytes.len() {
            self.find_chunk(bytes.len())?;
        }
        let start = self.cursor;
        let end = start + bytes.len();
        let chunk = self
            .chunks
            .last_mut()
            .ok_or_else(|| Status::internal_error("mem pool has no chunk after allocation"))?;
        chunk[start..end].copy_from_slice(bytes);
        self.cursor = end;
        self.total_allocated_bytes += bytes.len();
        Ok(Slice {
            ptr: chunk.as_ptr().wrapping_add(start) as usize,
            len: bytes.len(),
        })
    }
}

fn bytes_i64(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

impl Drop for MemPool {
    fn drop(&mut self) {
        if let Some(tracker) = self.mem_tracker.as_ref() {
            tracker.release(bytes_i64(self.total_reserved_bytes));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_stay_valid_across_chunk_growth() {
        let mut pool = MemPool::new(8, 64);
        let first = pool.allocate_copy(b"abcdef").expect("alloc");
        let mut later = Vec::new();
        for i in 0..32u8 {
            later.push(pool.allocate_copy(&[i; 5]).expect("alloc"));
        }
        assert!(pool.chunk_count() > 1);
        assert_eq!(first.as_bytes(), b"abcdef");
        for (i, slice) in later.iter().enumerate() {
            assert_eq!(slice.as_bytes(), &[i as u8; 5]);
        }
        assert_eq!(pool.total_allocated_bytes(), 6 + 32 * 5);
        assert!(pool.total_reserved_bytes() >= pool.total_allocated_bytes());
    }

    #[test]
    fn oversized_request_gets_dedicated_chunk() {
        let mut pool = MemPool::new(4, 16);
        let big = vec![7u8; 100];
        let slice = pool.allocate_copy(&big).expect("alloc");
        assert_eq!(slice.len(), 100);
        assert_eq!(slice.as_bytes(), big.as_slice());
        assert!(pool.total_reserved_bytes() >= 100);
    }

    #[test]
    fn empty_copy_does_not_reserve() {
        let mut pool = MemPool::new(16, 16);
        let slice = pool.allocate_copy(&[]).expect("alloc");
        assert_eq!(slice.len(), 0);
        assert!(slice.as_bytes().is_empty());
        assert_eq!(pool.total_reserved_bytes(), 0);
    }

    #[test]
    fn reserve_preallocates_and_tracker_is_released_on_drop() {
        let tracker = MemTracker::new_root("pool");
        {
            let mut pool = MemPool::new(32, 1024);
            pool.reserve(10).expect("reserve");
            assert_eq!(pool.chunk_count(), 1);
            pool.set_mem_tracker(tracker.clone());
            assert_eq!(tracker.current(), 32);
            pool.allocate_copy(&[1u8; 10]).expect("alloc");
            assert_eq!(pool.chunk_count(), 1);
        }
        assert_eq!(tracker.current(), 0);
        assert_eq!(tracker.peak(), 32);
    }
}
