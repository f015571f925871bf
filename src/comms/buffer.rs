// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! A process-wide pool of byte buffers. Buffers are handed out as scoped guards that return
//! themselves to the pool when dropped, so every exit path - including error paths - releases
//! what it acquired.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// The capacity buffers are created with and trimmed back to when returned.
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

const MAX_POOLED_BUFFERS: usize = 16;

pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

lazy_static! {
    static ref BUFFER_POOL: BufferPool = BufferPool::new();
}

/// The process-wide pool.
pub fn buffer_pool() -> &'static BufferPool {
    &BUFFER_POOL
}

impl BufferPool {
    pub fn new() -> BufferPool {
        BufferPool {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Takes an empty buffer from the pool, or creates one if the pool is dry.
    pub fn take(&'static self) -> PooledBuffer {
        let buffer = {
            let mut buffers = self.buffers.lock();
            buffers.pop()
        };
        PooledBuffer {
            pool: self,
            buffer: buffer.unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUFFER_SIZE)),
        }
    }

    fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        buffer.shrink_to(DEFAULT_BUFFER_SIZE);
        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buffer);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new()
    }
}

/// A buffer on loan from the pool. Dereferences to a `Vec<u8>` and returns itself on drop.
pub struct PooledBuffer {
    pool: &'static BufferPool,
    buffer: Vec<u8>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buffer));
    }
}
