//! Buffer Pool - Reusable byte buffers bucketed by size
//!
//! The pool is owned by the paged memory cache and is never shared, so it
//! needs no locking. Free buffers are dropped wholesale on a timer so sizes
//! that stop being requested do not pin memory forever.

use std::collections::HashMap;

/// Size-bucketed free list of byte buffers
#[derive(Debug)]
pub struct BufferPool {
    /// Free buffers keyed by exact length
    free: HashMap<usize, Vec<Vec<u8>>>,
    /// Minimum time between flushes (logical milliseconds)
    flush_interval_ms: u64,
    /// Logical time of the last flush
    last_flush_ms: u64,
    /// Buffers handed out that were served from the free list
    reused: u64,
    /// Buffers handed out that had to be allocated
    allocated: u64,
}

impl BufferPool {
    pub fn new(flush_interval_ms: u64) -> Self {
        Self {
            free: HashMap::new(),
            flush_interval_ms,
            last_flush_ms: 0,
            reused: 0,
            allocated: 0,
        }
    }

    /// Borrow a zeroed buffer of exactly `size` bytes
    pub fn borrow(&mut self, size: usize) -> Vec<u8> {
        if let Some(mut buffer) = self.free.get_mut(&size).and_then(Vec::pop) {
            buffer.fill(0);
            self.reused += 1;
            return buffer;
        }
        self.allocated += 1;
        vec![0u8; size]
    }

    /// Make a buffer available for reuse by its size class
    pub fn give_back(&mut self, buffer: Vec<u8>) {
        if buffer.is_empty() {
            return;
        }
        self.free.entry(buffer.len()).or_default().push(buffer);
    }

    /// Drop every free buffer if the flush interval has elapsed
    pub fn maybe_flush(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_flush_ms) < self.flush_interval_ms {
            return false;
        }
        self.last_flush_ms = now_ms;
        self.flush();
        true
    }

    /// Drop every free buffer
    pub fn flush(&mut self) {
        self.free.clear();
    }

    /// Number of buffers currently waiting for reuse
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn reused(&self) -> u64 {
        self.reused
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }
}
