// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Reusable byte buffers
//!
//! Request bodies and captured response bodies are written into buffers
//! checked out of a [`BufferPool`]. A [`PooledBuffer`] goes back to its pool
//! when dropped or explicitly released, whichever happens first; the second
//! return is a no-op.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// Capacity of freshly allocated buffers
pub const DEFAULT_INITIAL_SIZE: usize = 1024;
/// Buffers whose capacity grew past this are dropped instead of pooled
pub const DEFAULT_MAX_RETAINED: usize = 2056;

const MAX_POOLED: usize = 64;

/// Pool of reusable byte buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    initial_size: usize,
    max_retained: usize,
    stats: PoolCounters,
}

#[derive(Default)]
struct PoolCounters {
    checked_out: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Buffers handed out
    pub checked_out: u64,
    /// Buffers put back for reuse
    pub returned: u64,
    /// Buffers dropped because they grew too large or the pool was full
    pub discarded: u64,
    /// Buffers currently idle in the pool
    pub idle: usize,
}

impl BufferPool {
    /// Pool with the default sizes
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_INITIAL_SIZE, DEFAULT_MAX_RETAINED)
    }

    /// Pool whose new buffers start at `initial_size` bytes and which keeps
    /// buffers up to `max_retained` bytes of capacity
    pub fn with_sizes(initial_size: usize, max_retained: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                initial_size,
                max_retained: max_retained.max(initial_size),
                stats: PoolCounters::default(),
            }),
        }
    }

    /// Check out an empty buffer
    pub fn get(&self) -> PooledBuffer {
        let buf = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.inner.initial_size));
        self.inner.stats.checked_out.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buf,
            released: false,
            pool: self.clone(),
        }
    }

    fn put(&self, mut buf: BytesMut) {
        if buf.capacity() > self.inner.max_retained {
            self.inner.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        buf.clear();

        let mut free = self.inner.free.lock();
        if free.len() >= MAX_POOLED {
            self.inner.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        free.push(buf);
        self.inner.stats.returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            checked_out: self.inner.stats.checked_out.load(Ordering::Relaxed),
            returned: self.inner.stats.returned.load(Ordering::Relaxed),
            discarded: self.inner.stats.discarded.load(Ordering::Relaxed),
            idle: self.inner.free.lock().len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("initial_size", &self.inner.initial_size)
            .field("max_retained", &self.inner.max_retained)
            .finish()
    }
}

/// A buffer checked out of a [`BufferPool`]
pub struct PooledBuffer {
    buf: BytesMut,
    released: bool,
    pool: BufferPool,
}

impl PooledBuffer {
    /// Return the buffer to its pool now. Calling this more than once, or
    /// dropping afterwards, does nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pool.put(std::mem::take(&mut self.buf));
    }

    /// Whether the buffer has already gone back to the pool
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Copy the contents out as immutable bytes
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }

    /// Take the contents out, leaving the buffer empty but still checked out
    pub fn take_bytes(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .field("released", &self.is_released())
            .finish()
    }
}
