use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// default scratch buffer length, in samples (all channels)
pub const DEFAULT_SCRATCH_LEN: usize = 65536;

lazy_static! {
    static ref SHARED_POOL: Arc<BufferPool> = Arc::new(BufferPool::new(DEFAULT_SCRATCH_LEN));
}

/**
 * a simple pool of scratch buffers, so the streaming code doesn't
 * allocate a fresh de-interleaving buffer for every read
 */
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<f32>>>,
    buffer_len: usize,
}

impl BufferPool {
    pub fn new(buffer_len: usize) -> Self {
        BufferPool {
            buffers: Mutex::new(Vec::new()),
            buffer_len,
        }
    }

    /// the process-wide pool
    pub fn shared() -> Arc<BufferPool> {
        Arc::clone(&SHARED_POOL)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// number of idle buffers currently held
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Rent a buffer of at least `min_len` samples. The buffer goes back
    /// to the pool once the returned handle is dropped. Requests larger
    /// than the pool's buffer length get a one-off allocation.
    pub fn rent(self: &Arc<Self>, min_len: usize) -> PooledBuffer {
        let len = self.buffer_len.max(min_len);
        let recycled = {
            let mut idle = self.buffers.lock();
            idle.iter()
                .position(|b| b.len() >= len)
                .map(|pos| idle.swap_remove(pos))
        };

        PooledBuffer {
            buffer: recycled.unwrap_or_else(|| vec![0.0; len]),
            pool: Arc::clone(self),
        }
    }

    fn give_back(&self, buffer: Vec<f32>) {
        self.buffers.lock().push(buffer);
    }
}

pub struct PooledBuffer {
    buffer: Vec<f32>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.pool.give_back(buffer);
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_and_return() {
        let pool = Arc::new(BufferPool::new(128));
        assert_eq!(pool.idle(), 0);
        {
            let buf = pool.rent(16);
            assert_eq!(buf.len(), 128);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        // the returned buffer gets reused
        let _buf = pool.rent(64);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_oversized_request() {
        let pool = Arc::new(BufferPool::new(32));
        let buf = pool.rent(100);
        assert_eq!(buf.len(), 100);
        drop(buf);

        // a regular request may reuse the oversized buffer
        let buf = pool.rent(10);
        assert!(buf.len() >= 32);
    }
}
