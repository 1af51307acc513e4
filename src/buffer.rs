//! Fixed-size reusable transfer buffer.
//!
//! All content transfer between backends streams through a single
//! [`BlockBuffer`], bounding peak memory use independent of file size.

/// Default transfer block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// A reusable byte buffer of fixed capacity.
///
/// `len` tracks how many bytes of the buffer are currently valid; the final
/// chunk of a transfer is truncated to the remaining byte count.
pub struct BlockBuffer {
    data: Vec<u8>,
    len: usize,
}

impl BlockBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark `len` bytes as valid after a producer filled the buffer.
    ///
    /// `len` is clamped to capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Valid prefix of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole backing storage, for producers to fill.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reset the valid length to zero. The backing storage is reused.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

/// Iterator over the chunk lengths of a transfer of `total` bytes moved in
/// blocks of at most `block_size`.
pub fn chunk_sizes(total: u64, block_size: usize) -> impl Iterator<Item = usize> {
    let block = block_size.max(1) as u64;
    let mut remaining = total;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let chunk = remaining.min(block);
        remaining -= chunk;
        Some(chunk as usize)
    })
}
