//! Mirrored region buffer
//!
//! One heap buffer the size of the whole reserved region. All device
//! transfers go through it; partial reads and writes are served by
//! copying in or out of the block-aligned window.

use alloc::vec::Vec;

/// In-memory copy of the reserved region.
pub struct MirrorBuffer {
    data: Vec<u8>,
    block_size: usize,
    /// Address published to the variable services (relocated at runtime).
    base: u64,
}

impl MirrorBuffer {
    /// Allocate a zeroed buffer of `len` bytes.
    ///
    /// Returns `None` if the allocation cannot be satisfied.
    pub fn allocate(len: usize, block_size: usize) -> Option<Self> {
        let data = zeroed(len)?;
        let base = data.as_ptr() as u64;
        Some(Self {
            data,
            block_size,
            base,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Published base address.
    pub fn base_address(&self) -> u64 {
        self.base
    }

    /// Round `offset + length` up to whole blocks.
    pub fn aligned_len(&self, offset: usize, length: usize) -> Option<usize> {
        let end = offset.checked_add(length)?;
        end.div_ceil(self.block_size).checked_mul(self.block_size)
    }

    /// Byte span `[start, start + len)` if it fits in the buffer.
    pub fn span(&self, start: usize, len: usize) -> Option<core::ops::Range<usize>> {
        let end = start.checked_add(len)?;
        if end <= self.data.len() {
            Some(start..end)
        } else {
            None
        }
    }

    pub fn window(&self, range: core::ops::Range<usize>) -> &[u8] {
        &self.data[range]
    }

    pub fn window_mut(&mut self, range: core::ops::Range<usize>) -> &mut [u8] {
        &mut self.data[range]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Rewrite the published address after a virtual address change.
    ///
    /// Contents are left alone.
    pub fn relocate(&mut self, convert: impl FnOnce(u64) -> u64) {
        self.base = convert(self.base);
    }
}

/// Fallible zeroed allocation.
pub(crate) fn zeroed(len: usize) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0);
    Some(data)
}
