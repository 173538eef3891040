//! Data cache maintenance hooks
//!
//! On non-coherent platforms (eMMC controllers doing DMA behind the CPU
//! caches) the mirror must be cleaned before the device reads it and
//! invalidated after the device writes it. Coherent targets use [`NoCache`].

/// Cache maintenance for buffers shared with the block device.
pub trait CacheMaintenance {
    /// Clean (write back) the cache lines covering `range`.
    fn write_back(&self, range: &[u8]);

    /// Invalidate the cache lines covering `range`.
    fn invalidate(&self, range: &[u8]);
}

/// Cache-coherent platform: nothing to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl CacheMaintenance for NoCache {
    #[inline]
    fn write_back(&self, _range: &[u8]) {}

    #[inline]
    fn invalidate(&self, _range: &[u8]) {}
}

impl<C: CacheMaintenance + ?Sized> CacheMaintenance for &C {
    fn write_back(&self, range: &[u8]) {
        (**self).write_back(range)
    }

    fn invalidate(&self, range: &[u8]) {
        (**self).invalidate(range)
    }
}
