//! Firmware volume block surface
//!
//! The operations the variable services drive: attribute queries, geometry,
//! byte-granular read/write at `(lba, offset)`, and erase. Everything is
//! served through the mirrored buffer with whole-block device transfers.
//!
//! # Write sequence
//!
//! ```text
//! zero window ─► reload from device ─► patch bytes ─► write ─► write again ─► read back
//! ```
//!
//! The second write is required: the eMMC parts this runs on have been seen
//! to lose the final write of a session.

use core::ops::Range;

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use crate::cache::CacheMaintenance;
use crate::device::LbaRange;
use crate::error::{NvError, NvResult};
use crate::lifecycle::BlockVariable;
use crate::trace::TraceCategory;

/// FVB attribute bits, same values as EFI_FVB_ATTRIBUTES_2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FvbAttributes(pub u32);

impl FvbAttributes {
    pub const READ_DISABLED_CAP: Self = Self(0x0000_0001);
    pub const READ_ENABLED_CAP: Self = Self(0x0000_0002);
    pub const READ_STATUS: Self = Self(0x0000_0004);
    pub const WRITE_DISABLED_CAP: Self = Self(0x0000_0008);
    pub const WRITE_ENABLED_CAP: Self = Self(0x0000_0010);
    pub const WRITE_STATUS: Self = Self(0x0000_0020);
    pub const LOCK_CAP: Self = Self(0x0000_0040);
    pub const LOCK_STATUS: Self = Self(0x0000_0080);
    pub const STICKY_WRITE: Self = Self(0x0000_0200);  // Erase needed to flip bits back
    pub const MEMORY_MAPPED: Self = Self(0x0000_0400);
    pub const ERASE_POLARITY: Self = Self(0x0000_0800); // Erased bits read as 1

    /// What this store reports, always.
    pub const FIXED: Self = Self::READ_ENABLED_CAP
        .union(Self::READ_STATUS)
        .union(Self::STICKY_WRITE)
        .union(Self::MEMORY_MAPPED)
        .union(Self::ERASE_POLARITY)
        .union(Self::WRITE_STATUS)
        .union(Self::WRITE_ENABLED_CAP);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Firmware volume block operations.
pub trait FirmwareVolumeBlock {
    type Error;

    /// Capability and status bits.
    fn attributes(&self) -> FvbAttributes;

    /// Change attributes.
    fn set_attributes(&mut self, attributes: FvbAttributes) -> Result<FvbAttributes, Self::Error>;

    /// Base address of the memory-mapped copy.
    fn physical_address(&self) -> u64;

    /// `(block size, number of blocks)` for the block at `lba`.
    fn block_size(&self, lba: u64) -> (usize, usize);

    /// Read `buf.len()` bytes at `offset` within block `lba`.
    fn read(&mut self, lba: u64, offset: usize, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` at `offset` within block `lba`.
    fn write(&mut self, lba: u64, offset: usize, data: &[u8]) -> Result<usize, Self::Error>;

    /// Erase the given block ranges.
    fn erase_blocks(&mut self, ranges: &[LbaRange]) -> Result<(), Self::Error>;
}

impl<D: BlockIo, C: CacheMaintenance> BlockVariable<D, C> {
    /// Mirror window covering the block-aligned span of a request.
    ///
    /// The window starts at `lba * block_size` so the mirror keeps the same
    /// layout as the region on the device.
    fn window_for(
        &mut self,
        category: TraceCategory,
        lba: u64,
        offset: usize,
        len: usize,
    ) -> NvResult<Range<usize>, D::Error> {
        let block_size = self.mirror.block_size();
        let window = self.mirror.aligned_len(offset, len).and_then(|aligned| {
            let start = usize::try_from(lba).ok()?.checked_mul(block_size)?;
            self.mirror.span(start, aligned)
        });

        match window {
            Some(window) => Ok(window),
            None => {
                self.trace.error_at(category, "request outside region", lba, offset);
                Err(NvError::InvalidRange)
            }
        }
    }

    fn device_lba(&self, lba: u64) -> Lba {
        Lba(self.start_lba + lba)
    }
}

impl<D: BlockIo, C: CacheMaintenance> FirmwareVolumeBlock for BlockVariable<D, C> {
    type Error = NvError<D::Error>;

    fn attributes(&self) -> FvbAttributes {
        FvbAttributes::FIXED
    }

    fn set_attributes(&mut self, _attributes: FvbAttributes) -> Result<FvbAttributes, Self::Error> {
        self.trace.warning(TraceCategory::Lifecycle, "set_attributes is not supported");
        Err(NvError::Unsupported)
    }

    fn physical_address(&self) -> u64 {
        self.mirror.base_address()
    }

    fn block_size(&self, _lba: u64) -> (usize, usize) {
        (self.mirror.block_size(), self.block_count as usize)
    }

    fn read(&mut self, lba: u64, offset: usize, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let window = self.window_for(TraceCategory::Read, lba, offset, buf.len())?;
        if window.is_empty() {
            return Ok(0);
        }
        let device_lba = self.device_lba(lba);

        self.cache.write_back(self.mirror.window(window.clone()));
        self.cache.invalidate(buf);

        if let Err(err) = self
            .device
            .read_blocks(device_lba, self.mirror.window_mut(window.clone()))
        {
            self.trace.error_at(TraceCategory::Read, "read_blocks failed", lba, offset);
            return Err(NvError::Device(err));
        }

        let src = window.start + offset..window.start + offset + buf.len();
        buf.copy_from_slice(self.mirror.window(src));
        self.cache.write_back(buf);

        Ok(buf.len())
    }

    fn write(&mut self, lba: u64, offset: usize, data: &[u8]) -> Result<usize, Self::Error> {
        let window = self.window_for(TraceCategory::Write, lba, offset, data.len())?;
        if window.is_empty() {
            return Ok(0);
        }
        let device_lba = self.device_lba(lba);
        self.trace.debug_at(TraceCategory::Write, "write", lba, offset);

        // Reload the whole span so bytes around the patch are preserved
        self.mirror.window_mut(window.clone()).fill(0);
        self.cache.write_back(self.mirror.window(window.clone()));
        if let Err(err) = self
            .device
            .read_blocks(device_lba, self.mirror.window_mut(window.clone()))
        {
            self.trace.error_at(TraceCategory::Write, "reload before write failed", lba, offset);
            return Err(NvError::Device(err));
        }
        self.cache.invalidate(self.mirror.window(window.clone()));

        let patch = window.start + offset..window.start + offset + data.len();
        self.mirror.window_mut(patch.clone()).copy_from_slice(data);
        self.cache.write_back(self.mirror.window(window.clone()));

        let first = self
            .device
            .write_blocks(device_lba, self.mirror.window(window.clone()));
        if first.is_err() {
            self.trace.error_at(TraceCategory::Write, "write_blocks failed", lba, offset);
        }

        // Flush it again: the last write is sometimes not committed
        let second = self
            .device
            .write_blocks(device_lba, self.mirror.window(window.clone()));
        if second.is_err() {
            self.trace.error_at(TraceCategory::Write, "repeat write_blocks failed", lba, offset);
        }
        first.and(second).map_err(NvError::Device)?;

        if let Err(err) = self
            .device
            .read_blocks(device_lba, self.mirror.window_mut(window.clone()))
        {
            self.trace.error_at(TraceCategory::Write, "read back after write failed", lba, offset);
            return Err(NvError::Device(err));
        }
        self.cache.invalidate(self.mirror.window(window));

        if self.mirror.window(patch) != data {
            self.trace.error_at(TraceCategory::Write, "read back mismatch", lba, offset);
            return Err(NvError::VerifyFailed);
        }

        Ok(data.len())
    }

    fn erase_blocks(&mut self, ranges: &[LbaRange]) -> Result<(), Self::Error> {
        if let Some(bad) = ranges.iter().find(|r| !r.fits(self.block_count)) {
            self.trace.error_at(TraceCategory::Erase, "erase range outside region", bad.lba, 0);
            return Err(NvError::Unsupported);
        }

        // Overwrite-in-place media: there is no separate erase step
        Ok(())
    }
}
