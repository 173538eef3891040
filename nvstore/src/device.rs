//! Backing block device
//!
//! The store talks to its device through `gpt_disk_io::BlockIo`. How the
//! device is found (UEFI device path lookup, virtio probe, test double) is
//! up to the platform's [`DeviceLocator`].

use alloc::string::String;
use alloc::vec::Vec;

use gpt_disk_io::BlockIo;
use spin::Mutex;

/// Why a device could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateError {
    /// Nothing at that path
    NotFound,
    /// Found, but the block I/O interface could not be opened
    OpenFailed,
}

/// A device returned by a locator.
pub struct LocatedDevice<D> {
    pub device: D,
    pub media_id: u32,
}

/// Resolves a configured device path to an open block device.
pub trait DeviceLocator {
    type Device: BlockIo;

    fn locate(&mut self, path: &str) -> Result<LocatedDevice<Self::Device>, LocateError>;
}

/// Media description captured at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Media {
    pub media_id: u32,
    pub block_size: u32,
    pub last_block: u64,
}

/// Contiguous run of blocks, relative to the start of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbaRange {
    pub lba: u64,
    pub count: u64,
}

impl LbaRange {
    pub const fn new(lba: u64, count: u64) -> Self {
        Self { lba, count }
    }

    /// Whether the range lies within `block_count` blocks. An empty range
    /// fits anywhere up to the end of the region.
    pub fn fits(&self, block_count: u64) -> bool {
        match self.lba.checked_add(self.count) {
            Some(end) => end <= block_count,
            None => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLAIM REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

/// Device paths currently owned by a live store.
static CLAIMED: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Exclusive claim on a device path. Released on drop.
#[derive(Debug)]
pub struct DeviceClaim {
    path: String,
}

impl DeviceClaim {
    /// Claim `path`, or `None` if a live store already holds it.
    pub fn acquire(path: &str) -> Option<Self> {
        let mut claimed = CLAIMED.lock();
        if claimed.iter().any(|p| p == path) {
            return None;
        }
        claimed.push(String::from(path));
        Some(Self {
            path: String::from(path),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED.lock();
        if let Some(pos) = claimed.iter().position(|p| *p == self.path) {
            claimed.swap_remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let first = DeviceClaim::acquire("claim-test(0)").unwrap();
        assert!(DeviceClaim::acquire("claim-test(0)").is_none());
        assert!(DeviceClaim::acquire("claim-test(1)").is_some());

        drop(first);
        assert!(DeviceClaim::acquire("claim-test(0)").is_some());
    }

    #[test]
    fn test_lba_range_fits() {
        assert!(LbaRange::new(0, 64).fits(64));
        assert!(LbaRange::new(63, 1).fits(64));
        assert!(!LbaRange::new(63, 2).fits(64));
        assert!(LbaRange::new(0, 0).fits(64));
        assert!(LbaRange::new(64, 0).fits(64));
        assert!(!LbaRange::new(65, 0).fits(64));
        assert!(!LbaRange::new(u64::MAX, 2).fits(64));
    }
}
