//! Variable store configuration.
//!
//! Platform description of where the variable region lives and how it is
//! split. These values are fixed per board and are not re-read at runtime.

use alloc::string::String;

use crate::error::NvError;
use crate::header::HEADERS_LEN;

/// Default block size of the backing device.
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Default number of blocks reserved for the store.
pub const DEFAULT_BLOCK_COUNT: u32 = 64;

/// Default variable region size.
pub const DEFAULT_VARIABLE_SIZE: u32 = 0x8000;

/// Default fault-tolerant-write working area size.
pub const DEFAULT_WORKING_SIZE: u32 = 0x800;

/// Default fault-tolerant-write spare area size.
pub const DEFAULT_SPARE_SIZE: u32 = 0x800;

/// Variable store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvStorageConfig {
    /// First LBA of the reserved region on the device.
    pub block_lba: u64,
    /// Number of blocks reserved.
    pub block_count: u32,
    /// Block size in bytes (must match the device).
    pub block_size: u32,
    /// Text device path of the backing block device.
    pub device_path: String,
    /// Variable region size.
    pub variable_size: u32,
    /// FTW working area size.
    pub working_size: u32,
    /// FTW spare area size.
    pub spare_size: u32,
}

impl Default for NvStorageConfig {
    fn default() -> Self {
        Self {
            block_lba: 0,
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
            device_path: String::new(),
            variable_size: DEFAULT_VARIABLE_SIZE,
            working_size: DEFAULT_WORKING_SIZE,
            spare_size: DEFAULT_SPARE_SIZE,
        }
    }
}

impl NvStorageConfig {
    /// Set the backing device path.
    pub fn device(mut self, path: &str) -> Self {
        self.device_path = String::from(path);
        self
    }

    /// Set the reserved region geometry.
    pub fn region(mut self, block_lba: u64, block_count: u32, block_size: u32) -> Self {
        self.block_lba = block_lba;
        self.block_count = block_count;
        self.block_size = block_size;
        self
    }

    /// Set the variable / working / spare split.
    pub fn sizes(mut self, variable_size: u32, working_size: u32, spare_size: u32) -> Self {
        self.variable_size = variable_size;
        self.working_size = working_size;
        self.spare_size = spare_size;
        self
    }

    /// Bytes reserved on the device (block count x block size).
    pub fn region_size(&self) -> usize {
        self.block_count as usize * self.block_size as usize
    }

    /// Expected firmware volume length.
    pub fn fv_length(&self) -> u64 {
        self.variable_size as u64 + self.working_size as u64 + self.spare_size as u64
    }

    /// Check the configuration before any device access.
    pub fn validate<E>(&self) -> Result<(), NvError<E>> {
        if self.device_path.is_empty() {
            return Err(NvError::InvalidConfig("device path is empty"));
        }
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(NvError::InvalidConfig("block size must be a power of two"));
        }
        if self.block_count == 0 {
            return Err(NvError::InvalidConfig("block count is zero"));
        }

        // Each area must span at least one block
        for size in [self.variable_size, self.working_size, self.spare_size] {
            if size / self.block_size == 0 {
                return Err(NvError::InvalidConfig("area smaller than one block"));
            }
        }

        if (self.variable_size as usize) < HEADERS_LEN || self.region_size() < HEADERS_LEN {
            return Err(NvError::BadBufferSize);
        }

        Ok(())
    }
}
