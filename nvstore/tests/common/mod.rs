//! Common test utilities and mock block devices

#![allow(dead_code)]

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use morpheus_nvstore::{
    CacheMaintenance, DeviceLocator, LocateError, LocatedDevice, NvStorageConfig,
};

/// Error returned by the mock device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockIoError {
    /// Injected read failure
    ReadFault,
    /// Injected write failure
    WriteFault,
    /// Access past the end of the device
    OutOfBounds,
}

impl fmt::Display for MockIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFault => write!(f, "injected read fault"),
            Self::WriteFault => write!(f, "injected write fault"),
            Self::OutOfBounds => write!(f, "access beyond end of device"),
        }
    }
}

/// One recorded `write_blocks` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub lba: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub data: Vec<u8>,
    pub reads: usize,
    pub read_sizes: Vec<usize>,
    pub writes: Vec<WriteRecord>,
    /// Fail this many upcoming reads
    pub failing_reads: usize,
    /// Fail every write
    pub fail_writes: bool,
    /// Accept writes without storing them
    pub drop_writes: bool,
}

/// In-memory block device for testing
///
/// Clones share the same backing state, so a test can keep a handle while
/// the store owns the device.
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub state: Arc<Mutex<DeviceState>>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Zero-filled device of `blocks` blocks
    pub fn new(blocks: usize, block_size: usize) -> Self {
        Self::from_data(vec![0u8; blocks * block_size], block_size)
    }

    pub fn from_data(data: Vec<u8>, block_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                data,
                ..Default::default()
            })),
            block_size,
        }
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().unwrap().failing_reads = count;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn set_drop_writes(&self, drop: bool) {
        self.state.lock().unwrap().drop_writes = drop;
    }

    pub fn reset_counters(&self) {
        let mut state = self.state.lock().unwrap();
        state.reads = 0;
        state.read_sizes.clear();
        state.writes.clear();
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn read_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().read_sizes.clone()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Copy of raw device bytes
    pub fn bytes(&self, start: usize, len: usize) -> Vec<u8> {
        self.state.lock().unwrap().data[start..start + len].to_vec()
    }

    /// Overwrite raw device bytes, bypassing the store
    pub fn poke(&self, start: usize, bytes: &[u8]) {
        self.state.lock().unwrap().data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = MockIoError;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.state.lock().unwrap().data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        assert_eq!(dst.len() % self.block_size, 0, "unaligned read");
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        state.read_sizes.push(dst.len());
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(MockIoError::ReadFault);
        }

        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > state.data.len() {
            return Err(MockIoError::OutOfBounds);
        }
        dst.copy_from_slice(&state.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        assert_eq!(src.len() % self.block_size, 0, "unaligned write");
        let mut state = self.state.lock().unwrap();
        state.writes.push(WriteRecord {
            lba: start_lba.0,
            data: src.to_vec(),
        });
        if state.fail_writes {
            return Err(MockIoError::WriteFault);
        }
        if state.drop_writes {
            return Ok(());
        }

        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > state.data.len() {
            return Err(MockIoError::OutOfBounds);
        }
        state.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Locator serving one device at one path
pub struct MemoryLocator {
    pub path: String,
    pub device: MemoryBlockDevice,
    pub media_id: u32,
    pub open_fails: bool,
}

impl MemoryLocator {
    pub fn new(path: &str, device: &MemoryBlockDevice) -> Self {
        Self {
            path: path.to_string(),
            device: device.clone(),
            media_id: 7,
            open_fails: false,
        }
    }
}

impl DeviceLocator for MemoryLocator {
    type Device = MemoryBlockDevice;

    fn locate(&mut self, path: &str) -> Result<LocatedDevice<Self::Device>, LocateError> {
        if path != self.path {
            return Err(LocateError::NotFound);
        }
        if self.open_fails {
            return Err(LocateError::OpenFailed);
        }
        Ok(LocatedDevice {
            device: self.device.clone(),
            media_id: self.media_id,
        })
    }
}

/// One cache maintenance call and the length of the range it covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    WriteBack(usize),
    Invalidate(usize),
}

/// Cache that records every maintenance call in order
#[derive(Debug, Default)]
pub struct RecordingCache {
    ops: RefCell<Vec<CacheOp>>,
}

impl RecordingCache {
    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.borrow().clone()
    }

    pub fn clear(&self) {
        self.ops.borrow_mut().clear();
    }
}

impl CacheMaintenance for RecordingCache {
    fn write_back(&self, range: &[u8]) {
        self.ops.borrow_mut().push(CacheOp::WriteBack(range.len()));
    }

    fn invalidate(&self, range: &[u8]) {
        self.ops.borrow_mut().push(CacheOp::Invalidate(range.len()));
    }
}

/// 64 x 512 region at LBA 0 with the default 0x8000/0x800/0x800 split
pub fn test_config(path: &str) -> NvStorageConfig {
    NvStorageConfig::default()
        .device(path)
        .region(0, 64, 512)
        .sizes(0x8000, 0x800, 0x800)
}
