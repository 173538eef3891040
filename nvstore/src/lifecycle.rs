//! Store lifecycle
//!
//! ```text
//! Uninitialized ──► DeviceBound ──► HeaderValidated ──► Ready
//!                        │                               ▲
//!                        └────────► Reformatting ────────┘
//! ```
//!
//! [`BlockVariable::initialize`] walks the whole chain and only hands out a
//! store once it is `Ready`. Configuration, allocation and device binding
//! failures abort with nothing published; a bad header is repaired by
//! formatting the region.
//!
//! At ExitBootServices/SetVirtualAddressMap the host calls
//! [`BlockVariable::virtual_address_change`] once. The store owns its
//! device and buffers, so only the published buffer address needs
//! converting.

use alloc::vec::Vec;

use gpt_disk_io::BlockIo;

use crate::cache::{CacheMaintenance, NoCache};
use crate::config::NvStorageConfig;
use crate::device::{DeviceClaim, DeviceLocator, LbaRange, LocateError, Media};
use crate::error::{NvError, NvResult};
use crate::fvb::FirmwareVolumeBlock;
use crate::header::{encode_headers, validate_headers, HEADERS_LEN};
use crate::mirror::{self, MirrorBuffer};
use crate::trace::{TraceCategory, TraceLog};

/// Where the store is in its bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    DeviceBound,
    HeaderValidated,
    Reformatting,
    Ready,
}

/// Firmware execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Boot services available
    Boot,
    /// After the virtual address change
    Runtime,
}

/// Block-device-backed variable store instance.
pub struct BlockVariable<D: BlockIo, C: CacheMaintenance = NoCache> {
    pub(crate) device: D,
    pub(crate) media: Media,
    pub(crate) config: NvStorageConfig,
    /// First device LBA of the region
    pub(crate) start_lba: u64,
    pub(crate) block_count: u64,
    pub(crate) mirror: MirrorBuffer,
    /// Region snapshot taken when the store became ready
    pub(crate) resident: Vec<u8>,
    pub(crate) cache: C,
    pub(crate) state: LifecycleState,
    pub(crate) phase: Phase,
    pub(crate) formatted: bool,
    pub(crate) trace: TraceLog,
    _claim: DeviceClaim,
}

impl<D: BlockIo, C: CacheMaintenance> BlockVariable<D, C> {
    /// Bind the configured device and bring the store to `Ready`.
    pub fn initialize<L>(
        config: NvStorageConfig,
        locator: &mut L,
        cache: C,
    ) -> NvResult<Self, D::Error>
    where
        L: DeviceLocator<Device = D>,
    {
        config.validate::<D::Error>()?;

        let region = config.region_size();
        let mirror = MirrorBuffer::allocate(region, config.block_size as usize)
            .ok_or(NvError::OutOfResources)?;
        let resident = mirror::zeroed(region).ok_or(NvError::OutOfResources)?;

        let claim = DeviceClaim::acquire(&config.device_path).ok_or(NvError::DeviceBusy)?;
        let located = locator.locate(&config.device_path).map_err(|err| match err {
            LocateError::NotFound => NvError::DeviceNotFound,
            LocateError::OpenFailed => NvError::DeviceOpenFailed,
        })?;

        let mut device = located.device;
        if device.block_size().to_u32() != config.block_size {
            return Err(NvError::GeometryMismatch);
        }
        let num_blocks = device.num_blocks().map_err(NvError::Device)?;
        let block_count = config.block_count as u64;
        match config.block_lba.checked_add(block_count) {
            Some(end) if end <= num_blocks => {}
            _ => return Err(NvError::GeometryMismatch),
        }

        let media = Media {
            media_id: located.media_id,
            block_size: config.block_size,
            last_block: num_blocks.saturating_sub(1),
        };

        let mut trace = TraceLog::new();
        trace.info(TraceCategory::Lifecycle, "NV storage device bound");

        let mut store = Self {
            device,
            media,
            start_lba: config.block_lba,
            block_count,
            config,
            mirror,
            resident,
            cache,
            state: LifecycleState::DeviceBound,
            phase: Phase::Boot,
            formatted: false,
            trace,
            _claim: claim,
        };

        store.check_or_format()?;
        store.load_resident()?;
        store.state = LifecycleState::Ready;
        store.trace.success(TraceCategory::Lifecycle, "variable store ready");

        Ok(store)
    }

    /// Validate the on-device headers; format the region if they are bad.
    fn check_or_format(&mut self) -> NvResult<(), D::Error> {
        let mut headers = [0u8; HEADERS_LEN];
        self.read(0, 0, &mut headers)?;

        match validate_headers(&headers, &self.config) {
            Ok(()) => {
                self.state = LifecycleState::HeaderValidated;
                self.trace.success(TraceCategory::Header, "firmware volume header valid");
                Ok(())
            }
            Err(reason) => {
                self.trace.warning(TraceCategory::Header, reason.as_str());
                self.state = LifecycleState::Reformatting;
                self.reformat()
            }
        }
    }

    /// Erase the region and write fresh headers.
    ///
    /// Safe to repeat; an interrupted format is finished by running it again.
    pub fn reformat(&mut self) -> NvResult<(), D::Error> {
        self.erase_blocks(&[LbaRange::new(0, self.block_count)])?;

        let mut headers = [0u8; HEADERS_LEN];
        let len = encode_headers(&self.config, &mut headers)?;
        self.write(0, 0, &headers[..len])?;

        self.formatted = true;
        self.trace.success(TraceCategory::Header, "variable store formatted");
        Ok(())
    }

    /// Reload the whole region into the resident image.
    fn load_resident(&mut self) -> NvResult<(), D::Error> {
        let mut resident = core::mem::take(&mut self.resident);
        let result = self.read(0, 0, &mut resident);
        self.resident = resident;
        result.map(|_| ())
    }

    /// Handle the switch to virtual addressing. Only valid once.
    pub fn virtual_address_change(
        &mut self,
        convert: impl FnOnce(u64) -> u64,
    ) -> NvResult<(), D::Error> {
        if self.phase == Phase::Runtime {
            return Err(NvError::AlreadyAtRuntime);
        }

        self.mirror.relocate(convert);
        self.phase = Phase::Runtime;
        self.trace.set_phase(Phase::Runtime);
        self.trace.info(TraceCategory::Runtime, "virtual address change applied");
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the region was (re)formatted during this initialization.
    pub fn formatted_on_boot(&self) -> bool {
        self.formatted
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub fn config(&self) -> &NvStorageConfig {
        &self.config
    }

    /// Region contents as loaded when the store became ready.
    pub fn resident_image(&self) -> &[u8] {
        &self.resident
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Give up the store and return the device. Releases the claim.
    pub fn into_device(self) -> D {
        self.device
    }
}
