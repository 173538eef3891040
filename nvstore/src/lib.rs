//! Block-Backed Variable Store
//!
//! Persists firmware variables on a raw block device (eMMC boot partition,
//! virtio disk, ...) by emulating a firmware volume block (FVB) device on top
//! of plain `BlockIo`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                variable services (consumer)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ FirmwareVolumeBlock
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  BlockVariable                                              │
//! │   - lifecycle: locate device, validate/format, runtime      │
//! │   - fvb:       read / write / erase / attributes            │
//! │   - mirror:    in-memory copy of the reserved region        │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//!   ┌────────────┐      ┌────────────┐      ┌────────────┐
//!   │  header    │      │   device   │      │   trace    │
//!   │  (codec)   │      │  (BlockIo) │      │  (ring)    │
//!   └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! # On-device layout
//!
//! ```text
//! [0 .. 72)      firmware volume header (+ block map, terminator)
//! [72 .. 100)    variable store header
//! [100 .. )      variable records (owned by the variable services)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use morpheus_nvstore::{BlockVariable, FirmwareVolumeBlock, NoCache, NvStorageConfig};
//!
//! let config = NvStorageConfig::default()
//!     .device("VenHw(B549F005-4BD4-4020-A0CB-06F42BDA68C3)/HD(6,GPT)")
//!     .region(0x3400, 64, 512);
//!
//! let mut store = BlockVariable::initialize(config, &mut locator, NoCache)?;
//!
//! let mut buf = [0u8; 64];
//! store.read(0, 0x100, &mut buf)?;
//! store.write(0, 0x100, b"BootOrder")?;
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod config;
pub mod device;
pub mod error;
pub mod fvb;
pub mod header;
pub mod lifecycle;
pub mod mirror;
pub mod trace;

pub use cache::{CacheMaintenance, NoCache};
pub use config::NvStorageConfig;
pub use device::{DeviceLocator, LbaRange, LocateError, LocatedDevice, Media};
pub use error::{ErrorClass, HeaderError, NvError, NvResult};
pub use fvb::{FirmwareVolumeBlock, FvbAttributes};
pub use header::{
    build_headers, checksum16, encode_headers, validate_headers, VariableStoreHeader,
    VolumeHeader, HEADERS_LEN,
};
pub use lifecycle::{BlockVariable, LifecycleState, Phase};
pub use trace::{TraceCategory, TraceEvent, TraceLevel, TraceLog};
