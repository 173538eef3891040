//! Error types for the variable store
//!
//! Device failures are carried through untouched so the variable services
//! can decide what a failed read means for them.

use core::fmt;

/// Result type for variable store operations
pub type NvResult<T, E> = core::result::Result<T, NvError<E>>;

/// Reasons a firmware volume / variable store header is rejected
///
/// Any of these means "not formatted or corrupt"; initialization reformats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// Buffer shorter than the headers
    Truncated,
    /// Volume header revision mismatch
    Revision,
    /// Volume header signature is not `_FVH`
    Signature,
    /// FvLength differs from the configured region sizes
    Length,
    /// HeaderLength is not the single-entry block map length
    HeaderLength,
    /// File system GUID is not the NV data GUID
    FileSystemGuid,
    /// Header checksum does not match
    Checksum,
    /// Variable store signature GUID mismatch
    StoreSignature,
    /// Variable store size does not match the variable region
    StoreSize,
    /// Variable store is not marked formatted
    StoreFormat,
    /// Variable store is not marked healthy
    StoreState,
    /// Variable store reserved bytes are not zero
    StoreReserved,
}

impl HeaderError {
    /// Get a human-readable description of the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Truncated => "Header buffer too small",
            Self::Revision => "Firmware volume revision mismatch",
            Self::Signature => "No firmware volume header present",
            Self::Length => "Firmware volume length mismatch",
            Self::HeaderLength => "Firmware volume header length invalid",
            Self::FileSystemGuid => "Firmware volume GUID non-compatible",
            Self::Checksum => "Firmware volume checksum invalid",
            Self::StoreSignature => "Variable store GUID non-compatible",
            Self::StoreSize => "Variable store length does not match",
            Self::StoreFormat => "Variable store not formatted",
            Self::StoreState => "Variable store not healthy",
            Self::StoreReserved => "Variable store reserved bytes set",
        }
    }
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Block device I/O failure, surfaced verbatim
    Device,
    /// On-device format problem, recoverable by reformatting
    Format,
    /// Allocation, configuration or device location failure at init
    Resource,
    /// Operation rejected without side effects
    Unsupported,
}

/// Errors that can occur in the variable store
///
/// `E` is the error type of the backing `BlockIo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvError<E> {
    /// Block device read or write failed
    Device(E),
    /// Header validation failed
    InvalidHeader(HeaderError),
    /// Could not allocate the mirrored buffer
    OutOfResources,
    /// Reserved region cannot even hold the headers
    BadBufferSize,
    /// Configuration rejected
    InvalidConfig(&'static str),
    /// No block device at the configured path
    DeviceNotFound,
    /// Block device found but could not be opened
    DeviceOpenFailed,
    /// Another live store already owns this device
    DeviceBusy,
    /// Device geometry does not match the configuration
    GeometryMismatch,
    /// Operation not supported
    Unsupported,
    /// Request falls outside the reserved region
    InvalidRange,
    /// Virtual address change already handled
    AlreadyAtRuntime,
    /// Data read back after a write differs from what was written
    VerifyFailed,
}

impl<E> NvError<E> {
    /// Map to the coarse taxonomy
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Device(_) | Self::VerifyFailed => ErrorClass::Device,
            Self::InvalidHeader(_) => ErrorClass::Format,
            Self::OutOfResources
            | Self::BadBufferSize
            | Self::InvalidConfig(_)
            | Self::DeviceNotFound
            | Self::DeviceOpenFailed
            | Self::DeviceBusy
            | Self::GeometryMismatch => ErrorClass::Resource,
            Self::Unsupported | Self::InvalidRange | Self::AlreadyAtRuntime => {
                ErrorClass::Unsupported
            }
        }
    }

    /// Whether this error came from the block device
    pub const fn is_device_error(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

impl<E> From<HeaderError> for NvError<E> {
    fn from(err: HeaderError) -> Self {
        Self::InvalidHeader(err)
    }
}

impl<E: fmt::Display> fmt::Display for NvError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => write!(f, "Block device error: {}", err),
            Self::InvalidHeader(err) => write!(f, "Invalid header: {}", err),
            Self::OutOfResources => write!(f, "Failed to allocate mirrored buffer"),
            Self::BadBufferSize => write!(f, "Reserved region smaller than headers"),
            Self::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
            Self::DeviceNotFound => write!(f, "Couldn't locate NV storage device"),
            Self::DeviceOpenFailed => write!(f, "Couldn't open NV storage device"),
            Self::DeviceBusy => write!(f, "NV storage device already in use"),
            Self::GeometryMismatch => write!(f, "Device geometry does not match configuration"),
            Self::Unsupported => write!(f, "Operation not supported"),
            Self::InvalidRange => write!(f, "Request outside reserved region"),
            Self::AlreadyAtRuntime => write!(f, "Virtual address change already applied"),
            Self::VerifyFailed => write!(f, "Write verification failed"),
        }
    }
}
