//! Variable store header
//!
//! Sits right after the firmware volume header and tells the variable
//! services that the payload area is formatted.

use uguid::{guid, Guid};

use crate::error::HeaderError;

/// Signature of a (non-authenticated) variable store.
pub const VARIABLE_STORE_GUID: Guid = guid!("ddcf3616-3275-4164-98b6-fe85707ffe7d");

/// `Format` value of a formatted store.
pub const VARIABLE_STORE_FORMATTED: u8 = 0x5A;

/// `State` value of a healthy store.
pub const VARIABLE_STORE_HEALTHY: u8 = 0xFE;

/// Encoded size of the variable store header.
pub const STORE_HEADER_LEN: usize = 28;

/// Variable store header (decoded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableStoreHeader {
    pub signature: Guid,
    /// Store size, excluding the firmware volume header.
    pub size: u32,
    pub format: u8,
    pub state: u8,
    /// Must be zero.
    pub reserved: [u8; 6],
}

impl VariableStoreHeader {
    pub fn is_formatted(&self) -> bool {
        self.format == VARIABLE_STORE_FORMATTED
    }

    pub fn is_healthy(&self) -> bool {
        self.state == VARIABLE_STORE_HEALTHY
    }

    /// Serialize to the on-device layout.
    pub fn to_bytes(&self) -> [u8; STORE_HEADER_LEN] {
        let mut out = [0u8; STORE_HEADER_LEN];
        out[..16].copy_from_slice(&self.signature.to_bytes());
        out[16..20].copy_from_slice(&self.size.to_le_bytes());
        out[20] = self.format;
        out[21] = self.state;
        out[22..].copy_from_slice(&self.reserved);
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < STORE_HEADER_LEN {
            return Err(HeaderError::Truncated);
        }

        let mut signature = [0u8; 16];
        signature.copy_from_slice(&data[..16]);
        let mut reserved = [0u8; 6];
        reserved.copy_from_slice(&data[22..STORE_HEADER_LEN]);

        Ok(Self {
            signature: Guid::from_bytes(signature),
            size: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            format: data[20],
            state: data[21],
            reserved,
        })
    }
}
