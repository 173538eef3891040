//! Firmware volume header
//!
//! PI firmware volume header with a single-entry block map, as laid out at
//! the start of the reserved region.

use uguid::{guid, Guid};

use crate::error::HeaderError;

/// `_FVH`
pub const FVH_SIGNATURE: u32 = u32::from_le_bytes(*b"_FVH");

/// Firmware volume header revision.
pub const FVH_REVISION: u8 = 0x02;

/// File system GUID of the system NV data firmware volume.
pub const SYSTEM_NV_DATA_FV_GUID: Guid = guid!("fff12b8d-7696-4c8b-a985-2747075b4f50");

/// Size of one block map entry.
pub const BLOCK_MAP_ENTRY_LEN: usize = 8;

/// Fixed header size, including the first block map entry.
pub const VOLUME_HEADER_BASE_LEN: usize = 56 + BLOCK_MAP_ENTRY_LEN;

/// HeaderLength: base header plus the block map terminator.
pub const VOLUME_HEADER_LEN: usize = VOLUME_HEADER_BASE_LEN + BLOCK_MAP_ENTRY_LEN;

// Field offsets
const OFF_GUID: usize = 16;
const OFF_FV_LENGTH: usize = 32;
const OFF_SIGNATURE: usize = 40;
const OFF_ATTRIBUTES: usize = 44;
const OFF_HEADER_LENGTH: usize = 48;
pub(crate) const OFF_CHECKSUM: usize = 50;
const OFF_EXT_HEADER: usize = 52;
const OFF_RESERVED: usize = 54;
const OFF_REVISION: usize = 55;
const OFF_BLOCK_MAP: usize = 56;

/// One `{NumBlocks, Length}` block map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockMapEntry {
    pub num_blocks: u32,
    pub length: u32,
}

impl BlockMapEntry {
    /// The `{0, 0}` terminator.
    pub const TERMINATOR: Self = Self { num_blocks: 0, length: 0 };

    pub fn is_terminator(&self) -> bool {
        *self == Self::TERMINATOR
    }
}

/// Firmware volume header (decoded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    pub zero_vector: [u8; 16],
    pub file_system_guid: Guid,
    pub fv_length: u64,
    pub signature: u32,
    pub attributes: u32,
    pub header_length: u16,
    pub checksum: u16,
    pub ext_header_offset: u16,
    pub reserved: u8,
    pub revision: u8,
    /// Entry 0 describes the region, entry 1 is the terminator.
    pub block_map: [BlockMapEntry; 2],
}

impl VolumeHeader {
    /// Serialize to the on-device layout.
    pub fn to_bytes(&self) -> [u8; VOLUME_HEADER_LEN] {
        let mut out = [0u8; VOLUME_HEADER_LEN];
        out[..OFF_GUID].copy_from_slice(&self.zero_vector);
        out[OFF_GUID..OFF_FV_LENGTH].copy_from_slice(&self.file_system_guid.to_bytes());
        out[OFF_FV_LENGTH..OFF_SIGNATURE].copy_from_slice(&self.fv_length.to_le_bytes());
        out[OFF_SIGNATURE..OFF_ATTRIBUTES].copy_from_slice(&self.signature.to_le_bytes());
        out[OFF_ATTRIBUTES..OFF_HEADER_LENGTH].copy_from_slice(&self.attributes.to_le_bytes());
        out[OFF_HEADER_LENGTH..OFF_CHECKSUM].copy_from_slice(&self.header_length.to_le_bytes());
        out[OFF_CHECKSUM..OFF_EXT_HEADER].copy_from_slice(&self.checksum.to_le_bytes());
        out[OFF_EXT_HEADER..OFF_RESERVED].copy_from_slice(&self.ext_header_offset.to_le_bytes());
        out[OFF_RESERVED] = self.reserved;
        out[OFF_REVISION] = self.revision;

        for (i, entry) in self.block_map.iter().enumerate() {
            let at = OFF_BLOCK_MAP + i * BLOCK_MAP_ENTRY_LEN;
            out[at..at + 4].copy_from_slice(&entry.num_blocks.to_le_bytes());
            out[at + 4..at + 8].copy_from_slice(&entry.length.to_le_bytes());
        }
        out
    }

    /// Decode from raw bytes. Only checks that enough bytes are present.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < VOLUME_HEADER_LEN {
            return Err(HeaderError::Truncated);
        }

        let mut zero_vector = [0u8; 16];
        zero_vector.copy_from_slice(&data[..OFF_GUID]);
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&data[OFF_GUID..OFF_FV_LENGTH]);

        let mut block_map = [BlockMapEntry::TERMINATOR; 2];
        for (i, entry) in block_map.iter_mut().enumerate() {
            let at = OFF_BLOCK_MAP + i * BLOCK_MAP_ENTRY_LEN;
            entry.num_blocks = read_u32(data, at);
            entry.length = read_u32(data, at + 4);
        }

        Ok(Self {
            zero_vector,
            file_system_guid: Guid::from_bytes(guid),
            fv_length: u64::from_le_bytes([
                data[32], data[33], data[34], data[35], data[36], data[37], data[38], data[39],
            ]),
            signature: read_u32(data, OFF_SIGNATURE),
            attributes: read_u32(data, OFF_ATTRIBUTES),
            header_length: read_u16(data, OFF_HEADER_LENGTH),
            checksum: read_u16(data, OFF_CHECKSUM),
            ext_header_offset: read_u16(data, OFF_EXT_HEADER),
            reserved: data[OFF_RESERVED],
            revision: data[OFF_REVISION],
            block_map,
        })
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
