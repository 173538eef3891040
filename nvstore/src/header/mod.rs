//! Volume header codec
//!
//! Builds, serializes and validates the two headers at the start of the
//! reserved region:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────┬──────────────
//! │ firmware volume header       │ variable store header│ variables ...
//! │ 64 + 8 (terminator) bytes    │ 28 bytes             │
//! └──────────────────────────────┴──────────────────────┴──────────────
//! ```
//!
//! Validation is read-only: the stored checksum is never touched.

mod checksum;
mod store;
mod volume;

pub use checksum::{checksum16, sum16};
pub use store::{
    VariableStoreHeader, STORE_HEADER_LEN, VARIABLE_STORE_FORMATTED, VARIABLE_STORE_GUID,
    VARIABLE_STORE_HEALTHY,
};
pub use volume::{
    BlockMapEntry, VolumeHeader, BLOCK_MAP_ENTRY_LEN, FVH_REVISION, FVH_SIGNATURE,
    SYSTEM_NV_DATA_FV_GUID, VOLUME_HEADER_BASE_LEN, VOLUME_HEADER_LEN,
};

use crate::config::NvStorageConfig;
use crate::error::HeaderError;
use crate::fvb::FvbAttributes;

/// Bytes written when formatting: both headers back to back.
pub const HEADERS_LEN: usize = VOLUME_HEADER_LEN + STORE_HEADER_LEN;

/// Build fresh headers for `config`, checksum included.
pub fn build_headers(config: &NvStorageConfig) -> (VolumeHeader, VariableStoreHeader) {
    let mut volume = VolumeHeader {
        zero_vector: [0; 16],
        file_system_guid: SYSTEM_NV_DATA_FV_GUID,
        fv_length: config.fv_length(),
        signature: FVH_SIGNATURE,
        attributes: FvbAttributes::FIXED.bits(),
        header_length: VOLUME_HEADER_LEN as u16,
        checksum: 0,
        ext_header_offset: 0,
        reserved: 0,
        revision: FVH_REVISION,
        block_map: [
            BlockMapEntry {
                num_blocks: config.block_count,
                length: config.block_size,
            },
            BlockMapEntry::TERMINATOR,
        ],
    };
    volume.checksum = checksum16(&volume.to_bytes());

    let store = VariableStoreHeader {
        signature: VARIABLE_STORE_GUID,
        size: config.variable_size.wrapping_sub(volume.header_length as u32),
        format: VARIABLE_STORE_FORMATTED,
        state: VARIABLE_STORE_HEALTHY,
        reserved: [0; 6],
    };

    (volume, store)
}

/// Build headers into `buf`, returning the number of bytes written.
pub fn encode_headers(config: &NvStorageConfig, buf: &mut [u8]) -> Result<usize, HeaderError> {
    if buf.len() < HEADERS_LEN {
        return Err(HeaderError::Truncated);
    }

    let (volume, store) = build_headers(config);
    buf[..VOLUME_HEADER_LEN].copy_from_slice(&volume.to_bytes());
    buf[VOLUME_HEADER_LEN..HEADERS_LEN].copy_from_slice(&store.to_bytes());
    Ok(HEADERS_LEN)
}

/// Check that `buf` starts with headers matching `config`.
pub fn validate_headers(buf: &[u8], config: &NvStorageConfig) -> Result<(), HeaderError> {
    let volume = VolumeHeader::parse(buf)?;

    if volume.revision != FVH_REVISION {
        return Err(HeaderError::Revision);
    }
    if volume.signature != FVH_SIGNATURE {
        return Err(HeaderError::Signature);
    }
    if volume.fv_length != config.fv_length() {
        return Err(HeaderError::Length);
    }
    if volume.file_system_guid != SYSTEM_NV_DATA_FV_GUID {
        return Err(HeaderError::FileSystemGuid);
    }

    let header_len = volume.header_length as usize;
    if header_len != VOLUME_HEADER_LEN {
        return Err(HeaderError::HeaderLength);
    }

    // Recompute over a copy with the checksum field cleared
    let mut scratch = [0u8; VOLUME_HEADER_LEN];
    scratch.copy_from_slice(&buf[..VOLUME_HEADER_LEN]);
    scratch[volume::OFF_CHECKSUM..volume::OFF_CHECKSUM + 2].fill(0);
    if checksum16(&scratch) != volume.checksum {
        return Err(HeaderError::Checksum);
    }

    let store = VariableStoreHeader::parse(&buf[header_len..])?;
    if store.signature != VARIABLE_STORE_GUID {
        return Err(HeaderError::StoreSignature);
    }
    if store.size != config.variable_size.wrapping_sub(header_len as u32) {
        return Err(HeaderError::StoreSize);
    }
    if !store.is_formatted() {
        return Err(HeaderError::StoreFormat);
    }
    if !store.is_healthy() {
        return Err(HeaderError::StoreState);
    }
    if store.reserved != [0; 6] {
        return Err(HeaderError::StoreReserved);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> NvStorageConfig {
        NvStorageConfig::default()
            .device("MemDisk(0)")
            .region(0, 64, 512)
            .sizes(0x8000, 0x800, 0x800)
    }

    fn encoded(config: &NvStorageConfig) -> [u8; HEADERS_LEN] {
        let mut buf = [0u8; HEADERS_LEN];
        assert_eq!(encode_headers(config, &mut buf), Ok(HEADERS_LEN));
        buf
    }

    #[test]
    fn test_scenario_lengths() {
        let config = scenario();
        let (volume, store) = build_headers(&config);

        assert_eq!(volume.fv_length, 0x9000);
        assert_eq!(
            volume.header_length as usize,
            VOLUME_HEADER_BASE_LEN + BLOCK_MAP_ENTRY_LEN
        );
        assert_eq!(store.size, 0x8000 - volume.header_length as u32);
        assert_eq!(volume.block_map[0], BlockMapEntry { num_blocks: 64, length: 512 });
        assert!(volume.block_map[1].is_terminator());
    }

    #[test]
    fn test_checksum_invariant() {
        let buf = encoded(&scenario());
        assert_eq!(sum16(&buf[..VOLUME_HEADER_LEN]), 0);
    }

    #[test]
    fn test_built_headers_validate() {
        for (count, size) in [(64u32, 512u32), (16, 4096), (8, 0x10000)] {
            let config = scenario()
                .region(0, count, size)
                .sizes(count * size / 2, size, size);
            let buf = encoded(&config);
            assert_eq!(validate_headers(&buf, &config), Ok(()));
        }
    }

    #[test]
    fn test_validation_does_not_modify_buffer() {
        let config = scenario();
        let buf = encoded(&config);
        let before = buf;
        validate_headers(&buf, &config).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn test_single_byte_mutation_detected() {
        let config = scenario();
        let pristine = encoded(&config);

        for at in 0..HEADERS_LEN {
            for flip in [0x01u8, 0x80, 0xFF] {
                let mut buf = pristine;
                buf[at] ^= flip;
                assert!(
                    validate_headers(&buf, &config).is_err(),
                    "mutation at byte {} (^{:#x}) went undetected",
                    at,
                    flip
                );
            }
        }
    }

    #[test]
    fn test_blank_media_rejected() {
        let config = scenario();
        assert_eq!(
            validate_headers(&[0u8; HEADERS_LEN], &config),
            Err(HeaderError::Revision)
        );
        assert_eq!(
            validate_headers(&[0xFFu8; HEADERS_LEN], &config),
            Err(HeaderError::Revision)
        );
    }

    #[test]
    fn test_config_mismatch_rejected() {
        let buf = encoded(&scenario());
        let other = scenario().sizes(0x8000, 0x1000, 0x800);
        assert_eq!(validate_headers(&buf, &other), Err(HeaderError::Length));

        // Same total, different split: only the store size catches it
        let shifted = scenario().sizes(0x7800, 0x1000, 0x800);
        assert_eq!(validate_headers(&buf, &shifted), Err(HeaderError::StoreSize));
    }

    #[test]
    fn test_nonzero_store_reserved_rejected() {
        let config = scenario();
        let mut buf = encoded(&config);
        buf[HEADERS_LEN - 5] = 0xFF;
        assert_eq!(validate_headers(&buf, &config), Err(HeaderError::StoreReserved));
    }

    #[test]
    fn test_corrupt_checksum_rejected() {
        let config = scenario();
        let mut buf = encoded(&config);
        buf[volume::OFF_CHECKSUM] ^= 0x10;
        assert_eq!(validate_headers(&buf, &config), Err(HeaderError::Checksum));
    }

    #[test]
    fn test_encode_into_short_buffer() {
        let mut buf = [0u8; HEADERS_LEN - 1];
        assert_eq!(
            encode_headers(&scenario(), &mut buf),
            Err(HeaderError::Truncated)
        );
    }

    #[test]
    fn test_reencode_is_stable() {
        let config = scenario();
        assert_eq!(encoded(&config), encoded(&config));
    }
}
