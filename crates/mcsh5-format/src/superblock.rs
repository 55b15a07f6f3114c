//! HDF5 superblock parsing for versions 0, 1, 2 and 3.

use crate::bytes::{ensure_len, is_undefined, read_u16, read_u32, read_uint};
use crate::checksum::verify_trailing;
use crate::error::FormatError;
use crate::signature::HDF5_SIGNATURE;

/// Parsed HDF5 superblock (all versions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (0–3).
    pub version: u8,
    /// Size of file addresses in bytes (2, 4, or 8).
    pub offset_size: u8,
    /// Size of lengths in bytes (2, 4, or 8).
    pub length_size: u8,
    /// Absolute position that all other addresses are relative to.
    pub base_address: u64,
    /// End-of-file address.
    pub eof_address: u64,
    /// Object header address of the root group.
    pub root_group_address: u64,
    /// Group leaf node K (v0/v1 only).
    pub group_leaf_node_k: Option<u16>,
    /// Group internal node K (v0/v1 only).
    pub group_internal_node_k: Option<u16>,
    /// Superblock extension address (v2/v3 only, `None` when undefined).
    pub extension_address: Option<u64>,
    /// File consistency flags.
    pub consistency_flags: u32,
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidOffsetSize(offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidLengthSize(length_size));
    }
    Ok(())
}

impl Superblock {
    /// Parse a superblock from `data` starting at `signature_offset`.
    ///
    /// With `verify_checksum` set, the lookup3 checksum of version 2 and 3
    /// superblocks is checked (only when the `checksum` feature is enabled).
    pub fn parse(
        data: &[u8],
        signature_offset: usize,
        verify_checksum: bool,
    ) -> Result<Superblock, FormatError> {
        ensure_len(data, signature_offset, 9)?;
        let d = &data[signature_offset..];
        if d[..8] != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }

        match d[8] {
            // v1 inserts the indexed storage K and two reserved bytes.
            0 => Self::parse_v0v1(d, 0, 24),
            1 => Self::parse_v0v1(d, 1, 28),
            v @ (2 | 3) => Self::parse_v2v3(d, v, verify_checksum),
            v => Err(FormatError::UnsupportedSuperblockVersion(v)),
        }
    }

    /// Total encoded size of this superblock.
    pub fn encoded_size(&self) -> usize {
        let os = self.offset_size as usize;
        match self.version {
            0 => 24 + 4 * os + (2 * os + 24),
            1 => 28 + 4 * os + (2 * os + 24),
            _ => 12 + 4 * os + 4,
        }
    }

    fn parse_v0v1(d: &[u8], version: u8, fixed_len: usize) -> Result<Superblock, FormatError> {
        ensure_len(d, 0, fixed_len)?;
        let offset_size = d[13];
        let length_size = d[14];
        validate_sizes(offset_size, length_size)?;

        let group_leaf_node_k = read_u16(d, 16)?;
        let group_internal_node_k = read_u16(d, 18)?;
        let consistency_flags = read_u32(d, fixed_len - 4)?;

        let os = offset_size as usize;
        // base, free-space, eof, driver-info, then the root symbol table
        // entry (link name offset, object header address, cache type,
        // reserved, 16-byte scratch pad).
        ensure_len(d, fixed_len, 4 * os + 2 * os + 24)?;
        let base_address = read_uint(d, fixed_len, os)?;
        let eof_address = read_uint(d, fixed_len + 2 * os, os)?;
        let root_group_address = read_uint(d, fixed_len + 5 * os, os)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: Some(group_leaf_node_k),
            group_internal_node_k: Some(group_internal_node_k),
            extension_address: None,
            consistency_flags,
        })
    }

    fn parse_v2v3(d: &[u8], version: u8, verify_checksum: bool) -> Result<Superblock, FormatError> {
        ensure_len(d, 0, 12)?;
        let offset_size = d[9];
        let length_size = d[10];
        validate_sizes(offset_size, length_size)?;
        let consistency_flags = d[11] as u32;

        let os = offset_size as usize;
        let checksum_pos = 12 + 4 * os;
        ensure_len(d, checksum_pos, 4)?;

        let base_address = read_uint(d, 12, os)?;
        let extension = read_uint(d, 12 + os, os)?;
        let eof_address = read_uint(d, 12 + 2 * os, os)?;
        let root_group_address = read_uint(d, 12 + 3 * os, os)?;

        if verify_checksum && cfg!(feature = "checksum") {
            verify_trailing(&d[..checksum_pos], read_u32(d, checksum_pos)?)?;
        }

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: None,
            group_internal_node_k: None,
            extension_address: (!is_undefined(extension, offset_size)).then_some(extension),
            consistency_flags,
        })
    }
}
