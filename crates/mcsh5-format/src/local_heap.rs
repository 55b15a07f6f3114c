//! HDF5 local heap (`HEAP`): the name store of a v1 group.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::bytes::{ensure_len, read_cstr, read_uint, to_index};
use crate::error::FormatError;

/// Parsed local heap header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeap {
    /// Size of the data segment in bytes.
    pub data_segment_size: u64,
    /// File address of the data segment.
    pub data_segment_address: u64,
}

impl LocalHeap {
    /// Parse the heap header at `address`.
    pub fn parse(
        data: &[u8],
        address: u64,
        offset_size: u8,
        length_size: u8,
    ) -> Result<LocalHeap, FormatError> {
        let start = to_index(address, data.len())?;
        let ls = length_size as usize;
        // signature(4) version(1) reserved(3) segment size, free list head, segment address
        ensure_len(data, start, 8 + 2 * ls + offset_size as usize)?;
        if &data[start..start + 4] != b"HEAP" {
            return Err(FormatError::InvalidSignature {
                expected: "HEAP",
                address,
            });
        }
        Ok(LocalHeap {
            data_segment_size: read_uint(data, start + 8, ls)?,
            data_segment_address: read_uint(data, start + 8 + 2 * ls, offset_size as usize)?,
        })
    }

    /// Read the null-terminated string at `offset` within the data segment.
    pub fn read_string(&self, data: &[u8], offset: u64) -> Result<String, FormatError> {
        if offset >= self.data_segment_size {
            return Err(FormatError::UnexpectedEof {
                expected: offset as usize + 1,
                available: self.data_segment_size as usize,
            });
        }
        let pos = to_index(self.data_segment_address + offset, data.len())?;
        read_cstr(data, pos).map(|(s, _)| s)
    }
}
