//! Bounds-checked little-endian field access shared by the parsers.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Fail with `UnexpectedEof` unless `data[offset..offset + needed]` exists.
pub(crate) fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: offset.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// Read an unsigned integer of `size` bytes (LE) at `pos`.
///
/// Sizes 1, 2, 4 and 8 are direct; other widths up to 8 are assembled
/// byte by byte (v4 layouts encode chunk dimensions that way).
pub(crate) fn read_uint(data: &[u8], pos: usize, size: usize) -> Result<u64, FormatError> {
    ensure_len(data, pos, size)?;
    let slice = &data[pos..pos + size];
    Ok(match size {
        1 => slice[0] as u64,
        2 => LittleEndian::read_u16(slice) as u64,
        4 => LittleEndian::read_u32(slice) as u64,
        8 => LittleEndian::read_u64(slice),
        3 | 5 | 6 | 7 => slice
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        _ => return Err(FormatError::InvalidOffsetSize(size as u8)),
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, FormatError> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, FormatError> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// The "undefined address" of HDF5 is all bits set for the offset width.
pub fn is_undefined(address: u64, offset_size: u8) -> bool {
    match offset_size {
        8 => address == u64::MAX,
        n => address == (1u64 << (n as u32 * 8)) - 1,
    }
}

/// Convert a file address to a slice index.
pub(crate) fn to_index(address: u64, available: usize) -> Result<usize, FormatError> {
    usize::try_from(address).map_err(|_| FormatError::UnexpectedEof {
        expected: usize::MAX,
        available,
    })
}

/// Read a null-terminated string starting at `offset`.
/// Returns the string and the number of bytes consumed including the terminator.
pub(crate) fn read_cstr(data: &[u8], offset: usize) -> Result<(String, usize), FormatError> {
    ensure_len(data, offset, 1)?;
    let rest = &data[offset..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(FormatError::UnexpectedEof {
            expected: data.len() + 1,
            available: data.len(),
        })?;
    Ok((String::from_utf8_lossy(&rest[..nul]).into_owned(), nul + 1))
}

/// Round `n` up to the next multiple of eight.
pub(crate) fn pad8(n: usize) -> usize {
    (n + 7) & !7
}
