//! Global heap collections (`GCOL`) and the variable-length references that
//! point into them.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::bytes::{ensure_len, pad8, read_u16, read_u32, read_uint, to_index};
use crate::error::FormatError;

/// The in-record form of a variable-length value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlenReference {
    /// Number of base-type elements (bytes for strings).
    pub length: u32,
    /// Address of the collection holding the value.
    pub collection: u64,
    /// Object index within the collection.
    pub index: u32,
}

impl VlenReference {
    /// Encoded size for the given offset width.
    pub fn encoded_size(offset_size: u8) -> usize {
        8 + offset_size as usize
    }

    /// Decode a reference from the start of `data`.
    pub fn parse(data: &[u8], offset_size: u8) -> Result<VlenReference, FormatError> {
        let os = offset_size as usize;
        Ok(VlenReference {
            length: read_u32(data, 0)?,
            collection: read_uint(data, 4, os)?,
            index: read_u32(data, 4 + os)?,
        })
    }

    /// Whether the reference stands for an empty value (zero length or null collection).
    pub fn is_null(&self) -> bool {
        self.length == 0 || self.collection == 0
    }
}

/// One object stored in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapObject {
    /// Object index, starting at 1.
    pub index: u16,
    /// Object payload without padding.
    pub data: Vec<u8>,
}

/// A parsed global heap collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapCollection {
    /// Address the collection was read from.
    pub address: u64,
    /// Objects in storage order.
    pub objects: Vec<GlobalHeapObject>,
}

impl GlobalHeapCollection {
    /// Parse the collection at `address`.
    pub fn parse(
        data: &[u8],
        address: u64,
        length_size: u8,
    ) -> Result<GlobalHeapCollection, FormatError> {
        let start = to_index(address, data.len())?;
        let ls = length_size as usize;
        ensure_len(data, start, 8 + ls)?;
        if &data[start..start + 4] != b"GCOL" {
            return Err(FormatError::InvalidSignature {
                expected: "GCOL",
                address,
            });
        }
        let size = to_index(read_uint(data, start + 8, ls)?, data.len())?;
        ensure_len(data, start, size)?;
        let end = start + size;

        let mut objects = Vec::new();
        let mut pos = start + 8 + ls;
        // index(2) refcount(2) reserved(4) size(L)
        while pos + 8 + ls <= end {
            let index = read_u16(data, pos)?;
            if index == 0 {
                // free space runs to the end of the collection
                break;
            }
            let len = to_index(read_uint(data, pos + 8, ls)?, data.len())?;
            pos += 8 + ls;
            ensure_len(data, pos, len)?;
            objects.push(GlobalHeapObject {
                index,
                data: data[pos..pos + len].to_vec(),
            });
            pos += pad8(len);
        }
        Ok(GlobalHeapCollection { address, objects })
    }

    /// Payload of the object with the given index.
    pub fn object(&self, index: u32) -> Result<&[u8], FormatError> {
        self.objects
            .iter()
            .find(|o| u32::from(o.index) == index)
            .map(|o| o.data.as_slice())
            .ok_or(FormatError::GlobalHeapObjectNotFound {
                collection: self.address,
                index,
            })
    }
}

/// Resolve a reference to its bytes. Null references yield an empty vector.
pub fn read_vlen_bytes(
    data: &[u8],
    reference: &VlenReference,
    length_size: u8,
) -> Result<Vec<u8>, FormatError> {
    if reference.is_null() {
        return Ok(Vec::new());
    }
    let collection = GlobalHeapCollection::parse(data, reference.collection, length_size)?;
    collection.object(reference.index).map(<[u8]>::to_vec)
}

/// Resolve a variable-length string, dropping trailing padding.
pub fn read_vlen_string(
    data: &[u8],
    reference: &VlenReference,
    length_size: u8,
) -> Result<String, FormatError> {
    let bytes = read_vlen_bytes(data, reference, length_size)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
