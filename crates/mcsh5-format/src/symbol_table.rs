//! Symbol table message (0x0011) and symbol table nodes (`SNOD`) of v1 groups.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bytes::{ensure_len, read_u16, read_u32, read_uint, to_index};
use crate::error::FormatError;

/// Where a v1 group keeps its B-tree and name heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableMessage {
    /// Address of the v1 B-tree (type 0).
    pub btree_address: u64,
    /// Address of the local heap holding link names.
    pub local_heap_address: u64,
}

impl SymbolTableMessage {
    /// Parse a symbol table message.
    pub fn parse(data: &[u8], offset_size: u8) -> Result<SymbolTableMessage, FormatError> {
        let os = offset_size as usize;
        Ok(SymbolTableMessage {
            btree_address: read_uint(data, 0, os)?,
            local_heap_address: read_uint(data, os, os)?,
        })
    }
}

/// One entry of a symbol table node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableEntry {
    /// Offset of the link name in the group's local heap.
    pub link_name_offset: u64,
    /// Object header address of the child.
    pub object_header_address: u64,
    /// Scratch-pad cache type (0 none, 1 group, 2 soft link).
    pub cache_type: u32,
}

/// A leaf of a v1 group B-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableNode {
    /// Entries in name order.
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    /// Parse the `SNOD` at `address`.
    pub fn parse(data: &[u8], address: u64, offset_size: u8) -> Result<SymbolTableNode, FormatError> {
        let start = to_index(address, data.len())?;
        ensure_len(data, start, 8)?;
        if &data[start..start + 4] != b"SNOD" {
            return Err(FormatError::InvalidSignature {
                expected: "SNOD",
                address,
            });
        }
        let count = read_u16(data, start + 6)? as usize;
        let os = offset_size as usize;
        // name offset, header address, cache type(4), reserved(4), scratch(16)
        let entry_size = 2 * os + 24;
        ensure_len(data, start + 8, count * entry_size)?;

        let entries = (0..count)
            .map(|i| {
                let pos = start + 8 + i * entry_size;
                Ok(SymbolTableEntry {
                    link_name_offset: read_uint(data, pos, os)?,
                    object_header_address: read_uint(data, pos + os, os)?,
                    cache_type: read_u32(data, pos + 2 * os)?,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;
        Ok(SymbolTableNode { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_addresses() {
        let mut buf = 136u64.to_le_bytes().to_vec();
        buf.extend_from_slice(&680u64.to_le_bytes());
        let msg = SymbolTableMessage::parse(&buf, 8).unwrap();
        assert_eq!(msg.btree_address, 136);
        assert_eq!(msg.local_heap_address, 680);
    }

    #[test]
    fn node_entries() {
        let mut buf = b"SNOD".to_vec();
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&2u16.to_le_bytes());
        for (name, addr, cache) in [(8u32, 800u32, 1u32), (16, 960, 0)] {
            buf.extend_from_slice(&name.to_le_bytes());
            buf.extend_from_slice(&addr.to_le_bytes());
            buf.extend_from_slice(&cache.to_le_bytes());
            buf.extend_from_slice(&[0; 20]);
        }
        let node = SymbolTableNode::parse(&buf, 0, 4).unwrap();
        assert_eq!(node.entries.len(), 2);
        assert_eq!(node.entries[0].link_name_offset, 8);
        assert_eq!(node.entries[0].cache_type, 1);
        assert_eq!(node.entries[1].object_header_address, 960);
    }

    #[test]
    fn node_signature() {
        let buf = b"TREE\x01\x00\x00\x00".to_vec();
        assert!(matches!(
            SymbolTableNode::parse(&buf, 0, 8),
            Err(FormatError::InvalidSignature { expected: "SNOD", .. })
        ));
    }
}
