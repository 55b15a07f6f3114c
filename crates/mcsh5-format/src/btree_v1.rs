//! HDF5 B-tree version 1 (`TREE`): type 0 indexes group members, type 1
//! indexes the chunks of a chunked dataset.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bytes::{ensure_len, is_undefined, read_u16, read_u32, read_uint, to_index};
use crate::error::FormatError;

const MAX_DEPTH: usize = 32;

/// Node type of a group B-tree.
pub const GROUP_NODE: u8 = 0;
/// Node type of a chunk B-tree.
pub const CHUNK_NODE: u8 = 1;

/// One chunk located through a type 1 B-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Element offset of the chunk in each dataset dimension.
    pub offsets: Vec<u64>,
    /// Stored (possibly filtered) size in bytes.
    pub size: u32,
    /// Filters skipped for this chunk.
    pub filter_mask: u32,
    /// File address of the stored chunk.
    pub address: u64,
}

/// A parsed B-tree v1 node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeV1Node {
    /// [`GROUP_NODE`] or [`CHUNK_NODE`].
    pub node_type: u8,
    /// 0 for leaves.
    pub level: u8,
    /// Left sibling, `None` when undefined.
    pub left_sibling: Option<u64>,
    /// Right sibling, `None` when undefined.
    pub right_sibling: Option<u64>,
    /// Child addresses: sub-nodes, or `SNOD`s / chunks at the leaves.
    pub children: Vec<u64>,
    /// Left key of every child of a chunk node; empty for group nodes.
    pub chunk_keys: Vec<(u32, u32, Vec<u64>)>,
}

impl BTreeV1Node {
    /// Parse the node at `address`.
    ///
    /// `rank` is the dataset rank and only matters for chunk nodes, whose keys
    /// carry one offset per dimension plus one for the element byte offset.
    pub fn parse(
        data: &[u8],
        address: u64,
        offset_size: u8,
        length_size: u8,
        rank: usize,
    ) -> Result<BTreeV1Node, FormatError> {
        let start = to_index(address, data.len())?;
        let os = offset_size as usize;
        ensure_len(data, start, 8 + 2 * os)?;
        if &data[start..start + 4] != b"TREE" {
            return Err(FormatError::InvalidSignature {
                expected: "TREE",
                address,
            });
        }
        let node_type = data[start + 4];
        let level = data[start + 5];
        let entries = read_u16(data, start + 6)? as usize;
        let sibling = |pos: usize| -> Result<Option<u64>, FormatError> {
            let a = read_uint(data, pos, os)?;
            Ok((!is_undefined(a, offset_size)).then_some(a))
        };
        let left_sibling = sibling(start + 8)?;
        let right_sibling = sibling(start + 8 + os)?;

        let key_size = match node_type {
            GROUP_NODE => length_size as usize,
            CHUNK_NODE => 8 + 8 * (rank + 1),
            other => return Err(FormatError::InvalidBTreeNodeType(other)),
        };
        let mut pos = start + 8 + 2 * os;
        ensure_len(data, pos, entries * (key_size + os) + key_size)?;

        let mut children = Vec::with_capacity(entries);
        let mut chunk_keys = Vec::new();
        for _ in 0..entries {
            if node_type == CHUNK_NODE {
                let size = read_u32(data, pos)?;
                let mask = read_u32(data, pos + 4)?;
                let offsets = (0..rank)
                    .map(|d| read_uint(data, pos + 8 + 8 * d, 8))
                    .collect::<Result<Vec<_>, _>>()?;
                chunk_keys.push((size, mask, offsets));
            }
            pos += key_size;
            children.push(read_uint(data, pos, os)?);
            pos += os;
        }

        Ok(BTreeV1Node {
            node_type,
            level,
            left_sibling,
            right_sibling,
            children,
            chunk_keys,
        })
    }
}

/// Walk a group B-tree and return its symbol table node addresses in key order.
pub fn collect_group_nodes(
    data: &[u8],
    root: u64,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<u64>, FormatError> {
    let mut out = Vec::new();
    walk(data, root, offset_size, length_size, GROUP_NODE, 0, 0, &mut |node| {
        out.extend_from_slice(&node.children);
    })?;
    Ok(out)
}

/// Walk a chunk B-tree and return every chunk it indexes.
pub fn collect_chunks(
    data: &[u8],
    root: u64,
    offset_size: u8,
    length_size: u8,
    rank: usize,
) -> Result<Vec<ChunkRecord>, FormatError> {
    let mut out = Vec::new();
    walk(data, root, offset_size, length_size, CHUNK_NODE, rank, 0, &mut |node| {
        out.extend(
            node.children
                .iter()
                .zip(&node.chunk_keys)
                .map(|(&address, (size, filter_mask, offsets))| ChunkRecord {
                    offsets: offsets.clone(),
                    size: *size,
                    filter_mask: *filter_mask,
                    address,
                }),
        );
    })?;
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    data: &[u8],
    address: u64,
    offset_size: u8,
    length_size: u8,
    node_type: u8,
    rank: usize,
    depth: usize,
    leaf: &mut dyn FnMut(&BTreeV1Node),
) -> Result<(), FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::BTreeTooDeep);
    }
    let node = BTreeV1Node::parse(data, address, offset_size, length_size, rank)?;
    if node.node_type != node_type {
        return Err(FormatError::InvalidBTreeNodeType(node.node_type));
    }
    if node.level == 0 {
        leaf(&node);
        return Ok(());
    }
    for &child in &node.children {
        walk(data, child, offset_size, length_size, node_type, rank, depth + 1, leaf)?;
    }
    Ok(())
}
