//! Group membership for both storage styles: v1 symbol tables and compact
//! link messages. Dense (fractal heap) storage is reported as unsupported.

#[cfg(not(feature = "std"))]
use alloc::{string::String, string::ToString, vec::Vec};

use crate::btree_v1::collect_group_nodes;
use crate::bytes::{ensure_len, is_undefined, read_uint};
use crate::error::FormatError;
use crate::link_message::LinkMessage;
use crate::local_heap::LocalHeap;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;
use crate::symbol_table::{SymbolTableMessage, SymbolTableNode};

/// A hard-linked member of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Link name.
    pub name: String,
    /// Object header address of the member.
    pub address: u64,
}

/// Layout parameters shared by every structure of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLayout {
    /// Width of file addresses.
    pub offset_size: u8,
    /// Width of file lengths.
    pub length_size: u8,
    /// Verify lookup3 checksums of v2 object headers.
    pub verify_checksums: bool,
}

impl FileLayout {
    /// Parse the object header at `address` with this file's parameters.
    pub fn object_header(&self, data: &[u8], address: u64) -> Result<ObjectHeader, FormatError> {
        ObjectHeader::parse(
            data,
            address,
            self.offset_size,
            self.length_size,
            self.verify_checksums,
        )
    }
}

/// List the hard links of the group whose header is `header`, in name order.
///
/// Soft, external and user-defined links are not members for this purpose.
pub fn group_entries(
    data: &[u8],
    header: &ObjectHeader,
    layout: &FileLayout,
) -> Result<Vec<GroupEntry>, FormatError> {
    if let Some(msg) = header.find(MessageType::SymbolTable) {
        if msg.is_shared() {
            return Err(FormatError::SharedMessage(MessageType::SymbolTable.to_u16()));
        }
        let table = SymbolTableMessage::parse(&msg.data, layout.offset_size)?;
        return symbol_table_entries(data, &table, layout);
    }

    if let Some(msg) = header.find(MessageType::LinkInfo) {
        if dense_storage(&msg.data, layout.offset_size)? {
            return Err(FormatError::UnsupportedGroupStorage);
        }
    } else if header.find(MessageType::Link).is_none() {
        return Err(FormatError::MissingMessage("symbol table or link"));
    }

    let mut entries = header
        .find_all(MessageType::Link)
        .map(|msg| LinkMessage::parse(&msg.data, layout.offset_size))
        .filter_map(|link| match link {
            Ok(link) => link.hard_address().map(|address| {
                Ok(GroupEntry {
                    name: link.name,
                    address,
                })
            }),
            Err(e) => Some(Err(e)),
        })
        .collect::<Result<Vec<_>, FormatError>>()?;
    // Link messages sit in creation order; the library reports name order.
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(entries)
}

fn symbol_table_entries(
    data: &[u8],
    table: &SymbolTableMessage,
    layout: &FileLayout,
) -> Result<Vec<GroupEntry>, FormatError> {
    let heap = LocalHeap::parse(
        data,
        table.local_heap_address,
        layout.offset_size,
        layout.length_size,
    )?;
    let nodes = collect_group_nodes(
        data,
        table.btree_address,
        layout.offset_size,
        layout.length_size,
    )?;

    let mut entries = Vec::new();
    for address in nodes {
        let node = SymbolTableNode::parse(data, address, layout.offset_size)?;
        for entry in node.entries {
            if is_undefined(entry.object_header_address, layout.offset_size) {
                continue;
            }
            entries.push(GroupEntry {
                name: heap.read_string(data, entry.link_name_offset)?,
                address: entry.object_header_address,
            });
        }
    }
    Ok(entries)
}

/// Whether a link info message points at a fractal heap of links.
fn dense_storage(info: &[u8], offset_size: u8) -> Result<bool, FormatError> {
    ensure_len(info, 0, 2)?;
    // version, flags, optional max creation index, then the heap address
    let pos = if info[1] & 0x01 != 0 { 10 } else { 2 };
    let heap = read_uint(info, pos, offset_size as usize)?;
    Ok(!is_undefined(heap, offset_size))
}

/// Follow `path` (slash separated, leading slash optional) from the group at
/// `root` and return the object header address it names.
pub fn resolve_path(
    data: &[u8],
    root: u64,
    path: &str,
    layout: &FileLayout,
) -> Result<u64, FormatError> {
    path.split('/')
        .filter(|c| !c.is_empty())
        .try_fold(root, |current, component| {
            let header = layout.object_header(data, current)?;
            group_entries(data, &header, layout)?
                .into_iter()
                .find(|e| e.name == component)
                .map(|e| e.address)
                .ok_or_else(|| FormatError::PathNotFound(path.to_string()))
        })
}
