//! HDF5 link message parsing (message type 0x0006).

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::bytes::{ensure_len, read_cstr, read_u16, read_uint};
use crate::datatype::CharacterSet;
use crate::error::FormatError;

/// What a link points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Object header address in this file.
    Hard(u64),
    /// Path resolved at access time.
    Soft(String),
    /// Object in another file.
    External {
        /// Target file name.
        file: String,
        /// Object path within that file.
        path: String,
    },
    /// User-defined link class; the payload is not interpreted.
    UserDefined(u8),
}

/// A parsed link message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    /// Link name.
    pub name: String,
    /// Link target.
    pub target: LinkTarget,
    /// Creation order, when the group tracks it.
    pub creation_order: Option<u64>,
    /// Encoding of the name.
    pub charset: CharacterSet,
}

impl LinkMessage {
    /// Parse a link message. Only version 1 exists.
    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        if data[0] != 1 {
            return Err(FormatError::InvalidLinkVersion(data[0]));
        }
        let flags = data[1];
        let mut pos = 2;

        let link_type = if flags & 0x08 != 0 {
            ensure_len(data, pos, 1)?;
            pos += 1;
            data[pos - 1]
        } else {
            0
        };
        let creation_order = if flags & 0x04 != 0 {
            let order = read_uint(data, pos, 8)?;
            pos += 8;
            Some(order)
        } else {
            None
        };
        let charset = if flags & 0x10 != 0 {
            ensure_len(data, pos, 1)?;
            pos += 1;
            match data[pos - 1] {
                0 => CharacterSet::Ascii,
                1 => CharacterSet::Utf8,
                other => return Err(FormatError::InvalidCharacterSet(other)),
            }
        } else {
            CharacterSet::Ascii
        };

        let width = 1usize << (flags & 0x03);
        let name_len = read_uint(data, pos, width)? as usize;
        pos += width;
        ensure_len(data, pos, name_len)?;
        let name = String::from_utf8_lossy(&data[pos..pos + name_len]).into_owned();
        pos += name_len;

        let target = match link_type {
            0 => LinkTarget::Hard(read_uint(data, pos, offset_size as usize)?),
            1 => {
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                LinkTarget::Soft(String::from_utf8_lossy(&data[pos + 2..pos + 2 + len]).into_owned())
            }
            64 => {
                // length(2), then a flags byte and two null-terminated strings
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                let info = &data[pos + 2..pos + 2 + len];
                let (file, used) = read_cstr(info, 1)?;
                let (path, _) = read_cstr(info, 1 + used)?;
                LinkTarget::External { file, path }
            }
            other => LinkTarget::UserDefined(other),
        };

        Ok(LinkMessage {
            name,
            target,
            creation_order,
            charset,
        })
    }

    /// The object header address for hard links.
    pub fn hard_address(&self) -> Option<u64> {
        match self.target {
            LinkTarget::Hard(address) => Some(address),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_link() {
        let mut buf = vec![1, 0x00, 8];
        buf.extend_from_slice(b"Stream_0");
        buf.extend_from_slice(&1234u64.to_le_bytes());
        let link = LinkMessage::parse(&buf, 8).unwrap();
        assert_eq!(link.name, "Stream_0");
        assert_eq!(link.target, LinkTarget::Hard(1234));
        assert_eq!(link.hard_address(), Some(1234));
        assert_eq!(link.creation_order, None);
        assert_eq!(link.charset, CharacterSet::Ascii);
    }

    #[test]
    fn soft_link_with_order_and_charset() {
        // two-byte name length, type, order, charset
        let mut buf = vec![1, 0x01 | 0x08 | 0x04 | 0x10, 1];
        buf.extend_from_slice(&5u64.to_le_bytes());
        buf.push(1);
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(b"last");
        buf.extend_from_slice(&14u16.to_le_bytes());
        buf.extend_from_slice(b"/Data/Stream_0");
        let link = LinkMessage::parse(&buf, 8).unwrap();
        assert_eq!(link.name, "last");
        assert_eq!(link.creation_order, Some(5));
        assert_eq!(link.charset, CharacterSet::Utf8);
        assert_eq!(link.target, LinkTarget::Soft("/Data/Stream_0".into()));
        assert_eq!(link.hard_address(), None);
    }

    #[test]
    fn external_link() {
        let mut buf = vec![1, 0x08, 64, 3];
        buf.extend_from_slice(b"ext");
        let info = b"\0other.h5\0/Data\0";
        buf.extend_from_slice(&(info.len() as u16).to_le_bytes());
        buf.extend_from_slice(info);
        assert_eq!(
            LinkMessage::parse(&buf, 8).unwrap().target,
            LinkTarget::External {
                file: "other.h5".into(),
                path: "/Data".into()
            }
        );
    }

    #[test]
    fn rejects_other_versions() {
        assert_eq!(
            LinkMessage::parse(&[2, 0], 8),
            Err(FormatError::InvalidLinkVersion(2))
        );
    }
}
