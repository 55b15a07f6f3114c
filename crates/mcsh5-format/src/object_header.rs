//! HDF5 object header parsing (v1 and v2), following continuation blocks.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bytes::{ensure_len, read_u16, read_u32, read_uint, to_index};
use crate::checksum::verify_trailing;
use crate::error::FormatError;
use crate::message_type::MessageType;

/// OHDR signature for v2 object headers.
const OHDR_SIGNATURE: [u8; 4] = *b"OHDR";

/// OCHK signature for v2 continuation chunks.
const OCHK_SIGNATURE: [u8; 4] = *b"OCHK";

/// Message flag: the message data is a reference into the shared message heap.
const FLAG_SHARED: u8 = 0x02;

/// Message flag: fail to open the object when the message type is unknown.
const FLAG_FAIL_IF_UNKNOWN: u8 = 0x80;

/// v2 header flag: each message carries a 2-byte creation order.
const HDR_CREATION_ORDER: u8 = 0x04;
/// v2 header flag: non-default attribute storage phase change values present.
const HDR_PHASE_CHANGE: u8 = 0x10;
/// v2 header flag: access/modification/change/birth times present.
const HDR_TIMES: u8 = 0x20;

/// A single parsed header message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMessage {
    /// The message type.
    pub msg_type: MessageType,
    /// Message flags byte.
    pub flags: u8,
    /// Raw message data bytes.
    pub data: Vec<u8>,
}

impl HeaderMessage {
    /// Whether the payload lives in the shared message heap.
    pub fn is_shared(&self) -> bool {
        self.flags & FLAG_SHARED != 0
    }
}

/// Parsed HDF5 object header: every non-NIL, non-continuation message from
/// all of its chunks, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Header version (1 or 2).
    pub version: u8,
    /// Messages collected from all chunks.
    pub messages: Vec<HeaderMessage>,
}

/// Where the next block of messages lives and how it is framed.
struct Block {
    start: usize,
    end: usize,
}

impl ObjectHeader {
    /// Parse the object header at `address`.
    ///
    /// `offset_size` and `length_size` come from the superblock. With
    /// `verify_checksum`, v2 chunks are checked against their lookup3 sum.
    pub fn parse(
        data: &[u8],
        address: u64,
        offset_size: u8,
        length_size: u8,
        verify_checksum: bool,
    ) -> Result<ObjectHeader, FormatError> {
        let start = to_index(address, data.len())?;
        ensure_len(data, start, 4)?;
        let mut parser = Parser {
            data,
            offset_size: offset_size as usize,
            length_size: length_size as usize,
            verify: verify_checksum && cfg!(feature = "checksum"),
            messages: Vec::new(),
            continuations: Vec::new(),
            visited: Vec::new(),
        };

        let version = if data[start..start + 4] == OHDR_SIGNATURE {
            let (block, creation_order) = parser.v2_prefix(start)?;
            parser.v2_messages(block, creation_order)?;
            while let Some((addr, len)) = parser.next_continuation() {
                let block = parser.v2_continuation(addr, len)?;
                parser.v2_messages(block, creation_order)?;
            }
            2
        } else {
            let block = parser.v1_prefix(start)?;
            parser.v1_messages(block)?;
            while let Some((addr, len)) = parser.next_continuation() {
                let block_start = to_index(addr, data.len())?;
                let block_len = to_index(len, data.len())?;
                ensure_len(data, block_start, block_len)?;
                parser.v1_messages(Block {
                    start: block_start,
                    end: block_start + block_len,
                })?;
            }
            1
        };

        Ok(ObjectHeader {
            version,
            messages: parser.messages,
        })
    }

    /// First message of the given type.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// All messages of the given type, in header order.
    pub fn find_all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }

    /// Payload of the first message of the given type, which must be stored inline.
    pub fn require(
        &self,
        msg_type: MessageType,
        what: &'static str,
    ) -> Result<&[u8], FormatError> {
        let msg = self.find(msg_type).ok_or(FormatError::MissingMessage(what))?;
        if msg.is_shared() {
            return Err(FormatError::SharedMessage(msg_type.to_u16()));
        }
        Ok(&msg.data)
    }
}

struct Parser<'a> {
    data: &'a [u8],
    offset_size: usize,
    length_size: usize,
    verify: bool,
    messages: Vec<HeaderMessage>,
    continuations: Vec<(u64, u64)>,
    visited: Vec<u64>,
}

impl Parser<'_> {
    /// Next unvisited continuation block; a block that points back at one
    /// already read is dropped.
    fn next_continuation(&mut self) -> Option<(u64, u64)> {
        while let Some((addr, len)) = self.continuations.pop() {
            if !self.visited.contains(&addr) {
                self.visited.push(addr);
                return Some((addr, len));
            }
        }
        None
    }

    fn push(&mut self, raw_type: u16, flags: u8, body: &[u8]) -> Result<(), FormatError> {
        let msg_type = MessageType::from_u16(raw_type);
        match msg_type {
            MessageType::Nil => {}
            MessageType::ObjectHeaderContinuation => {
                let addr = read_uint(body, 0, self.offset_size)?;
                let len = read_uint(body, self.offset_size, self.length_size)?;
                // Popped from the back, so keep file order by inserting at the front.
                self.continuations.insert(0, (addr, len));
            }
            MessageType::Unknown(id) if flags & FLAG_FAIL_IF_UNKNOWN != 0 => {
                return Err(FormatError::UnsupportedMessage(id));
            }
            _ => self.messages.push(HeaderMessage {
                msg_type,
                flags,
                data: body.to_vec(),
            }),
        }
        Ok(())
    }

    // version(1) reserved(1) messages(2) refcount(4) header size(4),
    // padded to 16 so messages start 8-byte aligned.
    fn v1_prefix(&self, start: usize) -> Result<Block, FormatError> {
        ensure_len(self.data, start, 16)?;
        let version = self.data[start];
        if version != 1 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let size = read_u32(self.data, start + 8)? as usize;
        ensure_len(self.data, start + 16, size)?;
        Ok(Block {
            start: start + 16,
            end: start + 16 + size,
        })
    }

    fn v1_messages(&mut self, block: Block) -> Result<(), FormatError> {
        let mut pos = block.start;
        while pos + 8 <= block.end {
            let raw_type = read_u16(self.data, pos)?;
            let size = read_u16(self.data, pos + 2)? as usize;
            let flags = self.data[pos + 4];
            pos += 8;
            if pos + size > block.end {
                return Err(FormatError::UnexpectedEof {
                    expected: pos + size,
                    available: block.end,
                });
            }
            let body = &self.data[pos..pos + size];
            self.push(raw_type, flags, body)?;
            // v1 message sizes already include the padding to 8 bytes.
            pos += size;
        }
        Ok(())
    }

    fn v2_prefix(&self, start: usize) -> Result<(Block, bool), FormatError> {
        ensure_len(self.data, start, 6)?;
        let version = self.data[start + 4];
        if version != 2 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let flags = self.data[start + 5];
        let mut pos = start + 6;
        if flags & HDR_TIMES != 0 {
            pos += 16;
        }
        if flags & HDR_PHASE_CHANGE != 0 {
            pos += 4;
        }
        let width = 1usize << (flags & 0x03);
        let chunk_size = to_index(read_uint(self.data, pos, width)?, self.data.len())?;
        pos += width;
        ensure_len(self.data, pos, chunk_size + 4)?;
        let end = pos + chunk_size;
        if self.verify {
            verify_trailing(&self.data[start..end], read_u32(self.data, end)?)?;
        }
        Ok((Block { start: pos, end }, flags & HDR_CREATION_ORDER != 0))
    }

    fn v2_continuation(&self, addr: u64, len: u64) -> Result<Block, FormatError> {
        let start = to_index(addr, self.data.len())?;
        let len = to_index(len, self.data.len())?;
        ensure_len(self.data, start, len)?;
        if len < 8 || self.data[start..start + 4] != OCHK_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                expected: "OCHK",
                address: addr,
            });
        }
        let end = start + len - 4;
        if self.verify {
            verify_trailing(&self.data[start..end], read_u32(self.data, end)?)?;
        }
        Ok(Block {
            start: start + 4,
            end,
        })
    }

    fn v2_messages(&mut self, block: Block, creation_order: bool) -> Result<(), FormatError> {
        let header_len = if creation_order { 6 } else { 4 };
        let mut pos = block.start;
        // Anything shorter than a message header at the end is a gap.
        while pos + header_len <= block.end {
            let raw_type = self.data[pos] as u16;
            let size = read_u16(self.data, pos + 1)? as usize;
            let flags = self.data[pos + 3];
            pos += header_len;
            if pos + size > block.end {
                return Err(FormatError::UnexpectedEof {
                    expected: pos + size,
                    available: block.end,
                });
            }
            let body = &self.data[pos..pos + size];
            self.push(raw_type, flags, body)?;
            pos += size;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::jenkins_lookup3;

    fn v1_message(buf: &mut Vec<u8>, ty: u16, flags: u8, body: &[u8]) {
        let padded = (body.len() + 7) & !7;
        buf.extend_from_slice(&ty.to_le_bytes());
        buf.extend_from_slice(&(padded as u16).to_le_bytes());
        buf.extend_from_slice(&[flags, 0, 0, 0]);
        buf.extend_from_slice(body);
        buf.resize(buf.len() + padded - body.len(), 0);
    }

    fn v1_header(messages: &[u8]) -> Vec<u8> {
        let mut buf = vec![1, 0];
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(messages.len() as u32).to_le_bytes());
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(messages);
        buf
    }

    fn v2_chunk(body: &[u8], flags: u8) -> Vec<u8> {
        let mut buf = OHDR_SIGNATURE.to_vec();
        buf.push(2);
        buf.push(flags);
        buf.push(body.len() as u8);
        buf.extend_from_slice(body);
        let sum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&sum.to_le_bytes());
        buf
    }

    fn v2_message(buf: &mut Vec<u8>, ty: u8, body: &[u8]) {
        buf.push(ty);
        buf.extend_from_slice(&(body.len() as u16).to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(body);
    }

    #[test]
    fn v1_header_with_padding() {
        let mut msgs = Vec::new();
        v1_message(&mut msgs, 0x0011, 0, &[0xAA; 16]);
        v1_message(&mut msgs, 0x0000, 0, &[0; 8]);
        v1_message(&mut msgs, 0x0003, 1, &[1, 2, 3]);
        let data = v1_header(&msgs);

        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.version, 1);
        assert_eq!(oh.messages.len(), 2);
        assert_eq!(oh.messages[0].msg_type, MessageType::SymbolTable);
        assert_eq!(oh.messages[1].msg_type, MessageType::Datatype);
        // The padded length is what the header records.
        assert_eq!(oh.messages[1].data, vec![1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(oh.messages[1].flags, 1);
    }

    #[test]
    fn v1_header_follows_continuation() {
        let mut tail = Vec::new();
        v1_message(&mut tail, 0x0001, 0, &[7; 8]);

        let mut cont = Vec::new();
        // continuation target filled in once we know the head size
        v1_message(&mut cont, 0x0010, 0, &[0; 16]);
        let mut data = v1_header(&cont);
        let tail_addr = data.len() as u64;
        data[24..32].copy_from_slice(&tail_addr.to_le_bytes());
        data[32..40].copy_from_slice(&(tail.len() as u64).to_le_bytes());
        data.extend_from_slice(&tail);

        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.messages.len(), 1);
        assert_eq!(oh.messages[0].msg_type, MessageType::Dataspace);
        assert_eq!(oh.messages[0].data, vec![7; 8]);
    }

    #[test]
    fn v2_header_with_checksum() {
        let mut body = Vec::new();
        v2_message(&mut body, 0x06, b"link");
        v2_message(&mut body, 0x01, &[9, 9]);
        let data = v2_chunk(&body, 0);

        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.version, 2);
        assert_eq!(oh.messages.len(), 2);
        assert_eq!(oh.find(MessageType::Link).unwrap().data, b"link".to_vec());
        assert_eq!(oh.find_all(MessageType::Dataspace).count(), 1);
    }

    #[test]
    fn v2_header_checksum_mismatch() {
        let mut body = Vec::new();
        v2_message(&mut body, 0x01, &[1, 2, 3, 4]);
        let mut data = v2_chunk(&body, 0);
        data[8] ^= 0x40;
        assert!(matches!(
            ObjectHeader::parse(&data, 0, 8, 8, true),
            Err(FormatError::ChecksumMismatch { .. })
        ));
        assert!(ObjectHeader::parse(&data, 0, 8, 8, false).is_ok());
    }

    #[test]
    fn v2_header_follows_ochk() {
        let mut ochk = OCHK_SIGNATURE.to_vec();
        v2_message(&mut ochk, 0x03, &[5; 6]);
        let sum = jenkins_lookup3(&ochk);
        ochk.extend_from_slice(&sum.to_le_bytes());

        let mut body = Vec::new();
        let mut cont = Vec::new();
        cont.extend_from_slice(&0u64.to_le_bytes());
        cont.extend_from_slice(&(ochk.len() as u64).to_le_bytes());
        v2_message(&mut body, 0x10, &cont);
        let head_len = v2_chunk(&body, 0).len();

        // Now point the continuation right after the head.
        let mut cont = Vec::new();
        cont.extend_from_slice(&(head_len as u64).to_le_bytes());
        cont.extend_from_slice(&(ochk.len() as u64).to_le_bytes());
        let mut body = Vec::new();
        v2_message(&mut body, 0x10, &cont);
        let mut data = v2_chunk(&body, 0);
        data.extend_from_slice(&ochk);

        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.messages.len(), 1);
        assert_eq!(oh.messages[0].msg_type, MessageType::Datatype);
    }

    #[test]
    fn v2_creation_order_and_gap() {
        let mut body = Vec::new();
        body.push(0x01);
        body.extend_from_slice(&2u16.to_le_bytes());
        body.push(0);
        body.extend_from_slice(&3u16.to_le_bytes()); // creation order
        body.extend_from_slice(&[4, 4]);
        body.extend_from_slice(&[0, 0, 0]); // gap shorter than a header
        let data = v2_chunk(&body, HDR_CREATION_ORDER);

        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.messages.len(), 1);
        assert_eq!(oh.messages[0].data, vec![4, 4]);
    }

    #[test]
    fn unknown_fail_if_unknown_message() {
        let mut msgs = Vec::new();
        v1_message(&mut msgs, 0x00FE, FLAG_FAIL_IF_UNKNOWN, &[0; 8]);
        let data = v1_header(&msgs);
        assert_eq!(
            ObjectHeader::parse(&data, 0, 8, 8, true),
            Err(FormatError::UnsupportedMessage(0x00FE))
        );

        let mut msgs = Vec::new();
        v1_message(&mut msgs, 0x00FE, 0, &[0; 8]);
        let data = v1_header(&msgs);
        let oh = ObjectHeader::parse(&data, 0, 8, 8, true).unwrap();
        assert_eq!(oh.messages[0].msg_type, MessageType::Unknown(0x00FE));
    }

    #[test]
    fn require_rejects_missing_and_shared() {
        let oh = ObjectHeader {
            version: 2,
            messages: vec![HeaderMessage {
                msg_type: MessageType::Datatype,
                flags: FLAG_SHARED,
                data: vec![],
            }],
        };
        assert_eq!(
            oh.require(MessageType::Dataspace, "dataspace"),
            Err(FormatError::MissingMessage("dataspace"))
        );
        assert_eq!(
            oh.require(MessageType::Datatype, "datatype"),
            Err(FormatError::SharedMessage(0x0003))
        );
    }
}
