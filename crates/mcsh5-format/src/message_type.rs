//! HDF5 object header message type identifiers.

/// Header message types the reader distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Nil,
    Dataspace,
    LinkInfo,
    Datatype,
    FillValueOld,
    FillValue,
    Link,
    DataLayout,
    GroupInfo,
    FilterPipeline,
    Attribute,
    ObjectHeaderContinuation,
    SymbolTable,
    ObjectModificationTime,
    AttributeInfo,
    ObjectReferenceCount,
    /// Any other message type, with its raw type ID.
    Unknown(u16),
}

impl MessageType {
    const TABLE: [(u16, MessageType); 16] = [
        (0x0000, MessageType::Nil),
        (0x0001, MessageType::Dataspace),
        (0x0002, MessageType::LinkInfo),
        (0x0003, MessageType::Datatype),
        (0x0004, MessageType::FillValueOld),
        (0x0005, MessageType::FillValue),
        (0x0006, MessageType::Link),
        (0x0008, MessageType::DataLayout),
        (0x000A, MessageType::GroupInfo),
        (0x000B, MessageType::FilterPipeline),
        (0x000C, MessageType::Attribute),
        (0x0010, MessageType::ObjectHeaderContinuation),
        (0x0011, MessageType::SymbolTable),
        (0x0012, MessageType::ObjectModificationTime),
        (0x0015, MessageType::AttributeInfo),
        (0x0016, MessageType::ObjectReferenceCount),
    ];

    /// Convert a raw type ID to a `MessageType`.
    pub fn from_u16(val: u16) -> MessageType {
        Self::TABLE
            .iter()
            .find(|(id, _)| *id == val)
            .map_or(MessageType::Unknown(val), |(_, t)| *t)
    }

    /// Convert back to the raw type ID.
    pub fn to_u16(self) -> u16 {
        match self {
            MessageType::Unknown(id) => id,
            known => Self::TABLE
                .iter()
                .find(|(_, t)| *t == known)
                .map_or(0xFFFF, |(id, _)| *id),
        }
    }
}
