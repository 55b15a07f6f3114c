//! Error types for HDF5 format parsing.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use core::fmt;

/// Errors that can occur when parsing HDF5 binary format structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The HDF5 magic signature was not found at any valid offset.
    SignatureNotFound,
    /// The superblock version is not supported.
    UnsupportedSuperblockVersion(u8),
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    InvalidLengthSize(u8),
    /// A structure signature (`TREE`, `SNOD`, `HEAP`, `GCOL`, `OCHK`) did not match.
    InvalidSignature {
        /// The four-character signature that was expected.
        expected: &'static str,
        /// File address of the structure.
        address: u64,
    },
    /// Invalid object header version.
    InvalidObjectHeaderVersion(u8),
    /// Unknown message type that is marked as must-understand.
    UnsupportedMessage(u16),
    /// The message is stored in the shared object header message heap.
    SharedMessage(u16),
    /// Jenkins lookup3 checksum mismatch.
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// Unknown datatype class.
    InvalidDatatypeClass(u8),
    /// Datatype version not valid for its class.
    InvalidDatatypeVersion {
        /// Datatype class.
        class: u8,
        /// Encoded version.
        version: u8,
    },
    /// Unknown string padding value.
    InvalidStringPadding(u8),
    /// Unknown character set value.
    InvalidCharacterSet(u8),
    /// Unknown reference type value.
    InvalidReferenceType(u8),
    /// Dataspace message version not supported.
    InvalidDataspaceVersion(u8),
    /// Data layout message version not supported.
    InvalidLayoutVersion(u8),
    /// Data layout class not supported.
    UnsupportedLayoutClass(u8),
    /// Chunk index type of a version 4 layout not supported.
    UnsupportedChunkIndex(u8),
    /// Filter pipeline message version not supported.
    InvalidFilterPipelineVersion(u8),
    /// Link message version not supported.
    InvalidLinkVersion(u8),
    /// Group uses dense (fractal heap) link storage.
    UnsupportedGroupStorage,
    /// A path component could not be resolved.
    PathNotFound(String),
    /// A required header message is missing.
    MissingMessage(&'static str),
    /// The element type cannot be converted to the requested representation.
    UnsupportedConversion(&'static str),
    /// Buffer size does not match the element count and size.
    DataSizeMismatch {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },
    /// A hyperslab selection lies outside the dataset extent.
    SelectionOutOfBounds {
        /// Dimension index.
        dim: usize,
        /// First selected index.
        start: u64,
        /// Number of selected elements.
        count: u64,
        /// Extent of the dimension.
        extent: u64,
    },
    /// A hyperslab rank differs from the dataset rank.
    SelectionRankMismatch {
        /// Rank of the selection.
        selection: usize,
        /// Rank of the dataset.
        dataset: usize,
    },
    /// The filter identifier is not supported.
    UnsupportedFilter(u16),
    /// Decompression failed.
    DecompressionError(String),
    /// Fletcher32 checksum of a chunk does not match.
    Fletcher32Mismatch {
        /// The checksum stored after the chunk data.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// The global heap collection has no object with the given index.
    GlobalHeapObjectNotFound {
        /// Collection address.
        collection: u64,
        /// Object index within the collection.
        index: u32,
    },
    /// A B-tree node has a type other than the one the caller walks.
    InvalidBTreeNodeType(u8),
    /// A B-tree is deeper than any well-formed file would produce.
    BTreeTooDeep,
    /// Sizes or offsets read from the file overflow when combined.
    SizeOverflow(&'static str),
    /// A read would produce far more bytes than the file could encode.
    ExtentTooLarge {
        /// Bytes the selection asks for.
        requested: u64,
        /// Largest plausible result for this file.
        limit: u64,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SignatureNotFound => {
                write!(f, "HDF5 signature not found at any valid offset")
            }
            FormatError::UnsupportedSuperblockVersion(v) => {
                write!(f, "unsupported superblock version: {v}")
            }
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidSignature { expected, address } => {
                write!(f, "expected {expected} signature at address {address:#x}")
            }
            FormatError::InvalidObjectHeaderVersion(v) => {
                write!(f, "invalid object header version: {v}")
            }
            FormatError::UnsupportedMessage(id) => {
                write!(
                    f,
                    "unsupported message type {id:#06x} marked as must-understand"
                )
            }
            FormatError::SharedMessage(id) => {
                write!(f, "shared header message {id:#06x} is not supported")
            }
            FormatError::ChecksumMismatch { expected, computed } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#010x}, computed {computed:#010x}"
                )
            }
            FormatError::InvalidDatatypeClass(c) => write!(f, "invalid datatype class: {c}"),
            FormatError::InvalidDatatypeVersion { class, version } => {
                write!(f, "invalid version {version} for datatype class {class}")
            }
            FormatError::InvalidStringPadding(v) => write!(f, "invalid string padding: {v}"),
            FormatError::InvalidCharacterSet(v) => write!(f, "invalid character set: {v}"),
            FormatError::InvalidReferenceType(v) => write!(f, "invalid reference type: {v}"),
            FormatError::InvalidDataspaceVersion(v) => {
                write!(f, "invalid dataspace version: {v}")
            }
            FormatError::InvalidLayoutVersion(v) => write!(f, "invalid data layout version: {v}"),
            FormatError::UnsupportedLayoutClass(c) => {
                write!(f, "unsupported data layout class: {c}")
            }
            FormatError::UnsupportedChunkIndex(t) => {
                write!(f, "unsupported chunk index type: {t}")
            }
            FormatError::InvalidFilterPipelineVersion(v) => {
                write!(f, "invalid filter pipeline version: {v}")
            }
            FormatError::InvalidLinkVersion(v) => write!(f, "invalid link message version: {v}"),
            FormatError::UnsupportedGroupStorage => {
                write!(f, "dense link storage is not supported")
            }
            FormatError::PathNotFound(p) => write!(f, "path not found: {p}"),
            FormatError::MissingMessage(m) => write!(f, "missing {m} message"),
            FormatError::UnsupportedConversion(what) => {
                write!(f, "cannot convert {what}")
            }
            FormatError::DataSizeMismatch { expected, actual } => {
                write!(f, "data size mismatch: expected {expected} bytes, got {actual}")
            }
            FormatError::SelectionOutOfBounds {
                dim,
                start,
                count,
                extent,
            } => write!(
                f,
                "selection {start}+{count} exceeds extent {extent} of dimension {dim}"
            ),
            FormatError::SelectionRankMismatch { selection, dataset } => write!(
                f,
                "selection rank {selection} does not match dataset rank {dataset}"
            ),
            FormatError::UnsupportedFilter(id) => write!(f, "unsupported filter: {id}"),
            FormatError::DecompressionError(msg) => write!(f, "decompression failed: {msg}"),
            FormatError::Fletcher32Mismatch { expected, computed } => write!(
                f,
                "fletcher32 mismatch: expected {expected:#010x}, computed {computed:#010x}"
            ),
            FormatError::GlobalHeapObjectNotFound { collection, index } => write!(
                f,
                "global heap collection {collection:#x} has no object {index}"
            ),
            FormatError::InvalidBTreeNodeType(t) => write!(f, "unexpected B-tree node type: {t}"),
            FormatError::BTreeTooDeep => write!(f, "B-tree exceeds the maximum depth"),
            FormatError::SizeOverflow(what) => write!(f, "arithmetic overflow computing {what}"),
            FormatError::ExtentTooLarge { requested, limit } => {
                write!(f, "read of {requested} bytes exceeds the {limit} bytes this file can hold")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}
