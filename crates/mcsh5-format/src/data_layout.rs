//! HDF5 data layout message parsing (message type 0x0008), versions 3 and 4.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bytes::{ensure_len, is_undefined, read_u16, read_u32, read_uint, to_index};
use crate::error::FormatError;

/// How the chunks of a chunked dataset are located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkIndex {
    /// Version 1 B-tree of chunk records (layout version 3).
    BTreeV1 {
        /// Root node address, `None` when nothing was written.
        address: Option<u64>,
    },
    /// The dataset is one chunk (layout v4, index type 1).
    SingleChunk {
        /// Chunk address.
        address: Option<u64>,
        /// Stored size when the chunk is filtered.
        filtered_size: Option<u64>,
        /// Filters skipped for this chunk.
        filter_mask: u32,
    },
    /// Unfiltered chunks stored back to back in grid order (layout v4, index type 2).
    Implicit {
        /// Address of the first chunk.
        address: Option<u64>,
    },
}

/// Parsed data layout message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Data stored inline in the message.
    Compact {
        /// The raw data bytes.
        data: Vec<u8>,
    },
    /// Data stored at a single address.
    Contiguous {
        /// File address, or `None` when storage was never allocated.
        address: Option<u64>,
        /// Size of the data in bytes.
        size: u64,
    },
    /// Data split into equally shaped chunks.
    Chunked {
        /// Chunk shape in elements, one entry per dataset dimension.
        chunk_dimensions: Vec<u64>,
        /// Size of one element in bytes, as recorded by the layout.
        element_size: u64,
        /// Chunk location index.
        index: ChunkIndex,
    },
}

impl DataLayout {
    /// Parse a data layout message. Sizes come from the superblock.
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let class = data[1];
        let os = offset_size as usize;
        let ls = length_size as usize;
        let address = |pos: usize| -> Result<Option<u64>, FormatError> {
            let a = read_uint(data, pos, os)?;
            Ok((!is_undefined(a, offset_size)).then_some(a))
        };

        if !matches!(version, 3 | 4) {
            return Err(FormatError::InvalidLayoutVersion(version));
        }

        match class {
            0 => {
                let size = read_u16(data, 2)? as usize;
                ensure_len(data, 4, size)?;
                Ok(DataLayout::Compact {
                    data: data[4..4 + size].to_vec(),
                })
            }
            1 => Ok(DataLayout::Contiguous {
                address: address(2)?,
                size: read_uint(data, 2 + os, ls)?,
            }),
            2 if version == 3 => {
                ensure_len(data, 2, 1)?;
                let dimensionality = data[2] as usize;
                let index = ChunkIndex::BTreeV1 {
                    address: address(3)?,
                };
                let pos = 3 + os;
                let mut dims = (0..dimensionality)
                    .map(|i| read_u32(data, pos + 4 * i).map(u64::from))
                    .collect::<Result<Vec<_>, _>>()?;
                let element_size = dims.pop().unwrap_or(0);
                Ok(DataLayout::Chunked {
                    chunk_dimensions: dims,
                    element_size,
                    index,
                })
            }
            2 => {
                ensure_len(data, 2, 3)?;
                let flags = data[2];
                let dimensionality = data[3] as usize;
                let width = data[4] as usize;
                let mut pos = 5;
                let mut dims = (0..dimensionality)
                    .map(|i| read_uint(data, pos + width * i, width))
                    .collect::<Result<Vec<_>, _>>()?;
                pos += width * dimensionality;
                let element_size = dims.pop().unwrap_or(0);

                ensure_len(data, pos, 1)?;
                let index_type = data[pos];
                pos += 1;
                let index = match index_type {
                    1 => {
                        let (filtered_size, filter_mask) = if flags & 0x02 != 0 {
                            let size = read_uint(data, pos, ls)?;
                            let mask = read_u32(data, pos + ls)?;
                            pos += ls + 4;
                            (Some(size), mask)
                        } else {
                            (None, 0)
                        };
                        ChunkIndex::SingleChunk {
                            address: address(pos)?,
                            filtered_size,
                            filter_mask,
                        }
                    }
                    2 => ChunkIndex::Implicit {
                        address: address(pos)?,
                    },
                    other => return Err(FormatError::UnsupportedChunkIndex(other)),
                };
                Ok(DataLayout::Chunked {
                    chunk_dimensions: dims,
                    element_size,
                    index,
                })
            }
            other => Err(FormatError::UnsupportedLayoutClass(other)),
        }
    }

    /// Number of bytes in one full chunk, if chunked.
    pub fn chunk_bytes(&self) -> Option<usize> {
        match self {
            DataLayout::Chunked {
                chunk_dimensions,
                element_size,
                ..
            } => {
                let bytes = chunk_dimensions
                    .iter()
                    .try_fold(*element_size, |acc, &d| acc.checked_mul(d))?;
                to_index(bytes, usize::MAX).ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_layout() {
        let mut buf = vec![3, 0];
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Compact {
                data: vec![1, 2, 3, 4]
            }
        );
    }

    #[test]
    fn contiguous_layout_and_unallocated() {
        let mut buf = vec![3, 1];
        buf.extend_from_slice(&2048u64.to_le_bytes());
        buf.extend_from_slice(&400u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Contiguous {
                address: Some(2048),
                size: 400
            }
        );

        let mut buf = vec![3, 1];
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(&16u32.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 4, 4).unwrap(),
            DataLayout::Contiguous {
                address: None,
                size: 16
            }
        );
    }

    #[test]
    fn chunked_v3_btree() {
        let mut buf = vec![3, 2, 3];
        buf.extend_from_slice(&800u64.to_le_bytes());
        for d in [2u32, 128, 4] {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        let layout = DataLayout::parse(&buf, 8, 8).unwrap();
        assert_eq!(
            layout,
            DataLayout::Chunked {
                chunk_dimensions: vec![2, 128],
                element_size: 4,
                index: ChunkIndex::BTreeV1 { address: Some(800) },
            }
        );
        assert_eq!(layout.chunk_bytes(), Some(1024));
    }

    #[test]
    fn chunked_v4_single_filtered_chunk() {
        let mut buf = vec![4, 2, 0x02, 2, 2];
        buf.extend_from_slice(&10u16.to_le_bytes());
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.push(1);
        buf.extend_from_slice(&77u64.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&4096u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dimensions: vec![10],
                element_size: 8,
                index: ChunkIndex::SingleChunk {
                    address: Some(4096),
                    filtered_size: Some(77),
                    filter_mask: 0,
                },
            }
        );
    }

    #[test]
    fn chunked_v4_implicit_and_unsupported_index() {
        let mut buf = vec![4, 2, 0, 3, 1, 4, 16, 2, 2];
        buf.extend_from_slice(&512u64.to_le_bytes());
        assert_eq!(
            DataLayout::parse(&buf, 8, 8).unwrap(),
            DataLayout::Chunked {
                chunk_dimensions: vec![4, 16],
                element_size: 2,
                index: ChunkIndex::Implicit { address: Some(512) },
            }
        );

        let buf = vec![4, 2, 0, 2, 1, 8, 4, 3, 0];
        assert_eq!(
            DataLayout::parse(&buf, 8, 8),
            Err(FormatError::UnsupportedChunkIndex(3))
        );
    }

    #[test]
    fn bad_version_and_class() {
        assert_eq!(
            DataLayout::parse(&[2, 1], 8, 8),
            Err(FormatError::InvalidLayoutVersion(2))
        );
        assert_eq!(
            DataLayout::parse(&[3, 3], 8, 8),
            Err(FormatError::UnsupportedLayoutClass(3))
        );
    }
}
