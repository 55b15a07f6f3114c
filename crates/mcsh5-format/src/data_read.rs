//! Reading dataset elements: hyperslab extraction over every storage layout
//! and conversion of stored elements to Rust values.

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, string::String, vec, vec::Vec};
#[cfg(feature = "std")]
use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::btree_v1::collect_chunks;
use crate::bytes::{ensure_len, to_index};
use crate::data_layout::{ChunkIndex, DataLayout};
use crate::datatype::{Datatype, DatatypeByteOrder, StringPadding};
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::decode_chunk;
use crate::global_heap::{read_vlen_string, VlenReference};
use crate::group::FileLayout;
use crate::selection::Hyperslab;

/// Everything needed to locate a dataset's elements.
#[derive(Debug, Clone, Copy)]
pub struct DatasetStorage<'a> {
    /// Storage layout.
    pub layout: &'a DataLayout,
    /// Filters applied to chunks, if any.
    pub pipeline: Option<&'a FilterPipeline>,
    /// Dataset extent.
    pub dimensions: &'a [u64],
    /// Bytes per element.
    pub element_size: usize,
}

/// A block of stored elements and where it sits in the dataset.
struct Block<'a> {
    origin: Vec<u64>,
    shape: Vec<u64>,
    bytes: Cow<'a, [u8]>,
}

/// Decoded chunks can be larger than their stored form; deflate peaks at
/// roughly 1032:1.
const MAX_FILTER_EXPANSION: u64 = 1032;

/// Reads of storage the file does not hold (unallocated, fill only) may
/// always produce this many bytes.
const MIN_READ_LIMIT: u64 = 1 << 20;

/// Read the elements selected by `selection`, in row-major selection order.
///
/// Storage that was never allocated reads as zero bytes. The result size is
/// checked against what the file can hold before anything is allocated.
pub fn read_hyperslab(
    data: &[u8],
    storage: &DatasetStorage<'_>,
    selection: &Hyperslab,
    file: &FileLayout,
) -> Result<Vec<u8>, FormatError> {
    selection.validate(storage.dimensions)?;
    let es = storage.element_size;
    let requested = byte_len(product(&selection.count, "selection size")?, es, "selection size")?;
    let extent = byte_len(product(storage.dimensions, "dataset size")?, es, "dataset size")?;
    match storage.layout {
        DataLayout::Compact { data: inline } => covers(inline.len() as u64, extent)?,
        DataLayout::Contiguous {
            address: Some(_),
            size,
        } => covers(*size, extent)?,
        _ => {
            let limit = (data.len() as u64)
                .saturating_mul(MAX_FILTER_EXPANSION)
                .max(MIN_READ_LIMIT);
            if requested > limit {
                return Err(FormatError::ExtentTooLarge { requested, limit });
            }
        }
    }
    let mut out = vec![0u8; to_index(requested, data.len())?];
    if out.is_empty() {
        return Ok(out);
    }

    match storage.layout {
        DataLayout::Compact { data: inline } => {
            copy_block(&whole(storage.dimensions, inline), selection, es, &mut out)?;
        }
        DataLayout::Contiguous { address: None, .. } => {}
        DataLayout::Contiguous {
            address: Some(address),
            size,
        } => {
            let bytes = stored_slice(data, *address, *size)?;
            copy_block(&whole(storage.dimensions, bytes), selection, es, &mut out)?;
        }
        DataLayout::Chunked {
            chunk_dimensions,
            index,
            ..
        } => {
            let rank = storage.dimensions.len();
            if chunk_dimensions.len() != rank {
                return Err(FormatError::SelectionRankMismatch {
                    selection: chunk_dimensions.len(),
                    dataset: rank,
                });
            }
            let chunk_bytes = byte_len(product(chunk_dimensions, "chunk size")?, es, "chunk size")?;
            for (origin, address, size, mask) in
                chunk_locations(data, index, chunk_dimensions, storage.dimensions, chunk_bytes, file)?
            {
                if !intersects(&origin, chunk_dimensions, selection)? {
                    continue;
                }
                let stored = stored_slice(data, address, size)?;
                let bytes = match storage.pipeline {
                    Some(pipeline) if !pipeline.filters.is_empty() => {
                        Cow::Owned(decode_chunk(stored, pipeline, mask, es)?)
                    }
                    _ => Cow::Borrowed(stored),
                };
                let block = Block {
                    origin,
                    shape: chunk_dimensions.clone(),
                    bytes,
                };
                copy_block(&block, selection, es, &mut out)?;
            }
        }
    }
    Ok(out)
}

/// Read every element of the dataset.
pub fn read_raw(
    data: &[u8],
    storage: &DatasetStorage<'_>,
    file: &FileLayout,
) -> Result<Vec<u8>, FormatError> {
    read_hyperslab(data, storage, &Hyperslab::all(storage.dimensions), file)
}

fn product(values: &[u64], what: &'static str) -> Result<u64, FormatError> {
    values
        .iter()
        .try_fold(1u64, |acc, &v| acc.checked_mul(v))
        .ok_or(FormatError::SizeOverflow(what))
}

fn byte_len(elements: u64, element_size: usize, what: &'static str) -> Result<u64, FormatError> {
    elements
        .checked_mul(element_size as u64)
        .ok_or(FormatError::SizeOverflow(what))
}

/// Fail unless `stored` bytes hold the `needed` bytes of the extent.
fn covers(stored: u64, needed: u64) -> Result<(), FormatError> {
    if stored < needed {
        return Err(FormatError::DataSizeMismatch {
            expected: usize::try_from(needed).unwrap_or(usize::MAX),
            actual: usize::try_from(stored).unwrap_or(usize::MAX),
        });
    }
    Ok(())
}

/// (origin, address, stored size, filter mask) of every allocated chunk.
fn chunk_locations(
    data: &[u8],
    index: &ChunkIndex,
    chunk_dimensions: &[u64],
    dimensions: &[u64],
    chunk_bytes: u64,
    file: &FileLayout,
) -> Result<Vec<(Vec<u64>, u64, u64, u32)>, FormatError> {
    let rank = dimensions.len();
    Ok(match *index {
        ChunkIndex::BTreeV1 { address: None }
        | ChunkIndex::SingleChunk { address: None, .. }
        | ChunkIndex::Implicit { address: None } => Vec::new(),
        ChunkIndex::BTreeV1 {
            address: Some(root),
        } => collect_chunks(data, root, file.offset_size, file.length_size, rank)?
            .into_iter()
            .map(|c| (c.offsets, c.address, u64::from(c.size), c.filter_mask))
            .collect(),
        ChunkIndex::SingleChunk {
            address: Some(address),
            filtered_size,
            filter_mask,
        } => vec![(
            vec![0; rank],
            address,
            filtered_size.unwrap_or(chunk_bytes),
            filter_mask,
        )],
        ChunkIndex::Implicit {
            address: Some(base),
        } => {
            let grid: Vec<u64> = dimensions
                .iter()
                .zip(chunk_dimensions)
                .map(|(&d, &c)| if c == 0 { 0 } else { d.div_ceil(c) })
                .collect();
            let count = product(&grid, "chunk grid")?;
            // every chunk of an implicit index is allocated, back to back
            let end = count
                .checked_mul(chunk_bytes)
                .and_then(|n| n.checked_add(base))
                .ok_or(FormatError::SizeOverflow("implicit chunk addresses"))?;
            if end > data.len() as u64 {
                return Err(FormatError::UnexpectedEof {
                    expected: usize::try_from(end).unwrap_or(usize::MAX),
                    available: data.len(),
                });
            }
            let mut chunks = Vec::with_capacity(to_index(count, data.len())?);
            for linear in 0..count {
                let mut rest = linear;
                let mut origin = vec![0u64; rank];
                for d in (0..rank).rev() {
                    origin[d] = (rest % grid[d])
                        .checked_mul(chunk_dimensions[d])
                        .ok_or(FormatError::SizeOverflow("chunk origin"))?;
                    rest /= grid[d];
                }
                chunks.push((origin, base + linear * chunk_bytes, chunk_bytes, 0));
            }
            chunks
        }
    })
}

/// Compact and contiguous storage act as one chunk covering the dataset.
fn whole<'a>(dimensions: &[u64], bytes: &'a [u8]) -> Block<'a> {
    Block {
        origin: vec![0; dimensions.len()],
        shape: dimensions.to_vec(),
        bytes: Cow::Borrowed(bytes),
    }
}

fn stored_slice(data: &[u8], address: u64, size: u64) -> Result<&[u8], FormatError> {
    let start = to_index(address, data.len())?;
    let len = to_index(size, data.len())?;
    ensure_len(data, start, len)?;
    Ok(&data[start..start + len])
}

/// The half-open range of dimension `d` shared by a block and the selection.
fn overlap(
    origin: &[u64],
    shape: &[u64],
    selection: &Hyperslab,
    d: usize,
) -> Result<(u64, u64), FormatError> {
    let end = origin[d]
        .checked_add(shape[d])
        .ok_or(FormatError::SizeOverflow("block bounds"))?;
    // validated selections never overflow
    let selected_end = selection.start[d] + selection.count[d];
    Ok((origin[d].max(selection.start[d]), end.min(selected_end)))
}

fn intersects(origin: &[u64], shape: &[u64], selection: &Hyperslab) -> Result<bool, FormatError> {
    for d in 0..origin.len() {
        let (lo, hi) = overlap(origin, shape, selection, d)?;
        if lo >= hi {
            return Ok(false);
        }
    }
    Ok(true)
}

fn row_major_strides(shape: &[u64]) -> Result<Vec<u64>, FormatError> {
    let mut strides = vec![1u64; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1]
            .checked_mul(shape[d + 1])
            .ok_or(FormatError::SizeOverflow("block strides"))?;
    }
    Ok(strides)
}

/// Linear element index of `idx` inside a block starting at `origin`.
fn linear_offset(idx: &[u64], origin: &[u64], strides: &[u64]) -> Result<u64, FormatError> {
    idx.iter()
        .zip(origin)
        .zip(strides)
        .try_fold(0u64, |acc, ((&i, &o), &s)| {
            (i - o).checked_mul(s).and_then(|n| acc.checked_add(n))
        })
        .ok_or(FormatError::SizeOverflow("element offset"))
}

/// Copy the part of `block` that falls inside `selection` into `out`.
fn copy_block(
    block: &Block<'_>,
    selection: &Hyperslab,
    es: usize,
    out: &mut [u8],
) -> Result<(), FormatError> {
    let rank = block.origin.len();
    if rank == 0 {
        ensure_len(&block.bytes, 0, es)?;
        out[..es].copy_from_slice(&block.bytes[..es]);
        return Ok(());
    }
    if !intersects(&block.origin, &block.shape, selection)? {
        return Ok(());
    }

    let mut lo = Vec::with_capacity(rank);
    let mut hi = Vec::with_capacity(rank);
    for d in 0..rank {
        let (l, h) = overlap(&block.origin, &block.shape, selection, d)?;
        lo.push(l);
        hi.push(h);
    }
    let src_strides = row_major_strides(&block.shape)?;
    let dst_strides = row_major_strides(&selection.count)?;
    let last = rank - 1;
    // bounded by the selection, whose bytes are already allocated
    let run = (hi[last] - lo[last]) as usize * es;

    let mut idx = lo.clone();
    loop {
        let src = linear_offset(&idx, &block.origin, &src_strides)?;
        let dst = linear_offset(&idx, &selection.start, &dst_strides)?;
        let src = to_index(src, block.bytes.len())?
            .checked_mul(es)
            .ok_or(FormatError::SizeOverflow("element offset"))?;
        let dst = dst as usize * es;
        ensure_len(&block.bytes, src, run).map_err(|_| FormatError::DataSizeMismatch {
            expected: src.saturating_add(run),
            actual: block.bytes.len(),
        })?;
        out[dst..dst + run].copy_from_slice(&block.bytes[src..src + run]);

        // advance over every dimension but the last
        let mut d = last;
        loop {
            if d == 0 {
                return Ok(());
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < hi[d] {
                break;
            }
            idx[d] = lo[d];
        }
    }
}

/// Decode one integer element.
pub fn decode_int(bytes: &[u8], datatype: &Datatype) -> Result<i64, FormatError> {
    let Datatype::FixedPoint {
        size,
        byte_order,
        signed,
        ..
    } = datatype
    else {
        return Err(FormatError::UnsupportedConversion("a non-integer element to i64"));
    };
    let n = *size as usize;
    if !(1..=8).contains(&n) {
        return Err(FormatError::UnsupportedConversion("an integer wider than 8 bytes"));
    }
    ensure_len(bytes, 0, n)?;
    let b = &bytes[..n];
    Ok(match (byte_order, signed) {
        (DatatypeByteOrder::BigEndian, true) => BigEndian::read_int(b, n),
        (DatatypeByteOrder::BigEndian, false) => BigEndian::read_uint(b, n) as i64,
        (_, true) => LittleEndian::read_int(b, n),
        (_, false) => LittleEndian::read_uint(b, n) as i64,
    })
}

/// Decode a packed buffer of integer elements.
pub fn decode_ints(bytes: &[u8], datatype: &Datatype) -> Result<Vec<i64>, FormatError> {
    let es = datatype.type_size() as usize;
    if es == 0 || bytes.len() % es != 0 {
        return Err(FormatError::DataSizeMismatch {
            expected: bytes.len().next_multiple_of(es.max(1)),
            actual: bytes.len(),
        });
    }
    bytes
        .chunks_exact(es)
        .map(|e| decode_int(e, datatype))
        .collect()
}

/// Decode one string element, fixed-length or variable-length.
///
/// Variable-length strings are looked up in the global heap of `data`.
pub fn decode_string(
    data: &[u8],
    bytes: &[u8],
    datatype: &Datatype,
    file: &FileLayout,
) -> Result<String, FormatError> {
    match datatype {
        Datatype::String { size, padding, .. } => {
            let n = *size as usize;
            ensure_len(bytes, 0, n)?;
            let raw = &bytes[..n];
            let raw = match padding {
                StringPadding::SpacePad => {
                    let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
                    &raw[..end]
                }
                _ => {
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(n);
                    &raw[..end]
                }
            };
            Ok(String::from_utf8_lossy(raw).into_owned())
        }
        Datatype::VariableLength {
            is_string: true, ..
        } => {
            let reference = VlenReference::parse(bytes, file.offset_size)?;
            read_vlen_string(data, &reference, file.length_size)
        }
        _ => Err(FormatError::UnsupportedConversion("a non-string element to String")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: FileLayout = FileLayout {
        offset_size: 8,
        length_size: 8,
        verify_checksums: true,
    };

    fn i32_le() -> Datatype {
        Datatype::FixedPoint {
            size: 4,
            byte_order: DatatypeByteOrder::LittleEndian,
            signed: true,
            bit_offset: 0,
            bit_precision: 32,
        }
    }

    fn matrix(rows: u64, cols: u64) -> Vec<u8> {
        (0..rows * cols)
            .flat_map(|v| (v as i32).to_le_bytes())
            .collect()
    }

    #[test]
    fn contiguous_row() {
        let mut data = vec![0u8; 64];
        data.extend(matrix(3, 5));
        let layout = DataLayout::Contiguous {
            address: Some(64),
            size: 60,
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[3, 5],
            element_size: 4,
        };
        let row = read_hyperslab(&data, &storage, &Hyperslab::row(1, 5), &FILE).unwrap();
        assert_eq!(decode_ints(&row, &i32_le()).unwrap(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn unallocated_reads_zeros() {
        let layout = DataLayout::Contiguous {
            address: None,
            size: 0,
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[2, 2],
            element_size: 4,
        };
        assert_eq!(read_raw(&[], &storage, &FILE).unwrap(), vec![0u8; 16]);
    }

    #[test]
    fn implicit_chunks_with_partial_edge() {
        // 3x5 dataset in 2x2 chunks: a 2x3 grid of 16-byte chunks
        let full = matrix(3, 5);
        let value = |r: u64, c: u64| -> [u8; 4] {
            if r < 3 && c < 5 {
                let at = ((r * 5 + c) * 4) as usize;
                [full[at], full[at + 1], full[at + 2], full[at + 3]]
            } else {
                [0xEE; 4]
            }
        };
        let mut data = Vec::new();
        for cr in 0..2 {
            for cc in 0..3 {
                for r in 0..2 {
                    for c in 0..2 {
                        data.extend(value(cr * 2 + r, cc * 2 + c));
                    }
                }
            }
        }
        let layout = DataLayout::Chunked {
            chunk_dimensions: vec![2, 2],
            element_size: 4,
            index: ChunkIndex::Implicit { address: Some(0) },
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[3, 5],
            element_size: 4,
        };
        assert_eq!(read_raw(&data, &storage, &FILE).unwrap(), full);
        let row = read_hyperslab(&data, &storage, &Hyperslab::row(2, 5), &FILE).unwrap();
        assert_eq!(decode_ints(&row, &i32_le()).unwrap(), vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn extent_larger_than_contiguous_storage() {
        let mut data = vec![0u8; 64];
        data.extend(matrix(3, 5));
        let layout = DataLayout::Contiguous {
            address: Some(64),
            size: 60,
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[3, 1 << 50],
            element_size: 4,
        };
        let err = read_hyperslab(&data, &storage, &Hyperslab::row(0, 1 << 50), &FILE).unwrap_err();
        assert!(matches!(err, FormatError::DataSizeMismatch { actual: 60, .. }));
        assert!(matches!(
            read_raw(&data, &storage, &FILE),
            Err(FormatError::DataSizeMismatch { .. })
        ));
    }

    #[test]
    fn compact_shorter_than_extent() {
        let layout = DataLayout::Compact { data: vec![0; 4] };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[2],
            element_size: 4,
        };
        assert_eq!(
            read_raw(&[], &storage, &FILE),
            Err(FormatError::DataSizeMismatch {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn unallocated_extent_is_bounded() {
        let layout = DataLayout::Contiguous {
            address: None,
            size: 0,
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[1 << 40],
            element_size: 4,
        };
        let err = read_raw(&[0; 16], &storage, &FILE).unwrap_err();
        assert!(matches!(err, FormatError::ExtentTooLarge { requested, .. } if requested == 4 << 40));
    }

    #[test]
    fn overflowing_extent() {
        let layout = DataLayout::Contiguous {
            address: None,
            size: 0,
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[u64::MAX, 2],
            element_size: 4,
        };
        let sel = Hyperslab::new(vec![0, 0], vec![1, 1]);
        assert_eq!(
            read_hyperslab(&[], &storage, &sel, &FILE),
            Err(FormatError::SizeOverflow("dataset size"))
        );
    }

    #[test]
    fn implicit_chunks_past_end_of_file() {
        // a 15x3 grid of 16-byte chunks in a 96-byte file
        let layout = DataLayout::Chunked {
            chunk_dimensions: vec![2, 2],
            element_size: 4,
            index: ChunkIndex::Implicit { address: Some(0) },
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[30, 5],
            element_size: 4,
        };
        let err = read_hyperslab(&[0; 96], &storage, &Hyperslab::row(0, 5), &FILE).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { expected: 720, .. }));
    }

    #[test]
    fn block_arithmetic_overflow() {
        let sel = Hyperslab::new(vec![0], vec![1]);
        assert_eq!(
            intersects(&[u64::MAX], &[2], &sel),
            Err(FormatError::SizeOverflow("block bounds"))
        );
        assert_eq!(
            row_major_strides(&[1, u64::MAX, 2]),
            Err(FormatError::SizeOverflow("block strides"))
        );
        assert_eq!(row_major_strides(&[3, 4, 5]), Ok(vec![20, 5, 1]));
    }

    #[test]
    fn compact_scalar() {
        let layout = DataLayout::Compact {
            data: 7i32.to_le_bytes().to_vec(),
        };
        let storage = DatasetStorage {
            layout: &layout,
            pipeline: None,
            dimensions: &[],
            element_size: 4,
        };
        let raw = read_raw(&[], &storage, &FILE).unwrap();
        assert_eq!(decode_int(&raw, &i32_le()).unwrap(), 7);
    }

    #[test]
    fn integer_widths_and_orders() {
        let u16_be = Datatype::FixedPoint {
            size: 2,
            byte_order: DatatypeByteOrder::BigEndian,
            signed: false,
            bit_offset: 0,
            bit_precision: 16,
        };
        assert_eq!(decode_int(&[0xFF, 0xFE], &u16_be).unwrap(), 0xFFFE);
        let i16_be = Datatype::FixedPoint {
            size: 2,
            byte_order: DatatypeByteOrder::BigEndian,
            signed: true,
            bit_offset: 0,
            bit_precision: 16,
        };
        assert_eq!(decode_int(&[0xFF, 0xFE], &i16_be).unwrap(), -2);
        assert_eq!(decode_ints(&(-5i32).to_le_bytes(), &i32_le()).unwrap(), vec![-5]);
        assert!(decode_ints(&[0; 5], &i32_le()).is_err());
    }

    #[test]
    fn fixed_strings() {
        let space = Datatype::String {
            size: 6,
            padding: StringPadding::SpacePad,
            charset: crate::datatype::CharacterSet::Ascii,
        };
        assert_eq!(decode_string(&[], b"ab    ", &space, &FILE).unwrap(), "ab");
        let nul = Datatype::String {
            size: 4,
            padding: StringPadding::NullPad,
            charset: crate::datatype::CharacterSet::Ascii,
        };
        assert_eq!(decode_string(&[], b"mV\0\0", &nul, &FILE).unwrap(), "mV");
        assert!(decode_string(&[], b"1234", &i32_le(), &FILE).is_err());
    }
}
