//! Reversing a filter pipeline on a stored chunk: deflate, shuffle and
//! fletcher32.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;
use crate::filter_pipeline::{
    FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE,
};

/// Undo the pipeline on one stored chunk.
///
/// Filters run in reverse of the order they were applied. Bit `i` of
/// `filter_mask` marks filter `i` as skipped for this chunk.
pub fn decode_chunk(
    stored: &[u8],
    pipeline: &FilterPipeline,
    filter_mask: u32,
    element_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut data = stored.to_vec();
    for (i, filter) in pipeline.filters.iter().enumerate().rev() {
        if i < 32 && filter_mask & (1 << i) != 0 {
            continue;
        }
        data = match filter.filter_id {
            FILTER_DEFLATE => inflate(&data)?,
            FILTER_SHUFFLE => unshuffle(&data, element_size),
            FILTER_FLETCHER32 => strip_fletcher32(data)?,
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(data)
}

#[cfg(feature = "deflate")]
fn inflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    use std::io::Read;
    let mut out = Vec::with_capacity(data.len() * 4);
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| FormatError::DecompressionError(e.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
fn inflate(_data: &[u8]) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::UnsupportedFilter(FILTER_DEFLATE))
}

/// The shuffle filter stores byte 0 of every element, then byte 1, and so
/// on. Trailing bytes that do not fill an element are left in place.
fn unshuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let count = data.len() / element_size;
    let mut out = data.to_vec();
    for byte in 0..element_size {
        let plane = &data[byte * count..(byte + 1) * count];
        for (elem, &b) in plane.iter().enumerate() {
            out[elem * element_size + byte] = b;
        }
    }
    out
}

/// Fletcher32 over big-endian 16-bit words, as the HDF5 library computes it.
pub fn fletcher32(data: &[u8]) -> u32 {
    let fold = |x: u32| (x & 0xFFFF) + (x >> 16);
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    let words = data.chunks_exact(2);
    let odd = words.remainder().first().copied();
    // 360 words keep the running sums from overflowing before folding.
    let pairs: Vec<u32> = words
        .map(|w| u32::from(w[0]) << 8 | u32::from(w[1]))
        .collect();
    for block in pairs.chunks(360) {
        for &w in block {
            sum1 += w;
            sum2 += sum1;
        }
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    if let Some(b) = odd {
        sum1 += u32::from(b) << 8;
        sum2 += sum1;
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    sum1 = fold(sum1);
    sum2 = fold(sum2);
    (sum2 << 16) | sum1
}

fn strip_fletcher32(mut data: Vec<u8>) -> Result<Vec<u8>, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::UnexpectedEof {
            expected: 4,
            available: data.len(),
        });
    }
    let body_len = data.len() - 4;
    let tail = [
        data[body_len],
        data[body_len + 1],
        data[body_len + 2],
        data[body_len + 3],
    ];
    let computed = fletcher32(&data[..body_len]);
    let stored = u32::from_le_bytes(tail);
    // Files from old library versions stored the sum byte-swapped.
    if stored != computed && stored.swap_bytes() != computed {
        return Err(FormatError::Fletcher32Mismatch {
            expected: stored,
            computed,
        });
    }
    data.truncate(body_len);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_pipeline::FilterDescription;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(6));
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn shuffle(data: &[u8], size: usize) -> Vec<u8> {
        let count = data.len() / size;
        let mut out = vec![0u8; data.len()];
        for e in 0..count {
            for b in 0..size {
                out[b * count + e] = data[e * size + b];
            }
        }
        out
    }

    fn pipeline(ids: &[u16]) -> FilterPipeline {
        FilterPipeline {
            filters: ids
                .iter()
                .map(|&filter_id| FilterDescription {
                    filter_id,
                    name: None,
                    flags: 0,
                    client_data: vec![],
                })
                .collect(),
        }
    }

    fn samples() -> Vec<u8> {
        (0..64i32).flat_map(|v| (v * 1000 - 7).to_le_bytes()).collect()
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn deflate_only() {
        let raw = samples();
        let out = decode_chunk(&zlib(&raw), &pipeline(&[FILTER_DEFLATE]), 0, 4).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn shuffle_then_deflate() {
        let raw = samples();
        let stored = zlib(&shuffle(&raw, 4));
        let out = decode_chunk(
            &stored,
            &pipeline(&[FILTER_SHUFFLE, FILTER_DEFLATE]),
            0,
            4,
        )
        .unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn masked_filter_is_skipped() {
        let raw = samples();
        // deflate (filter 0) was skipped for this chunk
        let out = decode_chunk(&raw, &pipeline(&[FILTER_DEFLATE]), 0b1, 4).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn fletcher32_is_verified_and_stripped() {
        let raw = samples();
        let mut stored = raw.clone();
        stored.extend_from_slice(&fletcher32(&raw).to_le_bytes());
        let out = decode_chunk(&stored, &pipeline(&[FILTER_FLETCHER32]), 0, 4).unwrap();
        assert_eq!(out, raw);

        stored[3] ^= 0x55;
        assert!(matches!(
            decode_chunk(&stored, &pipeline(&[FILTER_FLETCHER32]), 0, 4),
            Err(FormatError::Fletcher32Mismatch { .. })
        ));
    }

    #[test]
    fn fletcher32_odd_length() {
        // Single trailing byte counts as the high half of a word.
        assert_eq!(fletcher32(&[0x01]), fletcher32(&[0x01, 0x00]));
        assert_eq!(fletcher32(&[0x00, 0x01]), 0x0001_0001);
    }

    #[test]
    fn unsupported_filter() {
        assert_eq!(
            decode_chunk(&[0; 8], &pipeline(&[32001]), 0, 4),
            Err(FormatError::UnsupportedFilter(32001))
        );
    }

    #[test]
    fn unshuffle_keeps_partial_tail() {
        let mut data = shuffle(&[1, 2, 3, 4, 5, 6], 2);
        data.push(9);
        assert_eq!(unshuffle(&data, 2), vec![1, 2, 3, 4, 5, 6, 9]);
    }
}
