//! HDF5 filter pipeline message parsing (message type 0x000B).

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::bytes::{ensure_len, pad8, read_u16, read_u32};
use crate::error::FormatError;

/// zlib deflate.
pub const FILTER_DEFLATE: u16 = 1;
/// Byte shuffle.
pub const FILTER_SHUFFLE: u16 = 2;
/// Fletcher32 checksum appended to each chunk.
pub const FILTER_FLETCHER32: u16 = 3;

/// One filter of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescription {
    /// Filter identification value.
    pub filter_id: u16,
    /// Optional filter name.
    pub name: Option<String>,
    /// Filter flags (bit 0 = optional).
    pub flags: u16,
    /// Client data values passed to the filter.
    pub client_data: Vec<u32>,
}

impl FilterDescription {
    /// An optional filter may be skipped when it fails on write.
    pub fn is_optional(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// The filters applied, in order, when chunks were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPipeline {
    /// Ordered list of filters.
    pub filters: Vec<FilterDescription>,
}

fn trimmed_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl FilterPipeline {
    /// Parse a filter pipeline message.
    pub fn parse(data: &[u8]) -> Result<FilterPipeline, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let count = data[1] as usize;
        // v1 has six reserved bytes after the count
        let mut pos = match version {
            1 => 8,
            2 => 2,
            v => return Err(FormatError::InvalidFilterPipelineVersion(v)),
        };

        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter_id = read_u16(data, pos)?;
            pos += 2;
            // v2 omits the name length for library-defined filters
            let name_len = if version == 1 || filter_id >= 256 {
                let n = read_u16(data, pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = read_u16(data, pos)?;
            let n_values = read_u16(data, pos + 2)? as usize;
            pos += 4;

            let name = if name_len > 0 {
                ensure_len(data, pos, name_len)?;
                let name = trimmed_name(&data[pos..pos + name_len]);
                pos += if version == 1 { pad8(name_len) } else { name_len };
                Some(name)
            } else {
                None
            };

            let client_data = (0..n_values)
                .map(|i| read_u32(data, pos + 4 * i))
                .collect::<Result<Vec<_>, _>>()?;
            pos += 4 * n_values;
            if version == 1 && n_values % 2 == 1 {
                pos += 4;
            }

            filters.push(FilterDescription {
                filter_id,
                name,
                flags,
                client_data,
            });
        }

        Ok(FilterPipeline { filters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_deflate_and_shuffle() {
        let mut buf = vec![2, 2];
        buf.extend_from_slice(&FILTER_SHUFFLE.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&FILTER_DEFLATE.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&6u32.to_le_bytes());

        let p = FilterPipeline::parse(&buf).unwrap();
        assert_eq!(p.filters.len(), 2);
        assert_eq!(p.filters[0].filter_id, FILTER_SHUFFLE);
        assert_eq!(p.filters[0].client_data, vec![4]);
        assert_eq!(p.filters[1].filter_id, FILTER_DEFLATE);
        assert!(p.filters[1].is_optional());
        assert_eq!(p.filters[1].client_data, vec![6]);
    }

    #[test]
    fn v1_named_filter_with_odd_client_data() {
        let mut buf = vec![1, 2, 0, 0, 0, 0, 0, 0];
        buf.extend_from_slice(&FILTER_DEFLATE.to_le_bytes());
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(b"deflate\0");
        buf.extend_from_slice(&9u32.to_le_bytes());
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(&FILTER_FLETCHER32.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());

        let p = FilterPipeline::parse(&buf).unwrap();
        assert_eq!(p.filters[0].name.as_deref(), Some("deflate"));
        assert_eq!(p.filters[0].client_data, vec![9]);
        assert_eq!(p.filters[1].filter_id, FILTER_FLETCHER32);
        assert!(p.filters[1].client_data.is_empty());
    }

    #[test]
    fn unknown_version() {
        assert_eq!(
            FilterPipeline::parse(&[3, 0]),
            Err(FormatError::InvalidFilterPipelineVersion(3))
        );
    }
}
