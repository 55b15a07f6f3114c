//! HDF5 dataspace message parsing (message type 0x0001).

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::bytes::{ensure_len, read_uint};
use crate::error::FormatError;

/// Dataspace class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    /// A single element.
    Scalar,
    /// A regular N-dimensional array.
    Simple,
    /// No elements at all.
    Null,
}

/// Parsed dataspace: the shape of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    /// Class of the dataspace.
    pub space_type: DataspaceType,
    /// Current dimension sizes (empty for scalar and null spaces).
    pub dimensions: Vec<u64>,
    /// Maximum dimension sizes, when stored (`u64::MAX` means unlimited).
    pub max_dimensions: Option<Vec<u64>>,
}

impl Dataspace {
    /// Parse a dataspace message. `length_size` comes from the superblock.
    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let flags = data[2];
        let ls = length_size as usize;

        let (space_type, mut pos) = match version {
            // version(1) rank(1) flags(1) reserved(1) reserved(4)
            1 => {
                let ty = if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                };
                (ty, 8)
            }
            // version(1) rank(1) flags(1) type(1)
            2 => {
                let ty = match data[3] {
                    0 => DataspaceType::Scalar,
                    1 => DataspaceType::Simple,
                    2 => DataspaceType::Null,
                    _ => return Err(FormatError::InvalidDataspaceVersion(version)),
                };
                (ty, 4)
            }
            v => return Err(FormatError::InvalidDataspaceVersion(v)),
        };

        let read_dims = |pos: &mut usize| -> Result<Vec<u64>, FormatError> {
            let dims = (0..rank)
                .map(|i| read_uint(data, *pos + i * ls, ls))
                .collect::<Result<Vec<_>, _>>()?;
            *pos += rank * ls;
            Ok(dims)
        };

        let dimensions = read_dims(&mut pos)?;
        let max_dimensions = if flags & 0x01 != 0 {
            Some(read_dims(&mut pos)?)
        } else {
            None
        };

        Ok(Dataspace {
            space_type,
            dimensions,
            max_dimensions,
        })
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Total number of elements, saturating at `u64::MAX`.
    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self
                .dimensions
                .iter()
                .fold(1u64, |acc, &d| acc.saturating_mul(d)),
        }
    }

    /// Whether the dataspace is scalar or simple (anything but null).
    pub fn is_simple(&self) -> bool {
        self.space_type != DataspaceType::Null
    }
}
