//! Rectangular (hyperslab) selections over a dataset's extent.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::error::FormatError;

/// A block of `count` elements starting at `start`, per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    /// First selected index per dimension.
    pub start: Vec<u64>,
    /// Number of selected indices per dimension.
    pub count: Vec<u64>,
}

impl Hyperslab {
    /// Select `count` elements from `start`.
    pub fn new(start: Vec<u64>, count: Vec<u64>) -> Hyperslab {
        Hyperslab { start, count }
    }

    /// Select the whole extent.
    pub fn all(dimensions: &[u64]) -> Hyperslab {
        Hyperslab {
            start: vec![0; dimensions.len()],
            count: dimensions.to_vec(),
        }
    }

    /// Select row `row` of a two-dimensional dataset with `columns` columns.
    pub fn row(row: u64, columns: u64) -> Hyperslab {
        Hyperslab {
            start: vec![row, 0],
            count: vec![1, columns],
        }
    }

    /// Number of selected elements, saturating at `u64::MAX`.
    pub fn num_elements(&self) -> u64 {
        self.count.iter().fold(1u64, |acc, &c| acc.saturating_mul(c))
    }

    /// Check the selection fits inside `dimensions`.
    pub fn validate(&self, dimensions: &[u64]) -> Result<(), FormatError> {
        if self.start.len() != dimensions.len() || self.count.len() != dimensions.len() {
            return Err(FormatError::SelectionRankMismatch {
                selection: self.start.len().max(self.count.len()),
                dataset: dimensions.len(),
            });
        }
        for (dim, ((&start, &count), &extent)) in self
            .start
            .iter()
            .zip(&self.count)
            .zip(dimensions)
            .enumerate()
        {
            let fits = start.checked_add(count).is_some_and(|end| end <= extent);
            if !fits {
                return Err(FormatError::SelectionOutOfBounds {
                    dim,
                    start,
                    count,
                    extent,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_of_matrix() {
        let sel = Hyperslab::row(2, 1000);
        assert_eq!(sel.num_elements(), 1000);
        assert!(sel.validate(&[3, 1000]).is_ok());
        assert_eq!(
            sel.validate(&[2, 1000]),
            Err(FormatError::SelectionOutOfBounds {
                dim: 0,
                start: 2,
                count: 1,
                extent: 2
            })
        );
    }

    #[test]
    fn rank_must_match() {
        assert_eq!(
            Hyperslab::row(0, 4).validate(&[4]),
            Err(FormatError::SelectionRankMismatch {
                selection: 2,
                dataset: 1
            })
        );
    }

    #[test]
    fn whole_extent_and_scalar() {
        let sel = Hyperslab::all(&[4, 5]);
        assert_eq!(sel.num_elements(), 20);
        assert!(sel.validate(&[4, 5]).is_ok());
        let scalar = Hyperslab::all(&[]);
        assert_eq!(scalar.num_elements(), 1);
        assert!(scalar.validate(&[]).is_ok());
    }

    #[test]
    fn overflowing_start_is_rejected() {
        let sel = Hyperslab::new(vec![u64::MAX], vec![2]);
        assert!(sel.validate(&[10]).is_err());
    }
}
