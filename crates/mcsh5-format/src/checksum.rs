//! HDF5 metadata checksum: Jenkins lookup3 `hashlittle` with a zero seed.
//!
//! Version 2 superblocks, version 2 object headers and their continuation
//! chunks end in this checksum.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Compute the lookup3 checksum HDF5 stores after metadata blocks.
pub fn jenkins_lookup3(data: &[u8]) -> u32 {
    let init = 0xdead_beef_u32.wrapping_add(data.len() as u32);
    let mut s = State {
        a: init,
        b: init,
        c: init,
    };

    let mut rest = data;
    while rest.len() > 12 {
        s.absorb(&rest[..12]);
        s.mix();
        rest = &rest[12..];
    }

    if rest.is_empty() {
        return s.c;
    }

    // Missing tail bytes contribute zero, which is what the byte-wise
    // fall-through of the reference code adds as well.
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    s.absorb(&tail);
    s.finish();
    s.c
}

/// Verify the checksum stored in the four bytes that follow `block`.
pub fn verify_trailing(block: &[u8], stored: u32) -> Result<(), FormatError> {
    let computed = jenkins_lookup3(block);
    if computed == stored {
        Ok(())
    } else {
        Err(FormatError::ChecksumMismatch {
            expected: stored,
            computed,
        })
    }
}

struct State {
    a: u32,
    b: u32,
    c: u32,
}

impl State {
    fn absorb(&mut self, block: &[u8]) {
        self.a = self.a.wrapping_add(LittleEndian::read_u32(&block[0..4]));
        self.b = self.b.wrapping_add(LittleEndian::read_u32(&block[4..8]));
        self.c = self.c.wrapping_add(LittleEndian::read_u32(&block[8..12]));
    }

    fn mix(&mut self) {
        let State { a, b, c } = self;
        *a = a.wrapping_sub(*c) ^ c.rotate_left(4);
        *c = c.wrapping_add(*b);
        *b = b.wrapping_sub(*a) ^ a.rotate_left(6);
        *a = a.wrapping_add(*c);
        *c = c.wrapping_sub(*b) ^ b.rotate_left(8);
        *b = b.wrapping_add(*a);
        *a = a.wrapping_sub(*c) ^ c.rotate_left(16);
        *c = c.wrapping_add(*b);
        *b = b.wrapping_sub(*a) ^ a.rotate_left(19);
        *a = a.wrapping_add(*c);
        *c = c.wrapping_sub(*b) ^ b.rotate_left(4);
        *b = b.wrapping_add(*a);
    }

    fn finish(&mut self) {
        let State { a, b, c } = self;
        *c = (*c ^ *b).wrapping_sub(b.rotate_left(14));
        *a = (*a ^ *c).wrapping_sub(c.rotate_left(11));
        *b = (*b ^ *a).wrapping_sub(a.rotate_left(25));
        *c = (*c ^ *b).wrapping_sub(b.rotate_left(16));
        *a = (*a ^ *c).wrapping_sub(c.rotate_left(4));
        *b = (*b ^ *a).wrapping_sub(a.rotate_left(14));
        *c = (*c ^ *b).wrapping_sub(b.rotate_left(24));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(jenkins_lookup3(b""), 0xdead_beef);
    }

    #[test]
    fn reference_vector() {
        // Test vector published with lookup3.c (hashlittle, initval 0).
        assert_eq!(
            jenkins_lookup3(b"Four score and seven years ago"),
            0x1777_0551
        );
    }

    #[test]
    fn every_tail_length_is_distinct() {
        let data: Vec<u8> = (1..=25).collect();
        let hashes: Vec<u32> = (0..=25).map(|n| jenkins_lookup3(&data[..n])).collect();
        for i in 0..hashes.len() {
            for j in i + 1..hashes.len() {
                assert_ne!(hashes[i], hashes[j], "lengths {i} and {j} collide");
            }
        }
    }

    #[test]
    fn verify_trailing_reports_both_values() {
        let block = b"OHDR\x02\x00";
        let good = jenkins_lookup3(block);
        assert!(verify_trailing(block, good).is_ok());
        assert_eq!(
            verify_trailing(block, good ^ 1),
            Err(FormatError::ChecksumMismatch {
                expected: good ^ 1,
                computed: good
            })
        );
    }
}
