/*
    toyboxtool - A Toybox save container parser, verifier and editor
    Copyright (C) 2025 toyboxtool contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Bob Jenkins' lookup2 `hash()`, as used for both CMP1 checksums.

use byteorder::{ByteOrder, LittleEndian};

//golden ratio, arbitrary value from the reference implementation
const GOLDEN_RATIO: u32 = 0x9e37_79b9;

#[inline]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*b).wrapping_sub(*c); *a ^= *c >> 13;
    *b = b.wrapping_sub(*c).wrapping_sub(*a); *b ^= *a << 8;
    *c = c.wrapping_sub(*a).wrapping_sub(*b); *c ^= *b >> 13;
    *a = a.wrapping_sub(*b).wrapping_sub(*c); *a ^= *c >> 12;
    *b = b.wrapping_sub(*c).wrapping_sub(*a); *b ^= *a << 16;
    *c = c.wrapping_sub(*a).wrapping_sub(*b); *c ^= *b >> 5;
    *a = a.wrapping_sub(*b).wrapping_sub(*c); *a ^= *c >> 3;
    *b = b.wrapping_sub(*c).wrapping_sub(*a); *b ^= *a << 10;
    *c = c.wrapping_sub(*a).wrapping_sub(*b); *c ^= *b >> 15;
}

/// Hashes `data` with `length` folded into the final round.
///
/// `length` is normally `data.len()`; it is taken separately because the
/// reference function does, and the container always passes the byte count.
#[must_use]
pub fn hash(data: &[u8], length: u32, seed: u32) -> u32 {
    let (mut a, mut b, mut c) = (GOLDEN_RATIO, GOLDEN_RATIO, seed);

    let mut groups = data.chunks_exact(12);
    for k in &mut groups {
        a = a.wrapping_add(LittleEndian::read_u32(&k[0..4]));
        b = b.wrapping_add(LittleEndian::read_u32(&k[4..8]));
        c = c.wrapping_add(LittleEndian::read_u32(&k[8..12]));
        mix(&mut a, &mut b, &mut c);
    }

    c = c.wrapping_add(length);
    // the low byte of c is reserved for the length
    for (i, &byte) in groups.remainder().iter().enumerate() {
        let byte = u32::from(byte);
        match i {
            0..=3  => a = a.wrapping_add(byte << (8 * i)),
            4..=7  => b = b.wrapping_add(byte << (8 * (i - 4))),
            _      => c = c.wrapping_add(byte << (8 * (i - 7))),
        }
    }
    mix(&mut a, &mut b, &mut c);
    c
}

/// Checksum of a whole buffer with seed 0, the form stored in CMP1 headers.
///
/// The length word is 32 bits wide, buffers past 4 GiB fold in `len mod 2^32`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn checksum(data: &[u8]) -> u32 {
    hash(data, data.len() as u32, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(hash(b"", 0, 0), 0xbd49_d10d);
        assert_eq!(hash(b"", 0, 1), 0x6ddf_b8c9);
        assert_eq!(checksum(b"a"), 0x29ee_c818);
        assert_eq!(checksum(b"abc"), 0x251e_4793);
        assert_eq!(checksum(b"hello world"), 0x1aa9_19e6);
        assert_eq!(checksum(b"Four score and seven years ago"), 0x50f2_424b);
        assert_eq!(hash(b"Four score and seven years ago", 30, 1), 0x89de_ae7e);
    }

    #[test]
    fn exact_group_has_no_tail() {
        let data: Vec<u8> = (0..12).collect();
        assert_eq!(checksum(&data), 0x99bd_d9ef);
    }

    #[test]
    fn checksum_is_seed_zero_over_full_length() {
        let data = b"Four score and seven years ago";
        assert_eq!(checksum(data), hash(data, 30, 0));
        assert_ne!(checksum(data), hash(data, 29, 0));
    }

    #[test]
    fn single_byte_change_changes_hash() {
        let mut data = b"AUTHOREDNAME = \"My Toybox\"".to_vec();
        let before = checksum(&data);
        assert_eq!(before, checksum(&data));
        data[5] ^= 1;
        assert_ne!(before, checksum(&data));
    }
}
