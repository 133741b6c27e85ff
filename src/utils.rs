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

pub use {
    binrw::{binrw, io::Cursor, BinReaderExt, BinWrite},
    std::{borrow::Cow, fmt, fs::write, ops::Range, str::from_utf8},
};

//utility macros

//generate a struct from a slice of bytes, using binrw, propagating the error
#[macro_export]
macro_rules! read_struct {
    ($t: ty, $arr: expr) => {
        $crate::utils::Cursor::new($arr).read_le::<$t>()
    };
}

//write a binrw struct to a growable buffer
#[macro_export]
macro_rules! struct_write {
    ($str: expr, $arr: expr) => {
        $str.write(&mut $crate::utils::Cursor::new(&mut $arr))
    };
}

//utility functions

//write a buffer to a file with the specified path
/// # Panics
/// Panics if the file cannot be written into
pub fn write_file(path: &str, arr: &[u8]) {
    write(path, arr).unwrap_or_else(|e| panic!("Unable to write to \"{path}\": {e}"));
}

//create a range from the start and size
#[must_use]
pub const fn range_size(start: usize, size: usize) -> Range<usize> {
    start..start + size
}

//round up to the next multiple of align
#[must_use]
pub const fn align_up(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

//print a 4cc if it is printable, hex otherwise
#[must_use]
pub fn fourcc(arr: &[u8]) -> Cow<'_, str> {
    if arr.iter().all(|c| 31 < *c && *c < 127) {
        Cow::from(from_utf8(arr).unwrap_or_default())
    } else {
        Cow::from(format!("{arr:02x?}"))
    }
}

pub const CMP1_MAGIC: [u8; 4] = *b"CMP1";

pub const LEADING_HEADER_SIZE: usize = 0x40; // CMP1 always starts here in files we write
pub const CMP1_HEADER_SIZE: usize = 0x14;
pub const BLOCK_ALIGN: usize = 0x40;

// leading header fields that are rewritten on recompress
pub const FILE_SIZE_OFFSET: usize = 0x4;
pub const UNCOMPRESSED_SIZE_OFFSET: usize = 0xC;
pub const BLOCK_SIZE_OFFSET: usize = 0x10;

pub const ZLIB_LEVEL: u32 = 1;

pub const SCREENSHOT_WIDTH: u32 = 384;
pub const SCREENSHOT_HEIGHT: u32 = 208;

pub const SAVE_ENTRY_PREFIXES: [&str; 2] = ["SCCA", "SCCB"];
pub const RESERVED_SUFFIX: &str = ".bak";

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingHeader {
    pub version: [u8; 4],
    pub file_size: u32,
    pub unknown1: [u8; 4],   // opaque, passed through
    pub uncompressed_size: u32,
    pub block_size: u32,     // sub-header + zlib stream + padding
    pub unknown2: [u8; 0x2C], // opaque, passed through
}

impl Default for LeadingHeader {
    fn default() -> Self {
        Self {
            version: [0; 4],
            file_size: 0,
            unknown1: [0; 4],
            uncompressed_size: 0,
            block_size: 0,
            unknown2: [0; 0x2C],
        }
    }
}

impl fmt::Display for LeadingHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Leading Header:\n\tVersion: {:02X?}\n\tFile Size: {:#X}\n\tUnknown: \
             {:02X?}\n\tUncompressed Size: {:#X}\n\tBlock Size: {:#X}",
            self.version,
            self.file_size,
            self.unknown1,
            self.uncompressed_size,
            self.block_size,
        )
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cmp1Header {
    pub magic: [u8; 4],
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub uncompressed_check: u32, // lookup2 of the inflated payload
    pub compressed_check: u32,   // lookup2 of the zlib stream
}

impl fmt::Display for Cmp1Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CMP1 Header:\n\tMagic: {}\n\tUncompressed Size: {:#X}\n\tCompressed Size: \
             {:#X}\n\tUncompressed Checksum: {:#X}\n\tCompressed Checksum: {:#X}",
            fourcc(&self.magic),
            self.uncompressed_size,
            self.compressed_size,
            self.uncompressed_check,
            self.compressed_check
        )
    }
}
