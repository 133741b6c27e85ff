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

//! The CMP1 save container.
//!
//! ```text
//! 0x00  leading header (64 bytes, mostly opaque)
//! 0x40  "CMP1" | uncompressed size | compressed size | uncompressed check | compressed check
//! 0x54  zlib stream
//!       zero padding up to a 64 byte boundary (counted from 0x40)
//! ```

use {
    crate::{
        checksum::checksum,
        error::{Error, Result},
        utils::*,
    },
    byteorder::{ByteOrder, LittleEndian},
    flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression},
    log::debug,
    memchr::memmem,
    std::io::{Read, Write},
};

/// A parsed view over the raw bytes of one save container.
#[derive(Debug, Clone)]
pub struct SaveContainer<'a> {
    pub raw: &'a [u8],
    pub magic_offset: usize,
    pub head: Cmp1Header,
    pub compressed_payload: &'a [u8],
}

/// Result of checking a container against its own header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub uncompressed_size: bool,
    pub uncompressed_check: bool,
    pub compressed_check: bool,
    pub padding: bool,
}

impl Verification {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.uncompressed_size && self.uncompressed_check && self.compressed_check && self.padding
    }
}

impl<'a> SaveContainer<'a> {
    /// Locates the first CMP1 marker and slices out the zlib stream.
    ///
    /// # Errors
    /// `Error::Format` if the marker is missing or the buffer is too short for
    /// the sizes the sub-header claims.
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        let magic_offset = memmem::find(raw, &CMP1_MAGIC)
            .ok_or_else(|| Error::format("marker not found"))?;
        if raw.len() < magic_offset + CMP1_HEADER_SIZE {
            return Err(Error::format(format!(
                "buffer of {:#X} bytes too small for CMP1 header at {magic_offset:#X}",
                raw.len()
            )));
        }
        let head = read_struct!(Cmp1Header, &raw[range_size(magic_offset, CMP1_HEADER_SIZE)])?;

        let start = magic_offset + CMP1_HEADER_SIZE;
        let compressed_payload = raw
            .get(range_size(start, head.compressed_size as usize))
            .ok_or_else(|| {
                Error::format(format!(
                    "compressed size {:#X} runs past end of buffer ({:#X} bytes)",
                    head.compressed_size,
                    raw.len()
                ))
            })?;
        debug!(
            "CMP1 at {magic_offset:#X}, compressed {:#X}, uncompressed {:#X}",
            head.compressed_size, head.uncompressed_size
        );
        Ok(Self { raw, magic_offset, head, compressed_payload })
    }

    /// Inflates the payload and checks it against the declared size.
    ///
    /// # Errors
    /// `Error::Decompression` on a corrupt zlib stream, `Error::Format` if the
    /// inflated size disagrees with the header.
    pub fn inflate(&self) -> Result<Vec<u8>> {
        let payload = inflate_raw(self.compressed_payload, self.head.uncompressed_size as usize)?;
        if payload.len() != self.head.uncompressed_size as usize {
            return Err(Error::format(format!(
                "corrupt file: header says {:#X} uncompressed bytes, stream holds {:#X}",
                self.head.uncompressed_size,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Leading header, if the file has a full one before the marker.
    #[must_use]
    pub fn leading_header(&self) -> Option<LeadingHeader> {
        if self.magic_offset < LEADING_HEADER_SIZE {
            return None;
        }
        read_struct!(LeadingHeader, &self.raw[..LEADING_HEADER_SIZE]).ok()
    }

    /// Recomputes both checksums and the padding invariant.
    #[must_use]
    pub fn verify(&self) -> Verification {
        let (uncompressed_size, uncompressed_check) = match self.inflate() {
            Ok(payload) => (true, checksum(&payload) == self.head.uncompressed_check),
            Err(_) => (false, false),
        };
        let block_len = self.raw.len() - self.magic_offset;
        let used = CMP1_HEADER_SIZE + self.compressed_payload.len();
        let padding = block_len % BLOCK_ALIGN == 0
            && block_len - used < BLOCK_ALIGN
            && self.raw[self.magic_offset + used..].iter().all(|&b| b == 0);
        Verification {
            uncompressed_size,
            uncompressed_check,
            compressed_check: checksum(self.compressed_payload) == self.head.compressed_check,
            padding,
        }
    }
}

fn inflate_raw(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(Error::Decompression)?;
    Ok(out)
}

/// Returns the inflated payload of a raw container.
///
/// # Errors
/// See [`SaveContainer::parse`] and [`SaveContainer::inflate`].
pub fn decompress(raw: &[u8]) -> Result<Vec<u8>> {
    SaveContainer::parse(raw)?.inflate()
}

/// Builds a padded CMP1 block (sub-header, zlib stream, zero padding).
///
/// # Errors
/// Propagates zlib write errors, and `Error::Format` if the payload does not
/// fit the 32 bit size fields.
pub fn compress_block(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(ZLIB_LEVEL));
    encoder.write_all(payload)?;
    let compressed = encoder.finish()?;

    let head = Cmp1Header {
        magic: CMP1_MAGIC,
        uncompressed_size: to_u32(payload.len())?,
        compressed_size: to_u32(compressed.len())?,
        uncompressed_check: checksum(payload),
        compressed_check: checksum(&compressed),
    };

    let mut block = Vec::with_capacity(align_up(CMP1_HEADER_SIZE + compressed.len(), BLOCK_ALIGN));
    struct_write!(head, block)?;
    block.extend_from_slice(&compressed);
    block.resize(align_up(block.len(), BLOCK_ALIGN), 0);
    Ok(block)
}

/// Recompresses `payload` into a new container, using the leading header of
/// `original_raw` as the template.
///
/// The marker offset is always [`LEADING_HEADER_SIZE`]; file size, uncompressed
/// size and block size are rewritten, every other header byte is copied.
///
/// # Errors
/// `Error::Format` if `original_raw` is shorter than the leading header.
pub fn recompress(payload: &[u8], original_raw: &[u8]) -> Result<Vec<u8>> {
    let template = original_raw.get(..LEADING_HEADER_SIZE).ok_or_else(|| {
        Error::format(format!(
            "original file of {:#X} bytes has no {LEADING_HEADER_SIZE:#X} byte leading header",
            original_raw.len()
        ))
    })?;
    let block = compress_block(payload)?;
    let total = LEADING_HEADER_SIZE + block.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(template);
    LittleEndian::write_u32(&mut out[range_size(FILE_SIZE_OFFSET, 4)], to_u32(total)?);
    LittleEndian::write_u32(&mut out[range_size(UNCOMPRESSED_SIZE_OFFSET, 4)], to_u32(payload.len())?);
    LittleEndian::write_u32(&mut out[range_size(BLOCK_SIZE_OFFSET, 4)], to_u32(block.len())?);
    out.extend_from_slice(&block);
    out.truncate(total);
    debug!("recompressed {:#X} payload bytes into {total:#X} byte container", payload.len());
    Ok(out)
}

/// Builds a container from scratch, for payloads with no original file.
///
/// # Errors
/// See [`compress_block`].
pub fn create(version: [u8; 4], payload: &[u8]) -> Result<Vec<u8>> {
    let mut template = Vec::with_capacity(LEADING_HEADER_SIZE);
    struct_write!(LeadingHeader { version, ..Default::default() }, template)?;
    recompress(payload, &template)
}

fn to_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::format(format!("size {len:#X} does not fit in 32 bits")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"AUTHOREDNAME = \"Castle\"\nAUTHOREDDESC = \"A big \"\"castle\"\"\"\nSCREENSHOT = $00ff$\n";

    fn sample() -> Vec<u8> {
        create(*b"\x07\x00\x00\x00", PAYLOAD).unwrap()
    }

    #[test]
    fn round_trip() {
        let raw = sample();
        assert_eq!(decompress(&raw).unwrap(), PAYLOAD);
        let again = recompress(&decompress(&raw).unwrap(), &raw).unwrap();
        assert_eq!(decompress(&again).unwrap(), PAYLOAD);
        assert_eq!(again, raw);
    }

    #[test]
    fn layout_and_header_fields() {
        let raw = sample();
        let cont = SaveContainer::parse(&raw).unwrap();
        assert_eq!(cont.magic_offset, LEADING_HEADER_SIZE);
        assert_eq!(raw.len() % BLOCK_ALIGN, 0);

        let head = cont.leading_header().unwrap();
        assert_eq!(head.version, *b"\x07\x00\x00\x00");
        assert_eq!(head.file_size as usize, raw.len());
        assert_eq!(head.uncompressed_size as usize, PAYLOAD.len());
        assert_eq!(head.block_size as usize, raw.len() - LEADING_HEADER_SIZE);

        assert_eq!(cont.head.uncompressed_check, checksum(PAYLOAD));
        assert_eq!(cont.head.compressed_check, checksum(cont.compressed_payload));
        assert!(cont.verify().is_valid());
    }

    #[test]
    fn padding_is_under_one_block() {
        for len in [0usize, 1, 43, 44, 45, 500, 4096] {
            let payload = vec![b'x'; len];
            let block = compress_block(&payload).unwrap();
            let head = read_struct!(Cmp1Header, &block[..]).unwrap();
            let pad = block.len() - CMP1_HEADER_SIZE - head.compressed_size as usize;
            assert_eq!(block.len() % BLOCK_ALIGN, 0);
            assert!(pad < BLOCK_ALIGN);
            assert!(block[block.len() - pad..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn opaque_header_bytes_are_kept() {
        let mut raw = sample();
        raw[8..12].copy_from_slice(b"OPAQ");
        raw[0x20] = 0xAB;
        let again = recompress(b"new payload", &raw).unwrap();
        assert_eq!(&again[8..12], b"OPAQ");
        assert_eq!(again[0x20], 0xAB);
        assert_eq!(&again[..4], &raw[..4]);
        assert_eq!(decompress(&again).unwrap(), b"new payload");
    }

    #[test]
    fn missing_marker() {
        let mut raw = sample();
        raw[LEADING_HEADER_SIZE] = b'X';
        assert!(matches!(decompress(&raw), Err(Error::Format(m)) if m == "marker not found"));
    }

    #[test]
    fn truncated_payload() {
        let raw = sample();
        let cont = SaveContainer::parse(&raw).unwrap();
        let cut = cont.magic_offset + CMP1_HEADER_SIZE + cont.compressed_payload.len() - 1;
        assert!(matches!(SaveContainer::parse(&raw[..cut]), Err(Error::Format(_))));
    }

    #[test]
    fn corrupt_stream() {
        let mut raw = sample();
        raw[LEADING_HEADER_SIZE + CMP1_HEADER_SIZE] ^= 0xFF; // zlib CMF byte
        assert!(matches!(decompress(&raw), Err(Error::Decompression(_))));
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let mut raw = sample();
        let off = LEADING_HEADER_SIZE + 4;
        let size = LittleEndian::read_u32(&raw[range_size(off, 4)]);
        LittleEndian::write_u32(&mut raw[range_size(off, 4)], size + 1);
        assert!(matches!(decompress(&raw), Err(Error::Format(_))));
    }

    #[test]
    fn verify_flags_tampered_checksum() {
        let mut raw = sample();
        raw[LEADING_HEADER_SIZE + 16] ^= 1;
        let ver = SaveContainer::parse(&raw).unwrap().verify();
        assert!(ver.uncompressed_check);
        assert!(!ver.compressed_check);
        assert!(!ver.is_valid());
    }

    #[test]
    fn short_template() {
        assert!(matches!(recompress(b"x", &[0; 10]), Err(Error::Format(_))));
    }
}
