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

//! DXT1 (BC1) screenshot codec.
//!
//! The encoder has to match the game's own output bit for bit: bounding box
//! endpoints, truncating 565 packing and an exhaustive nearest palette search.

use {
    crate::{error::Result, utils::range_size},
    byteorder::{ByteOrder, LittleEndian},
    image::{imageops::FilterType, DynamicImage, Rgb, RgbImage},
    log::debug,
};

pub use crate::utils::{SCREENSHOT_HEIGHT, SCREENSHOT_WIDTH};

pub const BLOCK_BYTES: usize = 8;

type Rgb8 = [u8; 3];

#[must_use]
pub const fn encoded_len(width: u32, height: u32) -> usize {
    (width.div_ceil(4) * height.div_ceil(4)) as usize * BLOCK_BYTES
}

#[must_use]
pub fn pack_565(c: Rgb8) -> u16 {
    (u16::from(c[0] >> 3) << 11) | (u16::from(c[1] >> 2) << 5) | u16::from(c[2] >> 3)
}

#[must_use]
pub fn unpack_565(v: u16) -> Rgb8 {
    let r = u32::from(v >> 11) & 0x1F;
    let g = u32::from(v >> 5) & 0x3F;
    let b = u32::from(v) & 0x1F;
    // the results are at most 255
    [(r * 255 / 31) as u8, (g * 255 / 63) as u8, (b * 255 / 31) as u8]
}

fn blend(a: Rgb8, b: Rgb8, wa: u16, wb: u16) -> Rgb8 {
    let f = |x: u8, y: u8| ((u16::from(x) * wa + u16::from(y) * wb) / (wa + wb)) as u8;
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])]
}

fn distance(a: Rgb8, b: Rgb8) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = i32::from(x) - i32::from(y);
            d.unsigned_abs().pow(2)
        })
        .sum()
}

/// Compresses one 4x4 tile, pixels in row-major order.
#[must_use]
pub fn encode_block(tile: &[Rgb8; 16]) -> [u8; BLOCK_BYTES] {
    let mut max = [0u8; 3];
    let mut min = [u8::MAX; 3];
    for px in tile {
        for ch in 0..3 {
            max[ch] = max[ch].max(px[ch]);
            min[ch] = min[ch].min(px[ch]);
        }
    }

    let (mut c0, mut c1) = (pack_565(max), pack_565(min));
    if c0 < c1 {
        std::mem::swap(&mut c0, &mut c1);
    }

    let (e0, e1) = (unpack_565(c0), unpack_565(c1));
    let palette = [e0, e1, blend(e0, e1, 2, 1), blend(e0, e1, 1, 2)];

    let mut indices = 0u32;
    for (i, &px) in tile.iter().enumerate() {
        let mut best = 0;
        for (j, &col) in palette.iter().enumerate().skip(1) {
            if distance(px, col) < distance(px, palette[best]) {
                best = j;
            }
        }
        indices |= (best as u32) << (2 * i);
    }

    let mut out = [0u8; BLOCK_BYTES];
    LittleEndian::write_u16(&mut out[0..2], c0);
    LittleEndian::write_u16(&mut out[2..4], c1);
    LittleEndian::write_u32(&mut out[4..8], indices);
    out
}

/// Resizes `img` to `width` x `height` if needed and DXT1 compresses it.
#[must_use]
pub fn encode(img: &DynamicImage, width: u32, height: u32) -> Vec<u8> {
    let rgb = if img.width() == width && img.height() == height {
        img.to_rgb8()
    } else {
        debug!("resizing {}x{} screenshot to {width}x{height}", img.width(), img.height());
        img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };
    encode_rgb(&rgb)
}

/// Compresses an RGB image; partial edge tiles are padded with black.
#[must_use]
pub fn encode_rgb(rgb: &RgbImage) -> Vec<u8> {
    let (w, h) = rgb.dimensions();
    let mut out = Vec::with_capacity(encoded_len(w, h));
    for by in 0..h.div_ceil(4) {
        for bx in 0..w.div_ceil(4) {
            let tile: [Rgb8; 16] = std::array::from_fn(|i| {
                let (x, y) = (bx * 4 + (i % 4) as u32, by * 4 + (i / 4) as u32);
                if x < w && y < h { rgb.get_pixel(x, y).0 } else { [0; 3] }
            });
            out.extend_from_slice(&encode_block(&tile));
        }
    }
    out
}

/// Decodes image bytes of any format `image` understands and compresses them.
///
/// # Errors
/// `Error::ImageDecode` if the bytes are not a readable image.
pub fn encode_bytes(image_bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(image_bytes)?;
    Ok(encode(&img, width, height))
}

/// Expands DXT1 data back into an image, missing blocks are left black.
#[must_use]
pub fn decode(data: &[u8], width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return img;
    }
    let blocks_x = width.div_ceil(4) as usize;
    for (n, block) in data.chunks_exact(BLOCK_BYTES).enumerate() {
        let (bx, by) = ((n % blocks_x) as u32, (n / blocks_x) as u32);
        if by * 4 >= height {
            break;
        }
        let c0 = LittleEndian::read_u16(&block[range_size(0, 2)]);
        let c1 = LittleEndian::read_u16(&block[range_size(2, 2)]);
        let indices = LittleEndian::read_u32(&block[range_size(4, 4)]);
        let (e0, e1) = (unpack_565(c0), unpack_565(c1));
        let palette = if c0 > c1 {
            [e0, e1, blend(e0, e1, 2, 1), blend(e0, e1, 1, 2)]
        } else {
            [e0, e1, blend(e0, e1, 1, 1), [0; 3]]
        };
        for i in 0..16u32 {
            let (x, y) = (bx * 4 + i % 4, by * 4 + i / 4);
            if x < width && y < height {
                img.put_pixel(x, y, Rgb(palette[((indices >> (2 * i)) & 3) as usize]));
            }
        }
    }
    img
}
