//! Glyph layout: size/depth scaling, synthetic bold and italic, and the
//! per-code load cache that ties a decoder to a caller-visible bitmap.

use crate::error::{bail_if, GryphErr};
use crate::loader::Loader;
use crate::raster::Raster;
use crate::types::{row_pitch, Bitmap, GlyphData};

/// An 8-bpp pixel above this threshold survives conversion to 1-bpp.
const BITMAP_8_TO_1_THRESHOLD: u8 = 127;

/// Shift a 1-bpp row right by `off` pixels, bits carrying across bytes.
fn shift_row_right(src: &[u8], dst: &mut [u8], off: usize) {
    let byte_off = off >> 3;
    let bit = (off & 7) as u32;
    for (i, out) in dst.iter_mut().enumerate() {
        let cur = if i >= byte_off {
            src[i - byte_off] as u16
        } else {
            0
        };
        let prev = if i >= byte_off + 1 {
            src[i - byte_off - 1] as u16
        } else {
            0
        };
        *out = (((prev << 8 | cur) >> bit) & 0xFF) as u8;
    }
}

/// Shift a 1-bpp row left by `off` pixels.
fn shift_row_left(src: &[u8], dst: &mut [u8], off: usize) {
    let byte_off = off >> 3;
    let bit = (off & 7) as u32;
    for (i, out) in dst.iter_mut().enumerate() {
        let cur = if i + byte_off < src.len() {
            src[i + byte_off] as u16
        } else {
            0
        };
        let next = if i + byte_off + 1 < src.len() {
            src[i + byte_off + 1] as u16
        } else {
            0
        };
        *out = (((cur << 8 | next) >> (8 - bit)) & 0xFF) as u8;
    }
}

/// Nearest-neighbour rescale of `src` into `dst`, converting depth where
/// the two differ. `dst` keeps its height and bit depth; width, bearing and
/// pitch are derived from the source.
pub(crate) fn scale_bitmap(dst: &mut Bitmap, src: &Bitmap) {
    if src.width <= 0 || src.height <= 0 {
        dst.width = 0;
        return;
    }
    dst.width = (src.width as i32 * dst.height as i32 / src.height as i32) as i16;
    dst.horioff = (src.horioff as i32 * dst.height as i32 / src.height as i32) as i16;
    dst.pitch = if dst.bitcount == 8 {
        dst.width
    } else {
        row_pitch(1, dst.width).max(1)
    };
    if dst.width <= 0 {
        return;
    }
    let needed = dst.data_len();
    if dst.buffer.len() < needed {
        dst.buffer.resize(needed, 0);
    }

    // 22.10 fixed-point sampling steps.
    let step_y = ((src.height as i32) << 10) / dst.height as i32;
    let step_x = ((src.width as i32) << 10) / dst.width as i32;
    let src_pitch = src.pitch as usize;
    let dst_pitch = dst.pitch as usize;

    for i in 0..dst.height as usize {
        let sy = ((step_y * i as i32) >> 10) as usize;
        let src_row = sy * src_pitch;
        let dst_row = i * dst_pitch;
        match (dst.bitcount, src.bitcount) {
            (8, 8) => {
                for j in 0..dst.width as usize {
                    let sx = ((step_x * j as i32) >> 10) as usize;
                    dst.buffer[dst_row + j] = src.buffer[src_row + sx];
                }
            }
            (1, 1) => {
                dst.buffer[dst_row..dst_row + dst_pitch].fill(0);
                for j in 0..dst.width as usize {
                    let sx = ((step_x * j as i32) >> 10) as usize;
                    let bit = (src.buffer[src_row + (sx >> 3)] >> (7 - sx % 8)) & 1;
                    dst.buffer[dst_row + (j >> 3)] |= bit << (7 - j % 8);
                }
            }
            (8, 1) => {
                for j in 0..dst.width as usize {
                    let sx = ((step_x * j as i32) >> 10) as usize;
                    let lit = (src.buffer[src_row + (sx >> 3)] >> (7 - sx % 8)) & 1 != 0;
                    dst.buffer[dst_row + j] = if lit { 0xFF } else { 0x00 };
                }
            }
            _ => {
                // 8 -> 1
                dst.buffer[dst_row..dst_row + dst_pitch].fill(0);
                for j in 0..dst.width as usize {
                    let sx = ((step_x * j as i32) >> 10) as usize;
                    if src.buffer[src_row + sx] > BITMAP_8_TO_1_THRESHOLD {
                        dst.buffer[dst_row + (j >> 3)] |= 1 << (7 - j % 8);
                    }
                }
            }
        }
    }
}

/// Synthetic bold: smear each row rightwards by `height / 32` pixels
/// (clamped to 1..=4). Heights under 32 are left untouched.
pub(crate) fn embolden(bitmap: &mut Bitmap, swap: &mut Vec<u8>) {
    let off = (bitmap.height >> 5) as usize;
    if off == 0 {
        return;
    }
    let off = off.min(4);
    let len = bitmap.data_len();
    if swap.len() < len {
        swap.resize(len, 0);
    }
    let pitch = bitmap.pitch as usize;
    let height = bitmap.height as usize;

    if bitmap.bitcount == 8 {
        swap[..len].copy_from_slice(&bitmap.buffer[..len]);
        for y in 0..height {
            let row = y * pitch;
            for x in 0..pitch.saturating_sub(off) {
                let add = bitmap.buffer[row + x];
                let cell = &mut swap[row + off + x];
                *cell = cell.saturating_add(add);
            }
        }
    } else {
        for y in 0..height {
            let row = y * pitch;
            let (src, dst) = (&bitmap.buffer[row..row + pitch], &mut swap[row..row + pitch]);
            shift_row_right(src, dst, off);
        }
    }
    core::mem::swap(&mut bitmap.buffer, swap);
}

/// Synthetic italic: displace each row horizontally by `(y >> 2) - h/8`
/// pixels, negative above the waist, positive below. Heights under 4 are
/// left untouched.
pub(crate) fn italicize(bitmap: &mut Bitmap, swap: &mut Vec<u8>) {
    if bitmap.height >> 2 == 0 {
        return;
    }
    let half_off_max = (bitmap.height >> 3) as i32;
    let len = bitmap.data_len();
    if swap.len() < len {
        swap.resize(len, 0);
    }
    let pitch = bitmap.pitch as usize;
    let height = bitmap.height as usize;

    if bitmap.bitcount == 8 {
        swap[..len].fill(0);
        for y in 0..height {
            let off = ((y >> 2) as i32) - half_off_max;
            let row = y * pitch;
            if off >= 0 {
                let off = (off as usize).min(pitch);
                for x in 0..pitch - off {
                    swap[row + off + x] = bitmap.buffer[row + x];
                }
            } else {
                let off = ((-off) as usize).min(pitch);
                for x in off..pitch {
                    swap[row + x - off] = bitmap.buffer[row + x];
                }
            }
        }
    } else {
        for y in 0..height {
            let off = ((y >> 2) as i32) - half_off_max;
            let row = y * pitch;
            let (src, dst) = (&bitmap.buffer[row..row + pitch], &mut swap[row..row + pitch]);
            if off >= 0 {
                shift_row_right(src, dst, off as usize);
            } else {
                shift_row_left(src, dst, (-off) as usize);
            }
        }
    }
    core::mem::swap(&mut bitmap.buffer, swap);
}

/// Renders glyphs at a fixed size, depth and style. Repeated loads of the
/// same code are served from the cached bitmap.
pub struct Layout {
    loader: Loader,
    /// The caller-visible bitmap at the layout's size and depth.
    bitmap: Bitmap,
    /// 8-bpp staging for rasterized outlines when the target is 1-bpp.
    bitmap8: Option<Bitmap>,
    raster: Raster,
    switch_buf: Vec<u8>,
    code: Option<u16>,
    size: i16,
    bold: bool,
    italic: bool,
}

impl Layout {
    pub fn new(
        loader: Loader,
        size: i16,
        bitcount: i16,
        bold: bool,
        italic: bool,
    ) -> Result<Self, GryphErr> {
        bail_if!(size <= 0, InvalidArgument);
        bail_if!(bitcount != 1 && bitcount != 8, InvalidArgument);
        let bitmap = Bitmap::new(2 * size, size, bitcount);
        let bitmap8 = (bitcount != 8).then(|| Bitmap::new(2 * size, size, 8));
        let switch_buf = vec![0u8; bitmap.data_len()];
        Ok(Layout {
            loader,
            bitmap,
            bitmap8,
            raster: Raster::new(0),
            switch_buf,
            code: None,
            size,
            bold,
            italic,
        })
    }

    /// Pen advance for `code` at the layout size.
    pub fn width(&self, code: u16) -> i16 {
        self.loader.advance(code, self.size)
    }

    /// Decode, rasterize if needed, scale to the layout geometry and apply
    /// the style transforms. The returned bitmap is valid until the next
    /// load.
    pub fn load_char(&mut self, code: u16) -> Result<&Bitmap, GryphErr> {
        if self.code == Some(code) {
            return Ok(&self.bitmap);
        }

        let size = self.size;
        let mut staged = false;
        {
            let glyph = self.loader.decode(code, size)?;
            match glyph.data {
                GlyphData::Bitmap(src) => {
                    if src.bitcount == self.bitmap.bitcount && src.height == self.bitmap.height {
                        self.bitmap.pitch = src.pitch;
                        self.bitmap.width = src.width;
                        self.bitmap.horioff = src.horioff;
                        core::mem::swap(&mut self.bitmap.buffer, &mut src.buffer);
                        if self.bitmap.buffer.len() < self.bitmap.data_len() {
                            self.bitmap.buffer.resize(self.bitmap.data_len(), 0);
                        }
                    } else {
                        scale_bitmap(&mut self.bitmap, src);
                    }
                }
                GlyphData::Outline(outline) => {
                    let staging = match self.bitmap8.as_mut() {
                        Some(staging) => {
                            staged = true;
                            staging
                        }
                        None => &mut self.bitmap,
                    };
                    staging.width = glyph.width;
                    staging.pitch = glyph.width;
                    staging.horioff = glyph.horioff;
                    let len = staging.data_len();
                    if staging.buffer.len() < len {
                        staging.buffer.resize(len, 0);
                    }
                    staging.buffer[..len].fill(0);
                    self.raster.render(staging, outline)?;
                }
            }
        }

        if staged {
            let staging = self.bitmap8.as_mut().expect("staging bitmap exists");
            if staging.bitcount == self.bitmap.bitcount && staging.height == self.bitmap.height {
                self.bitmap.pitch = staging.pitch;
                self.bitmap.width = staging.width;
                self.bitmap.horioff = staging.horioff;
                core::mem::swap(&mut self.bitmap.buffer, &mut staging.buffer);
            } else {
                scale_bitmap(&mut self.bitmap, staging);
            }
        }

        if self.bold {
            embolden(&mut self.bitmap, &mut self.switch_buf);
        }
        if self.italic {
            italicize(&mut self.bitmap, &mut self.switch_buf);
        }
        self.code = Some(code);
        Ok(&self.bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(width: i16, height: i16, pixels: &[u8]) -> Bitmap {
        Bitmap::from_buffer(width, height, 8, pixels.to_vec()).unwrap()
    }

    #[test]
    fn identity_scale_copies_pixels() {
        let src = grey(4, 4, &(0u8..16).collect::<Vec<_>>());
        let mut dst = Bitmap::new(4, 4, 8);
        scale_bitmap(&mut dst, &src);
        assert_eq!(dst.width, 4);
        assert_eq!(dst.buffer[..16], src.buffer[..16]);
    }

    #[test]
    fn downscale_halves_dimensions() {
        let src = grey(8, 8, &[0x80; 64]);
        let mut dst = Bitmap::new(8, 4, 8);
        scale_bitmap(&mut dst, &src);
        assert_eq!(dst.width, 4);
        assert_eq!(dst.pitch, 4);
        assert!(dst.buffer[..16].iter().all(|&p| p == 0x80));
    }

    #[test]
    fn one_to_eight_maps_bits_to_full_bytes() {
        let src = Bitmap::from_buffer(8, 2, 1, vec![0b1010_0000, 0b0000_0001]).unwrap();
        let mut dst = Bitmap::new(8, 2, 8);
        scale_bitmap(&mut dst, &src);
        assert_eq!(dst.buffer[0], 0xFF);
        assert_eq!(dst.buffer[1], 0x00);
        assert_eq!(dst.buffer[2], 0xFF);
        assert_eq!(dst.buffer[8 + 7], 0xFF);
    }

    #[test]
    fn eight_to_one_thresholds() {
        let mut pixels = vec![0u8; 16];
        pixels[0] = 0xFF;
        pixels[1] = 0x40; // below threshold
        pixels[3] = 0x90;
        let src = grey(8, 2, &pixels[..]);
        let mut dst = Bitmap::new(8, 2, 1);
        scale_bitmap(&mut dst, &src);
        assert_eq!(dst.buffer[0], 0b1001_0000);
    }

    #[test]
    fn bold_of_zero_bitmap_stays_zero() {
        let mut bitmap = Bitmap::new(8, 32, 8);
        let mut swap = Vec::new();
        embolden(&mut bitmap, &mut swap);
        assert!(bitmap.buffer.iter().all(|&p| p == 0));
    }

    #[test]
    fn italic_of_zero_bitmap_stays_zero() {
        let mut bitmap = Bitmap::new(8, 16, 8);
        let mut swap = Vec::new();
        italicize(&mut bitmap, &mut swap);
        assert!(bitmap.buffer.iter().all(|&p| p == 0));
    }

    #[test]
    fn bold_smears_and_saturates() {
        let mut bitmap = Bitmap::new(4, 32, 8);
        bitmap.buffer[0] = 200;
        bitmap.buffer[1] = 200;
        let mut swap = Vec::new();
        embolden(&mut bitmap, &mut swap);
        // off = 32 >> 5 = 1: column 1 saturates, column 2 inherits.
        assert_eq!(bitmap.buffer[0], 200);
        assert_eq!(bitmap.buffer[1], 255);
        assert_eq!(bitmap.buffer[2], 200);
    }

    #[test]
    fn bold_below_minimum_height_is_a_no_op() {
        let mut bitmap = Bitmap::new(4, 16, 8);
        bitmap.buffer[0] = 10;
        let mut swap = Vec::new();
        embolden(&mut bitmap, &mut swap);
        assert_eq!(bitmap.buffer[0], 10);
        assert_eq!(bitmap.buffer[1], 0);
    }

    #[test]
    fn italic_displaces_rows_both_ways() {
        let mut bitmap = Bitmap::new(16, 16, 8);
        let pitch = bitmap.pitch as usize;
        for y in 0..16 {
            bitmap.buffer[y * pitch + 8] = 0xAA;
        }
        let mut swap = Vec::new();
        italicize(&mut bitmap, &mut swap);
        // half_off_max = 2: top rows shift left, bottom rows shift right.
        assert_eq!(bitmap.buffer[8 - 2], 0xAA);
        assert_eq!(bitmap.buffer[15 * pitch + 8 + 1], 0xAA);
    }

    #[test]
    fn one_bpp_row_shifts_carry_bits() {
        let src = [0b1000_0001u8, 0b1000_0000];
        let mut dst = [0u8; 2];
        shift_row_right(&src, &mut dst, 1);
        assert_eq!(dst, [0b0100_0000, 0b1100_0000]);
        let mut dst = [0u8; 2];
        shift_row_left(&src, &mut dst, 1);
        assert_eq!(dst, [0b0000_0011, 0b0000_0000]);
        let mut dst = [0u8; 2];
        shift_row_right(&src, &mut dst, 9);
        assert_eq!(dst, [0b0000_0000, 0b0100_0000]);
    }
}
