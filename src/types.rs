//! Bitmap, outline and glyph data types shared across the crate.

use crate::error::{bail_if, GryphErr};
use crate::stream::Stream;

/// Off-curve control point of a quadratic arc.
pub const TAG_CONIC: u8 = 0;
/// Point lying on the curve.
pub const TAG_ON: u8 = 1;
/// Off-curve control point of a cubic arc.
pub const TAG_CUBIC: u8 = 2;

/// The two low bits carry the point kind; anything above is ignored.
#[inline]
pub fn curve_tag(tag: u8) -> u8 {
    tag & 3
}

/// Tunable knobs, routed to whichever codec sits behind a handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Param {
    /// Number of decoder cache slots.
    CacheItem,
    /// Encoder glyph box height.
    Height,
    /// Encoder bit depth (1 or 8).
    BitCount,
    /// Enable byte-RLE on 8-bpp payloads (encoder side).
    Compress,
}

/// A grey or monochrome glyph image.
///
/// `pitch` is the row stride in bytes: `ceil(bitcount * width / 8)` with a
/// floor of one byte. The buffer may be larger than `pitch * height` when a
/// staging bitmap is being reused at a narrower width.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pub width: i16,
    pub height: i16,
    /// 1 or 8.
    pub bitcount: i16,
    pub pitch: i16,
    /// Horizontal bearing applied before the glyph box.
    pub horioff: i16,
    pub buffer: Vec<u8>,
}

/// Row stride for a given depth and width.
#[inline]
pub fn row_pitch(bitcount: i16, width: i16) -> i16 {
    ((bitcount as i32 * 8 * width as i32 + 63) >> 6) as i16
}

impl Bitmap {
    /// A zeroed bitmap of the given geometry.
    pub fn new(width: i16, height: i16, bitcount: i16) -> Self {
        let pitch = row_pitch(bitcount, width);
        Bitmap {
            width,
            height,
            bitcount,
            pitch,
            horioff: 0,
            buffer: vec![0; pitch as usize * height as usize],
        }
    }

    /// Wrap existing pixel rows. `buffer` must hold `pitch * height` bytes
    /// for the computed pitch.
    pub fn from_buffer(
        width: i16,
        height: i16,
        bitcount: i16,
        buffer: Vec<u8>,
    ) -> Result<Self, GryphErr> {
        let pitch = row_pitch(bitcount, width);
        bail_if!(
            buffer.len() < pitch as usize * height as usize,
            InvalidArgument
        );
        Ok(Bitmap {
            width,
            height,
            bitcount,
            pitch,
            horioff: 0,
            buffer,
        })
    }

    /// Bytes covered by the current geometry (not the buffer capacity).
    pub fn data_len(&self) -> usize {
        self.pitch as usize * self.height as usize
    }
}

/// A point in 26.6 fixed-point units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// An unpacked glyph outline ready for scaling or rendering.
///
/// `contours[i]` is the index of the last point of contour `i`; points carry
/// 26.6 coordinates and a curve tag each.
#[derive(Clone, Debug, Default)]
pub struct Outline {
    pub contours: Vec<i16>,
    pub points: Vec<Point>,
    pub tags: Vec<u8>,
}

impl Outline {
    /// An empty outline with room reserved for the given complexity.
    pub fn with_capacity(n_contours: usize, n_points: usize) -> Self {
        Outline {
            contours: Vec::with_capacity(n_contours),
            points: Vec::with_capacity(n_points),
            tags: Vec::with_capacity(n_points),
        }
    }

    pub fn n_contours(&self) -> usize {
        self.contours.len()
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Replace this outline with `source` scaled by `to_size / from_size`.
    ///
    /// Integer multiply-then-divide per coordinate, so repeated transforms
    /// accumulate rounding the same way the file scaling path does.
    pub fn transform_from(&mut self, source: &Outline, to_size: i16, from_size: i16) {
        self.contours.clear();
        self.contours.extend_from_slice(&source.contours);
        self.tags.clear();
        self.tags.extend_from_slice(&source.tags);
        self.points.clear();
        self.points.extend(source.points.iter().map(|p| Point {
            x: p.x * to_size as i32 / from_size as i32,
            y: p.y * to_size as i32 / from_size as i32,
        }));
    }

    /// Drop the point at `idx`, renumbering contour ends and removing any
    /// contour left without points.
    pub fn remove_point(&mut self, idx: usize) -> Result<(), GryphErr> {
        bail_if!(idx >= self.points.len(), InvalidArgument);
        let mut shift: i16 = 0;
        let mut kept = 0;
        for i in 0..self.contours.len() {
            let end = self.contours[i];
            if end as usize >= idx {
                shift = 1;
            }
            let adjusted = end - shift;
            // A contour end sliding below its predecessor (or below zero)
            // means the contour lost its only point.
            let prev_end = if kept == 0 { -1 } else { self.contours[kept - 1] };
            if adjusted > prev_end {
                self.contours[kept] = adjusted;
                kept += 1;
            }
        }
        self.contours.truncate(kept);
        self.points.remove(idx);
        self.tags.remove(idx);
        Ok(())
    }
}

/// Decoded glyph payload, borrowed from the decoder that produced it.
pub enum GlyphData<'a> {
    /// Bitmap at the file's native resolution; scaling is the layout's job.
    Bitmap(&'a mut Bitmap),
    /// Outline already scaled to the requested size, in 26.6 units.
    Outline(&'a Outline),
}

/// One decoded glyph: payload plus horizontal metrics.
pub struct Glyph<'a> {
    pub data: GlyphData<'a>,
    pub width: i16,
    pub horioff: i16,
}

/// Input handed to an encoder for one glyph (or, for the combine format,
/// one whole prebuilt child file).
pub enum EncodeData<'a> {
    Bitmap {
        bitmap: &'a Bitmap,
        horioff: i16,
    },
    Outline {
        outline: &'a Outline,
        width: i16,
        horioff: i16,
    },
    /// A finished gbtf/gvtf stream to embed as a combine slot.
    Stream(Stream),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_matches_depth() {
        assert_eq!(row_pitch(1, 8), 1);
        assert_eq!(row_pitch(1, 9), 2);
        assert_eq!(row_pitch(1, 16), 2);
        assert_eq!(row_pitch(8, 5), 5);
    }

    #[test]
    fn transform_scales_points() {
        let src = Outline {
            contours: vec![2],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 64 << 6, y: 0 },
                Point { x: 0, y: 64 << 6 },
            ],
            tags: vec![TAG_ON; 3],
        };
        let mut dst = Outline::default();
        dst.transform_from(&src, 16, 64);
        assert_eq!(dst.points[1].x, 16 << 6);
        assert_eq!(dst.points[2].y, 16 << 6);
        assert_eq!(dst.contours, vec![2]);
    }

    #[test]
    fn remove_point_renumbers_contours() {
        let mut outline = Outline {
            contours: vec![2, 5],
            points: (0..6).map(|i| Point { x: i, y: i }).collect(),
            tags: vec![TAG_ON; 6],
        };
        outline.remove_point(1).unwrap();
        assert_eq!(outline.contours, vec![1, 4]);
        assert_eq!(outline.n_points(), 5);
        assert_eq!(outline.points[1].x, 2);
    }

    #[test]
    fn remove_last_point_of_single_point_contour_drops_it() {
        let mut outline = Outline {
            contours: vec![0, 3],
            points: (0..4).map(|i| Point { x: i, y: i }).collect(),
            tags: vec![TAG_ON; 4],
        };
        outline.remove_point(0).unwrap();
        assert_eq!(outline.contours, vec![2]);
        assert_eq!(outline.n_points(), 3);
    }
}
