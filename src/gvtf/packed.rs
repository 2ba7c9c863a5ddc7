//! Packed outline form: the on-disk representation of a vector glyph.
//!
//! Per point, `x` and `y` are each one byte whose upper seven bits carry a
//! pixel coordinate and whose low bit carries half of the two-bit curve tag:
//!
//! ```text
//! packed.x = (x << 1) | (tag & 1)
//! packed.y = (y << 1) | ((tag >> 1) & 1)
//! tag      = (packed.y & 1) << 1 | (packed.x & 1)
//! ```
//!
//! This caps vector glyphs at 255 points, 255 contours and coordinates in
//! `0..=127` before scaling.

use crate::error::{bail_if, GryphErr};
use crate::types::{curve_tag, Outline, Point};

/// Serialized size of a packed outline blob.
pub(crate) fn packed_len(n_contours: usize, n_points: usize) -> usize {
    2 + n_contours + 2 * n_points
}

/// Pack an unpacked outline (26.6 coordinates at file resolution) into its
/// wire blob.
pub(crate) fn pack(outline: &Outline) -> Result<Vec<u8>, GryphErr> {
    let n_contours = outline.n_contours();
    let n_points = outline.n_points();
    bail_if!(n_contours == 0 || n_points == 0, InvalidArgument);
    bail_if!(n_contours > 255 || n_points > 255, InvalidArgument);

    let mut out = Vec::with_capacity(packed_len(n_contours, n_points));
    out.push(n_contours as u8);
    out.push(n_points as u8);
    for &end in outline.contours.iter() {
        bail_if!(end < 0 || end >= n_points as i16, InvalidOutline);
        out.push(end as u8);
    }
    for (point, &tag) in outline.points.iter().zip(outline.tags.iter()) {
        let x = point.x >> 6;
        let y = point.y >> 6;
        bail_if!(!(0..=127).contains(&x) || !(0..=127).contains(&y), InvalidArgument);
        let tag = curve_tag(tag);
        out.push(((x as u8) << 1) | (tag & 1));
        out.push(((y as u8) << 1) | ((tag >> 1) & 1));
    }
    Ok(out)
}

/// Unpack a wire blob into `out`, producing 26.6 coordinates at file
/// resolution. `out`'s buffers are reused.
pub(crate) fn unpack_into(data: &[u8], out: &mut Outline) -> Result<(), GryphErr> {
    bail_if!(data.len() < 2, InvalidFormat);
    let n_contours = data[0] as usize;
    let n_points = data[1] as usize;
    bail_if!(
        data.len() < packed_len(n_contours, n_points),
        InvalidFormat
    );

    out.contours.clear();
    out.points.clear();
    out.tags.clear();

    let contours = &data[2..2 + n_contours];
    out.contours.extend(contours.iter().map(|&end| end as i16));

    let points = &data[2 + n_contours..2 + n_contours + 2 * n_points];
    for pair in points.chunks_exact(2) {
        let (px, py) = (pair[0], pair[1]);
        out.points.push(Point {
            x: ((px >> 1) as i32) << 6,
            y: ((py >> 1) as i32) << 6,
        });
        out.tags.push((py & 1) << 1 | (px & 1));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TAG_CONIC, TAG_CUBIC, TAG_ON};

    fn sample() -> Outline {
        Outline {
            contours: vec![2, 5],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 10 << 6, y: 0 },
                Point { x: 10 << 6, y: 12 << 6 },
                Point { x: 20 << 6, y: 20 << 6 },
                Point { x: 127 << 6, y: 64 << 6 },
                Point { x: 40 << 6, y: 127 << 6 },
            ],
            tags: vec![TAG_ON, TAG_CONIC, TAG_ON, TAG_ON, TAG_CUBIC, TAG_CUBIC],
        }
    }

    #[test]
    fn pack_unpack_round_trips() {
        let outline = sample();
        let blob = pack(&outline).unwrap();
        assert_eq!(blob.len(), packed_len(2, 6));
        let mut unpacked = Outline::default();
        unpack_into(&blob, &mut unpacked).unwrap();
        assert_eq!(unpacked.contours, outline.contours);
        assert_eq!(unpacked.points, outline.points);
        assert_eq!(unpacked.tags, outline.tags);
    }

    #[test]
    fn repacking_is_byte_identical() {
        let blob = pack(&sample()).unwrap();
        let mut unpacked = Outline::default();
        unpack_into(&blob, &mut unpacked).unwrap();
        assert_eq!(pack(&unpacked).unwrap(), blob);
    }

    #[test]
    fn every_tag_survives_both_bit_paths() {
        for tag in [TAG_CONIC, TAG_ON, TAG_CUBIC] {
            let outline = Outline {
                contours: vec![0],
                points: vec![Point { x: 5 << 6, y: 9 << 6 }],
                tags: vec![tag],
            };
            let blob = pack(&outline).unwrap();
            let mut unpacked = Outline::default();
            unpack_into(&blob, &mut unpacked).unwrap();
            assert_eq!(unpacked.tags[0], tag);
            assert_eq!(unpacked.points[0], outline.points[0]);
        }
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let outline = Outline {
            contours: vec![0],
            points: vec![Point { x: 128 << 6, y: 0 }],
            tags: vec![TAG_ON],
        };
        assert!(pack(&outline).is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let blob = pack(&sample()).unwrap();
        let mut out = Outline::default();
        assert!(unpack_into(&blob[..blob.len() - 1], &mut out).is_err());
        assert!(unpack_into(&[], &mut out).is_err());
    }
}
