//! The `gvtf` vector glyph container.
//!
//! Table layout is identical to gbtf; the payload stores packed outlines
//! instead of pixels. Each glyph record is a `u16` length followed by
//! `n_contours`/`n_points` bytes, the contour end indices, and one packed
//! `(x, y)` byte pair per point (7-bit coordinate plus one tag bit each).

pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod packed;

pub use decoder::VectorDecoder;
pub use encoder::VectorEncoder;

use bytes::{Buf, BufMut};

use crate::error::{bail_if, GryphErr};
use crate::tables::{SectionBlock, INFO_HEADER_LEN};

pub(crate) const MAGIC: &[u8; 4] = b"gvtf";

/// Info header following the magic. Same shape as the bitmap header with
/// the depth fields replaced by outline complexity bounds.
pub(crate) struct InfoHeader {
    pub size: u32,
    pub count: u32,
    /// Most points any stored glyph has.
    pub max_points: i16,
    /// Most contours any stored glyph has.
    pub max_contours: i16,
    pub width: i16,
    pub height: i16,
    pub width_tab_off: u32,
    pub horioff_tab_off: u32,
    pub offset_tab_off: u32,
    pub off_grey_bits: u32,
    pub width_section: SectionBlock,
    pub index_section: SectionBlock,
}

impl InfoHeader {
    pub fn new() -> Self {
        InfoHeader {
            size: INFO_HEADER_LEN as u32,
            count: 0,
            max_points: 0,
            max_contours: 0,
            width: 0,
            height: 0,
            width_tab_off: 0,
            horioff_tab_off: 0,
            offset_tab_off: 0,
            off_grey_bits: 0,
            width_section: SectionBlock::new(),
            index_section: SectionBlock::new(),
        }
    }

    pub fn parse(input: &mut impl Buf) -> Result<Self, GryphErr> {
        let header = InfoHeader {
            size: input.try_get_u32_le()?,
            count: input.try_get_u32_le()?,
            max_points: input.try_get_i16_le()?,
            max_contours: input.try_get_i16_le()?,
            width: input.try_get_i16_le()?,
            height: input.try_get_i16_le()?,
            width_tab_off: input.try_get_u32_le()?,
            horioff_tab_off: input.try_get_u32_le()?,
            offset_tab_off: input.try_get_u32_le()?,
            off_grey_bits: input.try_get_u32_le()?,
            width_section: SectionBlock::parse(input)?,
            index_section: SectionBlock::parse(input)?,
        };
        bail_if!(header.size != INFO_HEADER_LEN as u32, InvalidFormat);
        bail_if!(header.height <= 0, InvalidFormat);
        bail_if!(
            header.max_points < 0 || header.max_points > 255 || header.max_contours < 0,
            InvalidFormat
        );
        Ok(header)
    }

    pub fn write(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.size);
        out.put_u32_le(self.count);
        out.put_i16_le(self.max_points);
        out.put_i16_le(self.max_contours);
        out.put_i16_le(self.width);
        out.put_i16_le(self.height);
        out.put_u32_le(self.width_tab_off);
        out.put_u32_le(self.horioff_tab_off);
        out.put_u32_le(self.offset_tab_off);
        out.put_u32_le(self.off_grey_bits);
        self.width_section.write(out);
        self.index_section.write(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_header_round_trips() {
        let mut header = InfoHeader::new();
        header.count = 2;
        header.max_points = 12;
        header.max_contours = 3;
        header.height = 64;
        let mut bytes = Vec::new();
        header.write(&mut bytes);
        assert_eq!(bytes.len(), INFO_HEADER_LEN);
        let parsed = InfoHeader::parse(&mut &bytes[..]).unwrap();
        assert_eq!(parsed.max_points, 12);
        assert_eq!(parsed.max_contours, 3);
        assert_eq!(parsed.height, 64);
    }
}
