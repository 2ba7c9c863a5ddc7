//! The `gbtf` bitmap glyph container.
//!
//! Layout: 4-byte magic, info header (fixed fields plus two section-offset
//! blocks), then the dense width / horioff / offset tables for the occupied
//! sections, then the per-glyph pixel payload. 8-bpp payloads may be
//! byte-RLE compressed, in which case each record carries a `u16` length
//! prefix. All integers little-endian, no padding.

pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod rle;

pub use decoder::BitmapDecoder;
pub use encoder::BitmapEncoder;

use bytes::{Buf, BufMut};

use crate::error::{bail_if, GryphErr};
use crate::tables::{SectionBlock, INFO_HEADER_LEN};

pub(crate) const MAGIC: &[u8; 4] = b"gbtf";

/// The info header directly following the magic.
pub(crate) struct InfoHeader {
    /// Size of this header on disk.
    pub size: u32,
    /// Number of glyph records.
    pub count: u32,
    /// 1 or 8.
    pub bitcount: i16,
    /// 1 enables byte-RLE; only legal with `bitcount == 8`.
    pub compression: i16,
    /// Widest glyph in the file.
    pub width: i16,
    /// Glyph box height shared by every glyph.
    pub height: i16,
    /// Table offsets relative to the end of the headers.
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
            bitcount: 0,
            compression: 0,
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
            bitcount: input.try_get_i16_le()?,
            compression: input.try_get_i16_le()?,
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
        bail_if!(header.bitcount != 1 && header.bitcount != 8, InvalidFormat);
        bail_if!(header.compression != 0 && header.bitcount != 8, InvalidFormat);
        bail_if!(header.height <= 0, InvalidFormat);
        Ok(header)
    }

    pub fn write(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.size);
        out.put_u32_le(self.count);
        out.put_i16_le(self.bitcount);
        out.put_i16_le(self.compression);
        out.put_i16_le(self.width);
        out.put_i16_le(self.height);
        out.put_u32_le(self.width_tab_off);
        out.put_u32_le(self.horioff_tab_off);
        out.put_u32_le(self.offset_tab_off);
        out.put_u32_le(self.off_grey_bits);
        self.width_section.write(out);
        self.index_section.write(out);
    }

    pub fn compressed(&self) -> bool {
        self.compression != 0 && self.bitcount == 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_header_round_trips() {
        let mut header = InfoHeader::new();
        header.count = 3;
        header.bitcount = 8;
        header.compression = 1;
        header.width = 24;
        header.height = 16;
        header.width_tab_off = 0;
        header.horioff_tab_off = 96;
        header.offset_tab_off = 192;
        header.off_grey_bits = 576;
        header.width_section.0[0] = 1;
        header.index_section.0[0] = 1;

        let mut bytes = Vec::new();
        header.write(&mut bytes);
        assert_eq!(bytes.len(), INFO_HEADER_LEN);

        let parsed = InfoHeader::parse(&mut &bytes[..]).unwrap();
        assert_eq!(parsed.count, 3);
        assert_eq!(parsed.bitcount, 8);
        assert!(parsed.compressed());
        assert_eq!(parsed.off_grey_bits, 576);
        assert_eq!(parsed.width_section.0[0], 1);
    }

    #[test]
    fn one_bpp_compression_is_rejected() {
        let mut header = InfoHeader::new();
        header.bitcount = 1;
        header.compression = 1;
        header.height = 16;
        let mut bytes = Vec::new();
        header.write(&mut bytes);
        assert!(InfoHeader::parse(&mut &bytes[..]).is_err());
    }
}
