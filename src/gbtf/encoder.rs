use bytes::BufMut;

use crate::error::{bail_if, GryphErr};
use crate::gbtf::{rle, InfoHeader, MAGIC};
use crate::stream::Stream;
use crate::tables::{set_ram, FlatTables, INFO_HEADER_LEN, MAX_CODE};
use crate::types::{Bitmap, Param};

/// Accumulates bitmap glyphs in memory and serializes the whole container
/// on flush, header first.
pub struct BitmapEncoder {
    stream: Stream,
    info: InfoHeader,
    tables: FlatTables,
    /// Per-code payload records, already compressed when RLE is on.
    glyphs: Vec<Option<Vec<u8>>>,
    height: i16,
    bitcount: i16,
    compress: bool,
    /// Parameters in force when the stored glyphs were accepted; a change
    /// invalidates them.
    applied: Option<(i16, i16, bool)>,
    item_count: u32,
    pub(crate) dirty: bool,
}

impl BitmapEncoder {
    pub fn new(stream: Stream) -> Self {
        let mut glyphs = Vec::new();
        glyphs.resize_with(MAX_CODE, || None);
        BitmapEncoder {
            stream,
            info: InfoHeader::new(),
            tables: FlatTables::new(),
            glyphs,
            height: 0,
            bitcount: 0,
            compress: false,
            applied: None,
            item_count: 0,
            dirty: false,
        }
    }

    fn clear_glyphs(&mut self) {
        self.tables.clear();
        self.glyphs.iter_mut().for_each(|g| *g = None);
        self.item_count = 0;
        self.info.width = 0;
    }

    /// Push the current parameters into the header, wiping accumulated
    /// glyphs when they changed after glyphs were stored.
    fn apply_params(&mut self) {
        let current = (self.height, self.bitcount, self.compress);
        if let Some(previous) = self.applied {
            if previous != current {
                self.clear_glyphs();
            }
        }
        self.applied = Some(current);
        self.info.height = self.height;
        self.info.bitcount = self.bitcount;
        self.info.compression = (self.bitcount == 8 && self.compress) as i16;
        if self.ready() {
            self.dirty = true;
        }
    }

    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        match param {
            Param::Height => self.height = value as i16,
            Param::BitCount => {
                bail_if!(value != 1 && value != 8, Unsupported);
                self.bitcount = value as i16;
            }
            Param::Compress => self.compress = value != 0,
            Param::CacheItem => return Err(GryphErr::Unsupported),
        }
        self.apply_params();
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.item_count
    }

    pub(crate) fn ready(&self) -> bool {
        self.height != 0 && self.bitcount != 0
    }

    /// Store one glyph. The bitmap must match the configured depth and box
    /// height; width is sanity-clamped to three times the height.
    pub fn encode(&mut self, code: u16, bitmap: &Bitmap, horioff: i16) -> Result<(), GryphErr> {
        bail_if!(!self.ready() || self.applied.is_none(), InvalidArgument);
        bail_if!(
            bitmap.bitcount != self.info.bitcount
                || bitmap.height != self.info.height
                || bitmap.width > 3 * bitmap.height,
            InvalidArgument
        );
        bail_if!(bitmap.width <= 0 || bitmap.width > 255, InvalidArgument);
        bail_if!(bitmap.buffer.len() < bitmap.data_len(), InvalidArgument);

        if self.info.width < bitmap.width {
            self.info.width = bitmap.width;
        }
        let raw = &bitmap.buffer[..bitmap.data_len()];
        let record = if self.info.compressed() {
            rle::encode(raw)
        } else {
            raw.to_vec()
        };
        bail_if!(record.len() > u16::MAX as usize, InvalidArgument);

        if self.glyphs[code as usize].is_none() {
            self.item_count += 1;
        }
        self.glyphs[code as usize] = Some(record);
        self.tables.offsets[code as usize] = set_ram(code as u32);
        self.tables.widths[code as usize] = bitmap.width as u8;
        self.tables.horioffs[code as usize] = horioff as i8;
        self.dirty = true;
        Ok(())
    }

    /// Forget the glyph stored for `code`.
    pub fn delete(&mut self, code: u16) {
        self.tables.delete(code);
        if self.glyphs[code as usize].take().is_some() {
            self.item_count = self.item_count.saturating_sub(1);
            self.dirty = true;
        }
    }

    /// Finalize section blocks, per-glyph payload offsets and header
    /// offsets; record the glyph count.
    fn build_all(&mut self) {
        let (width_len, offset_len) = self
            .tables
            .build_section_blocks(&mut self.info.width_section, &mut self.info.index_section);

        let mut payload: u32 = 0;
        let mut count: u32 = 0;
        let prefix = if self.info.compressed() { 2 } else { 0 };
        for code in 0..MAX_CODE {
            if let Some(record) = &self.glyphs[code] {
                self.tables.offsets[code] = payload;
                payload += record.len() as u32 + prefix;
                count += 1;
            }
        }

        self.info.count = count;
        self.info.width_tab_off = 0;
        self.info.horioff_tab_off = width_len;
        self.info.offset_tab_off = width_len * 2;
        self.info.off_grey_bits = width_len * 2 + offset_len;
        self.info.size = INFO_HEADER_LEN as u32;
    }

    fn write_all(&mut self) -> Result<(), GryphErr> {
        self.stream.seek(0)?;
        let mut header = Vec::with_capacity(4 + INFO_HEADER_LEN);
        header.put_slice(MAGIC);
        self.info.write(&mut header);
        self.stream.write_all(&header)?;

        self.tables.write_dense_tables(
            &self.info.width_section,
            &self.info.index_section,
            &mut self.stream,
        )?;

        let compressed = self.info.compressed();
        for code in 0..MAX_CODE {
            if let Some(record) = &self.glyphs[code] {
                if compressed {
                    self.stream.write_all(&(record.len() as u16).to_le_bytes())?;
                }
                self.stream.write_all(record)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), GryphErr> {
        self.build_all();
        self.write_all()?;
        self.dirty = false;
        Ok(())
    }

    pub(crate) fn stream(&self) -> &Stream {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbtf::BitmapDecoder;
    use crate::types::GlyphData;

    fn encoder(capacity: usize) -> BitmapEncoder {
        BitmapEncoder::new(Stream::memory(vec![0u8; capacity]))
    }

    fn configure(enc: &mut BitmapEncoder, height: u32, bitcount: u32) {
        enc.set_param(Param::Height, height).unwrap();
        enc.set_param(Param::BitCount, bitcount).unwrap();
    }

    fn grey(width: i16, height: i16, fill: u8) -> Bitmap {
        Bitmap::from_buffer(width, height, 8, vec![fill; width as usize * height as usize])
            .unwrap()
    }

    fn reopen(enc: &BitmapEncoder) -> BitmapDecoder {
        BitmapDecoder::new(Stream::memory(enc.stream().to_vec().unwrap())).unwrap()
    }

    #[test]
    fn multi_section_tables_stay_dense_per_section() {
        let mut enc = encoder(1 << 20);
        configure(&mut enc, 8, 8);
        enc.encode(0x41, &grey(4, 8, 0x11), 0).unwrap();
        enc.encode(0x4E2D, &grey(8, 8, 0x22), 1).unwrap();
        enc.flush().unwrap();

        let mut dec = reopen(&enc);
        assert_eq!(dec.count(), 2);
        assert_eq!(dec.width(0x41, 8), 4);
        assert_eq!(dec.width(0x4E2D, 8), 8);
        assert_eq!(dec.horioff(0x4E2D, 8), 1);
        // Unpopulated code in a populated section reads back as absent.
        assert_eq!(dec.width(0x42, 8), 0);

        match dec.decode(0x4E2D, 8).unwrap().data {
            GlyphData::Bitmap(b) => assert!(b.buffer[..64].iter().all(|&p| p == 0x22)),
            _ => unreachable!(),
        }
        match dec.decode(0x41, 8).unwrap().data {
            GlyphData::Bitmap(b) => assert!(b.buffer[..32].iter().all(|&p| p == 0x11)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn glyphs_of_varying_width_land_at_their_offsets() {
        let mut enc = encoder(1 << 16);
        configure(&mut enc, 4, 8);
        for (code, width) in [(0x30u16, 1i16), (0x31, 7), (0x32, 3)] {
            enc.encode(code, &grey(width, 4, code as u8), 0).unwrap();
        }
        enc.flush().unwrap();

        let mut dec = reopen(&enc);
        for (code, width) in [(0x30u16, 1i16), (0x31, 7), (0x32, 3)] {
            let glyph = dec.decode(code, 4).unwrap();
            assert_eq!(glyph.width, width);
            match glyph.data {
                GlyphData::Bitmap(b) => {
                    assert_eq!(b.pitch, width);
                    assert!(b.buffer[..b.data_len()].iter().all(|&p| p == code as u8));
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn reencoding_a_code_replaces_the_record() {
        let mut enc = encoder(1 << 16);
        configure(&mut enc, 4, 8);
        enc.encode(0x41, &grey(4, 4, 0x10), 0).unwrap();
        enc.encode(0x41, &grey(4, 4, 0x20), 0).unwrap();
        assert_eq!(enc.count(), 1);
        enc.flush().unwrap();

        let mut dec = reopen(&enc);
        assert_eq!(dec.count(), 1);
        match dec.decode(0x41, 4).unwrap().data {
            GlyphData::Bitmap(b) => assert!(b.buffer[..16].iter().all(|&p| p == 0x20)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn mismatched_bitmaps_are_rejected() {
        let mut enc = encoder(1 << 16);
        configure(&mut enc, 8, 8);
        // Wrong height.
        assert!(enc.encode(0x41, &grey(4, 4, 0), 0).is_err());
        // Wrong depth.
        let mono = Bitmap::from_buffer(8, 8, 1, vec![0; 8]).unwrap();
        assert!(enc.encode(0x41, &mono, 0).is_err());
        // Wider than three times the box height.
        assert!(enc.encode(0x41, &grey(25, 8, 0), 0).is_err());
        assert_eq!(enc.count(), 0);
    }

    #[test]
    fn encode_before_parameters_fails() {
        let mut enc = encoder(1 << 16);
        assert!(enc.encode(0x41, &grey(4, 4, 0), 0).is_err());
        enc.set_param(Param::Height, 4).unwrap();
        // Height alone is not enough.
        assert!(enc.encode(0x41, &grey(4, 4, 0), 0).is_err());
        enc.set_param(Param::BitCount, 8).unwrap();
        assert!(enc.encode(0x41, &grey(4, 4, 0), 0).is_ok());
    }

    #[test]
    fn compression_stores_length_prefixed_records() {
        let mut enc = encoder(1 << 16);
        configure(&mut enc, 4, 8);
        enc.set_param(Param::Compress, 1).unwrap();
        enc.encode(0x41, &grey(4, 4, 0x42), 0).unwrap();
        enc.encode(0x42, &grey(4, 4, 0x44), 0).unwrap();
        enc.flush().unwrap();

        let mut dec = reopen(&enc);
        for (code, fill) in [(0x41u16, 0x42u8), (0x42, 0x44)] {
            match dec.decode(code, 4).unwrap().data {
                GlyphData::Bitmap(b) => {
                    let expected = ((fill >> 1) << 1) | 1;
                    assert!(b.buffer[..16].iter().all(|&p| p == expected));
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn cache_slots_fill_then_stop_interning() {
        let mut enc = encoder(1 << 16);
        configure(&mut enc, 4, 8);
        for code in 0x41u16..0x45 {
            enc.encode(code, &grey(4, 4, code as u8), 0).unwrap();
        }
        enc.flush().unwrap();

        let mut dec = reopen(&enc);
        dec.set_param(Param::CacheItem, 2).unwrap();
        // More glyphs than slots: the first two intern, the rest keep
        // streaming, and every decode stays correct.
        for _ in 0..2 {
            for code in 0x41u16..0x45 {
                match dec.decode(code, 4).unwrap().data {
                    GlyphData::Bitmap(b) => {
                        assert!(b.buffer[..16].iter().all(|&p| p == code as u8))
                    }
                    _ => unreachable!(),
                }
            }
        }
    }
}
