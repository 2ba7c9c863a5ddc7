//! Section-indexed glyph table machinery shared by the gbtf and gvtf codecs.
//!
//! Both formats store three dense per-glyph arrays (widths `u8`, horizontal
//! offsets `i8`, payload offsets `u32`) that are populated only for sections
//! actually present in the file. Two 146-entry section-offset blocks in the
//! info header map a code point into those arrays: a zero entry means "this
//! section has no glyphs", a non-zero entry is the one-based start of the
//! section's slice.

use bytes::{Buf, BufMut};

use crate::error::{bail_if, GryphErr};
use crate::section::{section_index, section_len, section_range, SECTION_COUNT};
use crate::stream::Stream;

/// Highest encodable code point + 1 (BMP only).
pub(crate) const MAX_CODE: usize = 0x10000;

/// High bit of an offset-table entry: the value is a cache-slot index, not a
/// file offset.
pub(crate) const RAM_MASK: u32 = 0x8000_0000;

#[inline]
pub(crate) fn in_ram(offset: u32) -> bool {
    offset & RAM_MASK != 0
}

#[inline]
pub(crate) fn set_ram(index: u32) -> u32 {
    index | RAM_MASK
}

#[inline]
pub(crate) fn ram_index(offset: u32) -> u32 {
    offset & !RAM_MASK
}

/// Serialized size of one section-offset block.
pub(crate) const SECTION_BLOCK_LEN: usize = SECTION_COUNT * 2;

/// The fixed part of a gbtf/gvtf info header (the fields before the two
/// section blocks).
pub(crate) const INFO_FIXED_LEN: usize = 32;

/// Full info header size; also the value of the header's own `size` field.
pub(crate) const INFO_HEADER_LEN: usize = INFO_FIXED_LEN + 2 * SECTION_BLOCK_LEN;

/// File offset of the dense tables: file magic plus info header. All table
/// and payload offsets in the header are relative to this.
pub(crate) const HEADER_BASE: u32 = 4 + INFO_HEADER_LEN as u32;

/// One 146-entry section-offset block.
#[derive(Clone)]
pub(crate) struct SectionBlock(pub [u16; SECTION_COUNT]);

impl SectionBlock {
    pub fn new() -> Self {
        SectionBlock([0; SECTION_COUNT])
    }

    pub fn parse(input: &mut impl Buf) -> Result<Self, GryphErr> {
        let mut entries = [0u16; SECTION_COUNT];
        for entry in entries.iter_mut() {
            *entry = input.try_get_u16_le()?;
        }
        Ok(SectionBlock(entries))
    }

    pub fn write(&self, out: &mut impl BufMut) {
        for &entry in self.0.iter() {
            out.put_u16_le(entry);
        }
    }

    pub fn clear(&mut self) {
        self.0 = [0; SECTION_COUNT];
    }

    /// Dense-array position of `code`, or `None` when its section carries no
    /// glyphs (or the code falls outside every section).
    pub fn dense_index(&self, code: u16) -> Option<usize> {
        let section = section_index(code);
        if section >= SECTION_COUNT {
            return None;
        }
        let start = self.0[section] as usize;
        if start == 0 {
            return None;
        }
        let (min, _) = section_range(section);
        Some(start - 1 + (code - min) as usize)
    }
}

/// The decoder's owned copies of the three dense tables, loaded once at
/// open from the offsets in the info header.
pub(crate) struct IndexTables {
    pub widths: Vec<u8>,
    pub horioffs: Vec<i8>,
    pub offsets: Vec<u32>,
}

impl IndexTables {
    pub fn load(
        stream: &mut Stream,
        width_tab_off: u32,
        horioff_tab_off: u32,
        offset_tab_off: u32,
        off_grey_bits: u32,
    ) -> Result<Self, GryphErr> {
        bail_if!(
            horioff_tab_off < width_tab_off
                || offset_tab_off < horioff_tab_off
                || off_grey_bits < offset_tab_off,
            InvalidFormat
        );

        let width_len = (horioff_tab_off - width_tab_off) as usize;
        let mut widths = vec![0u8; width_len];
        if width_len > 0 {
            stream.seek(HEADER_BASE + width_tab_off)?;
            stream.read_exact(&mut widths)?;
        }

        let horioff_len = (offset_tab_off - horioff_tab_off) as usize;
        let mut raw_horioffs = vec![0u8; horioff_len];
        if horioff_len > 0 {
            stream.seek(HEADER_BASE + horioff_tab_off)?;
            stream.read_exact(&mut raw_horioffs)?;
        }
        let horioffs = raw_horioffs.into_iter().map(|b| b as i8).collect();

        let offset_len = (off_grey_bits - offset_tab_off) as usize;
        bail_if!(offset_len % 4 != 0, InvalidFormat);
        let mut raw_offsets = vec![0u8; offset_len];
        if offset_len > 0 {
            stream.seek(HEADER_BASE + offset_tab_off)?;
            stream.read_exact(&mut raw_offsets)?;
        }
        let mut input = &raw_offsets[..];
        let mut offsets = Vec::with_capacity(offset_len / 4);
        while input.has_remaining() {
            offsets.push(input.try_get_u32_le()?);
        }

        Ok(IndexTables {
            widths,
            horioffs,
            offsets,
        })
    }
}

/// Encoder-side accumulation tables, indexed directly by code point.
pub(crate) struct FlatTables {
    pub widths: Vec<u8>,
    pub horioffs: Vec<i8>,
    pub offsets: Vec<u32>,
}

impl FlatTables {
    pub fn new() -> Self {
        FlatTables {
            widths: vec![0; MAX_CODE],
            horioffs: vec![0; MAX_CODE],
            offsets: vec![0; MAX_CODE],
        }
    }

    pub fn clear(&mut self) {
        self.widths.iter_mut().for_each(|w| *w = 0);
        self.horioffs.iter_mut().for_each(|h| *h = 0);
        self.offsets.iter_mut().for_each(|o| *o = 0);
    }

    pub fn delete(&mut self, code: u16) {
        self.widths[code as usize] = 0;
        self.horioffs[code as usize] = 0;
        self.offsets[code as usize] = 0;
    }

    /// Populate the two section blocks from the occupied sections and return
    /// `(width_table_len, offset_table_len)` in bytes. A section is occupied
    /// when any of its codes has a non-zero width.
    pub fn build_section_blocks(
        &self,
        width_block: &mut SectionBlock,
        index_block: &mut SectionBlock,
    ) -> (u32, u32) {
        width_block.clear();
        index_block.clear();
        let mut width_total: u32 = 0;
        let mut offset_total: u32 = 0;
        for section in 0..SECTION_COUNT {
            let (min, max) = section_range(section);
            let occupied = (min..=max).any(|code| self.widths[code as usize] != 0);
            if occupied {
                width_block.0[section] = width_total as u16 + 1;
                index_block.0[section] = (offset_total / 4) as u16 + 1;
                let len = section_len(section) as u32;
                width_total += len;
                offset_total += 4 * len;
            }
        }
        (width_total, offset_total)
    }

    /// Serialize the dense slices of every occupied section: widths first,
    /// then horizontal offsets, then payload offsets.
    pub fn write_dense_tables(
        &self,
        width_block: &SectionBlock,
        index_block: &SectionBlock,
        stream: &mut Stream,
    ) -> Result<(), GryphErr> {
        for section in 0..SECTION_COUNT {
            if width_block.0[section] == 0 {
                continue;
            }
            let (min, max) = section_range(section);
            stream.write_all(&self.widths[min as usize..=max as usize])?;
        }
        for section in 0..SECTION_COUNT {
            if width_block.0[section] == 0 {
                continue;
            }
            let (min, max) = section_range(section);
            let mut bytes = Vec::with_capacity(section_len(section));
            bytes.extend(
                self.horioffs[min as usize..=max as usize]
                    .iter()
                    .map(|&h| h as u8),
            );
            stream.write_all(&bytes)?;
        }
        for section in 0..SECTION_COUNT {
            if index_block.0[section] == 0 {
                continue;
            }
            let (min, max) = section_range(section);
            let mut bytes = Vec::with_capacity(section_len(section) * 4);
            for &offset in self.offsets[min as usize..=max as usize].iter() {
                bytes.put_u32_le(offset);
            }
            stream.write_all(&bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_index_resolves_one_based_starts() {
        let mut block = SectionBlock::new();
        // Pretend Basic Latin starts the dense arrays and Cyrillic follows.
        block.0[0] = 1;
        block.0[8] = 97; // 96 Basic Latin codes precede it
        assert_eq!(block.dense_index(0x0020), Some(0));
        assert_eq!(block.dense_index(0x0041), Some(0x21));
        assert_eq!(block.dense_index(0x0400), Some(96));
        assert_eq!(block.dense_index(0x0100), None);
        assert_eq!(block.dense_index(0x0000), None);
    }

    #[test]
    fn section_block_round_trips() {
        let mut block = SectionBlock::new();
        block.0[0] = 1;
        block.0[145] = 0x1234;
        let mut bytes = Vec::new();
        block.write(&mut bytes);
        assert_eq!(bytes.len(), SECTION_BLOCK_LEN);
        let parsed = SectionBlock::parse(&mut &bytes[..]).unwrap();
        assert_eq!(parsed.0, block.0);
    }

    #[test]
    fn build_section_blocks_counts_whole_sections() {
        let mut tables = FlatTables::new();
        tables.widths[0x41] = 8; // Basic Latin, 96 codes
        tables.widths[0x4E2D] = 16; // CJK Unified Ideographs
        let mut width_block = SectionBlock::new();
        let mut index_block = SectionBlock::new();
        let (wlen, olen) = tables.build_section_blocks(&mut width_block, &mut index_block);
        let latin = section_len(section_index(0x41)) as u32;
        let cjk = section_len(section_index(0x4E2D)) as u32;
        assert_eq!(wlen, latin + cjk);
        assert_eq!(olen, 4 * (latin + cjk));
        assert_eq!(width_block.0[0], 1);
        assert_eq!(index_block.0[0], 1);
        assert_eq!(width_block.0[section_index(0x4E2D)], latin as u16 + 1);
        assert_eq!(index_block.0[section_index(0x4E2D)], latin as u16 + 1);
    }

    #[test]
    fn ram_mask_round_trips() {
        let tagged = set_ram(42);
        assert!(in_ram(tagged));
        assert_eq!(ram_index(tagged), 42);
        assert!(!in_ram(42));
    }
}
