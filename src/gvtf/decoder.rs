use crate::error::{bail_if, GryphErr};
use crate::gvtf::{packed, InfoHeader, MAGIC};
use crate::stream::Stream;
use crate::tables::{in_ram, ram_index, set_ram, IndexTables, HEADER_BASE};
use crate::types::{Glyph, GlyphData, Outline, Param};

/// Demand decoder over an open gvtf stream.
pub struct VectorDecoder {
    stream: Stream,
    info: InfoHeader,
    tables: IndexTables,
    /// The outline handed out by `decode`, scaled to the requested size.
    outline: Outline,
    /// Unpacked-but-unscaled staging outline (file resolution).
    unpacked: Outline,
    /// Read buffer for one packed glyph record.
    scratch: Vec<u8>,
    /// Interned unpacked outlines at file resolution.
    cache: Vec<Outline>,
    cache_cap: usize,
}

impl VectorDecoder {
    pub fn new(mut stream: Stream) -> Result<Self, GryphErr> {
        stream.seek(0)?;
        let mut magic = [0u8; 4];
        stream.read_exact(&mut magic)?;
        bail_if!(&magic != MAGIC, InvalidFormat);

        let mut header_bytes = [0u8; crate::tables::INFO_HEADER_LEN];
        stream.read_exact(&mut header_bytes)?;
        let info = InfoHeader::parse(&mut &header_bytes[..])?;

        let tables = IndexTables::load(
            &mut stream,
            info.width_tab_off,
            info.horioff_tab_off,
            info.offset_tab_off,
            info.off_grey_bits,
        )?;

        let scratch = vec![
            0u8;
            packed::packed_len(
                info.max_contours.max(1) as usize,
                info.max_points.max(1) as usize
            )
        ];

        Ok(VectorDecoder {
            stream,
            info,
            tables,
            outline: Outline::default(),
            unpacked: Outline::default(),
            scratch,
            cache: Vec::new(),
            cache_cap: 0,
        })
    }

    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        match param {
            Param::CacheItem => {
                if value == 0 {
                    return Ok(());
                }
                bail_if!(self.cache_cap != 0, Unsupported);
                self.cache_cap = value as usize;
                self.cache.reserve(self.cache_cap);
                Ok(())
            }
            _ => Err(GryphErr::Unsupported),
        }
    }

    pub fn count(&self) -> u32 {
        self.info.count
    }

    /// The glyph box height carried by the file.
    pub fn height(&self) -> i16 {
        self.info.height
    }

    fn raw_width(&self, code: u16) -> u8 {
        match self.info.width_section.dense_index(code) {
            Some(idx) => self.tables.widths.get(idx).copied().unwrap_or(0),
            None => 0,
        }
    }

    fn raw_horioff(&self, code: u16) -> i8 {
        match self.info.width_section.dense_index(code) {
            Some(idx) => self.tables.horioffs.get(idx).copied().unwrap_or(0),
            None => 0,
        }
    }

    pub fn width(&self, code: u16, size: i16) -> i16 {
        (size as i32 * self.raw_width(code) as i32 / self.info.height as i32) as i16
    }

    pub fn horioff(&self, code: u16, size: i16) -> i16 {
        (size as i32 * self.raw_horioff(code) as i32 / self.info.height as i32) as i16
    }

    pub fn advance(&self, code: u16, size: i16) -> i16 {
        let advance = self.width(code, size) + self.horioff(code, size);
        advance.max(0)
    }

    fn intern(&mut self, code: u16) {
        if self.cache.len() >= self.cache_cap {
            return;
        }
        let Some(idx) = self.info.index_section.dense_index(code) else {
            return;
        };
        if idx >= self.tables.offsets.len() {
            return;
        }
        self.cache.push(self.unpacked.clone());
        self.tables.offsets[idx] = set_ram(self.cache.len() as u32 - 1);
    }

    /// Decode one glyph as an outline scaled to `size`, in 26.6 units.
    pub fn decode(&mut self, code: u16, size: i16) -> Result<Glyph<'_>, GryphErr> {
        let width = self.width(code, size);
        bail_if!(width == 0, NotFound);
        let offset = match self.info.index_section.dense_index(code) {
            Some(idx) => *self.tables.offsets.get(idx).ok_or(GryphErr::InvalidFormat)?,
            None => return Err(GryphErr::NotFound),
        };
        let horioff = self.horioff(code, size);

        if in_ram(offset) {
            let source = self
                .cache
                .get(ram_index(offset) as usize)
                .ok_or(GryphErr::InvalidFormat)?;
            self.outline.transform_from(source, size, self.info.height);
        } else {
            self.stream
                .seek(self.info.off_grey_bits + HEADER_BASE + offset)?;
            let mut prefix = [0u8; 2];
            self.stream.read_exact(&mut prefix)?;
            let record_len = u16::from_le_bytes(prefix) as usize;
            if self.scratch.len() < record_len {
                self.scratch.resize(record_len, 0);
            }
            self.stream.read_exact(&mut self.scratch[..record_len])?;
            packed::unpack_into(&self.scratch[..record_len], &mut self.unpacked)?;
            self.intern(code);
            let (unpacked, outline) = (&self.unpacked, &mut self.outline);
            outline.transform_from(unpacked, size, self.info.height);
        }

        Ok(Glyph {
            width,
            horioff,
            data: GlyphData::Outline(&self.outline),
        })
    }
}
