use crate::error::{bail_if, GryphErr};
use crate::gbtf::{rle, InfoHeader, MAGIC};
use crate::stream::Stream;
use crate::tables::{in_ram, ram_index, set_ram, IndexTables, HEADER_BASE};
use crate::types::{row_pitch, Bitmap, Glyph, GlyphData, Param};

/// Demand decoder over an open gbtf stream.
///
/// Headers and the three dense index tables are read once at open; glyph
/// records are fetched on first decode and optionally interned in RAM cache
/// slots (see [`Param::CacheItem`]).
pub struct BitmapDecoder {
    stream: Stream,
    info: InfoHeader,
    tables: IndexTables,
    /// Staging bitmap handed out by `decode`, sized for the widest glyph.
    bitmap: Bitmap,
    /// Read buffer for one raw or compressed glyph record.
    scratch: Vec<u8>,
    /// Interned raw records; offset-table entries with the RAM bit index
    /// into this.
    cache: Vec<Vec<u8>>,
    cache_cap: usize,
}

impl BitmapDecoder {
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

        let bitmap = Bitmap::new(info.width.max(1), info.height, info.bitcount);
        let scratch = vec![0u8; bitmap.data_len().max(2)];

        Ok(BitmapDecoder {
            stream,
            info,
            tables,
            bitmap,
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
                // Sizing the cache twice would orphan live slot indices.
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
        // The horioff table shares the width table's section block.
        match self.info.width_section.dense_index(code) {
            Some(idx) => self.tables.horioffs.get(idx).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// Width of `code` scaled to `size`, or 0 when absent.
    pub fn width(&self, code: u16, size: i16) -> i16 {
        (size as i32 * self.raw_width(code) as i32 / self.info.height as i32) as i16
    }

    /// Horizontal bearing of `code` scaled to `size`.
    pub fn horioff(&self, code: u16, size: i16) -> i16 {
        (size as i32 * self.raw_horioff(code) as i32 / self.info.height as i32) as i16
    }

    /// Pen advance of `code` scaled to `size`, clamped at zero.
    pub fn advance(&self, code: u16, size: i16) -> i16 {
        let advance = self.width(code, size) + self.horioff(code, size);
        advance.max(0)
    }

    fn intern(&mut self, code: u16, len: usize) {
        if self.cache.len() >= self.cache_cap {
            return;
        }
        let Some(idx) = self.info.index_section.dense_index(code) else {
            return;
        };
        if idx >= self.tables.offsets.len() {
            return;
        }
        self.cache.push(self.scratch[..len].to_vec());
        self.tables.offsets[idx] = set_ram(self.cache.len() as u32 - 1);
    }

    /// Decode one glyph. The bitmap stays at the file's resolution; `size`
    /// only scales the reported horizontal bearing.
    pub fn decode(&mut self, code: u16, size: i16) -> Result<Glyph<'_>, GryphErr> {
        let raw_width = self.raw_width(code);
        bail_if!(raw_width == 0, NotFound);
        let offset = match self.info.index_section.dense_index(code) {
            Some(idx) => *self.tables.offsets.get(idx).ok_or(GryphErr::InvalidFormat)?,
            None => return Err(GryphErr::NotFound),
        };
        let horioff = self.horioff(code, size);

        self.bitmap.width = raw_width as i16;
        self.bitmap.pitch = row_pitch(self.info.bitcount, raw_width as i16);
        self.bitmap.horioff = horioff;
        let data_len = self.bitmap.data_len();
        if self.bitmap.buffer.len() < data_len {
            self.bitmap.buffer.resize(data_len, 0);
        }

        if in_ram(offset) {
            let record = self
                .cache
                .get(ram_index(offset) as usize)
                .ok_or(GryphErr::InvalidFormat)?;
            if self.info.compressed() {
                let n = rle::decode_into(record, &mut self.bitmap.buffer[..data_len])?;
                bail_if!(n != data_len, InvalidFormat);
            } else {
                bail_if!(record.len() < data_len, InvalidFormat);
                self.bitmap.buffer[..data_len].copy_from_slice(&record[..data_len]);
            }
        } else {
            self.stream
                .seek(self.info.off_grey_bits + HEADER_BASE + offset)?;
            let record_len = if self.info.compressed() {
                let mut prefix = [0u8; 2];
                self.stream.read_exact(&mut prefix)?;
                u16::from_le_bytes(prefix) as usize
            } else {
                data_len
            };
            bail_if!(record_len > self.scratch.len(), InvalidFormat);
            self.stream.read_exact(&mut self.scratch[..record_len])?;
            self.intern(code, record_len);

            if self.info.compressed() {
                let n = rle::decode_into(
                    &self.scratch[..record_len],
                    &mut self.bitmap.buffer[..data_len],
                )?;
                bail_if!(n != data_len, InvalidFormat);
            } else {
                let (scratch, bitmap) = (&self.scratch, &mut self.bitmap);
                bitmap.buffer[..data_len].copy_from_slice(&scratch[..data_len]);
            }
        }

        Ok(Glyph {
            width: raw_width as i16,
            horioff,
            data: GlyphData::Bitmap(&mut self.bitmap),
        })
    }
}
