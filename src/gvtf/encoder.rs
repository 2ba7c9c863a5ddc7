use bytes::BufMut;

use crate::error::{bail_if, GryphErr};
use crate::gvtf::{packed, InfoHeader, MAGIC};
use crate::stream::Stream;
use crate::tables::{set_ram, FlatTables, INFO_HEADER_LEN, MAX_CODE};
use crate::types::{Outline, Param};

/// Accumulates vector glyphs (packed at store time) and serializes the
/// container on flush.
pub struct VectorEncoder {
    stream: Stream,
    info: InfoHeader,
    tables: FlatTables,
    /// Per-code packed outline blobs.
    glyphs: Vec<Option<Vec<u8>>>,
    height: i16,
    applied: Option<i16>,
    item_count: u32,
    pub(crate) dirty: bool,
}

impl VectorEncoder {
    pub fn new(stream: Stream) -> Self {
        let mut glyphs = Vec::new();
        glyphs.resize_with(MAX_CODE, || None);
        VectorEncoder {
            stream,
            info: InfoHeader::new(),
            tables: FlatTables::new(),
            glyphs,
            height: 0,
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
        self.info.max_points = 0;
        self.info.max_contours = 0;
    }

    fn apply_params(&mut self) {
        if let Some(previous) = self.applied {
            if previous != self.height {
                self.clear_glyphs();
            }
        }
        self.applied = Some(self.height);
        self.info.height = self.height;
        if self.ready() {
            self.dirty = true;
        }
    }

    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        match param {
            Param::Height => self.height = value as i16,
            _ => return Err(GryphErr::Unsupported),
        }
        self.apply_params();
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.item_count
    }

    pub(crate) fn ready(&self) -> bool {
        self.height != 0
    }

    /// Store one glyph outline (26.6 coordinates at the configured box
    /// height). `width` and `horioff` are the glyph's metrics at that
    /// height.
    pub fn encode(
        &mut self,
        code: u16,
        outline: &Outline,
        width: i16,
        horioff: i16,
    ) -> Result<(), GryphErr> {
        bail_if!(!self.ready() || self.applied.is_none(), InvalidArgument);
        bail_if!(width <= 0 || width > 255, InvalidArgument);
        bail_if!(outline.n_points() > 255 || outline.n_contours() > 255, InvalidArgument);
        bail_if!(
            outline.points.len() != outline.tags.len(),
            InvalidArgument
        );

        let record = packed::pack(outline)?;
        if self.info.width < width {
            self.info.width = width;
        }
        if self.info.max_points < outline.n_points() as i16 {
            self.info.max_points = outline.n_points() as i16;
        }
        if self.info.max_contours < outline.n_contours() as i16 {
            self.info.max_contours = outline.n_contours() as i16;
        }

        if self.glyphs[code as usize].is_none() {
            self.item_count += 1;
        }
        self.glyphs[code as usize] = Some(record);
        self.tables.offsets[code as usize] = set_ram(code as u32);
        self.tables.widths[code as usize] = width as u8;
        self.tables.horioffs[code as usize] = horioff as i8;
        self.dirty = true;
        Ok(())
    }

    pub fn delete(&mut self, code: u16) {
        self.tables.delete(code);
        if self.glyphs[code as usize].take().is_some() {
            self.item_count = self.item_count.saturating_sub(1);
            self.dirty = true;
        }
    }

    fn build_all(&mut self) {
        let (width_len, offset_len) = self
            .tables
            .build_section_blocks(&mut self.info.width_section, &mut self.info.index_section);

        let mut payload: u32 = 0;
        let mut count: u32 = 0;
        for code in 0..MAX_CODE {
            if let Some(record) = &self.glyphs[code] {
                self.tables.offsets[code] = payload;
                payload += record.len() as u32 + 2;
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

        for code in 0..MAX_CODE {
            if let Some(record) = &self.glyphs[code] {
                self.stream.write_all(&(record.len() as u16).to_le_bytes())?;
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
