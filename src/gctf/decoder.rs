use arrayvec::ArrayVec;

use crate::error::{bail_if, GryphErr};
use crate::gctf::{SlotInfo, HEADER_LEN, MAGIC, SLOT_MAX};
use crate::loader::Loader;
use crate::stream::Stream;
use crate::types::{Glyph, Param};
use crate::Library;

/// Decoder over a combine container: one child [`Loader`] per occupied
/// slot, each probing its own windowed sub-stream. Requests are routed to
/// the first child that reports the glyph present.
pub struct CombineDecoder {
    children: ArrayVec<Loader, SLOT_MAX>,
}

impl CombineDecoder {
    pub fn new(library: &Library, mut stream: Stream) -> Result<Self, GryphErr> {
        stream.seek(0)?;
        let mut header_bytes = [0u8; HEADER_LEN];
        stream.read_exact(&mut header_bytes)?;
        let mut input = &header_bytes[..];
        let mut magic = [0u8; 4];
        bytes::Buf::copy_to_slice(&mut input, &mut magic);
        bail_if!(&magic != MAGIC, InvalidFormat);

        let mut children = ArrayVec::new();
        for _ in 0..SLOT_MAX {
            let slot = SlotInfo::parse(&mut input)?;
            if slot.data_size == 0 {
                continue;
            }
            let loader = Loader::new_stream(library, &stream, slot.data_off, slot.data_size)?;
            children.push(loader);
        }
        Ok(CombineDecoder { children })
    }

    fn serving_child(&self, code: u16) -> Option<&Loader> {
        self.children.iter().find(|child| child.is_exist(code))
    }

    fn serving_child_mut(&mut self, code: u16) -> Option<&mut Loader> {
        self.children.iter_mut().find(|child| child.is_exist(code))
    }

    /// Broadcast to every child; succeeds when at least one accepts.
    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        let mut accepted = false;
        for child in self.children.iter_mut() {
            accepted |= child.set_param(param, value).is_ok();
        }
        bail_if!(!accepted, Unsupported);
        Ok(())
    }

    /// Sum of the child glyph counts.
    pub fn count(&self) -> u32 {
        self.children.iter().map(|child| child.count()).sum()
    }

    /// Always 0: each slot carries its own box height.
    pub fn height(&self) -> i16 {
        0
    }

    pub fn width(&self, code: u16, size: i16) -> i16 {
        self.serving_child(code)
            .map(|child| child.width(code, size))
            .unwrap_or(0)
    }

    pub fn advance(&self, code: u16, size: i16) -> i16 {
        self.serving_child(code)
            .map(|child| child.advance(code, size))
            .unwrap_or(0)
    }

    pub fn decode(&mut self, code: u16, size: i16) -> Result<Glyph<'_>, GryphErr> {
        match self.serving_child_mut(code) {
            Some(child) => child.decode(code, size),
            None => Err(GryphErr::NotFound),
        }
    }
}
