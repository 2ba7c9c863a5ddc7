//! The `gctf` combine container: up to five embedded gbtf/gvtf files, each
//! in its own byte range, dispatched per glyph by existence.

pub(crate) mod decoder;
pub(crate) mod encoder;

pub use decoder::CombineDecoder;
pub use encoder::CombineEncoder;

use bytes::{Buf, BufMut};

use crate::error::GryphErr;

pub(crate) const MAGIC: &[u8; 4] = b"gctf";

/// Number of embeddable child files.
pub(crate) const SLOT_MAX: usize = 5;

/// Magic plus five slot records.
pub(crate) const HEADER_LEN: usize = 4 + SLOT_MAX * 12;

/// One slot of the combine header. `data_off` is absolute from the start of
/// the file; an empty slot has `data_size == 0`.
#[derive(Clone, Copy, Default)]
pub(crate) struct SlotInfo {
    pub height: u32,
    pub data_off: u32,
    pub data_size: u32,
}

impl SlotInfo {
    pub fn parse(input: &mut impl Buf) -> Result<Self, GryphErr> {
        Ok(SlotInfo {
            height: input.try_get_u32_le()?,
            data_off: input.try_get_u32_le()?,
            data_size: input.try_get_u32_le()?,
        })
    }

    pub fn write(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.height);
        out.put_u32_le(self.data_off);
        out.put_u32_le(self.data_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_info_round_trips() {
        let slot = SlotInfo {
            height: 16,
            data_off: 64,
            data_size: 1024,
        };
        let mut bytes = Vec::new();
        slot.write(&mut bytes);
        assert_eq!(bytes.len(), 12);
        let parsed = SlotInfo::parse(&mut &bytes[..]).unwrap();
        assert_eq!(parsed.height, 16);
        assert_eq!(parsed.data_off, 64);
        assert_eq!(parsed.data_size, 1024);
    }
}
