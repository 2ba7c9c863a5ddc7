use arrayvec::ArrayVec;
use bytes::BufMut;

use crate::error::{bail_if, GryphErr};
use crate::format::{BITMAP_FORMAT, VECTOR_FORMAT};
use crate::gctf::{SlotInfo, HEADER_LEN, MAGIC, SLOT_MAX};
use crate::stream::Stream;

/// Builds a combine container out of up to five prebuilt child streams.
/// Slot offsets are assigned at flush, absolute from the file start.
pub struct CombineEncoder {
    stream: Stream,
    slots: ArrayVec<(Stream, SlotInfo), SLOT_MAX>,
    pub(crate) dirty: bool,
}

impl CombineEncoder {
    pub fn new(stream: Stream) -> Self {
        CombineEncoder {
            stream,
            slots: ArrayVec::new(),
            dirty: false,
        }
    }

    pub fn count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Accept a finished child file. The stream must be non-empty and must
    /// probe as a gbtf or gvtf container.
    pub fn encode(&mut self, mut child: Stream) -> Result<(), GryphErr> {
        bail_if!(self.slots.is_full(), InvalidArgument);
        let size = child.size();
        bail_if!(size == 0, InvalidArgument);
        let recognized = BITMAP_FORMAT.probe(&mut child) || VECTOR_FORMAT.probe(&mut child);
        bail_if!(!recognized, InvalidFormat);

        let info = SlotInfo {
            height: 0,
            data_off: 0, // assigned at flush
            data_size: size,
        };
        self.slots.push((child, info));
        self.dirty = true;
        Ok(())
    }

    /// Drop the most recently added slot.
    pub fn delete(&mut self) {
        if self.slots.pop().is_some() {
            self.dirty = true;
        }
    }

    pub fn flush(&mut self) -> Result<(), GryphErr> {
        let mut offset = HEADER_LEN as u32;
        for (_, info) in self.slots.iter_mut() {
            info.data_off = offset;
            offset += info.data_size;
        }

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.put_slice(MAGIC);
        for (_, info) in self.slots.iter() {
            info.write(&mut header);
        }
        for _ in self.slots.len()..SLOT_MAX {
            SlotInfo::default().write(&mut header);
        }

        self.stream.seek(0)?;
        self.stream.write_all(&header)?;

        for (child, info) in self.slots.iter_mut() {
            let mut payload = vec![0u8; info.data_size as usize];
            child.seek(0)?;
            child.read_exact(&mut payload)?;
            self.stream.write_all(&payload)?;
        }
        self.dirty = false;
        Ok(())
    }

    pub(crate) fn stream(&self) -> &Stream {
        &self.stream
    }
}
