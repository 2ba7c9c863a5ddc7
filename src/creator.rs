//! Encode-side handle: routes an output stream to an encoder, either by
//! probing existing content or by the output path's extension.

use std::path::Path;

use crate::error::{bail, GryphErr};
use crate::format::FormatKind;
use crate::gbtf::BitmapEncoder;
use crate::gctf::CombineEncoder;
use crate::gvtf::VectorEncoder;
use crate::stream::Stream;
use crate::types::{EncodeData, Param};
use crate::Library;

/// An encoder for one of the three container formats.
pub enum Encoder {
    Bitmap(BitmapEncoder),
    Vector(VectorEncoder),
    Combine(CombineEncoder),
}

impl Encoder {
    fn dirty(&self) -> bool {
        match self {
            Encoder::Bitmap(e) => e.dirty,
            Encoder::Vector(e) => e.dirty,
            Encoder::Combine(e) => e.dirty,
        }
    }
}

/// An output font being assembled. Dropping a dirty creator flushes it
/// best-effort; call [`Creator::flush`] to observe errors.
pub struct Creator {
    encoder: Encoder,
}

impl Creator {
    /// Create an output font file. The format comes from the file content
    /// when present, otherwise from the path extension (`.gbf`, `.gvf`,
    /// `.gcf`).
    pub fn new(library: &Library, path: impl AsRef<Path>) -> Result<Self, GryphErr> {
        let stream = Stream::create(path)?;
        Self::probe(library, stream)
    }

    /// Assemble a font into a caller-sized memory buffer. The buffer must
    /// already start with the intended format's magic (memory streams have
    /// no pathname to fall back on).
    pub fn new_memory(library: &Library, data: Vec<u8>) -> Result<Self, GryphErr> {
        Self::probe(library, Stream::memory(data))
    }

    fn probe(library: &Library, mut stream: Stream) -> Result<Self, GryphErr> {
        for format in library.formats() {
            let matched = format.probe(&mut stream)
                || stream
                    .path()
                    .is_some_and(|path| format.matches_extension(path));
            if matched {
                let encoder = match format.kind {
                    FormatKind::Bitmap => Encoder::Bitmap(BitmapEncoder::new(stream)),
                    FormatKind::Vector => Encoder::Vector(VectorEncoder::new(stream)),
                    FormatKind::Combine => Encoder::Combine(CombineEncoder::new(stream)),
                };
                return Ok(Creator { encoder });
            }
        }
        bail!(InvalidFormat)
    }

    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        match &mut self.encoder {
            Encoder::Bitmap(e) => e.set_param(param, value),
            Encoder::Vector(e) => e.set_param(param, value),
            // The combine container has no parameters of its own.
            Encoder::Combine(_) => Ok(()),
        }
    }

    pub fn count(&self) -> u32 {
        match &self.encoder {
            Encoder::Bitmap(e) => e.count(),
            Encoder::Vector(e) => e.count(),
            Encoder::Combine(e) => e.count(),
        }
    }

    /// Store one glyph (or, for a combine font, one embedded child file).
    pub fn save_char(&mut self, code: u16, data: EncodeData<'_>) -> Result<(), GryphErr> {
        match (&mut self.encoder, data) {
            (Encoder::Bitmap(e), EncodeData::Bitmap { bitmap, horioff }) => {
                e.encode(code, bitmap, horioff)
            }
            (
                Encoder::Vector(e),
                EncodeData::Outline {
                    outline,
                    width,
                    horioff,
                },
            ) => e.encode(code, outline, width, horioff),
            (Encoder::Combine(e), EncodeData::Stream(child)) => e.encode(child),
            _ => Err(GryphErr::InvalidArgument),
        }
    }

    /// Remove a stored glyph (for combine fonts: the last stored slot).
    pub fn del_char(&mut self, code: u16) -> Result<(), GryphErr> {
        match &mut self.encoder {
            Encoder::Bitmap(e) => e.delete(code),
            Encoder::Vector(e) => e.delete(code),
            Encoder::Combine(e) => e.delete(),
        }
        Ok(())
    }

    /// Serialize everything accumulated so far, header first.
    pub fn flush(&mut self) -> Result<(), GryphErr> {
        match &mut self.encoder {
            Encoder::Bitmap(e) => e.flush(),
            Encoder::Vector(e) => e.flush(),
            Encoder::Combine(e) => e.flush(),
        }
    }

    /// Snapshot of a memory-backed output buffer. `None` for file outputs.
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        let stream = match &self.encoder {
            Encoder::Bitmap(e) => e.stream(),
            Encoder::Vector(e) => e.stream(),
            Encoder::Combine(e) => e.stream(),
        };
        stream.to_vec()
    }
}

impl Drop for Creator {
    fn drop(&mut self) {
        if self.encoder.dirty() {
            let _ = self.flush();
        }
    }
}
