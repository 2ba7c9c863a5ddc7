//! Decode-side handle: probes a stream against the registry and wires the
//! matching decoder.

use std::path::Path;

use crate::error::{bail, GryphErr};
use crate::format::FormatKind;
use crate::gbtf::BitmapDecoder;
use crate::gctf::CombineDecoder;
use crate::gvtf::VectorDecoder;
use crate::stream::Stream;
use crate::types::{Glyph, Param};
use crate::Library;

/// A decoder for one of the three container formats.
pub enum Decoder {
    Bitmap(BitmapDecoder),
    Vector(VectorDecoder),
    Combine(Box<CombineDecoder>),
}

impl Decoder {
    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        match self {
            Decoder::Bitmap(d) => d.set_param(param, value),
            Decoder::Vector(d) => d.set_param(param, value),
            Decoder::Combine(d) => d.set_param(param, value),
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Decoder::Bitmap(d) => d.count(),
            Decoder::Vector(d) => d.count(),
            Decoder::Combine(d) => d.count(),
        }
    }

    pub fn height(&self) -> i16 {
        match self {
            Decoder::Bitmap(d) => d.height(),
            Decoder::Vector(d) => d.height(),
            Decoder::Combine(d) => d.height(),
        }
    }

    pub fn width(&self, code: u16, size: i16) -> i16 {
        match self {
            Decoder::Bitmap(d) => d.width(code, size),
            Decoder::Vector(d) => d.width(code, size),
            Decoder::Combine(d) => d.width(code, size),
        }
    }

    pub fn advance(&self, code: u16, size: i16) -> i16 {
        match self {
            Decoder::Bitmap(d) => d.advance(code, size),
            Decoder::Vector(d) => d.advance(code, size),
            Decoder::Combine(d) => d.advance(code, size),
        }
    }

    pub fn decode(&mut self, code: u16, size: i16) -> Result<Glyph<'_>, GryphErr> {
        match self {
            Decoder::Bitmap(d) => d.decode(code, size),
            Decoder::Vector(d) => d.decode(code, size),
            Decoder::Combine(d) => d.decode(code, size),
        }
    }
}

/// An open font ready for decoding.
pub struct Loader {
    decoder: Decoder,
}

impl Loader {
    /// Open a font file.
    pub fn new(library: &Library, path: impl AsRef<Path>) -> Result<Self, GryphErr> {
        let stream = Stream::open(path)?;
        Self::probe(library, stream)
    }

    /// Open a font held in memory.
    pub fn new_memory(library: &Library, data: Vec<u8>) -> Result<Self, GryphErr> {
        Self::probe(library, Stream::memory(data))
    }

    /// Open a font embedded in a window of `parent` (combine slots use
    /// this, and callers with their own container formats can too).
    pub fn new_stream(
        library: &Library,
        parent: &Stream,
        offset: u32,
        size: u32,
    ) -> Result<Self, GryphErr> {
        let mut child = parent.child();
        child.set_window(offset, size)?;
        Self::probe(library, child)
    }

    fn probe(library: &Library, mut stream: Stream) -> Result<Self, GryphErr> {
        for format in library.formats() {
            if format.probe(&mut stream) {
                let decoder = match format.kind {
                    FormatKind::Bitmap => Decoder::Bitmap(BitmapDecoder::new(stream)?),
                    FormatKind::Vector => Decoder::Vector(VectorDecoder::new(stream)?),
                    FormatKind::Combine => {
                        Decoder::Combine(Box::new(CombineDecoder::new(library, stream)?))
                    }
                };
                return Ok(Loader { decoder });
            }
        }
        bail!(InvalidFormat)
    }

    pub fn set_param(&mut self, param: Param, value: u32) -> Result<(), GryphErr> {
        self.decoder.set_param(param, value)
    }

    /// Number of glyphs stored in the font.
    pub fn count(&self) -> u32 {
        self.decoder.count()
    }

    /// The font's glyph box height; 0 when unknown (combine containers).
    pub fn height(&self) -> i16 {
        self.decoder.height()
    }

    pub fn width(&self, code: u16, size: i16) -> i16 {
        self.decoder.width(code, size)
    }

    pub fn advance(&self, code: u16, size: i16) -> i16 {
        self.decoder.advance(code, size)
    }

    /// Whether a glyph is stored for `code`.
    pub fn is_exist(&self, code: u16) -> bool {
        self.decoder.width(code, 100) != 0
    }

    pub fn decode(&mut self, code: u16, size: i16) -> Result<Glyph<'_>, GryphErr> {
        self.decoder.decode(code, size)
    }
}
