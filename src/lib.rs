//! Pure-Rust decoding and encoding of grey-scale glyph containers.
//!
//! Three sibling formats share one Unicode-section-indexed table layout:
//!
//! * `gbtf` — bitmap glyphs (1-bpp or 8-bpp, optional byte-RLE),
//! * `gvtf` — vector glyphs as packed quadratic/cubic outlines,
//! * `gctf` — a combine container of up to five embedded fonts.
//!
//! A [`Loader`] probes a file, memory buffer or sub-stream and exposes the
//! matching decoder; a [`Creator`] accumulates glyphs and serializes a
//! container on flush; a [`Layout`] turns decoded glyphs into ready bitmaps
//! at a requested size and depth, rasterizing outlines with the analytical
//! anti-aliased converter in [`raster`] and applying synthetic bold and
//! italic on the way out.
//!
//! ```no_run
//! use gryph::{Layout, Library, Loader};
//!
//! # fn main() -> Result<(), gryph::GryphErr> {
//! let library = Library::new();
//! let loader = Loader::new(&library, "font.gbf")?;
//! let mut layout = Layout::new(loader, 16, 8, false, false)?;
//! let bitmap = layout.load_char(0x4E2D as u16)?;
//! assert_eq!(bitmap.height, 16);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod raster;
pub mod section;
pub mod stream;
pub mod types;

mod creator;
mod format;
mod gbtf;
mod gctf;
mod gvtf;
mod layout;
mod loader;
mod tables;

pub use creator::{Creator, Encoder};
pub use error::GryphErr;
pub use gbtf::{BitmapDecoder, BitmapEncoder};
pub use gctf::{CombineDecoder, CombineEncoder};
pub use gvtf::{VectorDecoder, VectorEncoder};
pub use layout::Layout;
pub use loader::{Decoder, Loader};
pub use raster::Raster;
pub use stream::Stream;
pub use types::{Bitmap, EncodeData, Glyph, GlyphData, Outline, Param, Point};

use format::Format;

/// The top-level handle owning the format registry. Loaders, creators and
/// layouts derived from one library are independent siblings.
pub struct Library {
    formats: &'static [Format],
}

impl Library {
    pub fn new() -> Self {
        Library {
            formats: &format::FORMATS,
        }
    }

    pub(crate) fn formats(&self) -> &[Format] {
        self.formats
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
