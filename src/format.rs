//! Container format descriptors and the probe that routes a stream to one.

use font_types::Tag;

use crate::stream::Stream;

/// Which codec family a descriptor stands for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FormatKind {
    Vector,
    Bitmap,
    Combine,
}

/// One entry in the registry: the on-disk magic plus the short tag used for
/// the encoder's extension-based fallback probe.
#[derive(Clone, Copy)]
pub struct Format {
    pub kind: FormatKind,
    pub magic: Tag,
    pub extension: &'static str,
}

pub const VECTOR_FORMAT: Format = Format {
    kind: FormatKind::Vector,
    magic: Tag::new(b"gvtf"),
    extension: "gvf",
};

pub const BITMAP_FORMAT: Format = Format {
    kind: FormatKind::Bitmap,
    magic: Tag::new(b"gbtf"),
    extension: "gbf",
};

pub const COMBINE_FORMAT: Format = Format {
    kind: FormatKind::Combine,
    magic: Tag::new(b"gctf"),
    extension: "gcf",
};

impl Format {
    /// Whether the stream starts with this format's magic. A stream too
    /// short to hold a magic (a freshly created output file, say) simply
    /// fails the probe.
    pub fn probe(&self, stream: &mut Stream) -> bool {
        if stream.seek(0).is_err() {
            return false;
        }
        let mut magic = [0u8; 4];
        match stream.read(&mut magic) {
            Ok(4) => Tag::new(&magic) == self.magic,
            _ => false,
        }
    }

    /// Whether `path` carries this format's extension. Used to pick an
    /// encoder for an empty output file.
    pub fn matches_extension(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(self.extension))
    }
}

/// Formats in probe order. The registry is built head-first (combine,
/// bitmap, vector inserted in that order), so probing walks vector, bitmap,
/// combine and the first match wins.
pub static FORMATS: [Format; 3] = [VECTOR_FORMAT, BITMAP_FORMAT, COMBINE_FORMAT];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_matches_magic() {
        let mut s = Stream::memory(b"gbtf\x00\x00\x00\x00".to_vec());
        assert!(BITMAP_FORMAT.probe(&mut s));
        assert!(!VECTOR_FORMAT.probe(&mut s));
        assert!(!COMBINE_FORMAT.probe(&mut s));
    }

    #[test]
    fn probe_rejects_short_streams() {
        let mut s = Stream::memory(b"gb".to_vec());
        assert!(!BITMAP_FORMAT.probe(&mut s));
    }

    #[test]
    fn extension_fallback_is_case_insensitive() {
        assert!(BITMAP_FORMAT.matches_extension(std::path::Path::new("out.GBF")));
        assert!(VECTOR_FORMAT.matches_extension(std::path::Path::new("fonts/out.gvf")));
        assert!(!COMBINE_FORMAT.matches_extension(std::path::Path::new("out.gbf")));
    }
}
