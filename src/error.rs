use core::fmt;

/// Everything that can go wrong while decoding, encoding or rendering.
#[derive(Debug)]
pub enum GryphErr {
    /// No glyph is stored for the requested code point.
    NotFound,
    /// Null-ish or structurally invalid input (empty outline, bitmap with
    /// mismatched dimensions at encode time, ...).
    InvalidArgument,
    /// Outline violates the decomposition rules (contour starting with a
    /// cubic control point, point count not matching the last contour end,
    /// unpaired cubic control).
    InvalidOutline,
    /// Magic mismatch, impossible header or inconsistent record length.
    InvalidFormat,
    /// The raster pool could not hold the cells of a single scanline.
    PoolOverflow,
    /// The underlying stream failed to read, write or seek.
    Io,
    /// Unknown parameter, or a parameter value the codec cannot honour.
    Unsupported,
}

impl fmt::Display for GryphErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "glyph not found",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidOutline => "invalid outline",
            Self::InvalidFormat => "invalid file format",
            Self::PoolOverflow => "raster pool overflow",
            Self::Io => "stream i/o failed",
            Self::Unsupported => "unsupported parameter",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for GryphErr {}

impl From<bytes::TryGetError> for GryphErr {
    fn from(_value: bytes::TryGetError) -> Self {
        Self::InvalidFormat
    }
}

impl From<std::io::Error> for GryphErr {
    fn from(_value: std::io::Error) -> Self {
        Self::Io
    }
}

#[cfg(not(feature = "debug"))]
mod regular {
    macro_rules! bail {
        ($kind: ident) => {
            return Err($crate::error::GryphErr::$kind)
        };
    }
    pub(crate) use bail;

    macro_rules! bail_if {
        ($cond: expr, $kind: ident) => {
            if $cond {
                return Err($crate::error::GryphErr::$kind);
            }
        };
    }
    pub(crate) use bail_if;
}
#[cfg(not(feature = "debug"))]
pub(crate) use regular::*;

#[cfg(feature = "debug")]
mod debug {
    macro_rules! bail {
        ($kind: ident) => {
            panic!("{}", stringify!($kind))
        };
    }
    pub(crate) use bail;

    macro_rules! bail_if {
        ($cond: expr, $kind: ident) => {
            if $cond {
                panic!("{}: {}", stringify!($kind), stringify!($cond))
            }
        };
    }
    pub(crate) use bail_if;
}
#[cfg(feature = "debug")]
pub(crate) use debug::*;
