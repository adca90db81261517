//! Pixel format descriptors and backend format negotiation.
//!
//! [`PixelFormat`] is a compact code describing one pixel encoding: channel
//! roles and order, bit depth, integer vs. float storage, and alpha
//! convention. Equality is by code; two formats with matching channel
//! sequences but different depths are *loosely* compatible, which backends
//! use for approximate format negotiation.

// ---------------------------------------------------------------------------
// ChannelRole
// ---------------------------------------------------------------------------

/// Meaning of a single channel within a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum ChannelRole {
    /// Luminance.
    Gray = 0,
    /// Blue.
    Blue = 1,
    /// Green.
    Green = 2,
    /// Red.
    Red = 3,
    /// Alpha (opacity).
    Alpha = 4,
}

// ---------------------------------------------------------------------------
// PixelFormat
// ---------------------------------------------------------------------------

/// Compact pixel encoding code.
///
/// The discriminant is the wire-stable format code; [`from_code`](Self::from_code)
/// recovers a format from it. Descriptor queries are `const` so formats can
/// size buffers at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum PixelFormat {
    /// 8-bit luminance.
    Gray8 = 1,
    /// 16-bit luminance (native endian).
    Gray16 = 2,
    /// 8-bit luminance + straight alpha.
    GrayAlpha8 = 3,
    /// 8-bit blue, green, red.
    Bgr24 = 4,
    /// 8-bit red, green, blue.
    Rgb24 = 5,
    /// 8-bit blue, green, red, straight alpha.
    Bgra32 = 6,
    /// 8-bit red, green, blue, straight alpha.
    Rgba32 = 7,
    /// 8-bit blue, green, red, premultiplied alpha.
    PBgra32 = 8,
    /// 32-bit float luminance, nominal range `[0, 1]`.
    GrayF32 = 9,
    /// 32-bit float blue, green, red, straight alpha, nominal range `[0, 1]`.
    BgraF32 = 10,
}

impl PixelFormat {
    /// Recover a format from its code. Returns `None` for unknown codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Gray8),
            2 => Some(Self::Gray16),
            3 => Some(Self::GrayAlpha8),
            4 => Some(Self::Bgr24),
            5 => Some(Self::Rgb24),
            6 => Some(Self::Bgra32),
            7 => Some(Self::Rgba32),
            8 => Some(Self::PBgra32),
            9 => Some(Self::GrayF32),
            10 => Some(Self::BgraF32),
            _ => None,
        }
    }

    /// The format's wire-stable code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Channel roles in memory order.
    pub const fn channel_roles(self) -> &'static [ChannelRole] {
        use ChannelRole::*;
        match self {
            Self::Gray8 | Self::Gray16 | Self::GrayF32 => &[Gray],
            Self::GrayAlpha8 => &[Gray, Alpha],
            Self::Bgr24 => &[Blue, Green, Red],
            Self::Rgb24 => &[Red, Green, Blue],
            Self::Bgra32 | Self::PBgra32 | Self::BgraF32 => &[Blue, Green, Red, Alpha],
            Self::Rgba32 => &[Red, Green, Blue, Alpha],
        }
    }

    /// Number of channels.
    #[inline]
    pub const fn channels(self) -> usize {
        self.channel_roles().len()
    }

    /// Bits per channel (8, 16, or 32).
    pub const fn bits_per_channel(self) -> u8 {
        match self {
            Self::Gray8
            | Self::GrayAlpha8
            | Self::Bgr24
            | Self::Rgb24
            | Self::Bgra32
            | Self::Rgba32
            | Self::PBgra32 => 8,
            Self::Gray16 => 16,
            Self::GrayF32 | Self::BgraF32 => 32,
        }
    }

    /// Whether channels are stored as 32-bit floats.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::GrayF32 | Self::BgraF32)
    }

    /// Whether the format carries an alpha channel.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayAlpha8 | Self::Bgra32 | Self::Rgba32 | Self::PBgra32 | Self::BgraF32
        )
    }

    /// Whether color channels are premultiplied by alpha.
    #[inline]
    pub const fn is_premultiplied(self) -> bool {
        matches!(self, Self::PBgra32)
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        self.channels() * (self.bits_per_channel() as usize / 8)
    }

    /// Minimum byte alignment required for typed channel access (1, 2, or 4).
    #[inline]
    pub const fn min_alignment(self) -> usize {
        self.bits_per_channel() as usize / 8
    }

    /// Exact compatibility: same code.
    #[inline]
    pub const fn exact_compatible(self, other: PixelFormat) -> bool {
        self as u8 == other as u8
    }

    /// Loose compatibility: same channel count and order, depth or alpha
    /// convention may differ.
    ///
    /// Used by backends negotiating in "allow-compatible" mode — e.g. a
    /// surface that stores `BgraF32` can approximate a request for
    /// [`Bgra32`](Self::Bgra32).
    pub fn loosely_compatible(self, other: PixelFormat) -> bool {
        self.channel_roles() == other.channel_roles()
    }
}

// ---------------------------------------------------------------------------
// NativeFormat
// ---------------------------------------------------------------------------

/// Bidirectional mapping between a backend's native pixel-format enumeration
/// and core [`PixelFormat`] codes.
///
/// Every backend supplies this mapping in two modes: exact and
/// allow-compatible. A failed lookup is `None` — backends must surface it as
/// unsupported, never guess a nearby format.
pub trait NativeFormat: Sized {
    /// Map this native format to its core equivalent, if one exists.
    fn to_core(&self) -> Option<PixelFormat>;

    /// Find the native format exactly matching `format`.
    fn from_core(format: PixelFormat) -> Option<Self>;

    /// Find a native format for `format`, allowing loosely compatible
    /// approximations.
    ///
    /// The default accepts only exact matches; backends with convertible
    /// surfaces override this to consult
    /// [`PixelFormat::loosely_compatible`].
    fn from_core_compatible(format: PixelFormat) -> Option<Self> {
        Self::from_core(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- descriptor queries ---

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Gray16.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::GrayAlpha8.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Bgr24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Bgra32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::PBgra32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::GrayF32.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::BgraF32.bytes_per_pixel(), 16);
    }

    #[test]
    fn alignment() {
        assert_eq!(PixelFormat::Gray8.min_alignment(), 1);
        assert_eq!(PixelFormat::Gray16.min_alignment(), 2);
        assert_eq!(PixelFormat::GrayF32.min_alignment(), 4);
        assert_eq!(PixelFormat::Bgra32.min_alignment(), 1);
    }

    #[test]
    fn alpha_and_float() {
        assert!(!PixelFormat::Bgr24.has_alpha());
        assert!(PixelFormat::Bgra32.has_alpha());
        assert!(PixelFormat::GrayAlpha8.has_alpha());
        assert!(PixelFormat::PBgra32.is_premultiplied());
        assert!(!PixelFormat::Bgra32.is_premultiplied());
        assert!(PixelFormat::GrayF32.is_float());
        assert!(!PixelFormat::Gray16.is_float());
    }

    #[test]
    fn code_roundtrip() {
        for code in 0u8..=20 {
            if let Some(fmt) = PixelFormat::from_code(code) {
                assert_eq!(fmt.code(), code);
            }
        }
        assert_eq!(PixelFormat::from_code(0), None);
        assert_eq!(PixelFormat::from_code(200), None);
    }

    // --- compatibility ---

    #[test]
    fn exact_compatibility_is_code_equality() {
        assert!(PixelFormat::Bgra32.exact_compatible(PixelFormat::Bgra32));
        assert!(!PixelFormat::Bgra32.exact_compatible(PixelFormat::Rgba32));
        assert!(!PixelFormat::Bgra32.exact_compatible(PixelFormat::PBgra32));
    }

    #[test]
    fn loose_compatibility_ignores_depth() {
        // Same channel order, different depth.
        assert!(PixelFormat::Gray8.loosely_compatible(PixelFormat::Gray16));
        assert!(PixelFormat::Bgra32.loosely_compatible(PixelFormat::BgraF32));
        // Same channel order, different alpha convention.
        assert!(PixelFormat::Bgra32.loosely_compatible(PixelFormat::PBgra32));
        // Different channel order.
        assert!(!PixelFormat::Bgra32.loosely_compatible(PixelFormat::Rgba32));
        assert!(!PixelFormat::Bgr24.loosely_compatible(PixelFormat::Rgb24));
        // Different channel count.
        assert!(!PixelFormat::Gray8.loosely_compatible(PixelFormat::GrayAlpha8));
    }

    // --- negotiation trait ---

    /// Stand-in for a backend's native surface enumeration.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum FakeSurface {
        Gray,
        Bgra,
        BgraFloat,
    }

    impl NativeFormat for FakeSurface {
        fn to_core(&self) -> Option<PixelFormat> {
            match self {
                Self::Gray => Some(PixelFormat::Gray8),
                Self::Bgra => Some(PixelFormat::Bgra32),
                Self::BgraFloat => Some(PixelFormat::BgraF32),
            }
        }

        fn from_core(format: PixelFormat) -> Option<Self> {
            match format {
                PixelFormat::Gray8 => Some(Self::Gray),
                PixelFormat::Bgra32 => Some(Self::Bgra),
                PixelFormat::BgraF32 => Some(Self::BgraFloat),
                _ => None,
            }
        }

        fn from_core_compatible(format: PixelFormat) -> Option<Self> {
            Self::from_core(format).or_else(|| {
                [Self::Gray, Self::Bgra, Self::BgraFloat]
                    .into_iter()
                    .find(|s| s.to_core().is_some_and(|f| f.loosely_compatible(format)))
            })
        }
    }

    #[test]
    fn negotiation_exact_never_guesses() {
        assert_eq!(
            FakeSurface::from_core(PixelFormat::Bgra32),
            Some(FakeSurface::Bgra)
        );
        // PBgra32 is loosely, not exactly, compatible — exact mode fails.
        assert_eq!(FakeSurface::from_core(PixelFormat::PBgra32), None);
        assert_eq!(FakeSurface::from_core(PixelFormat::Rgb24), None);
    }

    #[test]
    fn negotiation_compatible_mode() {
        assert_eq!(
            FakeSurface::from_core_compatible(PixelFormat::PBgra32),
            Some(FakeSurface::Bgra)
        );
        assert_eq!(
            FakeSurface::from_core_compatible(PixelFormat::Gray16),
            Some(FakeSurface::Gray)
        );
        // Nothing in the surface set matches RGB channel order.
        assert_eq!(FakeSurface::from_core_compatible(PixelFormat::Rgb24), None);
    }
}
