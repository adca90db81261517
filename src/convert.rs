//! Pixel-format conversion engine.
//!
//! Conversions are table-driven: a process-wide immutable registry of direct
//! row converters (channel reordering, depth rescale, premultiply and
//! unpremultiply, float clamp/round). When no direct entry exists for a
//! pair, the conversion routes through one canonical intermediate —
//! 32-bit unpremultiplied BGRA — costing at most one extra scratch buffer.
//!
//! Integer formats clamp to their native range with nearest-integer
//! rounding; float formats keep their exact range. Identity conversion is a
//! verbatim byte copy. Pairs with no registered path fail
//! [`ConvertError::FormatNotSupported`] — the engine never guesses and never
//! degrades precision beyond the documented clamp/round rule.

use alloc::vec;

use crate::error::ConvertError;
use crate::format::PixelFormat;
use crate::view::{BitmapView, BitmapViewMut};

/// Row converter over packed pixels: `src` holds `n` source pixels, `dst`
/// holds `n` destination pixels.
type RowFn = fn(&[u8], &mut [u8]);

// ---------------------------------------------------------------------------
// Channel math
// ---------------------------------------------------------------------------

#[inline]
fn premul(c: u8, a: u8) -> u8 {
    ((c as u16 * a as u16 + 127) / 255) as u8
}

#[inline]
fn unpremul(c: u8, a: u8) -> u8 {
    if a == 0 {
        0
    } else {
        let v = (c as u32 * 255 + a as u32 / 2) / a as u32;
        if v > 255 { 255 } else { v as u8 }
    }
}

/// BT.601 integer luma; exact for `r == g == b` (weights sum to 256).
#[inline]
fn luma(b: u8, g: u8, r: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

#[inline]
fn wide16(v: u8) -> u16 {
    v as u16 * 257
}

#[inline]
fn narrow16(v: u16) -> u8 {
    ((v as u32 * 255 + 32767) / 65535) as u8
}

#[inline]
fn f32_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[inline]
fn u8_to_f32(v: u8) -> f32 {
    v as f32 / 255.0
}

#[inline]
fn read_u16(c: &[u8]) -> u16 {
    u16::from_ne_bytes([c[0], c[1]])
}

#[inline]
fn read_f32(c: &[u8]) -> f32 {
    f32::from_ne_bytes([c[0], c[1], c[2], c[3]])
}

// ---------------------------------------------------------------------------
// Direct row converters
// ---------------------------------------------------------------------------

fn gray8_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (&g, d) in src.iter().zip(dst.chunks_exact_mut(4)) {
        d[0] = g;
        d[1] = g;
        d[2] = g;
        d[3] = 0xFF;
    }
}

fn bgra32_to_gray8(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.iter_mut()) {
        *d = luma(s[0], s[1], s[2]);
    }
}

fn gray8_to_gray16(src: &[u8], dst: &mut [u8]) {
    for (&g, d) in src.iter().zip(dst.chunks_exact_mut(2)) {
        d.copy_from_slice(&wide16(g).to_ne_bytes());
    }
}

fn gray16_to_gray8(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(2).zip(dst.iter_mut()) {
        *d = narrow16(read_u16(s));
    }
}

fn gray16_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(4)) {
        let g = narrow16(read_u16(s));
        d[0] = g;
        d[1] = g;
        d[2] = g;
        d[3] = 0xFF;
    }
}

fn graya8_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[0];
        d[1] = s[0];
        d[2] = s[0];
        d[3] = s[1];
    }
}

fn bgra32_to_graya8(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(2)) {
        d[0] = luma(s[0], s[1], s[2]);
        d[1] = s[3];
    }
}

fn bgr24_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 0xFF;
    }
}

fn bgra32_to_bgr24(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
    }
}

fn rgb24_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
        d[3] = 0xFF;
    }
}

fn bgra32_to_rgb24(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
    }
}

/// Swaps channels 0 and 2; serves both RGB→BGR and BGR→RGB.
fn swap_rb_24(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(3)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
    }
}

/// Swaps channels 0 and 2, alpha untouched; serves RGBA↔BGRA both ways.
fn swap_rb_32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
        d[3] = s[3];
    }
}

fn pbgra32_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = s[3];
        d[0] = unpremul(s[0], a);
        d[1] = unpremul(s[1], a);
        d[2] = unpremul(s[2], a);
        d[3] = a;
    }
}

fn bgra32_to_pbgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = s[3];
        d[0] = premul(s[0], a);
        d[1] = premul(s[1], a);
        d[2] = premul(s[2], a);
        d[3] = a;
    }
}

fn grayf32_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let g = f32_to_u8(read_f32(s));
        d[0] = g;
        d[1] = g;
        d[2] = g;
        d[3] = 0xFF;
    }
}

fn bgra32_to_grayf32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let g = u8_to_f32(luma(s[0], s[1], s[2]));
        d.copy_from_slice(&g.to_ne_bytes());
    }
}

fn bgraf32_to_bgra32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(16).zip(dst.chunks_exact_mut(4)) {
        d[0] = f32_to_u8(read_f32(&s[0..4]));
        d[1] = f32_to_u8(read_f32(&s[4..8]));
        d[2] = f32_to_u8(read_f32(&s[8..12]));
        d[3] = f32_to_u8(read_f32(&s[12..16]));
    }
}

fn bgra32_to_bgraf32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(16)) {
        d[0..4].copy_from_slice(&u8_to_f32(s[0]).to_ne_bytes());
        d[4..8].copy_from_slice(&u8_to_f32(s[1]).to_ne_bytes());
        d[8..12].copy_from_slice(&u8_to_f32(s[2]).to_ne_bytes());
        d[12..16].copy_from_slice(&u8_to_f32(s[3]).to_ne_bytes());
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Direct conversion table. Built at compile time, immutable for the
/// process lifetime; lookups never mutate it, so no teardown is needed.
///
/// Every format has a leg *to* the canonical intermediate. Legs *from* the
/// canonical exist for render-target formats only — `Gray16` is a capture
/// source here, so the sole way in is widening from `Gray8`.
static DIRECT: &[(PixelFormat, PixelFormat, RowFn)] = {
    use PixelFormat::*;
    &[
        (Gray8, Bgra32, gray8_to_bgra32),
        (Bgra32, Gray8, bgra32_to_gray8),
        (Gray8, Gray16, gray8_to_gray16),
        (Gray16, Gray8, gray16_to_gray8),
        (Gray16, Bgra32, gray16_to_bgra32),
        (GrayAlpha8, Bgra32, graya8_to_bgra32),
        (Bgra32, GrayAlpha8, bgra32_to_graya8),
        (Bgr24, Bgra32, bgr24_to_bgra32),
        (Bgra32, Bgr24, bgra32_to_bgr24),
        (Rgb24, Bgra32, rgb24_to_bgra32),
        (Bgra32, Rgb24, bgra32_to_rgb24),
        (Bgr24, Rgb24, swap_rb_24),
        (Rgb24, Bgr24, swap_rb_24),
        (Rgba32, Bgra32, swap_rb_32),
        (Bgra32, Rgba32, swap_rb_32),
        (PBgra32, Bgra32, pbgra32_to_bgra32),
        (Bgra32, PBgra32, bgra32_to_pbgra32),
        (GrayF32, Bgra32, grayf32_to_bgra32),
        (Bgra32, GrayF32, bgra32_to_grayf32),
        (BgraF32, Bgra32, bgraf32_to_bgra32),
        (Bgra32, BgraF32, bgra32_to_bgraf32),
    ]
};

fn direct(src: PixelFormat, dst: PixelFormat) -> Option<RowFn> {
    DIRECT
        .iter()
        .find(|(s, d, _)| *s == src && *d == dst)
        .map(|(_, _, f)| *f)
}

// ---------------------------------------------------------------------------
// PixelConverter
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Path {
    Identity,
    Direct(RowFn),
    Via(RowFn, RowFn),
}

/// Resolved conversion between two pixel formats.
///
/// Resolution order: identity (verbatim copy), direct table entry, then a
/// route through the canonical intermediate ([`Self::CANONICAL`]). The
/// routed path uses at most one scratch buffer.
#[derive(Clone, Copy)]
pub struct PixelConverter {
    src: PixelFormat,
    dst: PixelFormat,
    path: Path,
}

impl PixelConverter {
    /// Canonical intermediate: 32-bit unpremultiplied 4-channel BGRA.
    pub const CANONICAL: PixelFormat = PixelFormat::Bgra32;

    /// Resolve a converter for the format pair.
    ///
    /// # Errors
    ///
    /// [`ConvertError::FormatNotSupported`] when neither a direct entry nor
    /// a canonical route exists.
    pub fn resolve(src: PixelFormat, dst: PixelFormat) -> Result<Self, ConvertError> {
        let path = if src == dst {
            Path::Identity
        } else if let Some(f) = direct(src, dst) {
            Path::Direct(f)
        } else {
            match (direct(src, Self::CANONICAL), direct(Self::CANONICAL, dst)) {
                (Some(a), Some(b)) => Path::Via(a, b),
                _ => return Err(ConvertError::FormatNotSupported { src, dst }),
            }
        };
        Ok(Self { src, dst, path })
    }

    /// Source format of this converter.
    #[inline]
    pub fn src_format(&self) -> PixelFormat {
        self.src
    }

    /// Destination format of this converter.
    #[inline]
    pub fn dst_format(&self) -> PixelFormat {
        self.dst
    }

    /// Whether this converter is a verbatim byte copy.
    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self.path, Path::Identity)
    }

    /// Convert a packed run of pixels.
    ///
    /// # Panics
    ///
    /// Panics if either buffer is not pixel-aligned for its format, or if
    /// the pixel counts differ — those are caller bugs, not runtime
    /// conditions.
    pub fn convert_pixels(&self, src: &[u8], dst: &mut [u8]) {
        let sbpp = self.src.bytes_per_pixel();
        let dbpp = self.dst.bytes_per_pixel();
        assert!(
            src.len().is_multiple_of(sbpp) && dst.len().is_multiple_of(dbpp),
            "buffers are not pixel-aligned for their formats"
        );
        assert_eq!(
            src.len() / sbpp,
            dst.len() / dbpp,
            "source and destination pixel counts differ"
        );
        match self.path {
            Path::Identity => dst.copy_from_slice(src),
            Path::Direct(f) => f(src, dst),
            Path::Via(a, b) => {
                let n = src.len() / sbpp;
                let mut scratch = vec![0u8; n * Self::CANONICAL.bytes_per_pixel()];
                a(src, &mut scratch);
                b(&scratch, dst);
            }
        }
    }

    /// Convert between two views of equal dimensions, row by row. Strides
    /// may differ; padding is never touched. A routed conversion reuses one
    /// scratch row across the whole image.
    ///
    /// # Panics
    ///
    /// Panics if the view formats do not match this converter or the
    /// dimensions differ.
    pub fn convert_view(&self, src: &BitmapView<'_>, dst: &mut BitmapViewMut<'_>) {
        assert!(
            src.format() == self.src && dst.format() == self.dst,
            "view formats do not match the converter"
        );
        assert!(
            src.width() == dst.width() && src.height() == dst.height(),
            "view dimensions differ"
        );
        let width = src.width() as usize;
        match self.path {
            Path::Identity => {
                for y in 0..src.height() {
                    dst.row_raw_mut(y).copy_from_slice(src.row_raw(y));
                }
            }
            Path::Direct(f) => {
                for y in 0..src.height() {
                    f(src.row_raw(y), dst.row_raw_mut(y));
                }
            }
            Path::Via(a, b) => {
                let mut scratch = vec![0u8; width * Self::CANONICAL.bytes_per_pixel()];
                for y in 0..src.height() {
                    a(src.row_raw(y), &mut scratch);
                    b(&scratch, dst.row_raw_mut(y));
                }
            }
        }
    }

    /// Convert a packed run of pixels in place.
    ///
    /// # Errors
    ///
    /// [`ConvertError::InPlaceSizeMismatch`] unless source and destination
    /// pixel sizes are equal.
    pub fn convert_in_place(&self, buf: &mut [u8]) -> Result<(), ConvertError> {
        if self.src.bytes_per_pixel() != self.dst.bytes_per_pixel() {
            return Err(ConvertError::InPlaceSizeMismatch {
                src: self.src,
                dst: self.dst,
            });
        }
        if self.is_identity() {
            return Ok(());
        }
        let tmp = buf.to_vec();
        self.convert_pixels(&tmp, buf);
        Ok(())
    }
}

impl core::fmt::Debug for PixelConverter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match self.path {
            Path::Identity => "identity",
            Path::Direct(_) => "direct",
            Path::Via(..) => "via-canonical",
        };
        write!(f, "PixelConverter({:?} -> {:?}, {kind})", self.src, self.dst)
    }
}
