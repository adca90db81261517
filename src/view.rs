//! Bounds-checked bitmap views.
//!
//! [`BitmapView`] and [`BitmapViewMut`] are non-owning windows over pixel
//! memory described by a [`BitmapInfo`]. Mutability is encoded by type, so
//! read-only access propagates structurally: slicing an immutable view can
//! only yield immutable views.
//!
//! Views are transient — created for one operation's duration — and never
//! outlive the memory they reference. The memory itself is not protected
//! against concurrent mutation; callers serialize writers.

use core::fmt;
use core::hash::Hasher;

use alloc::vec;

use bytemuck::{AnyBitPattern, NoUninit};
use kurbo::{Affine, Point};

use crate::bridge::RawBitmap;
use crate::convert::PixelConverter;
use crate::error::{AccessError, ConvertError, LayoutError};
use crate::format::PixelFormat;
use crate::geometry::{BitmapInfo, Rect};

/// Resampling filter for [`BitmapViewMut::set_pixels_transformed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFilter {
    /// Nearest-neighbor sampling.
    Nearest,
    /// Bilinear interpolation between the four nearest source pixels.
    Bilinear,
}

// ---------------------------------------------------------------------------
// BitmapView (borrowed, immutable)
// ---------------------------------------------------------------------------

/// Immutable view over bitmap memory.
pub struct BitmapView<'a> {
    data: &'a [u8],
    info: BitmapInfo,
}

impl<'a> BitmapView<'a> {
    /// Create a view over `data` with the given layout.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InsufficientData`] if `data` cannot hold
    /// `(height - 1) * stride + width * bytes_per_pixel` bytes.
    pub fn new(data: &'a [u8], info: BitmapInfo) -> Result<Self, LayoutError> {
        if data.len() < info.required_bytes() {
            return Err(LayoutError::InsufficientData);
        }
        Ok(Self { data, info })
    }

    pub(crate) fn from_raw_parts(data: &'a [u8], info: BitmapInfo) -> Self {
        debug_assert!(data.len() >= info.required_bytes());
        Self { data, info }
    }

    /// Layout descriptor.
    #[inline]
    pub fn info(&self) -> BitmapInfo {
        self.info
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.info.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.info.height()
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.info.format()
    }

    /// Byte stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.info.stride()
    }

    /// Whether the view covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    /// Row `y` without bounds check; callers guarantee `y < height`.
    #[inline]
    pub(crate) fn row_raw(&self, y: u32) -> &[u8] {
        let start = y as usize * self.info.stride();
        &self.data[start..start + self.info.row_bytes()]
    }

    /// Pixel bytes of row `y` — exactly `width * bytes_per_pixel`, stride
    /// padding excluded.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] if `y >= height`.
    pub fn scanline(&self, y: u32) -> Result<&[u8], AccessError> {
        if y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        Ok(self.row_raw(y))
    }

    /// Row `y` as a slice of typed pixels.
    ///
    /// # Errors
    ///
    /// [`AccessError::SizeMismatch`] unless `size_of::<T>()` equals the
    /// format's pixel size; [`AccessError::Misaligned`] if the backing
    /// memory is not aligned for `T`.
    pub fn scanline_as<T: AnyBitPattern>(&self, y: u32) -> Result<&[T], AccessError> {
        if size_of::<T>() != self.info.bytes_per_pixel() {
            return Err(AccessError::SizeMismatch);
        }
        bytemuck::try_cast_slice(self.scanline(y)?).map_err(cast_error)
    }

    /// Bytes of pixel `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] if the coordinates fall outside the view.
    pub fn pixel_bytes(&self, x: u32, y: u32) -> Result<&[u8], AccessError> {
        if x >= self.info.width() || y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        let start = self.info.offset_of(x, y);
        Ok(&self.data[start..start + self.info.bytes_per_pixel()])
    }

    /// Read pixel `(x, y)` as a typed value.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] for bad coordinates,
    /// [`AccessError::SizeMismatch`] unless `size_of::<T>()` equals the
    /// format's pixel size.
    pub fn pixel<T: AnyBitPattern>(&self, x: u32, y: u32) -> Result<T, AccessError> {
        if size_of::<T>() != self.info.bytes_per_pixel() {
            return Err(AccessError::SizeMismatch);
        }
        Ok(bytemuck::pod_read_unaligned(self.pixel_bytes(x, y)?))
    }

    /// Zero-copy view of a sub-rectangle. Same backing memory, same stride,
    /// offset origin. A zero-area rectangle yields an empty view.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RectOutOfBounds`] if `rect` extends past the view.
    pub fn slice(&self, rect: Rect) -> Result<BitmapView<'a>, LayoutError> {
        let (offset, info) = self.info.sliced(rect)?;
        if info.is_empty() {
            return Ok(BitmapView { data: &[], info });
        }
        let len = info.required_bytes();
        Ok(BitmapView {
            data: &self.data[offset..offset + len],
            info,
        })
    }

    /// Whether two views have the same geometry and identical pixel
    /// content. Stride padding is excluded, so views that differ only in
    /// row padding compare equal.
    pub fn content_eq(&self, other: &BitmapView<'_>) -> bool {
        if !self.info.same_geometry(&other.info) {
            return false;
        }
        (0..self.info.height()).all(|y| self.row_raw(y) == other.row_raw(y))
    }

    /// Feed the pixel content (padding excluded) into a hasher. Two views
    /// with equal content hash identically regardless of stride.
    pub fn hash_pixels<H: Hasher>(&self, state: &mut H) {
        for y in 0..self.info.height() {
            state.write(self.row_raw(y));
        }
    }

    /// Expose the raw address and geometry to `f` for the duration of the
    /// call. The address must not be retained after `f` returns.
    pub fn pin_readable<R>(&self, f: impl FnOnce(RawBitmap) -> R) -> R {
        f(RawBitmap::new(self.data.as_ptr(), self.info, true))
    }
}

impl fmt::Debug for BitmapView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BitmapView({}x{}, {:?})",
            self.info.width(),
            self.info.height(),
            self.info.format()
        )
    }
}

// ---------------------------------------------------------------------------
// BitmapViewMut (borrowed, mutable)
// ---------------------------------------------------------------------------

/// Mutable view over bitmap memory.
pub struct BitmapViewMut<'a> {
    data: &'a mut [u8],
    info: BitmapInfo,
}

impl<'a> BitmapViewMut<'a> {
    /// Create a mutable view over `data` with the given layout.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InsufficientData`] if `data` cannot hold
    /// `(height - 1) * stride + width * bytes_per_pixel` bytes.
    pub fn new(data: &'a mut [u8], info: BitmapInfo) -> Result<Self, LayoutError> {
        if data.len() < info.required_bytes() {
            return Err(LayoutError::InsufficientData);
        }
        Ok(Self { data, info })
    }

    pub(crate) fn from_raw_parts(data: &'a mut [u8], info: BitmapInfo) -> Self {
        debug_assert!(data.len() >= info.required_bytes());
        Self { data, info }
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> BitmapView<'_> {
        BitmapView {
            data: self.data,
            info: self.info,
        }
    }

    /// Layout descriptor.
    #[inline]
    pub fn info(&self) -> BitmapInfo {
        self.info
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.info.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.info.height()
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.info.format()
    }

    /// Byte stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.info.stride()
    }

    /// Whether the view covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    #[inline]
    pub(crate) fn row_raw(&self, y: u32) -> &[u8] {
        let start = y as usize * self.info.stride();
        &self.data[start..start + self.info.row_bytes()]
    }

    #[inline]
    pub(crate) fn row_raw_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.info.stride();
        let len = self.info.row_bytes();
        &mut self.data[start..start + len]
    }

    /// Pixel bytes of row `y`, stride padding excluded.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] if `y >= height`.
    pub fn scanline(&self, y: u32) -> Result<&[u8], AccessError> {
        if y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        Ok(self.row_raw(y))
    }

    /// Mutable pixel bytes of row `y`, stride padding excluded.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] if `y >= height`.
    pub fn scanline_mut(&mut self, y: u32) -> Result<&mut [u8], AccessError> {
        if y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        Ok(self.row_raw_mut(y))
    }

    /// Bytes of pixel `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] if the coordinates fall outside the view.
    pub fn pixel_bytes(&self, x: u32, y: u32) -> Result<&[u8], AccessError> {
        if x >= self.info.width() || y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        let start = self.info.offset_of(x, y);
        Ok(&self.data[start..start + self.info.bytes_per_pixel()])
    }

    /// Read pixel `(x, y)` as a typed value.
    ///
    /// # Errors
    ///
    /// Same as [`BitmapView::pixel`].
    pub fn pixel<T: AnyBitPattern>(&self, x: u32, y: u32) -> Result<T, AccessError> {
        if size_of::<T>() != self.info.bytes_per_pixel() {
            return Err(AccessError::SizeMismatch);
        }
        Ok(bytemuck::pod_read_unaligned(self.pixel_bytes(x, y)?))
    }

    /// Overwrite pixel `(x, y)` with raw bytes.
    ///
    /// # Errors
    ///
    /// [`AccessError::OutOfBounds`] for bad coordinates,
    /// [`AccessError::SizeMismatch`] unless `bytes` is exactly one pixel.
    pub fn set_pixel_bytes(&mut self, x: u32, y: u32, bytes: &[u8]) -> Result<(), AccessError> {
        if bytes.len() != self.info.bytes_per_pixel() {
            return Err(AccessError::SizeMismatch);
        }
        if x >= self.info.width() || y >= self.info.height() {
            return Err(AccessError::OutOfBounds);
        }
        let start = self.info.offset_of(x, y);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Overwrite pixel `(x, y)` with a typed value.
    ///
    /// # Errors
    ///
    /// Same as [`set_pixel_bytes`](Self::set_pixel_bytes).
    pub fn set_pixel<T: NoUninit>(&mut self, x: u32, y: u32, value: T) -> Result<(), AccessError> {
        self.set_pixel_bytes(x, y, bytemuck::bytes_of(&value))
    }

    /// Fill every pixel with `pixel`.
    ///
    /// # Errors
    ///
    /// [`AccessError::SizeMismatch`] unless `pixel` is exactly one pixel.
    pub fn fill(&mut self, pixel: &[u8]) -> Result<(), AccessError> {
        let bpp = self.info.bytes_per_pixel();
        if pixel.len() != bpp {
            return Err(AccessError::SizeMismatch);
        }
        for y in 0..self.info.height() {
            for chunk in self.row_raw_mut(y).chunks_exact_mut(bpp) {
                chunk.copy_from_slice(pixel);
            }
        }
        Ok(())
    }

    /// Zero-copy mutable view of a sub-rectangle.
    ///
    /// # Errors
    ///
    /// [`LayoutError::RectOutOfBounds`] if `rect` extends past the view.
    pub fn slice_mut(&mut self, rect: Rect) -> Result<BitmapViewMut<'_>, LayoutError> {
        let (offset, info) = self.info.sliced(rect)?;
        if info.is_empty() {
            return Ok(BitmapViewMut {
                data: &mut [],
                info,
            });
        }
        let len = info.required_bytes();
        Ok(BitmapViewMut {
            data: &mut self.data[offset..offset + len],
            info,
        })
    }

    /// Copy `src` into this view at `(dst_x, dst_y)`, clipping silently
    /// against the destination bounds. Any offset is accepted, including
    /// negative and fully out-of-range ones — no overlap means a no-op,
    /// never an error. Formats are converted automatically.
    ///
    /// # Errors
    ///
    /// [`ConvertError::FormatNotSupported`] when the formats differ and no
    /// conversion path exists.
    pub fn set_pixels(
        &mut self,
        dst_x: i64,
        dst_y: i64,
        src: &BitmapView<'_>,
    ) -> Result<(), ConvertError> {
        let converter = PixelConverter::resolve(src.format(), self.format())?;

        let x0 = dst_x.max(0);
        let y0 = dst_y.max(0);
        let x1 = dst_x.saturating_add(src.width() as i64).min(self.width() as i64);
        let y1 = dst_y.saturating_add(src.height() as i64).min(self.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return Ok(());
        }
        let w = (x1 - x0) as u32;
        let h = (y1 - y0) as u32;
        let src_rect = Rect::new((x0 - dst_x) as u32, (y0 - dst_y) as u32, w, h);
        let dst_rect = Rect::new(x0 as u32, y0 as u32, w, h);

        let src_sub = src.slice(src_rect).expect("clipped rect within source");
        let mut dst_sub = self
            .slice_mut(dst_rect)
            .expect("clipped rect within destination");
        converter.convert_view(&src_sub, &mut dst_sub);
        Ok(())
    }

    /// Resample `src` through a 2D affine transform into this view.
    ///
    /// `transform` maps source coordinates to destination coordinates; each
    /// destination pixel is inverse-mapped and sampled with `filter`.
    /// Samples falling outside the source bounds write zero (transparent
    /// black). Sampling and blending happen in the canonical 32-bit
    /// unpremultiplied space.
    ///
    /// # Errors
    ///
    /// [`ConvertError::FormatNotSupported`] when either format has no path
    /// to or from the canonical intermediate.
    pub fn set_pixels_transformed(
        &mut self,
        transform: Affine,
        src: &BitmapView<'_>,
        filter: SampleFilter,
    ) -> Result<(), ConvertError> {
        let to_canon = PixelConverter::resolve(src.format(), PixelConverter::CANONICAL)?;
        let from_canon = PixelConverter::resolve(PixelConverter::CANONICAL, self.format())?;
        let inv = transform.inverse();
        let dbpp = self.info.bytes_per_pixel();
        let mut out = vec![0u8; dbpp];

        for y in 0..self.height() {
            for x in 0..self.width() {
                let p = inv * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let canon = if p.x.is_finite() && p.y.is_finite() {
                    match filter {
                        SampleFilter::Nearest => {
                            fetch_canonical(src, &to_canon, floor_i64(p.x), floor_i64(p.y))
                        }
                        SampleFilter::Bilinear => sample_bilinear(src, &to_canon, p),
                    }
                } else {
                    [0; 4]
                };
                from_canon.convert_pixels(&canon, &mut out);
                let start = x as usize * dbpp;
                self.row_raw_mut(y)[start..start + dbpp].copy_from_slice(&out);
            }
        }
        Ok(())
    }

    /// Expose the raw address and geometry to `f` for the duration of the
    /// call, writable. The address must not be retained after `f` returns.
    pub fn pin_writable<R>(&mut self, f: impl FnOnce(RawBitmap) -> R) -> R {
        f(RawBitmap::new(self.data.as_ptr(), self.info, false))
    }
}

impl fmt::Debug for BitmapViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BitmapViewMut({}x{}, {:?})",
            self.info.width(),
            self.info.height(),
            self.info.format()
        )
    }
}

// ---------------------------------------------------------------------------
// Sampling helpers
// ---------------------------------------------------------------------------

fn cast_error(e: bytemuck::PodCastError) -> AccessError {
    match e {
        bytemuck::PodCastError::AlignmentMismatch => AccessError::Misaligned,
        _ => AccessError::SizeMismatch,
    }
}

/// `floor` without a float runtime; exact for in-range values, and values
/// past the `i64` range fail the bounds check downstream anyway.
fn floor_i64(v: f64) -> i64 {
    let t = v as i64;
    if (t as f64) > v { t - 1 } else { t }
}

/// Fetch source pixel `(x, y)` in canonical form; transparent zero outside
/// the source bounds.
fn fetch_canonical(src: &BitmapView<'_>, to_canon: &PixelConverter, x: i64, y: i64) -> [u8; 4] {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return [0; 4];
    }
    let bpp = src.info().bytes_per_pixel();
    let row = src.row_raw(y as u32);
    let px = &row[x as usize * bpp..(x as usize + 1) * bpp];
    let mut canon = [0u8; 4];
    to_canon.convert_pixels(px, &mut canon);
    canon
}

/// Bilinear sample at `p` (source pixel centers sit at integer + 0.5).
fn sample_bilinear(src: &BitmapView<'_>, to_canon: &PixelConverter, p: Point) -> [u8; 4] {
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0 = floor_i64(fx);
    let y0 = floor_i64(fy);
    let tx = (fx - x0 as f64) as f32;
    let ty = (fy - y0 as f64) as f32;

    let c00 = fetch_canonical(src, to_canon, x0, y0);
    let c10 = fetch_canonical(src, to_canon, x0 + 1, y0);
    let c01 = fetch_canonical(src, to_canon, x0, y0 + 1);
    let c11 = fetch_canonical(src, to_canon, x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let top = c00[i] as f32 * (1.0 - tx) + c10[i] as f32 * tx;
        let bottom = c01[i] as f32 * (1.0 - tx) + c11[i] as f32 * tx;
        *o = (top * (1.0 - ty) + bottom * ty + 0.5) as u8;
    }
    out
}
