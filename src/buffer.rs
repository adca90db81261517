//! Owning pixel buffer.
//!
//! [`BitmapBuffer`] owns its storage and exposes itself through the same
//! view types everything else uses. The backing `Vec<u8>` is over-allocated
//! by the format's alignment so that typed scanline access works, and can
//! be recovered with [`into_vec`](BitmapBuffer::into_vec) for pool reuse.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use imgref::{ImgRef, ImgRefMut, ImgVec};
use rgb::alt::{BGR, BGRA, GrayAlpha};
use rgb::{Gray, Rgb, Rgba};

use crate::convert::PixelConverter;
use crate::error::{ConvertError, LayoutError};
use crate::format::PixelFormat;
use crate::geometry::BitmapInfo;
use crate::view::{BitmapView, BitmapViewMut};

/// Owned bitmap storage.
///
/// The buffer is the exclusive owner of its memory (bridges adapt external
/// memory separately). Reshaping reuses the existing allocation whenever it
/// is large enough; storage never shrinks, and pixel data is not preserved
/// across a reshape.
pub struct BitmapBuffer {
    data: Vec<u8>,
    /// Byte offset from `data` start to the first aligned pixel.
    offset: usize,
    info: BitmapInfo,
}

impl BitmapBuffer {
    /// Allocate a zero-filled buffer for the given layout.
    pub fn new(info: BitmapInfo) -> Self {
        let align = info.format().min_alignment();
        let data = vec![0u8; info.byte_size() + align - 1];
        let offset = align_offset(data.as_ptr(), align);
        Self { data, offset, info }
    }

    /// Wrap an existing `Vec<u8>` as a bitmap.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InsufficientData`] if the vec cannot hold the bitmap
    /// after alignment.
    pub fn from_vec(data: Vec<u8>, info: BitmapInfo) -> Result<Self, LayoutError> {
        let align = info.format().min_alignment();
        let offset = align_offset(data.as_ptr(), align);
        if data.len() < offset + info.byte_size() {
            return Err(LayoutError::InsufficientData);
        }
        Ok(Self { data, offset, info })
    }

    /// Consume the buffer and return the backing `Vec<u8>` for pool reuse.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
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

    /// Borrow the whole buffer as an immutable view.
    pub fn as_view(&self) -> BitmapView<'_> {
        let end = self.offset + self.info.byte_size();
        BitmapView::from_raw_parts(&self.data[self.offset..end], self.info)
    }

    /// Borrow the whole buffer as a mutable view.
    pub fn as_view_mut(&mut self) -> BitmapViewMut<'_> {
        let end = self.offset + self.info.byte_size();
        let offset = self.offset;
        BitmapViewMut::from_raw_parts(&mut self.data[offset..end], self.info)
    }

    /// Re-describe the buffer with a new layout, reusing the existing
    /// storage when it is large enough. Returns whether a new allocation
    /// occurred.
    ///
    /// Pixel data is **not** preserved — callers copy first if they need
    /// the old content. Storage never shrinks.
    pub fn reshape(&mut self, info: BitmapInfo) -> bool {
        let align = info.format().min_alignment();
        let offset = align_offset(self.data.as_ptr(), align);
        if offset + info.byte_size() <= self.data.len() {
            self.offset = offset;
            self.info = info;
            false
        } else {
            self.data = vec![0u8; info.byte_size() + align - 1];
            self.offset = align_offset(self.data.as_ptr(), align);
            self.info = info;
            true
        }
    }

    /// [`reshape`](Self::reshape) to new dimensions, keeping the current
    /// format and a packed stride.
    pub fn reshape_sized(&mut self, width: u32, height: u32) -> bool {
        self.reshape(BitmapInfo::new(width, height, self.info.format()))
    }

    /// [`reshape`](Self::reshape) to new dimensions with a format override
    /// and a packed stride.
    pub fn reshape_with_format(&mut self, width: u32, height: u32, format: PixelFormat) -> bool {
        self.reshape(BitmapInfo::new(width, height, format))
    }
}

// ---------------------------------------------------------------------------
// Typed extraction (BitmapBuffer → ImgVec, converting through the engine)
// ---------------------------------------------------------------------------

macro_rules! to_imgvec_fn {
    ($(#[$attr:meta])* $name:ident, $pixel:ty, $format:expr) => {
        $(#[$attr])*
        pub fn $name(&self) -> Result<ImgVec<$pixel>, ConvertError> {
            let src = self.as_view();
            let converter = PixelConverter::resolve(src.format(), $format)?;
            let w = src.width() as usize;
            let h = src.height() as usize;
            let mut pixels = vec![<$pixel>::default(); w * h];
            {
                use rgb::ComponentBytes;
                let mut dst = BitmapViewMut::from_raw_parts(
                    pixels.as_bytes_mut(),
                    BitmapInfo::new(src.width(), src.height(), $format),
                );
                converter.convert_view(&src, &mut dst);
            }
            Ok(ImgVec::new(pixels, w, h))
        }
    };
}

impl BitmapBuffer {
    to_imgvec_fn!(
        /// Extract as 8-bit gray pixels.
        ///
        /// # Errors
        ///
        /// [`ConvertError::FormatNotSupported`] when this buffer's format
        /// has no conversion path to [`PixelFormat::Gray8`].
        to_gray8, Gray<u8>, PixelFormat::Gray8
    );
    to_imgvec_fn!(
        /// Extract as 8-bit RGB pixels, discarding alpha.
        ///
        /// # Errors
        ///
        /// [`ConvertError::FormatNotSupported`] when this buffer's format
        /// has no conversion path to [`PixelFormat::Rgb24`].
        to_rgb8, Rgb<u8>, PixelFormat::Rgb24
    );
    to_imgvec_fn!(
        /// Extract as 8-bit RGBA pixels; opaque alpha is added when the
        /// source has none.
        ///
        /// # Errors
        ///
        /// [`ConvertError::FormatNotSupported`] when this buffer's format
        /// has no conversion path to [`PixelFormat::Rgba32`].
        to_rgba8, Rgba<u8>, PixelFormat::Rgba32
    );
    to_imgvec_fn!(
        /// Extract as 8-bit BGRA pixels; opaque alpha is added when the
        /// source has none.
        ///
        /// # Errors
        ///
        /// [`ConvertError::FormatNotSupported`] when this buffer's format
        /// has no conversion path to [`PixelFormat::Bgra32`].
        to_bgra8, BGRA<u8>, PixelFormat::Bgra32
    );
}

impl fmt::Debug for BitmapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BitmapBuffer({}x{}, {:?})",
            self.info.width(),
            self.info.height(),
            self.info.format()
        )
    }
}

/// Round `val` up to the next multiple of `align` (a power of 2).
const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Compute the byte offset needed to align `ptr` to `align`.
fn align_offset(ptr: *const u8, align: usize) -> usize {
    let addr = ptr as usize;
    align_up(addr, align) - addr
}

// ---------------------------------------------------------------------------
// ImgRef → BitmapView (zero-copy From impls)
// ---------------------------------------------------------------------------

macro_rules! impl_view_from_imgref {
    ($pixel:ty, $format:expr) => {
        impl<'a> From<ImgRef<'a, $pixel>> for BitmapView<'a> {
            fn from(img: ImgRef<'a, $pixel>) -> Self {
                use rgb::ComponentBytes;
                let bytes = img.buf().as_bytes();
                let byte_stride = img.stride() * core::mem::size_of::<$pixel>();
                let info = BitmapInfo::with_stride_unchecked(
                    img.width() as u32,
                    img.height() as u32,
                    $format,
                    byte_stride,
                );
                BitmapView::from_raw_parts(bytes, info)
            }
        }
    };
}

impl_view_from_imgref!(Gray<u8>, PixelFormat::Gray8);
impl_view_from_imgref!(Gray<u16>, PixelFormat::Gray16);
impl_view_from_imgref!(GrayAlpha<u8>, PixelFormat::GrayAlpha8);
impl_view_from_imgref!(BGR<u8>, PixelFormat::Bgr24);
impl_view_from_imgref!(Rgb<u8>, PixelFormat::Rgb24);
impl_view_from_imgref!(BGRA<u8>, PixelFormat::Bgra32);
impl_view_from_imgref!(Rgba<u8>, PixelFormat::Rgba32);
impl_view_from_imgref!(Gray<f32>, PixelFormat::GrayF32);
impl_view_from_imgref!(BGRA<f32>, PixelFormat::BgraF32);

// ---------------------------------------------------------------------------
// ImgRefMut → BitmapViewMut (zero-copy From impls)
// ---------------------------------------------------------------------------

macro_rules! impl_view_from_imgref_mut {
    ($pixel:ty, $format:expr) => {
        impl<'a> From<ImgRefMut<'a, $pixel>> for BitmapViewMut<'a> {
            fn from(img: ImgRefMut<'a, $pixel>) -> Self {
                use rgb::ComponentBytes;
                let width = img.width() as u32;
                let height = img.height() as u32;
                let byte_stride = img.stride() * core::mem::size_of::<$pixel>();
                let buf = img.into_buf();
                let bytes = buf.as_bytes_mut();
                let info =
                    BitmapInfo::with_stride_unchecked(width, height, $format, byte_stride);
                BitmapViewMut::from_raw_parts(bytes, info)
            }
        }
    };
}

impl_view_from_imgref_mut!(Gray<u8>, PixelFormat::Gray8);
impl_view_from_imgref_mut!(Gray<u16>, PixelFormat::Gray16);
impl_view_from_imgref_mut!(GrayAlpha<u8>, PixelFormat::GrayAlpha8);
impl_view_from_imgref_mut!(BGR<u8>, PixelFormat::Bgr24);
impl_view_from_imgref_mut!(Rgb<u8>, PixelFormat::Rgb24);
impl_view_from_imgref_mut!(BGRA<u8>, PixelFormat::Bgra32);
impl_view_from_imgref_mut!(Rgba<u8>, PixelFormat::Rgba32);
impl_view_from_imgref_mut!(Gray<f32>, PixelFormat::GrayF32);
impl_view_from_imgref_mut!(BGRA<f32>, PixelFormat::BgraF32);

// ---------------------------------------------------------------------------
// ImgVec → BitmapBuffer (From, always copies into aligned storage)
// ---------------------------------------------------------------------------

macro_rules! impl_buffer_from_imgvec {
    ($pixel:ty) => {
        impl From<ImgVec<$pixel>> for BitmapBuffer {
            fn from(img: ImgVec<$pixel>) -> Self {
                let src: BitmapView<'_> = img.as_ref().into();
                let mut buf = BitmapBuffer::new(BitmapInfo::new(
                    src.width(),
                    src.height(),
                    src.format(),
                ));
                {
                    let mut dst = buf.as_view_mut();
                    for y in 0..src.height() {
                        dst.row_raw_mut(y).copy_from_slice(src.row_raw(y));
                    }
                }
                buf
            }
        }
    };
}

impl_buffer_from_imgvec!(Gray<u8>);
impl_buffer_from_imgvec!(Gray<u16>);
impl_buffer_from_imgvec!(GrayAlpha<u8>);
impl_buffer_from_imgvec!(BGR<u8>);
impl_buffer_from_imgvec!(Rgb<u8>);
impl_buffer_from_imgvec!(BGRA<u8>);
impl_buffer_from_imgvec!(Rgba<u8>);
impl_buffer_from_imgvec!(Gray<f32>);
impl_buffer_from_imgvec!(BGRA<f32>);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    // --- allocation and access ---

    #[test]
    fn new_is_zero_filled() {
        let buf = BitmapBuffer::new(BitmapInfo::new(10, 5, PixelFormat::Bgr24));
        assert_eq!(buf.width(), 10);
        assert_eq!(buf.height(), 5);
        assert_eq!(buf.stride(), 30);
        let view = buf.as_view();
        assert_eq!(view.scanline(0).unwrap(), &[0u8; 30]);
        assert_eq!(view.scanline(4).unwrap(), &[0u8; 30]);
    }

    #[test]
    fn write_and_read_back() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(2, 2, PixelFormat::Bgra32));
        buf.as_view_mut().set_pixel(1, 1, [9u8, 8, 7, 6]).unwrap();
        assert_eq!(buf.as_view().pixel::<[u8; 4]>(1, 1).unwrap(), [9, 8, 7, 6]);
        assert_eq!(buf.as_view().pixel::<[u8; 4]>(0, 0).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn from_vec_and_back() {
        let info = BitmapInfo::new(4, 4, PixelFormat::Gray8);
        let data = vec![7u8; info.byte_size()];
        let buf = BitmapBuffer::from_vec(data, info).unwrap();
        assert_eq!(buf.as_view().pixel::<u8>(3, 3).unwrap(), 7);
        let v = buf.into_vec();
        let buf2 = BitmapBuffer::from_vec(v, info).unwrap();
        assert_eq!(buf2.width(), 4);
    }

    #[test]
    fn from_vec_too_small() {
        let info = BitmapInfo::new(10, 10, PixelFormat::Bgra32);
        let err = BitmapBuffer::from_vec(vec![0u8; 16], info);
        assert_eq!(err.unwrap_err(), LayoutError::InsufficientData);
    }

    #[test]
    fn float_buffer_scanlines_are_aligned() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(3, 2, PixelFormat::GrayF32));
        {
            let mut view = buf.as_view_mut();
            view.set_pixel(1, 0, 0.5f32).unwrap();
        }
        let view = buf.as_view();
        let row: &[f32] = view.scanline_as(0).unwrap();
        assert_eq!(row, &[0.0, 0.5, 0.0]);
    }

    // --- reshape ---

    #[test]
    fn reshape_reuses_or_reallocates() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(100, 100, PixelFormat::Gray8));
        assert!(!buf.reshape_sized(50, 50), "shrink must reuse storage");
        assert_eq!(buf.width(), 50);
        assert_eq!(buf.height(), 50);
        assert!(buf.reshape_sized(200, 200), "growth must reallocate");
        assert_eq!(buf.width(), 200);
        // Back down again: the grown allocation is kept.
        assert!(!buf.reshape_sized(100, 100));
    }

    #[test]
    fn reshape_with_format_override() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(64, 64, PixelFormat::Bgra32));
        // Same byte size, different format: reuse.
        assert!(!buf.reshape_with_format(64, 64, PixelFormat::Rgba32));
        assert_eq!(buf.format(), PixelFormat::Rgba32);
        // Four times the pixel size: reallocate.
        assert!(buf.reshape_with_format(64, 64, PixelFormat::BgraF32));
        assert_eq!(buf.format(), PixelFormat::BgraF32);
    }

    #[test]
    fn reshape_does_not_preserve_content() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(4, 4, PixelFormat::Gray8));
        buf.as_view_mut().fill(&[42]).unwrap();
        buf.reshape_sized(2, 2);
        // The contract promises nothing about the content, only the shape.
        assert_eq!(buf.as_view().info().width(), 2);
    }

    // --- imgref interop ---

    #[test]
    fn imgref_to_view_zero_copy() {
        let pixels = vec![
            Rgb { r: 1u8, g: 2, b: 3 },
            Rgb { r: 4, g: 5, b: 6 },
            Rgb { r: 7, g: 8, b: 9 },
            Rgb {
                r: 10,
                g: 11,
                b: 12,
            },
        ];
        let img = imgref::Img::new(pixels.as_slice(), 2, 2);
        let view: BitmapView<'_> = img.into();
        assert_eq!(view.format(), PixelFormat::Rgb24);
        assert_eq!(view.scanline(0).unwrap(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(view.scanline(1).unwrap(), &[7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn imgref_mut_to_view_writes_through() {
        let mut pixels = vec![
            BGRA {
                b: 0u8,
                g: 0,
                r: 0,
                a: 0
            };
            4
        ];
        {
            let img = imgref::Img::new(pixels.as_mut_slice(), 2, 2);
            let mut view: BitmapViewMut<'_> = img.into();
            assert_eq!(view.format(), PixelFormat::Bgra32);
            view.set_pixel(1, 1, [1u8, 2, 3, 4]).unwrap();
        }
        assert_eq!(
            pixels[3],
            BGRA {
                b: 1,
                g: 2,
                r: 3,
                a: 4
            }
        );
    }

    #[test]
    fn imgvec_to_buffer_copies() {
        let pixels = vec![Gray::new(5u8), Gray::new(6), Gray::new(7), Gray::new(8)];
        let img = ImgVec::new(pixels, 2, 2);
        let buf = BitmapBuffer::from(img);
        assert_eq!(buf.format(), PixelFormat::Gray8);
        assert_eq!(buf.as_view().scanline(0).unwrap(), &[5, 6]);
        assert_eq!(buf.as_view().scanline(1).unwrap(), &[7, 8]);
    }

    #[test]
    fn buffer_to_typed_imgvec() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(2, 1, PixelFormat::Bgr24));
        {
            let mut view = buf.as_view_mut();
            view.set_pixel(0, 0, [10u8, 20, 30]).unwrap(); // b, g, r
            view.set_pixel(1, 0, [40u8, 50, 60]).unwrap();
        }
        let rgb = buf.to_rgb8().unwrap();
        assert_eq!(rgb.buf()[0], Rgb { r: 30, g: 20, b: 10 });
        assert_eq!(rgb.buf()[1], Rgb { r: 60, g: 50, b: 40 });

        let bgra = buf.to_bgra8().unwrap();
        assert_eq!(
            bgra.buf()[0],
            BGRA {
                b: 10,
                g: 20,
                r: 30,
                a: 255
            }
        );
    }

    #[test]
    fn buffer_to_gray8_takes_luma() {
        let mut buf = BitmapBuffer::new(BitmapInfo::new(1, 1, PixelFormat::Bgra32));
        buf.as_view_mut()
            .set_pixel(0, 0, [80u8, 80, 80, 255])
            .unwrap();
        let gray = buf.to_gray8().unwrap();
        assert_eq!(gray.buf()[0], Gray::new(80));
    }

    #[test]
    fn imgvec_round_trip_through_buffer() {
        let pixels = vec![
            Rgba {
                r: 1u8,
                g: 2,
                b: 3,
                a: 4
            },
            Rgba {
                r: 5,
                g: 6,
                b: 7,
                a: 8
            },
        ];
        let buf = BitmapBuffer::from(ImgVec::new(pixels.clone(), 2, 1));
        let back = buf.to_rgba8().unwrap();
        assert_eq!(back.buf(), pixels.as_slice());
    }

    #[test]
    fn gray16_imgref_native_endian() {
        let pixels = vec![Gray::new(1000u16), Gray::new(2000u16)];
        let img = imgref::Img::new(pixels.as_slice(), 2, 1);
        let view: BitmapView<'_> = img.into();
        assert_eq!(view.format(), PixelFormat::Gray16);
        let row = view.scanline(0).unwrap();
        assert_eq!(u16::from_ne_bytes([row[0], row[1]]), 1000);
        assert_eq!(u16::from_ne_bytes([row[2], row[3]]), 2000);
    }

    #[test]
    fn debug_format() {
        let buf = BitmapBuffer::new(BitmapInfo::new(10, 5, PixelFormat::Gray8));
        assert_eq!(format!("{buf:?}"), "BitmapBuffer(10x5, Gray8)");
    }
}
