//! In-memory codec boundary.
//!
//! The core defines only the shape of pixel data crossing the codec
//! boundary — an owned [`BitmapBuffer`] coming out of a decode, a
//! [`BitmapView`] plus a format hint going into an encode. File formats,
//! containers, streaming, and I/O all belong to codec crates implementing
//! these traits.

use alloc::vec::Vec;

use crate::buffer::BitmapBuffer;
use crate::format::PixelFormat;
use crate::view::BitmapView;

/// Decodes an encoded image into an owned bitmap.
pub trait BitmapDecoder {
    /// The codec-specific error type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Decode `data` into a new buffer in the codec's preferred format.
    fn decode(&self, data: &[u8]) -> Result<BitmapBuffer, Self::Error>;
}

/// Encodes a bitmap view into a byte stream.
pub trait BitmapEncoder {
    /// The codec-specific error type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Encode `view`. `format_hint` names the pixel format the caller would
    /// prefer stored; codecs that cannot store it convert or reject — they
    /// never silently guess a different encoding.
    fn encode(&self, view: &BitmapView<'_>, format_hint: PixelFormat)
    -> Result<Vec<u8>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BitmapInfo;
    use alloc::vec;

    /// Toy headerless codec: `[width, height, format code, pixels...]`,
    /// always stored as Bgra32. Exists to exercise the boundary shape.
    struct RawCodec;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum RawCodecError {
        Truncated,
        Unsupported,
    }

    impl core::fmt::Display for RawCodecError {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            match self {
                Self::Truncated => f.write_str("payload shorter than the header promises"),
                Self::Unsupported => f.write_str("unsupported stored format"),
            }
        }
    }

    impl core::error::Error for RawCodecError {}

    impl BitmapDecoder for RawCodec {
        type Error = RawCodecError;

        fn decode(&self, data: &[u8]) -> Result<BitmapBuffer, Self::Error> {
            let [w, h, code, pixels @ ..] = data else {
                return Err(RawCodecError::Truncated);
            };
            let format = PixelFormat::from_code(*code).ok_or(RawCodecError::Unsupported)?;
            let info = BitmapInfo::new(*w as u32, *h as u32, format);
            if pixels.len() < info.byte_size() {
                return Err(RawCodecError::Truncated);
            }
            let mut buf = BitmapBuffer::new(info);
            {
                let mut view = buf.as_view_mut();
                for y in 0..info.height() {
                    let start = y as usize * info.row_bytes();
                    view.scanline_mut(y)
                        .unwrap()
                        .copy_from_slice(&pixels[start..start + info.row_bytes()]);
                }
            }
            Ok(buf)
        }
    }

    impl BitmapEncoder for RawCodec {
        type Error = RawCodecError;

        fn encode(
            &self,
            view: &BitmapView<'_>,
            format_hint: PixelFormat,
        ) -> Result<Vec<u8>, Self::Error> {
            use crate::convert::PixelConverter;
            let converter = PixelConverter::resolve(view.format(), format_hint)
                .map_err(|_| RawCodecError::Unsupported)?;
            let bpp = format_hint.bytes_per_pixel();
            let mut out = vec![
                view.width() as u8,
                view.height() as u8,
                format_hint.code(),
            ];
            let mut row = vec![0u8; view.width() as usize * bpp];
            for y in 0..view.height() {
                converter.convert_pixels(view.scanline(y).unwrap(), &mut row);
                out.extend_from_slice(&row);
            }
            Ok(out)
        }
    }

    #[test]
    fn decode_encode_round_trip() {
        let codec = RawCodec;
        let encoded: Vec<u8> = {
            let mut v = vec![2u8, 1, PixelFormat::Bgra32.code()];
            v.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
            v
        };
        let buf = codec.decode(&encoded).unwrap();
        assert_eq!(buf.format(), PixelFormat::Bgra32);
        assert_eq!(buf.as_view().pixel::<[u8; 4]>(1, 0).unwrap(), [5, 6, 7, 8]);

        let re = codec.encode(&buf.as_view(), PixelFormat::Bgra32).unwrap();
        assert_eq!(re, encoded);
    }

    #[test]
    fn encode_applies_format_hint() {
        let codec = RawCodec;
        let mut buf = BitmapBuffer::new(BitmapInfo::new(1, 1, PixelFormat::Bgra32));
        buf.as_view_mut().set_pixel(0, 0, [9u8, 8, 7, 255]).unwrap();
        let out = codec.encode(&buf.as_view(), PixelFormat::Bgr24).unwrap();
        assert_eq!(out, vec![1, 1, PixelFormat::Bgr24.code(), 9, 8, 7]);
    }

    #[test]
    fn decode_rejects_truncated_payloads() {
        let codec = RawCodec;
        assert_eq!(codec.decode(&[]).unwrap_err(), RawCodecError::Truncated);
        let short = [4u8, 4, PixelFormat::Bgra32.code(), 0, 0];
        assert_eq!(codec.decode(&short).unwrap_err(), RawCodecError::Truncated);
    }

    #[test]
    fn encode_surfaces_unsupported_hint() {
        let codec = RawCodec;
        let buf = BitmapBuffer::new(BitmapInfo::new(1, 1, PixelFormat::Bgra32));
        assert_eq!(
            codec
                .encode(&buf.as_view(), PixelFormat::Gray16)
                .unwrap_err(),
            RawCodecError::Unsupported
        );
    }
}
