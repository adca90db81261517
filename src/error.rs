//! Error types for layout, access, and conversion failures.
//!
//! All errors are synchronous and local to the call that raised them.
//! This layer performs no retries and no rollback: a composite operation
//! that fails partway (e.g. a reshape followed by a fill) leaves the
//! buffer in the intermediate state.

use core::fmt;

use crate::format::PixelFormat;

// ---------------------------------------------------------------------------
// LayoutError
// ---------------------------------------------------------------------------

/// Errors from bitmap geometry construction and slicing.
///
/// These are checked eagerly, before any pixel memory is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    /// Width or height multiplication overflowed.
    InvalidDimensions,
    /// Stride is smaller than `width * bytes_per_pixel`.
    StrideTooSmall,
    /// Backing memory is too small for the given dimensions and stride.
    InsufficientData,
    /// A slice rectangle extends past the view bounds.
    RectOutOfBounds,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "width or height causes overflow"),
            Self::StrideTooSmall => write!(f, "stride is smaller than width * bytes_per_pixel"),
            Self::InsufficientData => {
                write!(f, "backing memory is too small for the given dimensions")
            }
            Self::RectOutOfBounds => write!(f, "rectangle extends past the view bounds"),
        }
    }
}

impl core::error::Error for LayoutError {}

// ---------------------------------------------------------------------------
// AccessError
// ---------------------------------------------------------------------------

/// Errors from pixel access and bridge use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    /// Pixel coordinates fall outside the view.
    OutOfBounds,
    /// The value type's size does not match the format's pixel size.
    SizeMismatch,
    /// The backing memory is not aligned for the requested element type.
    Misaligned,
    /// A write was attempted through a read-only descriptor.
    ReadOnly,
    /// The bridge was already released.
    Disposed,
    /// The operation is structurally impossible for this object
    /// (e.g. pinning a reinterpreting bridge).
    NotSupported,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "pixel coordinates out of bounds"),
            Self::SizeMismatch => write!(f, "value size does not match the pixel size"),
            Self::Misaligned => write!(f, "memory is not aligned for the element type"),
            Self::ReadOnly => write!(f, "write attempted through a read-only descriptor"),
            Self::Disposed => write!(f, "bridge was already released"),
            Self::NotSupported => write!(f, "operation is not supported by this object"),
        }
    }
}

impl core::error::Error for AccessError {}

// ---------------------------------------------------------------------------
// ConvertError
// ---------------------------------------------------------------------------

/// Errors from pixel-format conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConvertError {
    /// No registered conversion path between the two formats.
    FormatNotSupported {
        /// Source format of the failed lookup.
        src: PixelFormat,
        /// Destination format of the failed lookup.
        dst: PixelFormat,
    },
    /// In-place conversion requested between formats of different pixel sizes.
    InPlaceSizeMismatch {
        /// Source format of the rejected in-place conversion.
        src: PixelFormat,
        /// Destination format of the rejected in-place conversion.
        dst: PixelFormat,
    },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatNotSupported { src, dst } => {
                write!(f, "no conversion path from {src:?} to {dst:?}")
            }
            Self::InPlaceSizeMismatch { src, dst } => {
                write!(
                    f,
                    "in-place conversion from {src:?} to {dst:?} requires equal pixel sizes"
                )
            }
        }
    }
}

impl core::error::Error for ConvertError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn layout_error_display() {
        let msg = format!("{}", LayoutError::StrideTooSmall);
        assert!(msg.contains("stride"));
    }

    #[test]
    fn access_error_display() {
        let msg = format!("{}", AccessError::Disposed);
        assert!(msg.contains("released"));
    }

    #[test]
    fn convert_error_display() {
        let err = ConvertError::FormatNotSupported {
            src: PixelFormat::Bgra32,
            dst: PixelFormat::Gray16,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Bgra32"));
        assert!(msg.contains("Gray16"));
    }
}
