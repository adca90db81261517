//! Shared bitmap memory core for image backends.
//!
//! This crate is the substrate rendering and codec backends build on: three
//! interchangeable representations of a 2D pixel grid plus the machinery to
//! move pixels between encodings without needless copying.
//!
//! - [`PixelFormat`] — compact pixel encoding descriptor (channel roles,
//!   depth, alpha convention)
//! - [`PixelConverter`] — table-driven format conversion with a canonical
//!   fallback route
//! - [`BitmapInfo`] — width, height, format, and row stride; the single
//!   source of truth for layout
//! - [`BitmapView`] / [`BitmapViewMut`] — non-owning, bounds-checked views
//!   with slicing, clipped blits, and affine resampling
//! - [`BitmapBuffer`] — owning storage with in-place reshape and pool-
//!   friendly `Vec` recovery
//! - [`RawBitmap`] / [`ExternalBitmap`] / [`ReinterpretBuffer`] — raw-address
//!   descriptors and bridges for externally-owned memory
//! - [`BitmapDecoder`] / [`BitmapEncoder`] — the in-memory codec boundary
//! - [`FrameQueue`] (`std`) — bounded, pooled single-producer/single-consumer
//!   frame hand-off with drop-oldest backpressure
//!
//! No file format is decoded or encoded here, no GPU work happens, and no
//! threading model is imposed beyond the frame queue: all other operations
//! run synchronously on the caller's thread, and callers serialize writers
//! to shared memory themselves.

#![cfg_attr(not(feature = "std"), no_std)]
// `bridge` is the one module allowed to use unsafe; it holds the raw-address
// rematerialization seam behind documented contracts.
#![deny(unsafe_code)]

extern crate alloc;

mod bridge;
mod buffer;
mod codec;
mod convert;
mod error;
mod format;
mod geometry;
mod view;

#[cfg(feature = "std")]
mod queue;

pub use bridge::{BridgeHooks, ExternalBitmap, RawBitmap, ReinterpretBuffer};
pub use buffer::BitmapBuffer;
pub use codec::{BitmapDecoder, BitmapEncoder};
pub use convert::PixelConverter;
pub use error::{AccessError, ConvertError, LayoutError};
pub use format::{ChannelRole, NativeFormat, PixelFormat};
pub use geometry::{BitmapInfo, Rect};
pub use view::{BitmapView, BitmapViewMut, SampleFilter};

#[cfg(feature = "std")]
pub use queue::FrameQueue;

// Re-exports for backend implementors and users.
pub use imgref::{Img, ImgRef, ImgRefMut, ImgVec};
pub use kurbo::Affine;
pub use rgb;
pub use rgb::alt::BGR as Bgr;
pub use rgb::alt::BGRA as Bgra;
pub use rgb::alt::GrayAlpha;
pub use rgb::{Gray, Rgb, Rgba};
