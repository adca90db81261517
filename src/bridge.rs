//! Memory bridges: raw-address views and externally-owned memory adapted
//! to the owning-buffer contract.
//!
//! This is the only module in the crate allowed to use `unsafe`; everything
//! unsafe funnels through [`RawBitmap`]'s two rematerialization accessors,
//! each with an explicit validity contract. Validity is treated as a scoped
//! borrow: addresses are handed out for a callback's dynamic scope (see
//! [`BitmapView::pin_readable`](crate::BitmapView::pin_readable)) or bound
//! to a bridge whose window is exactly `[bind, release)`.
#![allow(unsafe_code)]

use alloc::boxed::Box;
use core::fmt;

use bytemuck::Pod;

use crate::error::{AccessError, LayoutError};
use crate::geometry::BitmapInfo;
use crate::view::{BitmapView, BitmapViewMut};

// ---------------------------------------------------------------------------
// RawBitmap
// ---------------------------------------------------------------------------

/// Non-owning raw-address bitmap descriptor.
///
/// Pairs an address with the geometry needed to interpret it, plus a
/// read-only flag. The descriptor itself is a plain value — safe to copy
/// and to pass across threads — but it never owns the memory it points at,
/// and its validity is enforced entirely by the caller: the referenced
/// memory must outlive every use of the descriptor.
#[derive(Clone, Copy, Debug)]
pub struct RawBitmap {
    address: *const u8,
    info: BitmapInfo,
    read_only: bool,
}

// The descriptor is an address + geometry value; dereferencing is gated
// behind the unsafe accessors below.
unsafe impl Send for RawBitmap {}
unsafe impl Sync for RawBitmap {}

impl RawBitmap {
    /// Describe raw memory at `address` with the given layout.
    pub fn new(address: *const u8, info: BitmapInfo, read_only: bool) -> Self {
        Self {
            address,
            info,
            read_only,
        }
    }

    /// The raw base address.
    #[inline]
    pub fn address(&self) -> *const u8 {
        self.address
    }

    /// Layout descriptor.
    #[inline]
    pub fn info(&self) -> BitmapInfo {
        self.info
    }

    /// Whether writes through this descriptor are forbidden.
    #[inline]
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the address is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.address.is_null()
    }

    /// Rematerialize the memory as a bounds-checked view.
    ///
    /// # Safety
    ///
    /// `address` must point to at least `info.required_bytes()` readable
    /// bytes that remain valid and unmutated-by-others for the caller-chosen
    /// lifetime `'a`.
    pub unsafe fn as_view<'a>(&self) -> BitmapView<'a> {
        let len = self.info.required_bytes();
        let data = if len == 0 {
            &[]
        } else {
            // SAFETY: caller guarantees address validity for `len` bytes.
            unsafe { core::slice::from_raw_parts(self.address, len) }
        };
        BitmapView::from_raw_parts(data, self.info)
    }

    /// Rematerialize the memory as a mutable bounds-checked view.
    ///
    /// # Errors
    ///
    /// [`AccessError::ReadOnly`] if the descriptor was created read-only.
    ///
    /// # Safety
    ///
    /// `address` must point to at least `info.required_bytes()` writable
    /// bytes, valid for the caller-chosen lifetime `'a`, with no other
    /// reads or writes through any alias during that lifetime.
    pub unsafe fn as_view_mut<'a>(&self) -> Result<BitmapViewMut<'a>, AccessError> {
        if self.read_only {
            return Err(AccessError::ReadOnly);
        }
        let len = self.info.required_bytes();
        let data = if len == 0 {
            &mut []
        } else {
            // SAFETY: caller guarantees exclusive, writable validity.
            unsafe { core::slice::from_raw_parts_mut(self.address as *mut u8, len) }
        };
        Ok(BitmapViewMut::from_raw_parts(data, self.info))
    }
}

// ---------------------------------------------------------------------------
// ExternalBitmap
// ---------------------------------------------------------------------------

/// Hooks a backend supplies alongside the memory it bridges.
///
/// `pin`/`unpin` bracket every access that exposes the memory (for backends
/// whose resource must be re-locked per use); `release` runs exactly once
/// when the bridge is [released](ExternalBitmap::release).
#[derive(Default)]
pub struct BridgeHooks {
    /// Called before each access that exposes the bridged memory.
    pub pin: Option<Box<dyn Fn()>>,
    /// Called after each such access returns.
    pub unpin: Option<Box<dyn Fn()>>,
    /// Called exactly once by [`ExternalBitmap::release`].
    pub release: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for BridgeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHooks")
            .field("pin", &self.pin.is_some())
            .field("unpin", &self.unpin.is_some())
            .field("release", &self.release.is_some())
            .finish()
    }
}

/// A bridge exposing externally-owned, locked memory (e.g. a locked native
/// bitmap) through the core's buffer contract.
///
/// The bridge's validity window is exactly `[bind, release)`. [`release`]
/// must be called exactly once by the same logical owner that acquired the
/// external lock; every access after release fails
/// [`AccessError::Disposed`]. Dropping a bridge without releasing it trips
/// a debug-only assertion and logs an error — a diagnostic, never a
/// cleanup path.
///
/// The bridge is deliberately not `Send`: an open bridge must not be
/// handed across threads.
///
/// [`release`]: Self::release
pub struct ExternalBitmap {
    raw: RawBitmap,
    hooks: BridgeHooks,
    released: bool,
}

impl ExternalBitmap {
    /// Bind an external memory region.
    ///
    /// # Safety
    ///
    /// `raw.address()` must point to at least `raw.info().required_bytes()`
    /// bytes that stay valid until [`release`](Self::release) is called,
    /// and nothing else may mutate them while the bridge is open.
    pub unsafe fn bind(raw: RawBitmap) -> Self {
        Self {
            raw,
            hooks: BridgeHooks::default(),
            released: false,
        }
    }

    /// Bind an external memory region with an unlock hook, run exactly once
    /// by [`release`](Self::release).
    ///
    /// # Safety
    ///
    /// Same contract as [`bind`](Self::bind).
    pub unsafe fn bind_with_release(raw: RawBitmap, release: impl FnOnce() + 'static) -> Self {
        Self {
            raw,
            hooks: BridgeHooks {
                release: Some(Box::new(release)),
                ..BridgeHooks::default()
            },
            released: false,
        }
    }

    /// Bind an external memory region with the full hook set.
    ///
    /// # Safety
    ///
    /// Same contract as [`bind`](Self::bind).
    pub unsafe fn bind_with_hooks(raw: RawBitmap, hooks: BridgeHooks) -> Self {
        Self {
            raw,
            hooks,
            released: false,
        }
    }

    /// Whether the bridge has been released.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check_open(&self) -> Result<(), AccessError> {
        if self.released {
            Err(AccessError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Layout of the bridged memory.
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] after release.
    pub fn info(&self) -> Result<BitmapInfo, AccessError> {
        self.check_open()?;
        Ok(self.raw.info())
    }

    /// Run `f` between the backend's pin and unpin hooks.
    fn pinned<R>(&self, f: impl FnOnce() -> R) -> R {
        if let Some(pin) = &self.hooks.pin {
            pin();
        }
        let result = f();
        if let Some(unpin) = &self.hooks.unpin {
            unpin();
        }
        result
    }

    /// Expose the raw descriptor to `f` for the duration of the call,
    /// bracketed by the backend's pin/unpin hooks.
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] after release.
    pub fn pin<R>(&self, f: impl FnOnce(RawBitmap) -> R) -> Result<R, AccessError> {
        self.check_open()?;
        Ok(self.pinned(|| f(self.raw)))
    }

    /// Run `f` with a bounds-checked view of the bridged memory.
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] after release.
    pub fn with_view<R>(&self, f: impl FnOnce(BitmapView<'_>) -> R) -> Result<R, AccessError> {
        self.check_open()?;
        // SAFETY: the bind contract guarantees validity until release, and
        // the view cannot escape `f`.
        Ok(self.pinned(|| f(unsafe { self.raw.as_view() })))
    }

    /// Run `f` with a mutable bounds-checked view of the bridged memory.
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] after release, [`AccessError::ReadOnly`]
    /// for a read-only binding.
    pub fn with_view_mut<R>(
        &mut self,
        f: impl FnOnce(BitmapViewMut<'_>) -> R,
    ) -> Result<R, AccessError> {
        self.check_open()?;
        let raw = self.raw;
        // SAFETY: the bind contract guarantees exclusive validity until
        // release; `&mut self` keeps this call unaliased on our side.
        self.pinned(|| unsafe { raw.as_view_mut() }.map(f))
    }

    /// Release the bridge, running the unlock hook. All later access fails
    /// [`AccessError::Disposed`].
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] on a second release.
    pub fn release(&mut self) -> Result<(), AccessError> {
        self.check_open()?;
        self.released = true;
        if let Some(hook) = self.hooks.release.take() {
            hook();
        }
        Ok(())
    }
}

impl Drop for ExternalBitmap {
    fn drop(&mut self) {
        if !self.released {
            log::error!("ExternalBitmap dropped without release()");
            debug_assert!(false, "ExternalBitmap dropped without release()");
        }
    }
}

impl fmt::Debug for ExternalBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExternalBitmap({}x{}, {:?}, {})",
            self.raw.info().width(),
            self.raw.info().height(),
            self.raw.info().format(),
            if self.released { "released" } else { "open" }
        )
    }
}

// ---------------------------------------------------------------------------
// ReinterpretBuffer
// ---------------------------------------------------------------------------

/// A bridge reinterpreting a typed element buffer as bitmap bytes.
///
/// Backends that hold pixel memory as `Vec<u32>` (or any other plain-old-data
/// element) can expose it as a bitmap without copying. Views are supported;
/// [`pin`](Self::pin) is rejected with [`AccessError::NotSupported`], since
/// handing out a raw address across the reinterpretation boundary cannot be
/// proven safe against the original element type.
pub struct ReinterpretBuffer<T> {
    data: alloc::vec::Vec<T>,
    info: BitmapInfo,
}

impl<T: Pod> ReinterpretBuffer<T> {
    /// Reinterpret `data` as a bitmap with the given layout.
    ///
    /// # Errors
    ///
    /// [`LayoutError::InsufficientData`] if the element buffer is too small
    /// for the layout.
    pub fn new(data: alloc::vec::Vec<T>, info: BitmapInfo) -> Result<Self, LayoutError> {
        if data.len() * size_of::<T>() < info.required_bytes() {
            return Err(LayoutError::InsufficientData);
        }
        Ok(Self { data, info })
    }

    /// Layout descriptor.
    #[inline]
    pub fn info(&self) -> BitmapInfo {
        self.info
    }

    /// Borrow the reinterpreted bytes as an immutable view.
    pub fn as_view(&self) -> BitmapView<'_> {
        BitmapView::from_raw_parts(bytemuck::cast_slice(&self.data), self.info)
    }

    /// Borrow the reinterpreted bytes as a mutable view.
    pub fn as_view_mut(&mut self) -> BitmapViewMut<'_> {
        BitmapViewMut::from_raw_parts(bytemuck::cast_slice_mut(&mut self.data), self.info)
    }

    /// Always fails: dual-typed pinning cannot be proven safe.
    ///
    /// # Errors
    ///
    /// [`AccessError::NotSupported`], unconditionally.
    pub fn pin<R>(&self, _f: impl FnOnce(RawBitmap) -> R) -> Result<R, AccessError> {
        Err(AccessError::NotSupported)
    }

    /// Recover the typed element buffer.
    pub fn into_inner(self) -> alloc::vec::Vec<T> {
        self.data
    }
}

impl<T> fmt::Debug for ReinterpretBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReinterpretBuffer({}x{}, {:?})",
            self.info.width(),
            self.info.height(),
            self.info.format()
        )
    }
}
