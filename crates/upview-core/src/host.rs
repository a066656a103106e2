#![forbid(unsafe_code)]

//! Host capability surface.
//!
//! The preview logic never touches a document directly. The embedding
//! environment (a browser via `upview-web`, or [`crate::sim`] in tests)
//! implements these traits and drives all asynchrony: change notifications,
//! image loads, and timers all arrive as callbacks on one logical thread.

use core::time::Duration;
use std::rc::Rc;

use crate::display::SurfaceStyle;
use crate::error::PreviewError;

/// Callback delivering the result of a same-process file read.
pub type DataUriCallback = Box<dyn FnOnce(Option<String>)>;

/// Opaque timer id returned by [`Host::set_timeout`] and [`Host::set_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A change-notification callback with identity.
///
/// Deregistration keys off the exact instance handed to registration, so the
/// session keeps the handler it registered and passes that same value back.
/// Two handlers wrapping identical code are still different handlers.
#[derive(Clone)]
pub struct ChangeHandler(Rc<dyn Fn()>);

impl ChangeHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self) {
        (self.0)();
    }

    /// Whether `self` and `other` are the same registered instance.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        core::ptr::eq(
            Rc::as_ptr(&self.0).cast::<()>(),
            Rc::as_ptr(&other.0).cast::<()>(),
        )
    }
}

impl core::fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("ChangeHandler")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// A host-owned file-selection control.
pub trait FileControl {
    /// Current textual value (local path or bare filename).
    fn value(&self) -> String;

    /// Read the first attached file as a self-contained data URI.
    ///
    /// Must call `done(None)` synchronously when the host has no
    /// same-process read or no file is attached.
    fn read_data_uri(&self, done: DataUriCallback);

    /// Register `handler` for change notifications.
    fn add_change_listener(&self, handler: &ChangeHandler) -> Result<(), PreviewError>;

    /// Deregister the instance previously passed to
    /// [`add_change_listener`](Self::add_change_listener).
    fn remove_change_listener(&self, handler: &ChangeHandler);
}

/// The image-like node the preview is rendered into.
pub trait DisplayElement {
    fn set_source(&self, source: &str);

    /// Set the width/height attributes (not the style).
    fn set_size_attributes(&self, width: u32, height: u32);

    fn apply_style(&self, style: &SurfaceStyle);

    /// Intrinsic size of the current source, or `None` when the host offers
    /// no natural-dimension introspection at all.
    fn natural_size(&self) -> Option<(f64, f64)>;
}

/// A throwaway off-tree image used to test whether a source loads.
pub trait ProbeImage {
    /// Install native load/error hooks.
    fn set_handlers(&self, on_load: Box<dyn FnMut()>, on_error: Box<dyn FnMut()>);

    /// Remove both hooks; no further callbacks may be delivered.
    fn clear_handlers(&self);

    fn set_source(&self, source: &str);

    fn is_complete(&self) -> bool;

    /// Natural size as reported by the probe; zero while unknown.
    fn natural_size(&self) -> (f64, f64);
}

/// Document, element factory, and scheduler of the embedding environment.
pub trait Host: 'static {
    type Control: FileControl + Clone + 'static;
    type Surface: DisplayElement + Clone + 'static;
    type Probe: ProbeImage + 'static;

    /// Resolve a control by its lookup key.
    fn find_control(&self, key: &str) -> Option<Self::Control>;

    /// Create a surface and insert it as the sibling right after `control`.
    ///
    /// Fails with [`PreviewError::Detached`] when `control` has no parent.
    fn insert_surface_after(&self, control: &Self::Control) -> Result<Self::Surface, PreviewError>;

    /// Remove `surface` from the host tree.
    fn remove_surface(&self, surface: &Self::Surface);

    fn create_probe(&self) -> Result<Self::Probe, PreviewError>;

    /// Run `task` once after `delay`.
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerHandle;

    /// Run `task` every `period` until cleared.
    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle;

    /// Cancel a pending timeout or interval. Unknown handles are ignored.
    fn clear_timer(&self, handle: TimerHandle);
}
