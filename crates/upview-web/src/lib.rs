#![forbid(unsafe_code)]

//! WASM frontend for upview.
//!
//! Implements the `upview-core` host traits over `web-sys` and exports the
//! `ImageUploadPreview` class to JavaScript:
//! - `new ImageUploadPreview(inputOrId)` binds to an `<input type=file>`,
//! - `preview()` re-runs acquisition for the current selection,
//! - `setMaxImageSize(w, h)` changes the display bounds,
//! - `onPreview(cb)` reports each outcome as JSON,
//! - `dispose()` unbinds and removes the preview image.

pub mod bridge;

#[cfg(target_arch = "wasm32")]
mod host;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use host::{WebControl, WebHost, WebProbe, WebSurface};
#[cfg(target_arch = "wasm32")]
pub use wasm::ImageUploadPreview;

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct ImageUploadPreview;

#[cfg(not(target_arch = "wasm32"))]
impl ImageUploadPreview {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}
