#![forbid(unsafe_code)]

//! `upview-core` renders a live preview of a locally selected image next to
//! a file-input control, without uploading anything.
//!
//! Design goals:
//! - **Host-driven**: the embedding environment implements [`host::Host`]
//!   and delivers change notifications, image loads, and timer ticks.
//! - **Ordered fallback**: [`pipeline::AcquisitionPipeline`] tries
//!   [`strategy`] functions one at a time until one yields a source.
//! - **Nothing fatal**: every pipeline failure degrades to the placeholder.
//!
//! [`controller::PreviewSession`] ties these together; [`sim::SimHost`] is a
//! deterministic host for headless use and tests.

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod host;
pub mod logging;
pub mod pipeline;
pub mod sim;
pub mod strategy;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, info, trace, warn};

pub use config::{PreviewConfig, StaleRunPolicy};
pub use controller::{ControlRef, PreviewOutcome, PreviewSession};
pub use display::{DisplayBounds, Length, SurfaceStyle};
pub use error::PreviewError;
pub use pipeline::{AcquisitionPipeline, PipelineOutcome};
pub use strategy::{Acquired, BLANK_IMAGE_SRC, StrategyKind, StrategyResult};
