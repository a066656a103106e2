#![forbid(unsafe_code)]

//! Preview-acquisition strategies.
//!
//! A strategy is a plain function that receives a [`StrategyContext`] and a
//! [`Completion`], and eventually calls the completion exactly once with a
//! [`StrategyResult`]. A strategy that cannot even attempt (capability
//! absent, pattern mismatch) completes synchronously with
//! [`StrategyResult::Failure`] so the pipeline advances without stalling.
//!
//! - [`embedded::embedded_data`]: same-process read of the selected file as a
//!   data URI.
//! - [`local_path::local_path`]: load the control's textual value into an
//!   off-tree probe image and wait for it to finish.

pub mod embedded;
pub mod local_path;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::PreviewConfig;
use crate::host::Host;

/// Transparent 1×1 GIF shown before any preview and after total failure.
pub const BLANK_IMAGE_SRC: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Image subtypes accepted in an embedded-data URI.
pub const EMBEDDED_IMAGE_SUBTYPES: [&str; 5] = ["png", "gif", "jpg", "jpeg", "bmp"];

/// Whether `uri` starts with `data:image/{png|gif|jpg|jpeg|bmp};base64`,
/// ignoring ASCII case.
#[must_use]
pub fn is_embedded_image_uri(uri: &str) -> bool {
    let Some(rest) = strip_prefix_ignore_case(uri, "data:image/") else {
        return false;
    };
    EMBEDDED_IMAGE_SUBTYPES.iter().any(|subtype| {
        strip_prefix_ignore_case(rest, subtype)
            .and_then(|tail| strip_prefix_ignore_case(tail, ";base64"))
            .is_some()
    })
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Identifies a strategy in logs and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    EmbeddedData,
    LocalPath,
}

impl StrategyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedData => "embedded_data",
            Self::LocalPath => "local_path",
        }
    }
}

/// A renderable source with its natural dimensions.
///
/// Dimensions are finite; a negative value means the size is unknown and the
/// display step falls back to intrinsic sizing for that axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquired {
    pub source: String,
    pub natural_width: f64,
    pub natural_height: f64,
}

/// Outcome of a single strategy. All-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StrategyResult {
    Success(Acquired),
    Failure,
}

impl StrategyResult {
    #[must_use]
    pub fn success(source: impl Into<String>, natural_width: f64, natural_height: f64) -> Self {
        Self::Success(Acquired {
            source: source.into(),
            natural_width,
            natural_height,
        })
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Continuation a strategy resolves exactly once.
pub type Completion = Box<dyn FnOnce(StrategyResult)>;

/// Everything a strategy may touch during one pipeline run.
pub struct StrategyContext<H: Host> {
    pub host: Rc<H>,
    pub control: H::Control,
    pub surface: H::Surface,
    pub config: PreviewConfig,
}

/// A strategy entry point.
pub type StrategyFn<H> = Rc<dyn Fn(Rc<StrategyContext<H>>, Completion)>;
