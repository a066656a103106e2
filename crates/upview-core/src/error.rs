#![forbid(unsafe_code)]

//! Errors surfaced by session construction and post-dispose misuse.
//!
//! Failures inside the acquisition pipeline never show up here: they collapse
//! into [`StrategyResult::Failure`](crate::strategy::StrategyResult) and end,
//! at worst, with the placeholder being displayed.

/// Session-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    /// No control is registered under the given lookup key.
    ControlNotFound(String),
    /// The control is not attached to a parent node, so the surface has
    /// nowhere to be inserted.
    Detached,
    /// The session was already disposed.
    Disposed,
    /// A host call failed.
    Host(String),
}

impl core::fmt::Display for PreviewError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ControlNotFound(key) => write!(f, "no file control with id {key:?}"),
            Self::Detached => f.write_str("file control has no parent node"),
            Self::Disposed => f.write_str("preview session already disposed"),
            Self::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl std::error::Error for PreviewError {}
