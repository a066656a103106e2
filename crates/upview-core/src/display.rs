#![forbid(unsafe_code)]

//! Bounded display sizing for the preview surface.
//!
//! Given a source and its natural dimensions, [`plan_style`] computes the
//! style to apply and [`show`] pushes source and style onto a
//! [`DisplayElement`].
//!
//! # Dominant-axis policy
//!
//! Scaling only ever looks at the dominant axis. A landscape image
//! (`width > height`) is checked against `max_width` alone; anything else is
//! checked against `max_height` alone. A landscape image whose height exceeds
//! `max_height` is therefore left unscaled. This is intentional: the
//! `max-width`/`max-height` style bounds that are always applied act as the
//! layout-level safety net for that case.
//!
//! # Unspecified sizes
//!
//! A negative dimension is the "no explicit size" sentinel
//! ([`UNSPECIFIED_SIZE`]); that axis is rendered as `auto` and left to the
//! style bounds.

use serde::{Deserialize, Serialize};

use crate::host::DisplayElement;

/// Default bound for both axes.
pub const DEFAULT_MAX_SIZE: f64 = 200.0;

/// Bound substituted for non-numeric input: large enough to mean "no limit".
pub const UNBOUNDED_SIZE: f64 = 10_000.0;

/// Sentinel dimension meaning "no explicit size, let layout decide".
pub const UNSPECIFIED_SIZE: f64 = -1.0;

/// Maximum display size along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBounds {
    max_width: f64,
    max_height: f64,
}

impl DisplayBounds {
    /// Create bounds, normalizing non-numeric values to [`UNBOUNDED_SIZE`].
    #[must_use]
    pub fn new(max_width: f64, max_height: f64) -> Self {
        Self {
            max_width: normalize_bound(max_width),
            max_height: normalize_bound(max_height),
        }
    }

    #[must_use]
    pub const fn max_width(&self) -> f64 {
        self.max_width
    }

    #[must_use]
    pub const fn max_height(&self) -> f64 {
        self.max_height
    }
}

impl Default for DisplayBounds {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_SIZE,
            max_height: DEFAULT_MAX_SIZE,
        }
    }
}

fn normalize_bound(value: f64) -> f64 {
    if value.is_finite() { value } else { UNBOUNDED_SIZE }
}

/// One axis of the applied size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    /// Whole pixels.
    Px(i64),
    /// Intrinsic sizing, constrained only by the style bounds.
    Auto,
}

impl Length {
    /// Convert a computed dimension, rounding half up like `Math.round`.
    #[must_use]
    pub fn from_dimension(value: f64) -> Self {
        if value >= 0.0 {
            Self::Px((value + 0.5).floor() as i64)
        } else {
            Self::Auto
        }
    }
}

impl core::fmt::Display for Length {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Px(px) => write!(f, "{px}px"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Style written to the surface by every display step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceStyle {
    pub max_width: f64,
    pub max_height: f64,
    pub width: Length,
    pub height: Length,
}

impl SurfaceStyle {
    /// CSS value for `max-width`.
    #[must_use]
    pub fn max_width_css(&self) -> String {
        format!("{}px", self.max_width)
    }

    /// CSS value for `max-height`.
    #[must_use]
    pub fn max_height_css(&self) -> String {
        format!("{}px", self.max_height)
    }
}

/// Scale `(width, height)` along the dominant axis only.
#[must_use]
pub fn fit_dominant_axis(width: f64, height: f64, bounds: DisplayBounds) -> (f64, f64) {
    if width > height {
        if width > bounds.max_width {
            return (bounds.max_width, height * bounds.max_width / width);
        }
    } else if height > bounds.max_height {
        return (width * bounds.max_height / height, bounds.max_height);
    }
    (width, height)
}

/// Compute the style for a source of the given natural size.
#[must_use]
pub fn plan_style(width: f64, height: f64, bounds: DisplayBounds) -> SurfaceStyle {
    let (width, height) = fit_dominant_axis(width, height, bounds);
    SurfaceStyle {
        max_width: bounds.max_width,
        max_height: bounds.max_height,
        width: Length::from_dimension(width),
        height: Length::from_dimension(height),
    }
}

/// Apply `source` at its bounded size to `surface`, returning the style used.
pub fn show<S: DisplayElement>(
    surface: &S,
    source: &str,
    width: f64,
    height: f64,
    bounds: DisplayBounds,
) -> SurfaceStyle {
    let style = plan_style(width, height, bounds);
    surface.set_source(source);
    surface.apply_style(&style);
    style
}
