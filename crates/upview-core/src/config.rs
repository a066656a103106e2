#![forbid(unsafe_code)]

//! Session configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::display::DisplayBounds;

/// What to do when a pipeline run finishes after a newer run has started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleRunPolicy {
    /// Every run applies its result when it terminates; whichever terminates
    /// last owns the surface, even if it was started first.
    #[default]
    LastWriterWins,
    /// Runs are stamped with a generation; results from a run that has been
    /// superseded by a later change are dropped.
    DiscardSuperseded,
}

/// Configuration for a [`PreviewSession`](crate::controller::PreviewSession).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewConfig {
    /// Display bounds applied to every shown source.
    /// Default: 200×200
    pub bounds: DisplayBounds,

    /// Poll period of the local-path probe.
    /// Default: 50ms
    pub poll_interval: Duration,

    /// Delay between setting an embedded-data source and reading its natural
    /// size, giving the host a tick to decode.
    /// Default: 10ms
    pub settle_delay: Duration,

    /// Give up on a local-path probe that has not terminated after this long.
    /// `None` polls until the probe reports load or error.
    /// Default: None
    pub probe_timeout: Option<Duration>,

    /// Handling of overlapping pipeline runs.
    /// Default: [`StaleRunPolicy::LastWriterWins`]
    pub stale_runs: StaleRunPolicy,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bounds: DisplayBounds::default(),
            poll_interval: Duration::from_millis(50),
            settle_delay: Duration::from_millis(10),
            probe_timeout: None,
            stale_runs: StaleRunPolicy::LastWriterWins,
        }
    }
}

impl PreviewConfig {
    #[must_use]
    pub fn with_bounds(mut self, bounds: DisplayBounds) -> Self {
        self.bounds = bounds;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = Some(probe_timeout);
        self
    }

    #[must_use]
    pub fn with_stale_runs(mut self, stale_runs: StaleRunPolicy) -> Self {
        self.stale_runs = stale_runs;
        self
    }
}
