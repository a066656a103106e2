#![forbid(unsafe_code)]

//! Conversions between browser primitives and core types.
//!
//! Browser timers take `i32` milliseconds and hand back `i32` ids; outcome
//! listeners on the JS side receive JSON strings. Kept free of `wasm-bindgen`
//! so the conversions are tested natively.

use core::time::Duration;

use upview_core::PreviewOutcome;
use upview_core::host::TimerHandle;

/// Delay in whole milliseconds, saturating at `i32::MAX`.
#[must_use]
pub fn delay_millis(delay: Duration) -> i32 {
    i32::try_from(delay.as_millis()).unwrap_or(i32::MAX)
}

/// Wrap a browser timer id.
#[must_use]
pub fn timer_handle(id: i32) -> TimerHandle {
    TimerHandle::new(u64::try_from(id).unwrap_or_default())
}

/// Browser timer id behind `handle`, if it could have come from
/// [`timer_handle`]. Handle 0 never names a live timer.
#[must_use]
pub fn timer_id(handle: TimerHandle) -> Option<i32> {
    i32::try_from(handle.raw()).ok().filter(|id| *id > 0)
}

/// JSON payload delivered to `onPreview` callbacks.
#[must_use]
pub fn outcome_json(outcome: &PreviewOutcome) -> Option<String> {
    serde_json::to_string(outcome).ok()
}
