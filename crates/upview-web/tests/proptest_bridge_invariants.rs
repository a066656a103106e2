#![cfg(not(target_arch = "wasm32"))]

//! Property-based invariant tests for browser-side conversions.
//!
//! Verifies:
//! 1. Timer delays never go negative and never exceed `i32::MAX`
//! 2. Delay conversion is monotonic
//! 3. Every positive browser timer id survives the handle round trip
//! 4. Outcome payloads are valid JSON tagged by `kind`

use core::time::Duration;

use proptest::prelude::*;
use upview_core::display::{DisplayBounds, plan_style};
use upview_core::{PreviewOutcome, StrategyKind};
use upview_web::bridge::{delay_millis, outcome_json, timer_handle, timer_id};

proptest! {
    #[test]
    fn delay_is_in_browser_range(ms in any::<u64>()) {
        let millis = delay_millis(Duration::from_millis(ms));
        prop_assert!(millis >= 0);
        if ms <= i32::MAX as u64 {
            prop_assert_eq!(millis as u64, ms);
        } else {
            prop_assert_eq!(millis, i32::MAX);
        }
    }

    #[test]
    fn delay_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            delay_millis(Duration::from_micros(lo)) <= delay_millis(Duration::from_micros(hi))
        );
    }

    #[test]
    fn positive_ids_survive_handles(id in 1i32..=i32::MAX) {
        prop_assert_eq!(timer_id(timer_handle(id)), Some(id));
    }

    #[test]
    fn shown_outcome_json_is_tagged(
        source in "[a-zA-Z0-9:/\\\\._-]{1,40}",
        width in 0.0f64..5_000.0,
        height in 0.0f64..5_000.0,
    ) {
        let outcome = PreviewOutcome::Shown {
            strategy: StrategyKind::LocalPath,
            source: source.clone(),
            style: plan_style(width, height, DisplayBounds::default()),
        };
        let json = outcome_json(&outcome).expect("serializable");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        prop_assert_eq!(&value["kind"], "shown");
        prop_assert_eq!(&value["strategy"], "local_path");
        prop_assert_eq!(value["source"].as_str(), Some(source.as_str()));
    }
}
