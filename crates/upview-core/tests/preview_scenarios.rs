//! End-to-end preview scenarios against the deterministic host.
//!
//! Verifies:
//! 1. Embedded image data is shown without ever creating a probe
//! 2. Non-image embedded data falls through to the local-path probe
//! 3. Zero-dimension probes are failures and show the placeholder at 0×0
//! 4. A native probe error terminates exactly once and stops the poll timer
//! 5. Poll-only hosts are still observed through `is_complete()`
//! 6. Dispose deregisters the registered handler and removes the surface
//! 7. Overlapping runs follow the configured stale-run policy

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use upview_core::display::{DisplayBounds, Length, UNBOUNDED_SIZE};
use upview_core::sim::{SimControl, SimHost, SimImage};
use upview_core::{
    BLANK_IMAGE_SRC, ControlRef, PreviewConfig, PreviewError, PreviewOutcome, PreviewSession,
    StaleRunPolicy, StrategyKind,
};

const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAA";
const CAT_PATH: &str = "C:\\Photos\\cat.png";

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

struct Fixture {
    host: Rc<SimHost>,
    control: SimControl,
    session: PreviewSession<SimHost>,
    outcomes: Rc<RefCell<Vec<PreviewOutcome>>>,
}

fn fixture_with(config: PreviewConfig) -> Fixture {
    let host = Rc::new(SimHost::new());
    let control = host.add_control("photo", true);
    let session =
        PreviewSession::with_config(Rc::clone(&host), ControlRef::Element(control.clone()), config)
            .expect("bind session");
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    {
        let outcomes = Rc::clone(&outcomes);
        session
            .set_outcome_listener(move |outcome| outcomes.borrow_mut().push(outcome.clone()))
            .expect("listener");
    }
    Fixture {
        host,
        control,
        session,
        outcomes,
    }
}

fn fixture() -> Fixture {
    fixture_with(PreviewConfig::default())
}

fn assert_placeholder(fx: &Fixture) {
    let surface = fx.session.surface_element().unwrap();
    assert_eq!(surface.source(), BLANK_IMAGE_SRC);
    let style = surface.style().expect("style applied");
    assert_eq!(style.width, Length::Px(0));
    assert_eq!(style.height, Length::Px(0));
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn surface_starts_as_invisible_placeholder_after_control() {
    let fx = fixture();
    let surface = fx.session.surface_element().unwrap();
    assert_eq!(surface.inserted_after(), "photo");
    assert_eq!(surface.source(), BLANK_IMAGE_SRC);
    assert_eq!(surface.attributes(), Some((0, 0)));
    assert_eq!(surface.style(), None);
    assert_eq!(fx.host.surfaces().len(), 1);
    assert_eq!(fx.control.listener_count(), 1);
    assert!(fx.session.control_element().unwrap().same_as(&fx.control));
}

#[test]
fn control_can_be_resolved_by_id() {
    let host = Rc::new(SimHost::new());
    let control = host.add_control("avatar", true);
    let session = PreviewSession::new(Rc::clone(&host), "avatar").unwrap();
    assert!(session.control_element().unwrap().same_as(&control));
}

#[test]
fn unknown_id_is_rejected() {
    let host = Rc::new(SimHost::new());
    let err = PreviewSession::new(host, "missing").err();
    assert_eq!(err, Some(PreviewError::ControlNotFound("missing".into())));
}

#[test]
fn detached_control_is_rejected() {
    let host = Rc::new(SimHost::new());
    let control = host.add_control("loose", false);
    let err = PreviewSession::new(Rc::clone(&host), ControlRef::Element(control.clone())).err();
    assert_eq!(err, Some(PreviewError::Detached));
    assert_eq!(control.listener_count(), 0);
}

// ---------------------------------------------------------------------------
// Embedded-data strategy
// ---------------------------------------------------------------------------

#[test]
fn embedded_png_is_shown_without_probing() {
    let fx = fixture();
    fx.host.register_image(PNG_URI, SimImage::new(800.0, 400.0));
    fx.control.select(CAT_PATH, Some(PNG_URI));

    fx.control.fire_change();
    let surface = fx.session.surface_element().unwrap();
    // Source is set right away; sizing waits for the settle delay.
    assert_eq!(surface.source(), PNG_URI);
    assert_eq!(surface.style(), None);

    fx.host.advance(ms(10));
    let style = surface.style().expect("style applied");
    assert_eq!(style.width, Length::Px(200));
    assert_eq!(style.height, Length::Px(100));
    assert!(fx.host.probes().is_empty());
    assert_eq!(fx.outcomes.borrow().len(), 1);
    assert!(matches!(
        &fx.outcomes.borrow()[0],
        PreviewOutcome::Shown { strategy: StrategyKind::EmbeddedData, source, .. } if source == PNG_URI
    ));
}

#[test]
fn embedded_data_without_introspection_uses_auto_size() {
    let fx = fixture();
    fx.host.set_natural_size_introspection(false);
    fx.control.select(CAT_PATH, Some(PNG_URI));

    fx.session.trigger_preview().unwrap();

    let style = fx.session.surface_element().unwrap().style().unwrap();
    assert_eq!(style.width, Length::Auto);
    assert_eq!(style.height, Length::Auto);
    assert_eq!(style.max_width_css(), "200px");
    assert_eq!(fx.host.active_timer_count(), 0);
    assert!(fx.host.probes().is_empty());
}

#[test]
fn non_image_embedded_data_falls_through_to_local_path() {
    let fx = fixture();
    fx.host.register_image(CAT_PATH, SimImage::new(100.0, 50.0));
    fx.control
        .select(CAT_PATH, Some("data:text/plain;base64,aGVsbG8="));

    fx.control.fire_change();
    let probes = fx.host.probes();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].source.as_deref(), Some(CAT_PATH));

    fx.host.advance(ms(20));
    let surface = fx.session.surface_element().unwrap();
    assert_eq!(surface.source(), CAT_PATH);
    let style = surface.style().unwrap();
    assert_eq!(style.width, Length::Px(100));
    assert_eq!(style.height, Length::Px(50));
    assert_eq!(fx.host.active_timer_count(), 0);
    assert!(matches!(
        &fx.outcomes.borrow()[0],
        PreviewOutcome::Shown { strategy: StrategyKind::LocalPath, .. }
    ));
}

// ---------------------------------------------------------------------------
// Local-path strategy
// ---------------------------------------------------------------------------

#[test]
fn zero_width_probe_is_failure() {
    let fx = fixture();
    fx.host.register_image(CAT_PATH, SimImage::new(0.0, 120.0));
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(ms(20));

    assert_placeholder(&fx);
    assert_eq!(*fx.outcomes.borrow(), vec![PreviewOutcome::Placeholder]);
}

#[test]
fn zero_width_probe_seen_by_poll_is_failure() {
    let fx = fixture();
    fx.host
        .register_image(CAT_PATH, SimImage::new(0.0, 0.0).without_native_events());
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(ms(49));
    assert!(fx.outcomes.borrow().is_empty());
    fx.host.advance(ms(1));

    assert_placeholder(&fx);
    assert_eq!(fx.host.active_timer_count(), 0);
}

#[test]
fn native_error_fails_once_and_stops_polling() {
    let fx = fixture();
    fx.host.register_image(
        CAT_PATH,
        SimImage::broken().with_latency(ms(120)),
    );
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(ms(120));
    assert_eq!(*fx.outcomes.borrow(), vec![PreviewOutcome::Placeholder]);
    let ticks = fx.host.interval_ticks();
    assert_eq!(ticks, 2);

    fx.host.advance(Duration::from_secs(2));
    assert_eq!(fx.host.interval_ticks(), ticks);
    assert_eq!(fx.host.active_timer_count(), 0);
    assert_eq!(fx.outcomes.borrow().len(), 1);

    let probes = fx.host.probes();
    let probe = &probes[0];
    assert_eq!(probe.clear_calls, 1);
    assert!(!probe.hooks_installed);
}

#[test]
fn poll_only_host_detects_completion() {
    let fx = fixture();
    fx.host.register_image(
        CAT_PATH,
        SimImage::new(30.0, 40.0)
            .with_latency(ms(70))
            .without_native_events(),
    );
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(ms(99));
    assert!(fx.outcomes.borrow().is_empty());

    fx.host.advance(ms(1));
    let style = fx.session.surface_element().unwrap().style().unwrap();
    assert_eq!(style.width, Length::Px(30));
    assert_eq!(style.height, Length::Px(40));
    assert_eq!(fx.host.active_timer_count(), 0);
}

#[test]
fn stalled_probe_gives_up_after_timeout() {
    let fx = fixture_with(PreviewConfig::default().with_probe_timeout(ms(200)));
    fx.host
        .register_image(CAT_PATH, SimImage::new(10.0, 10.0).stalled());
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(ms(199));
    assert!(fx.outcomes.borrow().is_empty());

    fx.host.advance(ms(1));
    assert_eq!(*fx.outcomes.borrow(), vec![PreviewOutcome::Placeholder]);
    assert_eq!(fx.host.active_timer_count(), 0);
}

#[test]
fn stalled_probe_without_timeout_keeps_polling() {
    let fx = fixture();
    fx.host
        .register_image(CAT_PATH, SimImage::new(10.0, 10.0).stalled());
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.host.advance(Duration::from_secs(1));
    assert!(fx.outcomes.borrow().is_empty());
    assert_eq!(fx.host.interval_ticks(), 20);
    assert_eq!(fx.host.active_timer_count(), 1);
}

#[test]
fn empty_value_fails_without_probe() {
    let fx = fixture();
    fx.control.select("", None);

    fx.session.trigger_preview().unwrap();

    assert_placeholder(&fx);
    assert!(fx.host.probes().is_empty());
}

#[test]
fn probe_creation_failure_degrades_to_placeholder() {
    let fx = fixture();
    fx.host.set_probe_creation_fails(true);
    fx.control.select(CAT_PATH, None);

    fx.session.trigger_preview().unwrap();

    assert_eq!(*fx.outcomes.borrow(), vec![PreviewOutcome::Placeholder]);
}

// ---------------------------------------------------------------------------
// Pipeline exhaustion and bounds
// ---------------------------------------------------------------------------

#[test]
fn exhausted_pipeline_shows_placeholder_at_zero_size() {
    let fx = fixture();
    fx.control.select("C:\\fakepath\\unreadable.png", None);

    fx.control.fire_change();
    fx.host.advance(ms(100));

    assert_placeholder(&fx);
    let style = fx.session.surface_element().unwrap().style().unwrap();
    assert_eq!(style.max_width_css(), "200px");
    assert_eq!(style.max_height_css(), "200px");
}

#[test]
fn nan_bounds_become_unbounded() {
    let fx = fixture();
    fx.session.set_max_display_size(f64::NAN, f64::NAN).unwrap();
    assert_eq!(
        fx.session.max_display_size().unwrap(),
        DisplayBounds::new(UNBOUNDED_SIZE, UNBOUNDED_SIZE)
    );

    fx.host.register_image(CAT_PATH, SimImage::new(12_000.0, 6_000.0));
    fx.control.select(CAT_PATH, None);
    fx.control.fire_change();
    fx.host.advance(ms(20));

    let style = fx.session.surface_element().unwrap().style().unwrap();
    assert_eq!(style.width, Length::Px(10_000));
    assert_eq!(style.height, Length::Px(5_000));
    assert_eq!(style.max_width_css(), "10000px");
}

#[test]
fn bounds_are_read_when_the_run_finishes() {
    let fx = fixture();
    fx.host.register_image(CAT_PATH, SimImage::new(400.0, 100.0));
    fx.control.select(CAT_PATH, None);

    fx.control.fire_change();
    fx.session.set_max_display_size(100.0, 100.0).unwrap();
    fx.host.advance(ms(20));

    let style = fx.session.surface_element().unwrap().style().unwrap();
    assert_eq!(style.width, Length::Px(100));
    assert_eq!(style.height, Length::Px(25));
}

// ---------------------------------------------------------------------------
// Disposal
// ---------------------------------------------------------------------------

#[test]
fn dispose_deregisters_the_registered_handler() {
    let fx = fixture();
    fx.host.register_image(CAT_PATH, SimImage::new(10.0, 10.0));
    fx.control.select(CAT_PATH, None);
    let surface = fx.session.surface_element().unwrap();

    fx.session.dispose().unwrap();
    assert_eq!(fx.control.listener_count(), 0);
    assert!(surface.is_removed());

    fx.control.fire_change();
    fx.host.advance(ms(100));
    assert!(fx.host.probes().is_empty());
    assert!(fx.outcomes.borrow().is_empty());
}

#[test]
fn operations_after_dispose_fail_fast() {
    let fx = fixture();
    fx.session.dispose().unwrap();

    assert!(fx.session.is_disposed());
    assert_eq!(fx.session.trigger_preview(), Err(PreviewError::Disposed));
    assert_eq!(
        fx.session.set_max_display_size(10.0, 10.0),
        Err(PreviewError::Disposed)
    );
    assert!(matches!(fx.session.surface_element(), Err(PreviewError::Disposed)));
    assert!(matches!(fx.session.control_element(), Err(PreviewError::Disposed)));
    assert_eq!(fx.session.dispose(), Err(PreviewError::Disposed));
}

#[test]
fn in_flight_probe_result_is_dropped_after_dispose() {
    let fx = fixture();
    fx.host
        .register_image(CAT_PATH, SimImage::new(10.0, 10.0).with_latency(ms(80)));
    fx.control.select(CAT_PATH, None);
    let surface = fx.session.surface_element().unwrap();

    fx.control.fire_change();
    fx.session.dispose().unwrap();
    fx.host.advance(ms(80));

    assert_eq!(surface.source(), BLANK_IMAGE_SRC);
    assert_eq!(surface.style(), None);
    assert_eq!(fx.host.active_timer_count(), 0);
}

#[test]
fn dropping_a_bound_session_disposes_it() {
    let host = Rc::new(SimHost::new());
    let control = host.add_control("photo", true);
    let session = PreviewSession::new(Rc::clone(&host), ControlRef::Element(control.clone())).unwrap();
    let surface = session.surface_element().unwrap();

    drop(session);

    assert_eq!(control.listener_count(), 0);
    assert!(surface.is_removed());
}

// ---------------------------------------------------------------------------
// Overlapping runs
// ---------------------------------------------------------------------------

const SLOW_PATH: &str = "C:\\Photos\\slow.png";
const FAST_PATH: &str = "C:\\Photos\\fast.png";

fn overlapping_runs(policy: StaleRunPolicy) -> Fixture {
    let fx = fixture_with(PreviewConfig::default().with_stale_runs(policy));
    fx.host
        .register_image(SLOW_PATH, SimImage::new(60.0, 60.0).with_latency(ms(300)));
    fx.host
        .register_image(FAST_PATH, SimImage::new(20.0, 20.0).with_latency(ms(20)));

    fx.control.select(SLOW_PATH, None);
    fx.control.fire_change();
    fx.control.select(FAST_PATH, None);
    fx.control.fire_change();

    fx.host.advance(ms(20));
    assert_eq!(fx.session.surface_element().unwrap().source(), FAST_PATH);
    fx.host.advance(ms(300));
    fx
}

#[test]
fn last_terminating_run_wins_by_default() {
    let fx = overlapping_runs(StaleRunPolicy::LastWriterWins);
    assert_eq!(fx.session.surface_element().unwrap().source(), SLOW_PATH);
    assert_eq!(fx.outcomes.borrow().len(), 2);
}

#[test]
fn superseded_run_is_discarded_when_configured() {
    let fx = overlapping_runs(StaleRunPolicy::DiscardSuperseded);
    assert_eq!(fx.session.surface_element().unwrap().source(), FAST_PATH);
    assert_eq!(fx.outcomes.borrow().len(), 1);
    assert_eq!(fx.host.active_timer_count(), 0);
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[test]
fn outcomes_serialize_for_hosts() {
    let fx = fixture();
    fx.host.register_image(CAT_PATH, SimImage::new(300.0, 150.0));
    fx.control.select(CAT_PATH, None);
    fx.control.fire_change();
    fx.host.advance(ms(20));

    let json = serde_json::to_value(&fx.outcomes.borrow()[0]).unwrap();
    assert_eq!(json["kind"], "shown");
    assert_eq!(json["strategy"], "local_path");
    assert_eq!(json["source"], CAT_PATH);
    assert_eq!(json["style"]["width"]["px"], 200);
    assert_eq!(json["style"]["height"]["px"], 100);
}
