#![forbid(unsafe_code)]

//! Deterministic in-memory host.
//!
//! [`SimHost`] implements [`Host`] without a browser:
//! - **Explicit time**: nothing happens until [`SimHost::advance`] is called;
//!   due timers then fire in `(due, id)` order.
//! - **Scripted images**: [`SimHost::register_image`] decides how a source
//!   loads (size, latency, whether native hooks fire). Unregistered sources
//!   behave like broken images.
//! - **Inspectable state**: controls, surfaces, and probes can be read back
//!   to assert on listeners, applied styles, and cleanup.
//!
//! It backs the crate's tests and can drive a session headlessly.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use crate::display::SurfaceStyle;
use crate::error::PreviewError;
use crate::host::{
    ChangeHandler, DataUriCallback, DisplayElement, FileControl, Host, ProbeImage, TimerHandle,
};
use crate::strategy::BLANK_IMAGE_SRC;

const DEFAULT_LOAD_LATENCY: Duration = Duration::from_millis(20);
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How a source behaves when loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimImage {
    pub width: f64,
    pub height: f64,
    /// Time until the load settles; `None` never settles.
    pub latency: Option<Duration>,
    /// Whether settling fires the native load/error hook. When false only
    /// polling `is_complete()` can notice.
    pub native_events: bool,
    /// Settles with an error instead of decoding.
    pub broken: bool,
}

impl SimImage {
    /// A decodable image of the given size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            latency: Some(DEFAULT_LOAD_LATENCY),
            native_events: true,
            broken: false,
        }
    }

    /// A source that fails to load.
    #[must_use]
    pub const fn broken() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            latency: Some(DEFAULT_LOAD_LATENCY),
            native_events: true,
            broken: true,
        }
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.latency = None;
        self
    }

    #[must_use]
    pub const fn without_native_events(mut self) -> Self {
        self.native_events = false;
        self
    }
}

type SharedTask = Rc<RefCell<Box<dyn FnMut()>>>;

enum SimTask {
    Once(Box<dyn FnOnce()>),
    Repeat(Duration, SharedTask),
}

struct SimTimer {
    due: Duration,
    task: SimTask,
}

struct SimWorld {
    now: Cell<Duration>,
    next_timer: Cell<u64>,
    timers: RefCell<BTreeMap<u64, SimTimer>>,
    interval_ticks: Cell<u64>,
    images: RefCell<HashMap<String, SimImage>>,
    controls: RefCell<HashMap<String, SimControl>>,
    surfaces: RefCell<Vec<SimSurface>>,
    probes: RefCell<Vec<Rc<ProbeState>>>,
    natural_size_introspection: Cell<bool>,
    probe_creation_fails: Cell<bool>,
}

impl SimWorld {
    fn image(&self, source: &str) -> SimImage {
        self.images
            .borrow()
            .get(source)
            .copied()
            .unwrap_or_else(SimImage::broken)
    }

    fn schedule(&self, delay: Duration, task: SimTask) -> TimerHandle {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        let due = self.now.get().saturating_add(delay);
        self.timers.borrow_mut().insert(id, SimTimer { due, task });
        TimerHandle::new(id)
    }

    /// Remove the earliest timer due at or before `limit`, rescheduling it
    /// first when it repeats.
    fn pop_due(&self, limit: Duration) -> Option<(Duration, SimTask)> {
        let mut timers = self.timers.borrow_mut();
        let (&id, due) = timers
            .iter()
            .filter(|(_, timer)| timer.due <= limit)
            .min_by_key(|(id, timer)| (timer.due, **id))
            .map(|(id, timer)| (id, timer.due))?;
        let timer = timers.remove(&id)?;
        match timer.task {
            SimTask::Once(task) => Some((due, SimTask::Once(task))),
            SimTask::Repeat(period, task) => {
                timers.insert(
                    id,
                    SimTimer {
                        due: due.saturating_add(period),
                        task: SimTask::Repeat(period, Rc::clone(&task)),
                    },
                );
                Some((due, SimTask::Repeat(period, task)))
            }
        }
    }
}

/// Deterministic host; see the module docs.
pub struct SimHost {
    world: Rc<SimWorld>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Empty document at time zero, with natural-size introspection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            world: Rc::new(SimWorld {
                now: Cell::new(Duration::ZERO),
                next_timer: Cell::new(1),
                timers: RefCell::new(BTreeMap::new()),
                interval_ticks: Cell::new(0),
                images: RefCell::new(HashMap::new()),
                controls: RefCell::new(HashMap::new()),
                surfaces: RefCell::new(Vec::new()),
                probes: RefCell::new(Vec::new()),
                natural_size_introspection: Cell::new(true),
                probe_creation_fails: Cell::new(false),
            }),
        }
    }

    /// Add a file control under `id`. A detached control has no parent node.
    pub fn add_control(&self, id: &str, attached: bool) -> SimControl {
        let control = SimControl {
            inner: Rc::new(ControlState {
                id: id.to_owned(),
                attached,
                value: RefCell::new(String::new()),
                data_uri: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
            }),
        };
        self.world
            .controls
            .borrow_mut()
            .insert(id.to_owned(), control.clone());
        control
    }

    /// Script how `source` loads, in probes and on surfaces alike.
    pub fn register_image(&self, source: &str, image: SimImage) {
        self.world
            .images
            .borrow_mut()
            .insert(source.to_owned(), image);
    }

    /// Toggle natural-size introspection on display surfaces.
    pub fn set_natural_size_introspection(&self, enabled: bool) {
        self.world.natural_size_introspection.set(enabled);
    }

    /// Make every subsequent `create_probe` fail.
    pub fn set_probe_creation_fails(&self, fails: bool) {
        self.world.probe_creation_fails.set(fails);
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.world.now.get()
    }

    /// Advance time by `dt`, firing every timer that comes due on the way.
    pub fn advance(&self, dt: Duration) {
        let target = self.world.now.get().saturating_add(dt);
        while let Some((due, task)) = self.world.pop_due(target) {
            self.world.now.set(due);
            match task {
                SimTask::Once(task) => task(),
                SimTask::Repeat(_, task) => {
                    self.world
                        .interval_ticks
                        .set(self.world.interval_ticks.get() + 1);
                    (&mut *task.borrow_mut())();
                }
            }
        }
        self.world.now.set(target);
    }

    /// Number of timers (one-shot or repeating) still scheduled.
    #[must_use]
    pub fn active_timer_count(&self) -> usize {
        self.world.timers.borrow().len()
    }

    /// Total interval callbacks delivered so far.
    #[must_use]
    pub fn interval_ticks(&self) -> u64 {
        self.world.interval_ticks.get()
    }

    /// Every surface ever inserted, in creation order.
    #[must_use]
    pub fn surfaces(&self) -> Vec<SimSurface> {
        self.world.surfaces.borrow().clone()
    }

    /// Snapshots of every probe ever created, in creation order.
    #[must_use]
    pub fn probes(&self) -> Vec<SimProbeSnapshot> {
        self.world
            .probes
            .borrow()
            .iter()
            .map(|probe| probe.snapshot())
            .collect()
    }
}

impl Host for SimHost {
    type Control = SimControl;
    type Surface = SimSurface;
    type Probe = SimProbe;

    fn find_control(&self, key: &str) -> Option<Self::Control> {
        self.world.controls.borrow().get(key).cloned()
    }

    fn insert_surface_after(&self, control: &Self::Control) -> Result<Self::Surface, PreviewError> {
        if !control.inner.attached {
            return Err(PreviewError::Detached);
        }
        let surface = SimSurface {
            world: Rc::downgrade(&self.world),
            inner: Rc::new(SurfaceState {
                after: control.inner.id.clone(),
                source: RefCell::new(String::new()),
                attributes: Cell::new(None),
                style: Cell::new(None),
                removed: Cell::new(false),
            }),
        };
        self.world.surfaces.borrow_mut().push(surface.clone());
        Ok(surface)
    }

    fn remove_surface(&self, surface: &Self::Surface) {
        surface.inner.removed.set(true);
    }

    fn create_probe(&self) -> Result<Self::Probe, PreviewError> {
        if self.world.probe_creation_fails.get() {
            return Err(PreviewError::Host("image constructor unavailable".into()));
        }
        let state = Rc::new(ProbeState::default());
        self.world.probes.borrow_mut().push(Rc::clone(&state));
        Ok(SimProbe {
            world: Rc::downgrade(&self.world),
            state,
        })
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerHandle {
        self.world.schedule(delay, SimTask::Once(task))
    }

    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle {
        let period = period.max(MIN_INTERVAL);
        self.world
            .schedule(period, SimTask::Repeat(period, Rc::new(RefCell::new(task))))
    }

    fn clear_timer(&self, handle: TimerHandle) {
        self.world.timers.borrow_mut().remove(&handle.raw());
    }
}

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

struct ControlState {
    id: String,
    attached: bool,
    value: RefCell<String>,
    data_uri: RefCell<Option<String>>,
    listeners: RefCell<Vec<ChangeHandler>>,
}

/// Simulated file input.
#[derive(Clone)]
pub struct SimControl {
    inner: Rc<ControlState>,
}

impl SimControl {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Simulate a selection: `value` is the reflected path, `data_uri` what a
    /// same-process read yields (`None` when the host cannot read in-process).
    pub fn select(&self, value: &str, data_uri: Option<&str>) {
        *self.inner.value.borrow_mut() = value.to_owned();
        *self.inner.data_uri.borrow_mut() = data_uri.map(str::to_owned);
    }

    /// Deliver a change notification to every registered listener.
    pub fn fire_change(&self) {
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener.call();
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Whether both values refer to the same control.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl FileControl for SimControl {
    fn value(&self) -> String {
        self.inner.value.borrow().clone()
    }

    fn read_data_uri(&self, done: DataUriCallback) {
        let data = self.inner.data_uri.borrow().clone();
        done(data);
    }

    fn add_change_listener(&self, handler: &ChangeHandler) -> Result<(), PreviewError> {
        self.inner.listeners.borrow_mut().push(handler.clone());
        Ok(())
    }

    fn remove_change_listener(&self, handler: &ChangeHandler) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|registered| !registered.same_as(handler));
    }
}

// ---------------------------------------------------------------------------
// Surfaces
// ---------------------------------------------------------------------------

struct SurfaceState {
    after: String,
    source: RefCell<String>,
    attributes: Cell<Option<(u32, u32)>>,
    style: Cell<Option<SurfaceStyle>>,
    removed: Cell<bool>,
}

/// Simulated `<img>` display node.
#[derive(Clone)]
pub struct SimSurface {
    world: Weak<SimWorld>,
    inner: Rc<SurfaceState>,
}

impl SimSurface {
    /// Id of the control this surface was inserted after.
    #[must_use]
    pub fn inserted_after(&self) -> &str {
        &self.inner.after
    }

    #[must_use]
    pub fn source(&self) -> String {
        self.inner.source.borrow().clone()
    }

    /// Width/height attributes, if ever set.
    #[must_use]
    pub fn attributes(&self) -> Option<(u32, u32)> {
        self.inner.attributes.get()
    }

    /// Last applied style, if any.
    #[must_use]
    pub fn style(&self) -> Option<SurfaceStyle> {
        self.inner.style.get()
    }

    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.inner.removed.get()
    }

    /// Whether the source is the neutral placeholder.
    #[must_use]
    pub fn shows_placeholder(&self) -> bool {
        *self.inner.source.borrow() == BLANK_IMAGE_SRC
    }

    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl DisplayElement for SimSurface {
    fn set_source(&self, source: &str) {
        *self.inner.source.borrow_mut() = source.to_owned();
    }

    fn set_size_attributes(&self, width: u32, height: u32) {
        self.inner.attributes.set(Some((width, height)));
    }

    fn apply_style(&self, style: &SurfaceStyle) {
        self.inner.style.set(Some(*style));
    }

    fn natural_size(&self) -> Option<(f64, f64)> {
        let world = self.world.upgrade()?;
        if !world.natural_size_introspection.get() {
            return None;
        }
        let image = world.image(&self.inner.source.borrow());
        if image.broken {
            Some((0.0, 0.0))
        } else {
            Some((image.width, image.height))
        }
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ProbeState {
    source: RefCell<Option<String>>,
    complete: Cell<bool>,
    size: Cell<(f64, f64)>,
    on_load: RefCell<Option<SharedTask>>,
    on_error: RefCell<Option<SharedTask>>,
    clear_calls: Cell<u32>,
}

impl ProbeState {
    fn settle(&self, image: SimImage) {
        self.complete.set(true);
        if !image.broken {
            self.size.set((image.width, image.height));
        }
        if !image.native_events {
            return;
        }
        let hook = if image.broken {
            self.on_error.borrow().clone()
        } else {
            self.on_load.borrow().clone()
        };
        if let Some(hook) = hook {
            (&mut *hook.borrow_mut())();
        }
    }

    fn snapshot(&self) -> SimProbeSnapshot {
        SimProbeSnapshot {
            source: self.source.borrow().clone(),
            complete: self.complete.get(),
            hooks_installed: self.on_load.borrow().is_some() || self.on_error.borrow().is_some(),
            clear_calls: self.clear_calls.get(),
        }
    }
}

/// Read-only view of a probe for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimProbeSnapshot {
    pub source: Option<String>,
    pub complete: bool,
    pub hooks_installed: bool,
    pub clear_calls: u32,
}

/// Simulated off-tree `Image`.
pub struct SimProbe {
    world: Weak<SimWorld>,
    state: Rc<ProbeState>,
}

impl ProbeImage for SimProbe {
    fn set_handlers(&self, on_load: Box<dyn FnMut()>, on_error: Box<dyn FnMut()>) {
        *self.state.on_load.borrow_mut() = Some(Rc::new(RefCell::new(on_load)));
        *self.state.on_error.borrow_mut() = Some(Rc::new(RefCell::new(on_error)));
    }

    fn clear_handlers(&self) {
        self.state.on_load.borrow_mut().take();
        self.state.on_error.borrow_mut().take();
        self.state.clear_calls.set(self.state.clear_calls.get() + 1);
    }

    fn set_source(&self, source: &str) {
        *self.state.source.borrow_mut() = Some(source.to_owned());
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let image = world.image(source);
        let Some(latency) = image.latency else {
            return;
        };
        let state = Rc::clone(&self.state);
        world.schedule(latency, SimTask::Once(Box::new(move || state.settle(image))));
    }

    fn is_complete(&self) -> bool {
        self.state.complete.get()
    }

    fn natural_size(&self) -> (f64, f64) {
        self.state.size.get()
    }
}
