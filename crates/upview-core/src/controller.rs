#![forbid(unsafe_code)]

//! Preview session: binds a file control to a display surface.
//!
//! # Lifecycle
//!
//! `new` binds: it resolves the control, inserts the surface right after it
//! (placeholder source, 0×0), and registers a change handler. Every change
//! notification then runs the acquisition pipeline. `dispose` deregisters
//! the exact handler instance it registered, removes the surface, and moves
//! the session to its terminal state, after which every operation fails with
//! [`PreviewError::Disposed`].
//!
//! # Overlapping runs
//!
//! A second change can arrive while a slow probe from the first is still in
//! flight. Under [`StaleRunPolicy::LastWriterWins`] both runs apply their
//! result when they terminate, so a slow first run can overwrite a fast
//! second one. [`StaleRunPolicy::DiscardSuperseded`] drops results from runs
//! that are no longer the latest. Neither policy cancels the stale probe.
//!
//! Disposal does not cancel in-flight probes either; their results are
//! dropped when they arrive since the surface is gone.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::config::{PreviewConfig, StaleRunPolicy};
use crate::display::{DisplayBounds, SurfaceStyle, show};
use crate::error::PreviewError;
use crate::host::{ChangeHandler, DisplayElement, FileControl, Host};
use crate::pipeline::{AcquisitionPipeline, PipelineOutcome};
use crate::strategy::{BLANK_IMAGE_SRC, StrategyContext, StrategyKind};

/// How the control is identified at construction.
#[derive(Debug, Clone)]
pub enum ControlRef<C> {
    /// A direct reference.
    Element(C),
    /// A lookup key resolved against the host document.
    Id(String),
}

impl<C> From<&str> for ControlRef<C> {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

impl<C> From<String> for ControlRef<C> {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// What a finished run put on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewOutcome {
    Shown {
        strategy: StrategyKind,
        source: String,
        style: SurfaceStyle,
    },
    Placeholder,
}

type OutcomeListener = Rc<dyn Fn(&PreviewOutcome)>;

struct Binding<H: Host> {
    control: H::Control,
    surface: H::Surface,
    handler: ChangeHandler,
}

struct SessionInner<H: Host> {
    host: Rc<H>,
    pipeline: AcquisitionPipeline<H>,
    config: Cell<PreviewConfig>,
    binding: RefCell<Option<Binding<H>>>,
    generation: Cell<u64>,
    listener: RefCell<Option<OutcomeListener>>,
}

impl<H: Host> SessionInner<H> {
    fn bound<T>(&self, f: impl FnOnce(&Binding<H>) -> T) -> Result<T, PreviewError> {
        self.binding
            .borrow()
            .as_ref()
            .map(f)
            .ok_or(PreviewError::Disposed)
    }

    fn trigger(self: &Rc<Self>) -> Result<(), PreviewError> {
        let (control, surface) =
            self.bound(|binding| (binding.control.clone(), binding.surface.clone()))?;
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);

        let span = crate::debug_span!("preview", generation);
        let _guard = span.enter();

        let ctx = Rc::new(StrategyContext {
            host: Rc::clone(&self.host),
            control,
            surface,
            config: self.config.get(),
        });
        let session = Rc::downgrade(self);
        self.pipeline.run(ctx, move |outcome| {
            if let Some(session) = session.upgrade() {
                session.finish(generation, outcome);
            }
        });
        Ok(())
    }

    fn finish(&self, generation: u64, outcome: PipelineOutcome) {
        let config = self.config.get();
        if config.stale_runs == StaleRunPolicy::DiscardSuperseded
            && generation != self.generation.get()
        {
            crate::debug!(generation, latest = self.generation.get(), "dropping superseded run");
            return;
        }
        let Ok(surface) = self.bound(|binding| binding.surface.clone()) else {
            crate::debug!(generation, "run finished after dispose");
            return;
        };

        let shown = match outcome {
            PipelineOutcome::Acquired { strategy, acquired } => {
                let style = show(
                    &surface,
                    &acquired.source,
                    acquired.natural_width,
                    acquired.natural_height,
                    config.bounds,
                );
                PreviewOutcome::Shown {
                    strategy,
                    source: acquired.source,
                    style,
                }
            }
            PipelineOutcome::Exhausted => {
                show(&surface, BLANK_IMAGE_SRC, 0.0, 0.0, config.bounds);
                PreviewOutcome::Placeholder
            }
        };

        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(&shown);
        }
    }

    fn release(&self) -> Result<(), PreviewError> {
        let binding = self
            .binding
            .borrow_mut()
            .take()
            .ok_or(PreviewError::Disposed)?;
        binding.control.remove_change_listener(&binding.handler);
        self.host.remove_surface(&binding.surface);
        self.listener.borrow_mut().take();
        Ok(())
    }
}

/// One preview surface bound to one file control.
pub struct PreviewSession<H: Host> {
    inner: Rc<SessionInner<H>>,
}

impl<H: Host> PreviewSession<H> {
    /// Bind to `control` with the default configuration.
    pub fn new(host: Rc<H>, control: impl Into<ControlRef<H::Control>>) -> Result<Self, PreviewError> {
        Self::with_config(host, control, PreviewConfig::default())
    }

    /// Bind to `control` using the standard strategy order.
    pub fn with_config(
        host: Rc<H>,
        control: impl Into<ControlRef<H::Control>>,
        config: PreviewConfig,
    ) -> Result<Self, PreviewError> {
        Self::with_pipeline(host, control, config, AcquisitionPipeline::standard())
    }

    /// Bind to `control` with an explicit pipeline.
    pub fn with_pipeline(
        host: Rc<H>,
        control: impl Into<ControlRef<H::Control>>,
        config: PreviewConfig,
        pipeline: AcquisitionPipeline<H>,
    ) -> Result<Self, PreviewError> {
        let control = match control.into() {
            ControlRef::Element(control) => control,
            ControlRef::Id(key) => host
                .find_control(&key)
                .ok_or(PreviewError::ControlNotFound(key))?,
        };

        let surface = host.insert_surface_after(&control)?;
        surface.set_source(BLANK_IMAGE_SRC);
        surface.set_size_attributes(0, 0);

        let inner = Rc::new_cyclic(|weak: &Weak<SessionInner<H>>| {
            let weak = weak.clone();
            let handler = ChangeHandler::new(move || {
                if let Some(inner) = weak.upgrade() {
                    crate::debug!("change notification");
                    let _ = inner.trigger();
                }
            });
            SessionInner {
                host: Rc::clone(&host),
                pipeline,
                config: Cell::new(config),
                binding: RefCell::new(Some(Binding {
                    control: control.clone(),
                    surface: surface.clone(),
                    handler,
                })),
                generation: Cell::new(0),
                listener: RefCell::new(None),
            }
        });

        let registered = inner.bound(|binding| {
            binding.control.add_change_listener(&binding.handler)
        })?;
        if let Err(err) = registered {
            host.remove_surface(&surface);
            inner.binding.borrow_mut().take();
            return Err(err);
        }

        crate::info!("preview session bound");
        Ok(Self { inner })
    }

    /// Deregister the change handler, remove the surface, and release all
    /// references.
    pub fn dispose(&self) -> Result<(), PreviewError> {
        self.inner.release()?;
        crate::info!("preview session disposed");
        Ok(())
    }

    /// Run the acquisition pipeline for the control's current selection.
    pub fn trigger_preview(&self) -> Result<(), PreviewError> {
        self.inner.trigger()
    }

    /// Set the bounds used by future display steps. Non-numeric values
    /// become [`UNBOUNDED_SIZE`](crate::display::UNBOUNDED_SIZE).
    pub fn set_max_display_size(&self, max_width: f64, max_height: f64) -> Result<(), PreviewError> {
        self.inner.bound(|_| ())?;
        let config = self
            .inner
            .config
            .get()
            .with_bounds(DisplayBounds::new(max_width, max_height));
        self.inner.config.set(config);
        Ok(())
    }

    /// Current display bounds.
    pub fn max_display_size(&self) -> Result<DisplayBounds, PreviewError> {
        self.inner.bound(|_| ())?;
        Ok(self.inner.config.get().bounds)
    }

    pub fn surface_element(&self) -> Result<H::Surface, PreviewError> {
        self.inner.bound(|binding| binding.surface.clone())
    }

    pub fn control_element(&self) -> Result<H::Control, PreviewError> {
        self.inner.bound(|binding| binding.control.clone())
    }

    /// Observe every outcome applied to the surface. Replaces any previous
    /// listener.
    pub fn set_outcome_listener(
        &self,
        listener: impl Fn(&PreviewOutcome) + 'static,
    ) -> Result<(), PreviewError> {
        self.inner.bound(|_| ())?;
        *self.inner.listener.borrow_mut() = Some(Rc::new(listener));
        Ok(())
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.binding.borrow().is_none()
    }
}

impl<H: Host> Drop for PreviewSession<H> {
    fn drop(&mut self) {
        if !self.is_disposed() {
            let _ = self.dispose();
        }
    }
}
