#![forbid(unsafe_code)]

//! Local-path strategy: load the control's textual value into a probe image.
//!
//! Some hosts expose nothing but the path of the selected file, yet will load
//! it as an image source. The probe is watched from two sides at once: the
//! native load/error hooks, and a repeating poll of `is_complete()` for hosts
//! whose hooks are unreliable. Both feed a single one-shot latch.
//!
//! # Invariants
//!
//! 1. The completion runs at most once, on the first terminal signal.
//! 2. On that signal the poll timer is cleared and the probe hooks removed,
//!    before the completion runs; later signals are ignored.
//! 3. A probe reporting zero width or height is a failure, even after a
//!    native load event (some hosts fire it for inaccessible paths).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Completion, StrategyContext, StrategyResult};
use crate::host::{FileControl, Host, ProbeImage, TimerHandle};

/// Why the latch is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeSignal {
    Tick,
    Load,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProbeVerdict {
    Pending,
    Loaded(f64, f64),
    Failed,
}

fn classify(signal: ProbeSignal, complete: bool, (width, height): (f64, f64)) -> ProbeVerdict {
    match signal {
        ProbeSignal::Error => ProbeVerdict::Failed,
        ProbeSignal::Tick if !complete => ProbeVerdict::Pending,
        ProbeSignal::Tick | ProbeSignal::Load => {
            if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
                ProbeVerdict::Loaded(width, height)
            } else {
                ProbeVerdict::Failed
            }
        }
    }
}

/// One-shot completion latch shared by the poll timer and the probe hooks.
struct ProbeRun<H: Host> {
    host: Rc<H>,
    source: String,
    fired: Cell<bool>,
    ticks: Cell<u32>,
    max_ticks: Option<u32>,
    probe: RefCell<Option<Rc<H::Probe>>>,
    timer: Cell<Option<TimerHandle>>,
    done: RefCell<Option<Completion>>,
}

impl<H: Host> ProbeRun<H> {
    fn signal(&self, signal: ProbeSignal) {
        if self.fired.get() {
            return;
        }
        let Some(probe) = self.probe.borrow().clone() else {
            return;
        };

        let mut verdict = classify(signal, probe.is_complete(), probe.natural_size());
        if signal == ProbeSignal::Tick && verdict == ProbeVerdict::Pending {
            let ticks = self.ticks.get().saturating_add(1);
            self.ticks.set(ticks);
            crate::trace!(ticks, "probe still loading");
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                crate::debug!(source = %self.source, "probe timed out");
                verdict = ProbeVerdict::Failed;
            }
        }

        let result = match verdict {
            ProbeVerdict::Pending => return,
            ProbeVerdict::Loaded(width, height) => {
                StrategyResult::success(self.source.clone(), width, height)
            }
            ProbeVerdict::Failed => StrategyResult::Failure,
        };

        self.fired.set(true);
        self.dispose();
        let done = self.done.borrow_mut().take();
        if let Some(done) = done {
            done(result);
        }
    }

    /// Release the timer and the probe. Idempotent.
    fn dispose(&self) {
        if let Some(timer) = self.timer.take() {
            self.host.clear_timer(timer);
        }
        let probe = self.probe.borrow_mut().take();
        if let Some(probe) = probe {
            probe.clear_handlers();
        }
    }
}

/// Succeeds with the probe's natural size once the control's value loads.
pub fn local_path<H: Host>(ctx: Rc<StrategyContext<H>>, done: Completion) {
    let source = ctx.control.value();
    if source.trim().is_empty() {
        crate::debug!("control has no value to probe");
        done(StrategyResult::Failure);
        return;
    }
    let probe = match ctx.host.create_probe() {
        Ok(probe) => Rc::new(probe),
        Err(_err) => {
            crate::warn!(error = %_err, "probe creation failed");
            done(StrategyResult::Failure);
            return;
        }
    };

    let max_ticks = ctx.config.probe_timeout.map(|timeout| {
        let period = ctx.config.poll_interval.as_millis().max(1);
        let ticks = timeout.as_millis().div_ceil(period).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    });
    let run = Rc::new(ProbeRun {
        host: Rc::clone(&ctx.host),
        source: source.clone(),
        fired: Cell::new(false),
        ticks: Cell::new(0),
        max_ticks,
        probe: RefCell::new(Some(Rc::clone(&probe))),
        timer: Cell::new(None),
        done: RefCell::new(Some(done)),
    });

    let on_load = {
        let run = Rc::clone(&run);
        Box::new(move || run.signal(ProbeSignal::Load))
    };
    let on_error = {
        let run = Rc::clone(&run);
        Box::new(move || run.signal(ProbeSignal::Error))
    };
    probe.set_handlers(on_load, on_error);

    let on_tick = {
        let run = Rc::clone(&run);
        Box::new(move || run.signal(ProbeSignal::Tick))
    };
    let timer = ctx.host.set_interval(ctx.config.poll_interval, on_tick);
    run.timer.set(Some(timer));

    // Hooks and timer are in place first, so even a host that resolves
    // synchronously inside `set_source` is observed.
    probe.set_source(&source);
}
