#![forbid(unsafe_code)]

//! Ordered fallback over acquisition strategies.
//!
//! Strategies run strictly one after another: the next one starts only when
//! the previous one completed with [`StrategyResult::Failure`]. The first
//! success ends the run. Running out of strategies is a defined outcome
//! ([`PipelineOutcome::Exhausted`]), not an error.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::strategy::embedded::embedded_data;
use crate::strategy::local_path::local_path;
use crate::strategy::{Acquired, StrategyContext, StrategyFn, StrategyKind, StrategyResult};

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Acquired {
        strategy: StrategyKind,
        #[serde(flatten)]
        acquired: Acquired,
    },
    Exhausted,
}

struct Entry<H: Host> {
    kind: StrategyKind,
    run: StrategyFn<H>,
}

impl<H: Host> Clone for Entry<H> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            run: Rc::clone(&self.run),
        }
    }
}

/// An ordered list of strategies.
pub struct AcquisitionPipeline<H: Host> {
    entries: Rc<[Entry<H>]>,
}

impl<H: Host> Clone for AcquisitionPipeline<H> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<H: Host> AcquisitionPipeline<H> {
    /// Embedded data first, then the local-path probe.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_strategies(vec![
            (StrategyKind::EmbeddedData, Rc::new(embedded_data::<H>) as StrategyFn<H>),
            (StrategyKind::LocalPath, Rc::new(local_path::<H>) as StrategyFn<H>),
        ])
    }

    /// Build a pipeline from an explicit priority order.
    #[must_use]
    pub fn from_strategies(strategies: Vec<(StrategyKind, StrategyFn<H>)>) -> Self {
        let entries: Vec<Entry<H>> = strategies
            .into_iter()
            .map(|(kind, run)| Entry { kind, run })
            .collect();
        Self {
            entries: entries.into(),
        }
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.entries.iter().map(|entry| entry.kind).collect()
    }

    /// Try each strategy in order, calling `on_done` once with the outcome.
    pub fn run(
        &self,
        ctx: Rc<StrategyContext<H>>,
        on_done: impl FnOnce(PipelineOutcome) + 'static,
    ) {
        run_from(Rc::clone(&self.entries), 0, ctx, Box::new(on_done));
    }
}

fn run_from<H: Host>(
    entries: Rc<[Entry<H>]>,
    index: usize,
    ctx: Rc<StrategyContext<H>>,
    on_done: Box<dyn FnOnce(PipelineOutcome)>,
) {
    let Some(Entry { kind, run }) = entries.get(index).cloned() else {
        crate::debug!("all strategies failed");
        on_done(PipelineOutcome::Exhausted);
        return;
    };

    crate::debug!(strategy = kind.as_str(), "trying strategy");
    let next_ctx = Rc::clone(&ctx);
    run(
        ctx,
        Box::new(move |result| match result {
            StrategyResult::Success(acquired) => {
                crate::debug!(strategy = kind.as_str(), "strategy succeeded");
                on_done(PipelineOutcome::Acquired {
                    strategy: kind,
                    acquired,
                });
            }
            StrategyResult::Failure => {
                crate::debug!(strategy = kind.as_str(), "strategy failed");
                run_from(entries, index + 1, next_ctx, on_done);
            }
        }),
    );
}
