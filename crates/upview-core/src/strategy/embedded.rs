#![forbid(unsafe_code)]

//! Embedded-data strategy: read the selected file in-process as a data URI.

use std::rc::Rc;

use super::{Completion, StrategyContext, StrategyResult, is_embedded_image_uri};
use crate::display::UNSPECIFIED_SIZE;
use crate::host::{DisplayElement, FileControl, Host};

/// Succeeds when the control yields a recognized embedded-image URI.
///
/// With natural-size introspection the source is set on the surface right
/// away and its dimensions are read one settle delay later, once the host
/// has decoded it. Without introspection the result carries the unspecified
/// size so only the style bounds constrain the display.
pub fn embedded_data<H: Host>(ctx: Rc<StrategyContext<H>>, done: Completion) {
    let reader = Rc::clone(&ctx);
    reader.control.read_data_uri(Box::new(move |data| {
        let Some(source) = data.filter(|uri| is_embedded_image_uri(uri)) else {
            crate::debug!("no embedded image data available");
            done(StrategyResult::Failure);
            return;
        };

        if ctx.surface.natural_size().is_none() {
            done(StrategyResult::success(source, UNSPECIFIED_SIZE, UNSPECIFIED_SIZE));
            return;
        }

        ctx.surface.set_source(&source);
        let surface = ctx.surface.clone();
        ctx.host.set_timeout(
            ctx.config.settle_delay,
            Box::new(move || {
                let (width, height) = surface
                    .natural_size()
                    .unwrap_or((UNSPECIFIED_SIZE, UNSPECIFIED_SIZE));
                done(StrategyResult::success(source, width, height));
            }),
        );
    }));
}
