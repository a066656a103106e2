#![forbid(unsafe_code)]

//! Browser implementation of the `upview-core` host traits.
//!
//! Every callback handed to the browser is a `wasm-bindgen` closure that must
//! outlive its registration. Closures that may be released from inside their
//! own invocation (a probe hook clearing itself, an interval cancelling
//! itself) are dropped on the next microtask instead of in place.

use core::time::Duration;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::{Function, Reflect};
use upview_core::PreviewError;
use upview_core::display::SurfaceStyle;
use upview_core::host::{
    ChangeHandler, DataUriCallback, DisplayElement, FileControl, Host, ProbeImage, TimerHandle,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Event, FileReader, HtmlImageElement, HtmlInputElement, Window};

use crate::bridge::{delay_millis, timer_handle, timer_id};

fn host_error(err: JsValue) -> PreviewError {
    PreviewError::Host(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn drop_later<T: 'static>(value: T) {
    spawn_local(async move {
        drop(value);
    });
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// The browser window and its document.
pub struct WebHost {
    window: Window,
    document: Document,
    intervals: RefCell<HashMap<i32, Closure<dyn FnMut()>>>,
}

impl WebHost {
    /// Bind to the global window.
    pub fn new() -> Result<Self, PreviewError> {
        let window = web_sys::window().ok_or_else(|| PreviewError::Host("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| PreviewError::Host("window has no document".into()))?;
        Ok(Self {
            window,
            document,
            intervals: RefCell::new(HashMap::new()),
        })
    }
}

impl Host for WebHost {
    type Control = WebControl;
    type Surface = WebSurface;
    type Probe = WebProbe;

    fn find_control(&self, key: &str) -> Option<WebControl> {
        self.document
            .get_element_by_id(key)?
            .dyn_into::<HtmlInputElement>()
            .ok()
            .map(WebControl::new)
    }

    fn insert_surface_after(&self, control: &WebControl) -> Result<WebSurface, PreviewError> {
        let parent = control.input.parent_node().ok_or(PreviewError::Detached)?;
        let image = self
            .document
            .create_element("img")
            .map_err(host_error)?
            .dyn_into::<HtmlImageElement>()
            .map_err(|_| PreviewError::Host("created element is not an image".into()))?;
        parent
            .insert_before(&image, control.input.next_sibling().as_ref())
            .map_err(host_error)?;
        Ok(WebSurface(image))
    }

    fn remove_surface(&self, surface: &WebSurface) {
        surface.0.remove();
    }

    fn create_probe(&self) -> Result<WebProbe, PreviewError> {
        let image = HtmlImageElement::new().map_err(host_error)?;
        Ok(WebProbe {
            image,
            hooks: RefCell::new(None),
        })
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TimerHandle {
        let callback = Closure::once_into_js(move || task());
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                delay_millis(delay),
            ) {
            Ok(id) => timer_handle(id),
            Err(_err) => {
                upview_core::warn!(error = ?_err, "setTimeout rejected");
                timer_handle(0)
            }
        }
    }

    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle {
        let callback = Closure::wrap(task);
        match self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                delay_millis(period),
            ) {
            Ok(id) => {
                self.intervals.borrow_mut().insert(id, callback);
                timer_handle(id)
            }
            Err(_err) => {
                upview_core::warn!(error = ?_err, "setInterval rejected");
                timer_handle(0)
            }
        }
    }

    fn clear_timer(&self, handle: TimerHandle) {
        let Some(id) = timer_id(handle) else {
            return;
        };
        // Timeout and interval ids share one pool.
        self.window.clear_timeout_with_handle(id);
        self.window.clear_interval_with_handle(id);
        let callback = self.intervals.borrow_mut().remove(&id);
        if let Some(callback) = callback {
            drop_later(callback);
        }
    }
}

// ---------------------------------------------------------------------------
// File control
// ---------------------------------------------------------------------------

type ChangeClosure = Closure<dyn FnMut(Event)>;

/// An `<input type=file>` element.
#[derive(Clone)]
pub struct WebControl {
    input: HtmlInputElement,
    listeners: Rc<RefCell<Vec<(ChangeHandler, ChangeClosure)>>>,
}

impl WebControl {
    #[must_use]
    pub fn new(input: HtmlInputElement) -> Self {
        Self {
            input,
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn element(&self) -> &HtmlInputElement {
        &self.input
    }
}

impl FileControl for WebControl {
    fn value(&self) -> String {
        self.input.value()
    }

    fn read_data_uri(&self, done: DataUriCallback) {
        let Some(file) = self.input.files().and_then(|files| files.get(0)) else {
            done(None);
            return;
        };

        // Legacy file handles answer synchronously.
        let legacy = Reflect::get(&file, &JsValue::from_str("getAsDataURL"))
            .ok()
            .and_then(|method| method.dyn_into::<Function>().ok());
        if let Some(method) = legacy {
            done(method.call0(&file).ok().and_then(|uri| uri.as_string()));
            return;
        }

        let Ok(reader) = FileReader::new() else {
            done(None);
            return;
        };
        let done = Rc::new(RefCell::new(Some(done)));
        let finish = {
            let done = Rc::clone(&done);
            move |uri: Option<String>| {
                let callback = done.borrow_mut().take();
                if let Some(callback) = callback {
                    callback(uri);
                }
            }
        };

        let on_load = {
            let reader = reader.clone();
            let finish = finish.clone();
            Closure::once_into_js(move || {
                finish(reader.result().ok().and_then(|uri| uri.as_string()));
            })
        };
        let on_error = {
            let finish = finish.clone();
            Closure::once_into_js(move || finish(None))
        };
        reader.set_onload(Some(on_load.unchecked_ref()));
        reader.set_onerror(Some(on_error.unchecked_ref()));
        if let Err(_err) = reader.read_as_data_url(&file) {
            upview_core::debug!(error = ?_err, "readAsDataURL rejected");
            finish(None);
        }
    }

    fn add_change_listener(&self, handler: &ChangeHandler) -> Result<(), PreviewError> {
        let callback = {
            let handler = handler.clone();
            Closure::wrap(Box::new(move |_event: Event| handler.call()) as Box<dyn FnMut(Event)>)
        };
        self.input
            .add_event_listener_with_callback("change", callback.as_ref().unchecked_ref())
            .map_err(host_error)?;
        self.listeners.borrow_mut().push((handler.clone(), callback));
        Ok(())
    }

    fn remove_change_listener(&self, handler: &ChangeHandler) {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|(registered, _)| registered.same_as(handler))
                .map(|index| listeners.remove(index))
        };
        let Some((_, callback)) = removed else {
            return;
        };
        let _ = self
            .input
            .remove_event_listener_with_callback("change", callback.as_ref().unchecked_ref());
        drop_later(callback);
    }
}

// ---------------------------------------------------------------------------
// Surface and probe
// ---------------------------------------------------------------------------

/// The preview `<img>` inserted after the control.
#[derive(Clone)]
pub struct WebSurface(HtmlImageElement);

impl WebSurface {
    #[must_use]
    pub fn element(&self) -> &HtmlImageElement {
        &self.0
    }
}

impl DisplayElement for WebSurface {
    fn set_source(&self, source: &str) {
        self.0.set_src(source);
    }

    fn set_size_attributes(&self, width: u32, height: u32) {
        self.0.set_width(width);
        self.0.set_height(height);
    }

    fn apply_style(&self, style: &SurfaceStyle) {
        let css = self.0.style();
        let _ = css.set_property("max-width", &style.max_width_css());
        let _ = css.set_property("max-height", &style.max_height_css());
        let _ = css.set_property("width", &style.width.to_string());
        let _ = css.set_property("height", &style.height.to_string());
    }

    fn natural_size(&self) -> Option<(f64, f64)> {
        let supported = Reflect::has(&self.0, &JsValue::from_str("naturalWidth")).unwrap_or(false);
        supported.then(|| {
            (
                f64::from(self.0.natural_width()),
                f64::from(self.0.natural_height()),
            )
        })
    }
}

type ProbeHooks = (Closure<dyn FnMut()>, Closure<dyn FnMut()>);

/// A detached `Image` used to test whether a local path loads.
pub struct WebProbe {
    image: HtmlImageElement,
    hooks: RefCell<Option<ProbeHooks>>,
}

impl ProbeImage for WebProbe {
    fn set_handlers(&self, on_load: Box<dyn FnMut()>, on_error: Box<dyn FnMut()>) {
        let on_load = Closure::wrap(on_load);
        let on_error = Closure::wrap(on_error);
        self.image.set_onload(Some(on_load.as_ref().unchecked_ref()));
        self.image.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        let previous = self.hooks.borrow_mut().replace((on_load, on_error));
        if let Some(previous) = previous {
            drop_later(previous);
        }
    }

    fn clear_handlers(&self) {
        self.image.set_onload(None);
        self.image.set_onerror(None);
        let hooks = self.hooks.borrow_mut().take();
        if let Some(hooks) = hooks {
            drop_later(hooks);
        }
    }

    fn set_source(&self, source: &str) {
        self.image.set_src(source);
    }

    fn is_complete(&self) -> bool {
        self.image.complete()
    }

    fn natural_size(&self) -> (f64, f64) {
        (
            f64::from(self.image.natural_width()),
            f64::from(self.image.natural_height()),
        )
    }
}
