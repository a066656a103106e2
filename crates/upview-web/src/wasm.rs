#![forbid(unsafe_code)]

use std::rc::Rc;

use upview_core::{ControlRef, PreviewError, PreviewSession};
use wasm_bindgen::prelude::*;
use web_sys::{HtmlImageElement, HtmlInputElement};

use crate::bridge::outcome_json;
use crate::host::{WebControl, WebHost};

fn to_js(err: PreviewError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// JS `Number(value)` coercion. Non-numeric input becomes NaN, which the
/// session normalizes to an effectively unbounded size.
fn coerce_size(value: &JsValue) -> f64 {
    js_sys::Number::new(value).value_of()
}

/// Live preview of the image selected in a file input.
///
/// The preview `<img>` is inserted right after the input and updated on every
/// `change` event. Call `dispose()` to unbind and remove it.
#[wasm_bindgen]
pub struct ImageUploadPreview {
    session: PreviewSession<WebHost>,
}

#[wasm_bindgen]
impl ImageUploadPreview {
    /// Bind to an `<input type=file>` element or the id of one.
    #[wasm_bindgen(constructor)]
    pub fn new(input: JsValue) -> Result<ImageUploadPreview, JsValue> {
        let host = Rc::new(WebHost::new().map_err(to_js)?);
        let control = match input.as_string() {
            Some(id) => ControlRef::Id(id),
            None => {
                let element = input.dyn_into::<HtmlInputElement>().map_err(|_| {
                    JsValue::from(js_sys::TypeError::new(
                        "expected an <input> element or its id",
                    ))
                })?;
                ControlRef::Element(WebControl::new(element))
            }
        };
        let session = PreviewSession::new(host, control).map_err(to_js)?;
        Ok(Self { session })
    }

    /// Unbind from the input and remove the preview image.
    pub fn dispose(&self) -> Result<(), JsValue> {
        self.session.dispose().map_err(to_js)
    }

    /// Preview the input's current selection now.
    pub fn preview(&self) -> Result<(), JsValue> {
        self.session.trigger_preview().map_err(to_js)
    }

    #[wasm_bindgen(js_name = getImageElement)]
    pub fn image_element(&self) -> Result<HtmlImageElement, JsValue> {
        self.session
            .surface_element()
            .map(|surface| surface.element().clone())
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = getInputElement)]
    pub fn input_element(&self) -> Result<HtmlInputElement, JsValue> {
        self.session
            .control_element()
            .map(|control| control.element().clone())
            .map_err(to_js)
    }

    /// Bound the displayed size. Takes effect on the next preview.
    #[wasm_bindgen(js_name = setMaxImageSize)]
    pub fn set_max_image_size(&self, width: JsValue, height: JsValue) -> Result<(), JsValue> {
        self.session
            .set_max_display_size(coerce_size(&width), coerce_size(&height))
            .map_err(to_js)
    }

    /// Call `callback(json)` after every preview with the applied outcome.
    #[wasm_bindgen(js_name = onPreview)]
    pub fn on_preview(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.session
            .set_outcome_listener(move |outcome| {
                let Some(json) = outcome_json(outcome) else {
                    return;
                };
                if let Err(_err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                    upview_core::warn!(error = ?_err, "onPreview callback threw");
                }
            })
            .map_err(to_js)
    }
}
