//! Browser binding for the gesture engine.
//!
//! The host forwards DOM touch events as flat `[x0, y0, x1, y1, ...]` arrays
//! of container-relative coordinates and receives the resulting
//! [`crate::engine::Action`]s as a JSON array.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::doc::ImageSize;
use crate::engine::EngineCore;
use crate::input::Mode;
use crate::transform::Point;

#[wasm_bindgen]
pub struct WebEngine {
    core: EngineCore,
}

#[wasm_bindgen]
impl WebEngine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self {
        Self { core: EngineCore::new() }
    }

    /// Fit a freshly loaded plan image to the container.
    ///
    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn load_plan(&mut self, container_width: f64, width: u32, height: u32) -> Result<String, JsValue> {
        to_json(&self.core.load_plan(container_width, ImageSize::new(width, height)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn reset_view(&mut self) -> Result<String, JsValue> {
        to_json(&self.core.reset_view())
    }

    /// Switch to `"move"` or `"mark"`.
    ///
    /// # Errors
    ///
    /// Rejects any other mode name.
    pub fn set_mode(&mut self, mode: &str) -> Result<String, JsValue> {
        let mode = match mode {
            "move" => Mode::Move,
            "mark" => Mode::Mark,
            other => return Err(JsValue::from_str(&format!("unknown mode: {other}"))),
        };
        to_json(&self.core.set_mode(mode))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn teardown(&mut self) -> Result<String, JsValue> {
        to_json(&self.core.teardown())
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn on_touch_start(&mut self, coords: &[f64]) -> Result<String, JsValue> {
        to_json(&self.core.on_touch_start(&touches(coords)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn on_touch_move(&mut self, coords: &[f64]) -> Result<String, JsValue> {
        to_json(&self.core.on_touch_move(&touches(coords)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn on_touch_end(&mut self) -> Result<String, JsValue> {
        to_json(&self.core.on_touch_end())
    }

    /// Called by the host timer armed through `arm_long_press`.
    ///
    /// # Errors
    ///
    /// Fails only if the actions cannot be serialised.
    pub fn on_long_press_elapsed(&mut self, gesture: u64) -> Result<String, JsValue> {
        to_json(&self.core.on_long_press_elapsed(gesture))
    }

    /// CSS `transform` value for the plan layer.
    #[must_use]
    pub fn transform_css(&self) -> String {
        self.core.transform().css()
    }

    /// Magnifier placement as JSON, or `null` when hidden.
    ///
    /// # Errors
    ///
    /// Fails only if the layout cannot be serialised.
    pub fn magnifier(&self) -> Result<String, JsValue> {
        let layout = self.core.loupe().and_then(|l| l.layout(self.core.image_size));
        to_json(&layout)
    }
}

impl Default for WebEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn touches(coords: &[f64]) -> Vec<Point> {
    coords.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}
