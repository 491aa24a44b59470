//! Host configuration, loaded from environment variables.
//!
//! Unset or unparseable variables fall back to the defaults below.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use plan::consts::{LONG_PRESS_MS, LOUPE_OFFSET_Y_PX, UI_CLUSTER_THRESHOLD_PX};
use plan::engine::GestureConfig;

const DEFAULT_CONTAINER_WIDTH: f64 = 390.0;

/// Tuning knobs for the headless host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HostConfig {
    /// On-screen merge distance for markers, in pixels.
    pub(crate) ui_cluster_px: f64,
    /// Hold time before a mark-mode touch becomes a placement.
    pub(crate) long_press_ms: u32,
    /// Width of the simulated plan container, in CSS pixels.
    pub(crate) container_width: f64,
}

impl HostConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            ui_cluster_px: env_parse("FIRESTOP_UI_CLUSTER_PX", UI_CLUSTER_THRESHOLD_PX),
            long_press_ms: env_parse("FIRESTOP_LONG_PRESS_MS", LONG_PRESS_MS),
            container_width: env_parse("FIRESTOP_CONTAINER_WIDTH", DEFAULT_CONTAINER_WIDTH),
        }
    }

    pub(crate) fn gestures(&self) -> GestureConfig {
        GestureConfig { long_press_ms: self.long_press_ms, loupe_offset_y: LOUPE_OFFSET_Y_PX }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
