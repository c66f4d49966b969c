//! Absolute vs. relative zoom and the display transform applied over the raster.
//!
//! Pages are rasterised once at the render scale; what the user sees is that raster
//! stretched by [`transform_ratio`]. All conversions between the two zoom
//! representations go through the functions in this module.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Widths at or below zero (or non-finite) are treated as this many pixels.
pub const MIN_DIMENSION: f32 = 100.0;
pub const DEFAULT_SCALE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    Absolute,
    #[default]
    Relative,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Absolute => "absolute",
            FitMode::Relative => "relative",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `value` when it is a usable positive number, otherwise `fallback`.
pub fn sanitize(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn dimension(value: f32) -> f32 {
    sanitize(value, MIN_DIMENSION)
}

pub fn to_absolute(ratio: f32, available_width: f32, base_width: f32) -> f32 {
    sanitize(
        ratio * dimension(available_width) / dimension(base_width),
        DEFAULT_SCALE,
    )
}

pub fn to_relative(scale: f32, available_width: f32, base_width: f32) -> f32 {
    sanitize(
        scale * dimension(base_width) / dimension(available_width),
        DEFAULT_SCALE,
    )
}

pub fn transform_ratio(displayed_scale: f32, render_scale: f32) -> f32 {
    sanitize(displayed_scale / render_scale, DEFAULT_SCALE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min_scale: f32,
    pub max_scale: f32,
    pub min_ratio: f32,
    pub max_ratio: f32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 3.0,
            min_ratio: 0.2,
            max_ratio: 3.0,
        }
    }
}

impl ZoomLimits {
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    pub fn clamp_ratio(&self, ratio: f32) -> f32 {
        ratio.clamp(self.min_ratio, self.max_ratio)
    }
}

/// The adjustable half of the zoom state. `visual_scale` is authoritative in
/// absolute mode, `fit_ratio` in relative mode; the other one is stale until the
/// next mode switch recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom {
    pub fit_mode: FitMode,
    pub visual_scale: f32,
    pub fit_ratio: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            fit_mode: FitMode::Relative,
            visual_scale: DEFAULT_SCALE,
            fit_ratio: 0.9,
        }
    }
}

impl Zoom {
    pub fn relative(fit_ratio: f32) -> Self {
        Self {
            fit_ratio: sanitize(fit_ratio, 0.9),
            ..Self::default()
        }
    }

    pub fn displayed_scale(&self, available_width: f32, base_width: f32) -> f32 {
        match self.fit_mode {
            FitMode::Absolute => sanitize(self.visual_scale, DEFAULT_SCALE),
            FitMode::Relative => to_absolute(self.fit_ratio, available_width, base_width),
        }
    }

    /// Switches to absolute mode. With `percent` the visual scale is set explicitly,
    /// otherwise it is derived from what is currently displayed.
    pub fn set_absolute(&mut self, percent: Option<u32>, available_width: f32, base_width: f32) {
        let scale = match percent {
            Some(percent) => sanitize(percent as f32 / 100.0, self.visual_scale),
            None => self.displayed_scale(available_width, base_width),
        };
        self.visual_scale = sanitize(scale, DEFAULT_SCALE);
        self.fit_mode = FitMode::Absolute;
    }

    pub fn set_relative(&mut self, percent: Option<u32>, available_width: f32, base_width: f32) {
        let ratio = match percent {
            Some(percent) => sanitize(percent as f32 / 100.0, self.fit_ratio),
            None => to_relative(
                self.displayed_scale(available_width, base_width),
                available_width,
                base_width,
            ),
        };
        self.fit_ratio = sanitize(ratio, DEFAULT_SCALE);
        self.fit_mode = FitMode::Relative;
    }

    pub fn toggle(&mut self, available_width: f32, base_width: f32) {
        match self.fit_mode {
            FitMode::Absolute => self.set_relative(None, available_width, base_width),
            FitMode::Relative => self.set_absolute(None, available_width, base_width),
        }
    }

    /// Adjusts whichever value is authoritative for the current mode.
    pub fn step(&mut self, delta: f32, limits: &ZoomLimits) {
        if !delta.is_finite() {
            return;
        }
        match self.fit_mode {
            FitMode::Absolute => {
                self.visual_scale = limits.clamp_scale(self.visual_scale + delta);
            }
            FitMode::Relative => {
                self.fit_ratio = limits.clamp_ratio(self.fit_ratio + delta);
            }
        }
    }

    /// Whole-page fit: the largest absolute scale at which the page fits both
    /// dimensions, with a small margin.
    pub fn fit_page(
        &mut self,
        available_width: f32,
        viewport_height: f32,
        base_width: f32,
        base_height: f32,
    ) {
        let width_scale = dimension(available_width) / dimension(base_width);
        let height_scale = dimension(viewport_height) / dimension(base_height);
        self.visual_scale = sanitize(width_scale.min(height_scale) * 0.95, DEFAULT_SCALE);
        self.fit_mode = FitMode::Absolute;
    }

    pub fn fit_width(&mut self) {
        self.fit_ratio = 1.0;
        self.fit_mode = FitMode::Relative;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn degenerate_widths_fall_back() {
        assert!(close(to_absolute(0.5, 0.0, 0.0), 0.5));
        assert!(close(to_absolute(1.0, 800.0, f32::NAN), 8.0));
        assert_eq!(to_absolute(f32::NAN, 800.0, 600.0), DEFAULT_SCALE);
        assert_eq!(to_relative(f32::INFINITY, 800.0, 600.0), DEFAULT_SCALE);
        assert_eq!(transform_ratio(1.0, 0.0), DEFAULT_SCALE);
    }

    #[test]
    fn transform_ratio_is_displayed_over_render() {
        assert!(close(transform_ratio(3.0, 1.5), 2.0));
        assert!(close(transform_ratio(0.75, 1.5), 0.5));
    }

    #[test]
    fn absolute_relative_absolute_is_continuous() {
        for &(scale, avail, base) in &[
            (1.0_f32, 1200.0_f32, 612.0_f32),
            (2.37, 640.0, 595.0),
            (0.5, 3000.0, 842.0),
            (1.5, 0.0, 612.0),
        ] {
            let mut zoom = Zoom {
                fit_mode: FitMode::Absolute,
                visual_scale: scale,
                fit_ratio: 0.9,
            };
            zoom.set_relative(None, avail, base);
            assert_eq!(zoom.fit_mode, FitMode::Relative);
            assert!(close(zoom.displayed_scale(avail, base), scale));
            zoom.set_absolute(None, avail, base);
            assert!(close(zoom.visual_scale, scale), "{} vs {}", zoom.visual_scale, scale);
        }
    }

    #[test]
    fn explicit_percent_sets_value() {
        let mut zoom = Zoom::default();
        zoom.set_absolute(Some(150), 1000.0, 500.0);
        assert_eq!(zoom.fit_mode, FitMode::Absolute);
        assert!(close(zoom.visual_scale, 1.5));

        zoom.set_relative(Some(80), 1000.0, 500.0);
        assert!(close(zoom.fit_ratio, 0.8));
        assert!(close(zoom.displayed_scale(1000.0, 500.0), 1.6));
    }

    #[test]
    fn relative_without_argument_keeps_magnification() {
        let mut zoom = Zoom::default();
        zoom.set_absolute(Some(120), 900.0, 600.0);
        let before = zoom.displayed_scale(900.0, 600.0);
        zoom.set_relative(None, 900.0, 600.0);
        assert!(close(zoom.displayed_scale(900.0, 600.0), before));
    }

    #[test]
    fn step_clamps_to_limits() {
        let limits = ZoomLimits::default();
        let mut zoom = Zoom {
            fit_mode: FitMode::Absolute,
            visual_scale: 2.95,
            fit_ratio: 0.9,
        };
        zoom.step(0.1, &limits);
        assert!(close(zoom.visual_scale, 3.0));
        zoom.step(f32::NAN, &limits);
        assert!(close(zoom.visual_scale, 3.0));

        let mut relative = Zoom::relative(0.25);
        relative.step(-0.1, &limits);
        assert!(close(relative.fit_ratio, 0.2));
    }

    #[test]
    fn fit_page_uses_smaller_axis() {
        let mut zoom = Zoom::default();
        zoom.fit_page(1200.0, 800.0, 600.0, 800.0);
        assert_eq!(zoom.fit_mode, FitMode::Absolute);
        assert!(close(zoom.visual_scale, 0.95));
    }
}
