use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::scale::{sanitize, transform_ratio, Zoom, MIN_DIMENSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    Document,
    Outline,
}

/// Pixel size of the drawing area, plus the space the outline sidebar takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub sidebar_width: f32,
    pub outline_rows: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            sidebar_width: 320.0,
            outline_rows: 40,
        }
    }
}

impl Viewport {
    pub fn available_width(&self, sidebar_open: bool, fullscreen: bool) -> f32 {
        let width = if sidebar_open && !fullscreen {
            self.width - self.sidebar_width
        } else {
            self.width
        };
        sanitize(width, MIN_DIMENSION)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub current_page: usize,
    pub num_pages: Option<usize>,
    pub render_scale: f32,
    pub zoom: Zoom,
    pub sidebar_open: bool,
    pub focus_mode: FocusMode,
    pub selected_outline_path: Option<String>,
    pub expanded_outline_paths: HashSet<String>,
    pub theme: Theme,
    pub fullscreen: bool,
    pub help_open: bool,
    pub finder_open: bool,
    pub scroll_offset: f32,
}

impl ViewState {
    pub fn new(render_scale: f32, fit_ratio: f32) -> Self {
        Self {
            current_page: 1,
            num_pages: None,
            render_scale: sanitize(render_scale, 1.0),
            zoom: Zoom::relative(fit_ratio),
            sidebar_open: true,
            focus_mode: FocusMode::Document,
            selected_outline_path: None,
            expanded_outline_paths: HashSet::new(),
            theme: Theme::default(),
            fullscreen: false,
            help_open: false,
            finder_open: false,
            scroll_offset: 0.0,
        }
    }

    /// Highest page navigation may target. An unknown count means "at least the
    /// current page".
    pub fn last_page(&self) -> usize {
        self.num_pages.unwrap_or(self.current_page).max(1)
    }

    pub fn clamp_page(&self, page: usize) -> usize {
        page.clamp(1, self.last_page())
    }

    pub fn displayed_scale(&self, viewport: &Viewport, base_width: f32) -> f32 {
        let available = viewport.available_width(self.sidebar_open, self.fullscreen);
        self.zoom.displayed_scale(available, base_width)
    }

    pub fn transform_ratio(&self, viewport: &Viewport, base_width: f32) -> f32 {
        transform_ratio(self.displayed_scale(viewport, base_width), self.render_scale)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(1.5, 0.9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::FitMode;

    #[test]
    fn sidebar_narrows_available_width() {
        let viewport = Viewport {
            width: 1000.0,
            height: 700.0,
            sidebar_width: 300.0,
            outline_rows: 20,
        };
        assert_eq!(viewport.available_width(true, false), 700.0);
        assert_eq!(viewport.available_width(true, true), 1000.0);
        assert_eq!(viewport.available_width(false, false), 1000.0);

        let tiny = Viewport {
            width: 200.0,
            ..viewport
        };
        assert_eq!(tiny.available_width(true, false), MIN_DIMENSION);
    }

    #[test]
    fn transform_ratio_tracks_render_scale() {
        let mut state = ViewState::new(2.0, 0.9);
        state.zoom.fit_mode = FitMode::Absolute;
        state.zoom.visual_scale = 1.0;
        let viewport = Viewport::default();
        assert_eq!(state.transform_ratio(&viewport, 600.0), 0.5);
        state.render_scale = 1.0;
        assert_eq!(state.transform_ratio(&viewport, 600.0), 1.0);
    }

    #[test]
    fn unknown_page_count_allows_current_page() {
        let mut state = ViewState::default();
        state.current_page = 7;
        assert_eq!(state.clamp_page(40), 7);
        state.num_pages = Some(10);
        assert_eq!(state.clamp_page(40), 10);
        assert_eq!(state.clamp_page(0), 1);
    }

    #[test]
    fn theme_round_trips_through_strings() {
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(Theme::Light.to_string(), "light");
    }
}
