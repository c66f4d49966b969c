use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::scale::ZoomLimits;

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "suzume", "suzume")
}

/// Tunables read from `config.toml`. Every field is optional in the file.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Raster pixels scrolled per frame while `j`/`k` are held.
    pub scroll_speed: f32,
    /// Raster pixels scrolled per frame while `d`/`u` are held.
    pub fast_scroll_speed: f32,
    /// Zoom change per frame while `+`/`-` are held.
    pub zoom_rate: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub min_fit_ratio: f32,
    pub max_fit_ratio: f32,
    pub fit_ratio: f32,
    pub render_scale: f32,
    pub page_gap: f32,
    pub sidebar_columns: u16,
    pub history_capacity: usize,
    pub history_tolerance: f32,
    pub recent_capacity: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub progress_debounce: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub frame_interval: Duration,
    /// How long a held key stays active without a repeat event, for terminals
    /// that never report key releases.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub release_timeout: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scroll_speed: 15.0,
            fast_scroll_speed: 60.0,
            zoom_rate: 0.01,
            min_scale: 0.5,
            max_scale: 3.0,
            min_fit_ratio: 0.2,
            max_fit_ratio: 3.0,
            fit_ratio: 0.9,
            render_scale: 1.5,
            page_gap: 4.0,
            sidebar_columns: 32,
            history_capacity: 50,
            history_tolerance: 8.0,
            recent_capacity: 10,
            progress_debounce: Duration::from_millis(1200),
            frame_interval: Duration::from_millis(16),
            release_timeout: Duration::from_millis(150),
        }
    }
}

impl ViewerConfig {
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads `path`, or the platform default when `None`. A missing file yields
    /// the defaults; a file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            debug!(?path, "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&contents).with_context(|| format!("invalid config file {:?}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: ViewerConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn zoom_limits(&self) -> ZoomLimits {
        let defaults = ZoomLimits::default();
        let (min_scale, max_scale) = ordered(self.min_scale, self.max_scale)
            .unwrap_or((defaults.min_scale, defaults.max_scale));
        let (min_ratio, max_ratio) = ordered(self.min_fit_ratio, self.max_fit_ratio)
            .unwrap_or((defaults.min_ratio, defaults.max_ratio));
        ZoomLimits {
            min_scale,
            max_scale,
            min_ratio,
            max_ratio,
        }
    }
}

fn ordered(min: f32, max: f32) -> Option<(f32, f32)> {
    let valid = min.is_finite() && max.is_finite() && min > 0.0 && min <= max;
    valid.then_some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ViewerConfig::from_toml(
            r#"
            scroll_speed = 20.0
            progress_debounce = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.scroll_speed, 20.0);
        assert_eq!(config.progress_debounce, Duration::from_millis(500));
        assert_eq!(config.fast_scroll_speed, 60.0);
        assert_eq!(config.history_capacity, 50);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ViewerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "scroll_speed = \"fast\"").unwrap();
        let err = ViewerConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config file"));
    }

    #[test]
    fn inverted_zoom_bounds_fall_back() {
        let config = ViewerConfig {
            min_scale: 4.0,
            max_scale: 1.0,
            ..ViewerConfig::default()
        };
        let limits = config.zoom_limits();
        assert_eq!(limits.min_scale, 0.5);
        assert_eq!(limits.max_scale, 3.0);
    }
}
