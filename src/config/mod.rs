use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::geometry::Color;
use crate::measure::{LabelPlacement, MeasurementStyle, PointStyle, TextPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "linemark";
const APP_CONFIG_FILE: &str = "config.json";

/// Application-level settings from `config.json`. Every field is optional;
/// anything unset falls back to the built-in measurement defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub default_color: Option<Color>,
    #[serde(default)]
    pub default_point_style: Option<PointStyle>,
    #[serde(default)]
    pub default_text_position: Option<TextPosition>,
    #[serde(default)]
    pub default_line_width: Option<f64>,
    #[serde(default)]
    pub default_font_size: Option<f64>,
    #[serde(default)]
    pub default_pointer_width: Option<f64>,
    /// Font face used for measurement labels.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl AppConfig {
    /// The style applied to newly created measurements.
    pub fn measurement_defaults(&self) -> MeasurementStyle {
        let base = MeasurementStyle::default();
        MeasurementStyle {
            color: self.default_color.unwrap_or(base.color),
            point_style: self.default_point_style.unwrap_or(base.point_style),
            placement: self
                .default_text_position
                .map(LabelPlacement::Directional)
                .unwrap_or(base.placement),
            line_width: self.default_line_width.unwrap_or(base.line_width),
            font_size: self.default_font_size.unwrap_or(base.font_size),
            pointer_width: self.default_pointer_width.unwrap_or(base.pointer_width),
        }
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
