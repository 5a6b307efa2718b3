//! Console options and color parsing.
//!
//! This module provides:
//! - `ConsoleOptions`, the configuration a session and its renderer are built from
//! - html-like color parsing (`"black"`, `"#32cd32"`, `"#f80"`)
//! - TOML configuration file loading from `~/.console-surface/config.toml`
//!
//! # Configuration File
//!
//! ```toml
//! text_color = "#32cd32"
//! background_color = "black"
//! font_size = 11.0
//! ```
//!
//! Output transforms cannot be expressed in the file; set
//! `transform_stdout` / `transform_stderr` in code.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::intercept::Transform;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not determine config path")]
    NoHome,
}

/// Options a console session is created with
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    /// html-like text color, e.g. `"black"` or `"#ed5616"`
    pub text_color: Option<String>,
    /// html-like background color
    pub background_color: Option<String>,
    /// Font point size
    pub font_size: Option<f32>,
    #[serde(skip)]
    pub transform_stdout: Option<Transform>,
    /// Defaults to a red prefix when unset
    #[serde(skip)]
    pub transform_stderr: Option<Transform>,
}

impl fmt::Debug for ConsoleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleOptions")
            .field("text_color", &self.text_color)
            .field("background_color", &self.background_color)
            .field("font_size", &self.font_size)
            .field("transform_stdout", &self.transform_stdout.is_some())
            .field("transform_stderr", &self.transform_stderr.is_some())
            .finish()
    }
}

impl ConsoleOptions {
    /// Load options from the default config file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(options) => options,
            Err(e) => {
                warn!("{}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to the default config file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    /// `~/.console-surface/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        app_dir().map(|dir| dir.join("config.toml"))
    }

    /// Resolved surface style with defaults filled in
    pub fn style(&self) -> SurfaceStyle {
        let defaults = SurfaceStyle::default();
        SurfaceStyle {
            text_color: resolve_color("text_color", self.text_color.as_deref(), defaults.text_color),
            background_color: resolve_color(
                "background_color",
                self.background_color.as_deref(),
                defaults.background_color,
            ),
            font_size: match self.font_size {
                Some(size) if size.is_finite() && size > 0.0 => size,
                Some(size) => {
                    warn!(size, "ignoring invalid font size");
                    defaults.font_size
                }
                None => defaults.font_size,
            },
        }
    }
}

fn resolve_color(field: &str, value: Option<&str>, default: Color) -> Color {
    match value {
        None => default,
        Some(text) => Color::parse(text).unwrap_or_else(|| {
            warn!(field, value = text, "unrecognized color, using default");
            default
        }),
    }
}

/// Directory for the config file and log
pub fn app_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".console-surface"))
}

/// Style handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceStyle {
    pub text_color: Color,
    pub background_color: Color,
    pub font_size: f32,
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self {
            text_color: Color::new(0, 255, 0),
            background_color: Color::new(0, 0, 0),
            font_size: 12.0,
        }
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a color name or `#rgb`, `#rrggbb`, `#aarrggbb` (alpha dropped)
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        Self::by_name(text)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let nibble = |i: usize| byte(&hex[i..i + 1]).map(|v| v * 17);
                Some(Self::new(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Self::new(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
            8 => Some(Self::new(byte(&hex[2..4])?, byte(&hex[4..6])?, byte(&hex[6..8])?)),
            _ => None,
        }
    }

    fn by_name(name: &str) -> Option<Self> {
        let color = match name.to_lowercase().as_str() {
            "black" => Self::new(0, 0, 0),
            "darkgray" | "darkgrey" => Self::new(68, 68, 68),
            "gray" | "grey" => Self::new(136, 136, 136),
            "lightgray" | "lightgrey" => Self::new(204, 204, 204),
            "white" => Self::new(255, 255, 255),
            "red" => Self::new(255, 0, 0),
            "green" | "lime" => Self::new(0, 255, 0),
            "blue" => Self::new(0, 0, 255),
            "yellow" => Self::new(255, 255, 0),
            "cyan" | "aqua" => Self::new(0, 255, 255),
            "magenta" | "fuchsia" => Self::new(255, 0, 255),
            "maroon" => Self::new(128, 0, 0),
            "navy" => Self::new(0, 0, 128),
            "olive" => Self::new(128, 128, 0),
            "purple" => Self::new(128, 0, 128),
            "silver" => Self::new(192, 192, 192),
            "teal" => Self::new(0, 128, 128),
            "orange" => Self::new(255, 165, 0),
            _ => return None,
        };
        Some(color)
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colors() {
        assert_eq!(Color::parse("black"), Some(Color::new(0, 0, 0)));
        assert_eq!(Color::parse("Teal"), Some(Color::new(0, 128, 128)));
        assert_eq!(Color::parse("#32cd32"), Some(Color::new(50, 205, 50)));
        assert_eq!(Color::parse("#f80"), Some(Color::new(255, 136, 0)));
        assert_eq!(Color::parse("#80ed5616"), Some(Color::new(0xed, 0x56, 0x16)));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#zzzzzz"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_style_defaults() {
        let style = ConsoleOptions::default().style();
        assert_eq!(style, SurfaceStyle::default());
        assert_eq!(style.font_size, 12.0);
    }

    #[test]
    fn test_style_overrides_and_fallbacks() {
        let options = ConsoleOptions {
            text_color: Some("#32cd32".into()),
            background_color: Some("not a color".into()),
            font_size: Some(-1.0),
            ..Default::default()
        };
        let style = options.style();
        assert_eq!(style.text_color, Color::new(50, 205, 50));
        assert_eq!(style.background_color, Color::new(0, 0, 0));
        assert_eq!(style.font_size, 12.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let options = ConsoleOptions {
            text_color: Some("white".into()),
            font_size: Some(11.0),
            ..Default::default()
        };
        options.save_to(&path).unwrap();

        let loaded = ConsoleOptions::load_from(&path).unwrap();
        assert_eq!(loaded.text_color.as_deref(), Some("white"));
        assert_eq!(loaded.background_color, None);
        assert_eq!(loaded.font_size, Some(11.0));
        assert!(loaded.transform_stderr.is_none());
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "font_size = \"big\"").unwrap();
        assert!(matches!(
            ConsoleOptions::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
