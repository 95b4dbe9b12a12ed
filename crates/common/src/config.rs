//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logical size of the preview container.
    pub canvas: CanvasConfig,

    /// Export defaults.
    pub export: ExportSettings,

    /// Extra font files to load alongside the bundled faces.
    pub fonts: Vec<FontFileConfig>,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Logical container dimensions (CSS pixels).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
}

/// Export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output pixels per logical pixel.
    pub scale_factor: f64,

    /// Largest accepted scale factor.
    pub max_scale_factor: f64,

    /// Fixed name handed to the save mechanism.
    pub filename: String,

    /// Directory the file sink writes into.
    pub output_dir: PathBuf,

    /// How long export waits for images and fonts to settle.
    pub resource_timeout_ms: u64,

    /// Fail the export when a visible resource cannot be loaded,
    /// instead of capturing without it.
    pub strict_resources: bool,
}

/// A font file registered under a family name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontFileConfig {
    /// Family name styles refer to (for example `"Playfair Display"`).
    pub family: String,

    /// Weight keyword: `light`, `regular` or `bold`.
    #[serde(default = "default_font_weight")]
    pub weight: String,

    /// Path to a TrueType/OpenType file.
    pub path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "quoteme=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

fn default_font_weight() -> String {
    "regular".to_string()
}

impl Default for CanvasConfig {
    fn default() -> Self {
        // 28rem wide preview at 4:5.
        Self {
            width: 448.0,
            height: 560.0,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale_factor: 2.0,
            max_scale_factor: 8.0,
            filename: "quote-me.png".to_string(),
            output_dir: PathBuf::from("."),
            resource_timeout_ms: 3000,
            strict_resources: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("quoteme").join("config.json")
}
