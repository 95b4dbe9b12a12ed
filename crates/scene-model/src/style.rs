//! Style state: content plus presentation parameters.
//!
//! A `StyleState` is produced by the shell (form fields, pickers, file
//! upload) and read by the compositor on every render. The core never
//! writes to it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::ColorToken;

/// Everything the compositor needs to draw one frame, minus the offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleState {
    /// Quote text. Newlines are kept; runs of spaces collapse.
    pub quote: String,

    /// Author name, drawn as `— {author}` under the quote when non-empty.
    pub author: String,

    /// Background layer.
    pub background: BackgroundStyle,

    /// Overlay text style.
    pub text: TextStyle,
}

/// Background layer settings.
///
/// When `image` is set it takes precedence over `color`; the color is
/// still painted underneath so a failed image degrades to a flat fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundStyle {
    pub image: Option<ImageSource>,
    pub color: ColorToken,
}

/// Overlay text settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub color: ColorToken,

    /// Requested family. Unknown families fall back to the default face.
    pub font_family: String,

    pub font_weight: FontWeight,

    /// Quote font size in logical pixels.
    pub font_size_px: f64,

    pub text_align: TextAlign,

    /// Author line size relative to `font_size_px`.
    pub author_scale: f64,

    /// Optional fill behind the overlay box.
    pub backdrop: Option<ColorToken>,

    /// Inner padding of the overlay box.
    pub padding_px: f64,
}

/// Horizontal alignment of lines inside the overlay box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Light,
    Regular,
    #[default]
    Bold,
}

impl FontWeight {
    /// Parse a weight keyword (`light`, `regular`/`normal`, `bold`).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "light" | "300" => Some(FontWeight::Light),
            "regular" | "normal" | "400" => Some(FontWeight::Regular),
            "bold" | "semibold" | "600" | "700" => Some(FontWeight::Bold),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            FontWeight::Light => "light",
            FontWeight::Regular => "regular",
            FontWeight::Bold => "bold",
        }
    }
}

/// Where a background image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// Uploaded file contents, base64 in style files.
    Bytes {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// A file on disk, such as one of the gallery backgrounds.
    Path { path: PathBuf },
}

impl ImageSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        ImageSource::Path {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        ImageSource::Bytes { data: data.into() }
    }

    /// Stable cache key for this source.
    pub fn key(&self) -> ResourceKey {
        match self {
            ImageSource::Bytes { data } => ResourceKey(format!("image:bytes:{:016x}", fnv1a_64(data))),
            ImageSource::Path { path } => ResourceKey(format!("image:path:{}", path.display())),
        }
    }
}

/// Identifies a loadable resource (decoded image or font file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(pub String);

impl ResourceKey {
    /// Key for a late-loaded font face.
    pub fn font(family: &str, weight: FontWeight) -> Self {
        ResourceKey(format!("font:{}:{}", family.to_ascii_lowercase(), weight.keyword()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from reading or validating a style.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("invalid style JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid style: {message}")]
    Invalid { message: String },
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            quote: String::new(),
            author: String::new(),
            background: BackgroundStyle::default(),
            text: TextStyle::default(),
        }
    }
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self {
            image: None,
            color: ColorToken::WHITE,
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: ColorToken::WHITE,
            font_family: "sans-serif".to_string(),
            font_weight: FontWeight::Bold,
            font_size_px: 20.0,
            text_align: TextAlign::Center,
            author_scale: 0.6,
            backdrop: None,
            padding_px: 16.0,
        }
    }
}

impl StyleState {
    /// Style with the given quote and defaults elsewhere.
    pub fn with_quote(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a style from JSON.
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        let style: StyleState = serde_json::from_str(json)?;
        style.validate()?;
        Ok(style)
    }

    /// Whether anything is drawn in the overlay layer.
    pub fn has_overlay(&self) -> bool {
        !self.quote.is_empty() || !self.author.is_empty()
    }

    /// The formatted author line, if an author is set.
    pub fn author_line(&self) -> Option<String> {
        if self.author.is_empty() {
            None
        } else {
            Some(format!("\u{2014} {}", self.author))
        }
    }

    /// Check numeric fields are usable for layout.
    pub fn validate(&self) -> Result<(), StyleError> {
        let text = &self.text;
        check_range("font_size_px", text.font_size_px, f64::MIN_POSITIVE, MAX_FONT_SIZE_PX)?;
        check_range("author_scale", text.author_scale, f64::MIN_POSITIVE, MAX_AUTHOR_SCALE)?;
        check_range("padding_px", text.padding_px, 0.0, MAX_PADDING_PX)?;
        Ok(())
    }
}

/// Largest accepted quote font size, in logical pixels.
pub const MAX_FONT_SIZE_PX: f64 = 1000.0;

/// Largest accepted author size relative to the quote size.
pub const MAX_AUTHOR_SCALE: f64 = 4.0;

/// Largest accepted overlay padding, in logical pixels.
pub const MAX_PADDING_PX: f64 = 1000.0;

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), StyleError> {
    if value.is_finite() && value >= min && value <= max {
        return Ok(());
    }
    let lower = if min > 0.0 { "above 0".to_string() } else { format!("at least {min}") };
    Err(StyleError::Invalid {
        message: format!("{field} must be {lower} and at most {max}, got {value}"),
    })
}

/// FNV-1a, 64-bit. Stable across runs, which `DefaultHasher` is not.
pub fn fnv1a_64(input: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in input {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}
