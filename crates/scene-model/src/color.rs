//! Colors: palette tokens and hex literals.
//!
//! Styles store colors as tokens so the picker's choice survives a
//! round-trip through a style file unchanged; the renderer only ever
//! asks for the resolved [`Rgba8`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Straight (non-premultiplied) 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Named palette entries offered by the color picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedColor {
    White,
    Black,
    Red,
    Gray,
    Slate,
    Amber,
    Emerald,
    Sky,
    Indigo,
    Rose,
    Transparent,
}

impl NamedColor {
    /// Token used in style files.
    pub fn token(&self) -> &'static str {
        match self {
            NamedColor::White => "white",
            NamedColor::Black => "black",
            NamedColor::Red => "red",
            NamedColor::Gray => "gray",
            NamedColor::Slate => "slate",
            NamedColor::Amber => "amber",
            NamedColor::Emerald => "emerald",
            NamedColor::Sky => "sky",
            NamedColor::Indigo => "indigo",
            NamedColor::Rose => "rose",
            NamedColor::Transparent => "transparent",
        }
    }

    pub fn rgba(&self) -> Rgba8 {
        match self {
            NamedColor::White => Rgba8::rgb(0xff, 0xff, 0xff),
            NamedColor::Black => Rgba8::rgb(0x00, 0x00, 0x00),
            NamedColor::Red => Rgba8::rgb(0xff, 0x00, 0x00),
            NamedColor::Gray => Rgba8::rgb(0x80, 0x80, 0x80),
            NamedColor::Slate => Rgba8::rgb(0x1e, 0x29, 0x3b),
            NamedColor::Amber => Rgba8::rgb(0xfb, 0xbf, 0x24),
            NamedColor::Emerald => Rgba8::rgb(0x10, 0xb9, 0x81),
            NamedColor::Sky => Rgba8::rgb(0x0e, 0xa5, 0xe9),
            NamedColor::Indigo => Rgba8::rgb(0x4f, 0x46, 0xe5),
            NamedColor::Rose => Rgba8::rgb(0xf4, 0x3f, 0x5e),
            NamedColor::Transparent => Rgba8::rgba(0, 0, 0, 0),
        }
    }

    /// Every palette entry, in picker order.
    pub fn all() -> &'static [NamedColor] {
        &[
            NamedColor::White,
            NamedColor::Black,
            NamedColor::Red,
            NamedColor::Gray,
            NamedColor::Slate,
            NamedColor::Amber,
            NamedColor::Emerald,
            NamedColor::Sky,
            NamedColor::Indigo,
            NamedColor::Rose,
            NamedColor::Transparent,
        ]
    }
}

/// A color as chosen in the UI: a palette token or a hex literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorToken {
    Named(NamedColor),
    Custom(Rgba8),
}

impl ColorToken {
    pub const WHITE: ColorToken = ColorToken::Named(NamedColor::White);
    pub const BLACK: ColorToken = ColorToken::Named(NamedColor::Black);
    pub const RED: ColorToken = ColorToken::Named(NamedColor::Red);

    /// Resolved color.
    pub fn rgba(&self) -> Rgba8 {
        match self {
            ColorToken::Named(named) => named.rgba(),
            ColorToken::Custom(rgba) => *rgba,
        }
    }
}

/// Errors from parsing a color token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("invalid hex color: {0}")]
    InvalidHex(String),

    #[error("unknown color token: {0}")]
    UnknownToken(String),
}

impl FromStr for ColorToken {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).map(ColorToken::Custom);
        }

        let lower = s.to_ascii_lowercase();
        NamedColor::all()
            .iter()
            .find(|named| named.token() == lower)
            .map(|named| ColorToken::Named(*named))
            .ok_or_else(|| ColorParseError::UnknownToken(s.to_string()))
    }
}

impl TryFrom<String> for ColorToken {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorToken> for String {
    fn from(value: ColorToken) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorToken::Named(named) => f.write_str(named.token()),
            ColorToken::Custom(rgba) => rgba.fmt(f),
        }
    }
}

fn parse_hex(hex: &str) -> Result<Rgba8, ColorParseError> {
    let invalid = || ColorParseError::InvalidHex(format!("#{hex}"));
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| invalid());
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

    match hex.len() {
        3 => Ok(Rgba8::rgb(
            nibble(0)? * 17,
            nibble(1)? * 17,
            nibble(2)? * 17,
        )),
        6 => Ok(Rgba8::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Ok(Rgba8::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => Err(invalid()),
    }
}
