//! Brush size and color.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest brush radius offered by the size slider.
pub const MIN_BRUSH_SIZE: f64 = 5.0;
/// Largest brush radius offered by the size slider.
pub const MAX_BRUSH_SIZE: f64 = 30.0;
/// Brush radius a fresh pad starts with.
pub const DEFAULT_BRUSH_SIZE: f64 = 20.0;
/// Slider increment.
pub const BRUSH_SIZE_STEP: f64 = 1.0;

/// The four palette swatches, in display order.
pub const PALETTE: [BrushColor; 4] = [
    BrushColor::rgb(0xf9, 0x98, 0x9f),
    BrushColor::rgb(0xfc, 0xcb, 0x8f),
    BrushColor::rgb(0xfa, 0xf0, 0x96),
    BrushColor::rgb(0xc5, 0xf8, 0xc8),
];

/// Color parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("color must start with '#': {0:?}")]
    MissingHash(String),
    #[error("color must have 3, 6 or 8 hex digits: {0:?}")]
    BadLength(String),
    #[error("invalid hex digit in color: {0:?}")]
    BadDigit(String),
}

/// Straight-alpha RGBA8 color.
///
/// On the wire a color is a CSS hex string such as `"#f9989f"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrushColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl BrushColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(s: &str) -> Result<Self, ColorParseError> {
        let s = s.trim();
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if !digits.is_ascii() {
            return Err(ColorParseError::BadDigit(s.to_string()));
        }

        let byte = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorParseError::BadDigit(s.to_string()))
        };

        match digits.len() {
            3 => {
                let nibble = |i: usize| byte(i..i + 1).map(|v| v * 17);
                Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Ok(Self::rgb(byte(0..2)?, byte(2..4)?, byte(4..6)?)),
            8 => Ok(Self::new(byte(0..2)?, byte(2..4)?, byte(4..6)?, byte(6..8)?)),
            _ => Err(ColorParseError::BadLength(s.to_string())),
        }
    }

    /// Lowercase CSS hex form; alpha is only written when not opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }
}

impl Default for BrushColor {
    fn default() -> Self {
        PALETTE[0]
    }
}

impl fmt::Display for BrushColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BrushColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl TryFrom<String> for BrushColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<BrushColor> for String {
    fn from(color: BrushColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for BrushColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<BrushColor> for Color {
    fn from(color: BrushColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Current brush: dab radius and paint color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    size: f64,
    pub color: BrushColor,
}

impl Brush {
    /// Create a brush; the size is clamped to the slider range.
    pub fn new(size: f64, color: BrushColor) -> Self {
        Self {
            size: clamp_size(size),
            color,
        }
    }

    /// Dab radius in canvas pixels.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Set the dab radius, clamped to the slider range and snapped to its step.
    pub fn set_size(&mut self, size: f64) {
        self.size = clamp_size(size);
    }

    pub fn set_color(&mut self, color: BrushColor) {
        self.color = color;
    }

    /// Width of the line joining two dabs.
    pub fn line_width(&self) -> f64 {
        self.size * 2.0
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(DEFAULT_BRUSH_SIZE, BrushColor::default())
    }
}

fn clamp_size(size: f64) -> f64 {
    if !size.is_finite() {
        return DEFAULT_BRUSH_SIZE;
    }
    let stepped = (size / BRUSH_SIZE_STEP).round() * BRUSH_SIZE_STEP;
    stepped.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE)
}
