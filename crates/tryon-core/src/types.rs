use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An 8-bit-per-channel RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseRgbError {
    #[error("expected `r,g,b` or `#rrggbb`, got {0:?}")]
    Format(String),
    #[error("channel out of range in {0:?} (0-255)")]
    Channel(String),
}

/// Accepts `220,20,60` or `#dc143c`.
impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(ParseRgbError::Format(s.to_string()));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|_| ParseRgbError::Format(s.to_string()))
            };
            return Ok(Self::new(channel(0)?, channel(2)?, channel(4)?));
        }

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ParseRgbError::Format(s.to_string()));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: u16 = part
                .parse()
                .map_err(|_| ParseRgbError::Format(s.to_string()))?;
            *slot = u8::try_from(value).map_err(|_| ParseRgbError::Channel(s.to_string()))?;
        }
        Ok(Self::new(channels[0], channels[1], channels[2]))
    }
}

/// Cosmetic product type. Decides which regions are painted and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectType {
    Lipstick,
    Foundation,
    Blush,
    Eyeshadow,
}

impl EffectType {
    pub const ALL: [EffectType; 4] = [
        EffectType::Lipstick,
        EffectType::Foundation,
        EffectType::Blush,
        EffectType::Eyeshadow,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EffectType::Lipstick => "lipstick",
            EffectType::Foundation => "foundation",
            EffectType::Blush => "blush",
            EffectType::Eyeshadow => "eyeshadow",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown effect type {0:?} (expected lipstick, foundation, blush or eyeshadow)")]
pub struct ParseEffectTypeError(pub String);

impl FromStr for EffectType {
    type Err = ParseEffectTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        EffectType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| ParseEffectTypeError(s.to_string()))
    }
}

/// How the effect color is combined with the photo underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Darkens and tints; used for pigmented regions.
    Multiply,
    /// Contrast-preserving tonal shift; used for foundation.
    Overlay,
}

/// Per-product-type compositing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendSpec {
    /// Gaussian sigma, in pixels, used to soften the region mask.
    pub blur_radius_px: f32,
    pub blend_mode: BlendMode,
    /// Opacity reached at 100% intensity, in (0, 1].
    pub base_opacity_multiplier: f32,
    /// `false` paints the whole frame instead of per-region polygons.
    #[serde(default = "default_masked")]
    pub masked: bool,
}

fn default_masked() -> bool {
    true
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub effect_type: EffectType,
    pub color: Rgb,
}

/// A facial keypoint, normalized to [0, 1] relative to image width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, carried through from the detector but unused for compositing.
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Scale to pixel coordinates of a `width` × `height` image.
    pub fn to_pixel(self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Ordered landmarks from one detector pass. Indices are the detector's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}
