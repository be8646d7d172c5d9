//! The active effect and the intensity slider.
//!
//! The most recent instruction always wins: choosing a preset replaces an
//! override, receiving an override replaces a preset, and clearing drops
//! either. Nothing stacks.

use crate::catalog::EffectCatalog;
use crate::types::{Effect, EffectType, Rgb};
use serde::Serialize;
use thiserror::Error;

/// Slider position at session start.
pub const DEFAULT_INTENSITY: u8 = 50;
/// Slider position forced by an incoming override so it is visible on first paint.
pub const OVERRIDE_INTENSITY: u8 = 75;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown effect id: {0}")]
    UnknownEffectId(String),
    #[error("intensity {0} outside 0-100")]
    InvalidIntensity(i64),
}

/// Effect strength in percent, always within [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Intensity(u8);

impl Intensity {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, SelectionError> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(SelectionError::InvalidIntensity(value)),
        }
    }

    /// Clamp any value into range.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Intensity as a fraction in [0, 1].
    pub fn fraction(self) -> f32 {
        self.0 as f32 / Self::MAX as f32
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(DEFAULT_INTENSITY)
    }
}

/// What is being previewed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    None,
    Preset(Effect),
    Override {
        color: Rgb,
        effect_type: EffectType,
        label: String,
    },
}

impl Selection {
    /// Color and product type to paint, or `None` for no effect.
    pub fn resolve(&self) -> Option<(Rgb, EffectType)> {
        match self {
            Selection::None => None,
            Selection::Preset(effect) => Some((effect.color, effect.effect_type)),
            Selection::Override {
                color, effect_type, ..
            } => Some((*color, *effect_type)),
        }
    }

    /// Display name of the active effect.
    pub fn label(&self) -> Option<&str> {
        match self {
            Selection::None => None,
            Selection::Preset(effect) => Some(effect.display_name.as_str()),
            Selection::Override { label, .. } => Some(label.as_str()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// Mutable session state driven by user actions.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selection: Selection,
    intensity: Intensity,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intensity(intensity: Intensity) -> Self {
        Self {
            selection: Selection::None,
            intensity,
        }
    }

    /// Select a catalog preset.
    ///
    /// An unknown id leaves no effect active and is reported so callers can
    /// log it; it is never fatal.
    pub fn set_preset(&mut self, catalog: &EffectCatalog, effect_id: &str) -> Result<(), SelectionError> {
        match catalog.lookup(effect_id) {
            Some(effect) => {
                tracing::debug!(effect = %effect.id, "preset selected");
                self.selection = Selection::Preset(effect.clone());
                Ok(())
            }
            None => {
                tracing::warn!(effect = effect_id, "unknown effect id; clearing selection");
                self.selection = Selection::None;
                Err(SelectionError::UnknownEffectId(effect_id.to_string()))
            }
        }
    }

    /// Apply an externally supplied color and reset intensity to
    /// [`OVERRIDE_INTENSITY`].
    pub fn set_override(&mut self, color: Rgb, effect_type: EffectType, label: impl Into<String>) {
        let label = label.into();
        tracing::debug!(%color, %effect_type, label = %label, "override selected");
        self.selection = Selection::Override {
            color,
            effect_type,
            label,
        };
        self.intensity = Intensity(OVERRIDE_INTENSITY);
    }

    /// Drop the active effect. Intensity is kept.
    pub fn clear(&mut self) {
        self.selection = Selection::None;
    }

    /// Move the slider. Out-of-range values are rejected and leave state unchanged.
    pub fn set_intensity(&mut self, value: i64) -> Result<(), SelectionError> {
        self.intensity = Intensity::new(value)?;
        Ok(())
    }

    pub fn current(&self) -> &Selection {
        &self.selection
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }
}
