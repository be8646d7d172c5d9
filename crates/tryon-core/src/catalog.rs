//! Effect catalog.
//!
//! The built-in catalog is embedded at compile time from
//! `contrib/catalog/effects.toml`. A replacement file with the same layout
//! can be loaded at startup; entries never change after that.

use crate::types::{BlendSpec, Effect, EffectType};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../../../contrib/catalog/effects.toml");

/// Largest accepted mask blur sigma, in pixels.
pub const MAX_BLUR_RADIUS_PX: f32 = 256.0;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("bad catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate effect id: {0}")]
    DuplicateId(String),
    #[error("{effect_type}: opacity multiplier {value} outside (0, 1]")]
    InvalidMultiplier { effect_type: EffectType, value: f32 },
    #[error("{effect_type}: blur radius {value} must be a pixel count in [0, 256]")]
    InvalidBlurRadius { effect_type: EffectType, value: f32 },
}

/// One BlendSpec per product type. Every type must be present.
#[derive(Debug, Clone, Copy, Deserialize)]
struct BlendTable {
    lipstick: BlendSpec,
    foundation: BlendSpec,
    blush: BlendSpec,
    eyeshadow: BlendSpec,
}

impl BlendTable {
    fn get(&self, effect_type: EffectType) -> &BlendSpec {
        match effect_type {
            EffectType::Lipstick => &self.lipstick,
            EffectType::Foundation => &self.foundation,
            EffectType::Blush => &self.blush,
            EffectType::Eyeshadow => &self.eyeshadow,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    blend: BlendTable,
    #[serde(rename = "effect", default)]
    effects: Vec<Effect>,
}

/// Selectable effects plus the per-type blend parameters.
#[derive(Debug, Clone)]
pub struct EffectCatalog {
    effects: Vec<Effect>,
    blend: BlendTable,
}

impl EffectCatalog {
    /// Parse the catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml(&src)?;
        tracing::info!(path = %path.display(), effects = catalog.effects.len(), "loaded effect catalog");
        Ok(catalog)
    }

    pub fn from_toml(src: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(src)?;

        for effect_type in EffectType::ALL {
            let spec = file.blend.get(effect_type);
            let m = spec.base_opacity_multiplier;
            if !(m > 0.0 && m <= 1.0) {
                return Err(CatalogError::InvalidMultiplier { effect_type, value: m });
            }
            let r = spec.blur_radius_px;
            if !(r.is_finite() && (0.0..=MAX_BLUR_RADIUS_PX).contains(&r)) {
                return Err(CatalogError::InvalidBlurRadius { effect_type, value: r });
            }
        }

        let mut seen = HashSet::new();
        for effect in &file.effects {
            if !seen.insert(effect.id.as_str()) {
                return Err(CatalogError::DuplicateId(effect.id.clone()));
            }
        }

        Ok(Self {
            effects: file.effects,
            blend: file.blend,
        })
    }

    /// Look up an effect by id. `None` is recoverable: treat it as "no effect".
    pub fn lookup(&self, id: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == id)
    }

    /// Effects of one product type, in declaration order.
    pub fn effects_by_type(&self, effect_type: EffectType) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .filter(move |e| e.effect_type == effect_type)
    }

    pub fn blend_spec_for(&self, effect_type: EffectType) -> &BlendSpec {
        self.blend.get(effect_type)
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlendMode, Rgb};

    const MINIMAL: &str = r#"
        [blend.lipstick]
        blur_radius_px = 4.0
        blend_mode = "multiply"
        base_opacity_multiplier = 0.5
        [blend.blush]
        blur_radius_px = 12.0
        blend_mode = "multiply"
        base_opacity_multiplier = 0.35
        [blend.eyeshadow]
        blur_radius_px = 8.0
        blend_mode = "multiply"
        base_opacity_multiplier = 0.3
        [blend.foundation]
        blur_radius_px = 15.0
        blend_mode = "overlay"
        base_opacity_multiplier = 0.2
        masked = false
    "#;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = EffectCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 12);
    }

    #[test]
    fn test_lookup_known_effect() {
        let catalog = EffectCatalog::builtin().unwrap();
        let red = catalog.lookup("lipstick-red").unwrap();
        assert_eq!(red.display_name, "Bold Red");
        assert_eq!(red.effect_type, EffectType::Lipstick);
        assert_eq!(red.color, Rgb::new(220, 20, 60));
    }

    #[test]
    fn test_lookup_unknown_effect() {
        let catalog = EffectCatalog::builtin().unwrap();
        assert!(catalog.lookup("lipstick-neon").is_none());
    }

    #[test]
    fn test_effects_by_type_keeps_order() {
        let catalog = EffectCatalog::builtin().unwrap();
        let lipsticks: Vec<&str> = catalog
            .effects_by_type(EffectType::Lipstick)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(lipsticks.len(), 7);
        assert_eq!(lipsticks[0], "lipstick-red");
        assert_eq!(lipsticks[6], "lipstick-brown");
        assert_eq!(catalog.effects_by_type(EffectType::Foundation).count(), 2);
        assert_eq!(catalog.effects_by_type(EffectType::Blush).count(), 1);
        assert_eq!(catalog.effects_by_type(EffectType::Eyeshadow).count(), 2);
    }

    // Empirical multipliers: characterized here, not derived.
    #[test]
    fn test_builtin_blend_specs() {
        let catalog = EffectCatalog::builtin().unwrap();

        let lip = catalog.blend_spec_for(EffectType::Lipstick);
        assert_eq!(lip.base_opacity_multiplier, 0.5);
        assert_eq!(lip.blur_radius_px, 4.0);
        assert_eq!(lip.blend_mode, BlendMode::Multiply);
        assert!(lip.masked);

        let blush = catalog.blend_spec_for(EffectType::Blush);
        assert_eq!(blush.base_opacity_multiplier, 0.35);
        assert_eq!(blush.blur_radius_px, 12.0);

        let shadow = catalog.blend_spec_for(EffectType::Eyeshadow);
        assert_eq!(shadow.base_opacity_multiplier, 0.3);
        assert_eq!(shadow.blur_radius_px, 8.0);

        let foundation = catalog.blend_spec_for(EffectType::Foundation);
        assert_eq!(foundation.base_opacity_multiplier, 0.2);
        assert_eq!(foundation.blend_mode, BlendMode::Overlay);
        assert!(!foundation.masked);
    }

    #[test]
    fn test_catalog_without_effects() {
        let catalog = EffectCatalog::from_toml(MINIMAL).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_missing_blend_spec_rejected() {
        let src = MINIMAL.replace("[blend.foundation]", "[blend.unused]");
        assert!(matches!(EffectCatalog::from_toml(&src), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let src = MINIMAL.replace("base_opacity_multiplier = 0.3", "base_opacity_multiplier = 0.0");
        assert!(matches!(
            EffectCatalog::from_toml(&src),
            Err(CatalogError::InvalidMultiplier { effect_type: EffectType::Eyeshadow, .. })
        ));
    }

    #[test]
    fn test_negative_blur_rejected() {
        let src = MINIMAL.replace("blur_radius_px = 12.0", "blur_radius_px = -1.0");
        assert!(matches!(
            EffectCatalog::from_toml(&src),
            Err(CatalogError::InvalidBlurRadius { effect_type: EffectType::Blush, .. })
        ));
    }

    #[test]
    fn test_oversized_blur_rejected() {
        let src = MINIMAL.replace("blur_radius_px = 12.0", "blur_radius_px = 2.0e9");
        assert!(matches!(
            EffectCatalog::from_toml(&src),
            Err(CatalogError::InvalidBlurRadius { effect_type: EffectType::Blush, .. })
        ));

        let src = MINIMAL.replace("blur_radius_px = 12.0", "blur_radius_px = 256.0");
        assert!(EffectCatalog::from_toml(&src).is_ok());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let src = format!(
            "{MINIMAL}\n{entry}\n{entry}",
            entry = r#"[[effect]]
id = "x"
display_name = "X"
type = "blush"
color = { r = 1, g = 2, b = 3 }"#
        );
        assert!(matches!(
            EffectCatalog::from_toml(&src),
            Err(CatalogError::DuplicateId(id)) if id == "x"
        ));
    }
}
