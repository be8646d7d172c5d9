//! Compositing engine.
//!
//! Every pass starts from a fresh copy of the base image and re-applies the
//! active effect from scratch, so a result never depends on an earlier one.
//!
//! With landmarks, each region mapped to the effect type is rasterized into
//! a blurred mask and the effect color is blended in with the type's blend
//! mode. Without landmarks the color is alpha-blended flat over the whole
//! frame at a reduced opacity.

use crate::blend::{blend_pixel, mix_pixel};
use crate::catalog::EffectCatalog;
use crate::mask::RegionMask;
use crate::regions::{regions_for, RegionRegistry, RegistryError};
use crate::selection::{Intensity, Selection};
use crate::types::{BlendSpec, LandmarkSet, Rgb};
use image::RgbImage;
use serde::Serialize;

/// Flat opacity multiplier used when no landmarks are available.
pub const FALLBACK_OPACITY_MULTIPLIER: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorConfig {
    /// Opacity at 100% intensity in fallback mode.
    pub fallback_opacity: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            fallback_opacity: FALLBACK_OPACITY_MULTIPLIER,
        }
    }
}

/// Input to one compositing pass.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub base_image: &'a RgbImage,
    /// `None` while detection is pending or after it failed.
    pub landmarks: Option<&'a LandmarkSet>,
    pub selection: &'a Selection,
    pub intensity: Intensity,
}

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// No selection; the base image unchanged.
    Untouched,
    /// Per-region masks from landmarks.
    Regional,
    /// Whole-frame approximation, landmarks unavailable.
    Fallback,
}

/// Output of one compositing pass. Same dimensions as the base image.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: RgbImage,
    pub mode: RenderMode,
}

/// Renders selections onto base images.
#[derive(Debug, Clone)]
pub struct Compositor {
    catalog: EffectCatalog,
    registry: RegionRegistry,
    config: CompositorConfig,
}

impl Compositor {
    /// Build an engine for a detector producing `landmark_count` points.
    ///
    /// Fails if any region references a landmark the detector cannot produce.
    pub fn new(
        catalog: &EffectCatalog,
        landmark_count: usize,
        config: CompositorConfig,
    ) -> Result<Self, RegistryError> {
        let registry = RegionRegistry::new(landmark_count)?;
        Ok(Self {
            catalog: catalog.clone(),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn composite(&self, request: &CompositeRequest<'_>) -> CompositeResult {
        let mut image = request.base_image.clone();

        let Some((color, effect_type)) = request.selection.resolve() else {
            return CompositeResult {
                image,
                mode: RenderMode::Untouched,
            };
        };

        let landmarks = match request.landmarks {
            Some(set) if set.len() == self.registry.landmark_count() => set,
            Some(set) => {
                tracing::warn!(
                    got = set.len(),
                    expected = self.registry.landmark_count(),
                    "landmark count mismatch; using fallback"
                );
                self.apply_fallback(&mut image, color, request.intensity);
                return CompositeResult {
                    image,
                    mode: RenderMode::Fallback,
                };
            }
            None => {
                tracing::debug!(%effect_type, "no landmarks; using fallback");
                self.apply_fallback(&mut image, color, request.intensity);
                return CompositeResult {
                    image,
                    mode: RenderMode::Fallback,
                };
            }
        };

        let spec = self.catalog.blend_spec_for(effect_type);
        let opacity = (request.intensity.fraction() * spec.base_opacity_multiplier).clamp(0.0, 1.0);
        tracing::debug!(
            %effect_type,
            %color,
            intensity = request.intensity.get(),
            opacity,
            "compositing"
        );

        if spec.masked {
            let (width, height) = image.dimensions();
            for &region in regions_for(effect_type) {
                let Some(polygon) = self.registry.polygon(region, landmarks, width, height) else {
                    continue;
                };
                let Some(mask) = RegionMask::rasterize(&polygon, width, height, spec.blur_radius_px)
                else {
                    tracing::debug!(%region, "region outside frame; skipped");
                    continue;
                };
                paint_masked(&mut image, &mask, spec, color, opacity);
            }
        } else {
            for pixel in image.pixels_mut() {
                blend_pixel(pixel, spec.blend_mode, color, opacity);
            }
        }

        CompositeResult {
            image,
            mode: RenderMode::Regional,
        }
    }

    fn apply_fallback(&self, image: &mut RgbImage, color: Rgb, intensity: Intensity) {
        let opacity = (intensity.fraction() * self.config.fallback_opacity).clamp(0.0, 1.0);
        for pixel in image.pixels_mut() {
            mix_pixel(pixel, color, opacity);
        }
    }
}

fn paint_masked(image: &mut RgbImage, mask: &RegionMask, spec: &BlendSpec, color: Rgb, opacity: f32) {
    for (x, y, coverage) in mask.samples() {
        blend_pixel(image.get_pixel_mut(x, y), spec.blend_mode, color, opacity * coverage);
    }
}
