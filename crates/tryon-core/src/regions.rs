//! Facial region polygons over the 468-point face mesh.
//!
//! Each region is an ordered ring of landmark indices. Resolving a ring
//! against a [`LandmarkSet`] yields a closed polygon in pixel space.

use crate::types::{EffectType, LandmarkSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Landmark count produced by the face-mesh detector the tables below index into.
pub const FACE_MESH_LANDMARKS: usize = 468;

const LIP_OUTER: [usize; 20] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];
const CHEEK_LEFT: [usize; 9] = [116, 117, 118, 119, 100, 142, 36, 205, 206];
const CHEEK_RIGHT: [usize; 9] = [345, 346, 347, 348, 329, 371, 266, 425, 426];
const EYE_LEFT: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];
const EYE_RIGHT: [usize; 16] = [
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];
const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// A named facial region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    LipOuter,
    CheekLeft,
    CheekRight,
    EyeLeft,
    EyeRight,
    FullFrame,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::LipOuter,
        Region::CheekLeft,
        Region::CheekRight,
        Region::EyeLeft,
        Region::EyeRight,
        Region::FullFrame,
    ];

    /// Ordered landmark ring for this region.
    pub fn indices(self) -> &'static [usize] {
        match self {
            Region::LipOuter => &LIP_OUTER,
            Region::CheekLeft => &CHEEK_LEFT,
            Region::CheekRight => &CHEEK_RIGHT,
            Region::EyeLeft => &EYE_LEFT,
            Region::EyeRight => &EYE_RIGHT,
            Region::FullFrame => &FACE_OVAL,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Region::LipOuter => "lip-outer",
            Region::CheekLeft => "cheek-left",
            Region::CheekRight => "cheek-right",
            Region::EyeLeft => "eye-left",
            Region::EyeRight => "eye-right",
            Region::FullFrame => "full-frame",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Regions painted for each product type. Paired features are painted
/// independently with identical parameters.
pub fn regions_for(effect_type: EffectType) -> &'static [Region] {
    match effect_type {
        EffectType::Lipstick => &[Region::LipOuter],
        EffectType::Blush => &[Region::CheekLeft, Region::CheekRight],
        EffectType::Eyeshadow => &[Region::EyeLeft, Region::EyeRight],
        EffectType::Foundation => &[Region::FullFrame],
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("region {region} references landmark {index}, but the detector yields {landmark_count}")]
    MalformedRegion {
        region: Region,
        index: usize,
        landmark_count: usize,
    },
    #[error("region {region} has {len} vertices, need at least 3")]
    DegenerateRegion { region: Region, len: usize },
}

/// Region table validated against a detector's landmark cardinality.
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    landmark_count: usize,
}

impl RegionRegistry {
    /// Validate every region against `landmark_count`.
    ///
    /// A failure here means the tables and the detector disagree, so callers
    /// should refuse to start rather than degrade per request.
    pub fn new(landmark_count: usize) -> Result<Self, RegistryError> {
        for region in Region::ALL {
            let indices = region.indices();
            if indices.len() < 3 {
                return Err(RegistryError::DegenerateRegion {
                    region,
                    len: indices.len(),
                });
            }
            if let Some(&index) = indices.iter().find(|&&i| i >= landmark_count) {
                return Err(RegistryError::MalformedRegion {
                    region,
                    index,
                    landmark_count,
                });
            }
        }

        tracing::debug!(landmark_count, regions = Region::ALL.len(), "region registry validated");
        Ok(Self { landmark_count })
    }

    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    pub fn region_indices(&self, region: Region) -> &'static [usize] {
        region.indices()
    }

    /// Resolve `region` against `landmarks` into a pixel-space polygon.
    ///
    /// Returns `None` when the set's cardinality does not match the one this
    /// registry was validated for.
    pub fn polygon(
        &self,
        region: Region,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Option<Vec<(f32, f32)>> {
        if landmarks.len() != self.landmark_count {
            return None;
        }
        region
            .indices()
            .iter()
            .map(|&i| landmarks.get(i).map(|lm| lm.to_pixel(width, height)))
            .collect()
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self {
            landmark_count: FACE_MESH_LANDMARKS,
        }
    }
}
