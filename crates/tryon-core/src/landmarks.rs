//! Landmark provider seam.
//!
//! Detection itself happens outside this crate. Providers hand back a
//! [`LandmarkSet`] or report why none is available; either way the
//! compositor keeps working.

use crate::types::{Landmark, LandmarkSet};
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("no face found")]
    NoFaceFound,
    #[error("landmarks unavailable: {0}")]
    Unavailable(String),
    #[error("bad landmark JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("landmark {index} is not a finite point")]
    NonFinite { index: usize },
}

/// Source of facial landmarks for a decoded image.
pub trait LandmarkProvider: Send + Sync {
    /// `source` is the file the image was decoded from, when known.
    fn detect(&self, image: &RgbImage, source: Option<&Path>) -> Result<LandmarkSet, LandmarkError>;
}

/// Accepted JSON layouts: a bare point array, or a detector result holding
/// one point array per face (first face wins).
#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkDocument {
    Points(Vec<Landmark>),
    Faces {
        #[serde(rename = "faceLandmarks")]
        face_landmarks: Vec<Vec<Landmark>>,
    },
}

/// Parse landmarks from JSON.
pub fn parse_landmarks(json: &str) -> Result<LandmarkSet, LandmarkError> {
    let points = match serde_json::from_str::<LandmarkDocument>(json)? {
        LandmarkDocument::Points(points) => points,
        LandmarkDocument::Faces { face_landmarks } => face_landmarks
            .into_iter()
            .next()
            .ok_or(LandmarkError::NoFaceFound)?,
    };
    if points.is_empty() {
        return Err(LandmarkError::NoFaceFound);
    }
    if let Some(index) = points
        .iter()
        .position(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(LandmarkError::NonFinite { index });
    }
    Ok(LandmarkSet::new(points))
}

/// Reads landmarks a detector wrote next to the image, e.g.
/// `face.jpg` → `face.jpg.landmarks.json`.
#[derive(Debug, Clone)]
pub struct SidecarProvider {
    suffix: String,
}

impl SidecarProvider {
    pub const DEFAULT_SUFFIX: &'static str = ".landmarks.json";

    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_owned();
        name.push(&self.suffix);
        PathBuf::from(name)
    }
}

impl Default for SidecarProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUFFIX)
    }
}

impl LandmarkProvider for SidecarProvider {
    fn detect(&self, image: &RgbImage, source: Option<&Path>) -> Result<LandmarkSet, LandmarkError> {
        let source = source
            .ok_or_else(|| LandmarkError::Unavailable("image has no source path".into()))?;
        let path = self.sidecar_path(source);
        let json = std::fs::read_to_string(&path)
            .map_err(|e| LandmarkError::Unavailable(format!("{}: {e}", path.display())))?;
        let set = parse_landmarks(&json)?;
        tracing::info!(
            path = %path.display(),
            points = set.len(),
            width = image.width(),
            height = image.height(),
            "loaded sidecar landmarks"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_array() {
        let set = parse_landmarks(r#"[{"x":0.1,"y":0.2,"z":0.0},{"x":0.5,"y":0.5}]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some(Landmark::new(0.1, 0.2)));
    }

    #[test]
    fn test_parse_first_face() {
        let json = r#"{"faceLandmarks":[[{"x":0.1,"y":0.1}],[{"x":0.9,"y":0.9}]]}"#;
        let set = parse_landmarks(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0), Some(Landmark::new(0.1, 0.1)));
    }

    #[test]
    fn test_no_face() {
        assert!(matches!(
            parse_landmarks(r#"{"faceLandmarks":[]}"#),
            Err(LandmarkError::NoFaceFound)
        ));
        assert!(matches!(parse_landmarks("[]"), Err(LandmarkError::NoFaceFound)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(parse_landmarks("not json"), Err(LandmarkError::Parse(_))));
    }

    #[test]
    fn test_sidecar_path() {
        let provider = SidecarProvider::default();
        assert_eq!(
            provider.sidecar_path(Path::new("/tmp/face.jpg")),
            PathBuf::from("/tmp/face.jpg.landmarks.json")
        );
    }

    #[test]
    fn test_sidecar_missing_is_unavailable() {
        let provider = SidecarProvider::default();
        let image = RgbImage::new(4, 4);
        let err = provider
            .detect(&image, Some(Path::new("/nonexistent/tryon/face.png")))
            .unwrap_err();
        assert!(matches!(err, LandmarkError::Unavailable(_)));
        assert!(matches!(provider.detect(&image, None), Err(LandmarkError::Unavailable(_))));
    }

    #[test]
    fn test_sidecar_roundtrip_from_disk() {
        let dir = std::env::temp_dir().join(format!("tryon-sidecar-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image_path = dir.join("face.png");
        std::fs::write(dir.join("face.png.landmarks.json"), r#"[{"x":0.25,"y":0.75}]"#).unwrap();

        let set = SidecarProvider::default()
            .detect(&RgbImage::new(4, 4), Some(&image_path))
            .unwrap();
        assert_eq!(set.get(0), Some(Landmark::new(0.25, 0.75)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
