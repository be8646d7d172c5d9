use std::path::PathBuf;
use std::str::FromStr;
use tryon_core::compositor::FALLBACK_OPACITY_MULTIPLIER;
use tryon_core::selection::DEFAULT_INTENSITY;
use tryon_core::{CompositorConfig, FACE_MESH_LANDMARKS};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Catalog file replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// Opacity multiplier for the whole-frame fallback.
    pub fallback_opacity: f32,
    /// Landmark count produced by the external detector.
    pub landmark_count: usize,
    /// Slider position for a freshly opened image.
    pub default_intensity: u8,
    /// How long to wait for landmarks before giving up on an image.
    pub detect_timeout_secs: u64,
    /// Suffix appended to the image path to find sidecar landmarks.
    pub landmark_suffix: String,
}

impl Config {
    /// Load configuration from `TRYON_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            catalog_path: std::env::var("TRYON_CATALOG_PATH").ok().map(PathBuf::from),
            fallback_opacity: env_or("TRYON_FALLBACK_OPACITY", FALLBACK_OPACITY_MULTIPLIER)
                .clamp(0.0, 1.0),
            landmark_count: env_or("TRYON_LANDMARK_COUNT", FACE_MESH_LANDMARKS),
            default_intensity: env_or("TRYON_DEFAULT_INTENSITY", u64::from(DEFAULT_INTENSITY))
                .min(100) as u8,
            detect_timeout_secs: env_or("TRYON_DETECT_TIMEOUT_SECS", 10),
            landmark_suffix: std::env::var("TRYON_LANDMARK_SUFFIX")
                .unwrap_or_else(|_| tryon_core::SidecarProvider::DEFAULT_SUFFIX.to_string()),
        }
    }

    pub fn compositor_config(&self) -> CompositorConfig {
        CompositorConfig {
            fallback_opacity: self.fallback_opacity,
        }
    }
}

/// Parse `key` as `T`, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_defaults_and_parses() {
        std::env::set_var("TRYON_TEST_ENV_OR_VALUE", " 0.25 ");
        std::env::set_var("TRYON_TEST_ENV_OR_BAD", "lots");
        assert_eq!(env_or("TRYON_TEST_ENV_OR_VALUE", 0.5_f32), 0.25);
        assert_eq!(env_or("TRYON_TEST_ENV_OR_BAD", 7_u64), 7);
        assert_eq!(env_or("TRYON_TEST_ENV_OR_UNSET", 468_usize), 468);
    }
}
