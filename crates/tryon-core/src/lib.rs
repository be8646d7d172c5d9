//! tryon-core: landmark-driven cosmetic compositing.
//!
//! Composites a chosen color onto the facial regions of a photo at an
//! adjustable intensity. Landmarks come from an external detector; when
//! they are missing the engine degrades to a whole-frame tint.

pub mod blend;
pub mod catalog;
pub mod compositor;
pub mod landmarks;
pub mod mask;
pub mod recommendation;
pub mod regions;
pub mod selection;
pub mod types;

pub use catalog::{CatalogError, EffectCatalog};
pub use compositor::{CompositeRequest, CompositeResult, Compositor, CompositorConfig, RenderMode};
pub use landmarks::{parse_landmarks, LandmarkError, LandmarkProvider, SidecarProvider};
pub use recommendation::{parse_recommendations, Recommendation, RecommendationError};
pub use regions::{Region, RegionRegistry, RegistryError, FACE_MESH_LANDMARKS};
pub use selection::{Intensity, Selection, SelectionError, SelectionState};
pub use types::{BlendMode, BlendSpec, Effect, EffectType, Landmark, LandmarkSet, Rgb};
