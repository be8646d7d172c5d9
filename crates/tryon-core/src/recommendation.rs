//! Product recommendations from an external text model.
//!
//! The model answers in free text that should contain a JSON array of
//! products. Makeup entries carrying a color can be previewed directly as
//! an override selection.

use crate::types::{EffectType, Rgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendationError {
    #[error("no JSON array found in response")]
    NoJson,
    #[error("bad recommendation JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One recommended product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub shade: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub why_it_suits: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub rgb_color: Option<Rgb>,
}

impl Recommendation {
    /// Product type, if it is one the compositor can paint.
    pub fn effect_type(&self) -> Option<EffectType> {
        self.product_type.parse().ok()
    }

    /// Display label: "Brand Product (Shade)".
    pub fn label(&self) -> String {
        let mut label = if self.brand.is_empty() {
            self.product_name.clone()
        } else {
            format!("{} {}", self.brand, self.product_name)
        };
        if let Some(shade) = self.shade.as_deref().filter(|s| !s.is_empty()) {
            label.push_str(&format!(" ({shade})"));
        }
        label
    }

    /// `(color, type, label)` for previewing, or `None` for skincare and
    /// entries without a color.
    pub fn as_override(&self) -> Option<(Rgb, EffectType, String)> {
        Some((self.rgb_color?, self.effect_type()?, self.label()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    List(Vec<Recommendation>),
    Wrapped { recommendations: Vec<Recommendation> },
}

/// Locate the JSON payload in a model response: a ```json fence, else the
/// outermost `[...]`, else the whole text.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text.trim(),
    }
}

/// Parse recommendations out of a model response or a `{"recommendations": [...]}` body.
pub fn parse_recommendations(text: &str) -> Result<Vec<Recommendation>, RecommendationError> {
    if let Ok(Envelope::Wrapped { recommendations }) = serde_json::from_str::<Envelope>(text) {
        return Ok(recommendations);
    }
    let json = extract_json(text);
    if json.is_empty() {
        return Err(RecommendationError::NoJson);
    }
    let list = match serde_json::from_str::<Envelope>(json)? {
        Envelope::List(list) => list,
        Envelope::Wrapped { recommendations } => recommendations,
    };
    tracing::debug!(count = list.len(), "parsed recommendations");
    Ok(list)
}
