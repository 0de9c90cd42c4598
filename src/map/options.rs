//! Recognized configuration surface for all map variants.

use serde::Deserialize;

/// Map construction options. Every field has a usable default; variant
/// `defaults()` adjust a few of them before user options are applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapOptions {
    /// Classification attribute name
    pub attr: Option<String>,
    pub number_of_classes: usize,
    /// One of "equidistant", "quantile", "k-means"; unknown names fall
    /// back to quantile
    pub class_breaks_method: String,
    /// Explicit boundary override; skips the Classifier entirely
    pub class_breaks: Option<Vec<f64>>,
    /// Explicit per-class RGBA override; skips the default color tables
    pub color_scheme: Option<Vec<[f32; 4]>>,
    /// Global fill opacity applied to every class color
    pub alpha: f32,
    /// Per-feature point buffers (true) vs one merged buffer per class
    pub is_dynamic: bool,
    /// Ingestion cap
    pub max_features: Option<usize>,
    /// Change-map difference attributes: value = minuend - subtrahend
    pub minuend: Option<String>,
    pub subtrahend: Option<String>,
    pub tile_size: f64,
    /// Proportional-symbol size range in pixels
    pub min_point_size: f32,
    pub max_point_size: f32,
    pub show_legend: bool,
    pub legend_toggle: bool,
    /// Property allowlist for the built-in click alert; None shows
    /// everything except the injected id
    pub show_properties_on_click: Option<Vec<String>>,
    /// Gates the built-in click alert
    pub interactive: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            attr: None,
            number_of_classes: 5,
            class_breaks_method: "quantile".to_string(),
            class_breaks: None,
            color_scheme: None,
            alpha: 0.8,
            is_dynamic: false,
            max_features: None,
            minuend: None,
            subtrahend: None,
            tile_size: 256.0,
            min_point_size: 4.0,
            max_point_size: 24.0,
            show_legend: true,
            legend_toggle: true,
            show_properties_on_click: None,
            interactive: true,
        }
    }
}

impl MapOptions {
    /// Parse options from a JSON object, as handed over by an embedding UI.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
