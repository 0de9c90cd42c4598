//! Map variants as a closed sum type.
//!
//! Each variant supplies its own option defaults, default color ramp and
//! draw policy; dispatch is by match, not open-ended inheritance.

use crate::error::{RenderError, RenderResult};
use crate::map::options::MapOptions;

/// Categorical cycle used by chorochromatic maps.
const CATEGORICAL_CYCLE: [[f32; 3]; 12] = [
    [0.65, 0.81, 0.89],
    [0.12, 0.47, 0.71],
    [0.70, 0.87, 0.54],
    [0.20, 0.63, 0.17],
    [0.98, 0.60, 0.60],
    [0.89, 0.10, 0.11],
    [0.99, 0.75, 0.44],
    [1.00, 0.50, 0.00],
    [0.79, 0.70, 0.84],
    [0.42, 0.24, 0.60],
    [1.00, 1.00, 0.60],
    [0.69, 0.35, 0.16],
];

/// Diverging ramp for change maps: losses in red, the near-zero band in
/// neutral grey, gains in blue.
const DIVERGING_7: [[f32; 3]; 7] = [
    [0.70, 0.09, 0.17],
    [0.94, 0.54, 0.38],
    [0.99, 0.86, 0.78],
    [0.88, 0.88, 0.88],
    [0.82, 0.90, 0.94],
    [0.40, 0.66, 0.81],
    [0.13, 0.40, 0.67],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    Choropleth,
    DotMap,
    ChangeMap,
    ProportionalSymbols,
    Chorochromatic,
}

impl MapKind {
    /// Resolve a variant by name. An unknown name is a programming
    /// contract failure, reported with the missing operation.
    pub fn parse(name: &str) -> RenderResult<Self> {
        match name {
            "choropleth" => Ok(MapKind::Choropleth),
            "dot" => Ok(MapKind::DotMap),
            "change" => Ok(MapKind::ChangeMap),
            "proportional-symbols" => Ok(MapKind::ProportionalSymbols),
            "chorochromatic" => Ok(MapKind::Chorochromatic),
            other => Err(RenderError::unimplemented(&format!(
                "map variant '{other}'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MapKind::Choropleth => "choropleth",
            MapKind::DotMap => "dot",
            MapKind::ChangeMap => "change",
            MapKind::ProportionalSymbols => "proportional-symbols",
            MapKind::Chorochromatic => "chorochromatic",
        }
    }

    /// Variant-specific option defaults, applied before user options.
    pub fn defaults(&self) -> MapOptions {
        let mut options = MapOptions::default();
        match self {
            MapKind::Choropleth => {}
            MapKind::DotMap => {
                options.alpha = 0.6;
            }
            MapKind::ChangeMap => {
                options.number_of_classes = 7;
            }
            MapKind::ProportionalSymbols => {
                // Per-feature symbol sizes need per-feature buffers
                options.is_dynamic = true;
                options.alpha = 0.6;
            }
            MapKind::Chorochromatic => {}
        }
        options
    }

    /// Default color ramp for `class_count` classes, used when no
    /// explicit color scheme is configured.
    pub fn default_colors(&self, class_count: usize) -> Vec<[f32; 4]> {
        match self {
            MapKind::ChangeMap => (0..class_count)
                .map(|i| {
                    let idx = if class_count <= 1 {
                        DIVERGING_7.len() / 2
                    } else {
                        (i * (DIVERGING_7.len() - 1) / (class_count - 1)).min(DIVERGING_7.len() - 1)
                    };
                    let [r, g, b] = DIVERGING_7[idx];
                    [r, g, b, 1.0]
                })
                .collect(),
            MapKind::Chorochromatic => (0..class_count)
                .map(|i| {
                    let [r, g, b] = CATEGORICAL_CYCLE[i % CATEGORICAL_CYCLE.len()];
                    [r, g, b, 1.0]
                })
                .collect(),
            _ => sequential_ramp(class_count),
        }
    }

    /// Point variants draw sprites; polygon variants draw fills + borders.
    pub fn is_point_kind(&self) -> bool {
        matches!(self, MapKind::DotMap | MapKind::ProportionalSymbols)
    }

    /// Chorochromatic maps always classify qualitatively.
    pub fn is_qualitative(&self) -> bool {
        matches!(self, MapKind::Chorochromatic)
    }

    /// Change maps derive their value as minuend - subtrahend and use the
    /// fixed symmetric break set.
    pub fn is_change(&self) -> bool {
        matches!(self, MapKind::ChangeMap)
    }
}

/// Light-to-dark sequential blues, interpolated over the class count.
fn sequential_ramp(class_count: usize) -> Vec<[f32; 4]> {
    let light = [0.87, 0.92, 0.97];
    let dark = [0.03, 0.19, 0.42];
    (0..class_count)
        .map(|i| {
            let t = if class_count <= 1 {
                1.0
            } else {
                i as f32 / (class_count - 1) as f32
            };
            [
                light[0] + (dark[0] - light[0]) * t,
                light[1] + (dark[1] - light[1]) * t,
                light[2] + (dark[2] - light[2]) * t,
                1.0,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_variants() {
        assert_eq!(MapKind::parse("choropleth").unwrap(), MapKind::Choropleth);
        assert_eq!(MapKind::parse("dot").unwrap(), MapKind::DotMap);
        assert_eq!(
            MapKind::parse("proportional-symbols").unwrap(),
            MapKind::ProportionalSymbols
        );
    }

    #[test]
    fn test_parse_unknown_variant_names_operation() {
        let err = MapKind::parse("cartogram").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Not implemented"));
        assert!(message.contains("cartogram"));
    }

    #[test]
    fn test_sequential_ramp_darkens() {
        let colors = MapKind::Choropleth.default_colors(5);
        assert_eq!(colors.len(), 5);
        // Later classes are darker
        assert!(colors[4][2] < colors[0][2]);
    }

    #[test]
    fn test_change_map_default_class_count() {
        assert_eq!(MapKind::ChangeMap.defaults().number_of_classes, 7);
        let colors = MapKind::ChangeMap.default_colors(7);
        assert_eq!(colors.len(), 7);
        // Diverging ramp: red end, blue end
        assert!(colors[0][0] > colors[0][2]);
        assert!(colors[6][2] > colors[6][0]);
    }

    #[test]
    fn test_categorical_cycle_wraps() {
        let colors = MapKind::Chorochromatic.default_colors(15);
        assert_eq!(colors.len(), 15);
        assert_eq!(colors[0], colors[12]);
    }

    #[test]
    fn test_proportional_symbols_dynamic_by_default() {
        assert!(MapKind::ProportionalSymbols.defaults().is_dynamic);
        assert!(!MapKind::Choropleth.defaults().is_dynamic);
    }
}
