//! Feature ingestion: GeoJSON feature collections into immutable records.
//!
//! Each accepted feature gets a sequential id, injected into its property
//! map under [`FEATURE_ID_KEY`]. Unsupported geometry kinds are skipped
//! permissively (logged, never an error). Interior polygon rings are
//! dropped at ingestion; the render model only uses outer rings.

use crate::error::{RenderError, RenderResult};
use geojson::{GeoJson, Value};
use log::warn;
use serde_json::Map;

/// Property key injected per feature at load time.
pub const FEATURE_ID_KEY: &str = "__feature_id";

/// Raw geometry retained per feature, outer rings only.
#[derive(Debug, Clone)]
pub enum FeatureGeometry {
    /// [lon, lat]
    Point([f64; 2]),
    /// Outer ring of a single polygon
    Polygon(Vec<[f64; 2]>),
    /// Outer ring of each member polygon
    MultiPolygon(Vec<Vec<[f64; 2]>>),
}

impl FeatureGeometry {
    pub fn is_point(&self) -> bool {
        matches!(self, FeatureGeometry::Point(_))
    }

    /// Outer rings of the feature, one per member polygon.
    pub fn outer_rings(&self) -> &[Vec<[f64; 2]>] {
        match self {
            FeatureGeometry::Point(_) => &[],
            FeatureGeometry::Polygon(ring) => std::slice::from_ref(ring),
            FeatureGeometry::MultiPolygon(rings) => rings,
        }
    }
}

/// One ingested feature. Immutable after load; owned by the controller's
/// feature list and referenced by class index from Aesthetic buckets.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub id: u32,
    pub geometry: FeatureGeometry,
    pub properties: Map<String, serde_json::Value>,
}

impl FeatureRecord {
    /// Numeric attribute lookup. Numbers pass through; numeric strings
    /// parse. Anything else is None, which routes the map onto the
    /// qualitative classification path.
    pub fn numeric_attr(&self, name: &str) -> Option<f64> {
        match self.properties.get(name)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Attribute rendered as text, for qualitative classification.
    pub fn text_attr(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Parse a GeoJSON string and ingest its feature collection.
pub fn ingest_str(json: &str, max_features: Option<usize>) -> RenderResult<Vec<FeatureRecord>> {
    let geojson: GeoJson = json
        .parse()
        .map_err(|e| RenderError::upload(format!("GeoJSON parse failed: {e}")))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        other => {
            return Err(RenderError::upload(format!(
                "Expected a FeatureCollection, got {other:?}"
            )))
        }
    };

    ingest(collection, max_features)
}

/// Ingest a parsed feature collection, assigning sequential ids and
/// injecting the unique-id property. Capped at `max_features` when set.
pub fn ingest(
    collection: geojson::FeatureCollection,
    max_features: Option<usize>,
) -> RenderResult<Vec<FeatureRecord>> {
    let total = collection.features.len();
    let mut records = Vec::with_capacity(total.min(max_features.unwrap_or(total)));

    for feature in collection.features {
        if let Some(cap) = max_features {
            if records.len() >= cap {
                warn!("Feature cap {cap} reached; ignoring {} remaining features", total - cap);
                break;
            }
        }

        let geometry = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(coords)) => match point_coords(coords) {
                Some(p) => FeatureGeometry::Point(p),
                None => {
                    warn!("Skipping Point with malformed coordinates");
                    continue;
                }
            },
            Some(Value::Polygon(rings)) => match outer_ring(rings) {
                Some(ring) => FeatureGeometry::Polygon(ring),
                None => {
                    warn!("Skipping Polygon without a usable outer ring");
                    continue;
                }
            },
            Some(Value::MultiPolygon(polygons)) => {
                let rings: Vec<Vec<[f64; 2]>> =
                    polygons.iter().filter_map(|p| outer_ring(p)).collect();
                if rings.is_empty() {
                    warn!("Skipping MultiPolygon without usable outer rings");
                    continue;
                }
                FeatureGeometry::MultiPolygon(rings)
            }
            Some(other) => {
                warn!("Skipping unsupported geometry kind: {}", other.type_name());
                continue;
            }
            None => {
                warn!("Skipping feature without geometry");
                continue;
            }
        };

        let id = records.len() as u32;
        let mut properties = feature.properties.unwrap_or_default();
        properties.insert(FEATURE_ID_KEY.to_string(), serde_json::Value::from(id));

        records.push(FeatureRecord { id, geometry, properties });
    }

    Ok(records)
}

fn point_coords(coords: &[f64]) -> Option<[f64; 2]> {
    if coords.len() >= 2 && coords[0].is_finite() && coords[1].is_finite() {
        Some([coords[0], coords[1]])
    } else {
        None
    }
}

/// First ring of a GeoJSON polygon; interior rings are discarded.
fn outer_ring(rings: &[Vec<Vec<f64>>]) -> Option<Vec<[f64; 2]>> {
    let ring = rings.first()?;
    if ring.len() < 3 {
        return None;
    }
    let converted: Vec<[f64; 2]> = ring.iter().filter_map(|c| point_coords(c)).collect();
    if converted.len() < 3 {
        None
    } else {
        Some(converted)
    }
}
