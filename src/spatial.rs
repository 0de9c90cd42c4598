//! Spatial indices for click resolution.
//!
//! Two independent structures built once after all features load: a point
//! nearest-neighbor index and a polygon containment index, both keyed by
//! raw lon/lat coordinates. A map variant only ever queries the index
//! matching its geometry kind.

use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject, AABB};

type PointEntry = GeomWithData<[f64; 2], u32>;

/// Maximum accepted click distance in degrees for a given zoom level.
///
/// A fixed pixel tolerance corresponds to a geographic radius that shrinks
/// geometrically as the view zooms in.
pub fn click_radius(zoom: f64) -> f64 {
    128.0 / 4f64.powf(zoom)
}

/// Nearest-neighbor index over point features, keyed by squared Euclidean
/// distance in (lon, lat) space.
pub struct PointIndex {
    tree: RTree<PointEntry>,
}

impl PointIndex {
    /// Bulk-load from (lon, lat, feature id) triples.
    pub fn build(points: impl IntoIterator<Item = (f64, f64, u32)>) -> Self {
        let entries: Vec<PointEntry> = points
            .into_iter()
            .map(|(lon, lat, id)| PointEntry::new([lon, lat], id))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// The feature nearest to the click, or None when nothing falls
    /// within the zoom-dependent search radius.
    pub fn nearest(&self, lon: f64, lat: f64, zoom: f64) -> Option<u32> {
        let radius = click_radius(zoom);
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[lon, lat])
            .next()
            .filter(|&(_, distance_2)| distance_2 <= radius * radius)
            .map(|(entry, _)| entry.data)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// One indexed outer ring. MultiPolygon features contribute one entry per
/// member, all back-referencing the same feature id.
pub struct RingEntry {
    pub feature: u32,
    ring: Vec<[f64; 2]>,
    bounds: [f64; 4],
}

impl RingEntry {
    pub fn new(feature: u32, ring: Vec<[f64; 2]>) -> Self {
        let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for v in &ring {
            bounds[0] = bounds[0].min(v[0]);
            bounds[1] = bounds[1].min(v[1]);
            bounds[2] = bounds[2].max(v[0]);
            bounds[3] = bounds[3].max(v[1]);
        }
        Self { feature, ring, bounds }
    }
}

impl RTreeObject for RingEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.bounds[0], self.bounds[1]], [self.bounds[2], self.bounds[3]])
    }
}

/// Bounding-box accelerated polygon containment index.
pub struct PolygonIndex {
    tree: RTree<RingEntry>,
}

impl PolygonIndex {
    pub fn build(rings: impl IntoIterator<Item = (u32, Vec<[f64; 2]>)>) -> Self {
        let entries: Vec<RingEntry> = rings
            .into_iter()
            .map(|(feature, ring)| RingEntry::new(feature, ring))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// The first polygon whose outer ring contains the query point.
    /// When overlapping polygons cover the point, the winner is whichever
    /// candidate the envelope query yields first.
    pub fn containing(&self, lon: f64, lat: f64) -> Option<u32> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .find(|entry| point_in_ring(&entry.ring, lon, lat))
            .map(|entry| entry.feature)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Ray-casting point-in-ring test.
fn point_in_ring(ring: &[[f64; 2]], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
