//! Geometry preprocessing: outer-ring triangulation and vertex extraction.
//!
//! Polygons are decomposed by ear clipping over the outer ring only.
//! Interior rings (holes) are intentionally not subtracted; this is an
//! inherited simplification of the rendering model, not a hole-aware
//! tessellation. Coordinates stay in lon/lat degrees throughout; the
//! projection happens per vertex at draw time.

use crate::error::{RenderError, RenderResult};

/// A triangulated outer ring: flattened lon/lat vertices plus triangle
/// index triples referencing them.
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Interleaved [lon, lat] pairs, 2 f32 per vertex
    pub vertices: Vec<f32>,
    /// Triangle index triples into `vertices`
    pub indices: Vec<u32>,
}

impl Triangulation {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Triangulate a simple polygon's outer ring by ear clipping.
///
/// Produces exactly N-2 triangles for an N-vertex ring (after dropping the
/// GeoJSON closing duplicate). Both winding orders are accepted. Holes are
/// not subtracted.
pub fn triangulate(ring: &[[f64; 2]]) -> RenderResult<Triangulation> {
    let ring = open_ring(ring);
    let n = ring.len();
    if n < 3 {
        return Err(RenderError::geometry(format!(
            "Polygon ring must have at least 3 distinct vertices, got {n}"
        )));
    }

    for (i, v) in ring.iter().enumerate() {
        if !v[0].is_finite() || !v[1].is_finite() {
            return Err(RenderError::geometry(format!(
                "Ring vertex {} has non-finite coordinates: ({}, {})",
                i, v[0], v[1]
            )));
        }
    }

    let mut vertices = Vec::with_capacity(n * 2);
    for v in ring {
        vertices.push(v[0] as f32);
        vertices.push(v[1] as f32);
    }

    // Clip ears until only one triangle remains
    let ccw = signed_area(ring) >= 0.0;
    let mut remaining: Vec<u32> = (0..n as u32).collect();
    let mut indices = Vec::with_capacity((n - 2) * 3);

    while remaining.len() > 3 {
        let m = remaining.len();
        let mut clipped = false;

        for i in 0..m {
            let prev = remaining[(i + m - 1) % m];
            let cur = remaining[i];
            let next = remaining[(i + 1) % m];

            if is_ear(ring, &remaining, prev, cur, next, ccw) {
                indices.extend_from_slice(&[prev, cur, next]);
                remaining.remove(i);
                clipped = true;
                break;
            }
        }

        // Degenerate input (collinear runs, self-touching rings) may leave
        // no strict ear; clip the head anyway so the loop terminates with
        // the N-2 triangle contract intact.
        if !clipped {
            let prev = remaining[m - 1];
            let cur = remaining[0];
            let next = remaining[1];
            indices.extend_from_slice(&[prev, cur, next]);
            remaining.remove(0);
        }
    }

    indices.extend_from_slice(&[remaining[0], remaining[1], remaining[2]]);

    Ok(Triangulation { vertices, indices })
}

/// Extract a polygon border as a closed line strip: the ring vertices
/// flattened, with the first vertex re-appended to close the loop.
pub fn extract_border(ring: &[[f64; 2]]) -> RenderResult<Vec<f32>> {
    let ring = open_ring(ring);
    if ring.len() < 3 {
        return Err(RenderError::geometry(format!(
            "Border ring must have at least 3 distinct vertices, got {}",
            ring.len()
        )));
    }

    let mut border = Vec::with_capacity((ring.len() + 1) * 2);
    for v in ring {
        border.push(v[0] as f32);
        border.push(v[1] as f32);
    }
    border.push(ring[0][0] as f32);
    border.push(ring[0][1] as f32);
    Ok(border)
}

/// Flatten point coordinates into a vertex stream (2 f32 per point).
pub fn flatten_points(points: &[[f64; 2]]) -> Vec<f32> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for p in points {
        out.push(p[0] as f32);
        out.push(p[1] as f32);
    }
    out
}

/// Strip the GeoJSON closing duplicate vertex if present.
fn open_ring(ring: &[[f64; 2]]) -> &[[f64; 2]] {
    if ring.len() >= 2 && ring[0] == ring[ring.len() - 1] {
        &ring[..ring.len() - 1]
    } else {
        ring
    }
}

fn signed_area(ring: &[[f64; 2]]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        sum += a[0] * b[1] - b[0] * a[1];
    }
    sum / 2.0
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Strict point-in-triangle test; points on an edge do not count as
/// contained, so adjacent collinear vertices never block an ear.
fn point_in_triangle(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    (d1 > 0.0 && d2 > 0.0 && d3 > 0.0) || (d1 < 0.0 && d2 < 0.0 && d3 < 0.0)
}

fn is_ear(ring: &[[f64; 2]], remaining: &[u32], prev: u32, cur: u32, next: u32, ccw: bool) -> bool {
    let a = ring[prev as usize];
    let b = ring[cur as usize];
    let c = ring[next as usize];

    // Convexity with respect to the ring winding
    let turn = cross(a, b, c);
    if (ccw && turn <= 0.0) || (!ccw && turn >= 0.0) {
        return false;
    }

    // No other remaining vertex may lie inside the candidate triangle
    for &idx in remaining {
        if idx == prev || idx == cur || idx == next {
            continue;
        }
        if point_in_triangle(ring[idx as usize], a, b, c) {
            return false;
        }
    }
    true
}

/// Validate triangle indices against the vertex stream.
pub fn validate_triangulation(tri: &Triangulation) -> RenderResult<()> {
    if tri.indices.len() % 3 != 0 {
        return Err(RenderError::geometry(format!(
            "Index count {} is not divisible by 3",
            tri.indices.len()
        )));
    }
    let vertex_count = tri.vertex_count() as u32;
    for &idx in &tri.indices {
        if idx >= vertex_count {
            return Err(RenderError::geometry(format!(
                "Index {idx} exceeds vertex count {vertex_count}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]
    }

    #[test]
    fn test_square_yields_two_triangles() {
        let tri = triangulate(&square()).unwrap();
        assert_eq!(tri.vertex_count(), 4);
        assert_eq!(tri.triangle_count(), 2);
        validate_triangulation(&tri).unwrap();
    }

    #[test]
    fn test_closing_vertex_dropped() {
        let mut ring = square();
        ring.push(ring[0]);
        let tri = triangulate(&ring).unwrap();
        assert_eq!(tri.vertex_count(), 4);
        assert_eq!(tri.triangle_count(), 2);
    }

    #[test]
    fn test_concave_ring_n_minus_two() {
        // L-shaped hexagon
        let ring = vec![
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 2.0],
            [2.0, 2.0],
            [2.0, 4.0],
            [0.0, 4.0],
        ];
        let tri = triangulate(&ring).unwrap();
        assert_eq!(tri.triangle_count(), 4);
        validate_triangulation(&tri).unwrap();
    }

    #[test]
    fn test_clockwise_ring_accepted() {
        let mut ring = square();
        ring.reverse();
        let tri = triangulate(&ring).unwrap();
        assert_eq!(tri.triangle_count(), 2);
        validate_triangulation(&tri).unwrap();
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let result = triangulate(&[[0.0, 0.0], [1.0, 0.0]]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 3 distinct vertices"));
    }

    #[test]
    fn test_non_finite_vertex_rejected() {
        let result = triangulate(&[[0.0, 0.0], [f64::NAN, 0.0], [1.0, 1.0]]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("non-finite"));
    }

    #[test]
    fn test_border_closes_loop() {
        let border = extract_border(&square()).unwrap();
        assert_eq!(border.len(), 10); // 4 vertices + closing vertex, 2 f32 each
        assert_eq!(&border[0..2], &border[8..10]);
    }

    #[test]
    fn test_large_ring_triangle_count() {
        // Regular 16-gon
        let ring: Vec<[f64; 2]> = (0..16)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 16.0;
                [a.cos() * 5.0, a.sin() * 5.0]
            })
            .collect();
        let tri = triangulate(&ring).unwrap();
        assert_eq!(tri.triangle_count(), 14);
        validate_triangulation(&tri).unwrap();
    }
}
