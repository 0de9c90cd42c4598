//! Web Mercator projection state, rebuilt from the basemap viewport on
//! every frame.
//!
//! Only the linear terms (longitude scale and the pixel translation) are
//! folded into a 3x3 matrix on the host. The nonlinear Mercator latitude
//! term is computed per vertex in the shading stage: vertex buffers hold
//! raw lon/lat degrees, so a pan or zoom never touches them — the cost of
//! a view change is one matrix upload, not an O(features) reprojection
//! pass.

use glam::{Mat3, Vec3};
use std::f64::consts::PI;

/// Per-frame projection parameters. Derived, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionState {
    /// Mercator world scale: (tile_size / 2 / pi) * 2^zoom
    pub scale: f64,
    /// Pixel translation placing the view center at the canvas center
    pub offset_x: f64,
    pub offset_y: f64,
    /// Canvas size in pixels
    pub width: u32,
    pub height: u32,
}

impl ProjectionState {
    pub fn new(
        center_lng: f64,
        center_lat: f64,
        zoom: f64,
        tile_size: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let scale = tile_size / 2.0 / PI * 2f64.powf(zoom);
        let lambda = center_lng * PI / 180.0;
        let x_center = scale * (lambda + PI);
        let y_center = scale * mercator_y(center_lat);

        Self {
            scale,
            offset_x: width as f64 / 2.0 - x_center,
            offset_y: height as f64 / 2.0 - y_center,
            width,
            height,
        }
    }

    /// Project lon/lat degrees to canvas pixels. Host-side mirror of the
    /// shader path, used for tests and pinned regression values.
    pub fn project(&self, lng: f64, lat: f64) -> (f64, f64) {
        let x = self.scale * (lng * PI / 180.0 + PI) + self.offset_x;
        let y = self.scale * mercator_y(lat) + self.offset_y;
        (x, y)
    }

    /// The 3x3 matrix mapping (lon_degrees, mercator_y(lat), 1) straight
    /// to clip space.
    pub fn clip_matrix(&self) -> Mat3 {
        let w = self.width as f64;
        let h = self.height as f64;

        let sx = 2.0 * self.scale * (PI / 180.0) / w;
        let tx = 2.0 * (self.scale * PI + self.offset_x) / w - 1.0;
        let sy = -2.0 * self.scale / h;
        let ty = 1.0 - 2.0 * self.offset_y / h;

        Mat3::from_cols(
            Vec3::new(sx as f32, 0.0, 0.0),
            Vec3::new(0.0, sy as f32, 0.0),
            Vec3::new(tx as f32, ty as f32, 1.0),
        )
    }
}

/// The nonlinear Mercator term: pi - ln(tan(pi/4 + phi/2)).
///
/// The WGSL shaders evaluate the same expression per vertex.
pub fn mercator_y(lat_deg: f64) -> f64 {
    let phi = lat_deg * PI / 180.0;
    PI - (PI / 4.0 + phi / 2.0).tan().ln()
}
