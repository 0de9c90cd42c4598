//! Basemap provider capability.
//!
//! The controller never talks to a concrete map provider; any adapter
//! exposing the viewport geometry below can drive the renderer. Event
//! wiring is inverted: adapters call `MapController::on_view_change` and
//! `MapController::on_click` from their own pan/zoom/click hooks.

/// Viewport geometry of the external background map.
pub trait BasemapProvider {
    /// Current zoom level
    fn zoom(&self) -> f64;
    /// Center longitude in degrees
    fn center_lng(&self) -> f64;
    /// Center latitude in degrees
    fn center_lat(&self) -> f64;
    /// Canvas width in pixels
    fn width(&self) -> u32;
    /// Canvas height in pixels
    fn height(&self) -> u32;
}

/// A plain in-memory viewport. Useful for adapters that poll their
/// provider into a snapshot, and for tests.
#[derive(Debug, Clone)]
pub struct FixedViewport {
    pub center_lng: f64,
    pub center_lat: f64,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
}

impl FixedViewport {
    pub fn new(center_lng: f64, center_lat: f64, zoom: f64, width: u32, height: u32) -> Self {
        Self { center_lng, center_lat, zoom, width, height }
    }

    /// Whole-world view centered on the equator.
    pub fn world(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, 0.0, width, height)
    }

    pub fn pan_to(&mut self, center_lng: f64, center_lat: f64) {
        self.center_lng = center_lng;
        self.center_lat = center_lat;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }
}

impl BasemapProvider for FixedViewport {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn center_lng(&self) -> f64 {
        self.center_lng
    }

    fn center_lat(&self) -> f64 {
        self.center_lat
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}
