//! GPU-drawn thematic map layers over an external basemap.
//!
//! Renders classified vector data (choropleth, dot, change,
//! proportional-symbol and chorochromatic maps) as a transparent overlay
//! aligned with a pannable, zoomable Web Mercator background map. The
//! basemap itself is never drawn here; an adapter implementing
//! [`provider::BasemapProvider`] supplies the viewport and forwards
//! pan/zoom/click events to the [`map::MapController`].
//!
//! The pipeline is split at the [`render::RenderTarget`] seam: everything
//! up to the draw calls (ingestion, classification, triangulation,
//! spatial indexing) is plain CPU work, and the wgpu implementation in
//! [`render::WgpuTarget`] is one swappable backend.

pub mod aesthetic;
pub mod classify;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod map;
pub mod projection;
pub mod provider;
pub mod render;
pub mod spatial;

pub use error::{RenderError, RenderResult};
pub use map::options::MapOptions;
pub use map::variant::MapKind;
pub use map::{Lifecycle, MapController, MapRegistry};
pub use provider::{BasemapProvider, FixedViewport};
pub use render::{RenderTarget, WgpuTarget};
