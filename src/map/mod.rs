//! Map controller: orchestrates classification, preprocessing, drawing
//! and click resolution across the map lifecycle.
//!
//! The lifecycle is two-phase: construction ingests the feature
//! collection and enters `Preprocessing`; the caller then schedules
//! `start()` (immediately, on a task queue, wherever), which runs the
//! heavy work to completion and leaves the controller `Ready`. `Ready`
//! is terminal and re-entrant: every view change triggers a full
//! repaint, every click exactly one spatial-index query.

pub mod options;
pub mod variant;

use crate::aesthetic::{assign_classes, Aesthetic, AttrValue, ValueDescriptor};
use crate::classify::{change_breaks, class_breaks, discrete_classes, ClassBreakSet, ClassBreaksMethod};
use crate::error::{RenderError, RenderResult};
use crate::feature::{FeatureRecord, FeatureGeometry, FEATURE_ID_KEY};
use crate::geometry::{extract_border, flatten_points, triangulate};
use crate::projection::ProjectionState;
use crate::provider::BasemapProvider;
use crate::render::{RenderBuffer, RenderTarget};
use crate::spatial::{PointIndex, PolygonIndex};
use log::{debug, info, warn};
use self::options::MapOptions;
use self::variant::MapKind;
use serde_json::Map as JsonMap;

/// Explicit registry context for map identifiers; owned by the embedding
/// facade and passed to each controller at construction.
#[derive(Debug, Default)]
pub struct MapRegistry {
    next_id: u32,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Controller lifecycle. `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Preprocessing,
    Ready,
}

/// User callback invoked with the matched feature's properties.
pub type ClickCallback = Box<dyn Fn(&JsonMap<String, serde_json::Value>)>;

/// Polygon border color shared by all polygon variants.
const BORDER_COLOR: [f32; 4] = [0.25, 0.25, 0.25, 1.0];

enum ValuePath {
    Quantitative(Vec<Option<f64>>),
    Qualitative(Vec<Option<String>>),
}

pub struct MapController<T: RenderTarget, P: BasemapProvider> {
    id: u32,
    kind: MapKind,
    options: MapOptions,
    target: T,
    provider: P,
    features: Vec<FeatureRecord>,
    aesthetics: Vec<Aesthetic>,
    point_index: Option<PointIndex>,
    polygon_index: Option<PolygonIndex>,
    observed_min: Option<f64>,
    observed_max: Option<f64>,
    state: Lifecycle,
    click_callback: Option<ClickCallback>,
}

impl<T: RenderTarget, P: BasemapProvider> MapController<T, P> {
    /// Construct a controller over a GeoJSON feature collection.
    /// Ingestion happens here; the heavy preprocessing is deferred to
    /// [`start`](Self::start).
    pub fn new(
        registry: &mut MapRegistry,
        kind: MapKind,
        geojson: &str,
        options: MapOptions,
        target: T,
        provider: P,
    ) -> RenderResult<Self> {
        let features = crate::feature::ingest_str(geojson, options.max_features)?;
        debug!(
            "map {}: ingested {} features for a {} map",
            registry.next_id,
            features.len(),
            kind.name()
        );

        Ok(Self {
            id: registry.allocate(),
            kind,
            options,
            target,
            provider,
            features,
            aesthetics: Vec::new(),
            point_index: None,
            polygon_index: None,
            observed_min: None,
            observed_max: None,
            state: Lifecycle::Preprocessing,
            click_callback: None,
        })
    }

    /// Run the preprocessing phase: classify, triangulate, build the
    /// spatial index, draw the first frame. Runs to completion
    /// synchronously; uninterruptible once started.
    pub fn start(&mut self) -> RenderResult<()> {
        if self.state == Lifecycle::Ready {
            return Err(RenderError::render("Map already started"));
        }

        let values = self.resolve_values()?;
        self.build_aesthetics(&values)?;
        self.build_buffers(&values)?;
        self.build_index();
        self.render_frame()?;

        self.state = Lifecycle::Ready;
        info!(
            "map {}: ready with {} classes over {} features",
            self.id,
            self.aesthetics.len(),
            self.features.len()
        );
        Ok(())
    }

    // ---------- classification ----------

    /// Resolve one classification value per feature and pick the path.
    /// All-numeric samples classify quantitatively; an absent or
    /// non-numeric attribute anywhere routes the map onto the
    /// qualitative path. Change maps are numeric by construction.
    fn resolve_values(&self) -> RenderResult<ValuePath> {
        if self.kind.is_change() {
            let minuend = self.options.minuend.as_deref().ok_or_else(|| {
                RenderError::classify("Change map requires a minuend attribute")
            })?;
            let subtrahend = self.options.subtrahend.as_deref().ok_or_else(|| {
                RenderError::classify("Change map requires a subtrahend attribute")
            })?;
            let values = self
                .features
                .iter()
                .map(|f| {
                    Some(f.numeric_attr(minuend)? - f.numeric_attr(subtrahend)?)
                })
                .collect();
            return Ok(ValuePath::Quantitative(values));
        }

        let attr = self.options.attr.as_deref().ok_or_else(|| {
            RenderError::classify("No classification attribute configured")
        })?;

        let numeric: Vec<Option<f64>> =
            self.features.iter().map(|f| f.numeric_attr(attr)).collect();

        let quantitative = !self.kind.is_qualitative()
            && !numeric.is_empty()
            && numeric.iter().all(|v| v.is_some());

        if quantitative {
            Ok(ValuePath::Quantitative(numeric))
        } else {
            let texts: Vec<Option<String>> =
                self.features.iter().map(|f| f.text_attr(attr)).collect();
            if texts.iter().all(|t| t.is_none()) {
                return Err(RenderError::classify(format!(
                    "Attribute '{attr}' is missing from every feature"
                )));
            }
            Ok(ValuePath::Qualitative(texts))
        }
    }

    fn build_aesthetics(&mut self, values: &ValuePath) -> RenderResult<()> {
        let attr = self.attr_label();

        match values {
            ValuePath::Quantitative(values) => {
                let sample: Vec<f64> = values.iter().flatten().copied().collect();
                let breaks = self.quantitative_breaks(&sample)?;
                self.observed_min = sample.iter().copied().reduce(f64::min);
                self.observed_max = sample.iter().copied().reduce(f64::max);

                let colors = self.class_colors(breaks.class_count());
                let stroke = (!self.kind.is_point_kind()).then_some(BORDER_COLOR);

                self.aesthetics = (0..breaks.class_count())
                    .map(|i| {
                        let (lo, hi, closed_hi) = breaks.range(i);
                        Aesthetic::new(
                            i,
                            attr.clone(),
                            colors[i % colors.len()],
                            stroke,
                            self.class_point_size(lo, hi),
                            ValueDescriptor::Range { lo, hi, closed_hi },
                        )
                    })
                    .collect();
            }
            ValuePath::Qualitative(values) => {
                let present: Vec<&str> =
                    values.iter().flatten().map(String::as_str).collect();
                let classes = discrete_classes(&present);
                if classes.is_empty() {
                    return Err(RenderError::classify("No values to classify"));
                }

                let colors = self.class_colors(classes.len());
                let stroke = (!self.kind.is_point_kind()).then_some(BORDER_COLOR);
                let point_size = self
                    .kind
                    .is_point_kind()
                    .then_some(self.options.min_point_size);

                self.aesthetics = classes
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| {
                        Aesthetic::new(
                            i,
                            attr.clone(),
                            colors[i % colors.len()],
                            stroke,
                            point_size,
                            ValueDescriptor::Discrete(value),
                        )
                    })
                    .collect();
            }
        }
        Ok(())
    }

    fn quantitative_breaks(&self, sample: &[f64]) -> RenderResult<ClassBreakSet> {
        if let Some(explicit) = &self.options.class_breaks {
            return ClassBreakSet::from_explicit(explicit.clone());
        }
        if self.kind.is_change() {
            let min = sample.iter().copied().reduce(f64::min).unwrap_or(f64::NAN);
            let max = sample.iter().copied().reduce(f64::max).unwrap_or(f64::NAN);
            return change_breaks(min, max);
        }
        class_breaks(
            sample,
            ClassBreaksMethod::parse(&self.options.class_breaks_method),
            self.options.number_of_classes,
        )
    }

    fn class_colors(&self, class_count: usize) -> Vec<[f32; 4]> {
        let mut colors = match &self.options.color_scheme {
            Some(scheme) if !scheme.is_empty() => scheme.clone(),
            _ => self.kind.default_colors(class_count),
        };
        for color in &mut colors {
            color[3] *= self.options.alpha;
        }
        colors
    }

    /// Class-level point size: fixed for dot maps, range-midpoint
    /// interpolation for proportional symbols (dynamic mode refines this
    /// per feature).
    fn class_point_size(&self, lo: f64, hi: f64) -> Option<f32> {
        if !self.kind.is_point_kind() {
            return None;
        }
        if self.kind == MapKind::ProportionalSymbols {
            Some(self.symbol_size((lo + hi) / 2.0))
        } else {
            Some(self.options.min_point_size)
        }
    }

    fn attr_label(&self) -> String {
        if self.kind.is_change() {
            format!(
                "{} - {}",
                self.options.minuend.as_deref().unwrap_or(""),
                self.options.subtrahend.as_deref().unwrap_or("")
            )
        } else {
            self.options.attr.clone().unwrap_or_default()
        }
    }

    // ---------- geometry & buffers ----------

    fn build_buffers(&mut self, values: &ValuePath) -> RenderResult<()> {
        // Grouped mode accumulates one merged point stream per class
        let mut grouped: Vec<Vec<f32>> = vec![Vec::new(); self.aesthetics.len()];

        for idx in 0..self.features.len() {
            let Some(value) = self.feature_value(values, idx) else {
                debug!("feature {idx}: no classification value, left undrawn");
                continue;
            };
            let classes = assign_classes(&self.aesthetics, &value);
            if classes.is_empty() {
                debug!("feature {idx}: value outside all class ranges");
                continue;
            }

            if self.kind.is_point_kind() {
                self.attach_point_feature(idx, &value, &classes, &mut grouped)?;
            } else {
                self.attach_polygon_feature(idx, &classes)?;
            }
        }

        if self.kind.is_point_kind() && !self.options.is_dynamic {
            for (class, stream) in grouped.into_iter().enumerate() {
                if stream.is_empty() {
                    continue;
                }
                let count = (stream.len() / 2) as u32;
                let vertices = self.target.create_vertex_buffer(&stream)?;
                self.aesthetics[class].set_grouped(RenderBuffer::strip(vertices, count));
            }
        }
        Ok(())
    }

    fn feature_value(&self, values: &ValuePath, idx: usize) -> Option<AttrValue> {
        match values {
            ValuePath::Quantitative(v) => v[idx].map(AttrValue::Number),
            ValuePath::Qualitative(v) => v[idx].clone().map(AttrValue::Text),
        }
    }

    fn attach_polygon_feature(&mut self, idx: usize, classes: &[usize]) -> RenderResult<()> {
        let feature = &self.features[idx];
        let id = feature.id;

        if feature.geometry.is_point() {
            warn!("feature {id}: point geometry in a polygon map variant, skipped");
            return Ok(());
        }

        // One (fill, border) buffer pair per member polygon, per class
        let rings = feature.geometry.outer_rings().to_vec();
        for ring in &rings {
            let tri = match triangulate(ring) {
                Ok(tri) => tri,
                Err(e) => {
                    warn!("feature {id}: triangulation failed, member skipped: {e}");
                    continue;
                }
            };
            let border = extract_border(ring)?;

            for &class in classes {
                let fill_vertices = self.target.create_vertex_buffer(&tri.vertices)?;
                let fill_indices = self.target.create_index_buffer(&tri.indices)?;
                let border_vertices = self.target.create_vertex_buffer(&border)?;

                self.aesthetics[class].add_polygon_feature(
                    id,
                    RenderBuffer::triangles(fill_vertices, fill_indices, tri.indices.len() as u32),
                    RenderBuffer::strip(border_vertices, (border.len() / 2) as u32),
                );
            }
        }
        Ok(())
    }

    fn attach_point_feature(
        &mut self,
        idx: usize,
        value: &AttrValue,
        classes: &[usize],
        grouped: &mut [Vec<f32>],
    ) -> RenderResult<()> {
        let feature = &self.features[idx];
        let id = feature.id;
        let FeatureGeometry::Point(position) = feature.geometry else {
            warn!("feature {id}: non-point geometry in a point map variant, skipped");
            return Ok(());
        };

        let size = match value {
            AttrValue::Number(v) if self.kind == MapKind::ProportionalSymbols => {
                self.symbol_size(*v)
            }
            _ => self.options.min_point_size,
        };

        if self.options.is_dynamic {
            let stream = flatten_points(&[position]);
            for &class in classes {
                let vertices = self.target.create_vertex_buffer(&stream)?;
                self.aesthetics[class].add_point_feature(
                    id,
                    RenderBuffer::strip(vertices, 1),
                    size,
                );
            }
        } else {
            for &class in classes {
                grouped[class].push(position[0] as f32);
                grouped[class].push(position[1] as f32);
            }
        }
        Ok(())
    }

    /// Linear symbol-size interpolation over the observed value range.
    fn symbol_size(&self, value: f64) -> f32 {
        let (min_size, max_size) = (self.options.min_point_size, self.options.max_point_size);
        match (self.observed_min, self.observed_max) {
            (Some(lo), Some(hi)) if hi > lo => {
                let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0) as f32;
                min_size + (max_size - min_size) * t
            }
            _ => min_size,
        }
    }

    // ---------- spatial index ----------

    fn build_index(&mut self) {
        if self.kind.is_point_kind() {
            self.point_index = Some(PointIndex::build(self.features.iter().filter_map(
                |f| match f.geometry {
                    FeatureGeometry::Point([lon, lat]) => Some((lon, lat, f.id)),
                    _ => None,
                },
            )));
        } else {
            self.polygon_index = Some(PolygonIndex::build(
                self.features.iter().flat_map(|f| {
                    f.geometry
                        .outer_rings()
                        .iter()
                        .map(move |ring| (f.id, ring.clone()))
                }),
            ));
        }
    }

    // ---------- drawing ----------

    /// Full repaint; the legend calls this after toggling a class.
    pub fn draw(&mut self) -> RenderResult<()> {
        if self.state != Lifecycle::Ready {
            return Err(RenderError::render("Map is not ready to draw"));
        }
        self.render_frame()
    }

    fn render_frame(&mut self) -> RenderResult<()> {
        let projection = ProjectionState::new(
            self.provider.center_lng(),
            self.provider.center_lat(),
            self.provider.zoom(),
            self.options.tile_size,
            self.provider.width(),
            self.provider.height(),
        );
        self.target.begin_frame(&projection)?;

        // Interiors first, borders on top, in class order; later classes
        // draw over earlier ones.
        for aesthetic in self.aesthetics.iter().filter(|a| a.enabled()) {
            for mesh in aesthetic.meshes() {
                self.target.draw_triangles(&mesh.fill, aesthetic.fill())?;
            }
        }
        for aesthetic in self.aesthetics.iter().filter(|a| a.enabled()) {
            if let Some(stroke) = aesthetic.stroke() {
                for mesh in aesthetic.meshes() {
                    self.target.draw_line_strip(&mesh.border, stroke)?;
                }
            }
        }
        for aesthetic in self.aesthetics.iter().filter(|a| a.enabled()) {
            let fallback = self.options.min_point_size;
            if let Some(buffer) = aesthetic.grouped() {
                let size = aesthetic.point_size().unwrap_or(fallback);
                self.target.draw_points(buffer, aesthetic.fill(), size)?;
            }
            for point in aesthetic.points() {
                self.target
                    .draw_points(&point.buffer, aesthetic.fill(), point.size)?;
            }
        }

        self.target.end_frame()
    }

    // ---------- external notifications ----------

    /// Pan/zoom notification from the basemap adapter: full repaint.
    pub fn on_view_change(&mut self) -> RenderResult<()> {
        if self.state != Lifecycle::Ready {
            debug!("map {}: view change before ready, ignored", self.id);
            return Ok(());
        }
        self.render_frame()
    }

    /// Click notification: exactly one spatial-index query against the
    /// index matching this variant's geometry kind. On a hit the
    /// built-in alert (gated by `interactive`) and the user callback run
    /// with the feature's properties.
    pub fn on_click(&self, lon: f64, lat: f64) -> Option<&JsonMap<String, serde_json::Value>> {
        let id = if self.kind.is_point_kind() {
            self.point_index
                .as_ref()?
                .nearest(lon, lat, self.provider.zoom())?
        } else {
            self.polygon_index.as_ref()?.containing(lon, lat)?
        };

        let properties = &self.features.get(id as usize)?.properties;

        if self.options.interactive {
            info!(
                "map {}: clicked feature {id}: {}",
                self.id,
                click_summary(properties, self.options.show_properties_on_click.as_deref())
            );
        }
        if let Some(callback) = &self.click_callback {
            callback(properties);
        }
        Some(properties)
    }

    /// Register the user click callback (`mapOnClickFunction`).
    pub fn set_click_callback(&mut self, callback: ClickCallback) {
        self.click_callback = Some(callback);
    }

    // ---------- legend surface ----------

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn features(&self) -> &[FeatureRecord] {
        &self.features
    }

    pub fn aesthetics(&self) -> &[Aesthetic] {
        &self.aesthetics
    }

    /// Observed value extremes (quantitative maps only).
    pub fn min_value(&self) -> Option<f64> {
        self.observed_min
    }

    pub fn max_value(&self) -> Option<f64> {
        self.observed_max
    }

    /// Legend show/hide toggle for one class. The legend follows up with
    /// [`draw`](Self::draw).
    pub fn toggle_class(&mut self, class: usize) -> RenderResult<()> {
        let aesthetic = self.aesthetics.get_mut(class).ok_or_else(|| {
            RenderError::render(format!("No class {class} to toggle"))
        })?;
        aesthetic.toggle();
        Ok(())
    }

    /// Render target access, e.g. for pixel readback on offscreen targets.
    pub fn target(&self) -> &T {
        &self.target
    }
}

/// Human-readable property summary for the built-in click alert.
/// An allowlist restricts the output; otherwise everything except the
/// injected id is shown.
fn click_summary(
    properties: &JsonMap<String, serde_json::Value>,
    allowlist: Option<&[String]>,
) -> String {
    let entries: Vec<String> = match allowlist {
        Some(keys) => keys
            .iter()
            .filter_map(|k| properties.get(k).map(|v| format!("{k}: {v}")))
            .collect(),
        None => properties
            .iter()
            .filter(|(k, _)| k.as_str() != FEATURE_ID_KEY)
            .map(|(k, v)| format!("{k}: {v}"))
            .collect(),
    };
    entries.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixedViewport;

    /// Records draw calls instead of touching a GPU.
    #[derive(Default)]
    struct RecordingTarget {
        next_buffer: u32,
        frames: u32,
        triangles: u32,
        strips: u32,
        points: Vec<f32>,
        open: bool,
    }

    impl RenderTarget for RecordingTarget {
        fn create_vertex_buffer(&mut self, data: &[f32]) -> RenderResult<crate::render::BufferId> {
            assert!(!data.is_empty());
            self.next_buffer += 1;
            Ok(crate::render::BufferId(self.next_buffer - 1))
        }

        fn create_index_buffer(&mut self, data: &[u32]) -> RenderResult<crate::render::BufferId> {
            assert!(!data.is_empty());
            self.next_buffer += 1;
            Ok(crate::render::BufferId(self.next_buffer - 1))
        }

        fn resize(&mut self, _width: u32, _height: u32) -> RenderResult<()> {
            Ok(())
        }

        fn begin_frame(&mut self, _projection: &ProjectionState) -> RenderResult<()> {
            self.open = true;
            self.frames += 1;
            self.triangles = 0;
            self.strips = 0;
            self.points.clear();
            Ok(())
        }

        fn draw_triangles(&mut self, _buffer: &RenderBuffer, _color: [f32; 4]) -> RenderResult<()> {
            assert!(self.open);
            self.triangles += 1;
            Ok(())
        }

        fn draw_line_strip(&mut self, _buffer: &RenderBuffer, _color: [f32; 4]) -> RenderResult<()> {
            assert!(self.open);
            self.strips += 1;
            Ok(())
        }

        fn draw_points(
            &mut self,
            _buffer: &RenderBuffer,
            _color: [f32; 4],
            size: f32,
        ) -> RenderResult<()> {
            assert!(self.open);
            self.points.push(size);
            Ok(())
        }

        fn end_frame(&mut self) -> RenderResult<()> {
            self.open = false;
            Ok(())
        }
    }

    fn point_collection() -> &'static str {
        r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]},
                 "properties": {"value": 1, "name": "a"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10, 10]},
                 "properties": {"value": 5, "name": "b"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [20, 20]},
                 "properties": {"value": 9, "name": "c"}}
            ]
        }"#
    }

    fn polygon_collection() -> &'static str {
        r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
                 "properties": {"value": 2}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[20,0],[30,0],[30,10],[20,10],[20,0]]]},
                 "properties": {"value": 8}}
            ]
        }"#
    }

    fn dot_map(options: MapOptions) -> MapController<RecordingTarget, FixedViewport> {
        let mut registry = MapRegistry::new();
        MapController::new(
            &mut registry,
            MapKind::DotMap,
            point_collection(),
            options,
            RecordingTarget::default(),
            FixedViewport::world(256, 256),
        )
        .unwrap()
    }

    #[test]
    fn test_registry_allocates_sequentially() {
        let mut registry = MapRegistry::new();
        assert_eq!(registry.allocate(), 0);
        assert_eq!(registry.allocate(), 1);
        assert_eq!(registry.allocate(), 2);
    }

    #[test]
    fn test_lifecycle_preprocessing_until_start() {
        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("value".to_string());
        options.is_dynamic = true;
        let mut map = dot_map(options);

        assert_eq!(map.state(), Lifecycle::Preprocessing);
        assert!(map.draw().is_err());

        map.start().unwrap();
        assert_eq!(map.state(), Lifecycle::Ready);
        assert!(map.draw().is_ok());
        assert!(map.start().is_err(), "Ready is terminal");
    }

    #[test]
    fn test_quantile_buckets_split_by_rank() {
        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("value".to_string());
        options.number_of_classes = 2;
        options.is_dynamic = true;
        let mut map = dot_map(options);
        map.start().unwrap();

        // {1, 5, 9} with 2 quantile classes -> buckets {1} and {5, 9}
        assert_eq!(map.aesthetics().len(), 2);
        assert_eq!(map.aesthetics()[0].feature_count(), 1);
        assert_eq!(map.aesthetics()[1].feature_count(), 2);
        assert!(map.aesthetics().iter().all(|a| !a.is_empty()));
        assert_eq!(map.min_value(), Some(1.0));
        assert_eq!(map.max_value(), Some(9.0));
    }

    #[test]
    fn test_grouped_mode_merges_class_buffers() {
        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("value".to_string());
        options.number_of_classes = 2;
        options.is_dynamic = false;
        let mut map = dot_map(options);
        map.start().unwrap();

        for aesthetic in map.aesthetics() {
            assert!(aesthetic.grouped().is_some());
            assert!(aesthetic.points().is_empty());
            // Grouped mode keeps no per-feature identity
            assert_eq!(aesthetic.feature_count(), 0);
        }
        // One merged point draw per class
        assert_eq!(map.target().points.len(), 2);
    }

    #[test]
    fn test_polygon_map_draws_fills_and_borders() {
        let mut registry = MapRegistry::new();
        let mut options = MapKind::Choropleth.defaults();
        options.attr = Some("value".to_string());
        options.number_of_classes = 2;
        options.class_breaks_method = "equidistant".to_string();

        let mut map = MapController::new(
            &mut registry,
            MapKind::Choropleth,
            polygon_collection(),
            options,
            RecordingTarget::default(),
            FixedViewport::world(512, 512),
        )
        .unwrap();
        map.start().unwrap();

        // Values {2, 8} split at 5: one feature per class
        assert_eq!(map.aesthetics().len(), 2);
        // Initial draw already ran in start()
        assert_eq!(map.target().frames, 1);
        assert_eq!(map.target().triangles, 2);
        assert_eq!(map.target().strips, 2);
    }

    #[test]
    fn test_toggled_class_not_drawn() {
        let mut registry = MapRegistry::new();
        let mut options = MapKind::Choropleth.defaults();
        options.attr = Some("value".to_string());
        options.number_of_classes = 2;
        options.class_breaks_method = "equidistant".to_string();

        let mut map = MapController::new(
            &mut registry,
            MapKind::Choropleth,
            polygon_collection(),
            options,
            RecordingTarget::default(),
            FixedViewport::world(512, 512),
        )
        .unwrap();
        map.start().unwrap();

        map.toggle_class(0).unwrap();
        map.draw().unwrap();
        assert_eq!(map.target().triangles, 1);

        assert!(map.toggle_class(9).is_err());
    }

    #[test]
    fn test_click_resolves_polygon_feature() {
        let mut registry = MapRegistry::new();
        let mut options = MapKind::Choropleth.defaults();
        options.attr = Some("value".to_string());

        let mut map = MapController::new(
            &mut registry,
            MapKind::Choropleth,
            polygon_collection(),
            options,
            RecordingTarget::default(),
            FixedViewport::world(512, 512),
        )
        .unwrap();
        map.start().unwrap();

        let hit = map.on_click(5.0, 5.0).unwrap();
        assert_eq!(hit.get("value"), Some(&serde_json::Value::from(2)));
        assert!(map.on_click(15.0, 5.0).is_none());
    }

    #[test]
    fn test_click_callback_invoked() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("value".to_string());
        options.is_dynamic = true;
        let mut map = dot_map(options);
        map.start().unwrap();

        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        map.set_click_callback(Box::new(move |props| {
            assert!(props.contains_key("name"));
            seen.set(seen.get() + 1);
        }));

        assert!(map.on_click(0.1, 0.1).is_some());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_qualitative_fallback_for_text_attribute() {
        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("name".to_string());
        options.is_dynamic = true;
        let mut map = dot_map(options);
        map.start().unwrap();

        // Three distinct names, first-occurrence order
        assert_eq!(map.aesthetics().len(), 3);
        assert_eq!(
            map.aesthetics()[0].descriptor(),
            &ValueDescriptor::Discrete("a".to_string())
        );
        assert!(map.min_value().is_none());
    }

    #[test]
    fn test_change_map_symmetric_breaks() {
        let mut registry = MapRegistry::new();
        let collection = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
                 "properties": {"now": 0, "then": 10}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[[20,0],[30,0],[30,10],[20,10],[20,0]]]},
                 "properties": {"now": 15, "then": 5}}
            ]
        }"#;
        let mut options = MapKind::ChangeMap.defaults();
        options.minuend = Some("now".to_string());
        options.subtrahend = Some("then".to_string());

        let mut map = MapController::new(
            &mut registry,
            MapKind::ChangeMap,
            collection,
            options,
            RecordingTarget::default(),
            FixedViewport::world(512, 512),
        )
        .unwrap();
        map.start().unwrap();

        // Differences are {-10, 10}: the fixed 7-class symmetric set
        assert_eq!(map.aesthetics().len(), 7);
        let ValueDescriptor::Range { lo, hi, .. } = *map.aesthetics()[3].descriptor() else {
            panic!("expected a range descriptor");
        };
        assert!(lo < 0.0 && hi > 0.0, "middle class straddles zero");
        assert_eq!(map.min_value(), Some(-10.0));
        assert_eq!(map.max_value(), Some(10.0));
    }

    #[test]
    fn test_explicit_breaks_skip_classifier() {
        let mut options = MapKind::DotMap.defaults();
        options.attr = Some("value".to_string());
        options.class_breaks = Some(vec![0.0, 4.0, 100.0]);
        options.is_dynamic = true;
        let mut map = dot_map(options);
        map.start().unwrap();

        let ValueDescriptor::Range { lo, hi, .. } = *map.aesthetics()[0].descriptor() else {
            panic!("expected a range descriptor");
        };
        assert_eq!((lo, hi), (0.0, 4.0));
    }

    #[test]
    fn test_proportional_symbol_sizes_scale() {
        let mut registry = MapRegistry::new();
        let mut options = MapKind::ProportionalSymbols.defaults();
        options.attr = Some("value".to_string());
        options.min_point_size = 4.0;
        options.max_point_size = 24.0;

        let mut map = MapController::new(
            &mut registry,
            MapKind::ProportionalSymbols,
            point_collection(),
            options,
            RecordingTarget::default(),
            FixedViewport::world(256, 256),
        )
        .unwrap();
        map.start().unwrap();

        let mut sizes: Vec<f32> = map
            .aesthetics()
            .iter()
            .flat_map(|a| a.points().iter().map(|p| p.size))
            .collect();
        sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // Values {1, 5, 9} interpolate to {4, 14, 24}
        assert_eq!(sizes, vec![4.0, 14.0, 24.0]);
    }

    #[test]
    fn test_click_summary_filters_injected_id() {
        let mut properties = JsonMap::new();
        properties.insert("name".into(), serde_json::Value::from("Berlin"));
        properties.insert(FEATURE_ID_KEY.into(), serde_json::Value::from(0));

        let all = click_summary(&properties, None);
        assert!(all.contains("name"));
        assert!(!all.contains(FEATURE_ID_KEY));

        let filtered = click_summary(&properties, Some(&["missing".to_string()]));
        assert!(filtered.is_empty());
    }
}
