//! Legend classes ("aesthetics") and the buffers they own.
//!
//! An Aesthetic groups the features sharing one rendering style and one
//! attribute range or category. Features are attached during the one-time
//! preprocessing phase and never removed; hiding a class is done by
//! disabling the whole Aesthetic.

use crate::render::RenderBuffer;

/// An attribute value routed to classification.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

/// What an Aesthetic covers: a numeric range (half-open, closed on the
/// final class) or a single discrete value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDescriptor {
    Range { lo: f64, hi: f64, closed_hi: bool },
    Discrete(String),
}

impl ValueDescriptor {
    pub fn matches(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (ValueDescriptor::Range { lo, hi, closed_hi }, AttrValue::Number(v)) => {
                if *closed_hi {
                    v >= lo && v <= hi
                } else {
                    v >= lo && v < hi
                }
            }
            (ValueDescriptor::Discrete(d), AttrValue::Text(t)) => d == t,
            _ => false,
        }
    }
}

/// Fill + border buffer pair for one member polygon of one feature.
#[derive(Debug, Clone, Copy)]
pub struct MeshBuffers {
    pub feature: u32,
    pub fill: RenderBuffer,
    pub border: RenderBuffer,
}

/// Per-feature point buffer (dynamic mode). `size` carries the resolved
/// point size so proportional symbols can vary it per feature.
#[derive(Debug, Clone, Copy)]
pub struct PointBuffers {
    pub feature: u32,
    pub buffer: RenderBuffer,
    pub size: f32,
}

/// One legend class with its style, value descriptor and owned buffers.
#[derive(Debug)]
pub struct Aesthetic {
    class_index: usize,
    attr: String,
    fill: [f32; 4],
    stroke: Option<[f32; 4]>,
    point_size: Option<f32>,
    descriptor: ValueDescriptor,
    enabled: bool,
    meshes: Vec<MeshBuffers>,
    points: Vec<PointBuffers>,
    /// Merged buffer for the whole class in grouped/low-memory mode;
    /// per-feature identity is not retained.
    grouped: Option<RenderBuffer>,
}

impl Aesthetic {
    pub fn new(
        class_index: usize,
        attr: String,
        fill: [f32; 4],
        stroke: Option<[f32; 4]>,
        point_size: Option<f32>,
        descriptor: ValueDescriptor,
    ) -> Self {
        Self {
            class_index,
            attr,
            fill,
            stroke,
            point_size,
            descriptor,
            enabled: true,
            meshes: Vec::new(),
            points: Vec::new(),
            grouped: None,
        }
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    pub fn fill(&self) -> [f32; 4] {
        self.fill
    }

    pub fn stroke(&self) -> Option<[f32; 4]> {
        self.stroke
    }

    pub fn point_size(&self) -> Option<f32> {
        self.point_size
    }

    pub fn descriptor(&self) -> &ValueDescriptor {
        &self.descriptor
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Legend show/hide toggle.
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Attach one member polygon's buffers. MultiPolygon features call
    /// this once per member.
    pub fn add_polygon_feature(&mut self, feature: u32, fill: RenderBuffer, border: RenderBuffer) {
        self.meshes.push(MeshBuffers { feature, fill, border });
    }

    /// Attach a per-feature point buffer (dynamic mode).
    pub fn add_point_feature(&mut self, feature: u32, buffer: RenderBuffer, size: f32) {
        self.points.push(PointBuffers { feature, buffer, size });
    }

    /// Attach the single merged class buffer (grouped mode).
    pub fn set_grouped(&mut self, buffer: RenderBuffer) {
        self.grouped = Some(buffer);
    }

    pub fn meshes(&self) -> &[MeshBuffers] {
        &self.meshes
    }

    pub fn points(&self) -> &[PointBuffers] {
        &self.points
    }

    pub fn grouped(&self) -> Option<&RenderBuffer> {
        self.grouped.as_ref()
    }

    pub fn feature_count(&self) -> usize {
        if self.grouped.is_some() {
            // Grouped mode drops per-feature identity
            return 0;
        }
        let mut seen: Vec<u32> = self
            .meshes
            .iter()
            .map(|m| m.feature)
            .chain(self.points.iter().map(|p| p.feature))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.points.is_empty() && self.grouped.is_none()
    }
}

/// Indices of the Aesthetics a value belongs to. Normally exactly one;
/// user-overridden overlapping ranges may yield several (not defended).
pub fn assign_classes(aesthetics: &[Aesthetic], value: &AttrValue) -> Vec<usize> {
    aesthetics
        .iter()
        .enumerate()
        .filter(|(_, a)| a.descriptor().matches(value))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BufferId;

    fn range_aesthetic(class: usize, lo: f64, hi: f64, closed: bool) -> Aesthetic {
        Aesthetic::new(
            class,
            "value".to_string(),
            [0.1, 0.2, 0.3, 1.0],
            None,
            None,
            ValueDescriptor::Range { lo, hi, closed_hi: closed },
        )
    }

    #[test]
    fn test_assign_single_class_for_contiguous_ranges() {
        let aesthetics = vec![
            range_aesthetic(0, 0.0, 5.0, false),
            range_aesthetic(1, 5.0, 10.0, true),
        ];

        assert_eq!(assign_classes(&aesthetics, &AttrValue::Number(2.0)), vec![0]);
        // Boundary value belongs to the upper half-open range
        assert_eq!(assign_classes(&aesthetics, &AttrValue::Number(5.0)), vec![1]);
        // Closed final class keeps the maximum
        assert_eq!(assign_classes(&aesthetics, &AttrValue::Number(10.0)), vec![1]);
        assert!(assign_classes(&aesthetics, &AttrValue::Number(11.0)).is_empty());
    }

    #[test]
    fn test_overlapping_ranges_yield_multiple_classes() {
        let aesthetics = vec![
            range_aesthetic(0, 0.0, 6.0, false),
            range_aesthetic(1, 4.0, 10.0, true),
        ];
        assert_eq!(
            assign_classes(&aesthetics, &AttrValue::Number(5.0)),
            vec![0, 1]
        );
    }

    #[test]
    fn test_discrete_matching() {
        let mut a = range_aesthetic(0, 0.0, 1.0, false);
        a.descriptor = ValueDescriptor::Discrete("forest".to_string());

        assert!(a.descriptor().matches(&AttrValue::Text("forest".to_string())));
        assert!(!a.descriptor().matches(&AttrValue::Text("urban".to_string())));
        assert!(!a.descriptor().matches(&AttrValue::Number(1.0)));
    }

    #[test]
    fn test_toggle_flips_enabled() {
        let mut a = range_aesthetic(0, 0.0, 1.0, true);
        assert!(a.enabled());
        a.toggle();
        assert!(!a.enabled());
        a.toggle();
        assert!(a.enabled());
    }

    #[test]
    fn test_feature_count_dedupes_multipolygon_members() {
        let mut a = range_aesthetic(0, 0.0, 1.0, true);
        let buf = RenderBuffer::strip(BufferId(0), 8);
        a.add_polygon_feature(3, buf, buf);
        a.add_polygon_feature(3, buf, buf); // second member of the same feature
        a.add_polygon_feature(4, buf, buf);
        assert_eq!(a.feature_count(), 2);
    }
}
