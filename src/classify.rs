//! Attribute classification into legend classes.
//!
//! Turns a numeric sample into K+1 ordered class boundaries
//! (equal-interval, quantile or 1-D k-means), or a qualitative sample
//! into discrete classes in first-occurrence order.

use crate::error::{RenderError, RenderResult};

/// Width of the "no change" band straddling zero in change-map breaks.
pub const NEAR_ZERO_EPS: f64 = 1e-6;

const KMEANS_MAX_ITERATIONS: usize = 100;
const KMEANS_CONVERGENCE: f64 = 1e-3;

/// Break computation strategy for quantitative attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassBreaksMethod {
    /// Boundaries linearly spaced between observed min and max
    EqualInterval,
    /// Boundaries at evenly spaced rank positions in the sorted sample
    Quantile,
    /// Midpoints between adjacent converged 1-D k-means centroids
    KMeans,
}

impl ClassBreaksMethod {
    /// Parse a method name. Unknown names fall back to quantile.
    pub fn parse(name: &str) -> Self {
        match name {
            "equidistant" => ClassBreaksMethod::EqualInterval,
            "k-means" => ClassBreaksMethod::KMeans,
            _ => ClassBreaksMethod::Quantile,
        }
    }
}

/// Ordered sequence of K+1 strictly increasing boundaries for K classes.
///
/// Class `i` covers the half-open range `[b[i], b[i+1])`; the final class
/// is closed on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBreakSet {
    boundaries: Vec<f64>,
}

impl ClassBreakSet {
    fn from_boundaries(boundaries: Vec<f64>) -> RenderResult<Self> {
        if boundaries.len() < 2 {
            return Err(RenderError::classify(format!(
                "Break set needs at least 2 boundaries, got {}",
                boundaries.len()
            )));
        }
        for pair in boundaries.windows(2) {
            if pair[1] <= pair[0] {
                return Err(RenderError::classify(format!(
                    "Boundaries must be strictly increasing; got {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self { boundaries })
    }

    /// Explicit user-supplied breaks, bypassing the break algorithms.
    pub fn from_explicit(boundaries: Vec<f64>) -> RenderResult<Self> {
        Self::from_boundaries(boundaries)
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn class_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// The `[lo, hi)` range of class `i`; the last class is `[lo, hi]`.
    pub fn range(&self, class: usize) -> (f64, f64, bool) {
        let closed_hi = class == self.class_count() - 1;
        (self.boundaries[class], self.boundaries[class + 1], closed_hi)
    }

    /// Which class a value falls into, or None when outside all ranges.
    pub fn class_of(&self, value: f64) -> Option<usize> {
        let k = self.class_count();
        for i in 0..k {
            let (lo, hi, closed_hi) = self.range(i);
            let inside = if closed_hi {
                value >= lo && value <= hi
            } else {
                value >= lo && value < hi
            };
            if inside {
                return Some(i);
            }
        }
        None
    }

    pub fn min_value(&self) -> f64 {
        self.boundaries[0]
    }

    pub fn max_value(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }
}

/// Compute K+1 class boundaries for a numeric sample.
///
/// `class_count == 1` yields the single range `[min, max]` regardless of
/// method. `class_count == 0` is a caller contract violation and is
/// rejected.
pub fn class_breaks(
    values: &[f64],
    method: ClassBreaksMethod,
    class_count: usize,
) -> RenderResult<ClassBreakSet> {
    if class_count == 0 {
        return Err(RenderError::classify(
            "Class count must be at least 1".to_string(),
        ));
    }

    let sample = finite_sample(values)?;
    let min = sample[0];
    let max = sample[sample.len() - 1];

    if class_count == 1 {
        return ClassBreakSet::from_boundaries(vec![min, max]);
    }

    let mut boundaries = match method {
        ClassBreaksMethod::EqualInterval => equal_interval_breaks(min, max, class_count),
        ClassBreaksMethod::Quantile => quantile_breaks(&sample, class_count),
        ClassBreaksMethod::KMeans => kmeans_breaks(&sample, class_count),
    };

    // Tied sample values collapse adjacent boundaries; the resulting
    // break set may carry fewer classes than requested.
    boundaries.dedup();

    ClassBreakSet::from_boundaries(boundaries)
}

/// Fixed 7-class breakdown for two-sided change maps, symmetric around a
/// dedicated near-zero "no change" band. Built directly from the observed
/// extremes; the generic break algorithms are deliberately not used here.
pub fn change_breaks(min: f64, max: f64) -> RenderResult<ClassBreakSet> {
    if !min.is_finite() || !max.is_finite() {
        return Err(RenderError::classify(format!(
            "Change breaks need finite extremes, got min={min} max={max}"
        )));
    }
    if min >= 0.0 || max <= 0.0 {
        return Err(RenderError::classify(format!(
            "Change breaks need min < 0 < max, got min={min} max={max}"
        )));
    }

    ClassBreakSet::from_boundaries(vec![
        min,
        min + min.abs() / 3.0,
        min + 2.0 * min.abs() / 3.0,
        -NEAR_ZERO_EPS,
        NEAR_ZERO_EPS,
        max - 2.0 * max.abs() / 3.0,
        max - max.abs() / 3.0,
        max,
    ])
}

/// Distinct values of a qualitative sample, in first-occurrence order.
///
/// Order is load-bearing: the legend lists classes in this order.
pub fn discrete_classes<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        let value = value.as_ref();
        if !seen.iter().any(|v| v == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

/// Sorted finite subsample, rejecting empty input.
fn finite_sample(values: &[f64]) -> RenderResult<Vec<f64>> {
    let mut sample: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sample.is_empty() {
        return Err(RenderError::classify(
            "No finite values to classify".to_string(),
        ));
    }
    sample.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(sample)
}

fn equal_interval_breaks(min: f64, max: f64, class_count: usize) -> Vec<f64> {
    let step = (max - min) / class_count as f64;
    (0..=class_count).map(|i| min + step * i as f64).collect()
}

/// Boundaries at evenly spaced rank positions in the sorted sample.
fn quantile_breaks(sorted: &[f64], class_count: usize) -> Vec<f64> {
    let n = sorted.len();
    (0..=class_count)
        .map(|i| {
            let rank = (i as f64 * (n - 1) as f64 / class_count as f64).round() as usize;
            sorted[rank.min(n - 1)]
        })
        .collect()
}

/// 1-D Lloyd iteration: deterministic evenly spaced init, then
/// assign/update until centroids stop moving. Boundaries are the sample
/// extremes plus midpoints between adjacent sorted centroids.
fn kmeans_breaks(sorted: &[f64], class_count: usize) -> Vec<f64> {
    let n = sorted.len();
    let k = class_count.min(n);

    // Evenly spaced initial centroids across the sorted sample
    let mut centroids: Vec<f64> = (0..k)
        .map(|i| {
            let idx = (i * n / k) + n / (2 * k);
            sorted[idx.min(n - 1)]
        })
        .collect();

    let mut labels = vec![0usize; n];

    for _iter in 0..KMEANS_MAX_ITERATIONS {
        // Assignment step: nearest centroid by absolute distance
        for (i, &value) in sorted.iter().enumerate() {
            let mut best_dist = f64::INFINITY;
            let mut best_k = 0;
            for (c, &centroid) in centroids.iter().enumerate() {
                let dist = (value - centroid).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best_k = c;
                }
            }
            labels[i] = best_k;
        }

        // Update step: recompute centroids
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (i, &value) in sorted.iter().enumerate() {
            sums[labels[i]] += value;
            counts[labels[i]] += 1;
        }

        let mut max_shift = 0.0_f64;
        for c in 0..k {
            if counts[c] > 0 {
                let updated = sums[c] / counts[c] as f64;
                max_shift = max_shift.max((updated - centroids[c]).abs());
                centroids[c] = updated;
            }
        }

        if max_shift < KMEANS_CONVERGENCE {
            break;
        }
    }

    centroids.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut boundaries = Vec::with_capacity(k + 1);
    boundaries.push(sorted[0]);
    for pair in centroids.windows(2) {
        boundaries.push((pair[0] + pair[1]) / 2.0);
    }
    boundaries.push(sorted[n - 1]);
    boundaries
}
