//! Axis-aligned bounding boxes.

use nalgebra::Vector3;
use rayon::prelude::*;

/// An axis-aligned bounding box in 3D, stored as its min and max corners.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisAlignedBoundingBox3d {
    min: Vector3<f64>,
    max: Vector3<f64>,
}

impl AxisAlignedBoundingBox3d {
    /// Builds a box directly from known min/max corners. Panics in debug builds if any
    /// component of `min` exceeds the corresponding component of `max`.
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self { min, max }
    }

    /// Computes the smallest box enclosing every point, sequentially.
    pub fn from_points(points: &[Vector3<f64>]) -> Option<Self> {
        let mut iter = points.iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        Some(Self { min, max })
    }

    /// Computes the smallest box enclosing every point, splitting the reduction across the
    /// rayon thread pool. Equivalent to [`Self::from_points`] for non-empty input.
    pub fn from_points_par(points: &[Vector3<f64>]) -> Option<Self> {
        points
            .par_iter()
            .map(|&p| (p, p))
            .reduce_with(|(min_a, max_a), (min_b, max_b)| (min_a.inf(&min_b), max_a.sup(&max_b)))
            .map(|(min, max)| Self { min, max })
    }

    /// The minimum corner.
    pub fn min(&self) -> Vector3<f64> {
        self.min
    }

    /// The maximum corner.
    pub fn max(&self) -> Vector3<f64> {
        self.max
    }

    /// Per-axis extent (`max - min`).
    pub fn dimensions(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Geometric centre of the box.
    pub fn centroid(&self) -> Vector3<f64> {
        (self.min + self.max) * 0.5
    }

    /// Volume enclosed by the box. Zero for a degenerate (point or planar) box.
    pub fn volume(&self) -> f64 {
        let d = self.dimensions();
        (d.x.max(0.0)) * (d.y.max(0.0)) * (d.z.max(0.0))
    }

    /// Largest of the three per-axis extents.
    pub fn max_dimension(&self) -> f64 {
        let d = self.dimensions();
        d.x.max(d.y).max(d.z)
    }

    /// Expands the box outward by `margin` on every side, in place.
    pub fn grow_uniformly(&mut self, margin: f64) {
        let m = Vector3::new(margin, margin, margin);
        self.min -= m;
        self.max += m;
    }

    /// Returns `true` if `point` lies within the box, inclusive of its boundary.
    pub fn contains_point(&self, point: &Vector3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Returns `true` if `other` overlaps this box on every axis.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_matches_par() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, -2.0, 3.0),
            Vector3::new(-1.0, 5.0, 0.5),
        ];
        let seq = AxisAlignedBoundingBox3d::from_points(&points).unwrap();
        let par = AxisAlignedBoundingBox3d::from_points_par(&points).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.min(), Vector3::new(-1.0, -2.0, 0.0));
        assert_eq!(seq.max(), Vector3::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn empty_points_yield_none() {
        assert!(AxisAlignedBoundingBox3d::from_points(&[]).is_none());
    }

    #[test]
    fn grow_uniformly_expands_both_sides() {
        let mut b = AxisAlignedBoundingBox3d::new(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        b.grow_uniformly(0.5);
        assert_eq!(b.min(), Vector3::new(-0.5, -0.5, -0.5));
        assert_eq!(b.max(), Vector3::new(1.5, 1.5, 1.5));
    }

    #[test]
    fn intersects_detects_overlap() {
        let a = AxisAlignedBoundingBox3d::new(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        let b = AxisAlignedBoundingBox3d::new(Vector3::new(0.5, 0.5, 0.5), Vector3::new(2.0, 2.0, 2.0));
        let c = AxisAlignedBoundingBox3d::new(Vector3::new(2.0, 2.0, 2.0), Vector3::new(3.0, 3.0, 3.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
