// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding boxes and the reference planes derived from a left/right mesh pair

use super::{Side, TriangleMesh};
use crate::error::{FuseError, FuseResult};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Bounds of a point set, `None` when the set is empty
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut bbox = Self::empty();
        for point in points {
            bbox.expand_to_include(point);
        }
        Some(bbox)
    }

    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);

        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut bbox = *self;
        bbox.expand_to_include(&other.min);
        bbox.expand_to_include(&other.max);
        bbox
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Whether `other` lies entirely inside this box, allowing `tolerance` of slack
    pub fn contains_box(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (0..3).all(|axis| {
            other.min[axis] >= self.min[axis] - tolerance
                && other.max[axis] <= self.max[axis] + tolerance
        })
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min - other.min).amax() < tolerance && (self.max - other.max).amax() < tolerance
    }
}

/// Scalars derived from the left and right bounds.
///
/// `left_bound` is the left mesh's minimum x and `right_bound` the right
/// mesh's maximum x; no check is made that the caller labelled the meshes
/// correctly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePlanes {
    pub left_bound: f64,
    pub right_bound: f64,
    pub top_bound: f64,
    pub front_bound: f64,
    pub back_bound: f64,
    pub midline: f64,
    /// Depth offset used when placing decorative geometry
    pub halfway: f64,
}

impl ReferencePlanes {
    pub fn from_bounds(left: &BoundingBox, right: &BoundingBox) -> Self {
        let left_bound = left.min.x;
        let right_bound = right.max.x;
        let front_bound = left.min.y.min(right.min.y);
        let back_bound = left.max.y.max(right.max.y);

        Self {
            left_bound,
            right_bound,
            top_bound: left.max.z.max(right.max.z),
            front_bound,
            back_bound,
            midline: (left_bound + right_bound) / 2.0,
            halfway: -(back_bound + front_bound) / 1.7,
        }
    }

    /// Signed left-to-right extent; negative when the inputs are swapped
    pub fn span(&self) -> f64 {
        self.right_bound - self.left_bound
    }
}

/// Per-mesh bounds plus the derived reference planes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsAnalysis {
    pub left: BoundingBox,
    pub right: BoundingBox,
    pub planes: ReferencePlanes,
}

impl BoundsAnalysis {
    /// Bounds covering both meshes
    pub fn combined(&self) -> BoundingBox {
        self.left.union(&self.right)
    }
}

/// Compute the bounds of both meshes and the reference planes between them
pub fn analyze_bounds(left: &TriangleMesh, right: &TriangleMesh) -> FuseResult<BoundsAnalysis> {
    let left_box = left
        .bounding_box()
        .ok_or(FuseError::EmptyMesh { side: Side::Left })?;
    let right_box = right
        .bounding_box()
        .ok_or(FuseError::EmptyMesh { side: Side::Right })?;

    Ok(BoundsAnalysis {
        left: left_box,
        right: right_box,
        planes: ReferencePlanes::from_bounds(&left_box, &right_box),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mesh_spanning(min: [f64; 3], max: [f64; 3]) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        let a = mesh.add_vertex(Point3::from(min));
        let b = mesh.add_vertex(Point3::from(max));
        let c = mesh.add_vertex(Point3::new(min[0], max[1], min[2]));
        mesh.add_triangle([a, b, c]);
        mesh
    }

    #[test]
    fn test_bounding_box() {
        let mut bbox = BoundingBox::empty();
        bbox.expand_to_include(&Point3::new(1.0, 2.0, 3.0));
        bbox.expand_to_include(&Point3::new(-1.0, -2.0, -3.0));

        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_contains_box() {
        let outer = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let inner = BoundingBox::new(Point3::new(1.0, 1.0, 1.0), Point3::new(9.0, 9.0, 9.0));
        assert!(outer.contains_box(&inner, 0.0));
        assert!(!inner.contains_box(&outer, 0.0));
    }

    #[test]
    fn test_reference_planes() {
        let left = mesh_spanning([-50.0, -20.0, 0.0], [-10.0, 30.0, 40.0]);
        let right = mesh_spanning([10.0, -25.0, 0.0], [60.0, 35.0, 45.0]);
        let analysis = analyze_bounds(&left, &right).unwrap();
        let planes = analysis.planes;

        assert_eq!(planes.left_bound, -50.0);
        assert_eq!(planes.right_bound, 60.0);
        assert_eq!(planes.midline, 5.0);
        assert_eq!(planes.front_bound, -25.0);
        assert_eq!(planes.back_bound, 35.0);
        assert_eq!(planes.top_bound, 45.0);
        assert_relative_eq!(planes.halfway, -10.0 / 1.7);
        assert_eq!(planes.span(), 110.0);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let left = mesh_spanning([0.0; 3], [1.0; 3]);
        let err = analyze_bounds(&left, &TriangleMesh::new()).unwrap_err();
        assert!(matches!(err, FuseError::EmptyMesh { side: Side::Right }));

        let err = analyze_bounds(&TriangleMesh::new(), &left).unwrap_err();
        assert!(matches!(err, FuseError::EmptyMesh { side: Side::Left }));
    }

    #[test]
    fn test_swapped_inputs_give_negative_span() {
        let left = mesh_spanning([10.0, 0.0, 0.0], [20.0, 1.0, 1.0]);
        let right = mesh_spanning([-20.0, 0.0, 0.0], [-10.0, 1.0, 1.0]);
        let planes = analyze_bounds(&left, &right).unwrap().planes;
        assert!(planes.span() < 0.0);
    }
}
