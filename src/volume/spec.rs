// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Grid geometry shared by every labelmap in one fusion run

use crate::error::{FuseError, FuseResult};
use crate::geometry::BoundingBox;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Dimensions, spacing, origin and axis directions of a voxel grid.
///
/// Voxel `(i, j, k)` has its center at
/// `origin + directions * (i * sx, j * sy, k * sz)`; the columns of
/// `directions` are the world directions of the i, j and k axes.
/// Voxels are stored with i varying fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub dims: [usize; 3],
    pub spacing: Vector3<f64>,
    pub origin: Point3<f64>,
    pub directions: Matrix3<f64>,
}

impl GridSpec {
    pub fn new(
        dims: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
        directions: Matrix3<f64>,
    ) -> FuseResult<Self> {
        let spec = Self {
            dims,
            spacing,
            origin,
            directions,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Grid whose axes follow world x, y and z
    pub fn axis_aligned(
        dims: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
    ) -> FuseResult<Self> {
        Self::new(dims, spacing, origin, Matrix3::identity())
    }

    pub fn validate(&self) -> FuseResult<()> {
        if let Some(axis) = self.dims.iter().position(|&n| n == 0) {
            return Err(FuseError::InvalidGridSpec(format!(
                "dimension {} is zero ({:?})",
                axis, self.dims
            )));
        }
        if self.dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n)).is_none() {
            return Err(FuseError::InvalidGridSpec(format!(
                "dimensions {:?} overflow the voxel count",
                self.dims
            )));
        }
        if let Some(axis) = self.spacing.iter().position(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(FuseError::InvalidGridSpec(format!(
                "spacing along axis {} must be positive, got {}",
                axis, self.spacing[axis]
            )));
        }
        if !self.origin.iter().all(|c| c.is_finite()) {
            return Err(FuseError::InvalidGridSpec(format!(
                "origin {:?} is not finite",
                self.origin
            )));
        }
        let gram = self.directions.transpose() * self.directions;
        if !(gram - Matrix3::identity()).iter().all(|d| d.abs() < ORTHONORMAL_TOLERANCE) {
            return Err(FuseError::InvalidGridSpec(
                "axis directions are not orthonormal".to_string(),
            ));
        }
        Ok(())
    }

    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Number of voxels in one k-slice
    pub fn slice_len(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    pub fn coords(&self, index: usize) -> [usize; 3] {
        let i = index % self.dims[0];
        let rest = index / self.dims[0];
        [i, rest % self.dims[1], rest / self.dims[1]]
    }

    pub fn contains(&self, i: isize, j: isize, k: isize) -> bool {
        i >= 0
            && j >= 0
            && k >= 0
            && (i as usize) < self.dims[0]
            && (j as usize) < self.dims[1]
            && (k as usize) < self.dims[2]
    }

    /// World position of a (possibly fractional) voxel coordinate
    pub fn index_to_world(&self, ijk: &Point3<f64>) -> Point3<f64> {
        self.origin + self.directions * ijk.coords.component_mul(&self.spacing)
    }

    /// Fractional voxel coordinate of a world position
    pub fn world_to_index(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.to_local(world).component_div(&self.spacing))
    }

    /// Offset from the origin expressed along the grid axes, in world units
    pub fn to_local(&self, world: &Point3<f64>) -> Vector3<f64> {
        self.directions.transpose() * (world - self.origin)
    }

    /// World-space bounds of the voxel centers
    pub fn world_bounds(&self) -> BoundingBox {
        let last = Vector3::new(
            (self.dims[0] - 1) as f64,
            (self.dims[1] - 1) as f64,
            (self.dims[2] - 1) as f64,
        );
        let mut bounds = BoundingBox::empty();
        for corner in 0..8 {
            let ijk = Point3::new(
                if corner & 1 == 0 { 0.0 } else { last.x },
                if corner & 2 == 0 { 0.0 } else { last.y },
                if corner & 4 == 0 { 0.0 } else { last.z },
            );
            bounds.expand_to_include(&self.index_to_world(&ijk));
        }
        bounds
    }

    /// Describe the first difference from `other`, `None` when identical
    pub fn mismatch(&self, other: &GridSpec) -> Option<String> {
        if self.dims != other.dims {
            Some(format!("dimensions {:?} != {:?}", self.dims, other.dims))
        } else if self.spacing != other.spacing {
            Some(format!(
                "spacing {:?} != {:?}",
                self.spacing.as_slice(),
                other.spacing.as_slice()
            ))
        } else if self.origin != other.origin {
            Some(format!(
                "origin {:?} != {:?}",
                self.origin.coords.as_slice(),
                other.origin.coords.as_slice()
            ))
        } else if self.directions != other.directions {
            Some("axis directions differ".to_string())
        } else {
            None
        }
    }

    /// Fail with [`FuseError::GeometryMismatch`] unless `other` is identical
    pub fn ensure_congruent(&self, other: &GridSpec) -> FuseResult<()> {
        match self.mismatch(other) {
            Some(reason) => Err(FuseError::GeometryMismatch(reason)),
            None => Ok(()),
        }
    }
}
