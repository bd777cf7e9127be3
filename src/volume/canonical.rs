// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Canonical grid every labelmap of a run is sampled on

use super::{BinaryVoxelGrid, GridSpec, Voxel};
use crate::config::GridConfig;
use crate::error::{FuseError, FuseResult};
use crate::geometry::BoundsAnalysis;
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, warn};

/// Builds the shared [`GridSpec`] and the canvas the voxelizer samples against
#[derive(Debug, Clone)]
pub struct CanonicalGrid {
    config: GridConfig,
}

impl CanonicalGrid {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    /// Spec of a fixed-mode grid; fails for derived mode, which needs bounds
    pub fn fixed_spec(&self) -> FuseResult<GridSpec> {
        match &self.config {
            GridConfig::Fixed {
                dims,
                spacing,
                origin,
                directions,
            } => {
                let [r0, r1, r2] = directions;
                GridSpec::new(
                    *dims,
                    Vector3::from(*spacing),
                    Point3::from(*origin),
                    Matrix3::new(
                        r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], r2[0], r2[1], r2[2],
                    ),
                )
            }
            GridConfig::Derived { .. } => Err(FuseError::InvalidGridSpec(
                "derived grid requires mesh bounds".to_string(),
            )),
        }
    }

    /// Resolve the grid spec for one run
    pub fn spec(&self, analysis: &BoundsAnalysis) -> FuseResult<GridSpec> {
        let spec = match &self.config {
            GridConfig::Fixed { .. } => self.fixed_spec()?,
            GridConfig::Derived { spacing, margin } => {
                derived_spec(analysis, Vector3::from(*spacing), *margin)?
            }
        };

        let extent = spec.world_bounds();
        for (side, bounds) in [("left", &analysis.left), ("right", &analysis.right)] {
            if !extent.contains_box(bounds, spec.spacing.max()) {
                warn!(
                    side,
                    mesh_min = ?bounds.min.coords.as_slice(),
                    mesh_max = ?bounds.max.coords.as_slice(),
                    grid_min = ?extent.min.coords.as_slice(),
                    grid_max = ?extent.max.coords.as_slice(),
                    "mesh extends outside the canonical grid and will be clipped"
                );
            }
        }

        debug!(dims = ?spec.dims, voxels = spec.voxel_count(), "canonical grid resolved");
        Ok(spec)
    }

    /// All-foreground canvas carrying the grid geometry
    pub fn canvas(&self, spec: GridSpec) -> BinaryVoxelGrid {
        BinaryVoxelGrid::filled(spec, Voxel::Foreground)
    }
}

fn derived_spec(analysis: &BoundsAnalysis, spacing: Vector3<f64>, margin: f64) -> FuseResult<GridSpec> {
    if !(margin.is_finite() && margin >= 0.0) {
        return Err(FuseError::InvalidGridSpec(format!(
            "margin must be non-negative, got {}",
            margin
        )));
    }
    if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(FuseError::InvalidGridSpec(format!(
            "spacing must be positive, got {:?}",
            spacing.as_slice()
        )));
    }

    let bounds = analysis.combined();
    let origin = bounds.min - Vector3::repeat(margin);
    let extent = bounds.size() + Vector3::repeat(2.0 * margin);
    let mut dims = [0usize; 3];
    for axis in 0..3 {
        dims[axis] = (extent[axis] / spacing[axis]).ceil() as usize + 1;
    }

    GridSpec::axis_aligned(dims, spacing, origin)
}
