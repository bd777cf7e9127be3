// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Morphology module - boolean union, dilation and hole filling

mod boolean;
mod dilate;
mod fill;

pub use boolean::{union, union_all, union_into};
pub use dilate::{dilate, dilate_in_place, StructuringElement};
pub use fill::{fill_holes, Connectivity};

use crate::config::MorphologyConfig;
use crate::error::{FuseError, FuseResult};
use crate::geometry::ReferencePlanes;
use crate::volume::BinaryVoxelGrid;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Dilation radius for an object spanning `span` world units: `round(span / divisor)`.
///
/// A negative span means the left and right inputs were swapped; that is
/// reported rather than folded into a positive radius.
pub fn derive_radius(span: f64, divisor: f64) -> FuseResult<usize> {
    if !(divisor.is_finite() && divisor > 0.0) {
        return Err(FuseError::InvalidParameter(format!(
            "radius divisor must be positive, got {}",
            divisor
        )));
    }
    if !span.is_finite() {
        return Err(FuseError::InvalidParameter(format!("span {} is not finite", span)));
    }
    if span < 0.0 {
        return Err(FuseError::InvalidParameter(format!(
            "negative dilation radius: right bound lies {} left of the left bound",
            -span
        )));
    }
    Ok((span / divisor).round() as usize)
}

/// Parameters of the closing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyParams {
    pub radius: usize,
    pub element: StructuringElement,
    pub connectivity: Connectivity,
}

impl MorphologyParams {
    pub fn new(radius: usize, element: StructuringElement, connectivity: Connectivity) -> Self {
        Self {
            radius,
            element,
            connectivity,
        }
    }

    /// Radius tied to the object's left-right extent
    pub fn from_planes(planes: &ReferencePlanes, config: &MorphologyConfig) -> FuseResult<Self> {
        let derived = derive_radius(planes.span(), config.radius_divisor)?;
        Ok(Self {
            radius: config.radius_override.unwrap_or(derived),
            element: config.element,
            connectivity: config.connectivity,
        })
    }
}

/// Dilation followed by hole filling, sealing the seam between two halves
#[derive(Debug, Clone)]
pub struct MorphologicalCloser {
    params: MorphologyParams,
}

impl MorphologicalCloser {
    pub fn new(params: MorphologyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MorphologyParams {
        &self.params
    }

    /// Seal `grid` in place and hand it back
    pub fn close(&self, mut grid: BinaryVoxelGrid) -> BinaryVoxelGrid {
        let start = Instant::now();
        let before = grid.foreground_count();
        dilate_in_place(&mut grid, self.params.radius, self.params.element);
        let dilated = grid.foreground_count();
        info!(
            radius = self.params.radius,
            element = ?self.params.element,
            grown = dilated - before,
            elapsed = ?start.elapsed(),
            "dilation complete"
        );

        let start = Instant::now();
        let filled = fill_holes(&mut grid, self.params.connectivity);
        info!(
            filled,
            connectivity = ?self.params.connectivity,
            elapsed = ?start.elapsed(),
            "hole filling complete"
        );
        grid
    }
}
