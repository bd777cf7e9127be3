// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Voxel-wise boolean union of congruent labelmaps

use crate::error::{FuseError, FuseResult};
use crate::volume::{BinaryVoxelGrid, Voxel};
use rayon::prelude::*;

/// Logical OR of two grids sharing an identical grid spec.
///
/// Inputs are left untouched; a mismatched spec fails with
/// [`FuseError::GeometryMismatch`] and produces nothing.
pub fn union(a: &BinaryVoxelGrid, b: &BinaryVoxelGrid) -> FuseResult<BinaryVoxelGrid> {
    a.spec().ensure_congruent(b.spec())?;
    union_into(a.clone(), b)
}

/// OR `other` into `acc`, reusing the accumulator's buffer
pub fn union_into(mut acc: BinaryVoxelGrid, other: &BinaryVoxelGrid) -> FuseResult<BinaryVoxelGrid> {
    acc.spec().ensure_congruent(other.spec())?;

    acc.voxels_mut()
        .par_iter_mut()
        .zip(other.voxels().par_iter())
        .for_each(|(dst, src)| {
            if src.is_foreground() {
                *dst = Voxel::Foreground;
            }
        });

    Ok(acc)
}

/// Union of any number of grids; fails on an empty input
pub fn union_all<I>(grids: I) -> FuseResult<BinaryVoxelGrid>
where
    I: IntoIterator<Item = BinaryVoxelGrid>,
{
    let mut iter = grids.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| FuseError::InvalidParameter("union of zero grids".to_string()))?;
    iter.try_fold(first, |acc, grid| union_into(acc, &grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::GridSpec;
    use nalgebra::{Point3, Vector3};

    fn spec(spacing: f64) -> GridSpec {
        GridSpec::axis_aligned([4, 4, 4], Vector3::repeat(spacing), Point3::origin()).unwrap()
    }

    #[test]
    fn test_union() {
        let mut a = BinaryVoxelGrid::background(spec(1.0));
        let mut b = BinaryVoxelGrid::background(spec(1.0));
        a.set(0, 0, 0, Voxel::Foreground);
        b.set(3, 3, 3, Voxel::Foreground);
        b.set(0, 0, 0, Voxel::Foreground);

        let result = union(&a, &b).unwrap();
        assert_eq!(result.foreground_count(), 2);
        assert!(result.is_foreground(3, 3, 3));
        assert_eq!(a.foreground_count(), 1);
    }

    #[test]
    fn test_union_rejects_mismatch() {
        let a = BinaryVoxelGrid::background(spec(1.0));
        let b = BinaryVoxelGrid::background(spec(0.5));
        assert!(matches!(union(&a, &b), Err(FuseError::GeometryMismatch(_))));
    }

    #[test]
    fn test_union_all() {
        let grids: Vec<_> = (0..3)
            .map(|i| {
                let mut g = BinaryVoxelGrid::background(spec(1.0));
                g.set(i, 0, 0, Voxel::Foreground);
                g
            })
            .collect();
        assert_eq!(union_all(grids).unwrap().foreground_count(), 3);
        assert!(union_all(Vec::new()).is_err());
    }
}
