// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Interior hole filling

use crate::volume::{BinaryVoxelGrid, Voxel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Neighbourhood used when walking background voxels out to the border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// 6 face neighbours
    Face,
    /// 26 face, edge and corner neighbours
    #[default]
    Full,
}

impl Connectivity {
    pub fn offsets(&self) -> Vec<[isize; 3]> {
        let mut offsets = Vec::with_capacity(26);
        for dk in -1..=1isize {
            for dj in -1..=1isize {
                for di in -1..=1isize {
                    let manhattan = di.abs() + dj.abs() + dk.abs();
                    let keep = match self {
                        Connectivity::Face => manhattan == 1,
                        Connectivity::Full => manhattan > 0,
                    };
                    if keep {
                        offsets.push([di, dj, dk]);
                    }
                }
            }
        }
        offsets
    }
}

/// Relabel background voxels that cannot reach the grid border through
/// background as foreground. Returns the number of voxels filled.
pub fn fill_holes(grid: &mut BinaryVoxelGrid, connectivity: Connectivity) -> usize {
    let [nx, ny, nz] = grid.dims();
    let offsets = connectivity.offsets();
    let mut reachable = vec![false; grid.voxels().len()];
    let mut queue = VecDeque::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let on_border =
                    i == 0 || j == 0 || k == 0 || i == nx - 1 || j == ny - 1 || k == nz - 1;
                if !on_border {
                    continue;
                }
                let index = grid.spec().index(i, j, k);
                if !grid.voxels()[index].is_foreground() {
                    reachable[index] = true;
                    queue.push_back([i, j, k]);
                }
            }
        }
    }

    while let Some([i, j, k]) = queue.pop_front() {
        for [di, dj, dk] in &offsets {
            let (ni, nj, nk) = (i as isize + di, j as isize + dj, k as isize + dk);
            if !grid.spec().contains(ni, nj, nk) {
                continue;
            }
            let (ni, nj, nk) = (ni as usize, nj as usize, nk as usize);
            let index = grid.spec().index(ni, nj, nk);
            if !reachable[index] && !grid.voxels()[index].is_foreground() {
                reachable[index] = true;
                queue.push_back([ni, nj, nk]);
            }
        }
    }

    let mut filled = 0;
    for (voxel, reached) in grid.voxels_mut().iter_mut().zip(&reachable) {
        if !voxel.is_foreground() && !reached {
            *voxel = Voxel::Foreground;
            filled += 1;
        }
    }
    filled
}
