// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Binary dilation with ball or box structuring elements

use crate::volume::{BinaryVoxelGrid, Voxel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Shape of the dilation neighbourhood, measured in voxels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringElement {
    /// Offsets with `di² + dj² + dk² <= r²`
    #[default]
    Ball,
    /// Offsets with `max(|di|, |dj|, |dk|) <= r`
    Box,
}

impl StructuringElement {
    /// In-slice offsets `(di, dj)` of the element at slice offset `dk`
    pub fn plane_offsets(&self, radius: usize, dk: isize) -> Vec<(isize, isize)> {
        let r = radius as isize;
        if dk.abs() > r {
            return Vec::new();
        }

        let mut offsets = Vec::new();
        match self {
            StructuringElement::Ball => {
                let remaining = r * r - dk * dk;
                for dj in -r..=r {
                    let row = remaining - dj * dj;
                    if row < 0 {
                        continue;
                    }
                    for di in -r..=r {
                        if di * di <= row {
                            offsets.push((di, dj));
                        }
                    }
                }
            }
            StructuringElement::Box => {
                for dj in -r..=r {
                    for di in -r..=r {
                        offsets.push((di, dj));
                    }
                }
            }
        }
        offsets
    }

    /// Number of voxels covered by the element
    pub fn volume(&self, radius: usize) -> usize {
        let r = radius as isize;
        (-r..=r).map(|dk| self.plane_offsets(radius, dk).len()).sum()
    }
}

/// Grow the foreground: a voxel becomes foreground when a foreground voxel
/// lies within the element centred on it. Radius zero returns the input.
pub fn dilate(grid: &BinaryVoxelGrid, radius: usize, element: StructuringElement) -> BinaryVoxelGrid {
    let mut result = grid.clone();
    if radius > 0 {
        stamp_boundary(grid, &mut result, radius, element);
    }
    result
}

/// In-place variant of [`dilate`]
pub fn dilate_in_place(grid: &mut BinaryVoxelGrid, radius: usize, element: StructuringElement) {
    if radius == 0 {
        return;
    }
    let source = grid.clone();
    stamp_boundary(&source, grid, radius, element);
}

// Interior voxels cannot reach anything their boundary neighbours do not,
// so only foreground voxels next to background are stamped.
fn stamp_boundary(
    source: &BinaryVoxelGrid,
    target: &mut BinaryVoxelGrid,
    radius: usize,
    element: StructuringElement,
) {
    let [nx, ny, nz] = source.dims();
    let r = radius as isize;

    let boundary: Vec<Vec<(usize, usize)>> = (0..nz)
        .into_par_iter()
        .map(|k| {
            let mut slice = Vec::new();
            for j in 0..ny {
                for i in 0..nx {
                    if source.is_foreground(i, j, k) && touches_background(source, i, j, k) {
                        slice.push((i, j));
                    }
                }
            }
            slice
        })
        .collect();

    let planes: Vec<Vec<(isize, isize)>> = (-r..=r)
        .map(|dk| element.plane_offsets(radius, dk))
        .collect();

    target
        .voxels_mut()
        .par_chunks_mut(nx * ny)
        .enumerate()
        .for_each(|(k, slice)| {
            for (plane, dk) in planes.iter().zip(-r..=r) {
                let src = k as isize - dk;
                if src < 0 || src >= nz as isize {
                    continue;
                }
                for &(bi, bj) in &boundary[src as usize] {
                    for &(di, dj) in plane {
                        let i = bi as isize + di;
                        let j = bj as isize + dj;
                        if i >= 0 && j >= 0 && (i as usize) < nx && (j as usize) < ny {
                            slice[i as usize + nx * j as usize] = Voxel::Foreground;
                        }
                    }
                }
            }
        });
}

fn touches_background(grid: &BinaryVoxelGrid, i: usize, j: usize, k: usize) -> bool {
    const FACES: [[isize; 3]; 6] = [
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
    ];
    FACES.iter().any(|[di, dj, dk]| {
        let (ni, nj, nk) = (i as isize + di, j as isize + dj, k as isize + dk);
        grid.spec().contains(ni, nj, nk)
            && !grid.is_foreground(ni as usize, nj as usize, nk as usize)
    })
}
