// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scanline rasterization of a closed triangle mesh into a labelmap

use crate::error::FuseResult;
use crate::geometry::TriangleMesh;
use crate::pipeline::CancelToken;
use crate::volume::{BinaryVoxelGrid, GridSpec, Voxel};
use nalgebra::Vector3;
use parry3d::math::Point as ParryPoint;
use parry3d::query::PointQuery;
use parry3d::shape::Triangle as ParryTriangle;
use rayon::prelude::*;

/// Triangle prepared for one grid
struct GridTriangle {
    /// Corners in fractional voxel coordinates
    ijk: [Vector3<f64>; 3],
    min: Vector3<f64>,
    max: Vector3<f64>,
    /// Same triangle in world units along the grid axes
    local: ParryTriangle,
}

/// Samples a mesh on a grid: a voxel is foreground when its center is inside
/// the surface (even-odd rule along i-rows) or within `sample_distance` of it.
pub struct Rasterizer<'a> {
    spec: &'a GridSpec,
    sample_distance: f64,
}

impl<'a> Rasterizer<'a> {
    pub fn new(spec: &'a GridSpec, sample_distance: f64) -> Self {
        Self {
            spec,
            sample_distance,
        }
    }

    pub fn rasterize(&self, mesh: &TriangleMesh, cancel: &CancelToken) -> FuseResult<BinaryVoxelGrid> {
        let spec = self.spec;
        let [nx, ny, nz] = spec.dims;
        let band = self.sample_distance.max(0.0);
        let pad = Vector3::new(band / spec.spacing.x, band / spec.spacing.y, band / spec.spacing.z);

        let triangles: Vec<GridTriangle> = mesh.faces().map(|face| self.prepare(face)).collect();

        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); nz];
        for (index, tri) in triangles.iter().enumerate() {
            if let Some((lo, hi)) = index_range(tri.min.z - pad.z, tri.max.z + pad.z, nz) {
                for bin in &mut bins[lo..=hi] {
                    bin.push(index);
                }
            }
        }

        let mut voxels = vec![Voxel::Background; spec.voxel_count()];
        voxels
            .par_chunks_mut(nx * ny)
            .enumerate()
            .for_each(|(k, slice)| {
                if cancel.is_cancelled() {
                    return;
                }
                let candidates: Vec<&GridTriangle> = bins[k].iter().map(|&t| &triangles[t]).collect();
                fill_interior(slice, &candidates, k, nx, ny);
                if band > 0.0 {
                    self.fill_band(slice, &candidates, k, pad, band);
                }
            });

        cancel.check()?;
        BinaryVoxelGrid::from_voxels(spec.clone(), voxels)
    }

    fn prepare(&self, face: [nalgebra::Point3<f64>; 3]) -> GridTriangle {
        let local = face.map(|p| self.spec.to_local(&p));
        let ijk = local.map(|l| l.component_div(&self.spec.spacing));
        let min = ijk[0].inf(&ijk[1]).inf(&ijk[2]);
        let max = ijk[0].sup(&ijk[1]).sup(&ijk[2]);
        let [a, b, c] = local.map(|l| ParryPoint::new(l.x as f32, l.y as f32, l.z as f32));
        GridTriangle {
            ijk,
            min,
            max,
            local: ParryTriangle::new(a, b, c),
        }
    }

    fn fill_band(
        &self,
        slice: &mut [Voxel],
        candidates: &[&GridTriangle],
        k: usize,
        pad: Vector3<f64>,
        band: f64,
    ) {
        let [nx, ny, _] = self.spec.dims;
        let spacing = self.spec.spacing;
        let z = (k as f64 * spacing.z) as f32;

        for tri in candidates {
            let Some((j0, j1)) = index_range(tri.min.y - pad.y, tri.max.y + pad.y, ny) else {
                continue;
            };
            let Some((i0, i1)) = index_range(tri.min.x - pad.x, tri.max.x + pad.x, nx) else {
                continue;
            };
            for j in j0..=j1 {
                let y = (j as f64 * spacing.y) as f32;
                for i in i0..=i1 {
                    let cell = &mut slice[i + nx * j];
                    if cell.is_foreground() {
                        continue;
                    }
                    let center = ParryPoint::new((i as f64 * spacing.x) as f32, y, z);
                    if (tri.local.distance_to_local_point(&center, true) as f64) <= band {
                        *cell = Voxel::Foreground;
                    }
                }
            }
        }
    }
}

/// Even-odd fill of one k-slice from row/triangle crossings
fn fill_interior(slice: &mut [Voxel], candidates: &[&GridTriangle], k: usize, nx: usize, ny: usize) {
    let z = k as f64;
    let mut rows: Vec<Vec<f64>> = vec![Vec::new(); ny];

    for tri in candidates {
        if z < tri.min.z || z > tri.max.z {
            continue;
        }
        let Some((j0, j1)) = index_range(tri.min.y, tri.max.y, ny) else {
            continue;
        };
        for (j, row) in rows.iter_mut().enumerate().take(j1 + 1).skip(j0) {
            if let Some(x) = row_crossing(&tri.ijk, j as f64, z) {
                row.push(x);
            }
        }
    }

    for (j, crossings) in rows.iter_mut().enumerate() {
        if crossings.len() < 2 {
            continue;
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks_exact(2) {
            // Voxel centers i with enter < i <= exit
            let first = (pair[0].floor() + 1.0).max(0.0);
            let last = pair[1].floor().min(nx as f64 - 1.0);
            if first > last {
                continue;
            }
            for i in first as usize..=last as usize {
                slice[i + nx * j] = Voxel::Foreground;
            }
        }
    }
}

/// Where the row through `(y, z)` along the i axis pierces the triangle.
///
/// Points on a shared edge are claimed by exactly one of the two triangles
/// (top-left rule in the y/z projection), so closed surfaces give an even
/// number of crossings.
fn row_crossing(tri: &[Vector3<f64>; 3], y: f64, z: f64) -> Option<f64> {
    let [a, mut b, mut c] = *tri;
    let mut area = edge(&a, &b, y_z(&c));
    if area == 0.0 {
        return None;
    }
    if area < 0.0 {
        std::mem::swap(&mut b, &mut c);
        area = -area;
    }

    let p = (y, z);
    let w0 = edge(&b, &c, p);
    let w1 = edge(&c, &a, p);
    let w2 = edge(&a, &b, p);
    if !(covers(w0, &b, &c) && covers(w1, &c, &a) && covers(w2, &a, &b)) {
        return None;
    }
    Some((w0 * a.x + w1 * b.x + w2 * c.x) / area)
}

fn y_z(v: &Vector3<f64>) -> (f64, f64) {
    (v.y, v.z)
}

fn edge(u: &Vector3<f64>, v: &Vector3<f64>, p: (f64, f64)) -> f64 {
    (v.y - u.y) * (p.1 - u.z) - (v.z - u.z) * (p.0 - u.y)
}

fn covers(weight: f64, u: &Vector3<f64>, v: &Vector3<f64>) -> bool {
    weight > 0.0 || (weight == 0.0 && owns_edge(u, v))
}

fn owns_edge(u: &Vector3<f64>, v: &Vector3<f64>) -> bool {
    let dz = v.z - u.z;
    dz > 0.0 || (dz == 0.0 && v.y - u.y < 0.0)
}

/// Integer indices in `[lo, hi]` that fall inside `0..n`
fn index_range(lo: f64, hi: f64, n: usize) -> Option<(usize, usize)> {
    if !(lo.is_finite() && hi.is_finite()) || n == 0 {
        return None;
    }
    let start = lo.ceil().max(0.0);
    let end = hi.floor().min(n as f64 - 1.0);
    if start > end {
        return None;
    }
    Some((start as usize, end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FuseError;
    use crate::geometry::Primitive;
    use nalgebra::{Matrix3, Point3, Rotation3};

    fn unit_grid(dims: [usize; 3]) -> GridSpec {
        GridSpec::axis_aligned(dims, Vector3::repeat(1.0), Point3::origin()).unwrap()
    }

    #[test]
    fn test_cube_fills_enclosed_centers() {
        let spec = unit_grid([8, 8, 8]);
        let mesh = Primitive::cuboid(Point3::new(1.5, 1.5, 1.5), Point3::new(4.5, 5.5, 3.5)).to_mesh();
        let grid = Rasterizer::new(&spec, 0.1).rasterize(&mesh, &CancelToken::new()).unwrap();

        assert_eq!(grid.foreground_count(), 3 * 4 * 2);
        assert!(grid.is_foreground(2, 2, 2));
        assert!(grid.is_foreground(4, 5, 3));
        assert!(!grid.is_foreground(5, 5, 3));
        assert!(!grid.is_foreground(1, 1, 1));
    }

    #[test]
    fn test_rows_through_shared_edges_stay_balanced() {
        // Corners on voxel centers put rows exactly on face diagonals and edges
        let spec = unit_grid([8, 8, 8]);
        let mesh = Primitive::cuboid(Point3::new(1.0, 1.0, 1.0), Point3::new(5.0, 5.0, 5.0)).to_mesh();
        let grid = Rasterizer::new(&spec, 0.0).rasterize(&mesh, &CancelToken::new()).unwrap();

        for k in 2..5 {
            for j in 2..5 {
                for i in 2..5 {
                    assert!(grid.is_foreground(i, j, k), "({}, {}, {})", i, j, k);
                }
            }
        }
        assert!(!grid.is_foreground(6, 3, 3));
        assert!(!grid.is_foreground(3, 6, 3));
        assert!(!grid.is_foreground(0, 0, 0));
    }

    #[test]
    fn test_sample_distance_band() {
        let spec = unit_grid([8, 8, 8]);
        let mesh = Primitive::cuboid(Point3::new(1.5, 1.5, 1.5), Point3::new(4.5, 4.5, 4.5)).to_mesh();

        let tight = Rasterizer::new(&spec, 0.1).rasterize(&mesh, &CancelToken::new()).unwrap();
        let loose = Rasterizer::new(&spec, 0.6).rasterize(&mesh, &CancelToken::new()).unwrap();

        assert_eq!(tight.foreground_count(), 27);
        assert!(tight.is_subset_of(&loose));
        assert!(loose.is_foreground(1, 3, 3));
        assert!(loose.is_foreground(5, 3, 3));
        assert!(!loose.is_foreground(1, 1, 1));
    }

    #[test]
    fn test_flipped_axes_grid() {
        let spec = GridSpec::new(
            [10, 10, 10],
            Vector3::repeat(0.5),
            Point3::new(4.0, 4.0, 0.0),
            Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0)),
        )
        .unwrap();
        // World x in [0.25, 1.75] maps to i in [4.5, 7.5]
        let mesh = Primitive::cuboid(Point3::new(0.25, 0.25, 0.25), Point3::new(1.75, 1.75, 1.75)).to_mesh();
        let grid = Rasterizer::new(&spec, 0.05).rasterize(&mesh, &CancelToken::new()).unwrap();

        assert_eq!(grid.foreground_count(), 27);
        assert!(grid.is_foreground(5, 5, 1));
        assert!(grid.is_foreground(7, 7, 3));
        assert!(!grid.is_foreground(4, 5, 1));
    }

    #[test]
    fn test_mesh_outside_grid_is_clipped() {
        let spec = unit_grid([4, 4, 4]);
        let mesh = Primitive::cuboid(Point3::new(2.5, 0.5, 0.5), Point3::new(9.5, 2.5, 2.5)).to_mesh();
        let grid = Rasterizer::new(&spec, 0.0).rasterize(&mesh, &CancelToken::new()).unwrap();
        assert_eq!(grid.foreground_count(), 4);
    }

    #[test]
    fn test_rotated_sphere_rows_are_single_runs() {
        let spec = unit_grid([32, 32, 32]);
        let center = Point3::new(16.0, 16.0, 16.0);
        let rotation = Rotation3::from_euler_angles(0.3, 0.5, 0.7);
        let mut mesh = Primitive::sphere(center, 10.0, 10).to_mesh();
        for v in &mut mesh.vertices {
            *v = center + rotation * (*v - center);
        }
        let grid = Rasterizer::new(&spec, 0.0).rasterize(&mesh, &CancelToken::new()).unwrap();

        assert!(grid.is_foreground(16, 16, 16));
        for k in 0..32 {
            for j in 0..32 {
                let row: Vec<usize> = (0..32).filter(|&i| grid.is_foreground(i, j, k)).collect();
                if let (Some(first), Some(last)) = (row.first(), row.last()) {
                    // A convex solid meets every row in one interval
                    assert_eq!(row.len(), last - first + 1, "row j={} k={}: {:?}", j, k, row);
                }
            }
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let spec = unit_grid([4, 4, 4]);
        let mesh = Primitive::cube(Vector3::repeat(2.0), false).to_mesh();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Rasterizer::new(&spec, 0.1).rasterize(&mesh, &cancel).unwrap_err();
        assert!(matches!(err, FuseError::Cancelled));
    }
}
