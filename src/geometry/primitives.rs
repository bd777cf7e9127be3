// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed primitive meshes used for fixtures, demos and benchmarks

use super::TriangleMesh;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
pub enum Primitive {
    Cuboid { min: Point3<f64>, max: Point3<f64> },
    Sphere { center: Point3<f64>, r: f64, segments: u32 },
}

impl Primitive {
    /// Axis-aligned box with the given size, either centered on the origin or
    /// with its minimum corner at the origin
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        let min = if center {
            Point3::from(-size / 2.0)
        } else {
            Point3::origin()
        };
        Self::Cuboid {
            min,
            max: min + size,
        }
    }

    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self::Cuboid { min, max }
    }

    pub fn sphere(center: Point3<f64>, r: f64, segments: u32) -> Self {
        let segments = if segments >= 3 { segments } else { 32 };
        Self::Sphere {
            center,
            r,
            segments,
        }
    }

    pub fn to_mesh(&self) -> TriangleMesh {
        match self {
            Self::Cuboid { min, max } => generate_cuboid_mesh(*min, *max),
            Self::Sphere { center, r, segments } => generate_sphere_mesh(*center, *r, *segments),
        }
    }
}

fn generate_cuboid_mesh(min: Point3<f64>, max: Point3<f64>) -> TriangleMesh {
    let mut mesh = TriangleMesh::with_capacity(8, 12);

    let corners = [
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];
    for corner in corners {
        mesh.add_vertex(corner);
    }

    // Outward winding
    let faces = [
        [4, 5, 6],
        [4, 6, 7],
        [1, 0, 3],
        [1, 3, 2],
        [5, 1, 2],
        [5, 2, 6],
        [0, 4, 7],
        [0, 7, 3],
        [7, 6, 2],
        [7, 2, 3],
        [0, 1, 5],
        [0, 5, 4],
    ];
    for face in faces {
        mesh.add_triangle(face);
    }

    mesh
}

fn generate_sphere_mesh(center: Point3<f64>, radius: f64, segments: u32) -> TriangleMesh {
    let segments = segments.max(3);
    let stacks = segments as usize;
    let slices = segments as usize;
    let mut mesh = TriangleMesh::with_capacity(2 + (stacks - 1) * slices, 2 * slices * (stacks - 1));

    // Single pole vertices and closed rings keep the surface watertight
    let north = mesh.add_vertex(center + Vector3::new(0.0, radius, 0.0));
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        let y = radius * phi.cos();
        let r = radius * phi.sin();

        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            mesh.add_vertex(center + Vector3::new(r * theta.cos(), y, r * theta.sin()));
        }
    }
    let south = mesh.add_vertex(center - Vector3::new(0.0, radius, 0.0));

    let ring = |i: usize, j: usize| 1 + (i - 1) * slices + j % slices;

    for j in 0..slices {
        mesh.add_triangle([ring(1, j), ring(1, j + 1), north]);
    }
    for i in 1..stacks - 1 {
        for j in 0..slices {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
            mesh.add_triangle([a, c, b]);
            mesh.add_triangle([c, d, b]);
        }
    }
    for j in 0..slices {
        mesh.add_triangle([ring(stacks - 1, j), south, ring(stacks - 1, j + 1)]);
    }

    mesh
}
