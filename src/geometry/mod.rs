// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - meshes, bounds and reference planes

mod bbox;
mod mesh;
mod primitives;

pub use bbox::{analyze_bounds, BoundingBox, BoundsAnalysis, ReferencePlanes};
pub use mesh::{MeshId, Side, TriangleMesh};
pub use primitives::Primitive;
