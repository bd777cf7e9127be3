// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Volume module - grid geometry and binary labelmaps

mod canonical;
mod grid;
mod spec;

pub use canonical::CanonicalGrid;
pub use grid::{BinaryVoxelGrid, LabelValues, Voxel};
pub use spec::GridSpec;
