// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hemifuse
//!
//! Volumetric union of two surface meshes into one sealed binary labelmap.
//! Both meshes are rasterized on a shared canonical grid, OR-ed together,
//! then dilated and hole-filled so the seam between the halves closes.

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod morphology;
pub mod pipeline;
pub mod raster;
pub mod store;
pub mod volume;

pub use config::PipelineConfig;
pub use error::{FuseError, FuseResult};
pub use geometry::{analyze_bounds, BoundsAnalysis, MeshId, Primitive, ReferencePlanes, Side, TriangleMesh};
pub use morphology::{union, MorphologicalCloser, MorphologyParams};
pub use pipeline::{CancelToken, FuseOutcome, FusePipeline, FuseRequest};
pub use raster::{RasterWorker, Voxelizer};
pub use store::{DirectoryStore, MemoryStore, PublishReceipt, VolumeStore};
pub use volume::{BinaryVoxelGrid, CanonicalGrid, GridSpec, Voxel};

/// Fuse two stored meshes with `config` and publish the result as `output_name`
pub fn fuse(
    store: &dyn VolumeStore,
    left: &MeshId,
    right: &MeshId,
    output_name: &str,
    config: PipelineConfig,
) -> FuseResult<PublishReceipt> {
    let request = FuseRequest::new(left.clone(), right.clone(), output_name);
    let outcome = FusePipeline::new(config).run(store, &request, &CancelToken::new())?;
    Ok(outcome.receipt)
}
