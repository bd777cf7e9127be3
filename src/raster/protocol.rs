// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! JSON request exchanged with an out-of-process rasterization worker
//!
//! The parent writes the mesh as binary STL and a [`WorkerRequest`] next to
//! it, then runs the worker with `--request <path>`. The worker answers by
//! writing an NRRD labelmap to `output_path` and exiting with status 0.

use super::Rasterizer;
use crate::error::{FuseError, FuseResult};
use crate::io::{import_stl, write_nrrd};
use crate::pipeline::CancelToken;
use crate::volume::{GridSpec, LabelValues};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Geometry the output labelmap must carry
    pub grid: GridSpec,
    pub sample_distance: f64,
    /// Identifier of the mesh, for logs
    pub mesh_ref: String,
    pub mesh_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub labels: LabelValues,
}

impl WorkerRequest {
    pub fn load(path: &Path) -> FuseResult<Self> {
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content)
            .map_err(|e| FuseError::Format(format!("invalid worker request {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> FuseResult<()> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| FuseError::Format(format!("cannot encode worker request: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Worker side of the exchange. Returns the number of foreground voxels written.
pub fn serve_request(request: &WorkerRequest) -> FuseResult<usize> {
    request.grid.validate()?;
    request.labels.validate()?;
    if !(request.sample_distance.is_finite() && request.sample_distance > 0.0) {
        return Err(FuseError::InvalidParameter(format!(
            "sample distance must be positive, got {}",
            request.sample_distance
        )));
    }

    let mesh = import_stl(&request.mesh_path)?;
    let grid = Rasterizer::new(&request.grid, request.sample_distance).rasterize(&mesh, &CancelToken::new())?;
    write_nrrd(&request.output_path, &grid, &request.labels)?;
    Ok(grid.foreground_count())
}
