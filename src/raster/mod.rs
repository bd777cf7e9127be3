// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Raster module - surface to labelmap conversion and its workers

mod protocol;
mod scanline;
mod voxelizer;
mod worker;

pub use protocol::{serve_request, WorkerRequest};
pub use scanline::Rasterizer;
pub use voxelizer::{MeshInput, Voxelizer};
pub use worker::{worker_from_config, InProcessWorker, ProcessWorker, RasterRequest, RasterWorker};
