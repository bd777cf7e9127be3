// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fusion pipeline orchestration
//!
//! fetch meshes → bounds → canonical grid → voxelize ×2 → union → close → publish

use crate::config::PipelineConfig;
use crate::error::{FuseError, FuseResult};
use crate::geometry::{analyze_bounds, BoundsAnalysis, MeshId, Side};
use crate::morphology::{union_into, MorphologicalCloser, MorphologyParams};
use crate::raster::{MeshInput, RasterWorker, Voxelizer};
use crate::store::{check_volume_name, PublishReceipt, ResultPublisher, Transients, VolumeStore};
use crate::volume::{CanonicalGrid, GridSpec};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CANVAS: &str = "canvas";
const LEFT: &str = "left";
const RIGHT: &str = "right";
const COMBINED: &str = "combined";

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set
    pub fn check(&self) -> FuseResult<()> {
        if self.is_cancelled() {
            Err(FuseError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Which meshes to fuse and where the result goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseRequest {
    pub left: MeshId,
    pub right: MeshId,
    pub output_name: String,
}

impl FuseRequest {
    pub fn new(left: impl Into<MeshId>, right: impl Into<MeshId>, output_name: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            output_name: output_name.into(),
        }
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct FuseOutcome {
    pub receipt: PublishReceipt,
    pub analysis: BoundsAnalysis,
    pub params: MorphologyParams,
    pub grid: GridSpec,
    pub elapsed: Duration,
}

/// Runs the whole fusion for one pair of meshes
pub struct FusePipeline {
    config: PipelineConfig,
    voxelizer: Voxelizer,
}

impl FusePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let voxelizer = Voxelizer::from_config(&config.voxelizer, config.labels);
        Self { config, voxelizer }
    }

    /// Use `worker` instead of the one named in the configuration
    pub fn with_worker(config: PipelineConfig, worker: Box<dyn RasterWorker>) -> Self {
        let voxelizer = Voxelizer::new(worker, config.voxelizer.sample_distance, config.voxelizer.timeout);
        Self { config, voxelizer }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch both meshes and report their bounds without voxelizing
    pub fn analyze(&self, store: &dyn VolumeStore, left: &MeshId, right: &MeshId) -> FuseResult<BoundsAnalysis> {
        let left_mesh = store.fetch_mesh(left)?;
        let right_mesh = store.fetch_mesh(right)?;
        analyze_bounds(&left_mesh, &right_mesh)
    }

    pub fn run(&self, store: &dyn VolumeStore, request: &FuseRequest, cancel: &CancelToken) -> FuseResult<FuseOutcome> {
        let mut transients = Transients::new();
        self.run_with(store, request, cancel, &mut transients)
    }

    /// Like [`FusePipeline::run`] with a caller-owned ledger of intermediates,
    /// which is empty again when this returns, successful or not.
    pub fn run_with(
        &self,
        store: &dyn VolumeStore,
        request: &FuseRequest,
        cancel: &CancelToken,
        transients: &mut Transients,
    ) -> FuseResult<FuseOutcome> {
        let result = self.execute(store, request, cancel, transients);
        let leftover = transients.release_all();
        if let Err(e) = &result {
            warn!(error = %e, released = leftover, "fusion aborted");
        }
        result
    }

    fn execute(
        &self,
        store: &dyn VolumeStore,
        request: &FuseRequest,
        cancel: &CancelToken,
        transients: &mut Transients,
    ) -> FuseResult<FuseOutcome> {
        let start = Instant::now();
        self.config.validate()?;
        check_volume_name(&request.output_name)?;
        cancel.check()?;

        let left_mesh = store.fetch_mesh(&request.left)?;
        let right_mesh = store.fetch_mesh(&request.right)?;
        let analysis = analyze_bounds(&left_mesh, &right_mesh)?;
        let planes = &analysis.planes;
        info!(
            left = planes.left_bound,
            right = planes.right_bound,
            midline = planes.midline,
            span = planes.span(),
            "bounds analyzed"
        );

        let params = MorphologyParams::from_planes(planes, &self.config.morphology)?;
        let canonical = CanonicalGrid::new(self.config.grid.clone());
        let spec = canonical.spec(&analysis)?;
        cancel.check()?;

        transients.hold(CANVAS, canonical.canvas(spec.clone()));
        let (left, right) = self.voxelizer.voxelize_pair(
            transients.require(CANVAS)?,
            MeshInput {
                side: Side::Left,
                id: &request.left,
                mesh: &left_mesh,
            },
            MeshInput {
                side: Side::Right,
                id: &request.right,
                mesh: &right_mesh,
            },
            self.config.parallel,
            cancel,
        )?;
        transients.release(CANVAS);
        transients.hold(LEFT, left);
        transients.hold(RIGHT, right);
        cancel.check()?;

        transients
            .require(LEFT)?
            .spec()
            .ensure_congruent(transients.require(RIGHT)?.spec())?;
        let combined = union_into(transients.take(LEFT)?, transients.require(RIGHT)?)?;
        transients.release(RIGHT);
        info!(foreground = combined.foreground_count(), "union complete");
        transients.hold(COMBINED, combined);
        cancel.check()?;

        let closed = MorphologicalCloser::new(params).close(transients.take(COMBINED)?);
        cancel.check()?;

        let receipt = ResultPublisher::new(store).publish(&request.output_name, closed, transients)?;
        let elapsed = start.elapsed();
        info!(name = %receipt.name, elapsed = ?elapsed, "fusion complete");

        Ok(FuseOutcome {
            receipt,
            analysis,
            params,
            grid: spec,
            elapsed,
        })
    }
}
