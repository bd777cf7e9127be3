// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh to labelmap conversion on a shared canvas

use super::worker::{worker_from_config, RasterRequest, RasterWorker};
use crate::config::VoxelizerConfig;
use crate::error::{FuseError, FuseResult};
use crate::geometry::{MeshId, Side, TriangleMesh};
use crate::pipeline::CancelToken;
use crate::volume::{BinaryVoxelGrid, LabelValues};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A mesh together with the identifier it was fetched under
#[derive(Debug, Clone, Copy)]
pub struct MeshInput<'a> {
    pub side: Side,
    pub id: &'a MeshId,
    pub mesh: &'a TriangleMesh,
}

/// Drives a [`RasterWorker`] so that every output shares the canvas geometry
pub struct Voxelizer {
    worker: Box<dyn RasterWorker>,
    sample_distance: f64,
    timeout: Duration,
}

impl Voxelizer {
    pub fn new(worker: Box<dyn RasterWorker>, sample_distance: f64, timeout: Duration) -> Self {
        Self {
            worker,
            sample_distance,
            timeout,
        }
    }

    pub fn from_config(config: &VoxelizerConfig, labels: LabelValues) -> Self {
        Self::new(
            worker_from_config(&config.worker, labels),
            config.sample_distance,
            config.timeout,
        )
    }

    pub fn worker_name(&self) -> String {
        self.worker.name()
    }

    pub fn sample_distance(&self) -> f64 {
        self.sample_distance
    }

    /// Rasterize one mesh onto the canvas geometry. The canvas is only read.
    pub fn voxelize(
        &self,
        canvas: &BinaryVoxelGrid,
        input: MeshInput<'_>,
        cancel: &CancelToken,
    ) -> FuseResult<BinaryVoxelGrid> {
        if !(self.sample_distance.is_finite() && self.sample_distance > 0.0) {
            return Err(FuseError::InvalidParameter(format!(
                "sample distance must be positive, got {}",
                self.sample_distance
            )));
        }
        if input.mesh.is_empty() {
            return Err(FuseError::EmptyMesh { side: input.side });
        }
        cancel.check()?;

        let start = Instant::now();
        debug!(
            side = %input.side,
            mesh = %input.id,
            triangles = input.mesh.triangle_count(),
            worker = %self.worker.name(),
            "voxelizing"
        );

        let request = RasterRequest {
            grid: canvas.spec(),
            mesh_ref: input.id,
            mesh: input.mesh,
            sample_distance: self.sample_distance,
        };
        let grid = self.worker.rasterize(&request, self.timeout, cancel)?;

        if let Some(reason) = canvas.spec().mismatch(grid.spec()) {
            return Err(FuseError::WorkerFailure {
                worker: self.worker.name(),
                detail: format!("labelmap geometry differs from the canvas: {}", reason),
            });
        }

        info!(
            side = %input.side,
            mesh = %input.id,
            foreground = grid.foreground_count(),
            elapsed = ?start.elapsed(),
            "voxelized"
        );
        Ok(grid)
    }

    /// Rasterize both meshes, concurrently when `parallel` is set.
    /// When both fail, the left error is reported.
    pub fn voxelize_pair(
        &self,
        canvas: &BinaryVoxelGrid,
        left: MeshInput<'_>,
        right: MeshInput<'_>,
        parallel: bool,
        cancel: &CancelToken,
    ) -> FuseResult<(BinaryVoxelGrid, BinaryVoxelGrid)> {
        if parallel {
            // Plain threads: each call blocks until its worker answers
            let (l, r) = thread::scope(|scope| {
                let handle = scope.spawn(|| self.voxelize(canvas, left, cancel));
                let r = self.voxelize(canvas, right, cancel);
                let l = handle.join().unwrap_or_else(|_| {
                    Err(FuseError::WorkerFailure {
                        worker: self.worker.name(),
                        detail: format!("voxelization of `{}` panicked", left.id),
                    })
                });
                (l, r)
            });
            Ok((l?, r?))
        } else {
            let l = self.voxelize(canvas, left, cancel)?;
            let r = self.voxelize(canvas, right, cancel)?;
            Ok((l, r))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::raster::InProcessWorker;
    use crate::volume::{GridSpec, Voxel};
    use nalgebra::{Point3, Vector3};

    /// Worker returning a grid on the wrong geometry
    struct Skewed;

    impl RasterWorker for Skewed {
        fn name(&self) -> String {
            "skewed".to_string()
        }

        fn rasterize(
            &self,
            request: &RasterRequest<'_>,
            _timeout: Duration,
            _cancel: &CancelToken,
        ) -> FuseResult<BinaryVoxelGrid> {
            let mut spec = request.grid.clone();
            spec.origin.x += 1.0;
            Ok(BinaryVoxelGrid::background(spec))
        }
    }

    fn canvas() -> BinaryVoxelGrid {
        let spec = GridSpec::axis_aligned([10, 6, 6], Vector3::repeat(1.0), Point3::origin()).unwrap();
        BinaryVoxelGrid::filled(spec, Voxel::Foreground)
    }

    #[test]
    fn test_voxelize_pair_shares_canvas_geometry() {
        let canvas = canvas();
        let voxelizer = Voxelizer::new(Box::new(InProcessWorker), 0.1, Duration::from_secs(30));
        let left_mesh = Primitive::cuboid(Point3::new(0.5, 0.5, 0.5), Point3::new(3.5, 3.5, 3.5)).to_mesh();
        let right_mesh = Primitive::cuboid(Point3::new(5.5, 0.5, 0.5), Point3::new(8.5, 3.5, 3.5)).to_mesh();
        let (lid, rid) = (MeshId::new("l"), MeshId::new("r"));

        for parallel in [true, false] {
            let (left, right) = voxelizer
                .voxelize_pair(
                    &canvas,
                    MeshInput { side: Side::Left, id: &lid, mesh: &left_mesh },
                    MeshInput { side: Side::Right, id: &rid, mesh: &right_mesh },
                    parallel,
                    &CancelToken::new(),
                )
                .unwrap();
            assert_eq!(left.spec(), canvas.spec());
            assert_eq!(right.spec(), canvas.spec());
            assert_eq!(left.foreground_count(), 27);
            assert!(left.is_foreground(1, 1, 1));
            assert!(right.is_foreground(8, 3, 3));
        }
        assert_eq!(canvas.foreground_count(), 360);
    }

    #[test]
    fn test_pair_completes_inside_a_single_thread_pool() {
        let canvas = canvas();
        let voxelizer = Voxelizer::new(Box::new(InProcessWorker), 0.1, Duration::from_secs(20));
        let left_mesh = Primitive::cuboid(Point3::new(0.5, 0.5, 0.5), Point3::new(3.5, 3.5, 3.5)).to_mesh();
        let right_mesh = Primitive::cuboid(Point3::new(5.5, 0.5, 0.5), Point3::new(8.5, 3.5, 3.5)).to_mesh();
        let (lid, rid) = (MeshId::new("l"), MeshId::new("r"));

        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let (left, right) = pool
            .install(|| {
                voxelizer.voxelize_pair(
                    &canvas,
                    MeshInput { side: Side::Left, id: &lid, mesh: &left_mesh },
                    MeshInput { side: Side::Right, id: &rid, mesh: &right_mesh },
                    true,
                    &CancelToken::new(),
                )
            })
            .unwrap();
        assert_eq!(left.foreground_count(), 27);
        assert_eq!(right.foreground_count(), 27);
    }

    #[test]
    fn test_rejects_bad_sample_distance() {
        let canvas = canvas();
        let mesh = Primitive::cube(Vector3::repeat(2.0), false).to_mesh();
        let id = MeshId::new("l");
        for bad in [0.0, -0.1, f64::NAN] {
            let voxelizer = Voxelizer::new(Box::new(InProcessWorker), bad, Duration::from_secs(30));
            let err = voxelizer
                .voxelize(&canvas, MeshInput { side: Side::Left, id: &id, mesh: &mesh }, &CancelToken::new())
                .unwrap_err();
            assert!(matches!(err, FuseError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_rejects_foreign_geometry() {
        let canvas = canvas();
        let mesh = Primitive::cube(Vector3::repeat(2.0), false).to_mesh();
        let id = MeshId::new("l");
        let voxelizer = Voxelizer::new(Box::new(Skewed), 0.1, Duration::from_secs(30));
        let err = voxelizer
            .voxelize(&canvas, MeshInput { side: Side::Left, id: &id, mesh: &mesh }, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FuseError::WorkerFailure { .. }));
    }
}
