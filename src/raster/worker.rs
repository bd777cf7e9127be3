// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Rasterization workers: a background thread or an external executable

use super::protocol::WorkerRequest;
use super::Rasterizer;
use crate::config::WorkerConfig;
use crate::error::{FuseError, FuseResult};
use crate::geometry::{MeshId, TriangleMesh};
use crate::io::{export_stl, read_nrrd};
use crate::pipeline::CancelToken;
use crate::volume::{BinaryVoxelGrid, GridSpec, LabelValues};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const LOG_TAIL_BYTES: usize = 2048;

/// One mesh to rasterize onto one grid
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest<'a> {
    pub grid: &'a GridSpec,
    pub mesh_ref: &'a MeshId,
    pub mesh: &'a TriangleMesh,
    pub sample_distance: f64,
}

/// Something that turns a surface into a labelmap on a given grid.
///
/// Implementations must give up once `timeout` has elapsed or `cancel`
/// fires, leaving nothing running behind them.
pub trait RasterWorker: Send + Sync {
    fn name(&self) -> String;

    fn rasterize(
        &self,
        request: &RasterRequest<'_>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> FuseResult<BinaryVoxelGrid>;
}

impl<W: RasterWorker + ?Sized> RasterWorker for Box<W> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn rasterize(
        &self,
        request: &RasterRequest<'_>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> FuseResult<BinaryVoxelGrid> {
        (**self).rasterize(request, timeout, cancel)
    }
}

/// Build the worker selected in the configuration
pub fn worker_from_config(config: &WorkerConfig, labels: LabelValues) -> Box<dyn RasterWorker> {
    match config {
        WorkerConfig::InProcess => Box::new(InProcessWorker),
        WorkerConfig::Process { program, args } => {
            Box::new(ProcessWorker::new(program.clone()).with_args(args.clone()).with_labels(labels))
        }
    }
}

fn raster_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs the scanline rasterizer on a dedicated thread of this process
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessWorker;

impl RasterWorker for InProcessWorker {
    fn name(&self) -> String {
        "in-process".to_string()
    }

    fn rasterize(
        &self,
        request: &RasterRequest<'_>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> FuseResult<BinaryVoxelGrid> {
        let spec = request.grid.clone();
        let mesh = request.mesh.clone();
        let sample_distance = request.sample_distance;
        let abort = CancelToken::new();
        let thread_abort = abort.clone();
        let (tx, rx) = mpsc::channel();

        // Slices run on a pool of their own so a caller blocked on a rayon
        // worker cannot starve them
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(raster_threads())
            .thread_name(|i| format!("raster-slice-{}", i))
            .build()
            .map_err(|e| FuseError::WorkerLaunch {
                worker: self.name(),
                source: std::io::Error::other(e.to_string()),
            })?;

        thread::Builder::new()
            .name(format!("raster-{}", request.mesh_ref))
            .spawn(move || {
                let result = pool.install(|| Rasterizer::new(&spec, sample_distance).rasterize(&mesh, &thread_abort));
                // The receiver is gone after a timeout
                let _ = tx.send(result);
            })
            .map_err(|source| FuseError::WorkerLaunch {
                worker: self.name(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                abort.cancel();
                return Err(FuseError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                abort.cancel();
                return Err(FuseError::WorkerTimeout {
                    worker: self.name(),
                    timeout,
                });
            }
            match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(Ok(grid)) => return Ok(grid),
                Ok(Err(FuseError::Cancelled)) => return Err(FuseError::Cancelled),
                Ok(Err(e)) => {
                    return Err(FuseError::WorkerFailure {
                        worker: self.name(),
                        detail: e.to_string(),
                    })
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FuseError::WorkerFailure {
                        worker: self.name(),
                        detail: "rasterizer thread exited without a result".to_string(),
                    })
                }
            }
        }
    }
}

/// Runs an external executable per request.
///
/// The executable receives `--request <file>` after any configured
/// arguments; its stderr is captured and quoted when it fails.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    program: PathBuf,
    args: Vec<String>,
    labels: LabelValues,
}

impl ProcessWorker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            labels: LabelValues::default(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_labels(mut self, labels: LabelValues) -> Self {
        self.labels = labels;
        self
    }

    fn failure(&self, detail: impl Into<String>) -> FuseError {
        FuseError::WorkerFailure {
            worker: self.name(),
            detail: detail.into(),
        }
    }
}

impl RasterWorker for ProcessWorker {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    fn rasterize(
        &self,
        request: &RasterRequest<'_>,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> FuseResult<BinaryVoxelGrid> {
        let scratch = tempfile::Builder::new().prefix("hemifuse-").tempdir()?;
        let job = WorkerRequest {
            grid: request.grid.clone(),
            sample_distance: request.sample_distance,
            mesh_ref: request.mesh_ref.to_string(),
            mesh_path: scratch.path().join("surface.stl"),
            output_path: scratch.path().join("labelmap.nrrd"),
            labels: self.labels,
        };
        export_stl(request.mesh, &job.mesh_path)?;
        let request_path = scratch.path().join("request.json");
        job.save(&request_path)?;

        let log_path = scratch.path().join("worker.log");
        let log = File::create(&log_path)?;

        debug!(worker = %self.name(), mesh = %request.mesh_ref, "launching worker");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--request")
            .arg(&request_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| FuseError::WorkerLaunch {
                worker: self.name(),
                source,
            })?;

        let status = wait_with_deadline(&mut child, timeout, cancel).map_err(|e| match e {
            WaitError::Timeout => FuseError::WorkerTimeout {
                worker: self.name(),
                timeout,
            },
            WaitError::Cancelled => FuseError::Cancelled,
            WaitError::Io(e) => FuseError::Io(e),
        })?;

        if !status.success() {
            return Err(self.failure(format!("{}: {}", status, log_tail(&log_path))));
        }
        if !job.output_path.exists() {
            return Err(self.failure("exited successfully without writing a labelmap"));
        }
        read_nrrd(&job.output_path, &self.labels)
            .map_err(|e| self.failure(format!("unreadable labelmap: {}", e)))
    }
}

enum WaitError {
    Timeout,
    Cancelled,
    Io(std::io::Error),
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<ExitStatus, WaitError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                terminate(child);
                return Err(WaitError::Io(e));
            }
        }
        if cancel.is_cancelled() {
            terminate(child);
            return Err(WaitError::Cancelled);
        }
        if Instant::now() >= deadline {
            terminate(child);
            return Err(WaitError::Timeout);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(pid = child.id(), "failed to kill worker: {}", e);
    }
    let _ = child.wait();
}

fn log_tail(path: &Path) -> String {
    let content = std::fs::read(path).unwrap_or_default();
    let start = content.len().saturating_sub(LOG_TAIL_BYTES);
    let tail = String::from_utf8_lossy(&content[start..]).trim().to_string();
    if tail.is_empty() {
        "no diagnostics".to_string()
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::{Point3, Vector3};

    fn spec() -> GridSpec {
        GridSpec::axis_aligned([6, 6, 6], Vector3::repeat(1.0), Point3::origin()).unwrap()
    }

    #[test]
    fn test_in_process_worker() {
        let grid = spec();
        let mesh = Primitive::cuboid(Point3::new(0.5, 0.5, 0.5), Point3::new(2.5, 2.5, 2.5)).to_mesh();
        let id = MeshId::new("left");
        let request = RasterRequest {
            grid: &grid,
            mesh_ref: &id,
            mesh: &mesh,
            sample_distance: 0.1,
        };

        let result = InProcessWorker
            .rasterize(&request, Duration::from_secs(30), &CancelToken::new())
            .unwrap();
        assert_eq!(result.spec(), &grid);
        assert_eq!(result.foreground_count(), 8);
    }

    #[test]
    fn test_in_process_worker_observes_cancel() {
        let grid = spec();
        let mesh = Primitive::cube(Vector3::repeat(2.0), false).to_mesh();
        let id = MeshId::new("right");
        let request = RasterRequest {
            grid: &grid,
            mesh_ref: &id,
            mesh: &mesh,
            sample_distance: 0.1,
        };
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = InProcessWorker
            .rasterize(&request, Duration::from_secs(30), &cancel)
            .unwrap_err();
        assert!(matches!(err, FuseError::Cancelled));
    }

    #[test]
    fn test_worker_from_config() {
        let worker = worker_from_config(&WorkerConfig::InProcess, LabelValues::default());
        assert_eq!(worker.name(), "in-process");

        let worker = worker_from_config(
            &WorkerConfig::Process {
                program: PathBuf::from("/opt/bin/rasterize"),
                args: vec!["--quiet".to_string()],
            },
            LabelValues::default(),
        );
        assert_eq!(worker.name(), "/opt/bin/rasterize");
    }

    #[test]
    fn test_log_tail_of_missing_file() {
        assert_eq!(log_tail(Path::new("/nonexistent/worker.log")), "no diagnostics");
    }
}
