// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for the fusion pipeline

use crate::geometry::Side;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the fusion pipeline stages.
///
/// Every stage validates its own preconditions and fails fast; nothing is
/// retried or silently corrected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FuseError {
    /// A mesh has no vertices, so its bounding box is undefined.
    #[error("{side} mesh has no vertices; bounding box is undefined")]
    EmptyMesh { side: Side },

    /// Grid dimensions, spacing, origin or axis directions are unusable.
    #[error("invalid grid spec: {0}")]
    InvalidGridSpec(String),

    /// Two grids taking part in one operation do not share a grid spec.
    #[error("grid geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// The rasterization worker could not be started.
    #[error("failed to launch rasterization worker `{worker}`: {source}")]
    WorkerLaunch {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// The rasterization worker did not report completion in time.
    #[error("rasterization worker `{worker}` did not complete within {timeout:?}")]
    WorkerTimeout { worker: String, timeout: Duration },

    /// The rasterization worker reported an error status.
    #[error("rasterization worker `{worker}` failed: {detail}")]
    WorkerFailure { worker: String, detail: String },

    /// A numeric parameter is out of range (negative radius, zero divisor, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The store refused or could not receive the result volume.
    #[error("failed to publish volume `{name}`: {reason}")]
    Publish { name: String, reason: String },

    /// The store could not resolve a mesh reference.
    #[error("mesh `{id}` is unavailable: {reason}")]
    MeshUnavailable { id: String, reason: String },

    /// Serialized volume or mesh data could not be decoded.
    #[error("malformed data: {0}")]
    Format(String),

    /// The caller aborted the pipeline.
    #[error("pipeline cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type FuseResult<T> = Result<T, FuseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mesh_names_side() {
        let err = FuseError::EmptyMesh { side: Side::Right };
        assert!(err.to_string().contains("right"));
    }

    #[test]
    fn test_timeout_display() {
        let err = FuseError::WorkerTimeout {
            worker: "in-process".to_string(),
            timeout: Duration::from_secs(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("in-process"));
        assert!(msg.contains("3s"));
    }

    #[test]
    fn test_launch_error_keeps_source() {
        use std::error::Error as _;
        let err = FuseError::WorkerLaunch {
            worker: "/missing".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FuseError>();
    }
}
