// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Store module - where meshes come from and where results go

mod directory;
mod memory;
mod publisher;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;
pub use publisher::{ResultPublisher, Transients};

use crate::error::{FuseError, FuseResult};
use crate::geometry::{MeshId, TriangleMesh};
use crate::volume::{BinaryVoxelGrid, LabelValues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// External home of input meshes and published volumes.
///
/// Publishing never overwrites: when `name` is taken the store picks
/// `name_1`, `name_2`, ... and reports the final name in the receipt.
pub trait VolumeStore: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    fn fetch_mesh(&self, id: &MeshId) -> FuseResult<TriangleMesh>;

    fn publish(&self, name: &str, grid: BinaryVoxelGrid) -> FuseResult<PublishReceipt>;
}

/// What a store reports back after accepting a volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Final name, possibly uniquified
    pub name: String,
    pub location: String,
    pub dims: [usize; 3],
    pub voxels: usize,
    pub foreground: usize,
    /// SHA-256 of the encoded label bytes, lowercase hex
    pub digest: String,
    pub published_at: DateTime<Utc>,
}

impl PublishReceipt {
    pub fn new(name: String, location: String, grid: &BinaryVoxelGrid, labels: &LabelValues) -> Self {
        Self {
            name,
            location,
            dims: grid.dims(),
            voxels: grid.voxels().len(),
            foreground: grid.foreground_count(),
            digest: label_digest(grid, labels),
            published_at: Utc::now(),
        }
    }
}

/// SHA-256 over the dimensions and label bytes of a grid
pub fn label_digest(grid: &BinaryVoxelGrid, labels: &LabelValues) -> String {
    let mut hasher = Sha256::new();
    for n in grid.dims() {
        hasher.update((n as u64).to_le_bytes());
    }
    hasher.update(grid.to_labels(labels));
    format!("{:x}", hasher.finalize())
}

/// Names tried for `base`: `base`, `base_1`, `base_2`, ...
pub(crate) fn candidate_names(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1..).map(move |n| format!("{}_{}", base, n)))
}

pub(crate) fn check_volume_name(name: &str) -> FuseResult<()> {
    let bad = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == ".."
        || name.chars().any(char::is_control);
    if bad {
        return Err(FuseError::Publish {
            name: name.to_string(),
            reason: "invalid volume name".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{GridSpec, Voxel};
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_candidate_names() {
        let names: Vec<String> = candidate_names("union").take(3).collect();
        assert_eq!(names, vec!["union", "union_1", "union_2"]);
    }

    #[test]
    fn test_volume_names() {
        assert!(check_volume_name("left_right_union").is_ok());
        for bad in ["", "  ", "a/b", "..", "x\ny"] {
            assert!(check_volume_name(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_digest_tracks_content() {
        let spec = GridSpec::axis_aligned([3, 3, 3], Vector3::repeat(1.0), Point3::origin()).unwrap();
        let mut grid = BinaryVoxelGrid::background(spec);
        let labels = LabelValues::default();
        let before = label_digest(&grid, &labels);
        assert_eq!(before.len(), 64);
        assert_eq!(before, label_digest(&grid.clone(), &labels));

        grid.set(1, 1, 1, Voxel::Foreground);
        assert_ne!(before, label_digest(&grid, &labels));
    }
}
