// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Result delivery and bookkeeping of intermediate grids

use super::{PublishReceipt, VolumeStore};
use crate::error::{FuseError, FuseResult};
use crate::volume::BinaryVoxelGrid;
use std::time::Instant;
use tracing::{debug, info};

/// Ledger of the intermediate grids owned by one pipeline run.
///
/// Grids are parked here between stages and dropped the moment their
/// consumer is done with them. Whatever is still parked when the ledger
/// is dropped gets released too, so error paths leak nothing.
#[derive(Debug, Default)]
pub struct Transients {
    held: Vec<(String, BinaryVoxelGrid)>,
    released: Vec<String>,
}

impl Transients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a grid under `label`, replacing (and releasing) any previous one
    pub fn hold(&mut self, label: impl Into<String>, grid: BinaryVoxelGrid) {
        let label = label.into();
        self.release(&label);
        self.held.push((label, grid));
    }

    pub fn get(&self, label: &str) -> Option<&BinaryVoxelGrid> {
        self.held.iter().find(|(l, _)| l == label).map(|(_, grid)| grid)
    }

    /// Same as [`Transients::get`] but a missing grid is an error
    pub fn require(&self, label: &str) -> FuseResult<&BinaryVoxelGrid> {
        self.get(label)
            .ok_or_else(|| FuseError::InvalidParameter(format!("no intermediate grid `{}`", label)))
    }

    /// Hand a grid over to a stage that consumes it
    pub fn take(&mut self, label: &str) -> FuseResult<BinaryVoxelGrid> {
        let position = self
            .held
            .iter()
            .position(|(l, _)| l == label)
            .ok_or_else(|| FuseError::InvalidParameter(format!("no intermediate grid `{}`", label)))?;
        Ok(self.held.swap_remove(position).1)
    }

    /// Drop the grid held under `label`; false if there was none
    pub fn release(&mut self, label: &str) -> bool {
        match self.held.iter().position(|(l, _)| l == label) {
            Some(position) => {
                let (label, grid) = self.held.swap_remove(position);
                debug!(grid = %label, bytes = grid.byte_size(), "released intermediate grid");
                drop(grid);
                self.released.push(label);
                true
            }
            None => false,
        }
    }

    /// Drop every grid still held, returning how many there were
    pub fn release_all(&mut self) -> usize {
        let labels: Vec<String> = self.held.iter().map(|(l, _)| l.clone()).collect();
        for label in &labels {
            self.release(label);
        }
        labels.len()
    }

    pub fn outstanding(&self) -> usize {
        self.held.len()
    }

    /// Labels of released grids, in release order
    pub fn released(&self) -> &[String] {
        &self.released
    }
}

impl Drop for Transients {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Hands the final grid to a store and clears the intermediates
pub struct ResultPublisher<'a> {
    store: &'a dyn VolumeStore,
}

impl<'a> ResultPublisher<'a> {
    pub fn new(store: &'a dyn VolumeStore) -> Self {
        Self { store }
    }

    /// Publish `grid` under `name`. The intermediates are released whether
    /// or not the store accepts the volume.
    pub fn publish(
        &self,
        name: &str,
        grid: BinaryVoxelGrid,
        transients: &mut Transients,
    ) -> FuseResult<PublishReceipt> {
        let start = Instant::now();
        let result = self.store.publish(name, grid).map_err(|e| match e {
            FuseError::Publish { .. } => e,
            other => FuseError::Publish {
                name: name.to_string(),
                reason: other.to_string(),
            },
        });
        let released = transients.release_all();

        if let Ok(receipt) = &result {
            info!(
                name = %receipt.name,
                store = %self.store.describe(),
                foreground = receipt.foreground,
                released,
                elapsed = ?start.elapsed(),
                "published"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::volume::GridSpec;
    use nalgebra::{Point3, Vector3};

    fn grid() -> BinaryVoxelGrid {
        let spec = GridSpec::axis_aligned([2, 2, 2], Vector3::repeat(1.0), Point3::origin()).unwrap();
        BinaryVoxelGrid::background(spec)
    }

    #[test]
    fn test_ledger_hold_take_release() {
        let mut transients = Transients::new();
        transients.hold("canvas", grid());
        transients.hold("left", grid());
        assert_eq!(transients.outstanding(), 2);

        let left = transients.take("left").unwrap();
        assert_eq!(left.voxels().len(), 8);
        assert!(transients.take("left").is_err());

        assert!(transients.release("canvas"));
        assert!(!transients.release("canvas"));
        assert_eq!(transients.released(), ["canvas".to_string()]);
        assert_eq!(transients.outstanding(), 0);
    }

    #[test]
    fn test_publish_releases_intermediates() {
        let store = MemoryStore::new();
        let mut transients = Transients::new();
        transients.hold("canvas", grid());
        transients.hold("right", grid());

        let receipt = ResultPublisher::new(&store).publish("out", grid(), &mut transients).unwrap();
        assert_eq!(receipt.name, "out");
        assert_eq!(transients.outstanding(), 0);
        assert_eq!(transients.released().len(), 2);
    }

    #[test]
    fn test_failed_publish_still_releases() {
        let store = MemoryStore::new();
        store.set_online(false);
        let mut transients = Transients::new();
        transients.hold("canvas", grid());

        let err = ResultPublisher::new(&store).publish("out", grid(), &mut transients).unwrap_err();
        assert!(matches!(err, FuseError::Publish { .. }));
        assert_eq!(transients.outstanding(), 0);
        assert!(store.volume_names().is_empty());
    }
}
