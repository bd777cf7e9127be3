// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! In-memory store backed by concurrent maps

use super::{candidate_names, check_volume_name, PublishReceipt, VolumeStore};
use crate::error::{FuseError, FuseResult};
use crate::geometry::{MeshId, TriangleMesh};
use crate::volume::{BinaryVoxelGrid, LabelValues};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Store living in process memory. Can be switched offline to exercise
/// failure handling.
#[derive(Debug)]
pub struct MemoryStore {
    meshes: DashMap<MeshId, TriangleMesh>,
    volumes: DashMap<String, BinaryVoxelGrid>,
    online: AtomicBool,
    labels: LabelValues,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            meshes: DashMap::new(),
            volumes: DashMap::new(),
            online: AtomicBool::new(true),
            labels: LabelValues::default(),
        }
    }

    pub fn insert_mesh(&self, id: impl Into<MeshId>, mesh: TriangleMesh) {
        self.meshes.insert(id.into(), mesh);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn volume(&self, name: &str) -> Option<BinaryVoxelGrid> {
        self.volumes.get(name).map(|grid| grid.clone())
    }

    pub fn volume_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.volumes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn mesh_ids(&self) -> Vec<MeshId> {
        let mut ids: Vec<MeshId> = self.meshes.iter().map(|e| e.key().clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    fn ensure_online(&self) -> Result<(), String> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err("store is unreachable".to_string())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn fetch_mesh(&self, id: &MeshId) -> FuseResult<TriangleMesh> {
        self.ensure_online().map_err(|reason| FuseError::MeshUnavailable {
            id: id.to_string(),
            reason,
        })?;
        self.meshes
            .get(id)
            .map(|mesh| mesh.clone())
            .ok_or_else(|| FuseError::MeshUnavailable {
                id: id.to_string(),
                reason: "no such mesh".to_string(),
            })
    }

    fn publish(&self, name: &str, grid: BinaryVoxelGrid) -> FuseResult<PublishReceipt> {
        check_volume_name(name)?;
        self.ensure_online().map_err(|reason| FuseError::Publish {
            name: name.to_string(),
            reason,
        })?;

        for candidate in candidate_names(name) {
            if let Entry::Vacant(slot) = self.volumes.entry(candidate.clone()) {
                let receipt = PublishReceipt::new(
                    candidate.clone(),
                    format!("memory:{}", candidate),
                    &grid,
                    &self.labels,
                );
                slot.insert(grid);
                return Ok(receipt);
            }
        }
        Err(FuseError::Publish {
            name: name.to_string(),
            reason: "no free name left".to_string(),
        })
    }
}
