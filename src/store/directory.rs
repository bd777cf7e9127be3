// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Filesystem store: STL meshes in, NRRD volumes out

use super::{candidate_names, check_volume_name, PublishReceipt, VolumeStore};
use crate::error::{FuseError, FuseResult};
use crate::geometry::{MeshId, TriangleMesh};
use crate::io::{import_stl, read_nrrd, write_nrrd_to};
use crate::volume::{BinaryVoxelGrid, LabelValues};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

const MESH_EXTENSION: &str = "stl";
const VOLUME_EXTENSION: &str = "nrrd";
const VOLUME_DIR: &str = "volumes";

/// Store rooted at a directory.
///
/// Mesh `a/b` is the file `<root>/a/b.stl`; published volumes land in
/// `<root>/volumes/<name>.nrrd`, written atomically.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    labels: LabelValues,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            labels: LabelValues::default(),
        }
    }

    pub fn with_labels(mut self, labels: LabelValues) -> Self {
        self.labels = labels;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn volume_dir(&self) -> PathBuf {
        self.root.join(VOLUME_DIR)
    }

    pub fn mesh_path(&self, id: &MeshId) -> PathBuf {
        self.root.join(format!("{}.{}", id, MESH_EXTENSION))
    }

    pub fn volume_path(&self, name: &str) -> PathBuf {
        self.volume_dir().join(format!("{}.{}", name, VOLUME_EXTENSION))
    }

    /// Every mesh under the root, sorted
    pub fn list_meshes(&self) -> Vec<MeshId> {
        let mut ids: Vec<MeshId> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(MESH_EXTENSION))
                    .unwrap_or(false)
            })
            .filter_map(|e| {
                let relative = e.path().strip_prefix(&self.root).ok()?.with_extension("");
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(MeshId::new(parts.join("/")))
            })
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Published volume names, sorted
    pub fn list_volumes(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(self.volume_dir())
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == VOLUME_EXTENSION).unwrap_or(false))
            .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    pub fn load_volume(&self, name: &str) -> FuseResult<BinaryVoxelGrid> {
        read_nrrd(&self.volume_path(name), &self.labels)
    }

    fn publish_error(name: &str, reason: impl ToString) -> FuseError {
        FuseError::Publish {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl VolumeStore for DirectoryStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch_mesh(&self, id: &MeshId) -> FuseResult<TriangleMesh> {
        let unavailable = |reason: String| FuseError::MeshUnavailable {
            id: id.to_string(),
            reason,
        };
        if id.as_str().split('/').any(|part| part.is_empty() || part == "..") {
            return Err(unavailable("invalid mesh reference".to_string()));
        }
        let path = self.mesh_path(id);
        if !path.is_file() {
            return Err(unavailable(format!("{} does not exist", path.display())));
        }
        import_stl(&path).map_err(|e| unavailable(e.to_string()))
    }

    fn publish(&self, name: &str, grid: BinaryVoxelGrid) -> FuseResult<PublishReceipt> {
        check_volume_name(name)?;
        let dir = self.volume_dir();
        std::fs::create_dir_all(&dir).map_err(|e| Self::publish_error(name, e))?;

        let mut staged = NamedTempFile::new_in(&dir).map_err(|e| Self::publish_error(name, e))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            write_nrrd_to(&mut writer, &grid, &self.labels).map_err(|e| Self::publish_error(name, e))?;
            writer.flush().map_err(|e| Self::publish_error(name, e))?;
        }

        for candidate in candidate_names(name) {
            let target = self.volume_path(&candidate);
            match staged.persist_noclobber(&target) {
                Ok(_) => {
                    debug!(path = %target.display(), "volume written");
                    return Ok(PublishReceipt::new(
                        candidate,
                        target.display().to_string(),
                        &grid,
                        &self.labels,
                    ));
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(Self::publish_error(name, e.error)),
            }
        }
        Err(Self::publish_error(name, "no free name left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use crate::io::export_stl;
    use crate::volume::{GridSpec, Voxel};
    use nalgebra::{Point3, Vector3};
    use tempfile::TempDir;

    fn grid() -> BinaryVoxelGrid {
        let spec = GridSpec::axis_aligned([3, 2, 2], Vector3::repeat(0.5), Point3::new(1.0, 2.0, 3.0)).unwrap();
        let mut grid = BinaryVoxelGrid::background(spec);
        grid.set(2, 1, 1, Voxel::Foreground);
        grid
    }

    #[test]
    fn test_meshes_are_listed_and_fetched() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("case7")).unwrap();
        let cube = Primitive::cube(Vector3::repeat(2.0), true).to_mesh();
        export_stl(&cube, &dir.path().join("case7/left.stl")).unwrap();
        export_stl(&cube, &dir.path().join("case7/right.stl")).unwrap();

        let store = DirectoryStore::new(dir.path());
        let ids = store.list_meshes();
        assert_eq!(ids, vec![MeshId::new("case7/left"), MeshId::new("case7/right")]);

        let mesh = store.fetch_mesh(&ids[0]).unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(matches!(
            store.fetch_mesh(&MeshId::new("case7/missing")),
            Err(FuseError::MeshUnavailable { .. })
        ));
        assert!(store.fetch_mesh(&MeshId::new("../outside")).is_err());
    }

    #[test]
    fn test_publish_writes_unique_files() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());

        let first = store.publish("fused", grid()).unwrap();
        let second = store.publish("fused", grid()).unwrap();
        assert_eq!(first.name, "fused");
        assert_eq!(second.name, "fused_1");
        assert_eq!(first.foreground, 1);
        assert_eq!(store.list_volumes(), vec!["fused", "fused_1"]);

        let loaded = store.load_volume("fused_1").unwrap();
        assert_eq!(loaded, grid());
    }

    #[test]
    fn test_publish_into_unwritable_root() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = DirectoryStore::new(&blocker);
        assert!(matches!(store.publish("fused", grid()), Err(FuseError::Publish { .. })));
    }
}
