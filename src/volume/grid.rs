// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Dense binary labelmap

use super::GridSpec;
use crate::error::{FuseError, FuseResult};
use serde::{Deserialize, Serialize};

/// State of one voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Voxel {
    #[default]
    Background,
    Foreground,
}

impl Voxel {
    pub fn is_foreground(self) -> bool {
        self == Voxel::Foreground
    }
}

/// Byte values a labelmap uses when it leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValues {
    pub background: u8,
    pub foreground: u8,
}

impl Default for LabelValues {
    fn default() -> Self {
        Self {
            background: 0,
            foreground: 255,
        }
    }
}

impl LabelValues {
    pub fn validate(&self) -> FuseResult<()> {
        if self.background == self.foreground {
            return Err(FuseError::InvalidParameter(format!(
                "background and foreground labels are both {}",
                self.background
            )));
        }
        Ok(())
    }

    pub fn encode(&self, voxel: Voxel) -> u8 {
        match voxel {
            Voxel::Background => self.background,
            Voxel::Foreground => self.foreground,
        }
    }

    /// Any value other than the background label counts as foreground
    pub fn decode(&self, value: u8) -> Voxel {
        if value == self.background {
            Voxel::Background
        } else {
            Voxel::Foreground
        }
    }
}

/// A [`GridSpec`] plus one [`Voxel`] per cell
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryVoxelGrid {
    spec: GridSpec,
    voxels: Vec<Voxel>,
}

impl BinaryVoxelGrid {
    /// Grid with every voxel set to `value`
    pub fn filled(spec: GridSpec, value: Voxel) -> Self {
        let voxels = vec![value; spec.voxel_count()];
        Self { spec, voxels }
    }

    pub fn background(spec: GridSpec) -> Self {
        Self::filled(spec, Voxel::Background)
    }

    pub fn from_voxels(spec: GridSpec, voxels: Vec<Voxel>) -> FuseResult<Self> {
        if voxels.len() != spec.voxel_count() {
            return Err(FuseError::InvalidGridSpec(format!(
                "{} voxels supplied for a {:?} grid",
                voxels.len(),
                spec.dims
            )));
        }
        Ok(Self { spec, voxels })
    }

    /// Decode raw label bytes laid out i-fastest
    pub fn from_labels(spec: GridSpec, bytes: &[u8], labels: &LabelValues) -> FuseResult<Self> {
        if bytes.len() != spec.voxel_count() {
            return Err(FuseError::Format(format!(
                "expected {} label bytes, found {}",
                spec.voxel_count(),
                bytes.len()
            )));
        }
        let voxels = bytes.iter().map(|&b| labels.decode(b)).collect();
        Ok(Self { spec, voxels })
    }

    pub fn to_labels(&self, labels: &LabelValues) -> Vec<u8> {
        self.voxels.iter().map(|&v| labels.encode(v)).collect()
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn dims(&self) -> [usize; 3] {
        self.spec.dims
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<Voxel> {
        let [nx, ny, nz] = self.spec.dims;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        Some(self.voxels[self.spec.index(i, j, k)])
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: Voxel) {
        let index = self.spec.index(i, j, k);
        self.voxels[index] = value;
    }

    pub fn is_foreground(&self, i: usize, j: usize, k: usize) -> bool {
        self.get(i, j, k).is_some_and(Voxel::is_foreground)
    }

    pub fn foreground_count(&self) -> usize {
        self.voxels.iter().filter(|v| v.is_foreground()).count()
    }

    /// Memory held by the voxel buffer
    pub fn byte_size(&self) -> usize {
        self.voxels.len() * std::mem::size_of::<Voxel>()
    }

    /// Whether every foreground voxel here is also foreground in `other`
    pub fn is_subset_of(&self, other: &BinaryVoxelGrid) -> bool {
        self.spec == other.spec
            && self
                .voxels
                .iter()
                .zip(&other.voxels)
                .all(|(a, b)| !a.is_foreground() || b.is_foreground())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn spec() -> GridSpec {
        GridSpec::axis_aligned([3, 4, 5], Vector3::repeat(1.0), Point3::origin()).unwrap()
    }

    #[test]
    fn test_filled_canvas() {
        let grid = BinaryVoxelGrid::filled(spec(), Voxel::Foreground);
        assert_eq!(grid.voxels().len(), 60);
        assert_eq!(grid.foreground_count(), 60);
    }

    #[test]
    fn test_get_set() {
        let mut grid = BinaryVoxelGrid::background(spec());
        grid.set(2, 3, 4, Voxel::Foreground);
        assert!(grid.is_foreground(2, 3, 4));
        assert!(!grid.is_foreground(1, 3, 4));
        assert_eq!(grid.get(3, 0, 0), None);
        assert_eq!(grid.foreground_count(), 1);
    }

    #[test]
    fn test_from_voxels_checks_length() {
        let err = BinaryVoxelGrid::from_voxels(spec(), vec![Voxel::Background; 59]);
        assert!(matches!(err, Err(FuseError::InvalidGridSpec(_))));
    }

    #[test]
    fn test_label_encoding() {
        let labels = LabelValues::default();
        let mut grid = BinaryVoxelGrid::background(spec());
        grid.set(0, 0, 0, Voxel::Foreground);
        let bytes = grid.to_labels(&labels);
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes[1], 0);

        let mut raw = bytes.clone();
        raw[1] = 7;
        let decoded = BinaryVoxelGrid::from_labels(spec(), &raw, &labels).unwrap();
        assert_eq!(decoded.foreground_count(), 2);
    }

    #[test]
    fn test_identical_labels_rejected() {
        let labels = LabelValues {
            background: 1,
            foreground: 1,
        };
        assert!(labels.validate().is_err());
    }

    #[test]
    fn test_subset() {
        let mut small = BinaryVoxelGrid::background(spec());
        small.set(1, 1, 1, Voxel::Foreground);
        let full = BinaryVoxelGrid::filled(spec(), Voxel::Foreground);
        assert!(small.is_subset_of(&full));
        assert!(!full.is_subset_of(&small));
    }
}
