// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline configuration system

use crate::error::{FuseError, FuseResult};
use crate::morphology::{Connectivity, StructuringElement};
use crate::volume::LabelValues;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up by [`PipelineConfig::load`]
pub const CONFIG_FILE: &str = "hemifuse.toml";

// Durations are written as fractional seconds
fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// How the canonical grid is obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GridConfig {
    /// A constant working volume, independent of the inputs.
    /// `directions` rows are world components, columns the i/j/k axes.
    Fixed {
        dims: [usize; 3],
        spacing: [f64; 3],
        origin: [f64; 3],
        directions: [[f64; 3]; 3],
    },
    /// Axis-aligned grid covering both meshes plus `margin` on every side
    Derived { spacing: [f64; 3], margin: f64 },
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig::Fixed {
            dims: [390, 466, 318],
            spacing: [0.5, 0.5, 0.5],
            origin: [98.0, 98.0, -72.0],
            directions: [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

/// Which rasterization worker the voxelizer talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerConfig {
    /// Rasterize on a background thread of this process
    InProcess,
    /// Run an external executable speaking the JSON request protocol
    Process {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Voxels within this world distance of the surface are foreground
    pub sample_distance: f64,
    /// Bound on a single worker invocation
    #[serde(
        rename = "timeout_secs",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
    pub worker: WorkerConfig,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            sample_distance: 0.1,
            timeout: Duration::from_secs(300),
            worker: WorkerConfig::InProcess,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    /// Dilation radius is `round(span / radius_divisor)` voxels
    pub radius_divisor: f64,
    /// Fixed radius replacing the derived one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_override: Option<usize>,
    pub element: StructuringElement,
    pub connectivity: Connectivity,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            radius_divisor: 30.0,
            radius_override: None,
            element: StructuringElement::Ball,
            connectivity: Connectivity::Full,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rasterize the two meshes concurrently
    pub parallel: bool,
    pub grid: GridConfig,
    pub voxelizer: VoxelizerConfig,
    pub morphology: MorphologyConfig,
    pub labels: LabelValues,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            grid: GridConfig::default(),
            voxelizer: VoxelizerConfig::default(),
            morphology: MorphologyConfig::default(),
            labels: LabelValues::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `HEMIFUSE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("HEMIFUSE_SAMPLE_DISTANCE") {
            self.voxelizer.sample_distance = value
                .parse()
                .with_context(|| format!("Invalid HEMIFUSE_SAMPLE_DISTANCE: {}", value))?;
        }

        if let Ok(value) = std::env::var("HEMIFUSE_WORKER_TIMEOUT") {
            let secs: f64 = value
                .parse()
                .with_context(|| format!("Invalid HEMIFUSE_WORKER_TIMEOUT: {}", value))?;
            self.voxelizer.timeout = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("Invalid HEMIFUSE_WORKER_TIMEOUT: {}", value))?;
        }

        if let Ok(program) = std::env::var("HEMIFUSE_WORKER") {
            self.voxelizer.worker = WorkerConfig::Process {
                program: PathBuf::from(program),
                args: Vec::new(),
            };
        }

        if let Ok(value) = std::env::var("HEMIFUSE_PARALLEL") {
            self.parallel = value.parse().unwrap_or(self.parallel);
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Check the parameters the pipeline relies on before any work starts
    pub fn validate(&self) -> FuseResult<()> {
        let sample_distance = self.voxelizer.sample_distance;
        if !(sample_distance.is_finite() && sample_distance > 0.0) {
            return Err(FuseError::InvalidParameter(format!(
                "sample distance must be positive, got {}",
                sample_distance
            )));
        }
        if self.voxelizer.timeout.is_zero() {
            return Err(FuseError::InvalidParameter(
                "worker timeout must be non-zero".to_string(),
            ));
        }
        let divisor = self.morphology.radius_divisor;
        if !(divisor.is_finite() && divisor > 0.0) {
            return Err(FuseError::InvalidParameter(format!(
                "radius divisor must be positive, got {}",
                divisor
            )));
        }
        self.labels.validate()?;

        match &self.grid {
            GridConfig::Fixed { .. } => {
                crate::volume::CanonicalGrid::new(self.grid.clone()).fixed_spec()?;
            }
            GridConfig::Derived { spacing, margin } => {
                if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                    return Err(FuseError::InvalidGridSpec(format!(
                        "derived grid spacing must be positive, got {:?}",
                        spacing
                    )));
                }
                if !(margin.is_finite() && *margin >= 0.0) {
                    return Err(FuseError::InvalidGridSpec(format!(
                        "derived grid margin must be non-negative, got {}",
                        margin
                    )));
                }
            }
        }
        Ok(())
    }
}
