// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Raw uint8 NRRD codec for binary labelmaps

use crate::error::{FuseError, FuseResult};
use crate::volume::{BinaryVoxelGrid, GridSpec, LabelValues};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const MAGIC: &str = "NRRD0004";
const SPACING_KEY: &str = "hemifuse_spacing";
const DIRECTIONS_KEY: &str = "hemifuse_directions";

/// Write a labelmap as an NRRD file
pub fn write_nrrd(path: &Path, grid: &BinaryVoxelGrid, labels: &LabelValues) -> FuseResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_nrrd_to(&mut writer, grid, labels)?;
    writer.flush()?;
    Ok(())
}

pub fn write_nrrd_to<W: Write>(
    writer: &mut W,
    grid: &BinaryVoxelGrid,
    labels: &LabelValues,
) -> FuseResult<()> {
    let spec = grid.spec();
    let [nx, ny, nz] = spec.dims;

    let space_directions: Vec<String> = (0..3)
        .map(|axis| format_vector(&(spec.directions.column(axis) * spec.spacing[axis])))
        .collect();

    writeln!(writer, "{}", MAGIC)?;
    writeln!(writer, "# hemifuse binary labelmap")?;
    writeln!(writer, "type: uint8")?;
    writeln!(writer, "dimension: 3")?;
    writeln!(writer, "space: right-anterior-superior")?;
    writeln!(writer, "sizes: {} {} {}", nx, ny, nz)?;
    writeln!(writer, "space directions: {}", space_directions.join(" "))?;
    writeln!(writer, "kinds: domain domain domain")?;
    writeln!(writer, "endian: little")?;
    writeln!(writer, "encoding: raw")?;
    writeln!(writer, "space origin: {}", format_vector(&spec.origin.coords))?;
    writeln!(
        writer,
        "{}:={} {} {}",
        SPACING_KEY, spec.spacing.x, spec.spacing.y, spec.spacing.z
    )?;
    let rows: Vec<String> = spec
        .directions
        .row_iter()
        .flat_map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>())
        .collect();
    writeln!(writer, "{}:={}", DIRECTIONS_KEY, rows.join(" "))?;
    writeln!(writer)?;

    writer.write_all(&grid.to_labels(labels))?;
    Ok(())
}

/// Read an NRRD labelmap
pub fn read_nrrd(path: &Path, labels: &LabelValues) -> FuseResult<BinaryVoxelGrid> {
    let mut reader = BufReader::new(File::open(path)?);
    read_nrrd_from(&mut reader, labels)
}

pub fn read_nrrd_from<R: BufRead>(reader: &mut R, labels: &LabelValues) -> FuseResult<BinaryVoxelGrid> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !line.starts_with("NRRD") {
        return Err(FuseError::Format("missing NRRD magic".to_string()));
    }

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut key_values: HashMap<String, String> = HashMap::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(FuseError::Format("header is not terminated".to_string()));
        }
        let entry = line.trim_end_matches(['\r', '\n']);
        if entry.is_empty() {
            break;
        }
        if entry.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = entry.split_once(":=") {
            key_values.insert(key.to_string(), value.trim().to_string());
        } else if let Some((key, value)) = entry.split_once(": ") {
            fields.insert(key.trim().to_lowercase(), value.trim().to_string());
        } else {
            return Err(FuseError::Format(format!("unreadable header line `{}`", entry)));
        }
    }

    let field = |name: &str| {
        fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| FuseError::Format(format!("missing `{}` field", name)))
    };

    match field("type")? {
        "uint8" | "uchar" | "unsigned char" | "uint8_t" => {}
        other => return Err(FuseError::Format(format!("unsupported type `{}`", other))),
    }
    if field("dimension")? != "3" {
        return Err(FuseError::Format("only 3-D volumes are supported".to_string()));
    }
    if field("encoding")? != "raw" {
        return Err(FuseError::Format("only raw encoding is supported".to_string()));
    }

    let dims = parse_numbers::<usize>(field("sizes")?)?;
    let dims: [usize; 3] = dims
        .try_into()
        .map_err(|_| FuseError::Format("`sizes` must list three values".to_string()))?;

    let origin = match fields.get("space origin") {
        Some(value) => Point3::from(single_vector(value)?),
        None => Point3::origin(),
    };

    let (spacing, directions) = match (key_values.get(SPACING_KEY), key_values.get(DIRECTIONS_KEY)) {
        (Some(spacing), Some(directions)) => {
            let spacing = parse_numbers::<f64>(spacing)?;
            let rows = parse_numbers::<f64>(directions)?;
            if spacing.len() != 3 || rows.len() != 9 {
                return Err(FuseError::Format("malformed spacing/direction keys".to_string()));
            }
            (Vector3::from_row_slice(&spacing), Matrix3::from_row_slice(&rows))
        }
        _ => {
            let axes = parse_vectors(field("space directions")?)?;
            if axes.len() != 3 {
                return Err(FuseError::Format("`space directions` must list three vectors".to_string()));
            }
            let spacing = Vector3::new(axes[0].norm(), axes[1].norm(), axes[2].norm());
            let directions = Matrix3::from_columns(&[
                axes[0] / spacing.x,
                axes[1] / spacing.y,
                axes[2] / spacing.z,
            ]);
            (spacing, directions)
        }
    };

    let spec = GridSpec::new(dims, spacing, origin, directions)?;
    let mut data = Vec::with_capacity(spec.voxel_count());
    reader.read_to_end(&mut data)?;
    BinaryVoxelGrid::from_labels(spec, &data, labels)
}

fn format_vector(v: &Vector3<f64>) -> String {
    format!("({},{},{})", v.x, v.y, v.z)
}

fn parse_numbers<T: std::str::FromStr>(value: &str) -> FuseResult<Vec<T>> {
    value
        .split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| FuseError::Format(format!("`{}` is not a number", token)))
        })
        .collect()
}

fn parse_vectors(value: &str) -> FuseResult<Vec<Vector3<f64>>> {
    value
        .split(')')
        .map(|chunk| chunk.trim().trim_start_matches('('))
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let parts: Vec<f64> = chunk
                .split(',')
                .map(|p| {
                    p.trim()
                        .parse::<f64>()
                        .map_err(|_| FuseError::Format(format!("bad vector component `{}`", p)))
                })
                .collect::<FuseResult<_>>()?;
            if parts.len() != 3 {
                return Err(FuseError::Format(format!("vector `({})` needs three components", chunk)));
            }
            Ok(Vector3::new(parts[0], parts[1], parts[2]))
        })
        .collect()
}

fn single_vector(value: &str) -> FuseResult<Vector3<f64>> {
    let mut vectors = parse_vectors(value)?;
    if vectors.len() != 1 {
        return Err(FuseError::Format(format!("expected one vector, got `{}`", value)));
    }
    Ok(vectors.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Voxel;
    use std::io::Cursor;

    fn sample_grid() -> BinaryVoxelGrid {
        let spec = GridSpec::new(
            [4, 3, 2],
            Vector3::new(0.5, 0.25, 2.0),
            Point3::new(98.0, 98.0, -72.0),
            Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0)),
        )
        .unwrap();
        let mut grid = BinaryVoxelGrid::background(spec);
        grid.set(1, 2, 1, Voxel::Foreground);
        grid.set(3, 0, 0, Voxel::Foreground);
        grid
    }

    #[test]
    fn test_write_then_read_preserves_geometry_and_voxels() {
        let grid = sample_grid();
        let labels = LabelValues::default();
        let mut buffer = Vec::new();
        write_nrrd_to(&mut buffer, &grid, &labels).unwrap();

        let decoded = read_nrrd_from(&mut Cursor::new(buffer), &labels).unwrap();
        assert_eq!(decoded, grid);
    }

    #[test]
    fn test_reads_plain_space_directions() {
        let header = "NRRD0004\n\
                      type: unsigned char\n\
                      dimension: 3\n\
                      sizes: 2 1 1\n\
                      space directions: (-0.5, 0, 0) (0,-0.5,0) (0,0,0.5)\n\
                      encoding: raw\n\
                      space origin: (1,2,3)\n\n";
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&[0, 1]);

        let grid = read_nrrd_from(&mut Cursor::new(bytes), &LabelValues::default()).unwrap();
        assert_eq!(grid.spec().spacing, Vector3::repeat(0.5));
        assert_eq!(grid.spec().directions[(0, 0)], -1.0);
        assert_eq!(grid.spec().origin, Point3::new(1.0, 2.0, 3.0));
        assert!(grid.is_foreground(1, 0, 0));
    }

    #[test]
    fn test_truncated_data_rejected() {
        let grid = sample_grid();
        let labels = LabelValues::default();
        let mut buffer = Vec::new();
        write_nrrd_to(&mut buffer, &grid, &labels).unwrap();
        buffer.truncate(buffer.len() - 1);

        let err = read_nrrd_from(&mut Cursor::new(buffer), &labels).unwrap_err();
        assert!(matches!(err, FuseError::Format(_)));
    }

    #[test]
    fn test_rejects_non_nrrd() {
        let err = read_nrrd_from(&mut Cursor::new(b"solid cube\n".to_vec()), &LabelValues::default());
        assert!(matches!(err, Err(FuseError::Format(_))));
    }
}
