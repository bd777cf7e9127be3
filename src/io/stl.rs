// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL import/export for triangle meshes

use crate::error::{FuseError, FuseResult};
use crate::geometry::TriangleMesh;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

/// Import an STL file (ASCII or binary)
pub fn import_stl(path: &Path) -> FuseResult<TriangleMesh> {
    let mut reader = BufReader::new(File::open(path)?);
    import_stl_from(&mut reader)
}

pub fn import_stl_from<R: Read + Seek>(reader: &mut R) -> FuseResult<TriangleMesh> {
    let stl = stl_io::read_stl(reader).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
            FuseError::Format(format!("invalid STL data: {}", e))
        }
        _ => FuseError::Io(e),
    })?;

    let mut mesh = TriangleMesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for vertex in &stl.vertices {
        mesh.add_vertex(Point3::new(vertex[0] as f64, vertex[1] as f64, vertex[2] as f64));
    }
    for face in &stl.faces {
        mesh.add_triangle(face.vertices);
    }
    Ok(mesh)
}

/// Export a mesh as binary STL
pub fn export_stl(mesh: &TriangleMesh, path: &Path) -> FuseResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    export_stl_to(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn export_stl_to<W: Write>(mesh: &TriangleMesh, writer: &mut W) -> FuseResult<()> {
    let triangles: Vec<stl_io::Triangle> = mesh
        .faces()
        .map(|[a, b, c]| {
            let n = (b - a).cross(&(c - a));
            let n = if n.norm() > 0.0 { n.normalize() } else { n };
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [a, b, c].map(|p| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
            }
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;
    use tempfile::tempdir;

    #[test]
    fn test_export_then_import() -> FuseResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cube.stl");
        let mesh = Primitive::cube(Vector3::new(4.0, 2.0, 1.0), true).to_mesh();

        export_stl(&mesh, &path)?;
        let imported = import_stl(&path)?;

        assert_eq!(imported.triangle_count(), 12);
        let bbox = imported.bounding_box().unwrap();
        assert!(bbox.approx_eq(&mesh.bounding_box().unwrap(), 1e-6));
        Ok(())
    }

    #[test]
    fn test_garbage_is_rejected() {
        let mut cursor = std::io::Cursor::new(b"not an stl".to_vec());
        assert!(import_stl_from(&mut cursor).is_err());
    }
}
