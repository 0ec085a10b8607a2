//! Mesh data: procedural shapes and OBJ import

use crate::render::vulkan::vertex::Vertex;
use std::path::Path;
use thiserror::Error;

/// Errors raised while importing mesh files
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to load OBJ file: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("OBJ file contains no meshes")]
    Empty,
}

/// Interleaved vertex data with 32-bit indices
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Unit cube centered at the origin, four vertices per face so each
    /// face carries its own normal and UVs. Faces wind counter-clockwise
    /// seen from outside; under the Y-flipped projection that is the
    /// pipelines' clockwise front face.
    pub fn cube() -> Self {
        struct Face {
            normal: [f32; 3],
            corners: [[f32; 3]; 4],
        }
        let faces = [
            Face {
                normal: [0.0, 0.0, 1.0],
                corners: [
                    [-0.5, -0.5, 0.5],
                    [0.5, -0.5, 0.5],
                    [0.5, 0.5, 0.5],
                    [-0.5, 0.5, 0.5],
                ],
            },
            Face {
                normal: [0.0, 0.0, -1.0],
                corners: [
                    [0.5, -0.5, -0.5],
                    [-0.5, -0.5, -0.5],
                    [-0.5, 0.5, -0.5],
                    [0.5, 0.5, -0.5],
                ],
            },
            Face {
                normal: [1.0, 0.0, 0.0],
                corners: [
                    [0.5, -0.5, 0.5],
                    [0.5, -0.5, -0.5],
                    [0.5, 0.5, -0.5],
                    [0.5, 0.5, 0.5],
                ],
            },
            Face {
                normal: [-1.0, 0.0, 0.0],
                corners: [
                    [-0.5, -0.5, -0.5],
                    [-0.5, -0.5, 0.5],
                    [-0.5, 0.5, 0.5],
                    [-0.5, 0.5, -0.5],
                ],
            },
            Face {
                normal: [0.0, 1.0, 0.0],
                corners: [
                    [-0.5, 0.5, 0.5],
                    [0.5, 0.5, 0.5],
                    [0.5, 0.5, -0.5],
                    [-0.5, 0.5, -0.5],
                ],
            },
            Face {
                normal: [0.0, -1.0, 0.0],
                corners: [
                    [-0.5, -0.5, -0.5],
                    [0.5, -0.5, -0.5],
                    [0.5, -0.5, 0.5],
                    [-0.5, -0.5, 0.5],
                ],
            },
        ];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for face in &faces {
            let base = vertices.len() as u32;
            for (corner, uv) in face.corners.iter().zip(uvs.iter()) {
                vertices.push(Vertex::new(*corner, face.normal, *uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        Self { vertices, indices }
    }

    /// Import an OBJ file, merging all contained meshes into one. Missing
    /// normals or texture coordinates default to zero.
    pub fn from_obj(path: &Path) -> Result<Self, MeshError> {
        let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)?;
        if models.is_empty() {
            return Err(MeshError::Empty);
        }

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for model in models {
            let mesh = model.mesh;
            let base = vertices.len() as u32;
            let count = mesh.positions.len() / 3;
            for i in 0..count {
                let position = [
                    mesh.positions[3 * i],
                    mesh.positions[3 * i + 1],
                    mesh.positions[3 * i + 2],
                ];
                let normal = if mesh.normals.len() >= 3 * (i + 1) {
                    [
                        mesh.normals[3 * i],
                        mesh.normals[3 * i + 1],
                        mesh.normals[3 * i + 2],
                    ]
                } else {
                    [0.0; 3]
                };
                let uv = if mesh.texcoords.len() >= 2 * (i + 1) {
                    [mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]]
                } else {
                    [0.0; 2]
                };
                vertices.push(Vertex::new(position, normal, uv));
            }
            indices.extend(mesh.indices.iter().map(|&i| base + i));
        }
        log::info!(
            "Loaded {}: {} vertices, {} triangles",
            path.display(),
            vertices.len(),
            indices.len() / 3
        );
        Ok(Self { vertices, indices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_expected_counts() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn cube_normals_are_unit_axes() {
        for vertex in Mesh::cube().vertices {
            let n = vertex.normal;
            let len2 = n[0] * n[0] + n[1] * n[1] + n[2] * n[2];
            assert!((len2 - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn cube_faces_wind_outward() {
        // For every triangle, the geometric normal from the winding must
        // agree with the stored vertex normal.
        let cube = Mesh::cube();
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [
                cube.vertices[tri[0] as usize],
                cube.vertices[tri[1] as usize],
                cube.vertices[tri[2] as usize],
            ];
            let u = [
                b.position[0] - a.position[0],
                b.position[1] - a.position[1],
                b.position[2] - a.position[2],
            ];
            let v = [
                c.position[0] - a.position[0],
                c.position[1] - a.position[1],
                c.position[2] - a.position[2],
            ];
            let cross = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            let dot = cross[0] * a.normal[0] + cross[1] * a.normal[1] + cross[2] * a.normal[2];
            assert!(dot > 0.0, "triangle winds against its normal");
        }
    }
}
