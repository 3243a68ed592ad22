use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use geoview_proto::MeshPayload;
use glam::{Vec2, Vec3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshDecodeError {
    #[error("mesh has no vertex buffer")]
    MissingVertices,
    #[error("{field} is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("{field} holds {len} bytes, not a multiple of {stride}")]
    Misaligned {
        field: &'static str,
        len: usize,
        stride: usize,
    },
    #[error("{field} has {actual} entries for {expected} vertices")]
    AttributeCount {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("face {face} references vertex {index}, mesh has {count}")]
    IndexOutOfRange { face: usize, index: i32, count: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Decoded geometry of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub colors: Option<Vec<Vec3>>,
    pub texcoords: Option<Vec<Vec2>>,
    pub textures: Vec<Texture>,
}

impl MeshGeometry {
    pub fn decode(payload: &MeshPayload) -> Result<Self, MeshDecodeError> {
        let vertices = payload
            .vertices
            .as_deref()
            .ok_or(MeshDecodeError::MissingVertices)?;
        let positions: Vec<Vec3> = f32_chunks::<3>("V", vertices)?
            .into_iter()
            .map(Vec3::from_array)
            .collect();
        let count = positions.len();

        let triangles = match payload.faces.as_deref() {
            Some(faces) => triangles("F", faces, count)?,
            None => Vec::new(),
        };

        let colors = payload
            .vertex_colors
            .as_deref()
            .map(|vc| -> Result<Vec<Vec3>, MeshDecodeError> {
                let colors: Vec<Vec3> = f32_chunks::<3>("VC", vc)?
                    .into_iter()
                    .map(Vec3::from_array)
                    .collect();
                expect_per_vertex("VC", count, colors.len())?;
                Ok(colors)
            })
            .transpose()?;

        let texcoords = payload
            .texcoords
            .as_deref()
            .map(|tc| -> Result<Vec<Vec2>, MeshDecodeError> {
                let uv: Vec<Vec2> = f32_chunks::<2>("TC", tc)?
                    .into_iter()
                    .map(Vec2::from_array)
                    .collect();
                expect_per_vertex("TC", count, uv.len())?;
                Ok(uv)
            })
            .transpose()?;

        let textures = payload
            .textures
            .iter()
            .map(|tex| -> Result<Texture, MeshDecodeError> {
                Ok(Texture {
                    name: tex.name.clone(),
                    width: tex.width,
                    height: tex.height,
                    data: decode_field("texData", &tex.data)?,
                })
            })
            .collect::<Result<Vec<_>, MeshDecodeError>>()?;

        Ok(Self {
            positions,
            triangles,
            colors,
            texcoords,
            textures,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Centre of the axis aligned bounds and the radius enclosing every
    /// vertex from that centre.
    pub fn bounding_sphere(&self) -> Option<(Vec3, f32)> {
        bounding_sphere(self.positions.iter().copied())
    }
}

pub fn bounding_sphere(points: impl Iterator<Item = Vec3> + Clone) -> Option<(Vec3, f32)> {
    let (min, max) = points.clone().fold(None, |acc: Option<(Vec3, Vec3)>, p| {
        Some(match acc {
            Some((min, max)) => (min.min(p), max.max(p)),
            None => (p, p),
        })
    })?;
    let center = (min + max) * 0.5;
    let radius = points.map(|p| p.distance(center)).fold(0.0_f32, f32::max);
    Some((center, radius))
}

fn decode_field(field: &'static str, encoded: &str) -> Result<Vec<u8>, MeshDecodeError> {
    STANDARD
        .decode(encoded)
        .map_err(|source| MeshDecodeError::Base64 { field, source })
}

fn f32_chunks<const N: usize>(
    field: &'static str,
    encoded: &str,
) -> Result<Vec<[f32; N]>, MeshDecodeError> {
    let bytes = decode_field(field, encoded)?;
    let stride = 4 * N;
    if bytes.len() % stride != 0 {
        return Err(MeshDecodeError::Misaligned {
            field,
            len: bytes.len(),
            stride,
        });
    }
    Ok(bytes
        .chunks_exact(stride)
        .map(|chunk| {
            let mut out = [0.0_f32; N];
            for (slot, word) in out.iter_mut().zip(chunk.chunks_exact(4)) {
                *slot = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            }
            out
        })
        .collect())
}

fn triangles(
    field: &'static str,
    encoded: &str,
    vertex_count: usize,
) -> Result<Vec<[u32; 3]>, MeshDecodeError> {
    let bytes = decode_field(field, encoded)?;
    if bytes.len() % 12 != 0 {
        return Err(MeshDecodeError::Misaligned {
            field,
            len: bytes.len(),
            stride: 12,
        });
    }
    bytes
        .chunks_exact(12)
        .enumerate()
        .map(|(face, chunk)| {
            let mut tri = [0_u32; 3];
            for (slot, word) in tri.iter_mut().zip(chunk.chunks_exact(4)) {
                let index = i32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                if index < 0 || index as usize >= vertex_count {
                    return Err(MeshDecodeError::IndexOutOfRange {
                        face,
                        index,
                        count: vertex_count,
                    });
                }
                *slot = index as u32;
            }
            Ok(tri)
        })
        .collect()
}

fn expect_per_vertex(
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), MeshDecodeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MeshDecodeError::AttributeCount {
            field,
            expected,
            actual,
        })
    }
}

/// Encoding helpers shared by tests and fixtures.
pub mod encode {
    use super::*;

    pub fn f32s(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    pub fn i32s(values: &[i32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    /// A single triangle payload, handy for wiring tests.
    pub fn triangle_payload(name: &str) -> MeshPayload {
        MeshPayload {
            name: name.to_string(),
            visibility: true,
            vertices: Some(f32s(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])),
            faces: Some(i32s(&[0, 1, 2])),
            vertex_colors: None,
            texcoords: None,
            textures: Vec::new(),
        }
    }
}
