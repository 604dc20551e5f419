//! Vertex categories and per-mesh geometry packing.
//!
//! Each mesh lands in one of three vertex sets depending on whether it has
//! UVs and whether it is weight painted. This module turns a scene mesh into
//! the flat arrays stored in its vertex set plus the per-face index triples
//! used to build display lists.

use std::collections::HashMap;

use crate::models::strip::StripFace;
use crate::scene::MeshSnapshot;

/// GX display list preamble for meshes with UVs.
const PREAMBLE_TEXTURED: [u8; 20] = [
    0x08, 0x50, 0x00, 0x00, 0x1E, 0x00, 0x08, 0x60, 0x00, 0x00, 0x00, 0x03, 0x10, 0x00, 0x00,
    0x10, 0x08, 0x00, 0x00, 0x00,
];

/// Same as [`PREAMBLE_TEXTURED`] with the texture coordinate descriptor cleared.
const PREAMBLE_UNTEXTURED: [u8; 20] = [
    0x08, 0x50, 0x00, 0x00, 0x1E, 0x00, 0x08, 0x60, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00,
    0x10, 0x08, 0x00, 0x00, 0x00,
];

/// Attribute mask following the preamble.
pub const ATTRIBUTES_WITH_UVS: u8 = 0x14;
pub const ATTRIBUTES_WITHOUT_UVS: u8 = 0x04;

/// Display list command for a triangle strip.
pub const GX_TRIANGLE_STRIP: u8 = 0x99;

/// Scale factors used when quantizing attributes.
pub const NORMAL_SCALE: f32 = 64.0;
pub const UV_SCALE: f32 = 256.0;
pub const WEIGHT_SCALE: f32 = 16384.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexCategory {
    /// Positions, normals and UVs.
    Textured,
    /// Positions and normals only.
    Untextured,
    /// Positions, normals, UVs and two-bone weights.
    Skinned,
}

impl VertexCategory {
    /// Order in which vertex data, vertex sets and primitives are written.
    pub const VERTEX_SET_ORDER: [VertexCategory; 3] = [
        VertexCategory::Textured,
        VertexCategory::Untextured,
        VertexCategory::Skinned,
    ];

    /// Order of the mesh-set descriptors. The engine expects skinned meshes
    /// before untextured ones here.
    pub const MESH_SET_ORDER: [VertexCategory; 3] = [
        VertexCategory::Textured,
        VertexCategory::Skinned,
        VertexCategory::Untextured,
    ];

    pub fn classify(has_uvs: bool, weighted: bool) -> VertexCategory {
        match (has_uvs, weighted) {
            (false, _) => VertexCategory::Untextured,
            (true, true) => VertexCategory::Skinned,
            (true, false) => VertexCategory::Textured,
        }
    }

    /// Flags shared by the vertex set and the mesh-set descriptor.
    pub fn set_flags(self) -> u32 {
        match self {
            VertexCategory::Textured => 0x101,
            VertexCategory::Untextured => 0x102,
            VertexCategory::Skinned => 0x201,
        }
    }

    /// Flags of a primitive descriptor.
    pub fn primitive_flags(self) -> u32 {
        match self {
            VertexCategory::Textured => 0x00C9_002A,
            VertexCategory::Untextured => 0x0009_000A,
            VertexCategory::Skinned => 0x1085_000A,
        }
    }

    pub fn display_list_preamble(self) -> &'static [u8; 20] {
        match self {
            VertexCategory::Untextured => &PREAMBLE_UNTEXTURED,
            VertexCategory::Textured | VertexCategory::Skinned => &PREAMBLE_TEXTURED,
        }
    }

    pub fn has_uvs(self) -> bool {
        !matches!(self, VertexCategory::Untextured)
    }

    pub fn is_skinned(self) -> bool {
        matches!(self, VertexCategory::Skinned)
    }
}

/// Round half to even, matching how the game's tools quantized data.
fn quantize(value: f32, scale: f32) -> i64 {
    (f64::from(value) * f64::from(scale)).round_ties_even() as i64
}

pub fn quantize_normal(normal: [f32; 3]) -> [i64; 3] {
    normal.map(|c| quantize(c, NORMAL_SCALE))
}

/// UVs are stored with V flipped.
pub fn quantize_uv([u, v]: [f32; 2]) -> [i64; 2] {
    [quantize(u, UV_SCALE), quantize(1.0 - v, UV_SCALE)]
}

pub fn quantize_weight(weight: f32) -> i64 {
    quantize(weight, WEIGHT_SCALE)
}

/// A mesh flattened into vertex-set arrays. Indices in `faces` are local to
/// this mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub faces: Vec<StripFace>,
    /// The mesh had no custom corner normals and fell back to vertex normals.
    pub used_vertex_normals: bool,
}

impl MeshGeometry {
    pub fn build(mesh: &MeshSnapshot, category: VertexCategory) -> MeshGeometry {
        let positions = mesh.vertices.iter().map(|v| v.position).collect();
        let custom = mesh.has_custom_normals();

        let (normals, per_corner) = match (category, custom) {
            (VertexCategory::Skinned, true) => (averaged_corner_normals(mesh), false),
            (_, true) => (
                mesh.triangles
                    .iter()
                    .flat_map(|t| t.normals.unwrap_or_default())
                    .collect(),
                true,
            ),
            (_, false) => (mesh.vertices.iter().map(|v| v.normal).collect(), false),
        };

        let (uvs, uv_indices) = if category.has_uvs() {
            dedupe_uvs(mesh)
        } else {
            (Vec::new(), Vec::new())
        };

        let faces = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(tri, t)| {
                let base = (tri * 3) as u32;
                let normal = if per_corner {
                    [base, base + 1, base + 2]
                } else {
                    t.corners
                };
                let uv = category.has_uvs().then(|| {
                    let i = tri * 3;
                    [uv_indices[i], uv_indices[i + 1], uv_indices[i + 2]]
                });
                StripFace {
                    position: t.corners,
                    normal,
                    uv,
                }
            })
            .collect();

        MeshGeometry {
            positions,
            normals,
            uvs,
            faces,
            used_vertex_normals: !custom,
        }
    }
}

/// One normal per vertex, averaging every corner normal that references it.
fn averaged_corner_normals(mesh: &MeshSnapshot) -> Vec<[f32; 3]> {
    let mut sums = vec![([0.0f32; 3], 0u32); mesh.vertices.len()];
    for t in &mesh.triangles {
        let Some(normals) = t.normals else { continue };
        for (corner, normal) in t.corners.iter().zip(normals) {
            if let Some((sum, count)) = sums.get_mut(*corner as usize) {
                for (s, n) in sum.iter_mut().zip(normal) {
                    *s += n;
                }
                *count += 1;
            }
        }
    }

    sums.into_iter()
        .zip(&mesh.vertices)
        .map(|((sum, count), vertex)| {
            if count == 0 {
                vertex.normal
            } else {
                sum.map(|s| s / count as f32)
            }
        })
        .collect()
}

/// Deduplicate corner UVs by exact value in first-seen order. Returns the
/// unique UVs and one index per face corner.
fn dedupe_uvs(mesh: &MeshSnapshot) -> (Vec<[f32; 2]>, Vec<u32>) {
    let mut unique = Vec::new();
    let mut seen: HashMap<[u32; 2], u32> = HashMap::new();
    let mut indices = Vec::with_capacity(mesh.triangles.len() * 3);

    for uv in mesh
        .triangles
        .iter()
        .flat_map(|t| t.uvs.unwrap_or_default())
    {
        let key = uv.map(f32::to_bits);
        let index = *seen.entry(key).or_insert_with(|| {
            unique.push(uv);
            (unique.len() - 1) as u32
        });
        indices.push(index);
    }

    (unique, indices)
}
