//! Skin resolution: vertex group weights to bone indices.
//!
//! A vertex keeps at most two influences. When more are authored, the first
//! two groups in the vertex's authored order are kept and renormalized; the
//! rest are dropped.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::rig::hierarchy::BoneHierarchy;
use crate::scene::{MeshParent, MeshSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkinError {
    #[error("mesh {mesh:?}: vertex {vertex} is not assigned to any vertex group")]
    UnboundVertex { mesh: String, vertex: usize },
    #[error("mesh {mesh:?}: vertex group {group:?} does not name a bone in the hierarchy")]
    UnknownBone { mesh: String, group: String },
    #[error("mesh {mesh:?}: vertex {vertex} references missing vertex group slot {slot}")]
    UnknownGroupSlot {
        mesh: String,
        vertex: usize,
        slot: usize,
    },
    #[error("mesh {mesh:?} is parented to neither the armature nor a bone")]
    Unparented { mesh: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneWeight {
    pub bone: usize,
    pub weight: f32,
}

/// Up to two influences whose weights sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInfluences {
    pub primary: BoneWeight,
    pub secondary: Option<BoneWeight>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkinBinding {
    /// The whole mesh follows one bone.
    Rigid { bone: usize },
    /// Per-vertex blended influences, one entry per vertex.
    Weighted { vertices: Vec<VertexInfluences> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSkin {
    pub binding: SkinBinding,
    /// Vertices that had more than two groups and were truncated.
    pub truncated_vertices: usize,
}

impl ResolvedSkin {
    pub fn is_weighted(&self) -> bool {
        matches!(self.binding, SkinBinding::Weighted { .. })
    }

    pub fn rigid_bone(&self) -> Option<usize> {
        match self.binding {
            SkinBinding::Rigid { bone } => Some(bone),
            SkinBinding::Weighted { .. } => None,
        }
    }
}

fn bone_for_slot(
    mesh: &MeshSnapshot,
    vertex: usize,
    slot: usize,
    bones: &BoneHierarchy,
) -> Result<usize, SkinError> {
    let group = mesh
        .group_name(slot)
        .ok_or_else(|| SkinError::UnknownGroupSlot {
            mesh: mesh.name.clone(),
            vertex,
            slot,
        })?;
    bones.index_of(group).ok_or_else(|| SkinError::UnknownBone {
        mesh: mesh.name.clone(),
        group: group.to_string(),
    })
}

/// Resolve one vertex. Returns the influences and whether groups were dropped.
pub fn resolve_vertex(
    mesh: &MeshSnapshot,
    vertex: usize,
    bones: &BoneHierarchy,
) -> Result<(VertexInfluences, bool), SkinError> {
    let groups: Vec<_> = mesh.weighted_groups(vertex).collect();
    let (first, second) = match groups.as_slice() {
        [] => {
            return Err(SkinError::UnboundVertex {
                mesh: mesh.name.clone(),
                vertex,
            });
        }
        [only] => (*only, None),
        [a, b, ..] => (*a, Some(*b)),
    };

    let total = first.weight + second.map_or(0.0, |g| g.weight);
    let primary = BoneWeight {
        bone: bone_for_slot(mesh, vertex, first.group, bones)?,
        weight: first.weight / total,
    };
    let secondary = match second {
        Some(g) => Some(BoneWeight {
            bone: bone_for_slot(mesh, vertex, g.group, bones)?,
            weight: g.weight / total,
        }),
        None => None,
    };

    Ok((VertexInfluences { primary, secondary }, groups.len() > 2))
}

/// Resolve how a mesh is bound to the hierarchy.
///
/// With an empty hierarchy every mesh is rigidly bound to `default_bone`.
/// A mesh parented to a bone is rigid to that bone. A mesh deformed by the
/// armature is rigid when all of its weight sits in a single group and
/// weighted otherwise.
pub fn resolve_mesh(
    mesh: &MeshSnapshot,
    bones: &BoneHierarchy,
    default_bone: usize,
) -> Result<ResolvedSkin, SkinError> {
    if bones.is_empty() {
        return Ok(ResolvedSkin {
            binding: SkinBinding::Rigid { bone: default_bone },
            truncated_vertices: 0,
        });
    }

    match &mesh.parent {
        MeshParent::None => Err(SkinError::Unparented {
            mesh: mesh.name.clone(),
        }),
        MeshParent::Bone(name) => {
            let bone = bones.index_of(name).ok_or_else(|| SkinError::UnknownBone {
                mesh: mesh.name.clone(),
                group: name.clone(),
            })?;
            Ok(ResolvedSkin {
                binding: SkinBinding::Rigid { bone },
                truncated_vertices: 0,
            })
        }
        MeshParent::Armature => {
            let mut slots = BTreeSet::new();
            for vertex in 0..mesh.vertices.len() {
                let mut any = false;
                for g in mesh.weighted_groups(vertex) {
                    slots.insert(g.group);
                    any = true;
                }
                if !any {
                    return Err(SkinError::UnboundVertex {
                        mesh: mesh.name.clone(),
                        vertex,
                    });
                }
            }

            if let [slot] = slots.iter().copied().collect::<Vec<_>>().as_slice() {
                let bone = bone_for_slot(mesh, 0, *slot, bones)?;
                return Ok(ResolvedSkin {
                    binding: SkinBinding::Rigid { bone },
                    truncated_vertices: 0,
                });
            }

            let mut vertices = Vec::with_capacity(mesh.vertices.len());
            let mut truncated_vertices = 0;
            for vertex in 0..mesh.vertices.len() {
                let (influences, truncated) = resolve_vertex(mesh, vertex, bones)?;
                vertices.push(influences);
                truncated_vertices += usize::from(truncated);
            }
            Ok(ResolvedSkin {
                binding: SkinBinding::Weighted { vertices },
                truncated_vertices,
            })
        }
    }
}
