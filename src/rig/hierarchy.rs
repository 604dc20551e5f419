//! Bone hierarchy construction.
//!
//! Bone indices double as node indices in the object chunk and as the index
//! space of skin weights. They are assigned in pre-order from the roots,
//! with siblings kept in authoring order.

use std::collections::HashMap;
use std::f32::consts::TAU;

use glam::{EulerRot, Mat4, Quat, Vec3};
use thiserror::Error;

use crate::models::node::{
    NO_NODE, NODE_ROTATION_ZERO, NODE_SCALE_ONE, NODE_TRANSLATION_ZERO, NodeRecord,
};
use crate::scene::{ArmatureSnapshot, BoneSnapshot};

/// Rotation units per full turn.
const ROTATION_UNITS: f32 = 65536.0;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("bone {bone:?} has unknown parent {parent:?}")]
    UnknownParent { bone: String, parent: String },
    #[error("duplicate bone name {0:?}")]
    DuplicateBone(String),
    #[error("bone {0:?} is not reachable from any root (parent cycle)")]
    Unreachable(String),
    #[error("{count} bones exceed the node index range")]
    TooManyBones { count: usize },
    #[error("borrowed node {index} has out-of-range parent {parent}")]
    BadBorrowedParent { index: usize, parent: i16 },
}

/// Where the hierarchy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HierarchySource {
    /// No bones at all.
    Empty,
    /// The scene's own armature.
    Armature,
    /// Node records copied from another file.
    Borrowed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub record: NodeRecord,
}

/// Reported when scene bone names could not be used as aliases for a
/// borrowed hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasMismatch {
    /// The armature and the borrowed records differ in bone count.
    Count {
        armature_bones: usize,
        borrowed_bones: usize,
    },
    /// The armature itself has no valid bone order.
    Unordered(HierarchyError),
}

/// An ordered bone list plus a name lookup.
#[derive(Debug, Clone)]
pub struct BoneHierarchy {
    bones: Vec<Bone>,
    lookup: HashMap<String, usize>,
    source: HierarchySource,
}

fn check_count(count: usize) -> Result<(), HierarchyError> {
    if count > i16::MAX as usize {
        return Err(HierarchyError::TooManyBones { count });
    }
    Ok(())
}

/// Bone names used for borrowed hierarchies.
pub fn borrowed_bone_name(index: usize) -> String {
    format!("Bone_{index:04}")
}

/// Pre-order over an armature: roots first, children in authoring order.
/// Returns indices into `armature.bones`.
fn pre_order(armature: &ArmatureSnapshot) -> Result<Vec<usize>, HierarchyError> {
    let mut by_name = HashMap::with_capacity(armature.bones.len());
    for (i, bone) in armature.bones.iter().enumerate() {
        if by_name.insert(bone.name.as_str(), i).is_some() {
            return Err(HierarchyError::DuplicateBone(bone.name.clone()));
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); armature.bones.len()];
    let mut roots = Vec::new();
    for (i, bone) in armature.bones.iter().enumerate() {
        match &bone.parent {
            None => roots.push(i),
            Some(parent) => {
                let p = by_name.get(parent.as_str()).ok_or_else(|| {
                    HierarchyError::UnknownParent {
                        bone: bone.name.clone(),
                        parent: parent.clone(),
                    }
                })?;
                children[*p].push(i);
            }
        }
    }

    let mut order = Vec::with_capacity(armature.bones.len());
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(children[i].iter().rev());
    }

    if order.len() != armature.bones.len() {
        let mut visited = vec![false; armature.bones.len()];
        for &i in &order {
            visited[i] = true;
        }
        if let Some(missing) = visited.iter().position(|v| !v) {
            return Err(HierarchyError::Unreachable(
                armature.bones[missing].name.clone(),
            ));
        }
    }

    Ok(order)
}

fn local_matrix(bone: &BoneSnapshot) -> Mat4 {
    let [rx, ry, rz] = bone.rotation;
    let rotation = Quat::from_euler(EulerRot::ZYX, rz, ry, rx);
    Mat4::from_scale_rotation_translation(
        Vec3::from(bone.scale),
        rotation,
        Vec3::from(bone.translation),
    )
}

fn rotation_units(radians: f32) -> i32 {
    (f64::from(radians) * f64::from(ROTATION_UNITS) / f64::from(TAU)).round_ties_even() as i32
}

fn node_type_flags(bone: &BoneSnapshot) -> u32 {
    let mut flags = 0;
    if bone.translation == [0.0; 3] {
        flags |= NODE_TRANSLATION_ZERO;
    }
    if bone.rotation == [0.0; 3] {
        flags |= NODE_ROTATION_ZERO;
    }
    if bone.scale == [1.0; 3] {
        flags |= NODE_SCALE_ONE;
    }
    flags
}

/// Fill in child and sibling links from parent links.
fn link_tree(records: &mut [NodeRecord], parents: &[Option<usize>]) {
    let mut last_child: Vec<Option<usize>> = vec![None; records.len()];
    for (i, parent) in parents.iter().enumerate() {
        let Some(p) = *parent else { continue };
        match last_child[p] {
            None => records[p].first_child = i as i16,
            Some(prev) => records[prev].next_sibling = i as i16,
        }
        last_child[p] = Some(i);
    }

    // Roots are chained as siblings of each other.
    let roots: Vec<usize> = (0..records.len()).filter(|&i| parents[i].is_none()).collect();
    for pair in roots.windows(2) {
        records[pair[0]].next_sibling = pair[1] as i16;
    }
}

impl BoneHierarchy {
    pub fn empty() -> BoneHierarchy {
        BoneHierarchy {
            bones: Vec::new(),
            lookup: HashMap::new(),
            source: HierarchySource::Empty,
        }
    }

    /// Build from the scene's armature.
    pub fn from_armature(armature: &ArmatureSnapshot) -> Result<BoneHierarchy, HierarchyError> {
        check_count(armature.bones.len())?;
        let order = pre_order(armature)?;

        let mut new_index = vec![0usize; armature.bones.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }

        let parent_of = |old: usize| -> Option<usize> {
            let name = armature.bones[old].parent.as_deref()?;
            let parent_old = armature.bones.iter().position(|b| b.name == name)?;
            Some(new_index[parent_old])
        };
        let parents: Vec<Option<usize>> = order.iter().map(|&old| parent_of(old)).collect();

        let mut worlds: Vec<Mat4> = Vec::with_capacity(order.len());
        let mut records = Vec::with_capacity(order.len());
        for (new, &old) in order.iter().enumerate() {
            let bone = &armature.bones[old];
            let local = local_matrix(bone);
            // Pre-order guarantees the parent's world matrix is already known.
            let world = match parents[new] {
                Some(p) => worlds[p] * local,
                None => local,
            };
            worlds.push(world);

            let inverse = world.inverse();
            let row = |r: usize| inverse.row(r).to_array();

            records.push(NodeRecord {
                type_flags: node_type_flags(bone),
                matrix_index: new as i16,
                parent: parents[new].map_or(NO_NODE, |p| p as i16),
                translation: bone.translation,
                rotation: bone.rotation.map(rotation_units),
                scale: bone.scale,
                inverse_bind: [row(0), row(1), row(2)],
                ..NodeRecord::default()
            });
        }
        link_tree(&mut records, &parents);

        let bones: Vec<Bone> = order
            .iter()
            .zip(records)
            .zip(&parents)
            .map(|((&old, record), parent)| Bone {
                name: armature.bones[old].name.clone(),
                parent: *parent,
                record,
            })
            .collect();
        let lookup = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();

        Ok(BoneHierarchy {
            bones,
            lookup,
            source: HierarchySource::Armature,
        })
    }

    /// Wrap node records borrowed from another file. Records are kept
    /// untouched; bones are named `Bone_NNNN` by index. If `armature` has the
    /// same number of bones, its pre-order names become aliases so meshes
    /// authored against a copy of the borrowed rig still resolve.
    pub fn from_borrowed(
        records: Vec<NodeRecord>,
        armature: Option<&ArmatureSnapshot>,
    ) -> Result<(BoneHierarchy, Option<AliasMismatch>), HierarchyError> {
        check_count(records.len())?;

        let count = records.len();
        let mut bones = Vec::with_capacity(count);
        for (index, record) in records.into_iter().enumerate() {
            let parent = match record.parent_index() {
                Some(p) if p < count => Some(p),
                None if record.parent == NO_NODE => None,
                _ => {
                    return Err(HierarchyError::BadBorrowedParent {
                        index,
                        parent: record.parent,
                    });
                }
            };
            bones.push(Bone {
                name: borrowed_bone_name(index),
                parent,
                record,
            });
        }

        let mut lookup: HashMap<String, usize> = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();

        let mut mismatch = None;
        if let Some(armature) = armature {
            if armature.bones.len() != count {
                mismatch = Some(AliasMismatch::Count {
                    armature_bones: armature.bones.len(),
                    borrowed_bones: count,
                });
            } else {
                match pre_order(armature) {
                    Ok(order) => {
                        for (i, old) in order.into_iter().enumerate() {
                            lookup
                                .entry(armature.bones[old].name.clone())
                                .or_insert(i);
                        }
                    }
                    Err(e) => mismatch = Some(AliasMismatch::Unordered(e)),
                }
            }
        }

        Ok((
            BoneHierarchy {
                bones,
                lookup,
                source: HierarchySource::Borrowed,
            },
            mismatch,
        ))
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn source(&self) -> HierarchySource {
        self.source
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.bones.iter().map(|b| &b.record)
    }
}
