//! Scene checks run before any encoding.
//!
//! Hard violations would produce a file the engine cannot load and abort the
//! export. Warnings degrade the output but still export, and end up in the
//! export report.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::warn;

use crate::config::{ExportConfig, ModelType};
use crate::scene::{MaterialGraphReader, MeshParent, MeshSnapshot, SceneSnapshot};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Violation {
    #[error("scene has no meshes")]
    NoMeshes,
    #[error("{model_type:?} models need an armature or borrowed bone data")]
    MissingHierarchy { model_type: ModelType },
    #[error("mesh {mesh:?} has no material")]
    MissingMaterial { mesh: String },
    #[error("mesh {mesh:?} has {count} materials, exactly one is allowed")]
    MultipleMaterials { mesh: String, count: usize },
    #[error("mesh {mesh:?} uses material {material:?} which is not in the scene")]
    UnknownMaterial { mesh: String, material: String },
    #[error("mesh {mesh:?} has no geometry")]
    EmptyMesh { mesh: String },
    #[error("mesh {mesh:?}: triangle {triangle} references vertex {vertex} out of range")]
    TriangleOutOfRange {
        mesh: String,
        triangle: usize,
        vertex: u32,
    },
    #[error("mesh {mesh:?} has UVs on some triangles only")]
    InconsistentUvs { mesh: String },
    #[error("mesh {mesh:?} is parented to neither the armature nor a bone")]
    UnparentedMesh { mesh: String },
    #[error("mesh {mesh:?}: vertex {vertex} is not assigned to any vertex group")]
    UnboundVertex { mesh: String, vertex: usize },
    #[error("mesh {mesh:?}: vertex {vertex} references missing vertex group slot {slot}")]
    InvalidGroupSlot {
        mesh: String,
        vertex: usize,
        slot: usize,
    },
    #[error("mesh {mesh:?} is weight painted but has no UVs")]
    SkinnedMeshWithoutUvs { mesh: String },
    #[error("mesh {mesh:?} is weight painted, which {model_type:?} models do not support")]
    WeightedMeshNotAllowed { mesh: String, model_type: ModelType },
    #[error(
        "material {material:?}: texture {image:?} is {width}x{height}, dimensions must be powers of two"
    )]
    NonPowerOfTwoTexture {
        material: String,
        image: String,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Warning {
    #[error("mesh {mesh:?} has no custom normals, vertex normals were used")]
    MissingCustomNormals { mesh: String },
    #[error("mesh {mesh:?}: {vertices} vertices had more than two weights, extra weights were dropped")]
    ExcessInfluences { mesh: String, vertices: usize },
    #[error("material {material:?}: texture slot {slot} has no image, exported as untitled.gvr")]
    UnresolvedTexture { material: String, slot: usize },
    #[error("material {material:?}: unknown texture role {role:?}, treated as diffuse")]
    UnknownTextureRole { material: String, role: String },
    #[error("mesh {mesh:?}: rig data ignored for rig-less model")]
    IgnoredRigData { mesh: String },
    #[error("bone data source ignored for rig-less model")]
    IgnoredBoneSource,
    #[error(
        "armature has {armature_bones} bones but borrowed data has {borrowed_bones}, armature names not used"
    )]
    AliasCountMismatch {
        armature_bones: usize,
        borrowed_bones: usize,
    },
    #[error("armature bones cannot be ordered ({reason}), armature names not used")]
    UnorderedArmature { reason: String },
}

impl Warning {
    /// Log the warning and hand it back, for use while collecting.
    pub fn logged(self) -> Warning {
        warn!("{self}");
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Group slots carrying weight anywhere in the mesh.
pub fn weighted_slots(mesh: &MeshSnapshot) -> BTreeSet<usize> {
    mesh.vertices
        .iter()
        .flat_map(|v| v.groups.iter())
        .filter(|g| g.weight > 0.0)
        .map(|g| g.group)
        .collect()
}

/// True when the mesh is deformed by more than one bone.
pub fn is_weight_painted(mesh: &MeshSnapshot) -> bool {
    mesh.parent == MeshParent::Armature && weighted_slots(mesh).len() > 1
}

fn check_geometry(mesh: &MeshSnapshot, out: &mut Validation) {
    if mesh.vertices.is_empty() || mesh.triangles.is_empty() {
        out.violations.push(Violation::EmptyMesh {
            mesh: mesh.name.clone(),
        });
        return;
    }

    for (triangle, t) in mesh.triangles.iter().enumerate() {
        if let Some(&vertex) = t
            .corners
            .iter()
            .find(|&&c| c as usize >= mesh.vertices.len())
        {
            out.violations.push(Violation::TriangleOutOfRange {
                mesh: mesh.name.clone(),
                triangle,
                vertex,
            });
            break;
        }
    }

    let with_uvs = mesh.triangles.iter().filter(|t| t.uvs.is_some()).count();
    if with_uvs != 0 && with_uvs != mesh.triangles.len() {
        out.violations.push(Violation::InconsistentUvs {
            mesh: mesh.name.clone(),
        });
    }

    if !mesh.has_custom_normals() {
        out.warnings.push(Warning::MissingCustomNormals {
            mesh: mesh.name.clone(),
        });
    }
}

fn check_material(mesh: &MeshSnapshot, scene: &SceneSnapshot, out: &mut Validation) {
    match mesh.materials.as_slice() {
        [] => out.violations.push(Violation::MissingMaterial {
            mesh: mesh.name.clone(),
        }),
        [material] => {
            if scene.material_index(material).is_none() {
                out.violations.push(Violation::UnknownMaterial {
                    mesh: mesh.name.clone(),
                    material: material.clone(),
                });
            }
        }
        many => out.violations.push(Violation::MultipleMaterials {
            mesh: mesh.name.clone(),
            count: many.len(),
        }),
    }
}

fn check_skin(mesh: &MeshSnapshot, model_type: ModelType, out: &mut Validation) {
    match mesh.parent {
        MeshParent::None => {
            out.violations.push(Violation::UnparentedMesh {
                mesh: mesh.name.clone(),
            });
            return;
        }
        MeshParent::Bone(_) => return,
        MeshParent::Armature => {}
    }

    let mut excess = 0;
    for (vertex, v) in mesh.vertices.iter().enumerate() {
        let weighted: Vec<_> = v.groups.iter().filter(|g| g.weight > 0.0).collect();
        if weighted.is_empty() {
            out.violations.push(Violation::UnboundVertex {
                mesh: mesh.name.clone(),
                vertex,
            });
        }
        if let Some(g) = weighted.iter().find(|g| g.group >= mesh.vertex_groups.len()) {
            out.violations.push(Violation::InvalidGroupSlot {
                mesh: mesh.name.clone(),
                vertex,
                slot: g.group,
            });
        }
        if weighted.len() > 2 {
            excess += 1;
        }
    }

    if !is_weight_painted(mesh) {
        return;
    }
    if !model_type.allows_weighted_meshes() {
        out.violations.push(Violation::WeightedMeshNotAllowed {
            mesh: mesh.name.clone(),
            model_type,
        });
    }
    if !mesh.has_uvs() {
        out.violations.push(Violation::SkinnedMeshWithoutUvs {
            mesh: mesh.name.clone(),
        });
    }
    if excess > 0 {
        out.warnings.push(Warning::ExcessInfluences {
            mesh: mesh.name.clone(),
            vertices: excess,
        });
    }
}

fn check_textures<M: MaterialGraphReader>(materials: &[M], out: &mut Validation) {
    for material in materials {
        for slot in material.texture_slots() {
            let Some(image) = slot.image else { continue };
            if let Some([width, height]) = image.size {
                if !image.is_power_of_two() {
                    out.violations.push(Violation::NonPowerOfTwoTexture {
                        material: material.name().to_string(),
                        image: image.name.clone(),
                        width,
                        height,
                    });
                }
            }
        }
    }
}

/// Check a scene against the exporter's constraints.
///
/// `hierarchy_available` tells whether a rig (own armature or borrowed bone
/// data) will be present for this export.
pub fn validate(
    scene: &SceneSnapshot,
    config: &ExportConfig,
    hierarchy_available: bool,
) -> Validation {
    let mut out = Validation::default();
    let model_type = config.model_type();

    if scene.meshes().is_empty() {
        out.violations.push(Violation::NoMeshes);
    }

    if model_type.requires_hierarchy() && !hierarchy_available {
        out.violations
            .push(Violation::MissingHierarchy { model_type });
    }

    if model_type == ModelType::NoRig && config.bone_data_source().is_some() {
        out.warnings.push(Warning::IgnoredBoneSource);
    }

    let rig_in_use = model_type != ModelType::NoRig && hierarchy_available;

    for mesh in scene.meshes() {
        check_geometry(mesh, &mut out);
        check_material(mesh, scene, &mut out);

        if rig_in_use {
            check_skin(mesh, model_type, &mut out);
        } else if model_type == ModelType::NoRig && mesh.parent != MeshParent::None {
            out.warnings.push(Warning::IgnoredRigData {
                mesh: mesh.name.clone(),
            });
        }
    }

    check_textures(scene.materials(), &mut out);

    for warning in &out.warnings {
        warn!("{warning}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        GroupWeight, ImageRef, MaterialSnapshot, ShaderGraph, ShaderNode, Triangle, Vertex,
    };

    fn vertex(groups: Vec<(usize, f32)>) -> Vertex {
        Vertex {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            groups: groups
                .into_iter()
                .map(|(group, weight)| GroupWeight { group, weight })
                .collect(),
        }
    }

    fn mesh(name: &str, groups: Vec<Vec<(usize, f32)>>) -> MeshSnapshot {
        MeshSnapshot {
            name: name.to_string(),
            vertices: groups.into_iter().map(vertex).collect(),
            triangles: vec![Triangle {
                corners: [0, 1, 2],
                normals: Some([[0.0, 0.0, 1.0]; 3]),
                uvs: Some([[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
            }],
            vertex_groups: vec!["A".to_string(), "B".to_string()],
            materials: vec!["mat".to_string()],
            parent: MeshParent::Armature,
            visibility_node: None,
        }
    }

    fn scene(meshes: Vec<MeshSnapshot>) -> SceneSnapshot {
        SceneSnapshot::builder()
            .meshes(meshes)
            .materials(vec![MaterialSnapshot::builder().name("mat").build()])
            .build()
    }

    fn rigid() -> Vec<Vec<(usize, f32)>> {
        vec![vec![(0, 1.0)]; 3]
    }

    #[test]
    fn clean_scene_passes() {
        let v = validate(&scene(vec![mesh("body", rigid())]), &ExportConfig::default(), true);
        assert!(v.is_ok(), "{:?}", v.violations);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn material_assignment() {
        let mut none = mesh("none", rigid());
        none.materials.clear();
        let mut two = mesh("two", rigid());
        two.materials.push("other".to_string());
        let mut unknown = mesh("unknown", rigid());
        unknown.materials = vec!["ghost".to_string()];

        let v = validate(&scene(vec![none, two, unknown]), &ExportConfig::default(), true);
        assert_eq!(
            v.violations,
            vec![
                Violation::MissingMaterial {
                    mesh: "none".to_string()
                },
                Violation::MultipleMaterials {
                    mesh: "two".to_string(),
                    count: 2
                },
                Violation::UnknownMaterial {
                    mesh: "unknown".to_string(),
                    material: "ghost".to_string()
                },
            ]
        );
    }

    #[test]
    fn unbound_vertex_and_unparented_mesh() {
        let unbound = mesh("unbound", vec![vec![(0, 1.0)], vec![], vec![(0, 1.0)]]);
        let mut loose = mesh("loose", rigid());
        loose.parent = MeshParent::None;

        let v = validate(&scene(vec![unbound, loose]), &ExportConfig::default(), true);
        assert!(v.violations.contains(&Violation::UnboundVertex {
            mesh: "unbound".to_string(),
            vertex: 1
        }));
        assert!(v.violations.contains(&Violation::UnparentedMesh {
            mesh: "loose".to_string()
        }));
    }

    #[test]
    fn weighted_meshes() {
        let weights = vec![vec![(0, 0.5), (1, 0.5)], vec![(0, 1.0)], vec![(1, 1.0)]];
        let board = ExportConfig::builder()
            .model_type(ModelType::BoardOnly)
            .build();
        let v = validate(&scene(vec![mesh("w", weights.clone())]), &board, true);
        assert!(matches!(
            v.violations.as_slice(),
            [Violation::WeightedMeshNotAllowed { .. }]
        ));

        let mut no_uvs = mesh("w", weights);
        no_uvs.triangles[0].uvs = None;
        let v = validate(&scene(vec![no_uvs]), &ExportConfig::default(), true);
        assert_eq!(
            v.violations,
            vec![Violation::SkinnedMeshWithoutUvs {
                mesh: "w".to_string()
            }]
        );
    }

    #[test]
    fn excess_influences_warn() {
        let mut m = mesh(
            "w",
            vec![vec![(0, 0.4), (1, 0.4), (2, 0.2)], vec![(0, 1.0)], vec![(1, 1.0)]],
        );
        m.vertex_groups.push("C".to_string());
        let v = validate(&scene(vec![m]), &ExportConfig::default(), true);
        assert!(v.is_ok());
        assert_eq!(
            v.warnings,
            vec![Warning::ExcessInfluences {
                mesh: "w".to_string(),
                vertices: 1
            }]
        );
    }

    #[test]
    fn missing_hierarchy_and_no_rig() {
        let v = validate(&scene(vec![mesh("m", rigid())]), &ExportConfig::default(), false);
        assert_eq!(
            v.violations,
            vec![Violation::MissingHierarchy {
                model_type: ModelType::Character
            }]
        );

        let no_rig = ExportConfig::builder()
            .model_type(ModelType::NoRig)
            .bone_data_source("rig.gno")
            .build();
        let v = validate(&scene(vec![mesh("m", rigid())]), &no_rig, false);
        assert!(v.is_ok());
        assert!(v.warnings.contains(&Warning::IgnoredBoneSource));
        assert!(v.warnings.contains(&Warning::IgnoredRigData {
            mesh: "m".to_string()
        }));
    }

    #[test]
    fn soft_geometry_defects() {
        let mut m = mesh("m", rigid());
        m.triangles[0].normals = None;
        let v = validate(&scene(vec![m]), &ExportConfig::default(), true);
        assert!(v.is_ok());
        assert_eq!(
            v.warnings,
            vec![Warning::MissingCustomNormals {
                mesh: "m".to_string()
            }]
        );
    }

    #[test]
    fn hard_geometry_defects() {
        let mut m = mesh("m", rigid());
        m.triangles[0].corners = [0, 1, 7];
        m.triangles.push(Triangle {
            corners: [0, 1, 2],
            normals: Some([[0.0, 0.0, 1.0]; 3]),
            uvs: None,
        });
        let v = validate(&scene(vec![m]), &ExportConfig::default(), true);
        assert_eq!(
            v.violations,
            vec![
                Violation::TriangleOutOfRange {
                    mesh: "m".to_string(),
                    triangle: 0,
                    vertex: 7
                },
                Violation::InconsistentUvs {
                    mesh: "m".to_string()
                },
            ]
        );
    }

    #[test]
    fn texture_sizes() {
        let material = MaterialSnapshot::builder()
            .name("mat")
            .graph(ShaderGraph(vec![ShaderNode::ImageTexture {
                image: Some(ImageRef {
                    name: "wide.png".to_string(),
                    size: Some([100, 64]),
                }),
                role: None,
            }]))
            .build();
        let scene = SceneSnapshot::builder()
            .meshes(vec![mesh("m", rigid())])
            .materials(vec![material])
            .build();
        let v = validate(&scene, &ExportConfig::default(), true);
        assert_eq!(
            v.violations,
            vec![Violation::NonPowerOfTwoTexture {
                material: "mat".to_string(),
                image: "wide.png".to_string(),
                width: 100,
                height: 64
            }]
        );
    }
}
