//! GNO encoder.
//!
//! Chunks are emitted in a fixed order:
//!
//! `NGIF` → [`NGTL`] → `NGOB` → [pass-through] → `NOF0` → `NFN0` → `NEND`
//!
//! The whole file is built in memory. Chunk sizes, the object descriptor
//! offset and the relocation table location are patched once the data they
//! describe has been written.

use thiserror::Error;
use tracing::debug;

use crate::config::ExportConfig;
use crate::export::collect::Collection;
use crate::export::writer::{CHUNK_ALIGN, GnoWriter};
use crate::models::geometry::{
    ATTRIBUTES_WITH_UVS, ATTRIBUTES_WITHOUT_UVS, GX_TRIANGLE_STRIP, MeshGeometry, VertexCategory,
    quantize_normal, quantize_uv, quantize_weight,
};
use crate::models::gno::{
    DATA_BASE, NEND_MAGIC, NFN0_MAGIC, NGIF_MAGIC, NGOB_MAGIC, NGTL_MAGIC, NOF0_MAGIC,
};
use crate::models::strip::{StripFace, build_strips};
use crate::rig::BoneHierarchy;
use crate::rig::skin::{BoneWeight, ResolvedSkin, SkinBinding, VertexInfluences};
use crate::scene::{Bounds, MeshSnapshot, SceneSnapshot};

const INFO_UNKNOWN: u32 = 0x1C0;
const INFO_VERSION: u32 = 1;
const TEXTURE_ENTRY_FLAGS: u32 = 0x0005_0001;
const NODE_STRIDE: u32 = 0xC;
const VERTEX_SET_LIST_KIND: u32 = 1;
const PRIMITIVE_LIST_KIND: u32 = 4;
const OBJECT_TRAILER: u32 = 4;
/// Declared size of the end chunk. The file's trailing padding is not counted.
const END_CHUNK_SIZE: u32 = 8;

// Attribute kinds in a vertex set descriptor.
const ATTR_POSITIONS: i16 = 1;
const ATTR_UVS: i16 = 2;
const ATTR_NORMALS: i16 = 3;
const ATTR_WEIGHTS: i16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} value {value} does not fit its fixed-width field")]
    Overflow { field: &'static str, value: i64 },
    #[error("{what} {name:?} must be ASCII without NUL bytes")]
    BadName { what: &'static str, name: String },
    #[error("mesh {mesh:?} has no material in the scene")]
    MissingMaterial { mesh: String },
    #[error("{skins} skin bindings supplied for {meshes} meshes")]
    SkinCountMismatch { meshes: usize, skins: usize },
}

/// Narrow `value` into a fixed-width field or fail with an overflow.
pub(crate) fn fit<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T, EncodeError> {
    T::try_from(value).map_err(|_| EncodeError::Overflow { field, value })
}

fn ascii_name<'n>(what: &'static str, name: &'n str) -> Result<&'n [u8], EncodeError> {
    if name.is_ascii() && !name.contains('\0') {
        Ok(name.as_bytes())
    } else {
        Err(EncodeError::BadName {
            what,
            name: name.to_string(),
        })
    }
}

/// Everything resolved before encoding starts.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInput<'a> {
    pub scene: &'a SceneSnapshot,
    pub config: &'a ExportConfig,
    pub hierarchy: &'a BoneHierarchy,
    /// One binding per scene mesh, in scene order.
    pub skins: &'a [ResolvedSkin],
    pub collection: &'a Collection,
}

/// A mesh with everything its records need.
struct PlannedMesh<'a> {
    skin: &'a ResolvedSkin,
    geometry: MeshGeometry,
    bounds: Bounds,
    material: u32,
    visibility: u32,
    matrix_index: i32,
}

/// The meshes of one vertex set, in scene order.
struct VertexSetPlan<'a> {
    category: VertexCategory,
    meshes: Vec<PlannedMesh<'a>>,
}

fn plan_mesh<'a>(
    input: &EncodeInput<'a>,
    mesh: &'a MeshSnapshot,
    skin: &'a ResolvedSkin,
) -> Result<(VertexCategory, PlannedMesh<'a>), EncodeError> {
    let category = VertexCategory::classify(mesh.has_uvs(), skin.is_weighted());
    let material = mesh
        .materials
        .first()
        .and_then(|name| input.scene.material_index(name))
        .ok_or_else(|| EncodeError::MissingMaterial {
            mesh: mesh.name.clone(),
        })?;

    let rigid_bone = skin.rigid_bone();
    let visibility = match mesh
        .visibility_node
        .or(input.config.model_type().default_visibility_node())
    {
        Some(node) => node,
        None => fit("visibility node", rigid_bone.unwrap_or(0) as i64)?,
    };
    let matrix_index = match rigid_bone {
        Some(bone) => fit("matrix index", bone as i64)?,
        None => -1,
    };

    Ok((
        category,
        PlannedMesh {
            skin,
            geometry: MeshGeometry::build(mesh, category),
            bounds: mesh.bounds(),
            material: fit("material index", material as i64)?,
            visibility,
            matrix_index,
        },
    ))
}

/// Group meshes into vertex sets. Empty sets are left out.
fn plan_vertex_sets<'a>(input: &EncodeInput<'a>) -> Result<Vec<VertexSetPlan<'a>>, EncodeError> {
    let mut sets: Vec<VertexSetPlan<'a>> = VertexCategory::VERTEX_SET_ORDER
        .into_iter()
        .map(|category| VertexSetPlan {
            category,
            meshes: Vec::new(),
        })
        .collect();

    for (mesh, skin) in input.scene.meshes().iter().zip(input.skins) {
        let (category, planned) = plan_mesh(input, mesh, skin)?;
        if planned.geometry.used_vertex_normals {
            debug!(mesh = %mesh.name, "using vertex normals");
        }
        if let Some(set) = sets.iter_mut().find(|s| s.category == category) {
            set.meshes.push(planned);
        }
    }

    sets.retain(|s| !s.meshes.is_empty());
    Ok(sets)
}

/// Where one vertex set's arrays were written.
struct VertexSetLayout {
    positions: (u32, i16),
    normals: (u32, i16),
    uvs: Option<(u32, i16)>,
    weights: Option<(u32, i16)>,
}

fn influences(skin: &ResolvedSkin, vertex_count: usize) -> Vec<VertexInfluences> {
    match &skin.binding {
        SkinBinding::Weighted { vertices } => vertices.clone(),
        SkinBinding::Rigid { bone } => vec![
            VertexInfluences {
                primary: BoneWeight {
                    bone: *bone,
                    weight: 1.0,
                },
                secondary: None,
            };
            vertex_count
        ],
    }
}

fn write_vertex_data(w: &mut GnoWriter, set: &VertexSetPlan<'_>) -> Result<VertexSetLayout, EncodeError> {
    let meshes = &set.meshes;

    let offset = w.data_offset()?;
    let mut count = 0;
    for m in meshes {
        for p in &m.geometry.positions {
            w.put_f32s(p);
        }
        count += m.geometry.positions.len();
    }
    w.align(4);
    let positions = (offset, fit("vertex count", count as i64)?);

    let offset = w.data_offset()?;
    let mut count = 0;
    for m in meshes {
        for n in &m.geometry.normals {
            for c in quantize_normal(*n) {
                w.put_i8(fit("normal component", c)?);
            }
        }
        count += m.geometry.normals.len();
    }
    w.align(4);
    let normals = (offset, fit("normal count", count as i64)?);

    let uvs = if set.category.has_uvs() {
        let offset = w.data_offset()?;
        let mut count = 0;
        for m in meshes {
            for uv in &m.geometry.uvs {
                for c in quantize_uv(*uv) {
                    w.put_i16(fit("uv component", c)?);
                }
            }
            count += m.geometry.uvs.len();
        }
        w.align(4);
        Some((offset, fit("uv count", count as i64)?))
    } else {
        None
    };

    let weights = if set.category.is_skinned() {
        let offset = w.data_offset()?;
        let mut count = 0;
        for m in meshes {
            let vertex_count = m.geometry.positions.len();
            for inf in influences(m.skin, vertex_count) {
                w.put_u8(fit("skin bone index", inf.primary.bone as i64)?);
                let second = inf.secondary.map_or(0, |s| s.bone);
                w.put_u8(fit("skin bone index", second as i64)?);
                w.put_i16(fit("skin weight", quantize_weight(inf.primary.weight))?);
            }
            count += vertex_count;
        }
        w.align(4);
        Some((offset, fit("weight count", count as i64)?))
    } else {
        None
    };

    Ok(VertexSetLayout {
        positions,
        normals,
        uvs,
        weights,
    })
}

fn put_attribute(
    w: &mut GnoWriter,
    kind: i16,
    attribute: Option<(u32, i16)>,
) -> Result<(), EncodeError> {
    match attribute {
        Some((offset, count)) => {
            w.put_i16(kind);
            w.put_i16(count);
            w.put_pointer(offset)
        }
        None => {
            w.put_zeros(8);
            Ok(())
        }
    }
}

fn write_vertex_set_descriptor(w: &mut GnoWriter, layout: &VertexSetLayout) -> Result<(), EncodeError> {
    put_attribute(w, ATTR_POSITIONS, Some(layout.positions))?;
    put_attribute(w, ATTR_NORMALS, Some(layout.normals))?;
    // colours
    w.put_zeros(8);
    put_attribute(w, ATTR_UVS, layout.uvs)?;
    w.put_zeros(8);
    put_attribute(w, ATTR_WEIGHTS, layout.weights)?;
    w.put_zeros(8);
    Ok(())
}

struct Primitive {
    flags: u32,
    offset: u32,
    length: u32,
}

fn write_primitives(
    w: &mut GnoWriter,
    set: &VertexSetPlan<'_>,
    out: &mut Vec<Primitive>,
) -> Result<(), EncodeError> {
    let category = set.category;
    let (mut position_base, mut normal_base, mut uv_base) = (0u32, 0u32, 0u32);

    for m in &set.meshes {
        w.align(CHUNK_ALIGN);
        let start = w.position();
        let offset = w.data_offset()?;

        w.put_bytes(category.display_list_preamble());
        w.put_u8(if category.has_uvs() {
            ATTRIBUTES_WITH_UVS
        } else {
            ATTRIBUTES_WITHOUT_UVS
        });

        let faces: Vec<StripFace> = m
            .geometry
            .faces
            .iter()
            .map(|f| f.offset(position_base, normal_base, uv_base))
            .collect();
        for strip in build_strips(&faces) {
            w.put_u8(GX_TRIANGLE_STRIP);
            w.put_u16(fit("strip index count", strip.index_count() as i64)?);
            for index in strip.indices() {
                w.put_u16(fit("position index", index.position.into())?);
                w.put_u16(fit("normal index", index.normal.into())?);
                if let Some(uv) = index.uv {
                    w.put_u16(fit("uv index", uv.into())?);
                }
            }
        }
        w.align(CHUNK_ALIGN);

        out.push(Primitive {
            flags: category.primitive_flags(),
            offset,
            length: fit("primitive length", (w.position() - start) as i64)?,
        });

        position_base += fit::<u32>("position index", m.geometry.positions.len() as i64)?;
        normal_base += fit::<u32>("normal index", m.geometry.normals.len() as i64)?;
        uv_base += fit::<u32>("uv index", m.geometry.uvs.len() as i64)?;
    }
    Ok(())
}

fn write_texture_list(w: &mut GnoWriter, textures: &[String]) -> Result<(), EncodeError> {
    let chunk = w.begin_chunk(NGTL_MAGIC);
    let list_slot = w.reserve_u32();
    w.put_zeros(4);

    let entries = w.data_offset()?;
    let mut name_slots = Vec::with_capacity(textures.len());
    for _ in textures {
        w.put_zeros(4);
        name_slots.push(w.reserve_pointer()?);
        w.put_u32(TEXTURE_ENTRY_FLAGS);
        w.put_zeros(8);
    }

    let list = w.data_offset()?;
    w.patch_u32(list_slot, list);
    w.put_u32(fit("texture count", textures.len() as i64)?);
    w.put_pointer(entries)?;

    for (name, slot) in textures.iter().zip(name_slots) {
        let bytes = ascii_name("texture name", name)?;
        let offset = w.data_offset()?;
        w.patch_u32(slot, offset);
        w.put_bytes(bytes);
        w.put_u8(0);
    }

    w.end_chunk(chunk)
}

fn write_object(
    w: &mut GnoWriter,
    input: &EncodeInput<'_>,
    sets: &[VertexSetPlan<'_>],
) -> Result<(), EncodeError> {
    let chunk = w.begin_chunk(NGOB_MAGIC);
    let descriptor_slot = w.reserve_u32();
    w.put_zeros(4);

    let node_offset = w.data_offset()?;
    for record in input.hierarchy.records() {
        w.put_bytes(&record.to_bytes());
    }

    let materials = &input.collection.materials;
    let mut material_offsets = Vec::with_capacity(materials.len());
    for material in materials {
        material_offsets.push(w.data_offset()?);
        w.put_bytes(&material.to_bytes());
    }
    let material_list = w.data_offset()?;
    for (material, offset) in materials.iter().zip(material_offsets) {
        let mask = material.texture_mask().ok_or(EncodeError::Overflow {
            field: "material texture count",
            value: material.textures.len() as i64,
        })?;
        w.put_u16(mask);
        w.put_u16(0xFFFF);
        w.put_pointer(offset)?;
    }
    w.align(4);

    let mut layouts = Vec::with_capacity(sets.len());
    for set in sets {
        layouts.push(write_vertex_data(w, set)?);
    }
    let mut set_descriptors = Vec::with_capacity(sets.len());
    for layout in &layouts {
        set_descriptors.push(w.data_offset()?);
        write_vertex_set_descriptor(w, layout)?;
    }
    let vertex_set_list = w.data_offset()?;
    for descriptor in &set_descriptors {
        w.put_u32(VERTEX_SET_LIST_KIND);
        w.put_pointer(*descriptor)?;
    }

    let mut primitives = Vec::new();
    for set in sets {
        write_primitives(w, set, &mut primitives)?;
    }
    let mut primitive_descriptors = Vec::with_capacity(primitives.len());
    for p in &primitives {
        primitive_descriptors.push(w.data_offset()?);
        w.put_u32(p.flags);
        w.put_pointer(p.offset)?;
        w.put_u32(p.length);
        w.put_u32(0);
    }
    let primitive_list = w.data_offset()?;
    for descriptor in &primitive_descriptors {
        w.put_u32(PRIMITIVE_LIST_KIND);
        w.put_pointer(*descriptor)?;
    }

    let mut mesh_starts = Vec::with_capacity(sets.len());
    let mut primitive_index = 0u32;
    for (set_index, set) in sets.iter().enumerate() {
        mesh_starts.push((set.category, w.data_offset()?, set.meshes.len()));
        for m in &set.meshes {
            w.put_f32s(&m.bounds.center);
            w.put_f32(m.bounds.radius);
            w.put_u32(m.visibility);
            w.put_i32(m.matrix_index);
            w.put_u32(m.material);
            w.put_u32(set_index as u32);
            w.put_u32(primitive_index);
            primitive_index += 1;
        }
    }

    let mesh_set_offset = w.data_offset()?;
    let mut mesh_set_count = 0u32;
    for category in VertexCategory::MESH_SET_ORDER {
        let Some(&(_, start, count)) = mesh_starts.iter().find(|(c, _, _)| *c == category) else {
            continue;
        };
        w.put_u32(category.set_flags());
        w.put_u32(fit("mesh count", count as i64)?);
        w.put_pointer(start)?;
        w.put_zeros(8);
        mesh_set_count += 1;
    }

    let descriptor = w.data_offset()?;
    w.patch_u32(descriptor_slot, descriptor);

    let bounds = Bounds::from_points(
        input
            .scene
            .meshes()
            .iter()
            .flat_map(|m| m.vertices.iter().map(|v| v.position)),
    );
    let node_count: u32 = fit("node count", input.hierarchy.len() as i64)?;
    w.put_f32s(&bounds.center);
    w.put_f32(bounds.radius);
    w.put_u32(fit("material count", materials.len() as i64)?);
    w.put_pointer(material_list)?;
    w.put_u32(sets.len() as u32);
    w.put_pointer(vertex_set_list)?;
    w.put_u32(fit("primitive count", primitives.len() as i64)?);
    w.put_pointer(primitive_list)?;
    w.put_u32(node_count);
    w.put_u32(NODE_STRIDE);
    w.put_pointer(node_offset)?;
    // matrix palette size
    w.put_u32(node_count);
    w.put_u32(mesh_set_count);
    w.put_pointer(mesh_set_offset)?;
    w.put_u32(OBJECT_TRAILER);

    w.end_chunk(chunk)
}

fn write_relocations(w: &mut GnoWriter) -> Result<(), EncodeError> {
    let relocations = w.relocations();
    let chunk = w.begin_chunk(NOF0_MAGIC);
    w.put_u32(fit("relocation count", relocations.len() as i64)?);
    w.put_zeros(4);
    for offset in relocations {
        w.put_u32(offset);
    }
    w.end_chunk(chunk)
}

fn write_file_name(w: &mut GnoWriter, name: &str) -> Result<(), EncodeError> {
    let bytes = ascii_name("file name", name)?;
    let chunk = w.begin_chunk(NFN0_MAGIC);
    w.put_zeros(8);
    w.put_bytes(bytes);
    w.put_u8(0);
    w.end_chunk(chunk)
}

/// Encode a resolved scene into GNO bytes.
pub fn encode(input: &EncodeInput<'_>) -> Result<Vec<u8>, EncodeError> {
    let meshes = input.scene.meshes().len();
    if input.skins.len() != meshes {
        return Err(EncodeError::SkinCountMismatch {
            meshes,
            skins: input.skins.len(),
        });
    }

    let sets = plan_vertex_sets(input)?;
    let include_textures = input.config.include_texture_list();
    let mut w = GnoWriter::new();

    let info = w.begin_chunk(NGIF_MAGIC);
    w.put_u32(if include_textures { 2 } else { 1 });
    w.put_u32(DATA_BASE as u32);
    let relocation_offset = w.reserve_u32();
    let relocation_file_offset = w.reserve_u32();
    w.put_u32(INFO_UNKNOWN);
    w.put_u32(INFO_VERSION);
    w.end_chunk(info)?;

    if include_textures {
        write_texture_list(&mut w, &input.collection.textures)?;
    }
    write_object(&mut w, input, &sets)?;

    if let Some(raw) = input.scene.passthrough_chunk() {
        debug!(magic = %String::from_utf8_lossy(&raw.magic), len = raw.payload.len(), "pass-through chunk");
        let chunk = w.begin_chunk(raw.magic);
        w.put_bytes(&raw.payload);
        w.end_chunk(chunk)?;
    }

    let nof0 = w.data_offset()?;
    w.patch_u32(relocation_offset, nof0);
    w.patch_u32(
        relocation_file_offset,
        fit("relocation table offset", i64::from(nof0) + DATA_BASE as i64)?,
    );
    write_relocations(&mut w)?;
    write_file_name(&mut w, input.config.file_name())?;

    let end = w.begin_chunk(NEND_MAGIC);
    w.put_zeros(END_CHUNK_SIZE as usize);
    w.end_chunk_declaring(end, END_CHUNK_SIZE);

    let bytes = w.into_bytes();
    debug!(bytes = bytes.len(), vertex_sets = sets.len(), "encoded model");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;
    use crate::export::collect::collect_materials;
    use crate::models::gno::GnoFile;
    use crate::rig::skin::resolve_mesh;
    use crate::scene::{
        ArmatureSnapshot, BoneSnapshot, GroupWeight, ImageRef, MaterialSnapshot, MeshParent,
        RawChunk, ShaderGraph, ShaderNode, Triangle, Vertex,
    };

    fn quad(name: &str, uvs: bool, groups: [Vec<(usize, f32)>; 4]) -> MeshSnapshot {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let vertices = positions
            .into_iter()
            .zip(groups)
            .map(|(position, groups)| Vertex {
                position,
                normal: [0.0, 0.0, 1.0],
                groups: groups
                    .into_iter()
                    .map(|(group, weight)| GroupWeight { group, weight })
                    .collect(),
            })
            .collect();
        let triangle = |corners: [u32; 3]| Triangle {
            corners,
            normals: Some([[0.0, 0.0, 1.0]; 3]),
            uvs: uvs.then(|| corners.map(|c| [positions[c as usize][0], positions[c as usize][1]])),
        };
        MeshSnapshot {
            name: name.to_string(),
            vertices,
            triangles: vec![triangle([0, 1, 2]), triangle([1, 2, 3])],
            vertex_groups: vec!["Root".to_string(), "Arm".to_string()],
            materials: vec!["skin".to_string()],
            parent: MeshParent::Armature,
            visibility_node: None,
        }
    }

    fn scene() -> SceneSnapshot {
        let rigid = || vec![(1, 1.0)];
        let mut untextured = quad("eyes", false, [rigid(), rigid(), rigid(), rigid()]);
        untextured.parent = MeshParent::Bone("Root".to_string());
        SceneSnapshot::builder()
            .meshes(vec![
                quad("body", true, [rigid(), rigid(), rigid(), rigid()]),
                untextured,
                quad(
                    "arm",
                    true,
                    [vec![(0, 1.0)], vec![(0, 0.5), (1, 0.5)], vec![(1, 1.0)], vec![(1, 1.0)]],
                ),
            ])
            .materials(vec![
                MaterialSnapshot::builder().name("unused").build(),
                MaterialSnapshot::builder()
                    .name("skin")
                    .graph(ShaderGraph(vec![ShaderNode::ImageTexture {
                        image: Some(ImageRef {
                            name: "skin.png".to_string(),
                            size: Some([128, 128]),
                        }),
                        role: None,
                    }]))
                    .build(),
            ])
            .armature(ArmatureSnapshot {
                name: "Armature".to_string(),
                bones: vec![
                    BoneSnapshot::at("Root", None, [0.0; 3]),
                    BoneSnapshot::at("Arm", Some("Root"), [0.0, 1.0, 0.0]),
                ],
            })
            .build()
    }

    fn encode_scene(scene: &SceneSnapshot, config: &ExportConfig) -> Result<Vec<u8>, EncodeError> {
        let hierarchy = match scene.armature() {
            Some(armature) => BoneHierarchy::from_armature(armature).unwrap(),
            None => BoneHierarchy::empty(),
        };
        let skins: Vec<_> = scene
            .meshes()
            .iter()
            .map(|m| resolve_mesh(m, &hierarchy, 0).unwrap())
            .collect();
        let collection = collect_materials(scene.materials());
        encode(&EncodeInput {
            scene,
            config,
            hierarchy: &hierarchy,
            skins: &skins,
            collection: &collection,
        })
    }

    #[test]
    fn chunk_sizes_cover_the_file() {
        let bytes = encode_scene(&scene(), &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();

        let magics: Vec<String> = gno.chunks.iter().map(|c| c.magic_str()).collect();
        assert_eq!(magics, ["NGIF", "NGTL", "NGOB", "NOF0", "NFN0", "NEND"]);

        let (last, body) = gno.chunks.split_last().unwrap();
        let mut expected = 0;
        for chunk in body {
            assert_eq!(chunk.offset, expected);
            assert_eq!(chunk.offset % CHUNK_ALIGN, 0);
            expected = chunk.offset + 8 + chunk.declared_size();
        }

        // The end chunk declares 8 bytes; the file is padded past it.
        assert_eq!(last.magic, NEND_MAGIC);
        assert_eq!(last.offset, expected);
        assert_eq!(last.declared_size(), 8);
        assert_eq!(bytes.len(), last.offset + CHUNK_ALIGN);
        assert!(bytes[last.offset + 8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn counts_survive_a_round_trip() {
        let bytes = encode_scene(&scene(), &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();

        assert_eq!(gno.header.object_chunk_index, 2);
        assert_eq!(gno.textures, vec!["skin.gvr"]);
        assert_eq!(gno.file_name.as_deref(), Some("model.gno"));

        let d = &gno.object.descriptor;
        assert_eq!(d.material_count, 2);
        assert_eq!(d.vertex_set_count, 3);
        assert_eq!(d.primitive_count, 3);
        assert_eq!(d.node_count, 2);
        assert_eq!(gno.object.nodes[1].parent, 0);

        let sets: Vec<(u32, u32)> = gno
            .object
            .mesh_sets
            .iter()
            .map(|s| (s.flags, s.mesh_count))
            .collect();
        assert_eq!(sets, vec![(0x101, 1), (0x201, 1), (0x102, 1)]);
        assert_eq!(gno.object.mesh_count(), 3);
    }

    #[test]
    fn relocation_table_matches_header() {
        let bytes = encode_scene(&scene(), &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();

        let nof0 = gno.chunk(NOF0_MAGIC).unwrap();
        assert_eq!(gno.header.relocation_file_offset as usize, nof0.offset);
        assert_eq!(
            gno.header.relocation_offset as usize + DATA_BASE,
            nof0.offset
        );
        assert!(!gno.relocations.is_empty());
        assert!(gno.relocations.windows(2).all(|w| w[0] < w[1]));
        for &at in &gno.relocations {
            let at = DATA_BASE + at as usize;
            let target = u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap());
            assert!(DATA_BASE + (target as usize) < nof0.offset);
        }
    }

    #[test]
    fn texture_list_is_optional() {
        let config = ExportConfig::builder().include_texture_list(false).build();
        let bytes = encode_scene(&scene(), &config).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();
        assert_eq!(gno.header.object_chunk_index, 1);
        assert!(!gno.has_chunk(NGTL_MAGIC));
        assert!(gno.textures.is_empty());
    }

    #[test]
    fn pass_through_chunk_follows_object() {
        let base = scene();
        let scene = SceneSnapshot::builder()
            .meshes(base.meshes().to_vec())
            .materials(base.materials().to_vec())
            .maybe_armature(base.armature().cloned())
            .passthrough_chunk(RawChunk {
                magic: *b"NSPL",
                payload: vec![1, 2, 3],
            })
            .build();
        let bytes = encode_scene(&scene, &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();
        let magics: Vec<String> = gno.chunks.iter().map(|c| c.magic_str()).collect();
        assert_eq!(magics[3], "NSPL");
        assert_eq!(&gno.chunks[3].payload[..3], &[1, 2, 3]);
    }

    #[test]
    fn skinned_mesh_records() {
        let bytes = encode_scene(&scene(), &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();
        let skinned = gno.object.mesh_sets[1];
        let record = DATA_BASE + skinned.offset as usize;
        let field = |i: usize| {
            let at = record + 16 + i * 4;
            u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
        };
        assert_eq!(field(0), 0x46);
        assert_eq!(field(1) as i32, -1);
        assert_eq!(field(2), 1);
        // Skinned meshes are the third vertex set and the third primitive.
        assert_eq!(field(3), 2);
        assert_eq!(field(4), 2);
    }

    fn be_u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn be_i16_at(bytes: &[u8], at: usize) -> i16 {
        i16::from_be_bytes(bytes[at..at + 2].try_into().unwrap())
    }

    /// File offset of the `index`th vertex set descriptor.
    fn vertex_set(bytes: &[u8], gno: &GnoFile<'_>, index: usize) -> usize {
        let list = DATA_BASE + gno.object.descriptor.vertex_set_offset as usize;
        DATA_BASE + be_u32_at(bytes, list + index * 8 + 4) as usize
    }

    /// Kind, count and file offset of one attribute slot of a vertex set.
    fn attribute(bytes: &[u8], set: usize, slot: usize) -> (i16, i16, usize) {
        let at = set + slot * 8;
        (
            be_i16_at(bytes, at),
            be_i16_at(bytes, at + 2),
            DATA_BASE + be_u32_at(bytes, at + 4) as usize,
        )
    }

    /// Display list bytes of the `index`th primitive, padding included.
    fn primitive<'b>(bytes: &'b [u8], gno: &GnoFile<'_>, index: usize) -> &'b [u8] {
        let list = DATA_BASE + gno.object.descriptor.primitive_offset as usize;
        let descriptor = DATA_BASE + be_u32_at(bytes, list + index * 8 + 4) as usize;
        let start = DATA_BASE + be_u32_at(bytes, descriptor + 4) as usize;
        let len = be_u32_at(bytes, descriptor + 8) as usize;
        &bytes[start..start + len]
    }

    #[test]
    fn vertex_arrays_are_quantized() {
        let bytes = encode_scene(&scene(), &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();

        // Textured set: normals scaled by 64, UVs by 256 with V flipped.
        let textured = vertex_set(&bytes, &gno, 0);
        let (kind, count, normals) = attribute(&bytes, textured, 1);
        assert_eq!((kind, count), (ATTR_NORMALS, 6));
        assert_eq!(&bytes[normals..normals + 3], &[0, 0, 0x40]);
        let (kind, count, uvs) = attribute(&bytes, textured, 3);
        assert_eq!((kind, count), (ATTR_UVS, 4));
        assert_eq!(&bytes[uvs..uvs + 8], &[0, 0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(attribute(&bytes, textured, 5).0, 0);

        // Skinned set: bone, bone, weight * 16384 per vertex.
        let skinned = vertex_set(&bytes, &gno, 2);
        let (kind, count, weights) = attribute(&bytes, skinned, 5);
        assert_eq!((kind, count), (ATTR_WEIGHTS, 4));
        assert_eq!(
            &bytes[weights..weights + 16],
            &[
                0, 0, 0x40, 0x00, // Root only
                0, 1, 0x20, 0x00, // Root and Arm, half each
                1, 0, 0x40, 0x00, // Arm only
                1, 0, 0x40, 0x00,
            ]
        );
    }

    #[test]
    fn strips_index_into_the_shared_vertex_set() {
        let rigid = || vec![(1, 1.0)];
        let base = scene();
        let scene = SceneSnapshot::builder()
            .meshes(vec![
                quad("body", true, [rigid(), rigid(), rigid(), rigid()]),
                quad("head", true, [rigid(), rigid(), rigid(), rigid()]),
            ])
            .materials(base.materials().to_vec())
            .maybe_armature(base.armature().cloned())
            .build();
        let bytes = encode_scene(&scene, &ExportConfig::default()).unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();
        assert_eq!(gno.object.descriptor.vertex_set_count, 1);

        let strip = |indices: [[u16; 3]; 3]| {
            let mut out = vec![GX_TRIANGLE_STRIP, 0, 3];
            for index in indices {
                for v in index {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            out
        };
        let expect = |strips: Vec<u8>| {
            let mut out = VertexCategory::Textured.display_list_preamble().to_vec();
            out.push(ATTRIBUTES_WITH_UVS);
            out.extend(strips);
            out
        };

        // Each corner is (position, normal, uv). The two triangles of a quad
        // do not chain, so every mesh gives two strips of one face.
        let body = primitive(&bytes, &gno, 0);
        let expected = expect(
            [
                strip([[1, 1, 1], [0, 0, 0], [2, 2, 2]]),
                strip([[2, 4, 2], [1, 3, 1], [3, 5, 3]]),
            ]
            .concat(),
        );
        assert_eq!(&body[..expected.len()], &expected[..]);
        assert!(body[expected.len()..].iter().all(|&b| b == 0));
        assert_eq!(body.len() % CHUNK_ALIGN, 0);

        // The second mesh is offset by 4 positions, 6 corner normals and 4 UVs.
        let head = primitive(&bytes, &gno, 1);
        let expected = expect(
            [
                strip([[5, 7, 5], [4, 6, 4], [6, 8, 6]]),
                strip([[6, 10, 6], [5, 9, 5], [7, 11, 7]]),
            ]
            .concat(),
        );
        assert_eq!(&head[..expected.len()], &expected[..]);
    }

    #[test]
    fn no_rig_models_bind_to_the_default_bone() {
        let mut body = quad("body", true, [vec![], vec![], vec![], vec![]]);
        body.parent = MeshParent::None;
        let scene = SceneSnapshot::builder()
            .meshes(vec![body])
            .materials(vec![MaterialSnapshot::builder().name("skin").build()])
            .build();
        let config = ExportConfig::builder()
            .model_type(ModelType::NoRig)
            .default_bone(3)
            .build();

        let collection = collect_materials(scene.materials());
        let skins = vec![resolve_mesh(&scene.meshes()[0], &BoneHierarchy::empty(), 3).unwrap()];
        let bytes = encode(&EncodeInput {
            scene: &scene,
            config: &config,
            hierarchy: &BoneHierarchy::empty(),
            skins: &skins,
            collection: &collection,
        })
        .unwrap();
        let gno = GnoFile::parse(&bytes).unwrap();
        assert_eq!(gno.object.descriptor.node_count, 0);

        let record = DATA_BASE + gno.object.mesh_sets[0].offset as usize;
        let visibility = u32::from_be_bytes(bytes[record + 16..record + 20].try_into().unwrap());
        let matrix = i32::from_be_bytes(bytes[record + 20..record + 24].try_into().unwrap());
        assert_eq!((visibility, matrix), (3, 3));
    }

    #[test]
    fn oversized_vertex_set_aborts() {
        let mut body = quad("body", true, [vec![(0, 1.0)], vec![(0, 1.0)], vec![(0, 1.0)], vec![(0, 1.0)]]);
        let filler = body.vertices[0].clone();
        body.vertices.resize(40_000, filler);
        let scene = SceneSnapshot::builder()
            .meshes(vec![body])
            .materials(vec![MaterialSnapshot::builder().name("skin").build()])
            .armature(ArmatureSnapshot {
                name: "Armature".to_string(),
                bones: vec![BoneSnapshot::at("Root", None, [0.0; 3])],
            })
            .build();
        assert_eq!(
            encode_scene(&scene, &ExportConfig::default()),
            Err(EncodeError::Overflow {
                field: "vertex count",
                value: 40_000
            })
        );
    }

    #[test]
    fn names_must_be_ascii() {
        let config = ExportConfig::builder().file_name("modèle.gno").build();
        assert!(matches!(
            encode_scene(&scene(), &config),
            Err(EncodeError::BadName { what: "file name", .. })
        ));
    }
}
