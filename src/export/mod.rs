//! Export pipeline: validation, rig resolution, material collection and
//! encoding, in that order.

/// Material and texture collection
pub mod collect;
/// GNO chunk encoder
pub mod encoder;
/// Export summary and texture order
pub mod report;
/// Backpatching byte writer
pub mod writer;

use std::path::Path;

use rootcause::Report;
use tracing::{debug, info};

use crate::config::{ExportConfig, ExportFormat, ModelType};
use crate::data::bone_source::read_bone_source;
use crate::error::{ExportError, ExportResult};
use crate::models::node::NodeRecord;
use crate::rig::{AliasMismatch, BoneHierarchy};
use crate::rig::skin::resolve_mesh;
use crate::scene::SceneSnapshot;
use crate::validate::{Warning, validate};

pub use collect::{Collection, collect_materials};
pub use encoder::{EncodeError, EncodeInput, encode};
pub use report::ExportReport;

/// Encoded file contents plus the report describing them.
#[derive(Debug, Clone)]
pub struct EncodedModel {
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

fn build_hierarchy(
    scene: &SceneSnapshot,
    config: &ExportConfig,
    bone_records: Option<Vec<NodeRecord>>,
    warnings: &mut Vec<Warning>,
) -> ExportResult<BoneHierarchy> {
    if config.model_type() == ModelType::NoRig {
        return Ok(BoneHierarchy::empty());
    }

    if let Some(records) = bone_records {
        let (hierarchy, mismatch) = BoneHierarchy::from_borrowed(records, scene.armature())?;
        if let Some(m) = mismatch {
            let warning = match m {
                AliasMismatch::Count {
                    armature_bones,
                    borrowed_bones,
                } => Warning::AliasCountMismatch {
                    armature_bones,
                    borrowed_bones,
                },
                AliasMismatch::Unordered(e) => Warning::UnorderedArmature {
                    reason: e.to_string(),
                },
            };
            warnings.push(warning.logged());
        }
        return Ok(hierarchy);
    }

    match scene.armature() {
        Some(armature) => Ok(BoneHierarchy::from_armature(armature)?),
        None => Ok(BoneHierarchy::empty()),
    }
}

/// Encode a scene in memory.
///
/// `bone_records` are borrowed node records, already read from disk. They
/// replace the scene's own armature unless the model type is
/// [`ModelType::NoRig`].
pub fn encode_scene(
    scene: &SceneSnapshot,
    config: &ExportConfig,
    bone_records: Option<Vec<NodeRecord>>,
) -> ExportResult<EncodedModel> {
    if config.format() != ExportFormat::CharacterModel {
        return Err(ExportError::UnsupportedFormat(config.format()));
    }

    let hierarchy_available = config.model_type() != ModelType::NoRig
        && (bone_records.is_some() || scene.armature().is_some());

    debug!(
        meshes = scene.meshes().len(),
        materials = scene.materials().len(),
        model_type = ?config.model_type(),
        "validating scene"
    );
    let validation = validate(scene, config, hierarchy_available);
    if !validation.is_ok() {
        return Err(ExportError::Validation(validation.violations));
    }
    let mut warnings = validation.warnings;

    let hierarchy = build_hierarchy(scene, config, bone_records, &mut warnings)?;
    debug!(bones = hierarchy.len(), source = ?hierarchy.source(), "built bone hierarchy");

    let default_bone = usize::from(config.default_bone());
    let mut skins = Vec::with_capacity(scene.meshes().len());
    for mesh in scene.meshes() {
        let skin = resolve_mesh(mesh, &hierarchy, default_bone)?;
        if skin.truncated_vertices > 0 {
            debug!(mesh = %mesh.name, vertices = skin.truncated_vertices, "dropped extra weights");
        }
        skins.push(skin);
    }

    let collection = collect_materials(scene.materials());
    warnings.extend(collection.warnings.iter().cloned());

    let bytes = encode(&EncodeInput {
        scene,
        config,
        hierarchy: &hierarchy,
        skins: &skins,
        collection: &collection,
    })?;

    let report = ExportReport {
        textures: collection.textures,
        warnings,
        mesh_count: scene.meshes().len(),
        bone_count: hierarchy.len(),
        material_count: collection.materials.len(),
        hierarchy: hierarchy.source(),
        byte_len: bytes.len(),
    };
    Ok(EncodedModel { bytes, report })
}

/// Export a scene to `output`.
///
/// A relative bone data path is resolved against the output directory, and
/// the output's file name is written into the model. The bone data file is
/// closed again before the output is written, and nothing is written unless
/// encoding succeeded.
pub fn export_to_file(
    scene: &SceneSnapshot,
    config: &ExportConfig,
    output: &Path,
) -> Result<ExportReport, Report<ExportError>> {
    let dir = output.parent().unwrap_or(Path::new(""));
    let mut config = config.with_bone_source_relative_to(dir);
    if let Some(name) = output.file_name().and_then(|n| n.to_str()) {
        config = config.with_file_name(name);
    }

    let bone_records = match config.bone_data_source() {
        Some(path) if config.uses_bone_source() => Some(
            read_bone_source(path, config.bone_data_is_raw())
                .map_err(|e| Report::new(ExportError::from(e)))?,
        ),
        _ => None,
    };

    let encoded = encode_scene(scene, &config, bone_records).map_err(Report::new)?;

    std::fs::write(output, &encoded.bytes).map_err(|e| {
        Report::new(ExportError::Io {
            path: output.to_owned(),
            source: e,
        })
    })?;

    let report = encoded.report;
    info!(
        path = %output.display(),
        bytes = report.byte_len,
        meshes = report.mesh_count,
        textures = report.textures.len(),
        warnings = report.warnings.len(),
        "exported model"
    );
    Ok(report)
}
