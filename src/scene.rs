//! Normalized scene description handed over by the host editor.
//!
//! The host walks its own object model once and builds a [`SceneSnapshot`];
//! nothing in this crate queries the editor live. Every export pass builds a
//! fresh snapshot, so none of these types carry state between exports.

/// Armature and bone descriptions
pub mod armature;
/// Materials, shader graphs and the [`material::MaterialGraphReader`] capability
pub mod material;
/// Meshes, vertices, triangles and bounds
pub mod mesh;

use bon::Builder;

pub use armature::{ArmatureSnapshot, BoneSnapshot};
pub use material::{
    ImageRef, MaterialFlags, MaterialGraphReader, MaterialSnapshot, ShaderGraph, ShaderNode,
    TextureRole, TextureSlot,
};
pub use mesh::{Bounds, GroupWeight, MeshParent, MeshSnapshot, Triangle, Vertex};

/// A complete scene as authored in the editor.
#[derive(Builder, Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneSnapshot {
    /// Meshes in scene order.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    meshes: Vec<MeshSnapshot>,
    /// Every material in the scene, used or not, in scene order.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    materials: Vec<MaterialSnapshot>,
    #[cfg_attr(feature = "serde", serde(default))]
    armature: Option<ArmatureSnapshot>,
    /// Pre-built chunk copied verbatim after the object chunk (spline data).
    #[cfg_attr(feature = "serde", serde(default))]
    passthrough_chunk: Option<RawChunk>,
}

impl SceneSnapshot {
    pub fn meshes(&self) -> &[MeshSnapshot] {
        &self.meshes
    }

    pub fn materials(&self) -> &[MaterialSnapshot] {
        &self.materials
    }

    pub fn armature(&self) -> Option<&ArmatureSnapshot> {
        self.armature.as_ref()
    }

    pub fn passthrough_chunk(&self) -> Option<&RawChunk> {
        self.passthrough_chunk.as_ref()
    }

    /// Position of the named material in scene order.
    pub fn material_index(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name() == name)
    }
}

/// An opaque chunk emitted as-is: a 4-byte magic and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawChunk {
    pub magic: [u8; 4],
    pub payload: Vec<u8>,
}
