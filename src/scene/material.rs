use std::fmt;
use std::path::Path;

use bon::Builder;

use crate::recognized::Recognized;

/// Colour used when a material graph has no RGB node.
pub const DEFAULT_BASE_COLOR: [f32; 3] = [0.752_941_25; 3];
/// Opacity used when a material graph has no value node.
pub const DEFAULT_OPACITY: f32 = 1.0;
/// Archive name written for texture slots with no backing image.
pub const UNTITLED_TEXTURE: &str = "untitled.gvr";

/// Per-material custom properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaterialFlags {
    pub backface_culling_disabled: bool,
    pub always_on_top: bool,
    pub fullbright: bool,
}

/// What the engine does with a texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureRole {
    Diffuse,
    Reflection,
    Emission,
}

impl TextureRole {
    /// Map a host role tag onto a role. Untagged slots are diffuse.
    pub fn from_tag(tag: Option<&str>) -> Recognized<TextureRole> {
        match tag.map(str::trim) {
            None | Some("") | Some("none") | Some("diffuse") => Recognized::Known(Self::Diffuse),
            Some("reflective") | Some("reflection") => Recognized::Known(Self::Reflection),
            Some("emissive") | Some("emission") => Recognized::Known(Self::Emission),
            Some(other) => Recognized::Unknown(other.to_string()),
        }
    }

    /// Texture entry flags stored in the material record.
    pub fn slot_flags(self) -> u32 {
        match self {
            TextureRole::Diffuse => 0x400C_0101,
            TextureRole::Reflection => 0x400C_2004,
            TextureRole::Emission => 0x400C_0104,
        }
    }
}

impl fmt::Display for TextureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureRole::Diffuse => "diffuse",
            TextureRole::Reflection => "reflection",
            TextureRole::Emission => "emission",
        };
        f.write_str(name)
    }
}

/// An image referenced by an image-texture node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageRef {
    /// Image name or path as known to the host (e.g. `body.png`).
    pub name: String,
    /// Pixel dimensions, when the host knows them.
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: Option<[u32; 2]>,
}

impl ImageRef {
    /// Name of the converted texture inside the texture archive: the file
    /// stem with a `.gvr` extension.
    pub fn archive_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name);
        format!("{stem}.gvr")
    }

    pub fn is_power_of_two(&self) -> bool {
        self.size
            .is_none_or(|[w, h]| w.is_power_of_two() && h.is_power_of_two())
    }
}

/// A shader-graph node the exporter knows how to read. Nodes need not be
/// connected to the material output.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ShaderNode {
    Rgb {
        color: [f32; 3],
    },
    Value {
        value: f32,
    },
    ImageTexture {
        #[cfg_attr(feature = "serde", serde(default))]
        image: Option<ImageRef>,
        /// Host role tag (`none`, `reflective`, `emissive`).
        #[cfg_attr(feature = "serde", serde(default))]
        role: Option<String>,
    },
    Other {
        kind: String,
    },
}

/// Nodes of a material graph in host order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ShaderGraph(pub Vec<ShaderNode>);

impl ShaderGraph {
    pub fn nodes(&self) -> &[ShaderNode] {
        &self.0
    }
}

#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialSnapshot {
    #[builder(into)]
    name: String,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    flags: MaterialFlags,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    graph: ShaderGraph,
}

impl MaterialSnapshot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }
}

/// One texture slot read from a material graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSlot {
    /// `None` when the node has no image assigned.
    pub image: Option<ImageRef>,
    pub role: Recognized<TextureRole>,
}

impl TextureSlot {
    /// Role used for encoding. Unknown tags fall back to diffuse.
    pub fn effective_role(&self) -> TextureRole {
        self.role.clone().unwrap_or(TextureRole::Diffuse)
    }
}

/// Read access to a host material graph.
///
/// The collector only depends on this trait, so a host can implement it
/// directly on its own material type instead of building a
/// [`MaterialSnapshot`].
pub trait MaterialGraphReader {
    fn name(&self) -> &str;

    fn flags(&self) -> MaterialFlags;

    fn base_color(&self) -> [f32; 3];

    fn opacity(&self) -> f32;

    /// Every image-texture node, in graph order.
    fn texture_slots(&self) -> Vec<TextureSlot>;
}

impl MaterialGraphReader for MaterialSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn flags(&self) -> MaterialFlags {
        self.flags
    }

    // The last node of a kind wins, matching how the host walks its graph.
    fn base_color(&self) -> [f32; 3] {
        self.graph
            .nodes()
            .iter()
            .rev()
            .find_map(|node| match node {
                ShaderNode::Rgb { color } => Some(*color),
                _ => None,
            })
            .unwrap_or(DEFAULT_BASE_COLOR)
    }

    fn opacity(&self) -> f32 {
        self.graph
            .nodes()
            .iter()
            .rev()
            .find_map(|node| match node {
                ShaderNode::Value { value } => Some(*value),
                _ => None,
            })
            .unwrap_or(DEFAULT_OPACITY)
    }

    fn texture_slots(&self) -> Vec<TextureSlot> {
        self.graph
            .nodes()
            .iter()
            .filter_map(|node| match node {
                ShaderNode::ImageTexture { image, role } => Some(TextureSlot {
                    image: image.clone(),
                    role: TextureRole::from_tag(role.as_deref()),
                }),
                _ => None,
            })
            .collect()
    }
}
