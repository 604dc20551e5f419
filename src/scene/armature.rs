/// The scene's own armature.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmatureSnapshot {
    pub name: String,
    /// Bones in authoring order. Children of the same parent keep this order
    /// when indices are assigned.
    pub bones: Vec<BoneSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneSnapshot {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<String>,
    /// Local translation relative to the parent bone.
    pub translation: [f32; 3],
    /// Local XYZ euler rotation in radians.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: [f32; 3],
    #[cfg_attr(feature = "serde", serde(default = "unit_scale"))]
    pub scale: [f32; 3],
}

#[cfg(feature = "serde")]
fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

impl BoneSnapshot {
    /// A bone with only a translation, the common case for rigs rebuilt from
    /// game data.
    pub fn at(name: impl Into<String>, parent: Option<&str>, translation: [f32; 3]) -> Self {
        BoneSnapshot {
            name: name.into(),
            parent: parent.map(str::to_string),
            translation,
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}
