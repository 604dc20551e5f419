use std::path::{Path, PathBuf};

use bon::Builder;

/// Output format of an export pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bin", derive(clap::ValueEnum))]
pub enum ExportFormat {
    #[default]
    CharacterModel,
    /// Standalone spline file. Not implemented; a spline chunk can still be
    /// carried through a character model as a pass-through chunk.
    Spline,
}

/// Which rig the model is built against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bin", derive(clap::ValueEnum))]
pub enum ModelType {
    /// Full character rig. Requires a hierarchy.
    #[default]
    Character,
    /// Board rig only. Requires a hierarchy and rejects weighted meshes.
    BoardOnly,
    /// Uses a hierarchy when one is available.
    General,
    /// No bones. Every mesh is bound to the default bone.
    NoRig,
}

impl ModelType {
    pub fn requires_hierarchy(self) -> bool {
        matches!(self, ModelType::Character | ModelType::BoardOnly)
    }

    pub fn allows_weighted_meshes(self) -> bool {
        !matches!(self, ModelType::BoardOnly | ModelType::NoRig)
    }

    /// Visibility node written for meshes without an explicit one.
    /// `None` means "use the mesh's rigid bone".
    pub fn default_visibility_node(self) -> Option<u32> {
        match self {
            ModelType::Character | ModelType::BoardOnly => Some(ALWAYS_VISIBLE_NODE),
            ModelType::General | ModelType::NoRig => None,
        }
    }
}

/// Node index the game treats as "always visible".
pub const ALWAYS_VISIBLE_NODE: u32 = 0x46;

/// Options for one export pass. Immutable once built.
#[derive(Builder, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportConfig {
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    format: ExportFormat,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    model_type: ModelType,
    #[builder(default = true)]
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    include_texture_list: bool,
    /// Model or raw bone file to borrow the hierarchy from. Relative paths
    /// are resolved against the output directory.
    #[builder(into)]
    bone_data_source: Option<PathBuf>,
    /// The bone source holds bare node records rather than a full model.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    bone_data_is_raw: bool,
    /// Matrix index for meshes when there is no hierarchy to bind against.
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    default_bone: u16,
    /// Name written into the file-name chunk.
    #[builder(into, default = "model.gno".to_string())]
    #[cfg_attr(feature = "serde", serde(default = "default_file_name"))]
    file_name: String,
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

#[cfg(feature = "serde")]
fn default_file_name() -> String {
    "model.gno".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig::builder().build()
    }
}

impl ExportConfig {
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn include_texture_list(&self) -> bool {
        self.include_texture_list
    }

    pub fn bone_data_source(&self) -> Option<&Path> {
        self.bone_data_source.as_deref()
    }

    pub fn bone_data_is_raw(&self) -> bool {
        self.bone_data_is_raw
    }

    pub fn default_bone(&self) -> u16 {
        self.default_bone
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Borrowed bone data is never used for rig-less models.
    pub fn uses_bone_source(&self) -> bool {
        self.bone_data_source.is_some() && self.model_type != ModelType::NoRig
    }

    /// Copy of this config with the bone source resolved against `dir`.
    pub fn with_bone_source_relative_to(&self, dir: &Path) -> ExportConfig {
        let mut config = self.clone();
        if let Some(source) = &self.bone_data_source {
            if source.is_relative() {
                config.bone_data_source = Some(dir.join(source));
            }
        }
        config
    }

    /// Copy of this config writing `name` into the file-name chunk.
    pub fn with_file_name(&self, name: impl Into<String>) -> ExportConfig {
        let mut config = self.clone();
        config.file_name = name.into();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.format(), ExportFormat::CharacterModel);
        assert_eq!(config.model_type(), ModelType::Character);
        assert!(config.include_texture_list());
        assert_eq!(config.file_name(), "model.gno");
        assert!(!config.uses_bone_source());
    }

    #[test]
    fn relative_bone_source_follows_output_dir() {
        let config = ExportConfig::builder()
            .bone_data_source("rig.gno")
            .build()
            .with_bone_source_relative_to(Path::new("/exports"));
        assert_eq!(
            config.bone_data_source(),
            Some(Path::new("/exports/rig.gno"))
        );
    }

    #[test]
    fn no_rig_ignores_bone_source() {
        let config = ExportConfig::builder()
            .model_type(ModelType::NoRig)
            .bone_data_source("rig.gno")
            .build();
        assert!(!config.uses_bone_source());
    }
}
