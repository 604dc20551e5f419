use std::fmt;

use itertools::Itertools;

use crate::rig::HierarchySource;
use crate::validate::Warning;

/// What an export produced. The texture order is the order the companion
/// texture archive has to be built in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExportReport {
    pub textures: Vec<String>,
    pub warnings: Vec<Warning>,
    pub mesh_count: usize,
    pub bone_count: usize,
    pub material_count: usize,
    pub hierarchy: HierarchySource,
    pub byte_len: usize,
}

impl ExportReport {
    /// Texture names one per line, as written by `--texture-list`.
    pub fn texture_list(&self) -> String {
        self.textures.iter().map(|t| format!("{t}\n")).collect()
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} meshes, {} materials, {} bones ({:?}), {} bytes",
            self.mesh_count, self.material_count, self.bone_count, self.hierarchy, self.byte_len
        )?;

        writeln!(f, "Texture order:")?;
        if self.textures.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            let lines = self
                .textures
                .iter()
                .enumerate()
                .map(|(i, t)| format!("  {i:>3}: {t}"))
                .join("\n");
            writeln!(f, "{lines}")?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_textures_in_order() {
        let report = ExportReport {
            textures: vec!["body.gvr".to_string(), "untitled.gvr".to_string()],
            warnings: vec![Warning::IgnoredBoneSource],
            mesh_count: 2,
            bone_count: 0,
            material_count: 1,
            hierarchy: HierarchySource::Empty,
            byte_len: 640,
        };
        let text = report.to_string();
        assert!(text.contains("    0: body.gvr\n    1: untitled.gvr\n"));
        assert!(text.contains("  - bone data source ignored"));
        assert_eq!(report.texture_list(), "body.gvr\nuntitled.gvr\n");
    }
}
