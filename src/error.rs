use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::config::ExportFormat;
use crate::data::bone_source::BoneSourceError;
use crate::export::encoder::EncodeError;
use crate::rig::{HierarchyError, SkinError};
use crate::validate::Violation;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("scene failed validation:\n  {}", .0.iter().join("\n  "))]
    Validation(Vec<Violation>),
    #[error("skin resolution failed: {0}")]
    Skin(#[from] SkinError),
    #[error("bone hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),
    #[error("{0}")]
    BoneSource(#[from] BoneSourceError),
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("{0:?} export is not supported")]
    UnsupportedFormat(ExportFormat),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ExportError {
    /// Violations behind a validation failure, empty for other errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ExportError::Validation(v) => v,
            _ => &[],
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;
