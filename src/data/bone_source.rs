//! Borrowed bone data: node records read from another model or from a raw
//! bone dump.
//!
//! The source file is memory-mapped only for as long as it takes to copy the
//! records out, so it is closed again before the exporter writes its own
//! output (the two usually sit in the same directory).

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use rootcause::Report;
use thiserror::Error;
use tracing::debug;

use crate::models::gno::{GnoReadError, read_node_data};
use crate::models::node::{NodeRecord, parse_node_records};

#[derive(Debug, Error)]
pub enum BoneSourceError {
    #[error("bone data file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read bone data file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed bone data in {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Extract the node records of a full model, byte for byte.
pub fn extract_node_data(model: &[u8]) -> Result<Vec<u8>, GnoReadError> {
    Ok(read_node_data(model)?.to_vec())
}

/// Parse node records out of bone source bytes.
pub fn parse_bone_source(data: &[u8], raw: bool) -> Result<Vec<NodeRecord>, String> {
    if raw {
        return parse_node_records(data).map_err(|e| e.to_string());
    }

    let node_data = read_node_data(data).map_err(|e| e.to_string())?;
    if node_data.is_empty() {
        return Err("model has no node records".to_string());
    }
    parse_node_records(node_data).map_err(|e| e.to_string())
}

/// Read node records from `path`. `raw` selects a bare node dump instead of
/// a full model.
pub fn read_bone_source(path: &Path, raw: bool) -> Result<Vec<NodeRecord>, BoneSourceError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BoneSourceError::NotFound {
            path: path.to_owned(),
        },
        _ => BoneSourceError::Io {
            path: path.to_owned(),
            source: e,
        },
    })?;

    let len = file
        .metadata()
        .map_err(|e| BoneSourceError::Io {
            path: path.to_owned(),
            source: e,
        })?
        .len();
    if len == 0 {
        return Err(BoneSourceError::Malformed {
            path: path.to_owned(),
            reason: "file is empty".to_string(),
        });
    }

    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| BoneSourceError::Io {
        path: path.to_owned(),
        source: e,
    })?;

    let records = parse_bone_source(&mmap, raw).map_err(|reason| BoneSourceError::Malformed {
        path: path.to_owned(),
        reason,
    })?;

    drop(mmap);
    drop(file);

    debug!(path = %path.display(), raw, bones = records.len(), "loaded borrowed bone data");
    Ok(records)
}

/// [`read_bone_source`] for callers working with reports.
pub fn load_bone_source(path: &Path, raw: bool) -> Result<Vec<NodeRecord>, Report<BoneSourceError>> {
    read_bone_source(path, raw).map_err(Report::new)
}
