/// Export options: format, model type, bone data source
pub mod config;
/// Shared parsing helpers and external bone data loading
pub mod data;
/// Error definitions
pub mod error;
/// The export pipeline and GNO encoder
pub mod export;
/// GNO record types, vertex/primitive packing and the GNO reader
pub mod models;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Bone hierarchy construction and skin weight resolution
pub mod rig;
/// Scene snapshot handed over by the host editor
pub mod scene;
/// Pre-export scene checks
pub mod validate;

pub use config::{ExportConfig, ExportFormat, ModelType};
pub use error::{ExportError, ExportResult};
pub use export::{EncodedModel, ExportReport, encode_scene, export_to_file};
pub use scene::SceneSnapshot;
