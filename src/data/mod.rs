/// Reading borrowed bone data from another model or a raw bone dump
pub mod bone_source;
/// Shared parsing helpers
pub mod parser_utils;
