/// Vertex categories, attribute quantization and per-mesh packing
pub mod geometry;
/// GNO file reader
pub mod gno;
/// Material records
pub mod material;
/// Node (bone) records
pub mod node;
/// Triangle strip joiner
pub mod strip;
