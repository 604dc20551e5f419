//! Reader for GNO model files.
//!
//! Used to borrow the node hierarchy from an existing model and to inspect
//! exported files. Only the parts the exporter writes are decoded: the chunk
//! list, the texture list, the object descriptor, node records and mesh sets.

use thiserror::Error;
use winnow::Parser;
use winnow::binary::{be_u32, le_u32};
use winnow::token::take;

use crate::data::parser_utils::{
    ParseError, WResult, be_vec3, parse_at, read_null_terminated_string, slice_at,
};
use crate::models::node::{NODE_RECORD_SIZE, NodeRecord, parse_node_records};

pub const NGIF_MAGIC: [u8; 4] = *b"NGIF";
pub const NGTL_MAGIC: [u8; 4] = *b"NGTL";
pub const NGOB_MAGIC: [u8; 4] = *b"NGOB";
pub const NOF0_MAGIC: [u8; 4] = *b"NOF0";
pub const NFN0_MAGIC: [u8; 4] = *b"NFN0";
pub const NEND_MAGIC: [u8; 4] = *b"NEND";

/// Every offset inside the file is relative to the end of the NGIF chunk.
pub const DATA_BASE: usize = 0x20;

/// Size of one mesh-set descriptor.
const MESH_SET_SIZE: usize = 0x14;
/// Size of one texture list entry.
const TEXTURE_ENTRY_SIZE: usize = 0x14;

#[derive(Debug, Error)]
pub enum GnoReadError {
    #[error("not a GNO file (expected NGIF, found {found:?})")]
    NotGno { found: [u8; 4] },
    #[error("chunk {magic} at 0x{offset:X} declares 0x{size:X} bytes but only 0x{available:X} remain")]
    ChunkOverrun {
        magic: String,
        offset: usize,
        size: usize,
        available: usize,
    },
    #[error("missing {0} chunk")]
    MissingChunk(&'static str),
    #[error("chunk index {index} points at {found}, expected NGOB")]
    WrongObjectChunk { index: usize, found: String },
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("node records: {0}")]
    Nodes(#[from] crate::models::node::NodeError),
    #[error("texture name at 0x{offset:X} is not a terminated ASCII string")]
    BadTextureName { offset: usize },
    #[error("{what} count {count} at 0x{offset:X} runs past the end of the file")]
    CountTooLarge {
        what: &'static str,
        count: u32,
        offset: usize,
    },
}

/// A chunk header and its payload.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub magic: [u8; 4],
    /// File offset of the chunk header.
    pub offset: usize,
    pub payload: &'a [u8],
}

impl Chunk<'_> {
    pub fn magic_str(&self) -> String {
        String::from_utf8_lossy(&self.magic).into_owned()
    }

    /// Declared size, i.e. the length of everything after the 8-byte header.
    pub fn declared_size(&self) -> usize {
        self.payload.len()
    }
}

/// Fields of the NGIF chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoHeader {
    pub object_chunk_index: u32,
    pub data_start: u32,
    pub relocation_offset: u32,
    pub relocation_file_offset: u32,
    pub unknown: u32,
    pub version: u32,
}

fn parse_info_header(input: &mut &[u8]) -> WResult<InfoHeader> {
    Ok(InfoHeader {
        object_chunk_index: be_u32.parse_next(input)?,
        data_start: be_u32.parse_next(input)?,
        relocation_offset: be_u32.parse_next(input)?,
        relocation_file_offset: be_u32.parse_next(input)?,
        unknown: be_u32.parse_next(input)?,
        version: be_u32.parse_next(input)?,
    })
}

/// The object descriptor at the end of the NGOB chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub center: [f32; 3],
    pub radius: f32,
    pub material_count: u32,
    pub material_offset: u32,
    pub vertex_set_count: u32,
    pub vertex_set_offset: u32,
    pub primitive_count: u32,
    pub primitive_offset: u32,
    pub node_count: u32,
    pub node_offset: u32,
    pub matrix_palette_size: u32,
    pub mesh_set_count: u32,
    pub mesh_set_offset: u32,
}

fn parse_object_descriptor(input: &mut &[u8]) -> WResult<ObjectDescriptor> {
    let center = be_vec3.parse_next(input)?;
    let radius = winnow::binary::be_f32.parse_next(input)?;
    let material_count = be_u32.parse_next(input)?;
    let material_offset = be_u32.parse_next(input)?;
    let vertex_set_count = be_u32.parse_next(input)?;
    let vertex_set_offset = be_u32.parse_next(input)?;
    let primitive_count = be_u32.parse_next(input)?;
    let primitive_offset = be_u32.parse_next(input)?;
    let node_count = be_u32.parse_next(input)?;
    let _node_stride = be_u32.parse_next(input)?;
    let node_offset = be_u32.parse_next(input)?;
    let matrix_palette_size = be_u32.parse_next(input)?;
    let mesh_set_count = be_u32.parse_next(input)?;
    let mesh_set_offset = be_u32.parse_next(input)?;
    Ok(ObjectDescriptor {
        center,
        radius,
        material_count,
        material_offset,
        vertex_set_count,
        vertex_set_offset,
        primitive_count,
        primitive_offset,
        node_count,
        node_offset,
        matrix_palette_size,
        mesh_set_count,
        mesh_set_offset,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSet {
    pub flags: u32,
    pub mesh_count: u32,
    pub offset: u32,
}

fn parse_mesh_set(input: &mut &[u8]) -> WResult<MeshSet> {
    let flags = be_u32.parse_next(input)?;
    let mesh_count = be_u32.parse_next(input)?;
    let offset = be_u32.parse_next(input)?;
    let _reserved = take(8usize).parse_next(input)?;
    Ok(MeshSet {
        flags,
        mesh_count,
        offset,
    })
}

/// The object chunk and what it references.
#[derive(Debug, Clone)]
pub struct ObjectInfo<'a> {
    pub descriptor: ObjectDescriptor,
    /// Node records exactly as stored.
    pub node_data: &'a [u8],
    pub nodes: Vec<NodeRecord>,
    pub mesh_sets: Vec<MeshSet>,
}

impl ObjectInfo<'_> {
    pub fn mesh_count(&self) -> u32 {
        self.mesh_sets.iter().map(|s| s.mesh_count).sum()
    }
}

/// A parsed GNO file borrowing from its backing bytes.
#[derive(Debug, Clone)]
pub struct GnoFile<'a> {
    pub header: InfoHeader,
    pub chunks: Vec<Chunk<'a>>,
    pub textures: Vec<String>,
    pub object: ObjectInfo<'a>,
    /// Pointer field offsets listed in NOF0.
    pub relocations: Vec<u32>,
    pub file_name: Option<String>,
}

fn data_offset(offset: u32) -> usize {
    DATA_BASE + offset as usize
}

/// Length of `count` entries of `entry_size` bytes at `offset`, if they fit
/// inside `data`.
fn table_len(
    data: &[u8],
    what: &'static str,
    offset: usize,
    count: u32,
    entry_size: usize,
) -> Result<usize, GnoReadError> {
    (count as usize)
        .checked_mul(entry_size)
        .filter(|len| offset.checked_add(*len).is_some_and(|end| end <= data.len()))
        .ok_or(GnoReadError::CountTooLarge {
            what,
            count,
            offset,
        })
}

/// Walk chunk headers. With `last` set, stops after that chunk index.
fn walk_chunks(data: &[u8], last: Option<usize>) -> Result<Vec<Chunk<'_>>, GnoReadError> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let (magic, size) = parse_at(data, offset, |input: &mut &[u8]| -> WResult<_> {
            let magic: [u8; 4] = take(4usize)
                .parse_next(input)?
                .try_into()
                .unwrap_or_default();
            let size = le_u32.parse_next(input)?;
            Ok((magic, size as usize))
        })?;

        let available = data.len() - offset - 8;
        if size > available {
            return Err(GnoReadError::ChunkOverrun {
                magic: String::from_utf8_lossy(&magic).into_owned(),
                offset,
                size,
                available,
            });
        }

        chunks.push(Chunk {
            magic,
            offset,
            payload: &data[offset + 8..offset + 8 + size],
        });
        offset += 8 + size;

        if magic == NEND_MAGIC || last == Some(chunks.len() - 1) {
            break;
        }
    }
    Ok(chunks)
}

fn parse_textures(data: &[u8], chunk: &Chunk<'_>) -> Result<Vec<String>, GnoReadError> {
    let list_offset = parse_at(chunk.payload, 0, be_u32)?;
    let (count, first) = parse_at(data, data_offset(list_offset), (be_u32, be_u32))?;
    table_len(data, "texture", data_offset(first), count, TEXTURE_ENTRY_SIZE)?;

    let mut textures = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let entry = data_offset(first) + i * TEXTURE_ENTRY_SIZE;
        let name_offset = data_offset(parse_at(data, entry + 4, be_u32)?);
        let name = read_null_terminated_string(data, name_offset)
            .ok_or(GnoReadError::BadTextureName {
                offset: name_offset,
            })?;
        textures.push(name.to_string());
    }
    Ok(textures)
}

/// The object descriptor and the raw node records it points at.
fn parse_nodes<'a>(
    data: &'a [u8],
    chunk: &Chunk<'a>,
) -> Result<(ObjectDescriptor, &'a [u8]), GnoReadError> {
    let descriptor_offset = parse_at(chunk.payload, 0, be_u32)?;
    let descriptor = parse_at(data, data_offset(descriptor_offset), parse_object_descriptor)?;

    let node_offset = data_offset(descriptor.node_offset);
    let len = table_len(data, "node", node_offset, descriptor.node_count, NODE_RECORD_SIZE)?;
    let node_data = slice_at(data, node_offset, len)?;
    Ok((descriptor, node_data))
}

fn parse_object<'a>(data: &'a [u8], chunk: &Chunk<'a>) -> Result<ObjectInfo<'a>, GnoReadError> {
    let (descriptor, node_data) = parse_nodes(data, chunk)?;
    let nodes = if node_data.is_empty() {
        Vec::new()
    } else {
        parse_node_records(node_data)?
    };

    table_len(
        data,
        "mesh set",
        data_offset(descriptor.mesh_set_offset),
        descriptor.mesh_set_count,
        MESH_SET_SIZE,
    )?;
    let mut mesh_sets = Vec::with_capacity(descriptor.mesh_set_count as usize);
    for i in 0..descriptor.mesh_set_count as usize {
        let offset = data_offset(descriptor.mesh_set_offset) + i * MESH_SET_SIZE;
        mesh_sets.push(parse_at(data, offset, parse_mesh_set)?);
    }

    Ok(ObjectInfo {
        descriptor,
        node_data,
        nodes,
        mesh_sets,
    })
}

fn parse_relocations(chunk: &Chunk<'_>) -> Result<Vec<u32>, GnoReadError> {
    let count = parse_at(chunk.payload, 0, be_u32)?;
    table_len(chunk.payload, "relocation", 8, count, 4)?;
    let mut relocations = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        relocations.push(parse_at(chunk.payload, 8 + i * 4, be_u32)?);
    }
    Ok(relocations)
}

fn check_magic(data: &[u8]) -> Result<(), GnoReadError> {
    let magic = data.get(..4).unwrap_or_default();
    if magic != NGIF_MAGIC {
        let mut found = [0u8; 4];
        found[..magic.len()].copy_from_slice(magic);
        return Err(GnoReadError::NotGno { found });
    }
    Ok(())
}

fn info_header(chunks: &[Chunk<'_>]) -> Result<InfoHeader, GnoReadError> {
    let info = chunks.first().ok_or(GnoReadError::MissingChunk("NGIF"))?;
    Ok(parse_at(info.payload, 0, parse_info_header)?)
}

fn object_chunk<'c, 'a>(
    chunks: &'c [Chunk<'a>],
    header: &InfoHeader,
) -> Result<&'c Chunk<'a>, GnoReadError> {
    let index = header.object_chunk_index as usize;
    let chunk = chunks
        .get(index)
        .ok_or(GnoReadError::MissingChunk("NGOB"))?;
    if chunk.magic != NGOB_MAGIC {
        return Err(GnoReadError::WrongObjectChunk {
            index,
            found: chunk.magic_str(),
        });
    }
    Ok(chunk)
}

/// Node records of a model, byte for byte.
///
/// Only NGIF, the chunk headers up to the object chunk and the object
/// descriptor are read. Meshes, materials, textures and relocations are
/// never looked at.
pub fn read_node_data(data: &[u8]) -> Result<&[u8], GnoReadError> {
    check_magic(data)?;
    let info = walk_chunks(data, Some(0))?;
    let header = info_header(&info)?;
    let chunks = walk_chunks(data, Some(header.object_chunk_index as usize))?;
    let (_, node_data) = parse_nodes(data, object_chunk(&chunks, &header)?)?;
    Ok(node_data)
}

impl<'a> GnoFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<GnoFile<'a>, GnoReadError> {
        check_magic(data)?;

        let chunks = walk_chunks(data, None)?;
        let header = info_header(&chunks)?;
        let object = parse_object(data, object_chunk(&chunks, &header)?)?;

        let textures = match chunks.iter().find(|c| c.magic == NGTL_MAGIC) {
            Some(chunk) => parse_textures(data, chunk)?,
            None => Vec::new(),
        };

        let relocations = match chunks.iter().find(|c| c.magic == NOF0_MAGIC) {
            Some(chunk) => parse_relocations(chunk)?,
            None => Vec::new(),
        };

        let file_name = chunks
            .iter()
            .find(|c| c.magic == NFN0_MAGIC)
            .and_then(|c| read_null_terminated_string(c.payload, 8))
            .map(str::to_string);

        Ok(GnoFile {
            header,
            chunks,
            textures,
            object,
            relocations,
            file_name,
        })
    }

    pub fn chunk(&self, magic: [u8; 4]) -> Option<&Chunk<'a>> {
        self.chunks.iter().find(|c| c.magic == magic)
    }

    pub fn has_chunk(&self, magic: [u8; 4]) -> bool {
        self.chunk(magic).is_some()
    }
}
