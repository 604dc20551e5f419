//! Node (bone) records stored at the start of the object chunk.

use thiserror::Error;
use winnow::Parser;
use winnow::binary::{be_i16, be_i32, be_u32};
use winnow::combinator::repeat;

use crate::data::parser_utils::{WResult, be_vec3};

/// Size of one node record.
pub const NODE_RECORD_SIZE: usize = 0x80;

/// Node type bits telling the engine which parts of the transform are identity.
pub const NODE_TRANSLATION_ZERO: u32 = 0x1;
pub const NODE_ROTATION_ZERO: u32 = 0x2;
pub const NODE_SCALE_ONE: u32 = 0x4;

/// Index value meaning "no node".
pub const NO_NODE: i16 = -1;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node data length 0x{len:X} is not a multiple of 0x80")]
    UnalignedLength { len: usize },
    #[error("node data is empty")]
    Empty,
    #[error("node record parse error: {0}")]
    ParseError(String),
}

/// One 0x80-byte node record.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub type_flags: u32,
    pub matrix_index: i16,
    pub parent: i16,
    pub first_child: i16,
    pub next_sibling: i16,
    pub translation: [f32; 3],
    /// Euler rotation, 65536 units per full turn.
    pub rotation: [i32; 3],
    pub scale: [f32; 3],
    /// Inverse of the node's world matrix, top three rows.
    pub inverse_bind: [[f32; 4]; 3],
    pub center: [f32; 3],
    pub radius: f32,
    pub user: u32,
    pub reserved: [u32; 3],
}

impl Default for NodeRecord {
    fn default() -> Self {
        NodeRecord {
            type_flags: NODE_TRANSLATION_ZERO | NODE_ROTATION_ZERO | NODE_SCALE_ONE,
            matrix_index: NO_NODE,
            parent: NO_NODE,
            first_child: NO_NODE,
            next_sibling: NO_NODE,
            translation: [0.0; 3],
            rotation: [0; 3],
            scale: [1.0; 3],
            inverse_bind: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            center: [0.0; 3],
            radius: 0.0,
            user: 0,
            reserved: [0; 3],
        }
    }
}

impl NodeRecord {
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }

    /// Serialize into the on-disk layout.
    pub fn to_bytes(&self) -> [u8; NODE_RECORD_SIZE] {
        let mut out = [0u8; NODE_RECORD_SIZE];
        let mut words = Vec::with_capacity(NODE_RECORD_SIZE);
        words.extend_from_slice(&self.type_flags.to_be_bytes());
        for v in [
            self.matrix_index,
            self.parent,
            self.first_child,
            self.next_sibling,
        ] {
            words.extend_from_slice(&v.to_be_bytes());
        }
        for v in self.translation {
            words.extend_from_slice(&v.to_be_bytes());
        }
        for v in self.rotation {
            words.extend_from_slice(&v.to_be_bytes());
        }
        for v in self.scale {
            words.extend_from_slice(&v.to_be_bytes());
        }
        for v in self.inverse_bind.iter().flatten() {
            words.extend_from_slice(&v.to_be_bytes());
        }
        for v in self.center {
            words.extend_from_slice(&v.to_be_bytes());
        }
        words.extend_from_slice(&self.radius.to_be_bytes());
        words.extend_from_slice(&self.user.to_be_bytes());
        for v in self.reserved {
            words.extend_from_slice(&v.to_be_bytes());
        }
        out.copy_from_slice(&words);
        out
    }
}

fn be_row(input: &mut &[u8]) -> WResult<[f32; 4]> {
    let [x, y, z] = be_vec3.parse_next(input)?;
    let w = winnow::binary::be_f32.parse_next(input)?;
    Ok([x, y, z, w])
}

pub fn parse_node_record(input: &mut &[u8]) -> WResult<NodeRecord> {
    let type_flags = be_u32.parse_next(input)?;
    let matrix_index = be_i16.parse_next(input)?;
    let parent = be_i16.parse_next(input)?;
    let first_child = be_i16.parse_next(input)?;
    let next_sibling = be_i16.parse_next(input)?;
    let translation = be_vec3.parse_next(input)?;
    let rotation = [
        be_i32.parse_next(input)?,
        be_i32.parse_next(input)?,
        be_i32.parse_next(input)?,
    ];
    let scale = be_vec3.parse_next(input)?;
    let inverse_bind = [
        be_row.parse_next(input)?,
        be_row.parse_next(input)?,
        be_row.parse_next(input)?,
    ];
    let center = be_vec3.parse_next(input)?;
    let radius = winnow::binary::be_f32.parse_next(input)?;
    let user = be_u32.parse_next(input)?;
    let reserved = [
        be_u32.parse_next(input)?,
        be_u32.parse_next(input)?,
        be_u32.parse_next(input)?,
    ];
    Ok(NodeRecord {
        type_flags,
        matrix_index,
        parent,
        first_child,
        next_sibling,
        translation,
        rotation,
        scale,
        inverse_bind,
        center,
        radius,
        user,
        reserved,
    })
}

/// Parse a packed run of node records, such as a raw bone data file.
pub fn parse_node_records(data: &[u8]) -> Result<Vec<NodeRecord>, NodeError> {
    if data.is_empty() {
        return Err(NodeError::Empty);
    }
    if data.len() % NODE_RECORD_SIZE != 0 {
        return Err(NodeError::UnalignedLength { len: data.len() });
    }

    let count = data.len() / NODE_RECORD_SIZE;
    let input = &mut &data[..];
    repeat(count, parse_node_record)
        .parse_next(input)
        .map_err(|e: winnow::error::ErrMode<winnow::error::ContextError>| {
            NodeError::ParseError(format!("{e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeRecord {
        NodeRecord {
            type_flags: NODE_ROTATION_ZERO | NODE_SCALE_ONE,
            matrix_index: 1,
            parent: 0,
            first_child: NO_NODE,
            next_sibling: 2,
            translation: [0.0, 1.5, -2.0],
            inverse_bind: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, -1.5],
                [0.0, 0.0, 1.0, 2.0],
            ],
            user: 7,
            ..NodeRecord::default()
        }
    }

    #[test]
    fn record_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 6]);
        assert_eq!(&bytes[4..12], &[0, 1, 0, 0, 0xFF, 0xFF, 0, 2]);
        assert_eq!(&bytes[0x10..0x14], &1.5f32.to_be_bytes());
        assert_eq!(&bytes[0x70..0x74], &7u32.to_be_bytes());
    }

    #[test]
    fn parse_matches_serialized() {
        let mut data = sample().to_bytes().to_vec();
        data.extend_from_slice(&NodeRecord::default().to_bytes());
        let nodes = parse_node_records(&data).unwrap();
        assert_eq!(nodes, vec![sample(), NodeRecord::default()]);
        assert_eq!(nodes[0].to_bytes().as_slice(), &data[..NODE_RECORD_SIZE]);
    }

    #[test]
    fn rejects_partial_records() {
        assert!(matches!(
            parse_node_records(&[0u8; 0x81]),
            Err(NodeError::UnalignedLength { len: 0x81 })
        ));
        assert!(matches!(parse_node_records(&[]), Err(NodeError::Empty)));
    }
}
