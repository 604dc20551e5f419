//! Shared winnow-based parsing utilities used by the GNO reader and the node record parser.

use thiserror::Error;
use winnow::Parser;
use winnow::binary::be_f32;
use winnow::error::ContextError;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// Errors that can occur during shared parsing operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("read at 0x{offset:X} extends beyond data (need 0x{needed:X}, have 0x{available:X})")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("winnow parse error at 0x{offset:X}: {detail}")]
    WinnowError { offset: usize, detail: String },
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Parse three big-endian floats.
pub fn be_vec3(input: &mut &[u8]) -> WResult<[f32; 3]> {
    let x = be_f32.parse_next(input)?;
    let y = be_f32.parse_next(input)?;
    let z = be_f32.parse_next(input)?;
    Ok([x, y, z])
}

/// Slice `len` bytes of `data` starting at `offset`.
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let end = offset.checked_add(len).unwrap_or(usize::MAX);
    if end > data.len() {
        return Err(ParseError::OutOfBounds {
            offset,
            needed: end,
            available: data.len(),
        });
    }
    Ok(&data[offset..end])
}

/// Run `parser` on `data` starting at `offset`.
pub fn parse_at<'a, T>(
    data: &'a [u8],
    offset: usize,
    mut parser: impl Parser<&'a [u8], T, winnow::error::ErrMode<ContextError>>,
) -> Result<T, ParseError> {
    if offset > data.len() {
        return Err(ParseError::OutOfBounds {
            offset,
            needed: offset,
            available: data.len(),
        });
    }
    let input = &mut &data[offset..];
    parser.parse_next(input).map_err(|e| ParseError::WinnowError {
        offset,
        detail: format!("{e}"),
    })
}

/// Read a null-terminated ASCII string from `data` starting at `offset`.
pub fn read_null_terminated_string(data: &[u8], offset: usize) -> Option<&str> {
    let remaining = data.get(offset..)?;
    let end = remaining.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&remaining[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use winnow::binary::be_u32;

    #[test]
    fn align() {
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(0x44, 4), 0x44);
        assert_eq!(align_up(0x45, 4), 0x48);
    }

    #[test]
    fn strings_need_terminator() {
        let data = b"abc\0def";
        assert_eq!(read_null_terminated_string(data, 0), Some("abc"));
        assert_eq!(read_null_terminated_string(data, 4), None);
        assert_eq!(read_null_terminated_string(data, 40), None);
    }

    #[test]
    fn parse_at_reports_offset() {
        let data = [0u8, 0, 0, 1, 0xFF];
        assert_eq!(parse_at(&data, 0, be_u32), Ok(1));
        assert!(matches!(
            parse_at(&data, 3, be_u32),
            Err(ParseError::WinnowError { offset: 3, .. })
        ));
        assert!(matches!(
            slice_at(&data, 4, 2),
            Err(ParseError::OutOfBounds { needed: 6, .. })
        ));
    }
}
