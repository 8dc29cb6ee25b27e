//! GD3 metadata: located and copied verbatim, never parsed.
//!
//! The GD3 chunk (track/game/author names, encoded UTF-16LE) carries no
//! information this pipeline acts on, so it is treated as an opaque trailer:
//! find its extent in the source file and append those bytes unchanged to
//! the rewritten output.
use crate::binutil::{read_slice, read_u32_le_at, ParseError};

/// Locate the GD3 chunk in `bytes` given the header's `gd3_offset` field
/// (relative to its own position at header byte 0x14, or 0 if absent).
/// Returns the raw chunk bytes — ident, version, length, and payload — with
/// no interpretation of their contents.
pub fn locate_gd3<'a>(bytes: &'a [u8], gd3_offset: u32) -> Result<Option<&'a [u8]>, ParseError> {
    if gd3_offset == 0 {
        return Ok(None);
    }

    let start = 0x14usize.wrapping_add(gd3_offset as usize);
    let ident = read_slice(bytes, start, 4)?;
    if ident != b"Gd3 " {
        let mut id = [0u8; 4];
        id.copy_from_slice(ident);
        return Err(ParseError::InvalidIdent(id));
    }

    let data_len = read_u32_le_at(bytes, start + 8)? as usize;
    let total_len = 12 + data_len;
    let chunk = read_slice(bytes, start, total_len)?;
    Ok(Some(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_gd3() -> Vec<u8> {
        let mut chunk = Vec::new();
        chunk.extend_from_slice(b"Gd3 ");
        chunk.extend_from_slice(&0x0100u32.to_le_bytes());
        let payload = vec![0u8; 22]; // 11 empty UTF-16LE strings
        chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        chunk.extend_from_slice(&payload);
        chunk
    }

    #[test]
    fn zero_offset_means_absent() {
        let bytes = vec![0u8; 0x20];
        assert_eq!(locate_gd3(&bytes, 0).unwrap(), None);
    }

    #[test]
    fn locates_and_returns_chunk_verbatim() {
        let mut bytes = vec![0u8; 0x14];
        let chunk = sample_gd3();
        bytes.extend_from_slice(&chunk);
        let found = locate_gd3(&bytes, 0).unwrap();
        assert_eq!(found, Some(chunk.as_slice()));
    }

    #[test]
    fn rejects_bad_ident() {
        let mut bytes = vec![0u8; 0x14];
        let mut chunk = sample_gd3();
        chunk[0] = b'X';
        bytes.extend_from_slice(&chunk);
        let err = locate_gd3(&bytes, 0).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIdent(_)));
    }
}
