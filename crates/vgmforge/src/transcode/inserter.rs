//! Command Inserter: splices synthesized ADPCM-B "play" sequences into an
//! already-rewritten command stream at the timestamps their source DAC
//! blocks occupied, tracking cursor position by replaying delay opcodes.
use crate::error::TranscodeError;

/// Where to splice a sample's ADPCM-B play sequence, in ROM-byte terms
/// (`remapped_offset`/`length` as assigned by the PCM Block Manager).
#[derive(Debug, Clone, Copy)]
pub struct InsertBlock {
    pub timestamp: u32,
    pub remapped_offset: u32,
    pub length: u32,
}

const PITCH_44K1_LO: u8 = 0x6b;
const PITCH_44K1_HI: u8 = 0xcb;
const DEFAULT_VOLUME: u8 = 0x60;
const PAN_BOTH: u8 = 0xc0;

fn play_sequence(remapped_offset: u32, length: u32) -> Vec<u8> {
    let start = (remapped_offset >> 8) as u16;
    let pages = (length >> 8) as u16;
    let end = start + pages.saturating_sub(1);
    let [start_lo, start_hi] = start.to_le_bytes();
    let [end_lo, end_hi] = end.to_le_bytes();

    vec![
        0x58, 0x10, 0x01,
        0x58, 0x10, 0x00,
        0x58, 0x12, start_lo,
        0x58, 0x13, start_hi,
        0x58, 0x14, end_lo,
        0x58, 0x15, end_hi,
        0x58, 0x19, PITCH_44K1_LO,
        0x58, 0x1a, PITCH_44K1_HI,
        0x58, 0x1b, DEFAULT_VOLUME,
        0x58, 0x11, PAN_BOTH,
        0x58, 0x10, 0x80,
    ]
}

/// Advance `(pos, elapsed)` one opcode, returning the new position or `None`
/// once the buffer is exhausted or an end-of-stream marker is consumed.
fn step(out: &[u8], pos: usize, elapsed: &mut u32) -> Result<Option<usize>, TranscodeError> {
    let Some(&opcode) = out.get(pos) else {
        return Ok(None);
    };
    match opcode {
        0x58 | 0x59 => Ok(Some(pos + 3)),
        0x61 => {
            let n = u16::from_le_bytes([
                *out.get(pos + 1).ok_or_else(oob)?,
                *out.get(pos + 2).ok_or_else(oob)?,
            ]);
            *elapsed += n as u32;
            Ok(Some(pos + 3))
        }
        0x62 => {
            *elapsed += 735;
            Ok(Some(pos + 1))
        }
        0x63 => {
            *elapsed += 882;
            Ok(Some(pos + 1))
        }
        0x70..=0x7f => {
            *elapsed += ((opcode & 0x0f) + 1) as u32;
            Ok(Some(pos + 1))
        }
        0x66 => Ok(None),
        other => Err(TranscodeError::StateError(format!(
            "command inserter encountered an unexpected opcode 0x{other:02X} at offset 0x{pos:X}"
        ))),
    }
}

fn oob() -> TranscodeError {
    TranscodeError::StateError("command inserter ran past the end of the output buffer".into())
}

/// Splice every block's play sequence into `out` at the point its timestamp
/// is first reached, adjusting `loop_pos` (an already-computed splice-space
/// offset) for each insertion that lands before it. `blocks` must already be
/// ordered by non-decreasing timestamp.
pub fn splice_adpcm_b_blocks(
    out: &mut Vec<u8>,
    blocks: &[InsertBlock],
    loop_pos: &mut Option<usize>,
) -> Result<(), TranscodeError> {
    let mut pos = 0usize;
    let mut elapsed = 0u32;
    let mut last_timestamp: i64 = -1;

    for block in blocks {
        if (block.timestamp as i64) < last_timestamp {
            return Err(TranscodeError::StateError(format!(
                "DAC sample block timestamps went backwards: {} after {}",
                block.timestamp, last_timestamp
            )));
        }
        last_timestamp = block.timestamp as i64;

        while elapsed < block.timestamp {
            match step(out, pos, &mut elapsed)? {
                Some(next) => pos = next,
                None => break,
            }
        }

        let sequence = play_sequence(block.remapped_offset, block.length);
        let insert_at = pos;
        let inserted_len = sequence.len();
        out.splice(insert_at..insert_at, sequence);

        if let Some(existing) = loop_pos {
            if *existing >= insert_at {
                *existing += inserted_len;
            }
        }

        pos = insert_at + inserted_len;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_lands_at_exact_timestamp() {
        // 2048 samples of silence (one short-delay run), then end of stream.
        let mut out = vec![0x7f, 0x7f, 0x7f, 0x7f, 0x66]; // 4 * 16 = 64 samples, not quite 2048 but exercises walking
        let mut loop_pos = None;
        let blocks = [InsertBlock {
            timestamp: 64,
            remapped_offset: 0,
            length: 0x800,
        }];
        splice_adpcm_b_blocks(&mut out, &blocks, &mut loop_pos).unwrap();
        assert_eq!(&out[0..4], &[0x7f, 0x7f, 0x7f, 0x7f]);
        assert_eq!(&out[4..7], &[0x58, 0x10, 0x01]);
        assert_eq!(out.last(), Some(&0x66));
    }

    #[test]
    fn play_sequence_encodes_start_and_end_registers() {
        let seq = play_sequence(0x100, 0x800);
        assert_eq!(seq.len(), 33);
        assert_eq!(&seq[6..9], &[0x58, 0x12, 0x01]); // start = 0x100>>8 = 1
        assert_eq!(&seq[9..12], &[0x58, 0x13, 0x00]);
        assert_eq!(&seq[12..15], &[0x58, 0x14, 0x08]); // end = 1 + (0x800>>8) - 1 = 8
        assert_eq!(&seq[15..18], &[0x58, 0x15, 0x00]);
    }

    #[test]
    fn backwards_timestamp_is_rejected() {
        let mut out = vec![0x66];
        let mut loop_pos = None;
        let blocks = [
            InsertBlock { timestamp: 10, remapped_offset: 0, length: 0x200 },
            InsertBlock { timestamp: 5, remapped_offset: 0x200, length: 0x200 },
        ];
        let err = splice_adpcm_b_blocks(&mut out, &blocks, &mut loop_pos).unwrap_err();
        assert!(matches!(err, TranscodeError::StateError(_)));
    }

    #[test]
    fn loop_position_after_splice_point_shifts_forward() {
        let mut out = vec![0x7f, 0x66];
        let mut loop_pos = Some(1);
        let blocks = [InsertBlock {
            timestamp: 0,
            remapped_offset: 0,
            length: 0x200,
        }];
        splice_adpcm_b_blocks(&mut out, &blocks, &mut loop_pos).unwrap();
        assert_eq!(loop_pos, Some(1 + 33));
    }
}
