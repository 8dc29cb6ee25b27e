//! The closed set of commands this pipeline accepts from a source VGM
//! command stream. Anything outside this set is an unsupported opcode.
use crate::binutil::{read_u8_at, read_u16_le_at, read_u32_le_at, ParseError};

/// Which port/instance of a dual-port chip a write targets. YM2610(B) and
/// YM2612 both expose two OPN-style ports addressed by a pair of opcodes
/// (e.g. 0x58 vs 0x59); port 1 registers are conventionally offset by
/// 0x100 when folded into a single combined address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    Primary,
    Secondary,
}

impl Instance {
    pub fn address_offset(self) -> u16 {
        match self {
            Instance::Primary => 0x000,
            Instance::Secondary => 0x100,
        }
    }
}

/// A trait implemented by every command payload this pipeline knows how to
/// parse out of a raw opcode stream. `parse` is handed the full remaining
/// buffer, the offset the opcode itself was found at, and the opcode byte;
/// it returns the parsed spec plus the number of bytes the whole command
/// (opcode included) occupies in the source stream.
pub trait CommandSpec: Sized {
    fn parse(bytes: &[u8], offset: usize, opcode: u8) -> Result<(Self, usize), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpnWriteSpec {
    pub port: Instance,
    pub address: u8,
    pub data: u8,
}

impl CommandSpec for OpnWriteSpec {
    fn parse(bytes: &[u8], offset: usize, opcode: u8) -> Result<(Self, usize), ParseError> {
        let address = read_u8_at(bytes, offset + 1)?;
        let data = read_u8_at(bytes, offset + 2)?;
        let port = if opcode & 0x01 != 0 {
            Instance::Secondary
        } else {
            Instance::Primary
        };
        Ok((OpnWriteSpec { port, address, data }, 3))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsgWriteSpec {
    pub data: u8,
}

impl CommandSpec for PsgWriteSpec {
    fn parse(bytes: &[u8], offset: usize, _opcode: u8) -> Result<(Self, usize), ParseError> {
        let data = read_u8_at(bytes, offset + 1)?;
        Ok((PsgWriteSpec { data }, 2))
    }
}

/// SN76489 stereo-extension writes. The target hardware has no stereo
/// mixing stage for the SSG channels, so these are acknowledged and
/// dropped rather than translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsgStereoSpec {
    pub data: u8,
}

impl CommandSpec for PsgStereoSpec {
    fn parse(bytes: &[u8], offset: usize, _opcode: u8) -> Result<(Self, usize), ParseError> {
        let data = read_u8_at(bytes, offset + 1)?;
        Ok((PsgStereoSpec { data }, 2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacSampleSpec {
    /// 0..=15, the low nibble of opcodes 0x80..=0x8F.
    pub delay: u8,
}

impl CommandSpec for DacSampleSpec {
    fn parse(_bytes: &[u8], _offset: usize, opcode: u8) -> Result<(Self, usize), ParseError> {
        Ok((DacSampleSpec { delay: opcode & 0x0f }, 1))
    }
}

/// The payload of a data block (opcode 0x67). PCM blocks (types 0x82 and
/// 0x83, ADPCM-A and ADPCM-B respectively) carry sample-ROM placement
/// metadata; uncompressed blocks (type 0x00) are raw bytes destined for the
/// YM2612 DAC's source data bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataBlockPayload {
    Pcm {
        total_rom_size: u32,
        offset: u32,
        data: Vec<u8>,
    },
    Uncompressed {
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlockSpec {
    pub block_type: u8,
    pub payload: DataBlockPayload,
}

const PCM_BLOCK_HEADER_LEN: usize = 15; // 0x67 0x66 type size(4) total(4) offset(4)
const UNCOMPRESSED_BLOCK_HEADER_LEN: usize = 7; // 0x67 0x66 type size(4)

impl CommandSpec for DataBlockSpec {
    fn parse(bytes: &[u8], offset: usize, _opcode: u8) -> Result<(Self, usize), ParseError> {
        // 0x67 0x66 <type> <size:u32 LE> ...
        let marker = read_u8_at(bytes, offset + 1)?;
        if marker != 0x66 {
            return Err(ParseError::Other(format!(
                "malformed data block at 0x{offset:X}: expected 0x66 marker, found 0x{marker:02X}"
            )));
        }
        let block_type = read_u8_at(bytes, offset + 2)?;
        let block_size = read_u32_le_at(bytes, offset + 3)?;

        match block_type {
            0x82 | 0x83 => {
                let payload_len = (block_size as usize).saturating_sub(8);
                let total_rom_size = read_u32_le_at(bytes, offset + 7)?;
                let rom_offset = read_u32_le_at(bytes, offset + 11)?;
                let data = if payload_len == 0 {
                    Vec::new()
                } else {
                    bytes
                        .get(offset + 15..offset + 15 + payload_len)
                        .ok_or(ParseError::OffsetOutOfRange {
                            offset: offset + 15,
                            needed: payload_len,
                            available: bytes.len().saturating_sub(offset + 15),
                            context: Some("pcm data block".into()),
                        })?
                        .to_vec()
                };
                Ok((
                    DataBlockSpec {
                        block_type,
                        payload: DataBlockPayload::Pcm {
                            total_rom_size,
                            offset: rom_offset,
                            data,
                        },
                    },
                    PCM_BLOCK_HEADER_LEN + payload_len,
                ))
            }
            0x00 => {
                let payload_len = block_size as usize;
                let data = bytes
                    .get(offset + 7..offset + 7 + payload_len)
                    .ok_or(ParseError::OffsetOutOfRange {
                        offset: offset + 7,
                        needed: payload_len,
                        available: bytes.len().saturating_sub(offset + 7),
                        context: Some("uncompressed data block".into()),
                    })?
                    .to_vec();
                Ok((
                    DataBlockSpec {
                        block_type,
                        payload: DataBlockPayload::Uncompressed { data },
                    },
                    UNCOMPRESSED_BLOCK_HEADER_LEN + payload_len,
                ))
            }
            other => Err(ParseError::UnknownOpcode {
                opcode: other,
                offset: offset + 2,
            }),
        }
    }
}

/// One command parsed out of the source stream, in the closed set this
/// pipeline understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VgmCommand {
    Ym2610Write(OpnWriteSpec),
    Ym2612Write(OpnWriteSpec),
    PsgWrite(PsgWriteSpec),
    PsgStereoWrite(PsgStereoSpec),
    DacSampleWait(DacSampleSpec),
    Wait(u16),
    WaitShort(u8),
    Wait735Samples,
    Wait882Samples,
    EndOfStream,
    DataBlock(DataBlockSpec),
    DacBankSeek(u32),
}

impl VgmCommand {
    /// Parse a single command at `offset`, returning it and the number of
    /// bytes it consumed (including the opcode byte itself).
    pub fn parse(bytes: &[u8], offset: usize) -> Result<(Self, usize), ParseError> {
        let opcode = read_u8_at(bytes, offset)?;
        match opcode {
            0x58 | 0x59 => {
                let (spec, n) = OpnWriteSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::Ym2610Write(spec), n))
            }
            0x52 | 0x53 => {
                let (spec, n) = OpnWriteSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::Ym2612Write(spec), n))
            }
            0x50 => {
                let (spec, n) = PsgWriteSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::PsgWrite(spec), n))
            }
            0x4f => {
                let (spec, n) = PsgStereoSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::PsgStereoWrite(spec), n))
            }
            0x70..=0x7f => Ok((VgmCommand::WaitShort((opcode & 0x0f) + 1), 1)),
            0x61 => {
                let n = read_u16_le_at(bytes, offset + 1)?;
                Ok((VgmCommand::Wait(n), 3))
            }
            0x62 => Ok((VgmCommand::Wait735Samples, 1)),
            0x63 => Ok((VgmCommand::Wait882Samples, 1)),
            0x66 => Ok((VgmCommand::EndOfStream, 1)),
            0x80..=0x8f => {
                let (spec, n) = DacSampleSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::DacSampleWait(spec), n))
            }
            0xe0 => {
                let addr = read_u32_le_at(bytes, offset + 1)?;
                Ok((VgmCommand::DacBankSeek(addr), 5))
            }
            0x67 => {
                let (spec, n) = DataBlockSpec::parse(bytes, offset, opcode)?;
                Ok((VgmCommand::DataBlock(spec), n))
            }
            other => Err(ParseError::UnknownOpcode { opcode: other, offset }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ym2610_write_with_port_from_opcode() {
        let bytes = [0x59, 0x12, 0xab];
        let (cmd, n) = VgmCommand::parse(&bytes, 0).unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            cmd,
            VgmCommand::Ym2610Write(OpnWriteSpec {
                port: Instance::Secondary,
                address: 0x12,
                data: 0xab,
            })
        );
    }

    #[test]
    fn parses_short_delay_as_count_plus_one() {
        let bytes = [0x7f];
        let (cmd, n) = VgmCommand::parse(&bytes, 0).unwrap();
        assert_eq!(n, 1);
        assert_eq!(cmd, VgmCommand::WaitShort(16));
    }

    #[test]
    fn parses_pcm_data_block() {
        let mut bytes = vec![0x67, 0x66, 0x82];
        bytes.extend_from_slice(&(4u32 + 8).to_le_bytes());
        bytes.extend_from_slice(&0x1000000u32.to_le_bytes());
        bytes.extend_from_slice(&0x2000u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let (cmd, n) = VgmCommand::parse(&bytes, 0).unwrap();
        assert_eq!(n, bytes.len());
        match cmd {
            VgmCommand::DataBlock(spec) => {
                assert_eq!(spec.block_type, 0x82);
                match spec.payload {
                    DataBlockPayload::Pcm { offset, data, .. } => {
                        assert_eq!(offset, 0x2000);
                        assert_eq!(data, vec![1, 2, 3, 4]);
                    }
                    _ => panic!("expected PCM payload"),
                }
            }
            _ => panic!("expected data block"),
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let bytes = [0xff];
        let err = VgmCommand::parse(&bytes, 0).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOpcode { opcode: 0xff, .. }));
    }
}
