//! VGM header parsing and command-stream iteration.
use crate::binutil::{read_u16_le_at, read_u32_le_at, read_u8_at, ParseError};
use crate::chip::VgmCommand;
use crate::vgm::header::VgmHeader;

const MIN_HEADER_LEN: usize = 0x40;

fn field_u32(bytes: &[u8], off: usize) -> u32 {
    read_u32_le_at(bytes, off).unwrap_or(0)
}

fn field_u16(bytes: &[u8], off: usize) -> u16 {
    read_u16_le_at(bytes, off).unwrap_or(0)
}

fn field_u8(bytes: &[u8], off: usize) -> u8 {
    read_u8_at(bytes, off).unwrap_or(0)
}

fn field_slice<const N: usize>(bytes: &[u8], off: usize) -> [u8; N] {
    let mut out = [0u8; N];
    if bytes.len() >= off + N {
        out.copy_from_slice(&bytes[off..off + N]);
    }
    out
}

/// Parse a VGM header out of `bytes`, returning the header and the absolute
/// byte offset its command stream starts at.
pub fn parse_vgm_header(bytes: &[u8]) -> Result<(VgmHeader, usize), ParseError> {
    if bytes.len() < MIN_HEADER_LEN {
        return Err(ParseError::HeaderTooShort("VGM header".into()));
    }

    let ident = field_slice::<4>(bytes, 0x00);
    if &ident != b"Vgm " {
        return Err(ParseError::InvalidIdent(ident));
    }

    let version = field_u32(bytes, 0x08);
    let data_offset = field_u32(bytes, 0x34);

    let header = VgmHeader {
        ident,
        eof_offset: field_u32(bytes, 0x04),
        version,
        sn76489_clock: field_u32(bytes, 0x0c),
        ym2413_clock: field_u32(bytes, 0x10),
        gd3_offset: field_u32(bytes, 0x14),
        total_samples: field_u32(bytes, 0x18),
        loop_offset: field_u32(bytes, 0x1c),
        loop_samples: field_u32(bytes, 0x20),
        sample_rate: field_u32(bytes, 0x24),
        sn_fb: field_u16(bytes, 0x28),
        snw: field_u8(bytes, 0x2a),
        sf: field_u8(bytes, 0x2b),
        ym2612_clock: field_u32(bytes, 0x2c),
        ym2151_clock: field_u32(bytes, 0x30),
        data_offset,
        sega_pcm_clock: field_u32(bytes, 0x38),
        spcm_interface: field_u32(bytes, 0x3c),
        rf5c68_clock: field_u32(bytes, 0x40),
        ym2203_clock: field_u32(bytes, 0x44),
        ym2608_clock: field_u32(bytes, 0x48),
        ym2610b_clock: field_u32(bytes, 0x4c),
        ym3812_clock: field_u32(bytes, 0x50),
        ym3526_clock: field_u32(bytes, 0x54),
        y8950_clock: field_u32(bytes, 0x58),
        ymf262_clock: field_u32(bytes, 0x5c),
        ymf278b_clock: field_u32(bytes, 0x60),
        ymf271_clock: field_u32(bytes, 0x64),
        ymz280b_clock: field_u32(bytes, 0x68),
        rf5c164_clock: field_u32(bytes, 0x6c),
        pwm_clock: field_u32(bytes, 0x70),
        ay8910_clock: field_u32(bytes, 0x74),
        ay_misc: field_slice::<8>(bytes, 0x78),
        gb_dmg_clock: field_u32(bytes, 0x80),
        nes_apu_clock: field_u32(bytes, 0x84),
        multipcm_clock: field_u32(bytes, 0x88),
        upd7759_clock: field_u32(bytes, 0x8c),
        okim6258_clock: field_u32(bytes, 0x90),
        okim6258_flags: field_slice::<4>(bytes, 0x94),
        okim6295_clock: field_u32(bytes, 0x98),
        k051649_clock: field_u32(bytes, 0x9c),
        k054539_clock: field_u32(bytes, 0xa0),
        huc6280_clock: field_u32(bytes, 0xa4),
        c140_clock: field_u32(bytes, 0xa8),
        k053260_clock: field_u32(bytes, 0xac),
        pokey_clock: field_u32(bytes, 0xb0),
        qsound_clock: field_u32(bytes, 0xb4),
        scsp_clock: field_u32(bytes, 0xb8),
        extra_header_offset: field_u32(bytes, 0xbc),
        wonderswan_clock: field_u32(bytes, 0xc0),
        vsu_clock: field_u32(bytes, 0xc4),
        saa1099_clock: field_u32(bytes, 0xc8),
        es5503_clock: field_u32(bytes, 0xcc),
        es5506_clock: field_u32(bytes, 0xd0),
        es5506_channels: field_u16(bytes, 0xd4),
        es5506_cd: field_u8(bytes, 0xd6),
        es5506_reserved: field_u8(bytes, 0xd7),
        x1_010_clock: field_u32(bytes, 0xd8),
        c352_clock: field_u32(bytes, 0xdc),
        ga20_clock: field_u32(bytes, 0xe0),
        mikey_clock: field_u32(bytes, 0xe4),
        reserved_e8_ef: field_slice::<8>(bytes, 0xe8),
        reserved_f0_ff: field_slice::<16>(bytes, 0xf0),
    };

    let data_start = if data_offset == 0 {
        VgmHeader::fallback_header_size_for_version(version)
    } else {
        0x34usize.wrapping_add(data_offset as usize)
    };

    Ok((header, data_start))
}

/// Streams [`VgmCommand`]s out of a command-stream buffer starting at its
/// first opcode, yielding `None` once an end-of-stream command is consumed.
pub struct VgmCommandStream<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> VgmCommandStream<'a> {
    pub fn new(bytes: &'a [u8], start: usize) -> Self {
        VgmCommandStream {
            bytes,
            offset: start,
            done: false,
        }
    }

    /// The absolute byte offset of the command that will be parsed next.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for VgmCommandStream<'a> {
    type Item = Result<(usize, VgmCommand), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.bytes.len() {
            return None;
        }
        let start = self.offset;
        match VgmCommand::parse(self.bytes, start) {
            Ok((cmd, len)) => {
                self.offset += len;
                if matches!(cmd, VgmCommand::EndOfStream) {
                    self.done = true;
                }
                Some(Ok((start, cmd)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header() -> Vec<u8> {
        let mut buf = vec![0u8; 0x40];
        buf[0..4].copy_from_slice(b"Vgm ");
        buf[0x08..0x0c].copy_from_slice(&0x170u32.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&(0xc0 - 0x34u32).to_le_bytes());
        buf
    }

    #[test]
    fn parses_ident_and_version() {
        let buf = minimal_header();
        let (header, start) = parse_vgm_header(&buf).unwrap();
        assert_eq!(&header.ident, b"Vgm ");
        assert_eq!(header.version, 0x170);
        assert_eq!(start, 0xc0);
    }

    #[test]
    fn rejects_bad_ident() {
        let mut buf = minimal_header();
        buf[0] = b'X';
        let err = parse_vgm_header(&buf).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIdent(_)));
    }

    #[test]
    fn zero_data_offset_falls_back_to_version_size() {
        let mut buf = minimal_header();
        buf[0x34..0x38].copy_from_slice(&0u32.to_le_bytes());
        let (_, start) = parse_vgm_header(&buf).unwrap();
        assert_eq!(start, VgmHeader::fallback_header_size_for_version(0x170));
    }

    #[test]
    fn command_stream_stops_at_end_of_stream() {
        let bytes = [0x70, 0x66];
        let mut stream = VgmCommandStream::new(&bytes, 0);
        let (_, first) = stream.next().unwrap().unwrap();
        assert_eq!(first, VgmCommand::WaitShort(1));
        let (_, second) = stream.next().unwrap().unwrap();
        assert_eq!(second, VgmCommand::EndOfStream);
        assert!(stream.next().is_none());
    }
}
