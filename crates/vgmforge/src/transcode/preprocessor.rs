//! The driver that walks a source command stream and rewrites it to target
//! a single YM2610B plus SSG appliance.
use crate::chip::{DataBlockPayload, Instance, VgmCommand};
use crate::error::TranscodeError;
use crate::meta::locate_gd3;
use crate::transcode::adpcm::{unsigned8_to_signed16, DeltaTEncoder};
use crate::transcode::dac_capture::Ym2612DacCapture;
use crate::transcode::inserter::{splice_adpcm_b_blocks, InsertBlock};
use crate::transcode::opn_pitch::OpnPitchRescaler;
use crate::transcode::pcm_bank::{PcmBlock, PcmBlockKind, PcmBlockManager};
use crate::transcode::psg_ssg::PsgSsgTranslator;
use crate::vgm::header::VGM_MAX_HEADER_SIZE;
use crate::vgm::{parse_vgm_header, VgmCommandStream};

/// The appliance's YM2610B master clock. NeoGeo arcade hardware runs its
/// YM2610 family at this rate; the playback device shares it.
pub const TARGET_YM2610B_CLOCK: u32 = 8_000_000;

#[derive(Debug, Clone, Copy)]
pub struct PreprocessOptions {
    /// Emit extracted PCM data blocks inline at the start of the command
    /// stream instead of expecting a side-channel ROM upload.
    pub rewrite_pcm: bool,
    /// Byte-swap every 4-byte group of the uploaded PCM images (0↔3, 1↔2) to
    /// compensate for the appliance's sample-ROM wiring.
    pub byteswap_pcm: bool,
    /// Export the captured YM2612 DAC timeline as a debug WAV file.
    pub write_wav: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            rewrite_pcm: false,
            byteswap_pcm: false,
            write_wav: false,
        }
    }
}

pub struct PreprocessOutput {
    pub vgm: Vec<u8>,
    pub pcm_a: Vec<u8>,
    pub pcm_b: Vec<u8>,
    pub dac_wav: Option<Vec<u8>>,
}

fn is_adpcm_a_bank_register(port: Instance, address: u8) -> bool {
    port == Instance::Secondary && ((0x18..=0x1d).contains(&address) || (0x28..=0x2d).contains(&address))
}

fn is_adpcm_b_bank_register(port: Instance, address: u8) -> bool {
    port == Instance::Primary && (address == 0x13 || address == 0x15)
}

fn opn_opcode(port: Instance) -> u8 {
    match port {
        Instance::Primary => 0x58,
        Instance::Secondary => 0x59,
    }
}

/// Rewrite `source` (a full VGM file image) for the appliance described in
/// `options`.
pub fn preprocess(source: &[u8], options: PreprocessOptions) -> Result<PreprocessOutput, TranscodeError> {
    let (header, data_start) = parse_vgm_header(source)?;

    let ym2612_ref_clock = header.ym2612_clock & 0x3fff_ffff;
    let sn76489_ref_clock = header.sn76489_clock & 0x3fff_ffff;

    let mut opn = OpnPitchRescaler::new(
        if ym2612_ref_clock == 0 { TARGET_YM2610B_CLOCK } else { ym2612_ref_clock },
        TARGET_YM2610B_CLOCK,
    );
    let mut psg = PsgSsgTranslator::new(
        if sn76489_ref_clock == 0 { TARGET_YM2610B_CLOCK } else { sn76489_ref_clock },
        TARGET_YM2610B_CLOCK,
    );
    let mut psg_primed = false;
    let mut dac = Ym2612DacCapture::new();
    let mut dac_used = false;

    let mut pcm = PcmBlockManager::new();
    let mut adpcm_a_positions = Vec::new();
    let mut adpcm_b_positions = Vec::new();

    let source_loop_index = if header.loop_offset == 0 {
        None
    } else {
        Some(0x1c_usize.wrapping_add(header.loop_offset as usize))
    };
    let mut adjusted_loop: Option<usize> = None;

    let mut out = Vec::new();

    let emit_opn_write = |out: &mut Vec<u8>, port: Instance, address: u16, data: u8, a_pos: &mut Vec<usize>, b_pos: &mut Vec<usize>| {
        let reg = (address & 0xff) as u8;
        out.push(opn_opcode(port));
        out.push(reg);
        let data_pos = out.len();
        out.push(data);
        if is_adpcm_a_bank_register(port, reg) {
            a_pos.push(data_pos);
        } else if is_adpcm_b_bank_register(port, reg) {
            b_pos.push(data_pos);
        }
    };

    let mut stream = VgmCommandStream::new(source, data_start);
    loop {
        let cmd_offset = stream.offset();
        if let Some(loop_index) = source_loop_index {
            if adjusted_loop.is_none() && cmd_offset == loop_index {
                adjusted_loop = Some(out.len());
            }
        }

        let Some(result) = stream.next() else { break };
        let (_, cmd) = result?;

        match cmd {
            VgmCommand::Ym2610Write(spec) => {
                emit_opn_write(&mut out, spec.port, spec.address as u16, spec.data, &mut adpcm_a_positions, &mut adpcm_b_positions);
            }
            VgmCommand::Ym2612Write(spec) => {
                if spec.address == 0x2a {
                    dac.set_output(spec.data);
                    dac_used = true;
                } else {
                    let folded_address = spec.address as u16 + spec.port.address_offset();
                    for write in opn.write(folded_address, spec.data) {
                        let port = if write.address >= 0x100 { Instance::Secondary } else { Instance::Primary };
                        emit_opn_write(&mut out, port, write.address, write.data, &mut adpcm_a_positions, &mut adpcm_b_positions);
                    }
                }
            }
            VgmCommand::PsgStereoWrite(_) => {}
            VgmCommand::PsgWrite(spec) => {
                if !psg_primed {
                    for write in PsgSsgTranslator::preamble() {
                        emit_opn_write(&mut out, Instance::Primary, write.register as u16, write.data, &mut adpcm_a_positions, &mut adpcm_b_positions);
                    }
                    psg_primed = true;
                }
                for write in psg.write(spec.data) {
                    emit_opn_write(&mut out, Instance::Primary, write.register as u16, write.data, &mut adpcm_a_positions, &mut adpcm_b_positions);
                }
            }
            VgmCommand::WaitShort(n) => {
                dac.delay(n as u32);
                out.push(0x70 | (n - 1));
            }
            VgmCommand::Wait(n) => {
                dac.delay(n as u32);
                out.push(0x61);
                out.extend_from_slice(&n.to_le_bytes());
            }
            VgmCommand::Wait735Samples => {
                dac.delay(735);
                out.push(0x62);
            }
            VgmCommand::Wait882Samples => {
                dac.delay(882);
                out.push(0x63);
            }
            VgmCommand::EndOfStream => {
                out.push(0x66);
                break;
            }
            VgmCommand::DacSampleWait(spec) => {
                dac.output_data_bank_sample();
                dac_used = true;
                if spec.delay > 0 {
                    out.push(0x70 | (spec.delay - 1));
                }
            }
            VgmCommand::DacBankSeek(address) => {
                dac.seek(address as usize);
            }
            VgmCommand::DataBlock(spec) => match spec.payload {
                DataBlockPayload::Pcm { total_rom_size, offset, data } => {
                    let kind = if spec.block_type == 0x82 { PcmBlockKind::AdpcmA } else { PcmBlockKind::AdpcmB };
                    pcm.push(PcmBlock {
                        original_offset: offset,
                        remapped_offset: offset,
                        total_rom_size,
                        kind,
                        data,
                    });
                }
                DataBlockPayload::Uncompressed { data } => {
                    dac.extend_data_bank(&data);
                }
            },
        }
    }

    if let Some(loop_index) = source_loop_index {
        if adjusted_loop.is_none() {
            return Err(TranscodeError::StateError(format!(
                "loop offset 0x{loop_index:X} was never reached while walking the command stream"
            )));
        }
        tracing::debug!(
            source_offset = loop_index,
            rewritten_offset = ?adjusted_loop,
            "loop point resolved"
        );
    }

    let non_unified = !pcm.is_empty() && pcm.inputs_overlap();

    if !dac_used {
        tracing::debug!("no YM2612 DAC activity captured; PCM blocks rebased without DAC splicing");
        pcm.preprocess(&adpcm_a_positions, &adpcm_b_positions, &mut out);
    } else {
        tracing::info!("YM2612 DAC activity captured; re-synthesizing as ADPCM-B playback");
        let existing_len: u32 = pcm
            .blocks()
            .iter()
            .filter(|b| b.kind == PcmBlockKind::AdpcmB)
            .map(|b| b.data.len() as u32)
            .sum();
        let mut next_offset = existing_len;
        let mut insert_blocks = Vec::new();

        for block in dac.partition_blocks() {
            let signed = unsigned8_to_signed16(&block.data);
            let mut encoder = DeltaTEncoder::new();
            let encoded = encoder.encode(&signed);
            let remapped_offset = next_offset;
            let length = encoded.len() as u32;
            next_offset += length;
            insert_blocks.push(InsertBlock {
                timestamp: block.timestamp,
                remapped_offset,
                length,
            });
            pcm.push(PcmBlock {
                original_offset: remapped_offset,
                remapped_offset,
                total_rom_size: next_offset,
                kind: PcmBlockKind::AdpcmB,
                data: encoded,
            });
        }

        splice_adpcm_b_blocks(&mut out, &insert_blocks, &mut adjusted_loop)?;
    }

    if options.rewrite_pcm && !pcm.is_empty() {
        let mut inline = Vec::new();
        for block in pcm.blocks() {
            let block_type: u8 = match block.kind {
                PcmBlockKind::AdpcmA => 0x82,
                PcmBlockKind::AdpcmB => 0x83,
            };
            inline.push(0x67);
            inline.push(0x66);
            inline.push(block_type);
            let size = block.data.len() as u32 + 8;
            inline.extend_from_slice(&size.to_le_bytes());
            inline.extend_from_slice(&block.total_rom_size.to_le_bytes());
            inline.extend_from_slice(&block.remapped_offset.to_le_bytes());
            inline.extend_from_slice(&block.data);
        }
        let inserted_len = inline.len();
        out.splice(0..0, inline);
        if let Some(loop_pos) = adjusted_loop.as_mut() {
            *loop_pos += inserted_len;
        }
    }

    let gd3_chunk = locate_gd3(source, header.gd3_offset)?;

    let mut out_header = header;
    out_header.version = 0x170;
    out_header.sn76489_clock = 0;
    out_header.ym2612_clock = 0;
    out_header.ym2610b_clock = TARGET_YM2610B_CLOCK | 0x8000_0000;
    out_header.ay_misc[6] = 0;
    out_header.ay_misc[7] = 0;
    out_header.loop_offset = match adjusted_loop {
        Some(pos) => (VGM_MAX_HEADER_SIZE as usize + pos - 0x1c) as u32,
        None => 0,
    };

    let gd3_offset_field = if gd3_chunk.is_some() {
        (VGM_MAX_HEADER_SIZE as usize + out.len()) - 0x14
    } else {
        0
    };

    let mut file = out_header.to_bytes(gd3_offset_field as u32, (VGM_MAX_HEADER_SIZE - 0x34) as u32);
    file.extend_from_slice(&out);
    if let Some(gd3) = gd3_chunk {
        file.extend_from_slice(gd3);
    }

    let eof_offset = file.len() as u32 - 0x04;
    file[0x04..0x08].copy_from_slice(&eof_offset.to_le_bytes());

    // DAC-derived ADPCM-B blocks are assigned linear offsets directly and never
    // carry the non-unified bank-separation constant, regardless of whether the
    // originally-extracted blocks overlapped.
    let rom_non_unified = non_unified && !dac_used;
    let (mut pcm_a, mut pcm_b) = pcm.rom_images(rom_non_unified);
    if options.byteswap_pcm {
        byteswap_4(&mut pcm_a);
        byteswap_4(&mut pcm_b);
    }

    let dac_wav = if options.write_wav {
        Some(render_wav(dac.timeline()))
    } else {
        None
    };

    Ok(PreprocessOutput {
        vgm: file,
        pcm_a,
        pcm_b,
        dac_wav,
    })
}

/// Swap bytes 0↔3 and 1↔2 within every aligned 4-byte group. An involution:
/// applying it twice restores the original bytes.
pub fn byteswap_4(data: &mut [u8]) {
    let chunks = data.len() / 4;
    for i in 0..chunks {
        let base = i * 4;
        data.swap(base, base + 3);
        data.swap(base + 1, base + 2);
    }
}

fn render_wav(samples: &[u8]) -> Vec<u8> {
    let data_len = samples.len() as u32;
    let mut wav = Vec::with_capacity(44 + samples.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&44_100u32.to_le_bytes());
    wav.extend_from_slice(&44_100u32.to_le_bytes()); // byte rate (1 byte/sample)
    wav.extend_from_slice(&1u16.to_le_bytes()); // block align
    wav.extend_from_slice(&8u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(samples);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header(loop_offset: u32, sn_clock: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 0x40];
        buf[0..4].copy_from_slice(b"Vgm ");
        buf[0x08..0x0c].copy_from_slice(&0x151u32.to_le_bytes());
        buf[0x0c..0x10].copy_from_slice(&sn_clock.to_le_bytes());
        buf[0x1c..0x20].copy_from_slice(&loop_offset.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&(0x40 - 0x34u32).to_le_bytes());
        buf
    }

    #[test]
    fn empty_stream_preserves_end_marker_and_rewrites_clocks() {
        let mut source = minimal_header(0, 0);
        source.push(0x66);
        let result = preprocess(&source, PreprocessOptions::default()).unwrap();
        assert_eq!(result.vgm[0x100], 0x66);
        assert_eq!(u32::from_le_bytes(result.vgm[0x08..0x0c].try_into().unwrap()), 0x170);
        let eof = u32::from_le_bytes(result.vgm[0x04..0x08].try_into().unwrap());
        assert_eq!(eof as usize, result.vgm.len() - 0x04);
        assert_eq!(u32::from_le_bytes(result.vgm[0x1c..0x20].try_into().unwrap()), 0);
    }

    #[test]
    fn fnum_write_at_double_clock_is_halved_end_to_end() {
        let mut source = minimal_header(0, 0);
        source[0x2c..0x30].copy_from_slice(&4_000_000u32.to_le_bytes());
        source.extend_from_slice(&[0x52, 0xa4, 0x0f]);
        source.extend_from_slice(&[0x52, 0xa0, 0xff]);
        source.push(0x66);

        let result = preprocess(&source, PreprocessOptions::default()).unwrap();
        let stream = &result.vgm[0x100..];
        assert_eq!(&stream[..7], &[0x58, 0xa4, 0x0b, 0x58, 0xa0, 0xff, 0x66]);
    }

    #[test]
    fn byteswap_is_an_involution() {
        let mut data: Vec<u8> = (0..64u8).collect();
        let original = data.clone();
        byteswap_4(&mut data);
        assert_ne!(data, original);
        byteswap_4(&mut data);
        assert_eq!(data, original);
    }
}
