//! End-to-end coverage driving `transcode::preprocess` the way a caller
//! actually would: a full VGM byte image in, a rewritten image and sample
//! ROM images out.
use vgmforge::transcode::{preprocess, PreprocessOptions};

fn minimal_header(loop_offset: u32, sn_clock: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 0x40];
    buf[0..4].copy_from_slice(b"Vgm ");
    buf[0x08..0x0c].copy_from_slice(&0x151u32.to_le_bytes());
    buf[0x0c..0x10].copy_from_slice(&sn_clock.to_le_bytes());
    buf[0x1c..0x20].copy_from_slice(&loop_offset.to_le_bytes());
    buf[0x34..0x38].copy_from_slice(&(0x40 - 0x34u32).to_le_bytes());
    buf
}

fn pcm_a_block(offset: u32, data: &[u8]) -> Vec<u8> {
    let mut block = vec![0x67, 0x66, 0x82];
    block.extend_from_slice(&(data.len() as u32 + 8).to_le_bytes());
    block.extend_from_slice(&0x1000000u32.to_le_bytes());
    block.extend_from_slice(&offset.to_le_bytes());
    block.extend_from_slice(data);
    block
}

fn uncompressed_block(data: &[u8]) -> Vec<u8> {
    let mut block = vec![0x67, 0x66, 0x00];
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());
    block.extend_from_slice(data);
    block
}

/// PSG latch/data writes are translated into SSG tone writes scaled to the
/// target clock, preceded by the noise-disable preamble on first use.
#[test]
fn psg_latch_and_data_translate_to_ssg_tone_write() {
    let mut source = minimal_header(0, 3_579_545);
    source.extend_from_slice(&[0x50, 0x80]); // latch channel 0 tone, low nibble 0
    source.extend_from_slice(&[0x50, 0x0f]); // data write, high bits 0x0f
    source.push(0x66);

    let result = preprocess(&source, PreprocessOptions::default()).unwrap();
    let stream = &result.vgm[0x100..];

    let pitch_factor = ((8_000_000u64 << 32) / 3_579_545) / 2;
    let pitch = ((0x0fu64 << 4) * pitch_factor >> 32) as u16;

    assert_eq!(&stream[0..3], &[0x58, 0x07, 0xf8]); // preamble: noise disabled on all voices
    assert_eq!(&stream[3..6], &[0x58, 0x00, (pitch & 0xff) as u8]);
    assert_eq!(&stream[6..9], &[0x58, 0x01, (pitch >> 8) as u8]);
    assert_eq!(stream[9], 0x66);
}

/// Two non-contiguous ADPCM-A blocks in a unified address space are rebased
/// adjacent to each other and the recorded bank-select register is patched
/// to match.
#[test]
fn non_contiguous_adpcm_a_blocks_are_rebased_and_bank_register_remapped() {
    let first = vec![0xaau8; 0x8000];
    let second = vec![0xbbu8; 0x8000];

    let mut source = minimal_header(0, 0);
    source.extend_from_slice(&pcm_a_block(0x010000, &first));
    source.extend_from_slice(&pcm_a_block(0x030000, &second));
    source.extend_from_slice(&[0x59, 0x18, 0x03]); // secondary port, ADPCM-A bank select = 3
    source.push(0x66);

    let result = preprocess(&source, PreprocessOptions::default()).unwrap();
    let stream = &result.vgm[0x100..];
    assert_eq!(&stream[0..3], &[0x59, 0x18, 0x01]); // bank byte 3 -> remapped bank 1
    assert_eq!(stream[3], 0x66);

    assert_eq!(result.pcm_a.len(), 0x18000);
    assert!(result.pcm_a[0x0000..0x8000].iter().all(|&b| b == 0xaa));
    assert!(result.pcm_a[0x8000..0x10000].iter().all(|&b| b == 0));
    assert!(result.pcm_a[0x10000..0x18000].iter().all(|&b| b == 0xbb));
}

/// A single block that straddles a 1 MB bank boundary is pushed whole into
/// the next bank rather than being split across it.
#[test]
fn block_crossing_1mb_boundary_is_pushed_to_next_bank_end_to_end() {
    let data = vec![0xccu8; 0x100000];

    let mut source = minimal_header(0, 0);
    source.extend_from_slice(&pcm_a_block(0x080000, &data));
    source.push(0x66);

    let result = preprocess(&source, PreprocessOptions::default()).unwrap();

    assert_eq!(result.pcm_a.len(), 0x200000);
    assert!(result.pcm_a[0x000000..0x100000].iter().all(|&b| b == 0));
    assert!(result.pcm_a[0x100000..0x200000].iter().all(|&b| b == 0xcc));
}

/// A YM2612 DAC sample run bounded by leading silence is captured, encoded
/// to ADPCM-B, and its play sequence spliced into the command stream at the
/// sample position where the tone actually starts.
#[test]
fn ym2612_dac_run_is_encoded_and_spliced_at_its_timestamp() {
    let tone: Vec<u8> = (0..2048).map(|i| if i % 2 == 0 { 0x40 } else { 0xc0 }).collect();

    let mut source = minimal_header(0, 0);
    source.extend_from_slice(&[0x61]); // 2048 samples of leading silence
    source.extend_from_slice(&2048u16.to_le_bytes());
    source.extend_from_slice(&uncompressed_block(&tone));
    for _ in 0..2048 {
        source.push(0x80); // DAC-write-and-advance, zero extra delay
    }
    source.push(0x66);

    let result = preprocess(&source, PreprocessOptions::default()).unwrap();
    let stream = &result.vgm[0x100..];

    // The rewritten stream carries only the leading wait; all 2048 DAC
    // writes collapsed into the capture rather than emitting OPN commands.
    assert_eq!(&stream[0..3], &[0x61, 0x00, 0x08]);

    let pages = (result.pcm_b.len() as u32) >> 8;
    let end = pages.saturating_sub(1);
    let [end_lo, end_hi] = end.to_le_bytes();

    let play_sequence = &stream[3..3 + 33];
    assert_eq!(&play_sequence[0..3], &[0x58, 0x10, 0x01]);
    assert_eq!(&play_sequence[6..9], &[0x58, 0x12, 0x00]); // start bank = 0
    assert_eq!(&play_sequence[9..12], &[0x58, 0x13, 0x00]);
    assert_eq!(&play_sequence[12..15], &[0x58, 0x14, end_lo]);
    assert_eq!(&play_sequence[15..18], &[0x58, 0x15, end_hi]);

    assert_eq!(stream[3 + 33], 0x66);
    assert!(!result.pcm_b.is_empty());
}

/// GD3 metadata is carried through untouched and the trailing EOF offset is
/// recomputed to match the rewritten file's actual length.
#[test]
fn gd3_metadata_is_preserved_and_eof_offset_recomputed() {
    let mut source = minimal_header(0, 0);
    source.push(0x66);
    let gd3_offset = (source.len() - 0x14) as u32;
    source[0x14..0x18].copy_from_slice(&gd3_offset.to_le_bytes());
    source.extend_from_slice(b"Gd3 ");
    source.extend_from_slice(&0x0100u32.to_le_bytes()); // version
    let payload = vec![0u8; 0x40];
    source.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // data length
    source.extend_from_slice(&payload);

    let result = preprocess(&source, PreprocessOptions::default()).unwrap();

    let new_gd3_offset = u32::from_le_bytes(result.vgm[0x14..0x18].try_into().unwrap()) as usize;
    assert_eq!(&result.vgm[0x14 + new_gd3_offset..0x14 + new_gd3_offset + 4], b"Gd3 ");

    let eof = u32::from_le_bytes(result.vgm[0x04..0x08].try_into().unwrap());
    assert_eq!(eof as usize, result.vgm.len() - 0x04);
}
