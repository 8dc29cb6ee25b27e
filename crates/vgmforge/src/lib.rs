//! vgmforge — rewrites VGM (Video Game Music) sound-chip register-write
//! logs so a YM2610B-based ADPCM/SSG playback appliance can play them.
//!
//! A source VGM file drives some combination of SN76489 (PSG), YM2612
//! (OPN2), and YM2610/YM2610B (OPNB) register writes, typically with
//! ADPCM-A/ADPCM-B sample data carried in side data blocks or streamed to
//! the YM2612's DAC. This crate walks that command stream and rewrites it
//! into one that drives a single YM2610B: PSG writes are translated to the
//! chip's SSG core, YM2612 writes are rescaled onto YM2610B's FM engine and
//! any DAC sample playback re-synthesized as ADPCM-B blocks, and PCM sample
//! data is repacked into a single addressable bank layout.
//!
//! ```text
//! loader::read           -> decompress/validate a source file
//! vgm::parse_vgm_header   -> read the VGM header
//! transcode::preprocess   -> rewrite the command stream for YM2610B
//! device                  -> stream the result to playback hardware over USB
//! ```
pub mod binutil;
pub mod chip;
pub mod device;
pub mod error;
pub mod loader;
pub mod meta;
pub mod transcode;
pub mod vgm;

pub use binutil::ParseError;
pub use error::TranscodeError;
