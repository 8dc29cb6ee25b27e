//! Sound-chip translation and the driver that rewrites a full command stream.
pub mod adpcm;
pub mod dac_capture;
pub mod inserter;
pub mod opn_pitch;
pub mod pcm_bank;
pub mod preprocessor;
pub mod psg_ssg;

pub use adpcm::DeltaTEncoder;
pub use dac_capture::{DacSampleBlock, Ym2612DacCapture};
pub use opn_pitch::{OpnPitchRescaler, OpnWrite};
pub use pcm_bank::{PcmBlock, PcmBlockKind, PcmBlockManager};
pub use preprocessor::{preprocess, PreprocessOptions};
pub use psg_ssg::{PsgSsgTranslator, SsgWrite};
