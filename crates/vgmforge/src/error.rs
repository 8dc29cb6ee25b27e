//! Pipeline-level error type.
//!
//! [`binutil::ParseError`](crate::binutil::ParseError) covers byte-level
//! parsing failures; [`TranscodeError`] wraps those together with the
//! failure modes that only make sense once a whole file is being walked
//! end to end (a chip write with no clock registered for it, a loop point
//! that moves backwards, and so on).
use std::fmt;
use std::io;

use crate::binutil::ParseError;

/// Error surfaced by the transcoding pipeline and its external collaborators.
#[derive(Debug)]
pub enum TranscodeError {
    /// Malformed header fields, impossible offsets, or an empty input file.
    InvalidInput(String),

    /// An opcode or chip combination this pipeline does not implement.
    UnsupportedFeature(String),

    /// A precondition about the running state was violated: a chip write
    /// arrived with no corresponding clock in the header, DAC timestamps
    /// went backwards, or similar.
    StateError(String),

    /// Reading or writing a file failed.
    IoError(io::Error),

    /// The USB transport reported a failure.
    DeviceError(String),
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            TranscodeError::UnsupportedFeature(msg) => write!(f, "unsupported feature: {msg}"),
            TranscodeError::StateError(msg) => write!(f, "state error: {msg}"),
            TranscodeError::IoError(e) => write!(f, "io error: {e}"),
            TranscodeError::DeviceError(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for TranscodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscodeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TranscodeError {
    fn from(e: io::Error) -> Self {
        TranscodeError::IoError(e)
    }
}

impl From<ParseError> for TranscodeError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::UnknownOpcode { opcode, offset } => TranscodeError::UnsupportedFeature(
                format!("unknown opcode 0x{opcode:02X} at offset 0x{offset:X}"),
            ),
            ParseError::UnsupportedVersion(v) => {
                TranscodeError::UnsupportedFeature(format!("unsupported VGM version {v:#x}"))
            }
            other => TranscodeError::InvalidInput(other.to_string()),
        }
    }
}
