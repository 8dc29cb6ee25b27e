//! Command-stream types for the chips this pipeline understands.
pub mod command;

pub use command::*;
