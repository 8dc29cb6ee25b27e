//! Rewrite a VGM file for YM2610B playback.
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use vgmforge::loader;
use vgmforge::transcode::{preprocess, PreprocessOptions};

#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = "Rewrite a VGM file's sound-chip log for YM2610B playback",
    long_about = None
)]
struct Cli {
    /// Source VGM/VGZ file to rewrite
    input: PathBuf,
    /// Where to write the rewritten VGM file
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let source = loader::read(&cli.input)?;
    let options = PreprocessOptions {
        rewrite_pcm: true,
        byteswap_pcm: false,
        ..Default::default()
    };
    let result = preprocess(&source, options)?;
    fs::write(&cli.output, result.vgm)?;

    Ok(())
}
