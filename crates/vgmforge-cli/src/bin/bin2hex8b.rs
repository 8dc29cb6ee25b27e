//! Pad a binary file with 0xA0000 lines of "00" and emit the remainder as
//! one hex byte per line, for use as a ROM image source in appliance
//! firmware builds.
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

const PADDING_LINES: usize = 0xa0000;

#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = "Pad a binary file and emit it as one hex byte per line",
    long_about = None
)]
struct Cli {
    /// Binary file to convert
    input: PathBuf,
    /// Where to write the hex listing
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data = fs::read(&cli.input)?;
    let output = fs::File::create(&cli.output)?;
    let mut writer = BufWriter::new(output);

    for _ in 0..PADDING_LINES {
        writer.write_all(b"00\n")?;
    }
    for byte in data {
        writeln!(writer, "{byte:02x}")?;
    }

    writer.flush()?;
    Ok(())
}
