//! Rewrite a VGM file, upload it and its sample banks to the playback
//! appliance over USB, and keep its command buffer fed until interrupted.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rusb::Context;

use vgmforge::device::{start_polling, PcmKind, UsbDevice};
use vgmforge::loader;
use vgmforge::transcode::{preprocess, PreprocessOptions};

#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = "Upload a VGM file to the playback appliance and stream it over USB",
    long_about = None
)]
struct Cli {
    /// Source VGM/VGZ file to play
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let source = loader::read(&cli.input)?;
    let result = preprocess(&source, PreprocessOptions::default())?;

    let context = Context::new()?;
    let device = Arc::new(UsbDevice::open(context)?);

    if !result.pcm_a.is_empty() {
        device.write_pcm(PcmKind::AdpcmA, 0, &result.pcm_a)?;
    }
    if !result.pcm_b.is_empty() {
        device.write_pcm(PcmKind::AdpcmB, 0, &result.pcm_b)?;
    }

    let vgm = Arc::new(result.vgm);
    device.send_vgm(&vgm)?;

    let poller = start_polling(Arc::clone(&device), Arc::clone(&vgm));

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;

    while !interrupted.load(Ordering::SeqCst) {
        if !poller.is_alive() {
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    if let Some(failure) = poller.take_failure() {
        poller.stop();
        return Err(failure.into());
    }
    poller.stop();

    Ok(())
}
