//! Status-endpoint poller.
//!
//! The appliance's VGM command buffer is a ring: once playback starts it
//! periodically reports, over the interrupt IN endpoint, that it needs the
//! next chunk of the command stream rebuffered. This runs that polling loop
//! on its own thread so the caller's main flow is free to just wait for a
//! stop signal.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rusb::UsbContext;

use super::usb::UsbDevice;
use crate::error::TranscodeError;

const BUFFERING_REQUEST_HEADER: u32 = 0x01;
const SEQUENCE_COUNTER_MASK: u32 = 0x00ff_ffff;

/// Handle to a running poller thread. Dropping this without calling
/// [`PollHandle::stop`] leaves the thread running in the background; the
/// thread itself checks [`UsbDevice`] liveness has no bearing on the
/// process exiting, so callers that care about clean shutdown should stop
/// it explicitly (e.g. from a SIGINT handler).
pub struct PollHandle {
    stop: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<TranscodeError>>>,
    join: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Whether the poller thread is still running. `false` after it has
    /// terminated, whether cleanly (via `stop`) or due to a device error.
    pub fn is_alive(&self) -> bool {
        self.join.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Take the error that ended the poller, if it terminated on one rather
    /// than a stop request.
    pub fn take_failure(&self) -> Option<TranscodeError> {
        self.failure.lock().unwrap().take()
    }

    /// Signal the poller to stop and join its thread.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Start polling `device`'s status endpoint for re-buffering requests,
/// serving them from `vgm` (the full, already-uploaded command stream).
pub fn start_polling<T>(device: Arc<UsbDevice<T>>, vgm: Arc<Vec<u8>>) -> PollHandle
where
    T: UsbContext + Send + Sync + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let failure = Arc::new(Mutex::new(None));

    let thread_stop = Arc::clone(&stop);
    let thread_failure = Arc::clone(&failure);
    let join = thread::spawn(move || poll_loop(device, vgm, thread_stop, thread_failure));

    PollHandle {
        stop,
        failure,
        join: Some(join),
    }
}

fn poll_loop<T: UsbContext>(
    device: Arc<UsbDevice<T>>,
    vgm: Arc<Vec<u8>>,
    stop: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<TranscodeError>>>,
) {
    let mut sequence_counter: u32 = 0;

    while !stop.load(Ordering::SeqCst) {
        let status = match device.read_status() {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("status poll failed: {e}");
                *failure.lock().unwrap() = Some(e);
                return;
            }
        };

        let Some(status) = status else {
            // Timeout: expected while the device has nothing to report.
            continue;
        };

        let header = u32::from_le_bytes(status[0..4].try_into().unwrap());
        if header & 0xff != BUFFERING_REQUEST_HEADER {
            tracing::warn!("ignoring status message with header {header:#x}");
            continue;
        }

        let received_counter = header >> 8;
        if received_counter != sequence_counter {
            tracing::warn!(
                "ignoring status message with nonsequential counter {received_counter} (expected {sequence_counter})"
            );
            continue;
        }
        sequence_counter = (sequence_counter + 1) & SEQUENCE_COUNTER_MASK;

        let target_offset = u32::from_le_bytes(status[4..8].try_into().unwrap());
        let vgm_offset = u32::from_le_bytes(status[8..12].try_into().unwrap()) as usize;
        let chunk_length = u32::from_le_bytes(status[12..16].try_into().unwrap()) as usize;

        let Some(chunk) = vgm.get(vgm_offset..vgm_offset + chunk_length) else {
            tracing::warn!(
                "status message referenced out-of-range VGM offset {vgm_offset:#x}+{chunk_length:#x}"
            );
            continue;
        };

        if let Err(e) = device.write_vgm_chunk(target_offset, chunk, false) {
            tracing::error!("re-buffering write failed: {e}");
            *failure.lock().unwrap() = Some(e);
            return;
        }
    }
}
