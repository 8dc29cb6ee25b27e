//! USB transport to the playback appliance.
//!
//! The device enumerates as VID:PID 0x1D50:0x6147 with a single bulk OUT
//! endpoint (PCM/VGM payloads) and a single interrupt IN endpoint (buffering
//! status) on interface `(1, 0)`. A write is always a vendor control
//! transfer selecting which destination memory the bulk transfer that
//! follows is addressed to; [`UsbDevice`] serializes that pair (plus the
//! optional playback-start request) behind a transaction lock so a
//! re-buffering write from the status poller can never interleave with one
//! issued by the caller driving playback.
use std::sync::Mutex;
use std::time::Duration;

use rusb::{Direction, Recipient, RequestType, TransferType, UsbContext};

use crate::error::TranscodeError;

pub const VENDOR_ID: u16 = 0x1d50;
pub const PRODUCT_ID: u16 = 0x6147;

const INTERFACE_NUMBER: u8 = 1;
const INTERFACE_SETTING: u8 = 0;

const CTRL_SET_WRITE_MODE: u8 = 0x00;
const CTRL_START_PLAYBACK: u8 = 0x01;

const BULK_TIMEOUT: Duration = Duration::from_secs(20);
pub(crate) const STATUS_POLL_TIMEOUT: Duration = Duration::from_millis(250);
pub(crate) const STATUS_MESSAGE_LEN: usize = 16;

/// Which sample ROM (or the VGM command buffer) a bulk write is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmKind {
    AdpcmA,
    AdpcmB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    PcmA = 0x00,
    PcmB = 0x01,
    Vgm = 0x02,
}

fn device_error(context: &str, e: rusb::Error) -> TranscodeError {
    TranscodeError::DeviceError(format!("{context}: {e}"))
}

/// An open connection to the appliance with its data and status endpoints
/// already resolved.
pub struct UsbDevice<T: UsbContext> {
    handle: rusb::DeviceHandle<T>,
    bulk_out: u8,
    interrupt_in: u8,
    // Guards the SET_WRITE_MODE / bulk-write / (optional) START_PLAYBACK
    // triple so it lands on the wire as one atomic sequence even when both
    // the main upload flow and the status poller share this handle.
    transaction: Mutex<()>,
}

impl<T: UsbContext> UsbDevice<T> {
    /// Locate the appliance on `context`, claim its interface, and resolve
    /// the bulk OUT / interrupt IN endpoints it advertises.
    pub fn open(context: T) -> Result<Self, TranscodeError> {
        let devices = context
            .devices()
            .map_err(|e| device_error("enumerating USB devices", e))?;

        let device = devices
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .map(|desc| desc.vendor_id() == VENDOR_ID && desc.product_id() == PRODUCT_ID)
                    .unwrap_or(false)
            })
            .ok_or_else(|| TranscodeError::DeviceError("playback appliance not found".into()))?;

        let handle = device
            .open()
            .map_err(|e| device_error("opening device", e))?;
        handle
            .set_active_configuration(1)
            .map_err(|e| device_error("setting configuration", e))?;
        handle
            .claim_interface(INTERFACE_NUMBER)
            .map_err(|e| device_error("claiming interface", e))?;

        let config = device
            .active_config_descriptor()
            .map_err(|e| device_error("reading configuration descriptor", e))?;
        let interface = config
            .interfaces()
            .find(|i| i.number() == INTERFACE_NUMBER)
            .and_then(|i| i.descriptors().find(|d| d.setting_number() == INTERFACE_SETTING))
            .ok_or_else(|| {
                TranscodeError::DeviceError(format!(
                    "interface ({INTERFACE_NUMBER}, {INTERFACE_SETTING}) not found"
                ))
            })?;

        let mut bulk_out = None;
        let mut interrupt_in = None;
        for endpoint in interface.endpoint_descriptors() {
            match (endpoint.direction(), endpoint.transfer_type()) {
                (Direction::Out, TransferType::Bulk) => bulk_out = Some(endpoint.address()),
                (Direction::In, TransferType::Interrupt) => interrupt_in = Some(endpoint.address()),
                _ => {}
            }
        }

        let bulk_out = bulk_out
            .ok_or_else(|| TranscodeError::DeviceError("bulk OUT endpoint not found".into()))?;
        let interrupt_in = interrupt_in
            .ok_or_else(|| TranscodeError::DeviceError("interrupt IN endpoint not found".into()))?;

        tracing::info!(bulk_out, interrupt_in, "playback appliance enumerated and claimed");

        Ok(UsbDevice {
            handle,
            bulk_out,
            interrupt_in,
            transaction: Mutex::new(()),
        })
    }

    fn set_write_mode(&self, mode: WriteMode, offset: u32, length: u32) -> Result<(), TranscodeError> {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&length.to_le_bytes());

        let request_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Interface);
        self.handle
            .write_control(request_type, CTRL_SET_WRITE_MODE, mode as u16, 0, &payload, BULK_TIMEOUT)
            .map_err(|e| device_error("SET_WRITE_MODE", e))?;
        Ok(())
    }

    fn start_playback(&self) -> Result<(), TranscodeError> {
        let request_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Interface);
        self.handle
            .write_control(request_type, CTRL_START_PLAYBACK, 0, 0, &[], BULK_TIMEOUT)
            .map_err(|e| device_error("START_PLAYBACK", e))?;
        Ok(())
    }

    fn bulk_write(&self, data: &[u8]) -> Result<(), TranscodeError> {
        self.handle
            .write_bulk(self.bulk_out, data, BULK_TIMEOUT)
            .map_err(|e| device_error("bulk write", e))?;
        Ok(())
    }

    /// Upload one ADPCM sample bank at `offset` into the device's ROM image.
    pub fn write_pcm(&self, kind: PcmKind, offset: u32, data: &[u8]) -> Result<(), TranscodeError> {
        let mode = match kind {
            PcmKind::AdpcmA => WriteMode::PcmA,
            PcmKind::AdpcmB => WriteMode::PcmB,
        };
        let _guard = self.transaction.lock().unwrap();
        self.set_write_mode(mode, offset, data.len() as u32)?;
        self.bulk_write(data)
    }

    /// Upload a VGM command stream chunk at `offset`, optionally kicking off
    /// playback once the write lands. Used both for the initial full upload
    /// and for re-buffering chunks requested by the status poller.
    pub fn write_vgm_chunk(&self, offset: u32, data: &[u8], start_playback: bool) -> Result<(), TranscodeError> {
        let _guard = self.transaction.lock().unwrap();
        self.set_write_mode(WriteMode::Vgm, offset, data.len() as u32)?;
        self.bulk_write(data)?;
        if start_playback {
            self.start_playback()?;
        }
        Ok(())
    }

    /// Upload the full VGM command stream and start playback.
    pub fn send_vgm(&self, data: &[u8]) -> Result<(), TranscodeError> {
        self.write_vgm_chunk(0, data, true)
    }

    /// Poll the interrupt status endpoint once. A read timeout is an
    /// expected idle condition and is reported as `Ok(None)`, not an error.
    pub(crate) fn read_status(&self) -> Result<Option<[u8; STATUS_MESSAGE_LEN]>, TranscodeError> {
        let mut buf = [0u8; STATUS_MESSAGE_LEN];
        match self
            .handle
            .read_interrupt(self.interrupt_in, &mut buf, STATUS_POLL_TIMEOUT)
        {
            Ok(n) if n == STATUS_MESSAGE_LEN => Ok(Some(buf)),
            Ok(_) => Ok(None),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(device_error("status read", e)),
        }
    }
}
