//! USB transport to the YM2610B playback appliance, and the background
//! poller that keeps its VGM ring buffer fed once playback starts.
pub mod poller;
pub mod usb;

pub use poller::{start_polling, PollHandle};
pub use usb::{PcmKind, UsbDevice, PRODUCT_ID, VENDOR_ID};
