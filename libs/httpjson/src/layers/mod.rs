//! Tower layers that observe the raw exchange below decompression.

mod capture;
mod log;

pub use capture::{CaptureLayer, CaptureService, CapturedResponse, Record};
pub use log::{LogLayer, LogService};
