//! Serial oscilloscope link driver.
//!
//! This crate links a host application to an external device over a serial
//! byte stream using a small Modbus-flavored framed protocol: fixed-length
//! frames with a little-endian CRC16 trailer. It supports one-shot
//! command/response exchanges and continuous capture, where the device streams
//! periodic telemetry frames that are decoded into typed numeric channels and
//! appended to per-channel rolling buffers for live plotting.
//!
//! # Timing reconstruction
//!
//! Continuous frames carry no timestamps; the device samples at a fixed
//! period (the cycle, in milliseconds). Sample `i` of a session maps to
//! elapsed time `i * cycle / 1000` seconds, which is how the rolling buffers
//! derive their time axis.
//!
//! # Example
//! ```ignore
//! let mut link = ScopeLink::connect_serial("/dev/ttyUSB0", BAUD_RATE)?;
//! link.start(vec![
//!     ChannelDescriptor::new("current", 0x2000_0010, ElementType::I16),
//!     ChannelDescriptor::new("voltage", 0x2000_0014, ElementType::F32),
//! ], 10)?;
//! loop {
//!     if let Some(sample) = link.pump()? {
//!         println!("{sample:?}");
//!     }
//! }
//! ```

mod buffer;
mod channel;
mod command;
mod crc;
mod errors;
mod framing;
mod link;
pub mod logging;

pub use buffer::{AxisLimits, RenderPoints, RollingBuffer};
pub use channel::{
    decode_sample_vector, extract_bits, nan_sample_vector, read_value, ChannelDescriptor,
    ElementType,
};
pub use command::{PendingCommand, COMMAND_TIMEOUT};
pub use crc::{append as crc_append, calculate as crc_calculate, verify as crc_verify};
pub use errors::{LinkError, Result};
pub use framing::FrameAssembler;
pub use link::{LinkMode, SampleObserver, ScopeLink, Transport, BAUD_RATE};
