//! Serial link driver.
//!
//! `ScopeLink` owns the byte stream and arbitrates between the two exchange
//! modes: one-shot command/response, and continuous capture where the device
//! streams fixed-length sample frames until told to stop. One consumer task
//! drives `pump()`; control calls share the same `&mut` receiver, so at most
//! one control operation is ever in flight.
//!
//! Reads are bounded by a short poll timeout rather than blocking forever.
//! A timed-out read is the normal pause/stop path, not an error: buffered
//! bytes stay in the assembler and the next cycle resumes cleanly.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::buffer::RollingBuffer;
use crate::channel::{decode_sample_vector, nan_sample_vector, ChannelDescriptor};
use crate::command::{PendingCommand, COMMAND_TIMEOUT};
use crate::crc;
use crate::errors::{LinkError, Result};
use crate::framing::FrameAssembler;

/// Default serial baud rate for the device.
pub const BAUD_RATE: u32 = 115_200;

/// Poll timeout for one bounded read. This is the cooperative cancellation
/// granularity: pause/stop take effect within one poll interval.
const POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Upper bound on bytes pulled from the transport per read.
const READ_CHUNK: usize = 256;

// Request headers. Every request starts with the device address byte.
const DEVICE_ADDRESS: u8 = 0x01;
const REQ_CAPTURE_START: u8 = 0x17;
const REQ_CAPTURE_STOP: u8 = 0x18;

/// Trait for Read + Write + Send, allowing different transport backends.
pub trait Transport: Read + Write + Send {}
impl<T: Read + Write + Send> Transport for T {}

/// Who currently owns the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Nothing in flight; commands and capture starts are both accepted.
    Idle,
    /// A command went out; the next `expected` bytes are its reply.
    AwaitingReply { expected: usize },
    /// The device streams periodic frames of `frame_len` bytes.
    Capturing { frame_len: usize },
}

/// Receives one decoded sample vector per continuous frame.
pub type SampleObserver = Box<dyn FnMut(&[f64]) + Send>;

/// Driver for one device on one serial link.
pub struct ScopeLink {
    transport: Box<dyn Transport>,
    assembler: FrameAssembler,
    mode: LinkMode,
    pending: PendingCommand,
    channels: Vec<ChannelDescriptor>,
    buffers: Vec<RollingBuffer>,
    cycle_ms: u32,
    /// Set by `stop()`; the next `start` begins a fresh session and clears
    /// the buffers. `pause()` leaves it unset so capture resumes in place.
    session_ended: bool,
    observer: Option<SampleObserver>,
}

impl ScopeLink {
    /// Open the device on a serial port with the standard poll timeout.
    pub fn connect_serial(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(POLL_TIMEOUT)
            .open()?;
        debug!("opened serial port {path} at {baud_rate} baud");
        Ok(Self::from_transport(port))
    }

    /// Build a driver over an already-open byte stream. Used by tests and by
    /// callers that manage the port themselves; the transport's read timeout
    /// should be short so pause/stop stay responsive.
    pub fn from_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            assembler: FrameAssembler::new(),
            mode: LinkMode::Idle,
            pending: PendingCommand::default(),
            channels: Vec::new(),
            buffers: Vec::new(),
            cycle_ms: 0,
            session_ended: true,
            observer: None,
        }
    }

    /// Register the observer that receives each decoded sample vector.
    pub fn set_observer(&mut self, observer: SampleObserver) {
        self.observer = Some(observer);
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    /// Rolling buffer of channel `index`, in declaration order.
    pub fn buffer(&self, index: usize) -> Option<&RollingBuffer> {
        self.buffers.get(index)
    }

    pub fn buffers(&self) -> &[RollingBuffer] {
        &self.buffers
    }

    // ------------------------------------------------------------------------
    // Control operations
    // ------------------------------------------------------------------------

    /// Start continuous capture of `channels` at the device's `cycle_ms`
    /// sampling period.
    ///
    /// Rejected with `ModeConflict` unless the link is idle. Starting after
    /// `stop()` begins a new session and clears the buffers; starting after
    /// `pause()` with the same configuration resumes the existing ones.
    pub fn start(&mut self, channels: Vec<ChannelDescriptor>, cycle_ms: u32) -> Result<()> {
        match self.mode {
            LinkMode::Idle => {}
            LinkMode::AwaitingReply { .. } => {
                return Err(LinkError::ModeConflict(
                    "cannot start capture while a command reply is pending".into(),
                ))
            }
            LinkMode::Capturing { .. } => {
                return Err(LinkError::ModeConflict(
                    "capture is already running".into(),
                ))
            }
        }
        if channels.is_empty() {
            return Err(LinkError::Protocol("no channels declared".into()));
        }

        let request = encode_capture_start(&channels);
        self.transport.write_all(&request)?;
        self.transport.flush()?;

        // Stale bytes from before the start must not alias into a frame.
        self.assembler.clear();

        let fresh_session =
            self.session_ended || self.channels != channels || self.cycle_ms != cycle_ms;
        if fresh_session {
            self.buffers = channels
                .iter()
                .map(|_| RollingBuffer::new(cycle_ms))
                .collect();
        }

        let frame_len = capture_frame_len(&channels);
        debug!(
            "capture started: {} channels, frame_len={frame_len}, cycle={cycle_ms}ms, fresh={fresh_session}",
            channels.len()
        );
        self.channels = channels;
        self.cycle_ms = cycle_ms;
        self.session_ended = false;
        self.mode = LinkMode::Capturing { frame_len };
        Ok(())
    }

    /// Pause capture: the device stops streaming and the link returns to
    /// idle, but buffers and session stay intact for a later `start`.
    pub fn pause(&mut self) -> Result<()> {
        self.halt_streaming("pause")
    }

    /// Stop capture and end the session; the next `start` clears the buffers.
    pub fn stop(&mut self) -> Result<()> {
        self.halt_streaming("stop")?;
        self.session_ended = true;
        Ok(())
    }

    fn halt_streaming(&mut self, what: &str) -> Result<()> {
        match self.mode {
            LinkMode::AwaitingReply { .. } => {
                return Err(LinkError::ModeConflict(format!(
                    "cannot {what} while a command reply is pending"
                )))
            }
            LinkMode::Capturing { .. } => {
                self.transport.write_all(&CAPTURE_STOP_FRAME)?;
                self.transport.flush()?;
                debug!("capture {what}d");
            }
            // Already idle: halting again is not an error (the stop frame
            // was sent when streaming ended).
            LinkMode::Idle => {}
        }
        self.mode = LinkMode::Idle;
        Ok(())
    }

    /// One-shot command exchange: write `request`, wait up to one second for
    /// a reply of exactly `expected_reply` bytes ending in a CRC16 trailer.
    ///
    /// Returns the verified reply frame. Fails with `Crc` on a corrupt reply,
    /// `Timeout` when the deadline passes, and `ModeConflict` when capture is
    /// running. Every exit path leaves the link idle.
    pub fn issue_command(&mut self, request: &[u8], expected_reply: usize) -> Result<Vec<u8>> {
        if !matches!(self.mode, LinkMode::Idle) {
            return Err(LinkError::ModeConflict(
                "cannot issue a command while capturing".into(),
            ));
        }
        self.pending.arm(expected_reply)?;

        // Leftover bytes from a paused capture (e.g. a partial frame) must
        // not splice in front of the reply.
        self.assembler.clear();

        if let Err(e) = self
            .transport
            .write_all(request)
            .and_then(|()| self.transport.flush())
        {
            self.pending.reset();
            return Err(e.into());
        }
        self.mode = LinkMode::AwaitingReply {
            expected: expected_reply,
        };

        loop {
            if let Some(frame) = self.assembler.take_frame(expected_reply) {
                let result = if crc::verify(&frame) {
                    Ok(frame)
                } else {
                    warn!("command reply failed CRC check");
                    Err(LinkError::Crc)
                };
                self.pending.resolve(result);
            }
            if let Some(result) = self.pending.take() {
                self.mode = LinkMode::Idle;
                return result;
            }
            if self.pending.is_expired(Instant::now()) {
                self.pending.resolve(Err(LinkError::Timeout(format!(
                    "no reply within {COMMAND_TIMEOUT:?}"
                ))));
                continue;
            }
            if let Err(e) = self.fill_from_transport() {
                self.pending.reset();
                self.mode = LinkMode::Idle;
                return Err(e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Read loop
    // ------------------------------------------------------------------------

    /// One consumer step while capturing: perform one bounded read and, if a
    /// full frame is buffered, decode and emit it.
    ///
    /// Returns `Ok(Some(vector))` per completed frame, `Ok(None)` when more
    /// bytes are needed (or the link is idle) — that case consumes nothing
    /// and is the normal retry/cancellation path. A frame failing CRC still
    /// yields a vector, NaN-filled; a bad frame never breaks the stream.
    /// Transport failures halt capture with buffers preserved.
    pub fn pump(&mut self) -> Result<Option<Vec<f64>>> {
        let LinkMode::Capturing { frame_len } = self.mode else {
            return Ok(None);
        };

        if self.assembler.len() < frame_len {
            if let Err(e) = self.fill_from_transport() {
                self.mode = LinkMode::Idle;
                return Err(e);
            }
        }

        let Some(frame) = self.assembler.take_frame(frame_len) else {
            return Ok(None);
        };

        let vector = if crc::verify(&frame) {
            decode_sample_vector(&frame[..frame_len - 2], &self.channels)
        } else {
            warn!("capture frame failed CRC check, emitting NaN sample");
            nan_sample_vector(self.channels.len())
        };

        for (buffer, &value) in self.buffers.iter_mut().zip(&vector) {
            buffer.append(value);
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(&vector);
        }
        Ok(Some(vector))
    }

    /// One bounded read into the assembler. A timeout or interruption adds
    /// nothing and is not an error; real I/O failures propagate. A zero-byte
    /// read is end-of-stream, not a timeout (timeouts surface as
    /// `WouldBlock`/`TimedOut`), so the closed link surfaces as an error
    /// instead of an endless quiet poll.
    fn fill_from_transport(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.transport.read(&mut chunk) {
            Ok(0) => Err(LinkError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "byte stream closed",
            ))),
            Ok(n) => {
                self.assembler.extend(&chunk[..n]);
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Fixed stop/pause request: header plus its CRC16 trailer.
const CAPTURE_STOP_FRAME: [u8; 4] = [DEVICE_ADDRESS, REQ_CAPTURE_STOP, 0x00, 0x2A];

/// Capture-start request: header, then (address, byte size) per channel,
/// then the CRC16 trailer.
fn encode_capture_start(channels: &[ChannelDescriptor]) -> Vec<u8> {
    let mut request = Vec::with_capacity(4 + channels.len() * 5);
    request.push(DEVICE_ADDRESS);
    request.push(REQ_CAPTURE_START);
    for channel in channels {
        request.extend_from_slice(&channel.address.to_le_bytes());
        request.push(channel.byte_size() as u8);
    }
    crc::append(&mut request);
    request
}

/// Continuous frame length: packed channel bytes plus the CRC16 trailer.
fn capture_frame_len(channels: &[ChannelDescriptor]) -> usize {
    channels.iter().map(ChannelDescriptor::byte_size).sum::<usize>() + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ElementType;

    #[test]
    fn stop_frame_is_self_checksummed() {
        assert!(crc::verify(&CAPTURE_STOP_FRAME));
        assert_eq!(&CAPTURE_STOP_FRAME[..2], &[DEVICE_ADDRESS, REQ_CAPTURE_STOP]);
    }

    #[test]
    fn capture_start_layout() {
        let channels = vec![
            ChannelDescriptor::new("a", 0x0000_2010, ElementType::U16),
            ChannelDescriptor::new("b", 0x0000_3000, ElementType::F32),
        ];
        let request = encode_capture_start(&channels);
        assert_eq!(request[0], DEVICE_ADDRESS);
        assert_eq!(request[1], REQ_CAPTURE_START);
        // (addr: u32 LE, size: u8) per channel
        assert_eq!(&request[2..6], &[0x10, 0x20, 0x00, 0x00]);
        assert_eq!(request[6], 2);
        assert_eq!(&request[7..11], &[0x00, 0x30, 0x00, 0x00]);
        assert_eq!(request[11], 4);
        assert_eq!(request.len(), 2 + 2 * 5 + 2);
        assert!(crc::verify(&request));
    }

    #[test]
    fn frame_len_includes_trailer() {
        let channels = vec![
            ChannelDescriptor::new("a", 0, ElementType::U16),
            ChannelDescriptor::new("b", 0, ElementType::F32),
        ];
        assert_eq!(capture_frame_len(&channels), 2 + 4 + 2);
    }
}
