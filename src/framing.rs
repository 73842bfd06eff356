//! Byte-stream frame assembly.
//!
//! Serial reads arrive in arbitrary fragments: a frame may be split across
//! several reads, or several frames may land in one. The assembler buffers
//! whatever arrives and hands out exactly one fixed-length frame at a time,
//! keeping the remainder for the next call.

/// Accumulates raw serial bytes and extracts fixed-length frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from one underlying read.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take exactly `len` bytes as one frame, or `None` without consuming
    /// anything if fewer are buffered. A frame is never partially consumed.
    pub fn take_frame(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.buffer.len() < len {
            return None;
        }
        let frame: Vec<u8> = self.buffer.drain(..len).collect();
        Some(frame)
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all buffered bytes. Used when a session (re)starts so stale
    /// bytes from a previous mode cannot alias into a new frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_within_one_read() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[1, 2, 3, 4]);
        assert_eq!(asm.take_frame(4), Some(vec![1, 2, 3, 4]));
        assert!(asm.is_empty());
    }

    #[test]
    fn frame_split_across_reads() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[0, 1, 2]);
        assert_eq!(asm.take_frame(10), None);
        assert_eq!(asm.len(), 3, "insufficient data must consume nothing");
        asm.extend(&[3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(asm.take_frame(10), Some((0..10).collect()));
        assert_eq!(asm.len(), 0);
    }

    #[test]
    fn queued_frames_leave_remainder() {
        let mut asm = FrameAssembler::new();
        let bytes: Vec<u8> = (0..25).collect();
        asm.extend(&bytes);
        assert_eq!(asm.take_frame(10), Some((0..10).collect()));
        assert_eq!(asm.len(), 15);
        assert_eq!(asm.take_frame(10), Some((10..20).collect()));
        assert_eq!(asm.take_frame(10), None);
        assert_eq!(asm.len(), 5);
    }

    #[test]
    fn clear_discards_buffered_bytes() {
        let mut asm = FrameAssembler::new();
        asm.extend(&[1, 2, 3]);
        asm.clear();
        assert!(asm.is_empty());
        assert_eq!(asm.take_frame(1), None);
    }
}
