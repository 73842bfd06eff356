//! One-shot command correlation.
//!
//! The link allows at most one outstanding command. The slot here is the
//! single-resolution result holder: armed when the request goes out, resolved
//! exactly once by the read path (reply or CRC failure), or expired by the
//! deadline. Only the I/O path resolves it, so no synchronization is needed.

use std::time::{Duration, Instant};

use crate::errors::{LinkError, Result};

/// How long a command may wait for its reply.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Single-resolution slot for the one in-flight command.
#[derive(Debug, Default)]
pub enum PendingCommand {
    #[default]
    Empty,
    Pending {
        expected: usize,
        deadline: Instant,
    },
    Resolved(Result<Vec<u8>>),
}

impl PendingCommand {
    /// Arm the slot for a reply of `expected` bytes with the standard
    /// deadline. Arming a non-empty slot is a caller error.
    pub fn arm(&mut self, expected: usize) -> Result<()> {
        if !matches!(self, PendingCommand::Empty) {
            return Err(LinkError::ModeConflict(
                "a command is already pending".into(),
            ));
        }
        *self = PendingCommand::Pending {
            expected,
            deadline: Instant::now() + COMMAND_TIMEOUT,
        };
        Ok(())
    }

    /// Expected reply length while pending.
    pub fn expected(&self) -> Option<usize> {
        match self {
            PendingCommand::Pending { expected, .. } => Some(*expected),
            _ => None,
        }
    }

    /// Whether the pending deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self, PendingCommand::Pending { deadline, .. } if now >= *deadline)
    }

    /// Resolve the pending command. A second resolution is ignored; the slot
    /// resolves exactly once.
    pub fn resolve(&mut self, result: Result<Vec<u8>>) {
        if matches!(self, PendingCommand::Pending { .. }) {
            *self = PendingCommand::Resolved(result);
        }
    }

    /// Take the resolution out, leaving the slot empty.
    pub fn take(&mut self) -> Option<Result<Vec<u8>>> {
        match std::mem::take(self) {
            PendingCommand::Resolved(result) => Some(result),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Drop any in-flight state, leaving the slot empty.
    pub fn reset(&mut self) {
        *self = PendingCommand::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_resolve_take() {
        let mut slot = PendingCommand::default();
        slot.arm(4).unwrap();
        assert_eq!(slot.expected(), Some(4));
        slot.resolve(Ok(vec![1, 2, 3, 4]));
        assert_eq!(slot.take().unwrap().unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(slot, PendingCommand::Empty));
    }

    #[test]
    fn double_arm_is_conflict() {
        let mut slot = PendingCommand::default();
        slot.arm(4).unwrap();
        assert!(matches!(slot.arm(8), Err(LinkError::ModeConflict(_))));
    }

    #[test]
    fn resolves_only_once() {
        let mut slot = PendingCommand::default();
        slot.arm(2).unwrap();
        slot.resolve(Ok(vec![0xAA, 0xBB]));
        slot.resolve(Err(LinkError::Crc));
        assert_eq!(slot.take().unwrap().unwrap(), vec![0xAA, 0xBB]);
    }

    #[test]
    fn resolve_on_empty_is_ignored() {
        let mut slot = PendingCommand::default();
        slot.resolve(Ok(vec![1]));
        assert!(slot.take().is_none());
    }

    #[test]
    fn deadline_expiry() {
        let mut slot = PendingCommand::default();
        slot.arm(2).unwrap();
        assert!(!slot.is_expired(Instant::now()));
        assert!(slot.is_expired(Instant::now() + COMMAND_TIMEOUT + Duration::from_millis(1)));
    }
}
