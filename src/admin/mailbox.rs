//! Single-slot announcement mailbox.
//!
//! At most one announcement exists at a time. A submission while the slot is
//! occupied is rejected with [`AlreadyPending`]; nothing is queued and nothing is
//! overwritten. The announcer takes the message out with [`Mailbox::lease`],
//! which keeps the slot logically occupied until the returned [`Lease`] is
//! dropped, so an operator cannot stack a second announcement behind a fan-out
//! that is still running.

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

/// Returned by [`Mailbox::submit`] when the message was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("an announcement is already pending")]
pub struct AlreadyPending;

#[derive(Debug, Default)]
struct Slot {
    pending: Option<String>,
    in_flight: bool,
}

#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        // Slot fields are plain values; a panic elsewhere cannot leave them half-written.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `message` if the slot is empty and no broadcast is in flight.
    pub fn submit(&self, message: impl Into<String>) -> Result<Ack, AlreadyPending> {
        let mut slot = self.slot();
        if slot.pending.is_some() || slot.in_flight {
            return Err(AlreadyPending);
        }
        slot.pending = Some(message.into());
        Ok(Ack)
    }

    /// Take the pending message, leaving the slot empty.
    pub fn drain_if_present(&self) -> Option<String> {
        self.slot().pending.take()
    }

    /// Take the pending message and hold the slot until the lease is dropped.
    pub fn lease(&self) -> Option<Lease<'_>> {
        let mut slot = self.slot();
        let message = slot.pending.take()?;
        slot.in_flight = true;
        Some(Lease {
            mailbox: self,
            message,
        })
    }

    /// True while a message waits in the slot or a lease is outstanding.
    pub fn is_pending(&self) -> bool {
        let slot = self.slot();
        slot.pending.is_some() || slot.in_flight
    }
}

/// A drained announcement whose broadcast is still in progress.
#[derive(Debug)]
pub struct Lease<'a> {
    mailbox: &'a Mailbox,
    message: String,
}

impl Lease<'_> {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.mailbox.slot().in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_drain() {
        let mb = Mailbox::new();
        assert_eq!(mb.submit("hello"), Ok(Ack));
        assert!(mb.is_pending());
        assert_eq!(mb.drain_if_present().as_deref(), Some("hello"));
        assert_eq!(mb.drain_if_present(), None);
        assert!(!mb.is_pending());
    }

    #[test]
    fn second_submit_is_rejected_without_overwrite() {
        let mb = Mailbox::new();
        mb.submit("first").unwrap();
        assert_eq!(mb.submit("second"), Err(AlreadyPending));
        assert_eq!(mb.drain_if_present().as_deref(), Some("first"));
    }

    #[test]
    fn drain_on_empty_is_a_no_op() {
        let mb = Mailbox::new();
        assert_eq!(mb.drain_if_present(), None);
        assert_eq!(mb.submit("later"), Ok(Ack));
        assert_eq!(mb.drain_if_present().as_deref(), Some("later"));
    }

    #[test]
    fn lease_blocks_submit_until_dropped() {
        let mb = Mailbox::new();
        mb.submit("hello").unwrap();
        let lease = mb.lease().expect("lease");
        assert_eq!(lease.message(), "hello");
        assert_eq!(mb.drain_if_present(), None);
        assert_eq!(mb.submit("world"), Err(AlreadyPending));
        drop(lease);
        assert!(!mb.is_pending());
        assert_eq!(mb.submit("world"), Ok(Ack));
    }

    #[test]
    fn lease_on_empty_is_none() {
        let mb = Mailbox::new();
        assert!(mb.lease().is_none());
        assert_eq!(mb.submit("x"), Ok(Ack));
    }
}
