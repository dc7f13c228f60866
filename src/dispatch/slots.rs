//! Counting semaphore backed by a bounded crossbeam channel
//!
//! Acquiring a slot pushes a token into a channel of capacity N; releasing
//! pops one. A full channel blocks the acquirer, so at most N slots are
//! held at any instant. Release happens in `SlotGuard::drop`, which also
//! runs when a task unwinds.

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// Fixed pool of dispatch slots
pub struct DispatchSlots {
    sender: Sender<()>,
    receiver: Receiver<()>,
    capacity: usize,
}

impl DispatchSlots {
    /// Create `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_use(&self) -> usize {
        self.receiver.len()
    }

    /// Take a slot if one is free
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        match self.sender.try_send(()) {
            Ok(()) => Some(self.guard()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => None,
        }
    }

    /// Wait up to `timeout` for a slot
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<SlotGuard> {
        match self.sender.send_timeout((), timeout) {
            Ok(()) => Some(self.guard()),
            Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => None,
        }
    }

    fn guard(&self) -> SlotGuard {
        SlotGuard {
            receiver: self.receiver.clone(),
        }
    }
}

/// A held slot, released on drop
pub struct SlotGuard {
    receiver: Receiver<()>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let _ = self.receiver.try_recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_enforced() {
        let slots = DispatchSlots::new(2);
        let a = slots.try_acquire().unwrap();
        let _b = slots.try_acquire().unwrap();
        assert_eq!(slots.in_use(), 2);
        assert!(slots.try_acquire().is_none());
        assert!(slots.acquire_timeout(Duration::from_millis(20)).is_none());

        drop(a);
        assert_eq!(slots.in_use(), 1);
        assert!(slots.try_acquire().is_some());
    }

    #[test]
    fn test_zero_capacity_means_one() {
        let slots = DispatchSlots::new(0);
        assert_eq!(slots.capacity(), 1);
        let _held = slots.try_acquire().unwrap();
        assert!(slots.try_acquire().is_none());
    }

    #[test]
    fn test_release_on_panic() {
        let slots = DispatchSlots::new(1);
        let guard = slots.try_acquire().unwrap();

        let result = std::thread::spawn(move || {
            let _guard = guard;
            panic!("signer blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let slots = DispatchSlots::new(1);
        let held = slots.try_acquire().unwrap();

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            drop(held);
        });

        assert!(slots.acquire_timeout(Duration::from_secs(5)).is_some());
        releaser.join().unwrap();
    }
}
