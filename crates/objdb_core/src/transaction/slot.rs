//! The process-wide writer slot.

use crate::error::{CoreError, CoreResult};
use crate::types::HandleId;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Grants exclusive write access to one handle at a time.
///
/// The slot is owned by a handle rather than a guard so that the write
/// transaction can outlive the call that opened it.
#[derive(Debug, Default)]
pub(crate) struct WriterSlot {
    owner: Mutex<Option<HandleId>>,
    released: Condvar,
}

impl WriterSlot {
    /// Blocks until the slot is free, then takes it for `handle`.
    ///
    /// With a timeout, gives up with a transaction error once it elapses.
    pub(crate) fn acquire(&self, handle: HandleId, timeout: Option<Duration>) -> CoreResult<()> {
        let mut owner = self.owner.lock();
        if *owner == Some(handle) {
            return Err(CoreError::transaction(format!(
                "{handle} already holds the writer slot"
            )));
        }

        match timeout {
            None => {
                while owner.is_some() {
                    self.released.wait(&mut owner);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while owner.is_some() {
                    let waited = self.released.wait_until(&mut owner, deadline);
                    if waited.timed_out() && owner.is_some() {
                        return Err(CoreError::transaction(format!(
                            "timed out after {timeout:?} waiting for the writer slot"
                        )));
                    }
                }
            }
        }

        *owner = Some(handle);
        Ok(())
    }

    /// Frees the slot if `handle` holds it and wakes one waiter.
    pub(crate) fn release(&self, handle: HandleId) {
        let mut owner = self.owner.lock();
        if *owner == Some(handle) {
            *owner = None;
            drop(owner);
            self.released.notify_one();
        }
    }

    pub(crate) fn holder(&self) -> Option<HandleId> {
        *self.owner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_and_release() {
        let slot = WriterSlot::default();
        slot.acquire(HandleId(1), None).unwrap();
        assert_eq!(slot.holder(), Some(HandleId(1)));

        slot.release(HandleId(2));
        assert_eq!(slot.holder(), Some(HandleId(1)));

        slot.release(HandleId(1));
        assert_eq!(slot.holder(), None);
    }

    #[test]
    fn reacquire_by_holder_is_rejected() {
        let slot = WriterSlot::default();
        slot.acquire(HandleId(1), None).unwrap();
        let err = slot.acquire(HandleId(1), None).unwrap_err();
        assert!(err.is_transaction());
    }

    #[test]
    fn timeout_expires_while_held() {
        let slot = WriterSlot::default();
        slot.acquire(HandleId(1), None).unwrap();

        let err = slot
            .acquire(HandleId(2), Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(err.is_transaction());
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let slot = Arc::new(WriterSlot::default());
        slot.acquire(HandleId(1), None).unwrap();

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.acquire(HandleId(2), None))
        };

        thread::sleep(Duration::from_millis(20));
        slot.release(HandleId(1));

        waiter.join().unwrap().unwrap();
        assert_eq!(slot.holder(), Some(HandleId(2)));
    }
}
