//! Bounded transfer-slot admission for the sync tools
//!
//! A transfer slot must be held for the whole duration of a remote copy
//! operation. The slot count caps how many copies are in flight at once;
//! acquisition parks the task until a slot frees up, so submission of new
//! work resumes as soon as any in-flight transfer completes.
//!
//! ```rust,no_run
//! use throttle::TransferSlots;
//!
//! # async fn example() {
//! let slots = TransferSlots::new(3);
//! let _slot = slots.acquire().await;
//! // run the transfer here - the slot is released when the guard drops
//! # }
//! ```

/// A fixed pool of transfer slots backed by a tokio semaphore.
#[derive(Debug)]
pub struct TransferSlots {
    sem: tokio::sync::Semaphore,
}

/// Holds one transfer slot; dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl TransferSlots {
    /// Create a pool with `slots` concurrent transfer slots.
    ///
    /// `slots` must be positive; a single slot degenerates to fully
    /// sequential execution.
    pub fn new(slots: usize) -> Self {
        assert!(slots > 0, "transfer slot count must be positive");
        Self {
            sem: tokio::sync::Semaphore::new(slots),
        }
    }

    pub async fn acquire(&self) -> SlotGuard<'_> {
        // the semaphore is never closed, so acquire cannot fail
        let permit = self
            .sem
            .acquire()
            .await
            .unwrap_or_else(|_| unreachable!("transfer slot semaphore closed"));
        SlotGuard { _permit: permit }
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let slots = TransferSlots::new(2);
        let first = slots.acquire().await;
        let second = slots.acquire().await;
        assert_eq!(slots.available(), 0);
        drop(first);
        assert_eq!(slots.available(), 1);
        drop(second);
        assert_eq!(slots.available(), 2);
    }

    #[tokio::test]
    async fn single_slot_serializes() {
        let slots = TransferSlots::new(1);
        let guard = slots.acquire().await;
        assert_eq!(slots.available(), 0);
        drop(guard);
        let _again = slots.acquire().await;
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn zero_slots_rejected() {
        let _ = TransferSlots::new(0);
    }
}
