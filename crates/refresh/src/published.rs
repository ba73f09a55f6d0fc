//! Cross-context mailbox for the latest snapshot of one domain.
//!
//! The scheduler is the only writer. Readers either consume (copy and clear
//! the dirty flag) or peek (copy only). The lock is held for a field copy and
//! never across a network call.

use std::time::Duration;

use tokio::sync::Mutex;

/// What a domain currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Published<T> {
    /// Nothing has ever been fetched for this domain.
    Empty,
    Data(T),
}

impl<T> Published<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Published::Empty => None,
            Published::Data(v) => Some(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Published::Empty)
    }
}

#[derive(Debug)]
struct SlotState<T> {
    current: Published<T>,
    dirty: bool,
}

impl<T: Clone> SlotState<T> {
    fn take_if_dirty(&mut self) -> Option<Published<T>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.current.clone())
    }
}

/// Latest value for one domain plus a "changed since last consume" flag.
#[derive(Debug)]
pub struct PublishedSlot<T> {
    state: Mutex<SlotState<T>>,
    consume_wait: Duration,
}

impl<T: Clone> PublishedSlot<T> {
    /// `consume_wait` bounds how long a consuming reader waits for the lock.
    pub fn new(consume_wait: Duration) -> Self {
        Self {
            state: Mutex::new(SlotState {
                current: Published::Empty,
                dirty: false,
            }),
            consume_wait,
        }
    }

    /// Replace the current value and mark it dirty in one critical section.
    pub async fn publish(&self, value: T) {
        let mut state = self.state.lock().await;
        state.current = Published::Data(value);
        state.dirty = true;
    }

    /// Mark dirty without changing the value, so a reader can drop its
    /// "updating" indicator after a failed fetch.
    pub async fn touch(&self) {
        self.state.lock().await.dirty = true;
    }

    /// Return the current value if it changed since the last consume.
    ///
    /// Waits at most `consume_wait` for the lock and reports "no update" on
    /// timeout, so a render loop never stalls behind the writer.
    pub async fn consume_if_updated(&self) -> Option<Published<T>> {
        let mut state = tokio::time::timeout(self.consume_wait, self.state.lock())
            .await
            .ok()?;
        state.take_if_dirty()
    }

    /// Zero-wait consume for synchronous render threads.
    pub fn try_consume_if_updated(&self) -> Option<Published<T>> {
        let mut state = self.state.try_lock().ok()?;
        state.take_if_dirty()
    }

    /// Current value without clearing the dirty flag.
    pub async fn peek_current(&self) -> Published<T> {
        self.state.lock().await.current.clone()
    }

    /// Blocking peek for code running outside the async runtime.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_peek_current(&self) -> Published<T> {
        self.state.blocking_lock().current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> PublishedSlot<(u32, &'static str)> {
        PublishedSlot::new(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_starts_empty_and_clean() {
        let slot = slot();
        assert_eq!(slot.consume_if_updated().await, None);
        assert_eq!(slot.peek_current().await, Published::Empty);
    }

    #[tokio::test]
    async fn test_second_consume_without_write_reports_no_update() {
        let slot = slot();
        slot.publish((1, "first")).await;

        assert_eq!(slot.consume_if_updated().await, Some(Published::Data((1, "first"))));
        assert_eq!(slot.consume_if_updated().await, None);
    }

    #[tokio::test]
    async fn test_peek_does_not_clear_dirty() {
        let slot = slot();
        slot.publish((2, "second")).await;

        assert_eq!(slot.peek_current().await, Published::Data((2, "second")));
        assert_eq!(slot.consume_if_updated().await, Some(Published::Data((2, "second"))));
        // Peek still returns the value after it was consumed.
        assert_eq!(slot.peek_current().await.data(), Some(&(2, "second")));
    }

    #[tokio::test]
    async fn test_consume_sees_latest_write_only() {
        let slot = slot();
        slot.publish((1, "a")).await;
        slot.publish((2, "b")).await;

        assert_eq!(slot.consume_if_updated().await, Some(Published::Data((2, "b"))));
        assert_eq!(slot.consume_if_updated().await, None);
    }

    #[tokio::test]
    async fn test_touch_without_data_yields_empty_update() {
        let slot = slot();
        slot.touch().await;

        let update = slot.consume_if_updated().await;
        assert_eq!(update, Some(Published::Empty));
        assert!(update.is_some_and(|u| u.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_gives_up_when_lock_is_held() {
        let slot = slot();
        slot.publish((3, "held")).await;

        let guard = slot.state.lock().await;
        assert_eq!(slot.consume_if_updated().await, None);
        assert_eq!(slot.try_consume_if_updated(), None);
        drop(guard);

        // The update was not lost by the timed-out attempt.
        assert_eq!(slot.try_consume_if_updated(), Some(Published::Data((3, "held"))));
    }

    #[test]
    fn test_blocking_peek_outside_runtime() {
        let slot = slot();
        assert!(slot.blocking_peek_current().is_empty());
    }
}
