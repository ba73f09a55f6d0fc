//! Which city and stop the user is looking at.
//!
//! The display layer writes selection; the scheduler takes the edge-triggered
//! "changed" flags and then reads the index, so a change that lands between
//! the two is seen on the next tick rather than lost.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Read side of the selection model, as seen by the scheduler.
pub trait Selection: Send + Sync {
    fn active_city(&self) -> usize;
    /// Return and clear the city "changed" flag.
    fn take_city_changed(&self) -> bool;

    fn active_stop(&self) -> usize;
    /// Return and clear the stop "changed" flag.
    fn take_stop_changed(&self) -> bool;

    /// Background transit polling only runs while this is true.
    fn transit_visible(&self) -> bool;
}

/// Lock-free selection state shared between the display layer and the scheduler.
#[derive(Debug, Default)]
pub struct SelectionState {
    city: AtomicUsize,
    city_changed: AtomicBool,
    stop: AtomicUsize,
    stop_changed: AtomicBool,
    transit_visible: AtomicBool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a city. Raises the changed flag only if the index moved.
    pub fn select_city(&self, index: usize) {
        if self.city.swap(index, Ordering::AcqRel) != index {
            self.city_changed.store(true, Ordering::Release);
        }
    }

    /// Select a stop. Raises the changed flag only if the index moved.
    pub fn select_stop(&self, index: usize) {
        if self.stop.swap(index, Ordering::AcqRel) != index {
            self.stop_changed.store(true, Ordering::Release);
        }
    }

    pub fn set_transit_visible(&self, visible: bool) {
        self.transit_visible.store(visible, Ordering::Release);
    }
}

impl Selection for SelectionState {
    fn active_city(&self) -> usize {
        self.city.load(Ordering::Acquire)
    }

    fn take_city_changed(&self) -> bool {
        self.city_changed.swap(false, Ordering::AcqRel)
    }

    fn active_stop(&self) -> usize {
        self.stop.load(Ordering::Acquire)
    }

    fn take_stop_changed(&self) -> bool {
        self.stop_changed.swap(false, Ordering::AcqRel)
    }

    fn transit_visible(&self) -> bool {
        self.transit_visible.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_same_city_is_not_a_change() {
        let sel = SelectionState::new();
        sel.select_city(0);
        assert!(!sel.take_city_changed());

        sel.select_city(2);
        assert_eq!(sel.active_city(), 2);
        assert!(sel.take_city_changed());
        assert!(!sel.take_city_changed());
        assert_eq!(sel.active_city(), 2);
    }

    #[test]
    fn test_change_after_take_is_kept() {
        let sel = SelectionState::new();
        sel.select_city(1);
        assert!(sel.take_city_changed());

        // Lands after the scheduler took the flag but before it acted.
        sel.select_city(2);
        assert!(sel.take_city_changed());
        assert_eq!(sel.active_city(), 2);
    }

    #[test]
    fn test_stop_selection_and_visibility() {
        let sel = SelectionState::new();
        assert!(!sel.transit_visible());

        sel.select_stop(1);
        sel.set_transit_visible(true);
        assert_eq!(sel.active_stop(), 1);
        assert!(sel.transit_visible());

        assert!(sel.take_stop_changed());
        assert!(!sel.take_stop_changed());
    }
}
