//! Cross-context flags: manual refresh triggers and fetch-in-flight status.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use common::Domain;

/// One-shot "refresh now" requests, settable from any context.
///
/// The scheduler clears a trigger only once it has honored it; a trigger
/// blocked by the request gate stays pending for the next tick.
#[derive(Debug, Default)]
pub struct ManualTriggers {
    flags: [AtomicBool; 3],
}

impl ManualTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, domain: Domain) {
        self.flags[domain.index()].store(true, Ordering::Release);
    }

    pub fn is_pending(&self, domain: Domain) -> bool {
        self.flags[domain.index()].load(Ordering::Acquire)
    }

    pub fn clear(&self, domain: Domain) {
        self.flags[domain.index()].store(false, Ordering::Release);
    }
}

const IDLE: usize = usize::MAX;

/// Which entity, if any, each domain is fetching right now.
#[derive(Debug)]
pub struct FetchStatus {
    in_flight: [AtomicUsize; 3],
    changed: [AtomicBool; 3],
}

impl Default for FetchStatus {
    fn default() -> Self {
        Self {
            in_flight: [
                AtomicUsize::new(IDLE),
                AtomicUsize::new(IDLE),
                AtomicUsize::new(IDLE),
            ],
            changed: Default::default(),
        }
    }
}

impl FetchStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self, domain: Domain, entity: usize) {
        self.in_flight[domain.index()].store(entity, Ordering::Release);
        self.changed[domain.index()].store(true, Ordering::Release);
    }

    pub(crate) fn finish(&self, domain: Domain) {
        self.in_flight[domain.index()].store(IDLE, Ordering::Release);
        self.changed[domain.index()].store(true, Ordering::Release);
    }

    pub fn in_flight_entity(&self, domain: Domain) -> Option<usize> {
        match self.in_flight[domain.index()].load(Ordering::Acquire) {
            IDLE => None,
            entity => Some(entity),
        }
    }

    pub fn is_in_flight(&self, domain: Domain) -> bool {
        self.in_flight_entity(domain).is_some()
    }

    /// True once per in-flight transition since the last call.
    pub fn take_changed(&self, domain: Domain) -> bool {
        self.changed[domain.index()].swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_are_per_domain() {
        let triggers = ManualTriggers::new();
        triggers.trigger(Domain::Transit);

        assert!(triggers.is_pending(Domain::Transit));
        assert!(!triggers.is_pending(Domain::Weather));
        assert!(!triggers.is_pending(Domain::Quotes));

        triggers.clear(Domain::Transit);
        assert!(!triggers.is_pending(Domain::Transit));
    }

    #[test]
    fn test_fetch_status_transitions() {
        let status = FetchStatus::new();
        assert!(!status.is_in_flight(Domain::Weather));
        assert!(!status.take_changed(Domain::Weather));

        status.begin(Domain::Weather, 2);
        assert_eq!(status.in_flight_entity(Domain::Weather), Some(2));
        assert!(status.take_changed(Domain::Weather));
        assert!(!status.take_changed(Domain::Weather));

        status.finish(Domain::Weather);
        assert_eq!(status.in_flight_entity(Domain::Weather), None);
        assert!(status.take_changed(Domain::Weather));
        assert!(!status.is_in_flight(Domain::Quotes));
    }
}
