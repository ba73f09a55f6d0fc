//! Background data synchronization for the board.
//!
//! A single [`Scheduler`] owns every entity cache, decides which entity to
//! refresh on each tick, enforces the global request spacing, and publishes
//! results into per-domain slots that the display layer reads through a
//! [`BoardHandle`].

pub mod cache;
pub mod gate;
pub mod handle;
pub mod indicator;
pub mod published;
pub mod scheduler;
pub mod selection;
pub mod signals;

pub use cache::EntityCache;
pub use gate::RequestGate;
pub use handle::{BoardHandle, DomainUpdate};
pub use indicator::{AmbientCondition, AmbientIndicator};
pub use published::{Published, PublishedSlot};
pub use scheduler::{FetchAttempt, PublishPolicy, Scheduler, SchedulerSources, TickReport};
pub use selection::{Selection, SelectionState};
pub use signals::{FetchStatus, ManualTriggers};
