//! Shared test mocks and utilities for the VMForge platform.

mod clock;
mod hypervisor;
mod projection;
mod ports;
mod repository;

pub use clock::FixedClock;
pub use hypervisor::{FakeHypervisor, FixedMappingSource, MissingMappingSource};
pub use ports::{
    DenyAllQuota, FailingNotifier, FailingTimeline, RecordingNotifier, RecordingTimeline,
};
pub use projection::{FailingProjectionStore, RecordingProjectionStore};
pub use repository::{
    ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    InMemoryEventRepository, RecordingEventRepository,
};
