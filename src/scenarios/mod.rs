//! The scenarios, each in a broken and a fixed flavour.

pub mod mutex;
pub mod publish;
pub mod race;

pub use mutex::{MutexAtomic, MutexBroken};
pub use publish::{PublishAtomic, PublishBox, PublishBroken};
pub use race::{RaceAcquireRelease, RaceAtomic, RaceBroken};
