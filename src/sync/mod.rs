//! Background metagraph synchronization
//!
//! The scheduler walks the allowed partitions on a fixed interval, turning each
//! upstream snapshot into a stored payload. A partition that fails keeps its
//! previous snapshot; the others are written regardless.

mod scheduler;

pub use scheduler::{
    PassReport, SyncConfig, SyncEvent, SyncScheduler, SyncState, DEFAULT_EVENT_CHANNEL_CAPACITY,
};
