//! The sync engine: diffing, per-channel orchestration, run scheduling and
//! the time-window trigger.

mod channel;
mod context;
mod diff;
mod scheduler;
mod trigger;
mod types;

pub use channel::{ChannelSyncer, SyncOptions, COOKIES_FILE};
pub use context::RunContext;
pub use diff::{resolve, DiffOptions, Resolution};
pub use scheduler::SyncScheduler;
pub use trigger::{until_next_hour, SyncTrigger};
pub use types::*;
