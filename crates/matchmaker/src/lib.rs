//! Rating-window matchmaker
//!
//! Each instance runs its own queue of waiting bots: a bot is attached to
//! exactly one instance, so its queue entry lives there too, and no
//! cross-instance queue synchronization exists. A periodic sweep widens each
//! entry's acceptable rating window with wait time, pairs compatible entries
//! longest-waiting-first, and hands every accepted pair to a creator
//! callback. Entries leave the queue only on a successful creation, an
//! explicit leave, a bot disconnect, or a failed liveness check.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;

pub use queue::{EntryId, LivenessCheck, Matchmaker, PairCreator, QueueEntry};
