//! Shared-state backends for the Agora platform
//!
//! Two abstractions every instance coordinates through:
//! - [`KvStore`]: a shared key/value store with TTLs and an atomic
//!   set-if-absent, carrying ownership leases, recovery locks, and bot
//!   attachment records.
//! - [`MessageBus`]: a best-effort, at-least-once pub/sub bus carrying
//!   cross-instance bot requests, reply envelopes, and spectator fan-out.
//!
//! In-memory implementations back single-node deployments and the test
//! suites; a cluster points both traits at its shared infrastructure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod keys;
pub mod kv;
pub mod memory;

pub use bus::{BusSubscription, MessageBus};
pub use kv::KvStore;
pub use memory::{MemoryBus, MemoryKv};
