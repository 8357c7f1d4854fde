//! Contest ownership and recovery
//!
//! Every active contest is driven by exactly one instance at a time. The
//! guarantee rests on three KV primitives: a TTL'd ownership lease claimed
//! with set-if-absent, a periodic refresh that keeps the lease alive while
//! the owner runs, and a short-TTL recovery lock that serializes competing
//! adoption attempts after an owner dies.
//!
//! Two reconciliation loops keep the fleet converged: a startup pass that
//! adopts contests whose heartbeat went stale, and a periodic sweep that
//! adopts any active contest whose lease has expired.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;

pub use manager::{ContestHost, OwnershipConfig, OwnershipManager, RecoveryLockGuard};
