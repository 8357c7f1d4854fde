//! Persistence layer for the Agora platform
//!
//! Repository traits for every authoritative table (contests, messages,
//! votes, round results, bots, topics), the immutable preset registry, and
//! an in-memory implementation used by single-node deployments and the test
//! suites.
//!
//! The two uniqueness constraints the rest of the system leans on live here:
//! at most one vote per (contest, round, voter), and at most one result per
//! (contest, round). Both are enforced by [`MemoryStore`] the way a
//! relational schema would enforce them with unique indexes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod preset;
pub mod traits;

pub use memory::MemoryStore;
pub use preset::PresetRegistry;
pub use traits::{
    BotRepository, ContestRepository, MessageRepository, Repositories, RoundResultRepository,
    TopicRepository, VoteRepository,
};
