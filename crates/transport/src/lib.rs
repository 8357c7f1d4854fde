//! Bot transport hub
//!
//! A bidirectional request/response layer over long-lived bot connections.
//! The hub tracks locally attached bots, correlates replies to requests by
//! id, and routes requests over the bus to whichever peer instance holds the
//! target bot. Reply envelopes for forwarded requests travel back on an
//! ephemeral per-request bus channel.
//!
//! The hub never drives contests itself: the orchestrator calls
//! [`BotHub::request`] and treats every failure as fallback turn content.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod connection;
pub mod hub;

pub use channel::ChannelConnection;
pub use connection::{
    connect_token_from_path, BotConnection, CLOSE_BAD_TOKEN, CLOSE_BAD_URL, CLOSE_REPLACED,
};
pub use hub::{AttachHandle, BotHub, BotReply, HubEvents};
