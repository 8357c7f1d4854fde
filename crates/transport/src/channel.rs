//! In-process bot connection
//!
//! Delivers envelopes over an unbounded channel instead of a socket. Used by
//! locally-embedded bots and throughout the test suites; the hub cannot tell
//! it apart from a websocket-backed connection.

use crate::connection::BotConnection;
use agora_core::{Error, Result, ServerToBot};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A [`BotConnection`] backed by an in-process channel.
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<ServerToBot>,
    open: AtomicBool,
    closed_with: Mutex<Option<(u16, String)>>,
}

impl ChannelConnection {
    /// Create a connection and the receiver the "bot" reads envelopes from.
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerToBot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                open: AtomicBool::new(true),
                closed_with: Mutex::new(None),
            }),
            rx,
        )
    }

    /// The close code and reason, if the server closed this connection.
    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed_with.lock().clone()
    }
}

#[async_trait]
impl BotConnection for ChannelConnection {
    async fn send(&self, envelope: &ServerToBot) -> Result<()> {
        if !self.is_open() {
            return Err(Error::BotTransport("connection closed".into()));
        }
        self.tx
            .send(envelope.clone())
            .map_err(|_| Error::BotTransport("receiver dropped".into()))
    }

    async fn close(&self, code: u16, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            *self.closed_with.lock() = Some((code, reason.to_string()));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (conn, mut rx) = ChannelConnection::pair();
        conn.send(&ServerToBot::Ping).await.unwrap();
        assert_eq!(rx.recv().await, Some(ServerToBot::Ping));
    }

    #[tokio::test]
    async fn test_close_records_code_once() {
        let (conn, _rx) = ChannelConnection::pair();
        conn.close(4003, "replaced").await;
        conn.close(4002, "second close ignored").await;
        assert_eq!(conn.closed_with(), Some((4003, "replaced".to_string())));
        assert!(!conn.is_open());
        assert!(conn.send(&ServerToBot::Ping).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_transport() {
        let (conn, rx) = ChannelConnection::pair();
        drop(rx);
        assert!(!conn.is_open());
    }
}
