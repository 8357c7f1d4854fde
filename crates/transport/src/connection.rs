//! Bot connection abstraction
//!
//! The hub is transport-agnostic: anything that can deliver envelopes to a
//! bot and be closed with a code implements [`BotConnection`]. The socket
//! front-end adapts its websocket here; in-process bots and the test suites
//! use [`crate::ChannelConnection`].

use agora_core::{Result, ServerToBot};
use async_trait::async_trait;

/// Close code: the connect URL did not match `/bot/connect/<token>`.
pub const CLOSE_BAD_URL: u16 = 4001;
/// Close code: the token did not resolve to a bot.
pub const CLOSE_BAD_TOKEN: u16 = 4002;
/// Close code: a newer connection for the same bot replaced this one.
pub const CLOSE_REPLACED: u16 = 4003;

/// One live connection to a bot.
#[async_trait]
pub trait BotConnection: Send + Sync {
    /// Deliver an envelope to the bot.
    async fn send(&self, envelope: &ServerToBot) -> Result<()>;

    /// Close the connection with a code and reason. Idempotent.
    async fn close(&self, code: u16, reason: &str);

    /// Whether the underlying transport is still open.
    fn is_open(&self) -> bool;
}

/// Extract the connect token from a connection URL path.
///
/// The path must end in `/bot/connect/<token>` where the token is exactly 64
/// hex characters. Returns `None` for anything else; the caller closes with
/// [`CLOSE_BAD_URL`].
pub fn connect_token_from_path(path: &str) -> Option<&str> {
    let path = path.split('?').next().unwrap_or(path);
    let token = path.strip_suffix('/').unwrap_or(path).rsplit('/').next()?;
    let rest = path.strip_suffix('/').unwrap_or(path);
    let prefix = rest.strip_suffix(token)?;
    if !prefix.ends_with("/bot/connect/") {
        return None;
    }
    if token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> String {
        "0123456789abcdef".repeat(4)
    }

    #[test]
    fn test_valid_paths() {
        let t = token();
        assert_eq!(
            connect_token_from_path(&format!("/bot/connect/{t}")),
            Some(t.as_str())
        );
        assert_eq!(
            connect_token_from_path(&format!("/api/v1/bot/connect/{t}")),
            Some(t.as_str())
        );
        // Query strings are ignored
        assert_eq!(
            connect_token_from_path(&format!("/bot/connect/{t}?version=2")),
            Some(t.as_str())
        );
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        let t = token();
        assert_eq!(connect_token_from_path(&format!("/bot/{t}")), None);
        assert_eq!(connect_token_from_path(&format!("/connect/{t}")), None);
        assert_eq!(connect_token_from_path(""), None);
    }

    #[test]
    fn test_rejects_bad_token_shape() {
        assert_eq!(connect_token_from_path("/bot/connect/abc"), None);
        let long = "f".repeat(65);
        assert_eq!(connect_token_from_path(&format!("/bot/connect/{long}")), None);
        let non_hex = "g".repeat(64);
        assert_eq!(
            connect_token_from_path(&format!("/bot/connect/{non_hex}")),
            None
        );
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let t = "ABCDEF0123456789".repeat(4);
        assert_eq!(
            connect_token_from_path(&format!("/bot/connect/{t}")),
            Some(t.as_str())
        );
    }
}
