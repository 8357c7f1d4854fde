//! Instance configuration
//!
//! Loaded from a TOML file with serde defaults for everything except the
//! instance identity, which must be unique per replica and is therefore
//! required (`AGORA_INSTANCE_ID` overrides the file). All periods and TTLs
//! are expressed in seconds and exposed as `Duration` accessors.

use crate::error::{Error, Result};
use crate::ids::{InstanceId, PresetId};
use crate::rating::RatingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one platform instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stable identity of this replica. Required.
    #[serde(default)]
    pub instance_id: String,

    /// Shared KV store endpoint. `None` selects the in-process store.
    #[serde(default)]
    pub kv_url: Option<String>,

    /// Pub/sub bus endpoint. `None` selects the in-process bus.
    #[serde(default)]
    pub bus_url: Option<String>,

    /// Listening address for the socket server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Listening port.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Ownership lease TTL, seconds.
    #[serde(default = "default_ownership_ttl")]
    pub ownership_ttl_secs: u64,

    /// Ownership refresh period, seconds.
    #[serde(default = "default_ownership_refresh")]
    pub ownership_refresh_secs: u64,

    /// Unowned-contest sweep period, seconds.
    #[serde(default = "default_unowned_sweep")]
    pub unowned_sweep_secs: u64,

    /// Recovery lock TTL, seconds.
    #[serde(default = "default_recovery_lock_ttl")]
    pub recovery_lock_ttl_secs: u64,

    /// A contest with no heartbeat for this long is considered stuck.
    #[serde(default = "default_stuck_after")]
    pub stuck_after_secs: u64,

    /// Bot heartbeat period, seconds.
    #[serde(default = "default_bot_heartbeat")]
    pub bot_heartbeat_secs: u64,

    /// Bot attachment record TTL, seconds.
    #[serde(default = "default_bot_attachment_ttl")]
    pub bot_attachment_ttl_secs: u64,

    /// Matchmaker sweep period, seconds.
    #[serde(default = "default_matchmaker_sweep")]
    pub matchmaker_sweep_secs: u64,

    /// Rating and matchmaking-window tunables.
    #[serde(default)]
    pub rating: RatingConfig,

    /// Preset used when a queue join names none.
    #[serde(default = "default_preset")]
    pub default_preset: PresetId,

    /// Stake used when a queue join names none.
    #[serde(default)]
    pub default_stake: i64,

    /// Shutdown grace period for in-flight connections, seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_ownership_ttl() -> u64 {
    300
}
fn default_ownership_refresh() -> u64 {
    120
}
fn default_unowned_sweep() -> u64 {
    30
}
fn default_recovery_lock_ttl() -> u64 {
    120
}
fn default_stuck_after() -> u64 {
    300
}
fn default_bot_heartbeat() -> u64 {
    30
}
fn default_bot_attachment_ttl() -> u64 {
    120
}
fn default_matchmaker_sweep() -> u64 {
    2
}
fn default_preset() -> PresetId {
    PresetId::from("classic")
}
fn default_shutdown_grace() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        // Parse from the empty document so all serde defaults apply.
        toml::from_str("").expect("empty config must parse")
    }
}

impl Config {
    /// A config for the given instance with every other option defaulted.
    pub fn for_instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut cfg: Config =
            toml::from_str(text).map_err(|e| Error::ConfigError(format!("bad config: {e}")))?;
        if let Ok(id) = std::env::var("AGORA_INSTANCE_ID") {
            cfg.instance_id = id;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the platform cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.instance_id.trim().is_empty() {
            return Err(Error::ConfigError(
                "instance_id is required (set it in the config file or AGORA_INSTANCE_ID)".into(),
            ));
        }
        if self.ownership_refresh_secs >= self.ownership_ttl_secs {
            return Err(Error::ConfigError(
                "ownership_refresh_secs must be shorter than ownership_ttl_secs".into(),
            ));
        }
        if self.bot_heartbeat_secs >= self.bot_attachment_ttl_secs {
            return Err(Error::ConfigError(
                "bot_heartbeat_secs must be shorter than bot_attachment_ttl_secs".into(),
            ));
        }
        if self.matchmaker_sweep_secs == 0 {
            return Err(Error::ConfigError("matchmaker_sweep_secs must be nonzero".into()));
        }
        Ok(())
    }

    /// This replica's identity.
    pub fn instance(&self) -> InstanceId {
        InstanceId::new(self.instance_id.clone())
    }

    /// Ownership lease TTL.
    pub fn ownership_ttl(&self) -> Duration {
        Duration::from_secs(self.ownership_ttl_secs)
    }

    /// Ownership refresh period.
    pub fn ownership_refresh(&self) -> Duration {
        Duration::from_secs(self.ownership_refresh_secs)
    }

    /// Unowned sweep period.
    pub fn unowned_sweep(&self) -> Duration {
        Duration::from_secs(self.unowned_sweep_secs)
    }

    /// Recovery lock TTL.
    pub fn recovery_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.recovery_lock_ttl_secs)
    }

    /// Stuck-contest threshold.
    pub fn stuck_after(&self) -> Duration {
        Duration::from_secs(self.stuck_after_secs)
    }

    /// Bot heartbeat period.
    pub fn bot_heartbeat(&self) -> Duration {
        Duration::from_secs(self.bot_heartbeat_secs)
    }

    /// Bot attachment TTL.
    pub fn bot_attachment_ttl(&self) -> Duration {
        Duration::from_secs(self.bot_attachment_ttl_secs)
    }

    /// Matchmaker sweep period.
    pub fn matchmaker_sweep(&self) -> Duration {
        Duration::from_secs(self.matchmaker_sweep_secs)
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::for_instance("inst-a");
        assert_eq!(cfg.ownership_ttl_secs, 300);
        assert_eq!(cfg.ownership_refresh_secs, 120);
        assert_eq!(cfg.unowned_sweep_secs, 30);
        assert_eq!(cfg.recovery_lock_ttl_secs, 120);
        assert_eq!(cfg.bot_heartbeat_secs, 30);
        assert_eq!(cfg.bot_attachment_ttl_secs, 120);
        assert_eq!(cfg.matchmaker_sweep_secs, 2);
        assert_eq!(cfg.rating.k, 32);
        assert_eq!(cfg.default_preset.as_str(), "classic");
        assert_eq!(cfg.shutdown_grace_secs, 3);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_missing_instance_id_is_fatal() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_toml() {
        let cfg = Config::from_toml_str(
            r#"
            instance_id = "inst-7"
            listen_port = 9000
            ownership_ttl_secs = 600
            ownership_refresh_secs = 200

            [rating]
            k = 24
            "#,
        )
        .unwrap();
        assert_eq!(cfg.instance_id, "inst-7");
        assert_eq!(cfg.listen_port, 9000);
        assert_eq!(cfg.ownership_ttl(), Duration::from_secs(600));
        assert_eq!(cfg.rating.k, 24);
        // Untouched options keep defaults
        assert_eq!(cfg.rating.range_cap, 500);
    }

    #[test]
    fn test_refresh_must_undercut_ttl() {
        let mut cfg = Config::for_instance("x");
        cfg.ownership_refresh_secs = 300;
        assert!(cfg.validate().is_err());
    }
}
