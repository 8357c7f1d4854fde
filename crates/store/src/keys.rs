//! KV key and bus channel naming
//!
//! Single source of truth for the shared keyspace. Key and channel layouts
//! are part of the deployment contract; changing them orphans live leases.

use agora_core::{BotId, ContestId, InstanceId, RequestId};

/// Ownership lease for a contest: value is the owning instance id.
pub fn owner_key(contest: ContestId) -> String {
    format!("debate:owner:{contest}")
}

/// Recovery lock for a contest: value is `<instance>-<nonce>`.
pub fn recovery_lock_key(contest: ContestId) -> String {
    format!("debate:recovery_lock:{contest}")
}

/// Bot attachment record: value is the instance holding the connection.
pub fn attachment_key(bot: BotId) -> String {
    format!("bot:connected:{bot}")
}

/// Private channel where an instance receives forwarded bot traffic.
pub fn instance_channel(instance: &InstanceId) -> String {
    format!("bot:instance:{instance}")
}

/// Ephemeral per-request reply channel.
pub fn response_channel(request: &RequestId) -> String {
    format!("bot:response:{request}")
}

/// Spectator event relay for a contest.
pub fn spectator_channel(contest: ContestId) -> String {
    format!("debate:events:{contest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layouts() {
        let contest = ContestId::new();
        let bot = BotId::new();
        assert_eq!(owner_key(contest), format!("debate:owner:{contest}"));
        assert_eq!(
            recovery_lock_key(contest),
            format!("debate:recovery_lock:{contest}")
        );
        assert_eq!(attachment_key(bot), format!("bot:connected:{bot}"));
    }

    #[test]
    fn test_channel_layouts() {
        let instance = InstanceId::new("inst-a");
        assert_eq!(instance_channel(&instance), "bot:instance:inst-a");
        let request = RequestId::from_raw("r-1");
        assert_eq!(response_channel(&request), "bot:response:r-1");
    }
}
