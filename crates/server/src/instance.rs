//! One platform instance

use agora_core::{Bot, BotId, Config, Error, PresetId, Result};
use agora_engine::{EngineHost, Orchestrator, SpectatorBroadcaster, StakeSettlement, WinnerTakesAll};
use agora_matchmaker::{LivenessCheck, Matchmaker, PairCreator, QueueEntry};
use agora_ownership::{ContestHost, OwnershipConfig, OwnershipManager};
use agora_repo::{ContestRepository, MemoryStore, PresetRegistry, Repositories};
use agora_store::{KvStore, MemoryBus, MemoryKv, MessageBus};
use agora_transport::{BotHub, HubEvents};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Bridges hub envelopes into the matchmaker.
struct EventBridge {
    matchmaker: Arc<Matchmaker>,
    presets: Arc<PresetRegistry>,
    contests: Arc<dyn ContestRepository>,
    default_preset: PresetId,
    default_stake: i64,
}

impl EventBridge {
    /// A bot with a live contest must not be matched into a second one.
    async fn bot_is_playing(&self, bot: BotId) -> bool {
        match self.contests.list_active().await {
            Ok(active) => active.iter().any(|c| c.pro_bot == bot || c.con_bot == bot),
            Err(e) => {
                warn!(target: "agora::server", bot_id = %bot, error = %e, "active-contest check failed; refusing queue join");
                true
            }
        }
    }
}

#[async_trait::async_trait]
impl HubEvents for EventBridge {
    async fn queue_join(&self, bot: &Bot, stake: Option<i64>, preset: Option<PresetId>) {
        let preset_id = preset.unwrap_or_else(|| self.default_preset.clone());
        if !self.presets.contains(&preset_id) {
            warn!(
                target: "agora::server",
                bot_id = %bot.id,
                preset = %preset_id,
                "queue join with unknown preset rejected"
            );
            return;
        }
        if self.bot_is_playing(bot.id).await {
            warn!(
                target: "agora::server",
                bot_id = %bot.id,
                error = %Error::AlreadyQueued,
                "queue join rejected"
            );
            return;
        }
        self.matchmaker.join(
            bot.id,
            bot.owner,
            preset_id,
            bot.rating,
            stake.unwrap_or(self.default_stake),
        );
    }

    async fn queue_leave(&self, bot_id: BotId) {
        self.matchmaker.remove_bot(bot_id);
    }

    async fn bot_disconnected(&self, bot_id: BotId) {
        self.matchmaker.remove_bot(bot_id);
    }
}

/// A fully wired platform instance.
///
/// Construct, `start()`, and eventually `shutdown()`. All subsystems are
/// plain owned values injected here; nothing is process-global.
pub struct Instance {
    config: Config,
    repos: Repositories,
    presets: Arc<PresetRegistry>,
    matchmaker: Arc<Matchmaker>,
    hub: Arc<BotHub>,
    ownership: Arc<OwnershipManager>,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Instance {
    /// Assemble an instance over the given backends.
    pub fn new(
        config: Config,
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn MessageBus>,
        repos: Repositories,
        presets: Arc<PresetRegistry>,
        settlement: Arc<dyn StakeSettlement>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        if presets.is_empty() {
            return Err(Error::EmptyPresetRegistry);
        }
        let instance_id = config.instance();

        let matchmaker = Arc::new(Matchmaker::new(config.rating, config.matchmaker_sweep()));
        let hub = Arc::new(BotHub::new(
            instance_id.clone(),
            Arc::clone(&kv),
            Arc::clone(&bus),
            Arc::clone(&repos.bots),
            config.bot_attachment_ttl(),
            config.bot_heartbeat(),
        ));
        let ownership = Arc::new(OwnershipManager::new(
            Arc::clone(&kv),
            Arc::clone(&repos.contests),
            instance_id.clone(),
            OwnershipConfig::from_config(&config),
        ));
        let broadcaster = Arc::new(SpectatorBroadcaster::new(Arc::clone(&bus)));
        let orchestrator = Arc::new(Orchestrator::new(
            instance_id,
            repos.clone(),
            Arc::clone(&presets),
            Arc::clone(&hub),
            Arc::clone(&ownership),
            broadcaster,
            settlement,
            config.rating,
        ));

        hub.set_event_handler(Arc::new(EventBridge {
            matchmaker: Arc::clone(&matchmaker),
            presets: Arc::clone(&presets),
            contests: Arc::clone(&repos.contests),
            default_preset: config.default_preset.clone(),
            default_stake: config.default_stake,
        }));

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Arc::new(Self {
            config,
            repos,
            presets,
            matchmaker,
            hub,
            ownership,
            orchestrator,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }))
    }

    /// Assemble an instance over fresh in-process backends.
    ///
    /// Single-node deployments and tests; returns the store so callers can
    /// seed bots and topics.
    pub fn in_memory(config: Config) -> Result<(Arc<Self>, Arc<MemoryStore>)> {
        let store = MemoryStore::shared();
        let instance = Self::new(
            config,
            MemoryKv::shared(),
            MemoryBus::shared(),
            MemoryStore::repositories(&store),
            Arc::new(PresetRegistry::with_builtins()),
            Arc::new(WinnerTakesAll),
        )?;
        Ok((instance, store))
    }

    /// This instance's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The bot transport hub (the socket front-end attaches through this).
    pub fn hub(&self) -> &Arc<BotHub> {
        &self.hub
    }

    /// The contest orchestrator (votes, spectators, cancellation).
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// The matchmaking queue.
    pub fn matchmaker(&self) -> &Arc<Matchmaker> {
        &self.matchmaker
    }

    /// The ownership manager.
    pub fn ownership(&self) -> &Arc<OwnershipManager> {
        &self.ownership
    }

    /// The repository bundle.
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    fn host(&self) -> Arc<dyn ContestHost> {
        Arc::new(EngineHost(Arc::clone(&self.orchestrator)))
    }

    fn pair_creator(&self) -> PairCreator {
        let topics = Arc::clone(&self.repos.topics);
        let orchestrator = Arc::clone(&self.orchestrator);
        Arc::new(move |a: QueueEntry, b: QueueEntry| {
            let topics = Arc::clone(&topics);
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                let topic = topics
                    .pick()
                    .await?
                    .ok_or_else(|| Error::InvalidState("no topics registered".into()))?;
                // Stakes may differ by up to 20%; the table plays the lower.
                let stake = a.stake.min(b.stake);
                let contest = orchestrator
                    .create(a.bot_id, b.bot_id, topic.id, stake, &a.preset_id)
                    .await?;
                tokio::spawn(async move {
                    let contest_id = contest.id;
                    if let Err(e) = orchestrator.start(contest).await {
                        error!(target: "agora::server", contest_id = %contest_id, error = %e, "contest task failed");
                    }
                });
                Ok(())
            })
        })
    }

    fn liveness_check(&self) -> LivenessCheck {
        let hub = Arc::clone(&self.hub);
        Arc::new(move |bot_id: BotId| {
            let hub = Arc::clone(&hub);
            Box::pin(async move { hub.is_attached_anywhere(bot_id).await })
        })
    }

    /// Run startup recovery, then launch every background loop.
    pub async fn start(&self) -> Result<()> {
        if self.presets.is_empty() {
            return Err(Error::EmptyPresetRegistry);
        }
        let host = self.host();
        self.ownership.startup_recovery(&host).await?;

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(Arc::clone(&self.matchmaker).run(
            self.pair_creator(),
            Some(self.liveness_check()),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(
            Arc::clone(&self.hub).run_heartbeats(self.shutdown_tx.subscribe()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(&self.hub).run_instance_listener(self.shutdown_tx.subscribe()),
        ));
        tasks.push(tokio::spawn(Arc::clone(&self.ownership).run_refresh(
            Arc::clone(&host),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(Arc::clone(&self.ownership).run_unowned_sweep(
            host,
            self.shutdown_tx.subscribe(),
        )));

        info!(
            target: "agora::server",
            instance = %self.config.instance_id,
            "instance started"
        );
        Ok(())
    }

    /// Stop sweeps, release every lease and lock, and join the background
    /// loops within the configured grace period.
    ///
    /// Explicit release is what makes handover fast; TTL expiry is only the
    /// crash path.
    pub async fn shutdown(&self) {
        info!(target: "agora::server", instance = %self.config.instance_id, "shutting down");
        let _ = self.shutdown_tx.send(true);

        let active = self.orchestrator.active_contests();
        self.ownership.release_all(&active).await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let grace = self.config.shutdown_grace();
        for task in tasks {
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!(target: "agora::server", "background task outlived the grace period");
            }
        }
        info!(target: "agora::server", instance = %self.config.instance_id, "shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{Contest, Side, Topic, UserId};
    use agora_repo::{BotRepository, TopicRepository};
    use agora_transport::ChannelConnection;

    fn config(name: &str) -> Config {
        Config::for_instance(name)
    }

    #[tokio::test]
    async fn test_in_memory_instance_starts_and_stops() {
        let (instance, _store) = Instance::in_memory(config("inst-a")).unwrap();
        instance.start().await.unwrap();
        instance.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_preset_registry_is_fatal() {
        let store = MemoryStore::shared();
        let err = Instance::new(
            config("inst-a"),
            MemoryKv::shared(),
            MemoryBus::shared(),
            MemoryStore::repositories(&store),
            Arc::new(PresetRegistry::from_presets(Vec::new())),
            Arc::new(WinnerTakesAll),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::EmptyPresetRegistry));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut cfg = config("inst-a");
        cfg.instance_id = String::new();
        assert!(Instance::in_memory(cfg).is_err());
    }

    #[tokio::test]
    async fn test_queue_join_envelope_reaches_matchmaker() {
        let (instance, store) = Instance::in_memory(config("inst-a")).unwrap();

        let token = "a".repeat(64);
        let bot = Bot::new("joiner", UserId::new());
        BotRepository::insert(&*store, &bot, &token).await.unwrap();
        TopicRepository::insert(&*store, &Topic::new("t")).await.unwrap();

        let (conn, _rx) = ChannelConnection::pair();
        instance.hub().attach(&token, conn).await.unwrap();

        instance
            .hub()
            .handle_inbound(bot.id, r#"{"type":"queue_join","stake":5}"#)
            .await;
        assert!(instance.matchmaker().contains_bot(bot.id));

        instance
            .hub()
            .handle_inbound(bot.id, r#"{"type":"queue_leave"}"#)
            .await;
        assert!(!instance.matchmaker().contains_bot(bot.id));
    }

    #[tokio::test]
    async fn test_queue_join_rejected_while_bot_is_playing() {
        let (instance, store) = Instance::in_memory(config("inst-a")).unwrap();
        let token = "d".repeat(64);
        let bot = Bot::new("busy", UserId::new());
        BotRepository::insert(&*store, &bot, &token).await.unwrap();
        let (conn, _rx) = ChannelConnection::pair();
        instance.hub().attach(&token, conn).await.unwrap();

        // The bot is the pro side of a contest that is still running.
        let contest = Contest::new(
            bot.id,
            agora_core::BotId::new(),
            agora_core::TopicId::new(),
            "classic".into(),
            0,
        );
        ContestRepository::insert(&*store, &contest).await.unwrap();
        store
            .mark_started(contest.id, chrono::Utc::now())
            .await
            .unwrap();

        instance
            .hub()
            .handle_inbound(bot.id, r#"{"type":"queue_join"}"#)
            .await;
        assert!(!instance.matchmaker().contains_bot(bot.id));

        // Once the contest completes, the bot may queue again.
        store
            .complete(contest.id, Side::Pro, chrono::Utc::now())
            .await
            .unwrap();
        instance
            .hub()
            .handle_inbound(bot.id, r#"{"type":"queue_join"}"#)
            .await;
        assert!(instance.matchmaker().contains_bot(bot.id));
    }

    #[tokio::test]
    async fn test_unknown_preset_join_is_dropped() {
        let (instance, store) = Instance::in_memory(config("inst-a")).unwrap();
        let token = "b".repeat(64);
        let bot = Bot::new("confused", UserId::new());
        BotRepository::insert(&*store, &bot, &token).await.unwrap();
        let (conn, _rx) = ChannelConnection::pair();
        instance.hub().attach(&token, conn).await.unwrap();

        instance
            .hub()
            .handle_inbound(
                bot.id,
                r#"{"type":"queue_join","presetId":"not-a-preset"}"#,
            )
            .await;
        assert!(!instance.matchmaker().contains_bot(bot.id));
    }

    #[tokio::test]
    async fn test_disconnect_leaves_queue() {
        let (instance, store) = Instance::in_memory(config("inst-a")).unwrap();
        let token = "c".repeat(64);
        let bot = Bot::new("fickle", UserId::new());
        BotRepository::insert(&*store, &bot, &token).await.unwrap();
        let (conn, _rx) = ChannelConnection::pair();
        let handle = instance.hub().attach(&token, conn).await.unwrap();

        instance
            .hub()
            .handle_inbound(bot.id, r#"{"type":"queue_join"}"#)
            .await;
        assert!(instance.matchmaker().contains_bot(bot.id));

        instance.hub().detach(bot.id, handle.epoch).await;
        assert!(!instance.matchmaker().contains_bot(bot.id));
    }
}
