//! The bot hub
//!
//! Tracks locally attached bots, correlates request/reply pairs, heartbeats
//! connections, and routes requests across instances.
//!
//! Request routing, in order:
//! 1. Bot attached locally → deliver on the local connection and wait on a
//!    pending-reply slot.
//! 2. KV attachment record names a peer → subscribe to the per-request reply
//!    channel, then forward the request to the peer's instance channel.
//! 3. Otherwise → fail fast with `BotNotConnected`.
//!
//! The subscribe happens strictly before the publish, so the reply cannot be
//! lost between the peer answering and this instance listening.

use crate::connection::{BotConnection, CLOSE_BAD_TOKEN, CLOSE_REPLACED};
use agora_core::{
    Bot, BotId, BotToServer, DebateRequest, Error, InstanceId, InstanceMessage, PresetId,
    RequestId, ResponseMessage, Result, ServerToBot,
};
use agora_repo::BotRepository;
use agora_store::{keys, KvStore, MessageBus};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// A validated bot reply.
#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    /// Turn content. Non-empty.
    pub message: String,
    /// Optional self-assessed confidence in [0, 1].
    pub confidence: Option<f64>,
}

impl BotReply {
    /// Validate the reply shape: non-empty message, confidence within [0, 1].
    pub fn validate(message: String, confidence: Option<f64>) -> Result<Self> {
        if message.trim().is_empty() {
            return Err(Error::InvalidBotReply("empty message".into()));
        }
        if let Some(c) = confidence {
            if !(0.0..=1.0).contains(&c) || c.is_nan() {
                return Err(Error::InvalidBotReply(format!(
                    "confidence {c} outside [0, 1]"
                )));
            }
        }
        Ok(Self {
            message,
            confidence,
        })
    }
}

/// Callbacks the hub raises for queue and lifecycle envelopes.
///
/// Implemented by the instance wiring; keeps the hub free of matchmaker and
/// orchestrator dependencies.
#[async_trait::async_trait]
pub trait HubEvents: Send + Sync {
    /// The bot asked to join the matchmaking queue.
    async fn queue_join(&self, bot: &Bot, stake: Option<i64>, preset: Option<PresetId>);

    /// The bot asked to leave the queue.
    async fn queue_leave(&self, bot_id: BotId);

    /// The bot's connection went away. Disconnected bots must not be matched.
    async fn bot_disconnected(&self, bot_id: BotId);
}

/// Returned by a successful attach; the connection's epoch disambiguates
/// replacement races on detach.
#[derive(Debug, Clone)]
pub struct AttachHandle {
    /// The attached bot's record.
    pub bot: Bot,
    /// Epoch of this attachment.
    pub epoch: u64,
}

struct Attached {
    conn: Arc<dyn BotConnection>,
    bot: Bot,
    epoch: u64,
}

/// The per-instance bot transport hub.
pub struct BotHub {
    instance_id: InstanceId,
    kv: Arc<dyn KvStore>,
    bus: Arc<dyn MessageBus>,
    bots: Arc<dyn BotRepository>,
    attachment_ttl: Duration,
    heartbeat_period: Duration,
    connections: DashMap<BotId, Attached>,
    pending: DashMap<RequestId, oneshot::Sender<Result<BotReply>>>,
    epoch: AtomicU64,
    counter: AtomicU64,
    events: RwLock<Option<Arc<dyn HubEvents>>>,
}

impl BotHub {
    /// Create a hub for this instance.
    pub fn new(
        instance_id: InstanceId,
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn MessageBus>,
        bots: Arc<dyn BotRepository>,
        attachment_ttl: Duration,
        heartbeat_period: Duration,
    ) -> Self {
        Self {
            instance_id,
            kv,
            bus,
            bots,
            attachment_ttl,
            heartbeat_period,
            connections: DashMap::new(),
            pending: DashMap::new(),
            epoch: AtomicU64::new(0),
            counter: AtomicU64::new(0),
            events: RwLock::new(None),
        }
    }

    /// Install the event handler. Called once during instance wiring.
    pub fn set_event_handler(&self, events: Arc<dyn HubEvents>) {
        *self.events.write() = Some(events);
    }

    fn events(&self) -> Option<Arc<dyn HubEvents>> {
        self.events.read().clone()
    }

    /// This hub's instance identity.
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Number of locally attached bots.
    pub fn attached_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the bot is attached to this instance.
    pub fn is_attached_locally(&self, bot_id: BotId) -> bool {
        self.connections
            .get(&bot_id)
            .map(|a| a.conn.is_open())
            .unwrap_or(false)
    }

    /// Whether the bot holds an attachment record on any instance.
    ///
    /// This is the matchmaker's liveness predicate.
    pub async fn is_attached_anywhere(&self, bot_id: BotId) -> bool {
        if self.is_attached_locally(bot_id) {
            return true;
        }
        matches!(self.kv.get(&keys::attachment_key(bot_id)).await, Ok(Some(_)))
    }

    /// Attach a connection presenting a connect token.
    ///
    /// Resolves the token to a bot, replaces any prior local attachment
    /// (closing it with code 4003), records the attachment in KV, and sends
    /// the welcome envelope. On a bad token the connection is closed with
    /// code 4002 and `InvalidToken` is returned.
    pub async fn attach(&self, token: &str, conn: Arc<dyn BotConnection>) -> Result<AttachHandle> {
        let bot = match self.bots.resolve_token(token).await? {
            Some(bot) => bot,
            None => {
                conn.close(CLOSE_BAD_TOKEN, "invalid token").await;
                return Err(Error::InvalidToken);
            }
        };

        // The previous holder must observe its replacement before the new
        // connection is recorded.
        if let Some((_, previous)) = self.connections.remove(&bot.id) {
            previous.conn.close(CLOSE_REPLACED, "replaced").await;
            debug!(target: "agora::transport", bot_id = %bot.id, "replaced existing attachment");
        }

        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed) + 1;
        self.connections.insert(
            bot.id,
            Attached {
                conn: Arc::clone(&conn),
                bot: bot.clone(),
                epoch,
            },
        );

        self.kv
            .set(
                &keys::attachment_key(bot.id),
                self.instance_id.as_str(),
                Some(self.attachment_ttl),
            )
            .await?;

        conn.send(&ServerToBot::Connected {
            bot_id: bot.id,
            bot_name: bot.name.clone(),
        })
        .await?;

        info!(target: "agora::transport", bot_id = %bot.id, name = %bot.name, "bot attached");
        Ok(AttachHandle { bot, epoch })
    }

    /// Handle a connection close.
    ///
    /// Removes the attachment only if the closing connection is still the
    /// current one; a replaced connection's late close must not detach its
    /// successor. Deletes the KV record (value-checked, in case the bot has
    /// already reattached elsewhere) and notifies the event handler so the
    /// bot leaves the matchmaking queue.
    pub async fn detach(&self, bot_id: BotId, epoch: u64) {
        let removed = self
            .connections
            .remove_if(&bot_id, |_, attached| attached.epoch == epoch);
        if removed.is_none() {
            return;
        }

        if let Err(e) = self
            .kv
            .delete_if_eq(&keys::attachment_key(bot_id), self.instance_id.as_str())
            .await
        {
            warn!(target: "agora::transport", bot_id = %bot_id, error = %e, "failed to clear attachment record");
        }

        if let Some(events) = self.events() {
            events.bot_disconnected(bot_id).await;
        }
        info!(target: "agora::transport", bot_id = %bot_id, "bot detached");
    }

    fn next_request_id(&self, bot_id: BotId) -> RequestId {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::compose(
            &self.instance_id,
            &bot_id,
            chrono::Utc::now().timestamp_millis(),
            counter,
        )
    }

    /// Send a turn request to a bot and wait for its validated reply.
    ///
    /// `request.request_id` is assigned here. Every call resolves exactly
    /// once: with a reply, a validation failure, a transport failure, or a
    /// timeout.
    pub async fn request(
        &self,
        bot_id: BotId,
        mut request: DebateRequest,
        timeout: Duration,
    ) -> Result<BotReply> {
        let request_id = self.next_request_id(bot_id);
        request.request_id = request_id.clone();

        if self.is_attached_locally(bot_id) {
            return self.send_local(bot_id, request_id, request, timeout).await;
        }

        match self.kv.get(&keys::attachment_key(bot_id)).await? {
            Some(instance) if instance != self.instance_id.as_str() => {
                self.send_cross_instance(
                    bot_id,
                    request_id,
                    request,
                    timeout,
                    InstanceId::new(instance),
                )
                .await
            }
            // A record naming this instance with no live local connection is
            // stale; treat it the same as no record.
            _ => Err(Error::BotNotConnected(bot_id)),
        }
    }

    async fn send_local(
        &self,
        bot_id: BotId,
        request_id: RequestId,
        request: DebateRequest,
        timeout: Duration,
    ) -> Result<BotReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        // Clone the connection out so no map guard is held across the send.
        let conn = self.connections.get(&bot_id).map(|a| Arc::clone(&a.conn));
        let sent = match conn {
            Some(conn) => conn.send(&ServerToBot::DebateRequest(request)).await,
            None => Err(Error::BotNotConnected(bot_id)),
        };
        if let Err(e) = sent {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Sender dropped without resolving; treat as transport loss.
                self.pending.remove(&request_id);
                Err(Error::BotTransport("reply channel closed".into()))
            }
            Err(_) => {
                self.pending.remove(&request_id);
                Err(Error::BotTimeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn send_cross_instance(
        &self,
        bot_id: BotId,
        request_id: RequestId,
        request: DebateRequest,
        timeout: Duration,
        target: InstanceId,
    ) -> Result<BotReply> {
        // Subscribe before publishing: the peer may answer immediately.
        let mut replies = self
            .bus
            .subscribe(&keys::response_channel(&request_id))
            .await?;

        let envelope = InstanceMessage::BotRequest {
            request_id: request_id.clone(),
            bot_id,
            request,
            timeout_ms: timeout.as_millis() as u64,
            source_instance: self.instance_id.clone(),
        };
        let payload = serde_json::to_string(&envelope)?;
        self.bus
            .publish(&keys::instance_channel(&target), &payload)
            .await?;

        debug!(
            target: "agora::transport",
            bot_id = %bot_id,
            request_id = %request_id,
            peer = %target,
            "request forwarded cross-instance"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let raw = match tokio::time::timeout_at(deadline, replies.recv()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return Err(Error::BotTransport("reply channel closed".into())),
                Err(_) => return Err(Error::BotTimeout(timeout.as_millis() as u64)),
            };
            match serde_json::from_str::<ResponseMessage>(&raw) {
                Ok(ResponseMessage::Response {
                    message,
                    confidence,
                    ..
                }) => return BotReply::validate(message, confidence),
                Ok(ResponseMessage::Error { message, .. }) => {
                    return Err(Error::BotTransport(message))
                }
                Err(e) => {
                    warn!(target: "agora::transport", request_id = %request_id, error = %e, "malformed reply envelope dropped");
                }
            }
        }
    }

    /// Handle one raw inbound envelope from an attached bot.
    ///
    /// Malformed envelopes are logged and dropped.
    pub async fn handle_inbound(&self, bot_id: BotId, raw: &str) {
        let envelope = match serde_json::from_str::<BotToServer>(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(target: "agora::transport", bot_id = %bot_id, error = %e, "malformed inbound envelope dropped");
                return;
            }
        };

        match envelope {
            BotToServer::Pong => {
                let _ = self
                    .kv
                    .expire(&keys::attachment_key(bot_id), self.attachment_ttl)
                    .await;
            }
            BotToServer::DebateResponse {
                request_id,
                message,
                confidence,
            } => {
                self.route_reply(request_id, BotReply::validate(message, confidence))
                    .await;
            }
            BotToServer::QueueJoin { stake, preset_id } => {
                let bot = self.connections.get(&bot_id).map(|a| a.bot.clone());
                match (bot, self.events()) {
                    (Some(bot), Some(events)) => events.queue_join(&bot, stake, preset_id).await,
                    _ => {
                        warn!(target: "agora::transport", bot_id = %bot_id, "queue_join from unattached bot dropped")
                    }
                }
            }
            BotToServer::QueueLeave => {
                if let Some(events) = self.events() {
                    events.queue_leave(bot_id).await;
                }
            }
        }
    }

    /// Resolve a reply locally, or relay it to the instance that forwarded
    /// the request here.
    async fn route_reply(&self, request_id: RequestId, reply: Result<BotReply>) {
        if let Some((_, tx)) = self.pending.remove(&request_id) {
            // A resolved-but-dropped receiver means the request timed out
            // concurrently; nothing left to do.
            let _ = tx.send(reply);
            return;
        }

        // Not ours: this bot answered a request forwarded by a peer.
        let response = match reply {
            Ok(reply) => ResponseMessage::Response {
                request_id: request_id.clone(),
                message: reply.message,
                confidence: reply.confidence,
            },
            Err(e) => ResponseMessage::Error {
                request_id: request_id.clone(),
                message: e.to_string(),
            },
        };
        match serde_json::to_string(&response) {
            Ok(payload) => {
                if let Err(e) = self
                    .bus
                    .publish(&keys::response_channel(&request_id), &payload)
                    .await
                {
                    warn!(target: "agora::transport", request_id = %request_id, error = %e, "failed to relay reply");
                }
            }
            Err(e) => {
                warn!(target: "agora::transport", request_id = %request_id, error = %e, "failed to encode reply");
            }
        }
    }

    /// Notify a bot of its contest result, wherever it is attached.
    ///
    /// Best-effort: an unattached bot simply misses the notification.
    pub async fn notify_debate_complete(&self, bot_id: BotId, envelope: ServerToBot) -> Result<()> {
        let conn = self.connections.get(&bot_id).map(|a| Arc::clone(&a.conn));
        if let Some(conn) = conn {
            return conn.send(&envelope).await;
        }
        if let Some(instance) = self.kv.get(&keys::attachment_key(bot_id)).await? {
            if instance != self.instance_id.as_str() {
                let message = InstanceMessage::DebateComplete { bot_id, envelope };
                let payload = serde_json::to_string(&message)?;
                self.bus
                    .publish(&keys::instance_channel(&InstanceId::new(instance)), &payload)
                    .await?;
            }
        }
        Ok(())
    }

    /// One heartbeat pass: prune dead transports, ping the rest, refresh
    /// attachment TTLs.
    pub async fn heartbeat_once(&self) {
        let mut dead = Vec::new();
        let mut live = Vec::new();
        for entry in self.connections.iter() {
            if entry.conn.is_open() {
                live.push((*entry.key(), entry.epoch));
            } else {
                dead.push((*entry.key(), entry.epoch));
            }
        }

        for (bot_id, epoch) in dead {
            self.detach(bot_id, epoch).await;
        }

        for (bot_id, epoch) in live {
            let conn = match self.connections.get(&bot_id) {
                Some(attached) if attached.epoch == epoch => Arc::clone(&attached.conn),
                _ => continue,
            };
            match conn.send(&ServerToBot::Ping).await {
                Ok(()) => {
                    let _ = self
                        .kv
                        .set(
                            &keys::attachment_key(bot_id),
                            self.instance_id.as_str(),
                            Some(self.attachment_ttl),
                        )
                        .await;
                }
                Err(_) => self.detach(bot_id, epoch).await,
            }
        }
    }

    /// Run periodic heartbeats until shutdown.
    pub async fn run_heartbeats(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.heartbeat_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.heartbeat_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(target: "agora::transport", "heartbeat loop stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Listen on this instance's private channel for forwarded bot traffic.
    ///
    /// Runs until shutdown. Forwarded requests are delivered to the local
    /// connection under their original request id; the generic reply path
    /// relays the answer back on the per-request channel. Requests for bots
    /// no longer attached here fail immediately on that same channel.
    pub async fn run_instance_listener(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let channel = keys::instance_channel(&self.instance_id);
        let mut sub = match self.bus.subscribe(&channel).await {
            Ok(sub) => sub,
            Err(e) => {
                warn!(target: "agora::transport", error = %e, "failed to subscribe to instance channel");
                return;
            }
        };
        loop {
            tokio::select! {
                raw = sub.recv() => {
                    match raw {
                        Some(raw) => self.handle_instance_message(&raw).await,
                        None => {
                            warn!(target: "agora::transport", "instance channel closed");
                            return;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(target: "agora::transport", "instance listener stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn handle_instance_message(&self, raw: &str) {
        let message = match serde_json::from_str::<InstanceMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(target: "agora::transport", error = %e, "malformed instance message dropped");
                return;
            }
        };

        match message {
            InstanceMessage::BotRequest {
                request_id,
                bot_id,
                request,
                source_instance,
                ..
            } => {
                debug!(
                    target: "agora::transport",
                    bot_id = %bot_id,
                    request_id = %request_id,
                    source = %source_instance,
                    "forwarded request received"
                );
                let conn = self
                    .connections
                    .get(&bot_id)
                    .filter(|a| a.conn.is_open())
                    .map(|a| Arc::clone(&a.conn));
                let delivered = match conn {
                    Some(conn) => conn.send(&ServerToBot::DebateRequest(request)).await,
                    None => Err(Error::BotNotConnected(bot_id)),
                };
                if let Err(e) = delivered {
                    let error = ResponseMessage::Error {
                        request_id: request_id.clone(),
                        message: e.to_string(),
                    };
                    if let Ok(payload) = serde_json::to_string(&error) {
                        let _ = self
                            .bus
                            .publish(&keys::response_channel(&request_id), &payload)
                            .await;
                    }
                }
            }
            InstanceMessage::DebateComplete { bot_id, envelope } => {
                let conn = self.connections.get(&bot_id).map(|a| Arc::clone(&a.conn));
                if let Some(conn) = conn {
                    if let Err(e) = conn.send(&envelope).await {
                        warn!(target: "agora::transport", bot_id = %bot_id, error = %e, "failed to deliver completion");
                    }
                }
            }
        }
    }
}
