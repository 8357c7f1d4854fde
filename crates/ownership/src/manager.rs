//! Lease, lock, and reconciliation primitives

use agora_core::{Config, ContestId, InstanceId, Result};
use agora_repo::ContestRepository;
use agora_store::{keys, KvStore};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Ownership tunables, extracted from the instance [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct OwnershipConfig {
    /// Lease TTL.
    pub ownership_ttl: Duration,
    /// Refresh period for held leases.
    pub refresh_period: Duration,
    /// Unowned-contest sweep period.
    pub sweep_period: Duration,
    /// Recovery lock TTL.
    pub lock_ttl: Duration,
    /// Heartbeat age past which an in-progress contest counts as stuck.
    pub stuck_after: chrono::Duration,
}

impl OwnershipConfig {
    /// Extract the ownership tunables from an instance config.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            ownership_ttl: cfg.ownership_ttl(),
            refresh_period: cfg.ownership_refresh(),
            sweep_period: cfg.unowned_sweep(),
            lock_ttl: cfg.recovery_lock_ttl(),
            stuck_after: chrono::Duration::seconds(cfg.stuck_after_secs as i64),
        }
    }
}

/// The orchestrator surface the ownership manager drives.
///
/// Implemented by the contest engine; keeps this crate free of a dependency
/// on it.
#[async_trait]
pub trait ContestHost: Send + Sync {
    /// Contests currently active in memory on this instance.
    fn active_contests(&self) -> Vec<ContestId>;

    /// Whether a contest is active in memory on this instance.
    fn is_active(&self, contest: ContestId) -> bool;

    /// Re-hydrate and resume a contest this instance just claimed.
    ///
    /// Returns false when there is nothing to recover (already terminal or
    /// missing). The claim is released by the caller on `false` or on error.
    async fn recover(&self, contest: ContestId) -> Result<bool>;
}

/// A held recovery lock. Must be released explicitly on every path.
///
/// Release verifies the stored value, so an expired lock that another
/// instance re-acquired is never deleted from under it.
pub struct RecoveryLockGuard {
    kv: Arc<dyn KvStore>,
    contest: ContestId,
    value: String,
    held: Arc<DashMap<ContestId, String>>,
}

impl RecoveryLockGuard {
    /// Release the lock if this instance still holds it.
    pub async fn release(self) {
        self.held.remove(&self.contest);
        match self
            .kv
            .delete_if_eq(&keys::recovery_lock_key(self.contest), &self.value)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    target: "agora::ownership",
                    contest_id = %self.contest,
                    "recovery lock already expired"
                );
            }
            Err(e) => {
                warn!(
                    target: "agora::ownership",
                    contest_id = %self.contest,
                    error = %e,
                    "failed to release recovery lock"
                );
            }
        }
    }
}

/// Manages this instance's leases, locks, and reconciliation sweeps.
pub struct OwnershipManager {
    kv: Arc<dyn KvStore>,
    contests: Arc<dyn ContestRepository>,
    instance_id: InstanceId,
    cfg: OwnershipConfig,
    held_locks: Arc<DashMap<ContestId, String>>,
}

impl OwnershipManager {
    /// Create the manager for this instance.
    pub fn new(
        kv: Arc<dyn KvStore>,
        contests: Arc<dyn ContestRepository>,
        instance_id: InstanceId,
        cfg: OwnershipConfig,
    ) -> Self {
        Self {
            kv,
            contests,
            instance_id,
            cfg,
            held_locks: Arc::new(DashMap::new()),
        }
    }

    /// Try to claim the ownership lease for a contest.
    ///
    /// Succeeds only if no (unexpired) lease exists.
    pub async fn claim(&self, contest: ContestId) -> Result<bool> {
        let claimed = self
            .kv
            .set_nx(
                &keys::owner_key(contest),
                self.instance_id.as_str(),
                self.cfg.ownership_ttl,
            )
            .await?;
        if claimed {
            info!(target: "agora::ownership", contest_id = %contest, "ownership claimed");
        }
        Ok(claimed)
    }

    /// Release the ownership lease if this instance holds it.
    pub async fn release(&self, contest: ContestId) -> Result<()> {
        let released = self
            .kv
            .delete_if_eq(&keys::owner_key(contest), self.instance_id.as_str())
            .await?;
        if released {
            info!(target: "agora::ownership", contest_id = %contest, "ownership released");
        }
        Ok(())
    }

    /// Which instance currently owns a contest, if any.
    pub async fn owner_of(&self, contest: ContestId) -> Result<Option<InstanceId>> {
        Ok(self
            .kv
            .get(&keys::owner_key(contest))
            .await?
            .map(InstanceId::new))
    }

    /// One refresh pass: extend the lease and bump the heartbeat for every
    /// contest still active (and still owned) here.
    pub async fn refresh_once(&self, active: &[ContestId]) {
        for &contest in active {
            match self.kv.get(&keys::owner_key(contest)).await {
                Ok(Some(owner)) if owner == self.instance_id.as_str() => {
                    if let Err(e) = self
                        .kv
                        .expire(&keys::owner_key(contest), self.cfg.ownership_ttl)
                        .await
                    {
                        warn!(target: "agora::ownership", contest_id = %contest, error = %e, "lease refresh failed");
                    }
                    if let Err(e) = self
                        .contests
                        .touch_heartbeat(contest, chrono::Utc::now())
                        .await
                    {
                        warn!(target: "agora::ownership", contest_id = %contest, error = %e, "heartbeat update failed");
                    }
                }
                Ok(_) => {
                    // Lease lost or taken over; the run task will notice on
                    // its next durable write.
                    warn!(target: "agora::ownership", contest_id = %contest, "active contest no longer owned here");
                }
                Err(e) => {
                    warn!(target: "agora::ownership", contest_id = %contest, error = %e, "lease read failed");
                }
            }
        }
    }

    /// Acquire the recovery lock for a contest.
    ///
    /// Returns `None` when another instance holds it. The guard must be
    /// released on every path; TTL expiry is only the crash backstop.
    pub async fn recovery_lock(&self, contest: ContestId) -> Result<Option<RecoveryLockGuard>> {
        let value = format!("{}-{:016x}", self.instance_id, rand::thread_rng().next_u64());
        let acquired = self
            .kv
            .set_nx(&keys::recovery_lock_key(contest), &value, self.cfg.lock_ttl)
            .await?;
        if !acquired {
            return Ok(None);
        }
        self.held_locks.insert(contest, value.clone());
        Ok(Some(RecoveryLockGuard {
            kv: Arc::clone(&self.kv),
            contest,
            value,
            held: Arc::clone(&self.held_locks),
        }))
    }

    /// Startup reconciliation: adopt contests whose owner died mid-run.
    ///
    /// A contest counts as stuck when it is still active but its heartbeat
    /// is older than the configured threshold. For each, claim and recover;
    /// a claim that recovers nothing is released so the row can settle.
    pub async fn startup_recovery(&self, host: &Arc<dyn ContestHost>) -> Result<()> {
        let cutoff = chrono::Utc::now() - self.cfg.stuck_after;
        let stuck: Vec<ContestId> = self
            .contests
            .list_active()
            .await?
            .into_iter()
            .filter(|c| c.heartbeat_at < cutoff)
            .map(|c| c.id)
            .collect();

        if stuck.is_empty() {
            debug!(target: "agora::ownership", "startup recovery: nothing stuck");
            return Ok(());
        }
        info!(target: "agora::ownership", count = stuck.len(), "startup recovery: adopting stuck contests");

        for contest in stuck {
            if !self.claim(contest).await? {
                continue;
            }
            match host.recover(contest).await {
                Ok(true) => {
                    info!(target: "agora::ownership", contest_id = %contest, "recovered at startup");
                }
                Ok(false) => {
                    self.release(contest).await?;
                }
                Err(e) => {
                    warn!(target: "agora::ownership", contest_id = %contest, error = %e, "startup recovery failed");
                    self.release(contest).await?;
                }
            }
        }
        Ok(())
    }

    /// One unowned sweep: adopt active contests whose lease has expired.
    ///
    /// The owner key is re-checked under the recovery lock, so two sweeping
    /// instances cannot both claim the same contest.
    pub async fn unowned_sweep_once(&self, host: &Arc<dyn ContestHost>) {
        let active = match self.contests.list_active().await {
            Ok(active) => active,
            Err(e) => {
                warn!(target: "agora::ownership", error = %e, "unowned sweep: contest listing failed");
                return;
            }
        };

        for contest in active {
            if host.is_active(contest.id) {
                continue;
            }
            match self.kv.get(&keys::owner_key(contest.id)).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "agora::ownership", contest_id = %contest.id, error = %e, "unowned sweep: lease read failed");
                    continue;
                }
            }

            let guard = match self.recovery_lock(contest.id).await {
                Ok(Some(guard)) => guard,
                Ok(None) => continue,
                Err(e) => {
                    warn!(target: "agora::ownership", contest_id = %contest.id, error = %e, "unowned sweep: lock failed");
                    continue;
                }
            };

            // Re-check under the lock: someone may have claimed between our
            // read and the lock acquisition.
            let still_unowned = matches!(self.kv.get(&keys::owner_key(contest.id)).await, Ok(None));
            if still_unowned {
                match self.claim(contest.id).await {
                    Ok(true) => match host.recover(contest.id).await {
                        Ok(true) => {
                            info!(target: "agora::ownership", contest_id = %contest.id, "adopted unowned contest");
                        }
                        Ok(false) => {
                            let _ = self.release(contest.id).await;
                        }
                        Err(e) => {
                            warn!(target: "agora::ownership", contest_id = %contest.id, error = %e, "adoption failed");
                            let _ = self.release(contest.id).await;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        warn!(target: "agora::ownership", contest_id = %contest.id, error = %e, "claim failed");
                    }
                }
            }
            guard.release().await;
        }
    }

    /// Run the lease refresh loop until shutdown.
    pub async fn run_refresh(
        self: Arc<Self>,
        host: Arc<dyn ContestHost>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.cfg.refresh_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let active = host.active_contests();
                    self.refresh_once(&active).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(target: "agora::ownership", "refresh loop stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Run the unowned sweep loop until shutdown.
    pub async fn run_unowned_sweep(
        self: Arc<Self>,
        host: Arc<dyn ContestHost>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.cfg.sweep_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.unowned_sweep_once(&host).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(target: "agora::ownership", "unowned sweep stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Shutdown release: drop every lease and outstanding recovery lock so a
    /// peer can adopt without waiting out the TTLs.
    pub async fn release_all(&self, active: &[ContestId]) {
        for &contest in active {
            if let Err(e) = self.release(contest).await {
                warn!(target: "agora::ownership", contest_id = %contest, error = %e, "shutdown release failed");
            }
        }
        let locks: Vec<(ContestId, String)> = self
            .held_locks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (contest, value) in locks {
            self.held_locks.remove(&contest);
            let _ = self
                .kv
                .delete_if_eq(&keys::recovery_lock_key(contest), &value)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{BotId, Contest, PresetId, TopicId};
    use agora_repo::MemoryStore;
    use agora_store::MemoryKv;
    use parking_lot::Mutex;

    fn test_cfg() -> OwnershipConfig {
        OwnershipConfig::from_config(&Config::for_instance("test"))
    }

    fn manager(kv: &Arc<MemoryKv>, store: &Arc<MemoryStore>, instance: &str) -> OwnershipManager {
        OwnershipManager::new(
            Arc::clone(kv) as Arc<dyn KvStore>,
            Arc::clone(store) as Arc<dyn ContestRepository>,
            InstanceId::new(instance),
            test_cfg(),
        )
    }

    /// Host stub recording recover() calls.
    struct StubHost {
        active: Mutex<Vec<ContestId>>,
        recovered: Mutex<Vec<ContestId>>,
        recover_result: bool,
    }

    impl StubHost {
        fn new(recover_result: bool) -> Arc<Self> {
            Arc::new(Self {
                active: Mutex::new(Vec::new()),
                recovered: Mutex::new(Vec::new()),
                recover_result,
            })
        }
    }

    fn as_host(stub: &Arc<StubHost>) -> Arc<dyn ContestHost> {
        Arc::clone(stub) as Arc<dyn ContestHost>
    }

    #[async_trait]
    impl ContestHost for StubHost {
        fn active_contests(&self) -> Vec<ContestId> {
            self.active.lock().clone()
        }

        fn is_active(&self, contest: ContestId) -> bool {
            self.active.lock().contains(&contest)
        }

        async fn recover(&self, contest: ContestId) -> Result<bool> {
            self.recovered.lock().push(contest);
            Ok(self.recover_result)
        }
    }

    async fn seed_running_contest(store: &Arc<MemoryStore>) -> Contest {
        let contest = Contest::new(
            BotId::new(),
            BotId::new(),
            TopicId::new(),
            PresetId::from("classic"),
            10,
        );
        ContestRepository::insert(&**store, &contest).await.unwrap();
        store
            .mark_started(contest.id, chrono::Utc::now())
            .await
            .unwrap();
        ContestRepository::fetch(&**store, contest.id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let a = manager(&kv, &store, "inst-a");
        let b = manager(&kv, &store, "inst-b");
        let contest = ContestId::new();

        assert!(a.claim(contest).await.unwrap());
        assert!(!b.claim(contest).await.unwrap());
        assert_eq!(
            a.owner_of(contest).await.unwrap(),
            Some(InstanceId::new("inst-a"))
        );
    }

    #[tokio::test]
    async fn test_release_only_own_lease() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let a = manager(&kv, &store, "inst-a");
        let b = manager(&kv, &store, "inst-b");
        let contest = ContestId::new();

        a.claim(contest).await.unwrap();
        // B releasing a lease it does not hold is a no-op
        b.release(contest).await.unwrap();
        assert!(a.owner_of(contest).await.unwrap().is_some());

        a.release(contest).await.unwrap();
        assert!(a.owner_of(contest).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires_without_refresh() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let a = manager(&kv, &store, "inst-a");
        let b = manager(&kv, &store, "inst-b");
        let contest = ContestId::new();

        a.claim(contest).await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(a.owner_of(contest).await.unwrap().is_none());
        assert!(b.claim(contest).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_extends_lease() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;
        let a = manager(&kv, &store, "inst-a");

        a.claim(contest.id).await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;
        a.refresh_once(&[contest.id]).await;
        // The refresh rewound the lease deadline to a full TTL
        assert_eq!(
            kv.ttl(&keys::owner_key(contest.id)).await.unwrap(),
            Some(Duration::from_secs(300))
        );
        tokio::time::advance(Duration::from_secs(200)).await;
        // 400 s since claim, but only 200 s since refresh: still owned
        assert_eq!(
            a.owner_of(contest.id).await.unwrap(),
            Some(InstanceId::new("inst-a"))
        );
    }

    #[tokio::test]
    async fn test_recovery_lock_serializes() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let a = manager(&kv, &store, "inst-a");
        let b = manager(&kv, &store, "inst-b");
        let contest = ContestId::new();

        let guard = a.recovery_lock(contest).await.unwrap().unwrap();
        assert!(b.recovery_lock(contest).await.unwrap().is_none());
        guard.release().await;
        assert!(b.recovery_lock(contest).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_startup_recovery_adopts_stale_contest() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;
        // Age the heartbeat past the stuck threshold
        store
            .touch_heartbeat(
                contest.id,
                chrono::Utc::now() - chrono::Duration::seconds(600),
            )
            .await
            .unwrap();

        let a = manager(&kv, &store, "inst-a");
        let host = StubHost::new(true);
        a.startup_recovery(&as_host(&host)).await.unwrap();

        assert_eq!(host.recovered.lock().as_slice(), &[contest.id]);
        // Recovery succeeded, so the claim is kept
        assert_eq!(
            a.owner_of(contest.id).await.unwrap(),
            Some(InstanceId::new("inst-a"))
        );
    }

    #[tokio::test]
    async fn test_startup_recovery_skips_fresh_heartbeat() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let _contest = seed_running_contest(&store).await;

        let a = manager(&kv, &store, "inst-a");
        let host = StubHost::new(true);
        a.startup_recovery(&as_host(&host)).await.unwrap();
        assert!(host.recovered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_startup_recovery_releases_on_nothing_to_recover() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;
        store
            .touch_heartbeat(
                contest.id,
                chrono::Utc::now() - chrono::Duration::seconds(600),
            )
            .await
            .unwrap();

        let a = manager(&kv, &store, "inst-a");
        let host = StubHost::new(false);
        a.startup_recovery(&as_host(&host)).await.unwrap();
        assert!(a.owner_of(contest.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unowned_sweep_adopts_and_releases_lock() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;

        let b = manager(&kv, &store, "inst-b");
        let host = StubHost::new(true);
        b.unowned_sweep_once(&as_host(&host)).await;

        assert_eq!(host.recovered.lock().as_slice(), &[contest.id]);
        assert_eq!(
            b.owner_of(contest.id).await.unwrap(),
            Some(InstanceId::new("inst-b"))
        );
        // The recovery lock is gone on every path
        assert!(b.recovery_lock(contest.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unowned_sweep_skips_owned_contest() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;

        let a = manager(&kv, &store, "inst-a");
        a.claim(contest.id).await.unwrap();

        let b = manager(&kv, &store, "inst-b");
        let host = StubHost::new(true);
        b.unowned_sweep_once(&as_host(&host)).await;
        assert!(host.recovered.lock().is_empty());
        assert_eq!(
            b.owner_of(contest.id).await.unwrap(),
            Some(InstanceId::new("inst-a"))
        );
    }

    #[tokio::test]
    async fn test_unowned_sweep_skips_locally_active() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let contest = seed_running_contest(&store).await;

        let a = manager(&kv, &store, "inst-a");
        let host = StubHost::new(true);
        host.active.lock().push(contest.id);
        a.unowned_sweep_once(&as_host(&host)).await;
        assert!(host.recovered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_release_all_clears_leases_and_locks() {
        let kv = MemoryKv::shared();
        let store = MemoryStore::shared();
        let a = manager(&kv, &store, "inst-a");
        let c1 = ContestId::new();
        let c2 = ContestId::new();

        a.claim(c1).await.unwrap();
        a.claim(c2).await.unwrap();
        let _held = a.recovery_lock(c1).await.unwrap().unwrap();

        a.release_all(&[c1, c2]).await;
        assert!(a.owner_of(c1).await.unwrap().is_none());
        assert!(a.owner_of(c2).await.unwrap().is_none());

        // Lock was released too: a fresh acquisition succeeds
        let b = manager(&kv, &store, "inst-b");
        assert!(b.recovery_lock(c1).await.unwrap().is_some());
    }
}
