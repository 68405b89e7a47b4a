//! Audience presence tracking.
//!
//! Viewers announce themselves with periodic heartbeats. A viewer counts
//! as online until it leaves explicitly or its last heartbeat is older
//! than the configured TTL. A background sweeper drops expired entries so
//! the registry stays bounded by the number of live viewers.
//!
//! Presence is independent of placement: nothing here reads or writes the
//! grid store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mosaic_types::Identity;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

/// Who is currently watching the grid.
#[derive(Debug)]
pub struct PresenceRegistry {
    seen: RwLock<HashMap<Identity, Instant>>,
    ttl: Duration,
    max_reported: usize,
}

impl PresenceRegistry {
    /// Create an empty registry.
    ///
    /// `max_reported` caps the count returned by [`Self::online`].
    pub fn new(ttl: Duration, max_reported: usize) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            ttl,
            max_reported,
        }
    }

    /// Record a heartbeat for `identity`.
    pub async fn heartbeat(&self, identity: Identity) {
        self.heartbeat_at(identity, Instant::now()).await;
    }

    /// Record a heartbeat observed at `now`.
    pub async fn heartbeat_at(&self, identity: Identity, now: Instant) {
        self.seen.write().await.insert(identity, now);
    }

    /// Mark `identity` offline. Returns whether it was online.
    pub async fn leave(&self, identity: &Identity) -> bool {
        self.seen.write().await.remove(identity).is_some()
    }

    /// Number of viewers online, capped at the configured maximum.
    pub async fn online(&self) -> usize {
        self.online_at(Instant::now()).await
    }

    /// Number of viewers whose heartbeat is still fresh at `now`.
    pub async fn online_at(&self, now: Instant) -> usize {
        let seen = self.seen.read().await;
        let live = seen
            .values()
            .filter(|last| !self.expired(**last, now))
            .count();
        live.min(self.max_reported)
    }

    /// Drop every entry that expired by `now`. Returns how many were dropped.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut seen = self.seen.write().await;
        let before = seen.len();
        seen.retain(|_, last| !self.expired(*last, now));
        before.saturating_sub(seen.len())
    }

    /// Spawn a task that sweeps expired entries every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let dropped = registry.sweep_at(Instant::now()).await;
                if dropped > 0 {
                    debug!(dropped, "Expired presence entries swept");
                }
            }
        })
    }

    fn expired(&self, last: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last) > self.ttl
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn registry() -> PresenceRegistry {
        PresenceRegistry::new(Duration::from_secs(30), 200)
    }

    #[tokio::test]
    async fn heartbeat_then_leave() {
        let presence = registry();
        let now = Instant::now();
        presence.heartbeat_at(Identity::new("a"), now).await;
        presence.heartbeat_at(Identity::new("b"), now).await;
        assert_eq!(presence.online_at(now).await, 2);

        assert!(presence.leave(&Identity::new("a")).await);
        assert!(!presence.leave(&Identity::new("a")).await);
        assert_eq!(presence.online_at(now).await, 1);
    }

    #[tokio::test]
    async fn repeated_heartbeats_count_once() {
        let presence = registry();
        let now = Instant::now();
        for _ in 0..5 {
            presence.heartbeat_at(Identity::new("same"), now).await;
        }
        assert_eq!(presence.online_at(now).await, 1);
    }

    #[tokio::test]
    async fn stale_heartbeats_expire() {
        let presence = registry();
        let start = Instant::now();
        presence.heartbeat_at(Identity::new("old"), start).await;
        let later = start + Duration::from_secs(31);
        presence.heartbeat_at(Identity::new("new"), later).await;

        assert_eq!(presence.online_at(later).await, 1);
        assert_eq!(presence.sweep_at(later).await, 1);
        assert_eq!(presence.sweep_at(later).await, 0);
        assert_eq!(presence.online_at(later).await, 1);
    }

    #[tokio::test]
    async fn count_is_capped() {
        let presence = PresenceRegistry::new(Duration::from_secs(30), 3);
        let now = Instant::now();
        for i in 0..10 {
            presence.heartbeat_at(Identity::new(format!("v{i}")), now).await;
        }
        assert_eq!(presence.online_at(now).await, 3);
    }

    #[tokio::test]
    async fn sweeper_task_runs_and_aborts() {
        let presence = Arc::new(PresenceRegistry::new(Duration::ZERO, 200));
        let then = Instant::now();
        presence.heartbeat_at(Identity::new("gone"), then).await;

        let handle = presence.spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(presence.seen.read().await.is_empty());
    }
}
