//! Live grid snapshot feed.
//!
//! [`LiveFeed`] is the single place committed cells are published to.
//! Stores call [`LiveFeed::publish`] as part of their commit path and
//! every subscriber observes the merged [`GridSnapshot`].
//!
//! The feed is built on [`tokio::sync::watch`]: a subscriber only ever
//! holds the latest snapshot, so a slow consumer sees intermediate commits
//! coalesced into one delivery and the publisher never waits on anyone.
//! Snapshots only grow (see [`GridSnapshot::merge`]), which keeps every
//! subscriber's sequence monotone regardless of how much was coalesced.

use std::sync::Arc;

use mosaic_types::{Cell, GridSnapshot, SubscriptionId};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Publisher side of the grid snapshot feed.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: Arc<watch::Sender<GridSnapshot>>,
}

impl LiveFeed {
    /// Create a feed for an empty `width` x `height` grid.
    pub fn new(width: u32, height: u32) -> Self {
        let (tx, _rx) = watch::channel(GridSnapshot::empty(width, height));
        Self { tx: Arc::new(tx) }
    }

    /// Merge committed cells into the current snapshot and notify
    /// subscribers if anything was added.
    ///
    /// Cells already present at their coordinate are ignored, so
    /// republishing a full reload is harmless. Returns the number of cells
    /// that were new to the feed.
    pub fn publish<I>(&self, cells: I) -> usize
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut added: usize = 0;
        self.tx.send_if_modified(|snapshot| {
            added = snapshot.merge(cells);
            added > 0
        });
        if added > 0 {
            trace!(
                added,
                subscribers = self.tx.receiver_count(),
                "Published grid snapshot"
            );
        }
        added
    }

    /// A copy of the latest snapshot.
    pub fn current(&self) -> GridSnapshot {
        self.tx.borrow().clone()
    }

    /// Open a new subscription.
    ///
    /// The first call to [`Subscription::next`] resolves immediately with
    /// the full current state.
    pub fn subscribe(&self) -> Subscription {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        let id = SubscriptionId::new();
        debug!(%id, "Grid feed subscription opened");
        Subscription { id, rx }
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One observer's view of the feed.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// releases its receiver; the feed keeps no per-subscriber state beyond it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: watch::Receiver<GridSnapshot>,
}

impl Subscription {
    /// Identifier used in logs.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the feed has been dropped.
    pub async fn next(&mut self) -> Option<GridSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(self) {
        debug!(id = %self.id, "Grid feed subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mosaic_types::{Color, Coordinate, Identity};

    use super::*;

    fn cell(x: u32, y: u32) -> Cell {
        Cell::claim(
            Coordinate::new(x, y),
            Color::new("red"),
            Identity::new(format!("u-{x}-{y}")),
        )
    }

    #[tokio::test]
    async fn first_delivery_is_current_state() {
        let feed = LiveFeed::new(8, 8);
        feed.publish(vec![cell(1, 1), cell(2, 2)]);

        let mut sub = feed.subscribe();
        let first = sub.next().await;
        assert_eq!(first.map(|s| s.total_placed()), Some(2));
    }

    #[tokio::test]
    async fn subsequent_deliveries_reflect_new_cells() {
        let feed = LiveFeed::new(8, 8);
        let mut sub = feed.subscribe();
        assert_eq!(sub.next().await.map(|s| s.total_placed()), Some(0));

        feed.publish(vec![cell(0, 0)]);
        let next = sub.next().await;
        assert_eq!(next.map(|s| s.total_placed()), Some(1));
    }

    #[tokio::test]
    async fn slow_subscriber_sees_coalesced_latest() {
        let feed = LiveFeed::new(8, 8);
        let mut sub = feed.subscribe();
        let _ = sub.next().await;

        for x in 0..5 {
            feed.publish(vec![cell(x, 0)]);
        }

        let latest = sub.next().await;
        assert_eq!(latest.map(|s| s.total_placed()), Some(5));

        // Nothing further is pending after the coalesced delivery.
        let pending = tokio::time::timeout(Duration::from_millis(20), sub.next()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn duplicate_publish_does_not_notify() {
        let feed = LiveFeed::new(8, 8);
        let original = cell(3, 3);
        feed.publish(vec![original.clone()]);

        let mut sub = feed.subscribe();
        let _ = sub.next().await;

        let mut replacement = cell(3, 3);
        replacement.color = Color::new("blue");
        assert_eq!(feed.publish(vec![replacement]), 0);

        let pending = tokio::time::timeout(Duration::from_millis(20), sub.next()).await;
        assert!(pending.is_err());
        let kept = feed.current();
        assert_eq!(kept.get(Coordinate::new(3, 3)), Some(&original));
    }

    #[tokio::test]
    async fn unsubscribe_releases_receiver() {
        let feed = LiveFeed::new(4, 4);
        let a = feed.subscribe();
        let b = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);
        a.unsubscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(b);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn resubscribe_yields_full_state() {
        let feed = LiveFeed::new(4, 4);
        let sub = feed.subscribe();
        sub.unsubscribe();
        feed.publish(vec![cell(0, 0), cell(1, 0)]);
        feed.publish(vec![cell(2, 0)]);

        let mut again = feed.subscribe();
        let snap = again.next().await;
        assert_eq!(snap.as_ref().map(GridSnapshot::total_placed), Some(3));
        assert_eq!(snap.map(|s| s.version()), Some(2));
    }

    #[tokio::test]
    async fn snapshots_never_shrink() {
        let feed = LiveFeed::new(16, 16);
        let mut sub = feed.subscribe();
        let publisher = feed.clone();
        let task = tokio::spawn(async move {
            for x in 0..16 {
                publisher.publish(vec![cell(x, 1)]);
                tokio::task::yield_now().await;
            }
        });

        let mut last = 0;
        while last < 16 {
            let Some(snap) = sub.next().await else { break };
            assert!(snap.total_placed() >= last);
            last = snap.total_placed();
        }
        let _ = task.await;
        assert_eq!(last, 16);
    }

    #[test]
    fn out_of_order_publishes_converge() {
        let forward = LiveFeed::new(4, 4);
        forward.publish(vec![cell(0, 0)]);
        forward.publish(vec![cell(1, 0)]);

        let reversed = LiveFeed::new(4, 4);
        reversed.publish(vec![cell(1, 0)]);
        let after_first = reversed.current();
        reversed.publish(vec![cell(0, 0)]);
        let after_second = reversed.current();

        assert!(after_first.get(Coordinate::new(1, 0)).is_some());
        assert!(after_second.get(Coordinate::new(1, 0)).is_some());
        assert!(after_second.version() > after_first.version());

        let owners = |snap: &GridSnapshot| -> Vec<_> {
            snap.cells().map(|c| (c.coordinate, c.owner.clone())).collect()
        };
        let a = owners(&forward.current());
        let b = owners(&after_second);
        assert_eq!(a, b);
    }
}
