//! Live leave collection: the latest full snapshot of `leave_requests`, pushed
//! to subscribers whenever a write goes through.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use sqlx::MySqlPool;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::leave::aggregate::RecordScope;
use crate::model::leave_record::{LeaveRecord, LeaveRow, LeaveStatus};

pub type Snapshot = Arc<Vec<LeaveRecord>>;

/// Current-snapshot plus change-notification view of the leave store.
pub trait LeaveSnapshotSource {
    fn snapshot(&self) -> Snapshot;
    fn subscribe(&self) -> watch::Receiver<Snapshot>;
}

pub struct LeaveFeed {
    tx: watch::Sender<Snapshot>,
    /// Held from load to publish so an older load never overwrites a newer one.
    refresh_lock: Mutex<()>,
}

impl Default for LeaveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaveFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            tx,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Replaces the snapshot and wakes every subscriber.
    pub fn publish(&self, records: Vec<LeaveRecord>) {
        self.tx.send_replace(Arc::new(records));
    }

    /// Reloads the whole table and publishes it. Returns the record count.
    pub async fn refresh(&self, pool: &MySqlPool) -> Result<usize, sqlx::Error> {
        self.refresh_with(|| load_all(pool)).await
    }

    /// Runs `load` and publishes its result, one refresh at a time.
    pub async fn refresh_with<F, Fut, E>(&self, load: F) -> Result<usize, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<LeaveRecord>, E>>,
    {
        let _guard = self.refresh_lock.lock().await;
        let records = load().await?;
        let count = records.len();
        self.publish(records);
        Ok(count)
    }

    /// Refresh after a write; a failure leaves the previous snapshot in place.
    pub async fn refresh_after_write(&self, pool: &MySqlPool) {
        if let Err(e) = self.refresh(pool).await {
            warn!(error = %e, "leave snapshot refresh failed");
        }
    }
}

impl LeaveSnapshotSource for LeaveFeed {
    fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }
}

async fn load_all(pool: &MySqlPool) -> Result<Vec<LeaveRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LeaveRow>(
        r#"
        SELECT id, employee_name, leave_categories, start_date, end_date, status, created_at
        FROM leave_requests
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            LeaveRecord::try_from(row)
                .map_err(|e| warn!(error = %e, leave_id = id, "skipping leave row with bad status"))
                .ok()
        })
        .collect())
}

/// Warm the feed at startup so the first request sees data.
pub async fn warmup_leave_feed(feed: &LeaveFeed, pool: &MySqlPool) -> anyhow::Result<()> {
    let count = feed.refresh(pool).await?;
    info!(count, "Leave feed warmup complete");
    Ok(())
}

/// Counts pushed to `/leave/events` subscribers.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FeedStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl FeedStats {
    pub fn from_records(records: &[LeaveRecord], scope: &RecordScope) -> Self {
        records
            .iter()
            .filter(|r| scope.admits(r))
            .fold(FeedStats::default(), |mut stats, r| {
                match r.status {
                    LeaveStatus::Pending => stats.pending += 1,
                    LeaveStatus::Approved => stats.approved += 1,
                    LeaveStatus::Rejected => stats.rejected += 1,
                }
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: u64, name: &str, status: LeaveStatus) -> LeaveRecord {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        LeaveRecord {
            id,
            employee_name: name.into(),
            leave_categories: vec!["Sick".into()],
            start_date: day,
            end_date: day,
            status,
            created_at: None,
        }
    }

    #[actix_web::test]
    async fn subscribers_see_each_published_snapshot() {
        let feed = LeaveFeed::new();
        let mut rx = feed.subscribe();
        assert!(feed.snapshot().is_empty());

        feed.publish(vec![record(1, "Ayu", LeaveStatus::Pending)]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        feed.publish(vec![
            record(1, "Ayu", LeaveStatus::Approved),
            record(2, "Wayan", LeaveStatus::Pending),
        ]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(feed.snapshot()[0].status, LeaveStatus::Approved);
    }

    #[actix_web::test]
    async fn overlapping_refreshes_publish_in_load_order() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let feed = LeaveFeed::new();
        let loads = AtomicU64::new(0);

        // the first load is slow; without serialization it would publish last
        let load = |yields: usize| {
            let loads = &loads;
            move || async move {
                let id = loads.fetch_add(1, Ordering::SeqCst) + 1;
                for _ in 0..yields {
                    tokio::task::yield_now().await;
                }
                Ok::<_, sqlx::Error>(vec![record(id, "Ayu", LeaveStatus::Pending)])
            }
        };

        let (slow, fast) = futures::join!(feed.refresh_with(load(8)), feed.refresh_with(load(1)));
        assert_eq!(slow.unwrap(), 1);
        assert_eq!(fast.unwrap(), 1);
        assert_eq!(feed.snapshot()[0].id, 2);
    }

    #[actix_web::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let feed = LeaveFeed::new();
        feed.publish(vec![record(3, "Ayu", LeaveStatus::Pending)]);
        let res = feed
            .refresh_with(|| async { Err::<Vec<LeaveRecord>, _>(sqlx::Error::RowNotFound) })
            .await;
        assert!(res.is_err());
        assert_eq!(feed.snapshot()[0].id, 3);
    }

    #[test]
    fn publish_without_subscribers_still_updates_snapshot() {
        let feed = LeaveFeed::default();
        feed.publish(vec![record(9, "Made", LeaveStatus::Rejected)]);
        assert_eq!(feed.snapshot()[0].id, 9);
    }

    #[test]
    fn stats_respect_scope() {
        let records = vec![
            record(1, "Ayu", LeaveStatus::Pending),
            record(2, "Ayu", LeaveStatus::Approved),
            record(3, "Wayan", LeaveStatus::Pending),
            record(4, "Wayan", LeaveStatus::Rejected),
        ];
        assert_eq!(
            FeedStats::from_records(&records, &RecordScope::All),
            FeedStats { pending: 2, approved: 1, rejected: 1 }
        );
        assert_eq!(
            FeedStats::from_records(&records, &RecordScope::Own("Wayan".into())),
            FeedStats { pending: 1, approved: 0, rejected: 1 }
        );
    }
}
