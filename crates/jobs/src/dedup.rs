use std::time::Duration;

use moka::future::Cache;

/// Remembers which chat events have already been taken.
///
/// Bounded by capacity and by a time window. An event evicted from the window
/// would be processed again if redelivered.
pub struct Deduplicator {
    seen: Cache<String, ()>,
}

impl Deduplicator {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self { seen: Cache::builder().max_capacity(capacity).time_to_live(ttl).build() }
    }

    /// Record `event_id` and return whether this call was the first to see it.
    pub async fn should_process(&self, event_id: &str) -> bool {
        self.seen.entry_by_ref(event_id).or_insert(()).await.is_fresh()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    #[tokio::test]
    async fn first_observation_wins() {
        let dedup = Deduplicator::new(16, Duration::from_secs(60));
        assert!(dedup.should_process("1700000000.000100").await);
        assert!(!dedup.should_process("1700000000.000100").await);
        assert!(dedup.should_process("1700000000.000200").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_see_one_winner() {
        let dedup = Arc::new(Deduplicator::new(16, Duration::from_secs(60)));
        let mut set = JoinSet::new();
        for _ in 0..32 {
            let dedup = dedup.clone();
            set.spawn(async move { dedup.should_process("event").await });
        }
        let results = set.join_all().await;
        assert_eq!(results.iter().filter(|&&fresh| fresh).count(), 1);
    }
}
