//! Partition table: maps partition keys to their window state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::key::PartitionKey;
use super::verdict::Decision;
use super::window::{LimiterConfig, WindowState};

/// A single rate limit bucket.
///
/// The window state is only ever touched under the partition's own lock, so
/// partitions never contend with each other.
#[derive(Debug)]
pub struct Partition {
    config: LimiterConfig,
    state: Mutex<WindowState>,
}

impl Partition {
    fn new(config: LimiterConfig, now: Instant) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState::new(&config, now)),
        }
    }

    /// Run one fixed-window acquisition as a single atomic step.
    pub fn try_acquire(&self, now: Instant) -> Decision {
        self.state.lock().acquire(&self.config, now)
    }

    /// Copy of the current window state.
    pub fn snapshot(&self) -> WindowState {
        *self.state.lock()
    }

    fn last_seen(&self) -> Instant {
        self.state.lock().last_seen
    }
}

/// All partitions of one limiter class.
pub struct PartitionTable {
    config: LimiterConfig,
    partitions: DashMap<PartitionKey, Arc<Partition>>,
}

impl PartitionTable {
    /// Create an empty table whose partitions all share `config`.
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            partitions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Fetch the partition for `key`, creating it on first use.
    ///
    /// Racing callers with the same unseen key all receive the same partition.
    pub fn get_or_create(&self, key: &PartitionKey, now: Instant) -> Arc<Partition> {
        if let Some(partition) = self.partitions.get(key) {
            return Arc::clone(partition.value());
        }

        let partition = self
            .partitions
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(
                    partition = %key,
                    permit_limit = self.config.permit_limit,
                    window_ms = self.config.window.as_millis() as u64,
                    queue_limit = self.config.queue_limit,
                    "Creating rate limit partition"
                );
                Arc::new(Partition::new(self.config, now))
            });
        Arc::clone(partition.value())
    }

    /// Look up an existing partition without creating it.
    pub fn get(&self, key: &str) -> Option<Arc<Partition>> {
        self.partitions.get(key).map(|p| Arc::clone(p.value()))
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Drop partitions idle for at least `max(idle_after, window)`.
    ///
    /// A partition still referenced by an in-flight call is kept. The check
    /// runs under the shard's write lock, so no caller can pick the partition
    /// up while it is being removed. Returns the number of evicted partitions.
    pub fn evict_idle(&self, now: Instant, idle_after: Duration) -> usize {
        let threshold = idle_after.max(self.config.window);
        let mut evicted = 0;

        self.partitions.retain(|_, partition| {
            let in_use = Arc::strong_count(partition) > 1;
            let idle = now.saturating_duration_since(partition.last_seen()) >= threshold;
            if idle && !in_use {
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(permits: u32) -> PartitionTable {
        PartitionTable::new(LimiterConfig::new(permits, Duration::from_secs(10), 0))
    }

    #[test]
    fn test_table_creation() {
        let table = table(5);
        assert!(table.is_empty());
        assert_eq!(table.config().permit_limit, 5);
    }

    #[test]
    fn test_get_or_create_reuses_partition() {
        let table = table(5);
        let now = Instant::now();
        let key = PartitionKey::new("alice");

        let first = table.get_or_create(&key, now);
        let second = table.get_or_create(&key, now);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_partitions_are_independent() {
        let table = table(1);
        let now = Instant::now();

        let alice = table.get_or_create(&PartitionKey::new("alice"), now);
        let bob = table.get_or_create(&PartitionKey::new("bob"), now);

        assert_eq!(alice.try_acquire(now), Decision::Admitted);
        assert!(matches!(alice.try_acquire(now), Decision::Rejected { .. }));
        assert_eq!(bob.try_acquire(now), Decision::Admitted);
    }

    #[test]
    fn test_get_does_not_create() {
        let table = table(1);
        assert!(table.get("nobody").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_first_use_creates_one_partition() {
        let table = table(100);
        let now = Instant::now();
        let key = PartitionKey::new("shared");
        let barrier = std::sync::Barrier::new(8);

        let partitions: Vec<Arc<Partition>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        table.get_or_create(&key, now)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(table.len(), 1);
        for partition in &partitions[1..] {
            assert!(Arc::ptr_eq(&partitions[0], partition));
        }
    }

    #[test]
    fn test_evict_idle_removes_stale_partitions() {
        let table = table(1);
        let t0 = Instant::now();
        table.get_or_create(&PartitionKey::new("stale"), t0);
        table.get_or_create(&PartitionKey::new("fresh"), t0 + Duration::from_secs(50));

        let evicted = table.evict_idle(t0 + Duration::from_secs(60), Duration::from_secs(30));

        assert_eq!(evicted, 1);
        assert!(table.get("stale").is_none());
        assert!(table.get("fresh").is_some());
    }

    #[test]
    fn test_evict_idle_waits_at_least_one_window() {
        let table = table(1);
        let t0 = Instant::now();
        table.get_or_create(&PartitionKey::new("recent"), t0);

        // Idle threshold shorter than the window is raised to the window.
        let evicted = table.evict_idle(t0 + Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(evicted, 0);
    }

    #[test]
    fn test_evict_idle_keeps_held_partitions() {
        let table = table(1);
        let t0 = Instant::now();
        let held = table.get_or_create(&PartitionKey::new("held"), t0);

        let evicted = table.evict_idle(t0 + Duration::from_secs(600), Duration::from_secs(30));

        assert_eq!(evicted, 0);
        assert!(table.get("held").is_some());
        drop(held);
    }
}
