//! Client-side round-robin partition assignment

use std::collections::HashMap;

/// Spreads messages over a topic's partitions in turn
///
/// Partition counts are looked up once per topic. A topic whose count cannot
/// be read gets no explicit partition, leaving the choice to the client, and
/// is looked up again on its next message.
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
pub(crate) struct RoundRobin {
    enabled: bool,
    partitions: HashMap<String, i32>,
    cursor: u64,
}

#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
impl RoundRobin {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            partitions: HashMap::new(),
            cursor: 0,
        }
    }

    /// Partition for the next message on `topic`
    ///
    /// `partition_count` is called only when the topic has no cached count.
    pub(crate) fn next_partition<F>(&mut self, topic: &str, partition_count: F) -> Option<i32>
    where
        F: FnOnce() -> Option<i32>,
    {
        if !self.enabled {
            return None;
        }
        let count = match self.partitions.get(topic) {
            Some(count) => *count,
            None => {
                let count = partition_count().filter(|count| *count > 0)?;
                self.partitions.insert(topic.to_string(), count);
                count
            }
        };
        Some(self.pick(count))
    }

    fn pick(&mut self, count: i32) -> i32 {
        let partition = (self.cursor % count.max(1) as u64) as i32;
        self.cursor = self.cursor.wrapping_add(1);
        partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_cycles_through_partitions() {
        let mut round_robin = RoundRobin::new(true);
        let picked: Vec<_> = (0..7)
            .map(|_| round_robin.next_partition("logs", || Some(3)).unwrap())
            .collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_counts_are_cached_per_topic() {
        let lookups = Cell::new(0);
        let mut round_robin = RoundRobin::new(true);
        let mut next = |topic: &str, count: i32| {
            round_robin
                .next_partition(topic, || {
                    lookups.set(lookups.get() + 1);
                    Some(count)
                })
                .unwrap()
        };

        let mut audit = Vec::new();
        let mut metrics = Vec::new();
        for _ in 0..4 {
            audit.push(next("audit", 4));
            metrics.push(next("metrics", 2));
        }

        assert_eq!(lookups.get(), 2);
        assert!(audit.iter().all(|p| (0..4).contains(p)));
        assert!(metrics.iter().all(|p| (0..2).contains(p)));
        // one cursor is shared by every topic
        assert_eq!(audit, vec![0, 2, 0, 2]);
        assert_eq!(metrics, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_unknown_count_is_retried() {
        let mut round_robin = RoundRobin::new(true);
        assert_eq!(round_robin.next_partition("logs", || None), None);
        assert_eq!(round_robin.next_partition("logs", || Some(0)), None);
        assert_eq!(round_robin.next_partition("logs", || Some(2)), Some(0));
        assert_eq!(round_robin.next_partition("logs", || None), Some(1));
    }

    #[test]
    fn test_disabled_never_looks_up() {
        let mut round_robin = RoundRobin::new(false);
        let result = round_robin.next_partition("logs", || panic!("looked up while disabled"));
        assert_eq!(result, None);
    }
}
