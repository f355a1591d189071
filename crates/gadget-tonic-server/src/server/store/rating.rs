//! Running (count, sum) rating aggregates, keyed by device id.
//!
//! The aggregator does not validate that a device exists; that is the
//! caller's responsibility. It never hands out a reference into its own
//! state: `add` returns a copied snapshot, so a reader computing an average
//! cannot race a later writer.

use std::collections::HashMap;

use parking_lot::RwLock;

/// An immutable snapshot of one device's rating aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub count: u32,
    pub sum: f64,
}

impl Rating {
    /// Average score. Only meaningful once `count >= 1`, which `add`
    /// guarantees for every snapshot it returns.
    pub fn average(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

#[derive(Debug, Default)]
pub struct RatingAggregator {
    ratings: RwLock<HashMap<String, Rating>>,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically folds `score` into the device's aggregate, initializing
    /// it to `{count: 1, sum: score}` on first rating, and returns a copy
    /// of the updated state. Count and sum only ever increase.
    pub fn add(&self, device_id: &str, score: f64) -> Rating {
        let mut ratings = self.ratings.write();

        let rating = ratings
            .entry(device_id.to_string())
            .and_modify(|r| {
                r.count += 1;
                r.sum += score;
            })
            .or_insert(Rating {
                count: 1,
                sum: score,
            });

        *rating
    }

    pub fn get(&self, device_id: &str) -> Option<Rating> {
        self.ratings.read().get(device_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_add_initializes_the_aggregate() {
        let ratings = RatingAggregator::new();

        let rating = ratings.add("a", 4.0);
        assert_eq!(rating, Rating { count: 1, sum: 4.0 });
        assert_eq!(rating.average(), 4.0);
    }

    #[test]
    fn sequential_adds_accumulate() {
        let ratings = RatingAggregator::new();

        ratings.add("a", 4.0);
        let rating = ratings.add("a", 5.0);

        assert_eq!(rating, Rating { count: 2, sum: 9.0 });
        assert_eq!(rating.average(), 4.5);
    }

    #[test]
    fn devices_aggregate_independently() {
        let ratings = RatingAggregator::new();

        ratings.add("a", 4.0);
        ratings.add("b", 1.0);

        assert_eq!(ratings.get("a").unwrap().count, 1);
        assert_eq!(ratings.get("b").unwrap().sum, 1.0);
        assert!(ratings.get("c").is_none());
    }

    #[test]
    fn concurrent_adds_lose_nothing() {
        let ratings = Arc::new(RatingAggregator::new());
        let threads = 8;
        let adds_per_thread = 100;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ratings = Arc::clone(&ratings);
                std::thread::spawn(move || {
                    for _ in 0..adds_per_thread {
                        ratings.add("a", 2.0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let rating = ratings.get("a").unwrap();
        assert_eq!(rating.count, threads * adds_per_thread);
        assert_eq!(rating.sum, f64::from(threads * adds_per_thread) * 2.0);
    }

    #[test]
    fn snapshots_do_not_observe_later_writes() {
        let ratings = RatingAggregator::new();

        let before = ratings.add("a", 4.0);
        ratings.add("a", 5.0);

        assert_eq!(before, Rating { count: 1, sum: 4.0 });
    }
}
