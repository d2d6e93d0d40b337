use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Poll every `interval` once no more than `threshold_secs` remain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefreshLevel {
    pub threshold_secs: f64,
    pub interval: Duration,
}

impl RefreshLevel {
    pub fn new(threshold_secs: f64, interval_secs: u64) -> Self {
        Self {
            threshold_secs,
            interval: Duration::from_secs(interval_secs),
        }
    }
}

/// Maps remaining time to the delay before the next refresh cycle.
///
/// Levels are kept sorted by threshold, so the first match is always the
/// tightest one. A remaining time exactly on a threshold uses that level.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    levels: Vec<RefreshLevel>,
    fallback: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(
            vec![
                RefreshLevel::new(60.0, 1),
                RefreshLevel::new(120.0, 3),
                RefreshLevel::new(300.0, 5),
            ],
            Duration::from_secs(30),
        )
    }
}

impl RefreshPolicy {
    pub fn new(mut levels: Vec<RefreshLevel>, fallback: Duration) -> Self {
        levels.sort_by(|a, b| a.threshold_secs.total_cmp(&b.threshold_secs));
        Self { levels, fallback }
    }

    pub fn levels(&self) -> &[RefreshLevel] {
        &self.levels
    }

    pub fn fallback(&self) -> Duration {
        self.fallback
    }

    pub fn next_interval(&self, remaining_secs: f64) -> Duration {
        self.levels
            .iter()
            .find(|level| remaining_secs <= level.threshold_secs)
            .map(|level| level.interval)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(policy: &RefreshPolicy, remaining: f64) -> u64 {
        policy.next_interval(remaining).as_secs()
    }

    #[test]
    fn default_table_boundaries() {
        let policy = RefreshPolicy::default();
        assert_eq!(secs(&policy, 0.0), 1);
        assert_eq!(secs(&policy, 60.0), 1);
        assert_eq!(secs(&policy, 60.0001), 3);
        assert_eq!(secs(&policy, 120.0), 3);
        assert_eq!(secs(&policy, 120.5), 5);
        assert_eq!(secs(&policy, 300.0), 5);
        assert_eq!(secs(&policy, 300.0001), 30);
        assert_eq!(secs(&policy, 86_400.0), 30);
    }

    #[test]
    fn unsorted_levels_still_pick_tightest_first() {
        let policy = RefreshPolicy::new(
            vec![RefreshLevel::new(600.0, 10), RefreshLevel::new(30.0, 2)],
            Duration::from_secs(60),
        );
        assert_eq!(secs(&policy, 20.0), 2);
        assert_eq!(secs(&policy, 31.0), 10);
        assert_eq!(secs(&policy, 601.0), 60);
        assert_eq!(policy.levels()[0].threshold_secs, 30.0);
    }

    #[test]
    fn empty_table_always_uses_fallback() {
        let policy = RefreshPolicy::new(Vec::new(), Duration::from_secs(7));
        assert_eq!(secs(&policy, 1.0), 7);
        assert_eq!(policy.fallback(), Duration::from_secs(7));
    }
}
