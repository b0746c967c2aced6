//! Sliding-window timestamp logs.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the sliding window quotas are evaluated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// One-second window
    Second,
    /// One-minute window
    #[default]
    Minute,
    /// One-hour window
    Hour,
    /// One-day window
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }

    /// Unit name used in user-facing messages ("requests per minute").
    pub fn unit(&self) -> &'static str {
        match self {
            TimeWindow::Second => "second",
            TimeWindow::Minute => "minute",
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
        }
    }

    /// Human-readable window label, e.g. "1 minute".
    pub fn label(&self) -> String {
        format!("1 {}", self.unit())
    }
}

/// Admitted-event instants for one scope, oldest first.
///
/// An entry recorded at `t` is live at `now` while `now - t < window`. An
/// entry exactly one window old is stale.
#[derive(Debug, Default, Clone)]
pub struct TimestampLog {
    entries: VecDeque<Instant>,
}

impl TimestampLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry that is no longer inside the window ending at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.entries.len();
        while let Some(&oldest) = self.entries.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        before - self.entries.len()
    }

    /// Record an admitted event, keeping the log oldest first.
    ///
    /// `purge` only inspects the front, so an instant older than the newest
    /// entry is inserted in place rather than appended.
    pub fn record(&mut self, now: Instant) {
        match self.entries.back() {
            Some(&newest) if now < newest => {
                let at = self.entries.partition_point(|&t| t <= now);
                self.entries.insert(at, now);
            }
            _ => self.entries.push_back(now),
        }
    }

    /// Number of entries currently held. Only trustworthy right after `purge`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_time_window_label() {
        assert_eq!(TimeWindow::default(), TimeWindow::Minute);
        assert_eq!(TimeWindow::Minute.label(), "1 minute");
        assert_eq!(TimeWindow::Hour.unit(), "hour");
    }

    #[test]
    fn test_purge_keeps_entries_inside_window() {
        let base = Instant::now();
        let mut log = TimestampLog::new();
        log.record(base);

        assert_eq!(log.purge(base + Duration::from_secs(59), MINUTE), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_purge_boundary_is_stale() {
        let base = Instant::now();
        let mut log = TimestampLog::new();
        log.record(base);

        // Exactly one window old no longer counts.
        assert_eq!(log.purge(base + MINUTE, MINUTE), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_purge_only_drops_expired_prefix() {
        let base = Instant::now();
        let mut log = TimestampLog::new();
        log.record(base);
        log.record(base + Duration::from_secs(10));
        log.record(base + Duration::from_secs(30));

        let removed = log.purge(base + Duration::from_secs(65), MINUTE);
        assert_eq!(removed, 1);
        assert_eq!(log.len(), 2);

        let removed = log.purge(base + Duration::from_secs(91), MINUTE);
        assert_eq!(removed, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_record_keeps_entries_ordered() {
        let base = Instant::now();
        let mut log = TimestampLog::new();
        log.record(base + Duration::from_secs(20));
        log.record(base);
        log.record(base + Duration::from_secs(10));

        assert_eq!(log.purge(base + Duration::from_secs(60), MINUTE), 1);
        assert_eq!(log.purge(base + Duration::from_secs(70), MINUTE), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_purge_with_earlier_now_keeps_everything() {
        let base = Instant::now();
        let mut log = TimestampLog::new();
        log.record(base + Duration::from_secs(5));

        assert_eq!(log.purge(base, MINUTE), 0);
        assert_eq!(log.len(), 1);
    }
}
