use crate::snapshot::{DeviceState, Snapshot};
use chrono::{DateTime, Utc};

/// Snapshots waiting to be published, in the order they were discovered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChangeLog {
    snapshots: Vec<Snapshot>,
}

impl StateChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn extend(&mut self, snapshots: impl IntoIterator<Item = Snapshot>) {
        self.snapshots.extend(snapshots);
    }

    /// Empties the log, returning everything it held
    pub fn take(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.snapshots)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

/// Latest known device state and the watermark it was taken at.
///
/// The watermark only moves forward. A snapshot at or before it never replaces the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentState {
    pub state: DeviceState,
    pub last_published: Option<DateTime<Utc>>,
}

impl CurrentState {
    /// Folds `history` in stored order and returns how many snapshots advanced the watermark
    pub fn reconcile(&mut self, history: &[Snapshot]) -> usize {
        let mut advanced = 0;
        for snapshot in history {
            if self.is_newer(snapshot.timestamp) {
                self.state = snapshot.state;
                self.last_published = Some(snapshot.timestamp);
                advanced += 1;
            }
        }
        advanced
    }

    fn is_newer(&self, timestamp: DateTime<Utc>) -> bool {
        self.last_published
            .map_or(true, |watermark| timestamp > watermark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Field;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn snapshot(minutes: i64, temperature: f64) -> Snapshot {
        let mut snapshot = Snapshot::new(t(minutes));
        snapshot.state.set(Field::Temperature, temperature);
        snapshot
    }

    #[test]
    fn test_empty_history_changes_nothing() {
        let mut current = CurrentState::default();
        assert_eq!(current.reconcile(&[]), 0);
        assert_eq!(current, CurrentState::default());

        current.reconcile(&[snapshot(5, 20.0)]);
        let before = current.clone();
        assert_eq!(current.reconcile(&[]), 0);
        assert_eq!(current, before);
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let mut current = CurrentState::default();
        let advanced = current.reconcile(&[snapshot(0, 20.0), snapshot(5, 21.0)]);

        assert_eq!(advanced, 2);
        assert_eq!(current.state.temperature, 21.0);
        assert_eq!(current.last_published, Some(t(5)));
    }

    #[test]
    fn test_out_of_order_snapshot_ignored() {
        let mut current = CurrentState::default();
        let advanced = current.reconcile(&[snapshot(10, 25.0), snapshot(5, 21.0)]);

        assert_eq!(advanced, 1);
        assert_eq!(current.state.temperature, 25.0);
        assert_eq!(current.last_published, Some(t(10)));
    }

    #[test]
    fn test_equal_timestamp_does_not_replace() {
        let mut current = CurrentState::default();
        current.reconcile(&[snapshot(5, 21.0)]);
        assert_eq!(current.reconcile(&[snapshot(5, 30.0)]), 0);
        assert_eq!(current.state.temperature, 21.0);
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut current = CurrentState::default();
        let mut watermarks = Vec::new();
        for batch in [vec![3, 1], vec![0], vec![2, 7, 4], vec![], vec![7, 6]] {
            let history: Vec<_> = batch.into_iter().map(|m| snapshot(m, m as f64)).collect();
            current.reconcile(&history);
            watermarks.push(current.last_published);
        }

        assert!(watermarks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(current.last_published, Some(t(7)));
        assert_eq!(current.state.temperature, 7.0);
    }

    #[test]
    fn test_log_take_clears() {
        let mut log = StateChangeLog::new();
        log.push(snapshot(0, 1.0));
        log.extend(vec![snapshot(5, 2.0)]);
        assert_eq!(log.len(), 2);

        let taken = log.take();
        assert_eq!(taken.len(), 2);
        assert!(log.is_empty());
        assert!(log.take().is_empty());
    }
}
