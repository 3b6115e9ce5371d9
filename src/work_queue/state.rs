//! Mutable state of the current (or last) run.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::{Completion, ProgressSnapshot, Record};

/// Single-run state. Only the coordinator's collector task mutates it;
/// everyone else reads snapshots.
#[derive(Debug, Default)]
pub struct RunState {
    running: bool,
    total: usize,
    processed: usize,
    current_key: String,
    /// Results indexed by input position.
    slots: Vec<Option<Record>>,
    started_at: Option<Instant>,
    elapsed: Duration,
    eta: Option<Duration>,
    completion: Option<Completion>,
}

impl RunState {
    /// Fresh state for a run over `total` keys.
    pub(super) fn begin(total: usize) -> Self {
        Self {
            running: true,
            total,
            slots: vec![None; total],
            started_at: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Store one key's record and refresh count, current key and ETA.
    pub(super) fn record_completion(&mut self, index: usize, record: Record) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.is_none() {
            self.processed += 1;
        }
        self.current_key = record.vehicle_number.clone();
        *slot = Some(record);

        self.elapsed = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        let remaining = self.total.saturating_sub(self.processed);
        self.eta = estimate_remaining(self.elapsed, self.processed, remaining);
    }

    pub(super) fn finish(&mut self, completion: Completion) {
        self.elapsed = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        self.running = false;
        if completion != Completion::Finished {
            self.eta = None;
        }
        self.completion = Some(completion);
    }

    /// Collected records in input order. Keys never processed are skipped.
    pub fn records(&self) -> Vec<Record> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let elapsed = match (self.running, self.started_at) {
            (true, Some(started)) => started.elapsed(),
            _ => self.elapsed,
        };
        ProgressSnapshot {
            running: self.running,
            processed: self.processed,
            total: self.total,
            current_key: self.current_key.clone(),
            eta_seconds: self.eta.map(|d| d.as_secs_f64()),
            elapsed_seconds: elapsed.as_secs_f64(),
            completion: self.completion.clone(),
        }
    }
}

/// Average time per completed key times the keys still outstanding.
pub fn estimate_remaining(elapsed: Duration, processed: usize, remaining: usize) -> Option<Duration> {
    if processed == 0 {
        return None;
    }
    let per_key = elapsed.as_secs_f64() / processed as f64;
    Some(Duration::from_secs_f64(per_key * remaining as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Duration::from_secs(10), 0, 5), None);
        assert_eq!(
            estimate_remaining(Duration::from_secs(10), 2, 3),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            estimate_remaining(Duration::from_secs(10), 5, 0),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_records_keep_input_order() {
        let mut state = RunState::begin(3);
        state.record_completion(2, Record::empty("C"));
        state.record_completion(0, Record::empty("A"));

        let keys: Vec<_> = state.records().into_iter().map(|r| r.vehicle_number).collect();
        assert_eq!(keys, vec!["A", "C"]);
        assert_eq!(state.processed(), 2);
        assert_eq!(state.snapshot().current_key, "A");
        assert!(state.snapshot().eta_seconds.is_some());
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut state = RunState::begin(1);
        state.record_completion(7, Record::empty("X"));
        assert_eq!(state.processed(), 0);
    }

    #[test]
    fn test_finish_marks_terminal() {
        let mut state = RunState::begin(2);
        state.record_completion(0, Record::empty("A"));
        state.finish(Completion::Cancelled);

        let snap = state.snapshot();
        assert!(!snap.running);
        assert!(snap.is_terminal());
        assert_eq!(snap.completion, Some(Completion::Cancelled));
        assert_eq!(snap.eta_seconds, None);
    }
}
