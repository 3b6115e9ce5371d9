//! Terminal progress display for a lookup run.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::models::ProgressSnapshot;
use crate::utils::format_duration;

/// Single bar fed from the coordinator's progress snapshots.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("starting...");
        Self { bar }
    }

    pub fn update(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.total as u64);
        self.bar.set_position(snapshot.processed as u64);
        self.bar.set_message(status_message(snapshot));
    }

    /// Print above the bar without tearing it.
    pub fn println(&self, message: &str) {
        self.bar.println(message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn status_message(snapshot: &ProgressSnapshot) -> String {
    let eta = snapshot
        .eta_seconds
        .map(|secs| format_duration(Duration::from_secs_f64(secs)))
        .unwrap_or_else(|| "calculating...".to_string());

    if snapshot.current_key.is_empty() {
        format!("ETA {}", eta)
    } else {
        format!("{} | ETA {}", snapshot.current_key, eta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let mut snap = ProgressSnapshot {
            running: true,
            total: 5,
            ..Default::default()
        };
        assert_eq!(status_message(&snap), "ETA calculating...");

        snap.processed = 2;
        snap.current_key = "CAB-1234".to_string();
        snap.eta_seconds = Some(75.4);
        assert_eq!(status_message(&snap), "CAB-1234 | ETA 1m 15s");
    }
}
