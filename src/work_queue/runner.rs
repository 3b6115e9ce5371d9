//! Worker pool that drives one run from start to terminal state.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::state::RunState;
use crate::config::FetchConfig;
use crate::models::{Completion, InputKey, ProgressSnapshot, Record, RunOutcome};
use crate::scrapers::{extract, RecordFetcher};

/// Per-worker pacing: each request starts at least `delay` after the
/// worker's previous one. The first request also waits the full delay.
pub(super) struct Pacer {
    delay: Duration,
    last_start: Option<Instant>,
}

impl Pacer {
    pub(super) fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: None,
        }
    }

    pub(super) async fn wait(&mut self) {
        let wait = match self.last_start {
            Some(last) => self.delay.saturating_sub(last.elapsed()),
            None => self.delay,
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.last_start = Some(Instant::now());
    }
}

/// Everything a run needs, moved into the background task.
pub(super) struct PipelineRunner {
    pub(super) keys: Arc<Vec<InputKey>>,
    pub(super) config: Arc<FetchConfig>,
    pub(super) fetcher: Arc<dyn RecordFetcher>,
    pub(super) state: Arc<RwLock<RunState>>,
    pub(super) cancel: Arc<AtomicBool>,
    pub(super) progress: Arc<watch::Sender<ProgressSnapshot>>,
}

impl PipelineRunner {
    pub(super) async fn run(self) -> RunOutcome {
        let total = self.keys.len();
        let started = Instant::now();
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<(usize, Record)>(total.max(1));

        let workers = self.config.concurrency().min(total);
        info!(
            "Starting run: {} keys, {} workers, {:?} delay, session {}",
            total,
            workers,
            self.config.delay(),
            self.config.masked_session()
        );

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                keys: self.keys.clone(),
                next: next.clone(),
                config: self.config.clone(),
                fetcher: self.fetcher.clone(),
                cancel: self.cancel.clone(),
                tx: tx.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(tx);

        // Single writer: workers only send their own (index, record).
        while let Some((index, record)) = rx.recv().await {
            let mut state = self.state.write().await;
            state.record_completion(index, record);
            self.progress.send_replace(state.snapshot());
        }

        let mut aborted = None;
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker failed: {}", e);
                aborted.get_or_insert_with(|| join_error_message(e));
            }
        }

        let mut state = self.state.write().await;
        let completion = match aborted {
            Some(reason) => Completion::Aborted(reason),
            None if state.processed() < total && self.cancel.load(Ordering::SeqCst) => {
                Completion::Cancelled
            }
            None => Completion::Finished,
        };
        state.finish(completion.clone());
        self.progress.send_replace(state.snapshot());

        let records = state.records();
        info!(
            "Run {}: {}/{} keys processed in {:.1}s",
            completion.as_str(),
            records.len(),
            total,
            started.elapsed().as_secs_f64()
        );

        RunOutcome {
            records,
            completion,
            total,
        }
    }
}

struct Worker {
    id: usize,
    keys: Arc<Vec<InputKey>>,
    next: Arc<AtomicUsize>,
    config: Arc<FetchConfig>,
    fetcher: Arc<dyn RecordFetcher>,
    cancel: Arc<AtomicBool>,
    tx: mpsc::Sender<(usize, Record)>,
}

impl Worker {
    async fn run(self) {
        let mut pacer = Pacer::new(self.config.delay());

        loop {
            if self.stopped() || self.next.load(Ordering::SeqCst) >= self.keys.len() {
                break;
            }
            pacer.wait().await;
            if self.stopped() {
                break;
            }

            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let Some(key) = self.keys.get(index).cloned() else {
                break;
            };
            debug!("Worker {} claimed {} ({}/{})", self.id, key, index + 1, self.keys.len());

            // Own task per key so a panic only costs this key.
            let task = tokio::spawn(process_key(
                self.fetcher.clone(),
                key.clone(),
                self.config.clone(),
            ));
            let record = match task.await {
                Ok(record) => record,
                Err(e) => {
                    let reason = join_error_message(e);
                    error!("Error processing {}: {}", key, reason);
                    Record::fetch_failed(key.as_str(), reason)
                }
            };

            if self.tx.send((index, record)).await.is_err() {
                break;
            }
        }
    }

    fn stopped(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Fetch then extract one key. Failures become records, never errors.
async fn process_key(
    fetcher: Arc<dyn RecordFetcher>,
    key: InputKey,
    config: Arc<FetchConfig>,
) -> Record {
    match fetcher.fetch(&key, &config).await {
        Ok(document) => {
            let record = extract(&document, &key);
            if record.is_success() {
                info!("Successfully processed {}", key);
            }
            record
        }
        Err(e) => {
            error!("Error processing {}: {}", key, e);
            Record::fetch_failed(key.as_str(), e.to_string())
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("task panicked: {}", panic_text(err.into_panic()))
    } else {
        err.to_string()
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pacer_waits_between_requests() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        let start = Instant::now();

        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_pacer_zero_delay_does_not_sleep() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = std::time::Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_panic_text() {
        assert_eq!(panic_text(Box::new("boom")), "boom");
        assert_eq!(panic_text(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_text(Box::new(42u8)), "unknown panic");
    }
}
