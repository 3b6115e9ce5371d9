//! Bounded-concurrency fetch and extract runs.
//!
//! A [`RunCoordinator`] owns the single process-wide run. Starting a run
//! spawns a fixed pool of workers that claim keys in input order, fetch and
//! extract each one, and hand the resulting record back to one collector
//! task. The collector is the only writer of [`RunState`]; observers poll
//! [`RunCoordinator::snapshot`] or follow [`RunCoordinator::subscribe`].

mod error;
mod runner;
mod state;

pub use error::RunError;
pub use state::{estimate_remaining, RunState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{ConfigError, FetchConfig};
use crate::models::{Completion, InputKey, ProgressSnapshot, Record, RunOutcome};
use crate::scrapers::RecordFetcher;
use runner::PipelineRunner;

/// Handle to the single run slot. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RunCoordinator {
    state: Arc<RwLock<RunState>>,
    cancel: Arc<AtomicBool>,
    progress: Arc<watch::Sender<ProgressSnapshot>>,
}

impl Default for RunCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunCoordinator {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(progress),
        }
    }

    /// Start a run in the background.
    ///
    /// Fails with [`RunError::Busy`] while another run is active, leaving
    /// that run untouched, and with a config error for an empty key list.
    pub async fn start(
        &self,
        keys: Vec<InputKey>,
        config: FetchConfig,
        fetcher: Arc<dyn RecordFetcher>,
    ) -> Result<JoinHandle<RunOutcome>, RunError> {
        if keys.is_empty() {
            return Err(ConfigError::NoKeys.into());
        }

        {
            let mut state = self.state.write().await;
            if state.is_running() {
                return Err(RunError::Busy);
            }
            *state = RunState::begin(keys.len());
            self.cancel.store(false, Ordering::SeqCst);
            self.progress.send_replace(state.snapshot());
        }

        let runner = PipelineRunner {
            keys: Arc::new(keys),
            config: Arc::new(config),
            fetcher,
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        };
        Ok(tokio::spawn(runner.run()))
    }

    /// Start a run and wait for it to reach a terminal state.
    pub async fn run(
        &self,
        keys: Vec<InputKey>,
        config: FetchConfig,
        fetcher: Arc<dyn RecordFetcher>,
    ) -> Result<RunOutcome, RunError> {
        let handle = self.start(keys, config, fetcher).await?;
        Ok(self.wait(handle).await)
    }

    /// Await a run started with [`start`](Self::start).
    ///
    /// If the run task itself died, the run is marked aborted and whatever
    /// was collected is returned.
    pub async fn wait(&self, handle: JoinHandle<RunOutcome>) -> RunOutcome {
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut state = self.state.write().await;
                let completion = Completion::Aborted(e.to_string());
                state.finish(completion.clone());
                self.progress.send_replace(state.snapshot());
                RunOutcome {
                    records: state.records(),
                    completion,
                    total: state.total(),
                }
            }
        }
    }

    /// Ask the active run to stop dispatching new keys.
    ///
    /// Returns whether a run was active. Calling it while idle, or more
    /// than once, has no effect.
    pub async fn request_stop(&self) -> bool {
        let state = self.state.read().await;
        if !state.is_running() {
            return false;
        }
        if !self.cancel.swap(true, Ordering::SeqCst) {
            info!(
                "Stop requested after {}/{} keys",
                state.processed(),
                state.total()
            );
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_running()
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.state.read().await.snapshot()
    }

    /// Receiver that sees a new snapshot after every completed key and
    /// once more when the run turns terminal.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Records of the current or last run, in input order.
    pub async fn records(&self) -> Vec<Record> {
        self.state.read().await.records()
    }
}
