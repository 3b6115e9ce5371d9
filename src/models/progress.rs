//! Progress snapshots and run completion descriptors.

use serde::{Deserialize, Serialize};

use super::Record;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum Completion {
    /// Every key was processed.
    Finished,
    /// A stop was requested before all keys were dispatched.
    Cancelled,
    /// The pool itself failed.
    Aborted(String),
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Point-in-time view of a run, published after every completed key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub running: bool,
    pub processed: usize,
    pub total: usize,
    pub current_key: String,
    pub eta_seconds: Option<f64>,
    pub elapsed_seconds: f64,
    /// Set once the run is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

impl ProgressSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.completion.is_some()
    }
}

/// Summary of a terminal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionDescriptor {
    pub finished_normally: bool,
    pub cancelled: bool,
    pub total_processed: usize,
}

/// Records collected by a run, in input order, plus how it ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<Record>,
    pub completion: Completion,
    pub total: usize,
}

impl RunOutcome {
    pub fn descriptor(&self) -> CompletionDescriptor {
        CompletionDescriptor {
            finished_normally: self.completion == Completion::Finished,
            cancelled: self.completion == Completion::Cancelled,
            total_processed: self.records.len(),
        }
    }
}
