//! Data models for vehinfo.

mod key;
mod progress;
mod record;

pub use key::{normalize, normalize_keys, InputKey};
pub use progress::{Completion, CompletionDescriptor, ProgressSnapshot, RunOutcome};
pub use record::{Record, RecordField, RecordStatus};
