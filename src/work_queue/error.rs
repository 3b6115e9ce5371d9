//! Run start errors.

use thiserror::Error;

use crate::config::ConfigError;

/// Why a run could not be started. Per-key failures never surface here;
/// they are captured in that key's record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    #[error("Scraping is already in progress")]
    Busy,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
