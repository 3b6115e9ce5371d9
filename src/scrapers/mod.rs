//! Record retrieval: the fetcher seam, the HTTP implementation and the
//! HTML field extractor.

pub mod extract;
mod http_client;

pub use extract::{extract, match_label, ExtractError, LABEL_RULES};
pub use http_client::{FetchError, HttpClient, USER_AGENT};

use async_trait::async_trait;

use crate::config::FetchConfig;
use crate::models::InputKey;

/// Key used to probe whether a session credential is accepted.
pub const SESSION_PROBE_KEY: &str = "TEST123";

/// Performs the single outbound lookup for one key.
///
/// Implementations must not retry; one call is one request.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetch the raw result page for `key`.
    async fn fetch(&self, key: &InputKey, config: &FetchConfig) -> Result<String, FetchError>;
}

/// Check a session credential by issuing one probe lookup.
///
/// The session is considered valid when the upstream answers with a
/// successful status, whether or not the probe vehicle exists.
pub async fn validate_session(
    fetcher: &dyn RecordFetcher,
    config: &FetchConfig,
) -> Result<(), FetchError> {
    let probe = InputKey::parse(SESSION_PROBE_KEY).ok_or_else(|| {
        FetchError::Client("session probe key is blank".to_string())
    })?;
    fetcher.fetch(&probe, config).await.map(|_| ())
}
