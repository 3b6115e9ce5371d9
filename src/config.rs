//! Configuration management for vehinfo.
//!
//! `Settings` holds process-wide defaults (endpoint, timeouts, result
//! directory) loaded from an optional config file plus environment
//! overrides. `FetchConfig` is the validated, immutable per-run record
//! handed to the coordinator and fetchers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Upstream lookup endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://eservices.motortraffic.gov.lk/VehicleInfo/retrieveLimitedVehicleInformation.action";
/// Page the lookup form is normally submitted from.
pub const DEFAULT_REFERER: &str = "https://eservices.motortraffic.gov.lk/VehicleInfo/indexOauth.action";
pub const DEFAULT_NIC: &str = "2200000000";
pub const DEFAULT_CONTACT: &str = "0777777777";
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 10;

const CONFIG_BASENAME: &str = "vehinfo";
const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Errors raised while validating run configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("concurrency must be between 1 and 10, got {0}")]
    Concurrency(usize),
    #[error("delay must be a non-negative number of seconds, got {0}")]
    Delay(f64),
    #[error("no vehicle numbers provided")]
    NoKeys,
    #[error("session ID is required")]
    MissingSession,
    #[error("invalid endpoint URL '{0}'")]
    Endpoint(String),
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Lookup form endpoint.
    pub endpoint: String,
    /// Referer header sent with each lookup.
    pub referer: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Default worker count when a run does not specify one.
    pub default_workers: usize,
    /// Default per-request delay in seconds.
    pub default_delay_secs: f64,
    pub default_nic: String,
    pub default_contact: String,
    /// Directory for CSV/JSON exports.
    pub results_dir: PathBuf,
    /// Skip TLS certificate verification (the upstream certificate chain is broken).
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    /// Default bind address for `serve`.
    pub bind: String,
    /// Session credential from the environment, if any.
    pub session_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            request_timeout: 30,
            default_workers: 3,
            default_delay_secs: 2.0,
            default_nic: DEFAULT_NIC.to_string(),
            default_contact: DEFAULT_CONTACT.to_string(),
            results_dir: PathBuf::from("results"),
            accept_invalid_certs: true,
            user_agent: crate::scrapers::USER_AGENT.to_string(),
            bind: "127.0.0.1:5000".to_string(),
            session_id: None,
        }
    }
}

impl Settings {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Create the results directory if it does not exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.results_dir)
    }

    /// Origin (scheme + host) of the endpoint, used for the Origin header.
    pub fn origin(&self) -> Result<String, ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))?;
        Ok(url.origin().ascii_serialization())
    }

    /// Build a validated run configuration, falling back to defaults for
    /// omitted values.
    pub fn fetch_config(
        &self,
        concurrency: Option<usize>,
        delay_secs: Option<f64>,
        nic: Option<&str>,
        contact: Option<&str>,
        session: &str,
    ) -> Result<FetchConfig, ConfigError> {
        FetchConfig::new(
            concurrency.unwrap_or(self.default_workers),
            delay_secs.unwrap_or(self.default_delay_secs),
            non_blank(nic).unwrap_or(&self.default_nic),
            non_blank(contact).unwrap_or(&self.default_contact),
            session,
        )
    }

    /// Apply `VEHINFO_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("VEHINFO_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(timeout) = std::env::var("VEHINFO_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.request_timeout = timeout;
        }
        if let Ok(dir) = std::env::var("VEHINFO_RESULTS_DIR") {
            self.results_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Ok(session) = std::env::var("VEHINFO_SESSION_ID") {
            if !session.trim().is_empty() {
                self.session_id = Some(session.trim().to_string());
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Immutable per-run settings. Construct with [`FetchConfig::new`].
#[derive(Clone, PartialEq)]
pub struct FetchConfig {
    concurrency: usize,
    delay: Duration,
    nic: String,
    contact: String,
    session_id: String,
}

impl FetchConfig {
    pub fn new(
        concurrency: usize,
        delay_secs: f64,
        nic: &str,
        contact: &str,
        session_id: &str,
    ) -> Result<Self, ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::Concurrency(concurrency));
        }
        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(ConfigError::Delay(delay_secs));
        }
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ConfigError::MissingSession);
        }

        Ok(Self {
            concurrency,
            delay: Duration::from_secs_f64(delay_secs),
            nic: nic.trim().to_string(),
            contact: contact.trim().to_string(),
            session_id: session_id.to_string(),
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn nic(&self) -> &str {
        &self.nic
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Shortened session ID for display.
    pub fn masked_session(&self) -> String {
        mask_session(&self.session_id)
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("concurrency", &self.concurrency)
            .field("delay", &self.delay)
            .field("nic", &self.nic)
            .field("contact", &self.contact)
            .field("session_id", &self.masked_session())
            .finish()
    }
}

/// Show only the edges of a session credential.
pub fn mask_session(session: &str) -> String {
    let chars: Vec<char> = session.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// On-disk configuration file. All fields are optional overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub referer: Option<String>,
    pub request_timeout: Option<u64>,
    pub workers: Option<usize>,
    pub delay: Option<f64>,
    pub nic: Option<String>,
    pub contact: Option<String>,
    pub results_dir: Option<String>,
    pub accept_invalid_certs: Option<bool>,
    pub user_agent: Option<String>,
    pub bind: Option<String>,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Look for `vehinfo.{toml,json,yaml}` in the current directory, then
    /// in the user config directory.
    pub fn discover() -> Option<PathBuf> {
        let mut dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join(CONFIG_BASENAME));
        }

        dirs.iter()
            .flat_map(|dir| {
                CONFIG_EXTENSIONS
                    .iter()
                    .map(move |ext| dir.join(format!("{}.{}", CONFIG_BASENAME, ext)))
            })
            .find(|candidate| candidate.is_file())
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Apply configuration overrides to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref endpoint) = self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(ref referer) = self.referer {
            settings.referer = referer.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(workers) = self.workers {
            settings.default_workers = workers;
        }
        if let Some(delay) = self.delay {
            settings.default_delay_secs = delay;
        }
        if let Some(ref nic) = self.nic {
            settings.default_nic = nic.clone();
        }
        if let Some(ref contact) = self.contact {
            settings.default_contact = contact.clone();
        }
        if let Some(ref dir) = self.results_dir {
            settings.results_dir = self.resolve_path(dir);
        }
        if let Some(insecure) = self.accept_invalid_certs {
            settings.accept_invalid_certs = insecure;
        }
        if let Some(ref ua) = self.user_agent {
            settings.user_agent = ua.clone();
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
    }
}

/// Load settings: defaults, then the config file (explicit or discovered),
/// then environment overrides.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => Config::discover(),
    };

    if let Some(path) = path {
        let config = Config::load_from_path(&path)?;
        tracing::info!("Loaded config from {}", path.display());
        config.apply_to_settings(&mut settings);
    }

    settings.apply_env();
    settings.origin()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fetch_config_bounds() {
        assert_eq!(
            FetchConfig::new(0, 1.0, "n", "c", "s").unwrap_err(),
            ConfigError::Concurrency(0)
        );
        assert_eq!(
            FetchConfig::new(11, 1.0, "n", "c", "s").unwrap_err(),
            ConfigError::Concurrency(11)
        );
        assert!(matches!(
            FetchConfig::new(2, -0.5, "n", "c", "s").unwrap_err(),
            ConfigError::Delay(_)
        ));
        assert!(matches!(
            FetchConfig::new(2, f64::NAN, "n", "c", "s").unwrap_err(),
            ConfigError::Delay(_)
        ));
        assert_eq!(
            FetchConfig::new(2, 0.0, "n", "c", "   ").unwrap_err(),
            ConfigError::MissingSession
        );

        let config = FetchConfig::new(10, 0.25, " 123 ", "077", " ABCDEF ").unwrap();
        assert_eq!(config.concurrency(), 10);
        assert_eq!(config.delay(), Duration::from_millis(250));
        assert_eq!(config.nic(), "123");
        assert_eq!(config.session_id(), "ABCDEF");
    }

    #[test]
    fn test_debug_redacts_session() {
        let config = FetchConfig::new(1, 0.0, "n", "c", "F750F4D0BE39C97D2AB19DF9148798B8").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("F750F4D0BE39C97D2AB19DF9148798B8"));
        assert!(debug.contains("F750...98B8"));
    }

    #[test]
    fn test_settings_fetch_config_defaults() {
        let settings = Settings::default();
        let config = settings
            .fetch_config(None, None, Some("  "), None, "session")
            .unwrap();
        assert_eq!(config.concurrency(), 3);
        assert_eq!(config.delay(), Duration::from_secs(2));
        assert_eq!(config.nic(), DEFAULT_NIC);
        assert_eq!(config.contact(), DEFAULT_CONTACT);
    }

    #[test]
    fn test_origin() {
        let settings = Settings::default();
        assert_eq!(
            settings.origin().unwrap(),
            "https://eservices.motortraffic.gov.lk"
        );

        let bad = Settings {
            endpoint: "not a url".into(),
            ..Settings::default()
        };
        assert!(matches!(bad.origin(), Err(ConfigError::Endpoint(_))));
    }

    #[test]
    fn test_load_toml_config_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vehinfo.toml");
        std::fs::write(
            &path,
            "workers = 5\ndelay = 0.5\nresults_dir = \"out\"\nrequest_timeout = 10\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.default_workers, 5);
        assert_eq!(settings.default_delay_secs, 0.5);
        assert_eq!(settings.request_timeout, 10);
        assert_eq!(settings.results_dir, dir.path().join("out"));
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vehinfo.json");
        std::fs::write(&path, r#"{"nic": "991234567V", "accept_invalid_certs": false}"#).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.default_nic, "991234567V");
        assert!(!settings.accept_invalid_certs);
    }

    #[test]
    fn test_mask_session() {
        assert_eq!(mask_session("short"), "*****");
        assert_eq!(mask_session("0123456789"), "0123...6789");
    }
}
