use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use jobsync_core::{BackoffPolicy, SyncSettings};
use jobsync_engine::{ClientSettings, EngineSettings, StreamSettings};
use serde::{Deserialize, Serialize};

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_PATH: &str = "./jobsync.ron";
pub const API_URL_ENV: &str = "JOBSYNC_API_URL";

/// Everything the terminal host can be tuned with. Every field is optional in
/// the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub session_cookie: Option<String>,
    pub page_size: u32,
    pub snapshot_dir: PathBuf,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_max_attempts: u32,
    pub liveness_timeout_ms: u64,
    pub stable_after_ms: u64,
    pub max_event_bytes: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let stream = StreamSettings::default();
        let sync = SyncSettings::default();
        Self {
            base_url: client.base_url,
            session_cookie: None,
            page_size: sync.page_size,
            snapshot_dir: PathBuf::from("./.jobsync"),
            backoff_base_ms: millis(sync.backoff.base_delay),
            backoff_max_ms: millis(sync.backoff.max_delay),
            backoff_max_attempts: sync.backoff.max_attempts,
            liveness_timeout_ms: millis(stream.liveness_timeout),
            stable_after_ms: millis(stream.stable_after),
            max_event_bytes: stream.max_event_bytes,
            connect_timeout_ms: millis(client.connect_timeout),
            request_timeout_ms: millis(client.request_timeout),
            log_destination: LogDestination::default(),
        }
    }
}

impl AppConfig {
    /// Reads the config file. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        let config =
            ron::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            page_size: self.page_size.max(1),
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(self.backoff_base_ms),
                max_delay: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
                max_attempts: self.backoff_max_attempts,
            },
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            client: ClientSettings {
                base_url: self.base_url.clone(),
                session_cookie: self.session_cookie.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                ..ClientSettings::default()
            },
            stream: StreamSettings {
                liveness_timeout: Duration::from_millis(self.liveness_timeout_ms),
                // A quiet healthy connection must reach stability before it stalls.
                stable_after: Duration::from_millis(
                    self.stable_after_ms.min(self.liveness_timeout_ms),
                ),
                max_event_bytes: self.max_event_bytes.max(1),
                ..StreamSettings::default()
            },
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobsync.ron");
        fs::write(
            &path,
            r#"(base_url: "https://api.example.com", page_size: 25, log_destination: Both)"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap().unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.backoff_max_attempts, 6);
        assert_eq!(config.snapshot_dir, PathBuf::from("./.jobsync"));
    }

    #[test]
    fn unparsable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobsync.ron");
        fs::write(&path, "(page_size: \"ten\")").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn env_override_replaces_base_url() {
        let mut config = AppConfig::default();
        config.apply_api_url_override(Some(" http://10.0.0.2:9000 ".to_string()));
        assert_eq!(config.base_url, "http://10.0.0.2:9000");

        config.apply_api_url_override(Some(String::new()));
        config.apply_api_url_override(None);
        assert_eq!(config.base_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn defaults_round_trip_into_settings() {
        let config = AppConfig::default();
        assert_eq!(config.sync_settings(), SyncSettings::default());

        let engine = config.engine_settings();
        assert_eq!(engine.client.base_url, ClientSettings::default().base_url);
        let stream = StreamSettings::default();
        assert_eq!(engine.stream.liveness_timeout, stream.liveness_timeout);
        assert_eq!(engine.stream.stable_after, stream.stable_after);
        assert_eq!(engine.stream.max_event_bytes, stream.max_event_bytes);
    }

    #[test]
    fn stability_window_never_exceeds_liveness_timeout() {
        let config = AppConfig {
            liveness_timeout_ms: 10_000,
            stable_after_ms: 60_000,
            ..AppConfig::default()
        };
        assert_eq!(
            config.engine_settings().stream.stable_after,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let config = AppConfig {
            page_size: 0,
            backoff_base_ms: 5_000,
            backoff_max_ms: 1_000,
            ..AppConfig::default()
        };
        let settings = config.sync_settings();
        assert_eq!(settings.page_size, 1);
        assert_eq!(settings.backoff.max_delay, Duration::from_secs(5));
    }
}
