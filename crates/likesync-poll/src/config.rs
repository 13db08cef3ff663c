//! Daemon configuration loaded from environment variables.
//!
//! There are no CLI flags: the client credentials, API base URL, rate
//! profile, and timing knobs all come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::RateLimit;

/// Rate-limiter profile matching the marketplace API's per-application tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateProfile {
    /// Development application: tight ceilings.
    Dev,
    /// Production application: per-minute budgets.
    Production,
}

impl RateProfile {
    /// Ceiling for query operations (event polling, listing lookups).
    pub fn query_limit(self) -> RateLimit {
        match self {
            Self::Dev => RateLimit::new(1, Duration::from_secs(1)),
            Self::Production => RateLimit::new(500, Duration::from_secs(60)),
        }
    }

    /// Ceiling for command operations (listing updates).
    pub fn command_limit(self) -> RateLimit {
        match self {
            Self::Dev => RateLimit::new(1, Duration::from_secs(2)),
            Self::Production => RateLimit::new(250, Duration::from_secs(60)),
        }
    }
}

impl std::str::FromStr for RateProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown rate profile '{other}', expected 'dev' or 'production'"
            )),
        }
    }
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Integration API client id.
    pub client_id: String,

    /// Integration API client secret.
    pub client_secret: String,

    /// API base URL, without a trailing slash.
    pub base_url: String,

    /// Path of the cursor state file.
    pub state_file: PathBuf,

    /// Rate-limiter profile.
    pub rate_profile: RateProfile,

    /// Re-poll delay after a full page (more events likely pending).
    pub poll_wait: Duration,

    /// Delay after the stream has been drained.
    pub idle_wait: Duration,

    /// Metrics HTTP port (0 disables the /metrics endpoint).
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `LIKESYNC_CLIENT_ID`: Integration API client id
    /// - `LIKESYNC_CLIENT_SECRET`: Integration API client secret
    ///
    /// Optional:
    /// - `LIKESYNC_BASE_URL`: API base URL (default: "https://flex-integ-api.sharetribe.com")
    /// - `LIKESYNC_STATE_FILE`: cursor file path (default: "./likesync.state")
    /// - `LIKESYNC_RATE_PROFILE`: "dev" or "production" (default: "dev")
    /// - `LIKESYNC_POLL_WAIT_MS`: full-page re-poll delay (default: 250)
    /// - `LIKESYNC_IDLE_WAIT_MS`: drained-stream delay (default: 10000)
    /// - `LIKESYNC_METRICS_PORT`: metrics port, 0 disables (default: 9090)
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = require_env("LIKESYNC_CLIENT_ID")?;
        let client_secret = require_env("LIKESYNC_CLIENT_SECRET")?;

        let base_url = std::env::var("LIKESYNC_BASE_URL")
            .unwrap_or_else(|_| "https://flex-integ-api.sharetribe.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let state_file = PathBuf::from(
            std::env::var("LIKESYNC_STATE_FILE").unwrap_or_else(|_| "./likesync.state".to_string()),
        );

        let rate_profile: RateProfile = std::env::var("LIKESYNC_RATE_PROFILE")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("LIKESYNC_RATE_PROFILE: {e}"))?;

        let poll_wait = duration_ms_env("LIKESYNC_POLL_WAIT_MS", 250)?;
        let idle_wait = duration_ms_env("LIKESYNC_IDLE_WAIT_MS", 10_000)?;

        let metrics_port = match std::env::var("LIKESYNC_METRICS_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("LIKESYNC_METRICS_PORT must be a port number"))?,
            Err(_) => 9090,
        };

        tracing::info!(
            base_url = %base_url,
            state_file = %state_file.display(),
            rate_profile = ?rate_profile,
            poll_wait_ms = poll_wait.as_millis() as u64,
            idle_wait_ms = idle_wait.as_millis() as u64,
            metrics_port,
            "configuration loaded"
        );

        Ok(Self {
            client_id,
            client_secret,
            base_url,
            state_file,
            rate_profile,
            poll_wait,
            idle_wait,
            metrics_port,
        })
    }
}

/// Read a required, non-empty environment variable.
fn require_env(key: &str) -> anyhow::Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow::anyhow!("{key} must be set")),
    }
}

/// Read an optional millisecond duration with a default.
fn duration_ms_env(key: &str, default_ms: u64) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| anyhow::anyhow!("{key} must be an integer millisecond value")),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "LIKESYNC_CLIENT_ID",
        "LIKESYNC_CLIENT_SECRET",
        "LIKESYNC_BASE_URL",
        "LIKESYNC_STATE_FILE",
        "LIKESYNC_RATE_PROFILE",
        "LIKESYNC_POLL_WAIT_MS",
        "LIKESYNC_IDLE_WAIT_MS",
        "LIKESYNC_METRICS_PORT",
    ];

    /// Helper to run config tests with isolated env vars.
    /// Uses a mutex to prevent concurrent env var races.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(
            &[
                ("LIKESYNC_CLIENT_ID", "client-id"),
                ("LIKESYNC_CLIENT_SECRET", "client-secret"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.base_url, "https://flex-integ-api.sharetribe.com");
                assert_eq!(config.state_file, PathBuf::from("./likesync.state"));
                assert_eq!(config.rate_profile, RateProfile::Dev);
                assert_eq!(config.poll_wait, Duration::from_millis(250));
                assert_eq!(config.idle_wait, Duration::from_secs(10));
                assert_eq!(config.metrics_port, 9090);
            },
        );
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("LIKESYNC_CLIENT_ID", "client-id"),
                ("LIKESYNC_CLIENT_SECRET", "client-secret"),
                ("LIKESYNC_BASE_URL", "http://localhost:8081/"),
                ("LIKESYNC_STATE_FILE", "/var/lib/likesync/cursor"),
                ("LIKESYNC_RATE_PROFILE", "production"),
                ("LIKESYNC_POLL_WAIT_MS", "100"),
                ("LIKESYNC_IDLE_WAIT_MS", "60000"),
                ("LIKESYNC_METRICS_PORT", "0"),
            ],
            || {
                let config = Config::from_env().unwrap();
                // Trailing slash is stripped so URL joins stay clean.
                assert_eq!(config.base_url, "http://localhost:8081");
                assert_eq!(config.state_file, PathBuf::from("/var/lib/likesync/cursor"));
                assert_eq!(config.rate_profile, RateProfile::Production);
                assert_eq!(config.poll_wait, Duration::from_millis(100));
                assert_eq!(config.idle_wait, Duration::from_secs(60));
                assert_eq!(config.metrics_port, 0);
            },
        );
    }

    #[test]
    fn config_requires_credentials() {
        with_env_vars(&[("LIKESYNC_CLIENT_SECRET", "client-secret")], || {
            assert!(Config::from_env().is_err());
        });

        with_env_vars(
            &[
                ("LIKESYNC_CLIENT_ID", "   "),
                ("LIKESYNC_CLIENT_SECRET", "client-secret"),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn config_rejects_unknown_rate_profile() {
        with_env_vars(
            &[
                ("LIKESYNC_CLIENT_ID", "client-id"),
                ("LIKESYNC_CLIENT_SECRET", "client-secret"),
                ("LIKESYNC_RATE_PROFILE", "staging"),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn rate_profile_parsing_accepts_aliases() {
        assert_eq!("dev".parse::<RateProfile>().unwrap(), RateProfile::Dev);
        assert_eq!(
            "Development".parse::<RateProfile>().unwrap(),
            RateProfile::Dev
        );
        assert_eq!(
            "prod".parse::<RateProfile>().unwrap(),
            RateProfile::Production
        );
        assert_eq!(
            "PRODUCTION".parse::<RateProfile>().unwrap(),
            RateProfile::Production
        );
        assert!("staging".parse::<RateProfile>().is_err());
    }

    #[test]
    fn profiles_set_channel_ceilings() {
        let dev = RateProfile::Dev;
        assert_eq!(dev.query_limit(), RateLimit::new(1, Duration::from_secs(1)));
        assert_eq!(
            dev.command_limit(),
            RateLimit::new(1, Duration::from_secs(2))
        );

        let prod = RateProfile::Production;
        assert_eq!(
            prod.query_limit(),
            RateLimit::new(500, Duration::from_secs(60))
        );
        assert_eq!(
            prod.command_limit(),
            RateLimit::new(250, Duration::from_secs(60))
        );
    }
}
