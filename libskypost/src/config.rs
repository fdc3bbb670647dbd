//! Configuration management for Skypost
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file). Only the platform credentials are required; everything else
//! has a default matching the on-disk layout:
//!
//! ```text
//! ./posts/<entry>/text.txt      pending entries
//! ./prevPosts/<entry>/...       archive
//! ./quarantine/<entry>/...      entries that repeatedly failed to load
//! ```

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::{ConfigError, Result};
use crate::scheduler::parse_cron;

pub const ENV_USERNAME: &str = "BLUESKY_USERNAME";
pub const ENV_PASSWORD: &str = "BLUESKY_PASSWORD";
pub const ENV_SERVICE_URL: &str = "SKYPOST_SERVICE_URL";
pub const ENV_POSTS_DIR: &str = "SKYPOST_POSTS_DIR";
pub const ENV_ARCHIVE_DIR: &str = "SKYPOST_ARCHIVE_DIR";
pub const ENV_QUARANTINE_DIR: &str = "SKYPOST_QUARANTINE_DIR";
pub const ENV_SCHEDULE: &str = "SKYPOST_SCHEDULE";
pub const ENV_MAX_CONTENT_FAILURES: &str = "SKYPOST_MAX_CONTENT_FAILURES";

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_POSTS_DIR: &str = "./posts";
pub const DEFAULT_ARCHIVE_DIR: &str = "./prevPosts";
pub const DEFAULT_QUARANTINE_DIR: &str = "./quarantine";
/// Every four hours, on the hour
pub const DEFAULT_SCHEDULE: &str = "0 */4 * * *";
pub const DEFAULT_MAX_CONTENT_FAILURES: u32 = 3;

#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub service_url: String,
    pub queue: QueueConfig,
    pub schedule: String,
    /// Consecutive content failures before an entry is quarantined; 0 disables
    pub max_content_failures: u32,
}

/// Platform login
#[derive(Debug)]
pub struct Credentials {
    pub identifier: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub posts_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub quarantine_dir: PathBuf,
}

impl QueueConfig {
    /// Queue layout rooted at `base` using the default directory names
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            posts_dir: base.join("posts"),
            archive_dir: base.join("prevPosts"),
            quarantine_dir: base.join("quarantine"),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from(DEFAULT_POSTS_DIR),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            quarantine_dir: PathBuf::from(DEFAULT_QUARANTINE_DIR),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment take precedence.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let identifier = get(ENV_USERNAME)
            .ok_or_else(|| ConfigError::MissingVar(ENV_USERNAME.to_string()))?;
        let password =
            get(ENV_PASSWORD).ok_or_else(|| ConfigError::MissingVar(ENV_PASSWORD.to_string()))?;

        let service_url = get(ENV_SERVICE_URL)
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let defaults = QueueConfig::default();
        let queue = QueueConfig {
            posts_dir: get(ENV_POSTS_DIR).map(PathBuf::from).unwrap_or(defaults.posts_dir),
            archive_dir: get(ENV_ARCHIVE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.archive_dir),
            quarantine_dir: get(ENV_QUARANTINE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.quarantine_dir),
        };

        let schedule = get(ENV_SCHEDULE).unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());
        parse_cron(&schedule)?;

        let max_content_failures = match get(ENV_MAX_CONTENT_FAILURES) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                name: ENV_MAX_CONTENT_FAILURES.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_CONTENT_FAILURES,
        };

        Ok(Self {
            credentials: Credentials::new(identifier.trim(), password),
            service_url,
            queue,
            schedule,
            max_content_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkypostError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_only_credentials() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "app-password"),
        ]))
        .unwrap();

        assert_eq!(config.credentials.identifier, "bot.bsky.social");
        assert_eq!(config.credentials.password.expose_secret(), "app-password");
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.queue.posts_dir, PathBuf::from("./posts"));
        assert_eq!(config.queue.archive_dir, PathBuf::from("./prevPosts"));
        assert_eq!(config.queue.quarantine_dir, PathBuf::from("./quarantine"));
        assert_eq!(config.schedule, DEFAULT_SCHEDULE);
        assert_eq!(config.max_content_failures, 3);
    }

    #[test]
    fn test_missing_username_fails() {
        let result = Config::from_lookup(lookup_from(&[(ENV_PASSWORD, "app-password")]));

        match result {
            Err(SkypostError::Config(ConfigError::MissingVar(name))) => {
                assert_eq!(name, ENV_USERNAME);
            }
            other => panic!("Expected MissingVar, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_password_counts_as_missing() {
        let result = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "   "),
        ]));

        match result {
            Err(SkypostError::Config(ConfigError::MissingVar(name))) => {
                assert_eq!(name, ENV_PASSWORD);
            }
            other => panic!("Expected MissingVar, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "app-password"),
            (ENV_SERVICE_URL, "https://pds.example.com/"),
            (ENV_POSTS_DIR, "/srv/queue"),
            (ENV_ARCHIVE_DIR, "/srv/done"),
            (ENV_QUARANTINE_DIR, "/srv/broken"),
            (ENV_SCHEDULE, "*/5 * * * *"),
            (ENV_MAX_CONTENT_FAILURES, "0"),
        ]))
        .unwrap();

        assert_eq!(config.service_url, "https://pds.example.com");
        assert_eq!(config.queue.posts_dir, PathBuf::from("/srv/queue"));
        assert_eq!(config.queue.archive_dir, PathBuf::from("/srv/done"));
        assert_eq!(config.queue.quarantine_dir, PathBuf::from("/srv/broken"));
        assert_eq!(config.schedule, "*/5 * * * *");
        assert_eq!(config.max_content_failures, 0);
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "app-password"),
            (ENV_SCHEDULE, "every four hours"),
        ]));

        assert!(matches!(
            result,
            Err(SkypostError::Config(ConfigError::InvalidSchedule { .. }))
        ));
    }

    #[test]
    fn test_invalid_failure_threshold_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "app-password"),
            (ENV_MAX_CONTENT_FAILURES, "three"),
        ]));

        match result {
            Err(SkypostError::Config(ConfigError::InvalidValue { name, .. })) => {
                assert_eq!(name, ENV_MAX_CONTENT_FAILURES);
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_USERNAME, "bot.bsky.social"),
            (ENV_PASSWORD, "hunter2-app-password"),
        ]))
        .unwrap();

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("hunter2-app-password"));
    }

    #[test]
    fn test_queue_config_rooted_at() {
        let queue = QueueConfig::rooted_at(Path::new("/tmp/bot"));
        assert_eq!(queue.posts_dir, PathBuf::from("/tmp/bot/posts"));
        assert_eq!(queue.archive_dir, PathBuf::from("/tmp/bot/prevPosts"));
        assert_eq!(queue.quarantine_dir, PathBuf::from("/tmp/bot/quarantine"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var(ENV_USERNAME, "env.bsky.social");
        std::env::set_var(ENV_PASSWORD, "env-password");
        std::env::set_var(ENV_MAX_CONTENT_FAILURES, "5");

        let config = Config::from_env().unwrap();

        std::env::remove_var(ENV_USERNAME);
        std::env::remove_var(ENV_PASSWORD);
        std::env::remove_var(ENV_MAX_CONTENT_FAILURES);

        assert_eq!(config.credentials.identifier, "env.bsky.social");
        assert_eq!(config.max_content_failures, 5);
    }
}
