//! Log output for the daemon
//!
//! All diagnostics go to stderr through `tracing`. The format is chosen with
//! `SKYPOST_LOG_FORMAT` (`text`, `json` or `pretty`) and the level with
//! `SKYPOST_LOG_LEVEL`. A `RUST_LOG` filter, when set, replaces both the level
//! and the default per-crate quieting.
//!
//! ```no_run
//! use libskypost::logging::{LogFormat, LoggingConfig};
//!
//! let mut logging = LoggingConfig::from_env(false);
//! logging.format = LogFormat::Json;
//! logging.init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "SKYPOST_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "SKYPOST_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "info";

/// HTTP internals are only interesting when something is badly wrong
const QUIET_CRATES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without colors, suitable for journald or files
    #[default]
    Text,
    /// One JSON object per line, with the current run span flattened in
    Json,
    /// Multi-line colored output for local runs
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "unknown log format '{}', expected text, json or pretty",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Forces `debug` for skypost's own targets
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: DEFAULT_LEVEL.to_string(),
            verbose: false,
        }
    }
}

impl LoggingConfig {
    /// Read `SKYPOST_LOG_FORMAT` and `SKYPOST_LOG_LEVEL` from the process environment
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// An unparseable format falls back to text rather than failing startup.
    pub fn from_lookup<F>(verbose: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = lookup(ENV_LOG_FORMAT)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        let level = lookup(ENV_LOG_LEVEL)
            .map(|raw| raw.trim().to_ascii_lowercase())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        Self {
            format,
            level,
            verbose,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        if self.verbose {
            directives.push("libskypost=debug".to_string());
            directives.push("sky_send=debug".to_string());
        }
        directives.extend(QUIET_CRATES.iter().map(|d| d.to_string()));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber
    ///
    /// Only the first call in a process has an effect.
    pub fn init(&self) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        let installed = match self.format {
            LogFormat::Text => builder.with_ansi(false).with_target(false).try_init(),
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .try_init(),
            LogFormat::Pretty => builder.pretty().with_file(true).with_line_number(true).try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Global subscriber already installed, keeping it");
        }
    }
}
