//! sky-send - Background daemon for scheduled Bluesky posting
//!
//! Picks a random folder from the posts queue on a cron schedule, posts it to
//! Bluesky and moves it to the archive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use libskypost::logging::{LogFormat, LoggingConfig};
use libskypost::platforms::bluesky::BlueskyPlatform;
use libskypost::scheduler::parse_cron;
use libskypost::{Config, PostingWorkflow, QueueStore, RunOutcome, Scheduler, SkypostError};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sky-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled Bluesky posting")]
#[command(long_about = "\
sky-send - Background daemon for scheduled Bluesky posting

DESCRIPTION:
    sky-send is a long-running daemon that posts one queued folder to
    Bluesky every time its schedule fires, plus once right at startup.

    Each folder under the posts directory is one post:

        posts/
          my-first-post/
            text.txt     post body (required)
            photo.jpg    optional image (.jpg, .jpeg, .png, .gif, .webp)
            alt.txt      optional alt text for the image

    After a successful post the folder is moved to the archive directory.
    Folders whose content cannot be read are retried and eventually moved
    to the quarantine directory.

USAGE:
    # Run in foreground (logs to stderr)
    sky-send

    # Post every hour on the hour
    sky-send --schedule '0 * * * *'

    # Post one entry and exit
    sky-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Environment variables, optionally from a .env file in the working
    directory:

    BLUESKY_USERNAME              handle or email (required)
    BLUESKY_PASSWORD              app password (required)
    SKYPOST_SERVICE_URL           default https://bsky.social
    SKYPOST_POSTS_DIR             default ./posts
    SKYPOST_ARCHIVE_DIR           default ./prevPosts
    SKYPOST_QUARANTINE_DIR        default ./quarantine
    SKYPOST_SCHEDULE              default '0 */4 * * *'
    SKYPOST_MAX_CONTENT_FAILURES  default 3, 0 never quarantines
    SKYPOST_LOG_FORMAT            text, json or pretty
    SKYPOST_LOG_LEVEL             default info

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or authentication error
")]
struct Cli {
    /// Cron expression for scheduled runs (overrides SKYPOST_SCHEDULE)
    #[arg(long, value_name = "CRON", env = "SKYPOST_SCHEDULE")]
    schedule: Option<String>,

    /// Log output format
    #[arg(long, value_name = "FORMAT", env = "SKYPOST_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit
    #[arg(long)]
    #[arg(help = "Post at most one entry and exit, without scheduling")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);

        let exit_code = e
            .downcast_ref::<SkypostError>()
            .map(|e| e.exit_code())
            .unwrap_or(1);
        std::process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(schedule) = cli.schedule {
        parse_cron(&schedule)?;
        config.schedule = schedule;
    }

    QueueStore::new(config.queue.clone()).ensure_dirs().await?;

    info!(
        posts_dir = %config.queue.posts_dir.display(),
        archive_dir = %config.queue.archive_dir.display(),
        service = %config.service_url,
        "sky-send daemon starting"
    );

    let platform = BlueskyPlatform::new(config.service_url.clone())?;
    let schedule = config.schedule.clone();
    let workflow = PostingWorkflow::from_config(config, Arc::new(platform));

    if cli.once {
        let outcome = workflow.run().await;
        info!(
            entry = outcome.entry().map(|id| id.as_str()).unwrap_or("-"),
            published = outcome.published(),
            "sky-send: processed queue once, exiting"
        );
        return match outcome {
            RunOutcome::Aborted { error, .. } => Err(error.into()),
            RunOutcome::PostedNotArchived { error, .. } => Err(error.into()),
            _ => Ok(()),
        };
    }

    let scheduler = Scheduler::new(Arc::new(workflow), &schedule)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(Arc::clone(&shutdown))?;

    scheduler.run(shutdown).await;

    info!("sky-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use anyhow::Context;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, stopping gracefully...");
                shutdown.store(true, Ordering::Relaxed);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    Ok(())
}
