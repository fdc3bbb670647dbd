//! Cron-driven trigger for the posting workflow
//!
//! The scheduler fires one run immediately at startup and then one at every
//! time matched by the cron expression. Each run is spawned as its own task,
//! so a slow run never delays the next trigger; the workflow's run guard turns
//! overlapping triggers into skipped runs.
//!
//! Expressions use the usual five fields (`min hour day month weekday`); a
//! six-field form with leading seconds is accepted as well. In the five-field
//! form weekdays follow standard cron numbering (0-7, Sunday is 0 or 7); the
//! six-field form is passed to the `cron` crate as is (1-7, Sunday is 1).

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, Result};
use crate::workflow::{PostingWorkflow, RunOutcome};

/// How often the wait loop checks for shutdown
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

/// Parse a cron expression, accepting five or six fields
pub fn parse_cron(expression: &str) -> Result<Schedule> {
    let trimmed = expression.trim();
    let fields = trimmed.split_whitespace().count();

    let invalid = |reason: String| ConfigError::InvalidSchedule {
        expression: expression.to_string(),
        reason,
    };

    let normalized = match fields {
        5 => {
            let mut parts: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
            parts[4] = weekdays_to_cron_crate(&parts[4]).map_err(invalid)?;
            format!("0 {}", parts.join(" "))
        }
        6 => trimmed.to_string(),
        _ => {
            return Err(ConfigError::InvalidSchedule {
                expression: expression.to_string(),
                reason: format!("expected 5 or 6 fields, got {}", fields),
            }
            .into())
        }
    };

    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()).into())
}

/// Rewrite a five-field weekday field (0-7, Sunday is 0 or 7) into the
/// `cron` crate's numbering (1-7, Sunday is 1)
///
/// Names such as `MON-FRI` and `*` pass through unchanged. A numeric range
/// ending on Sunday (`5-7`) becomes `6-7,1`.
fn weekdays_to_cron_crate(field: &str) -> std::result::Result<String, String> {
    let mut out = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let with_step = |range: String| match step {
            Some(step) => format!("{}/{}", range, step),
            None => range,
        };

        if range == "*" || range.chars().any(|c| c.is_ascii_alphabetic()) {
            out.push(item.to_string());
            continue;
        }

        match range.split_once('-') {
            None => {
                let day = weekday_number(range)?;
                out.push(with_step(shift_weekday(day).to_string()));
            }
            Some((start, end)) => {
                let (start, end) = (weekday_number(start)?, weekday_number(end)?);
                if start > end {
                    return Err(format!("weekday range {} runs backwards", range));
                }
                if end == 7 && start > 0 {
                    if step.is_some() {
                        return Err(format!(
                            "stepped weekday range {} ending on 7 is not supported",
                            item
                        ));
                    }
                    out.push(format!("{}-7", shift_weekday(start)));
                    out.push("1".to_string());
                } else {
                    let end = if end == 7 { 6 } else { end };
                    out.push(with_step(format!(
                        "{}-{}",
                        shift_weekday(start),
                        shift_weekday(end)
                    )));
                }
            }
        }
    }

    Ok(out.join(","))
}

fn weekday_number(raw: &str) -> std::result::Result<u8, String> {
    match raw.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("invalid weekday '{}', expected 0-7", raw)),
    }
}

/// 0..=6 with Sunday as 0, or 7 for Sunday, to 1..=7 with Sunday as 1
fn shift_weekday(day: u8) -> u8 {
    if day == 7 {
        1
    } else {
        day + 1
    }
}

pub struct Scheduler {
    workflow: Arc<PostingWorkflow>,
    schedule: Schedule,
    expression: String,
}

impl Scheduler {
    pub fn new(workflow: Arc<PostingWorkflow>, expression: &str) -> Result<Self> {
        Ok(Self {
            workflow,
            schedule: parse_cron(expression)?,
            expression: expression.to_string(),
        })
    }

    /// First fire time strictly after `after`
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Spawn one workflow run
    pub fn trigger(&self, reason: &'static str) -> JoinHandle<RunOutcome> {
        let workflow = Arc::clone(&self.workflow);
        tokio::spawn(async move {
            debug!(reason, "Triggering run");
            let outcome = workflow.run().await;
            debug!(reason, ?outcome, "Run finished");
            outcome
        })
    }

    /// Run until `shutdown` is set
    ///
    /// Fires once immediately, then on every scheduled time. On shutdown no
    /// new runs start and in-flight runs are awaited.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!(schedule = %self.expression, "Scheduler starting");

        let mut in_flight = vec![self.trigger("startup")];

        'schedule: loop {
            let Some(next) = self.next_fire_after(Utc::now()) else {
                warn!(schedule = %self.expression, "Schedule has no upcoming fire times");
                break;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            info!(
                next_run = %next.to_rfc3339(),
                wait = %humantime::format_duration(Duration::from_secs(wait.as_secs())),
                "Next scheduled run"
            );

            // Sleep in short slices so shutdown is noticed promptly
            loop {
                if shutdown.load(Ordering::Relaxed) {
                    info!("Shutdown requested, stopping scheduler");
                    break 'schedule;
                }
                let remaining = (next - Utc::now()).to_std().unwrap_or_default();
                if remaining.is_zero() {
                    break;
                }
                sleep(remaining.min(SHUTDOWN_POLL)).await;
            }

            in_flight.retain(|handle| !handle.is_finished());
            in_flight.push(self.trigger("schedule"));
        }

        for handle in in_flight {
            if let Err(e) = handle.await {
                error!(error = %e, "Workflow run task failed");
            }
        }

        info!("Scheduler stopped");
    }
}
