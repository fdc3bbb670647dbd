//! Posting workflow
//!
//! One run takes a single entry through the queue:
//!
//! ```text
//! SELECTING -> (empty queue: done, nothing to do)
//! LOADING -> (bad content: aborted, entry stays pending or is quarantined)
//! AUTHENTICATING -> UPLOADING (only with an image) -> PUBLISHING
//! ARCHIVING -> (failure: posted but still pending, logged as an error)
//! ```
//!
//! Selection and loading happen before any network call, so an empty queue or
//! a broken entry never touches the platform. Every fault is turned into a
//! [`RunOutcome`]; nothing escapes a run.
//!
//! Runs are mutually exclusive: a run that starts while another is still in
//! flight returns [`RunOutcome::Skipped`] immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, Credentials};
use crate::content::ContentLoader;
use crate::error::SkypostError;
use crate::platforms::Platform;
use crate::queue::QueueStore;
use crate::types::{EntryId, PostPayload, PostReceipt, QueueEntry, Session};

/// Stage of a run, named after the state machine above
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Selecting,
    Loading,
    Authenticating,
    Uploading,
    Publishing,
    Archiving,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Selecting => "selecting",
            RunStage::Loading => "loading",
            RunStage::Authenticating => "authenticating",
            RunStage::Uploading => "uploading",
            RunStage::Publishing => "publishing",
            RunStage::Archiving => "archiving",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Published and archived
    Posted {
        entry: EntryId,
        receipt: PostReceipt,
    },
    /// No pending entries
    EmptyQueue,
    /// Another run was in progress
    Skipped,
    /// Stopped before anything was published; the queue is unchanged
    Aborted {
        entry: Option<EntryId>,
        stage: RunStage,
        error: SkypostError,
    },
    /// Content failed to load too many times and the entry was set aside
    Quarantined {
        entry: EntryId,
        error: SkypostError,
    },
    /// Published, but the entry could not be archived and is still pending
    PostedNotArchived {
        entry: EntryId,
        receipt: PostReceipt,
        error: SkypostError,
    },
}

impl RunOutcome {
    /// True if the run published a post
    pub fn published(&self) -> bool {
        matches!(
            self,
            RunOutcome::Posted { .. } | RunOutcome::PostedNotArchived { .. }
        )
    }

    pub fn entry(&self) -> Option<&EntryId> {
        match self {
            RunOutcome::Posted { entry, .. }
            | RunOutcome::Quarantined { entry, .. }
            | RunOutcome::PostedNotArchived { entry, .. } => Some(entry),
            RunOutcome::Aborted { entry, .. } => entry.as_ref(),
            RunOutcome::EmptyQueue | RunOutcome::Skipped => None,
        }
    }
}

pub struct PostingWorkflow {
    queue: QueueStore,
    loader: ContentLoader,
    platform: Arc<dyn Platform>,
    credentials: Credentials,
    max_content_failures: u32,
    content_failures: Mutex<HashMap<EntryId, u32>>,
    run_lock: AsyncMutex<()>,
}

impl PostingWorkflow {
    pub fn new(queue: QueueStore, platform: Arc<dyn Platform>, credentials: Credentials) -> Self {
        let loader = ContentLoader::new(queue.posts_dir());
        Self {
            queue,
            loader,
            platform,
            credentials,
            max_content_failures: crate::config::DEFAULT_MAX_CONTENT_FAILURES,
            content_failures: Mutex::new(HashMap::new()),
            run_lock: AsyncMutex::new(()),
        }
    }

    /// Build a workflow from loaded configuration
    pub fn from_config(config: Config, platform: Arc<dyn Platform>) -> Self {
        Self::new(QueueStore::new(config.queue), platform, config.credentials)
            .with_max_content_failures(config.max_content_failures)
    }

    /// Consecutive content failures before an entry is quarantined; 0 never quarantines
    pub fn with_max_content_failures(mut self, max: u32) -> Self {
        self.max_content_failures = max;
        self
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Recorded consecutive content failures for an entry
    pub fn content_failures(&self, id: &EntryId) -> u32 {
        self.failure_counts().get(id).copied().unwrap_or(0)
    }

    fn failure_counts(&self) -> std::sync::MutexGuard<'_, HashMap<EntryId, u32>> {
        // A poisoned map only loses counts; keep going with what is there
        self.content_failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Execute one run
    ///
    /// Never fails: every error is logged and reported in the outcome.
    pub async fn run(&self) -> RunOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            info!("Previous run still in progress, skipping this trigger");
            return RunOutcome::Skipped;
        };

        let span = info_span!("run", run_id = %Uuid::new_v4());
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> RunOutcome {
        let entry_id = match self.queue.select_random().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!(
                    posts_dir = %self.queue.posts_dir().display(),
                    "No pending entries, nothing to post"
                );
                return RunOutcome::EmptyQueue;
            }
            Err(error) => return aborted(None, RunStage::Selecting, error),
        };
        info!(entry = %entry_id, "Selected entry");

        let entry = match self.loader.load(&entry_id).await {
            Ok(entry) => entry,
            Err(error) => return self.content_failure(entry_id, error).await,
        };
        self.failure_counts().remove(&entry_id);

        if let Some(limit) = self.platform.character_limit() {
            let length = entry.text.chars().count();
            if length > limit {
                warn!(
                    entry = %entry_id,
                    length,
                    limit,
                    "Text is longer than the {} limit; the post will likely be rejected",
                    self.platform.name()
                );
            }
        }

        let session = match self.platform.authenticate(&self.credentials).await {
            Ok(session) => session,
            Err(error) => return aborted(Some(entry_id), RunStage::Authenticating, error),
        };
        debug!(did = %session.did, "Authenticated");

        let payload = match self.compose(&session, &entry).await {
            Ok(payload) => payload,
            Err(error) => return aborted(Some(entry_id), RunStage::Uploading, error),
        };

        let receipt = match self.platform.publish(&session, &payload).await {
            Ok(receipt) => receipt,
            Err(error) => return aborted(Some(entry_id), RunStage::Publishing, error),
        };
        info!(entry = %entry_id, uri = %receipt.uri, "Published post");

        match self.queue.archive(&entry_id).await {
            Ok(destination) => {
                info!(
                    entry = %entry_id,
                    archive = %destination.display(),
                    "Posted content and moved it to the archive"
                );
                RunOutcome::Posted {
                    entry: entry_id,
                    receipt,
                }
            }
            Err(error) => {
                error!(
                    entry = %entry_id,
                    uri = %receipt.uri,
                    error = %error,
                    "Post published but entry could not be archived; it may be posted again"
                );
                RunOutcome::PostedNotArchived {
                    entry: entry_id,
                    receipt,
                    error,
                }
            }
        }
    }

    /// Upload the image, if any, and build the post
    async fn compose(
        &self,
        session: &Session,
        entry: &QueueEntry,
    ) -> Result<PostPayload, SkypostError> {
        let Some(image) = &entry.image else {
            if entry.alt_text.is_some() {
                debug!(entry = %entry.id, "alt.txt present without an image, ignoring");
            }
            return Ok(PostPayload::text(entry.text.clone()));
        };

        let blob = self
            .platform
            .upload_asset(session, &image.bytes, image.mime_type)
            .await?;
        debug!(entry = %entry.id, file = %image.file_name, "Uploaded image");

        Ok(PostPayload::with_image(
            entry.text.clone(),
            blob,
            entry.alt_text.clone(),
        ))
    }

    async fn content_failure(&self, entry_id: EntryId, error: SkypostError) -> RunOutcome {
        let failures = {
            let mut counts = self.failure_counts();
            let count = counts.entry(entry_id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if self.max_content_failures == 0 || failures < self.max_content_failures {
            warn!(
                entry = %entry_id,
                failures,
                "Entry content could not be loaded; leaving it pending"
            );
            return aborted(Some(entry_id), RunStage::Loading, error);
        }

        match self.queue.quarantine(&entry_id).await {
            Ok(destination) => {
                self.failure_counts().remove(&entry_id);
                warn!(
                    entry = %entry_id,
                    failures,
                    quarantine = %destination.display(),
                    error = %error,
                    "Entry failed to load too many times, moved to quarantine"
                );
                RunOutcome::Quarantined {
                    entry: entry_id,
                    error,
                }
            }
            Err(quarantine_error) => {
                error!(
                    entry = %entry_id,
                    error = %quarantine_error,
                    "Failed to quarantine entry"
                );
                aborted(Some(entry_id), RunStage::Loading, error)
            }
        }
    }
}

fn aborted(entry: Option<EntryId>, stage: RunStage, error: SkypostError) -> RunOutcome {
    match &entry {
        Some(id) => warn!(entry = %id, %stage, error = %error, "Run aborted"),
        None => warn!(%stage, error = %error, "Run aborted"),
    }
    RunOutcome::Aborted {
        entry,
        stage,
        error,
    }
}
