//! Skypost - scheduled posting from a folder queue to Bluesky
//!
//! Pending posts are folders under `./posts`. On every trigger one folder is
//! picked at random, its text and optional image are posted, and the folder is
//! moved to `./prevPosts`.

pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod queue;
pub mod scheduler;
pub mod types;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, Credentials, QueueConfig};
pub use content::ContentLoader;
pub use error::{Result, SkypostError};
pub use queue::QueueStore;
pub use scheduler::Scheduler;
pub use types::{EntryId, PostPayload, PostReceipt, QueueEntry, Session};
pub use workflow::{PostingWorkflow, RunOutcome, RunStage};
