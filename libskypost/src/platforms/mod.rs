//! Platform abstraction and implementations
//!
//! A platform authenticates, uploads images and publishes posts. Every call
//! after `authenticate` takes the [`Session`] it returned, so a session lives
//! exactly as long as the workflow run that created it.
//!
//! # Examples
//!
//! ```no_run
//! use libskypost::config::Credentials;
//! use libskypost::platforms::{bluesky::BlueskyPlatform, Platform};
//! use libskypost::types::PostPayload;
//!
//! # async fn example() -> libskypost::error::Result<()> {
//! let platform = BlueskyPlatform::new("https://bsky.social")?;
//! let credentials = Credentials::new("bot.bsky.social", "app-password");
//!
//! let session = platform.authenticate(&credentials).await?;
//! let receipt = platform
//!     .publish(&session, &PostPayload::text("Hello from the queue"))
//!     .await?;
//! println!("Posted: {}", receipt.uri);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;
use crate::types::{BlobRef, ImageMimeType, PostPayload, PostReceipt, Session};

pub mod bluesky;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Platform trait for social media interactions
#[async_trait]
pub trait Platform: Send + Sync {
    /// Exchange credentials for a fresh session
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected,
    /// or `PlatformError::Network` if the service cannot be reached.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;

    /// Upload binary image content
    ///
    /// Returns an opaque reference to embed in a later [`Platform::publish`].
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Upload` if the platform rejects the blob.
    async fn upload_asset(
        &self,
        session: &Session,
        bytes: &[u8],
        mime_type: ImageMimeType,
    ) -> Result<BlobRef>;

    /// Submit a post
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Posting` if the platform rejects the post
    /// (for example because the text is over the platform's limit).
    async fn publish(&self, session: &Session, post: &PostPayload) -> Result<PostReceipt>;

    /// Lowercase platform identifier (e.g., "bluesky")
    fn name(&self) -> &str;

    /// Maximum post length, if the platform has one
    ///
    /// Used for diagnostics only; posts over the limit are still submitted.
    fn character_limit(&self) -> Option<usize>;
}
