//! Core types for Skypost

use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Language tag attached to every post
pub const POST_LANGUAGE: &str = "en-US";

/// Alt text used when an image is posted without an `alt.txt`
pub const DEFAULT_ALT_TEXT: &str = "Image";

/// Identifier of a queue entry (the folder name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ============================================================================
// Image Types
// ============================================================================

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from a file name, looking only at the final extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single image consumed from an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: ImageMimeType,
}

/// Fully loaded content of one pending entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: EntryId,
    /// Trimmed, never empty
    pub text: String,
    /// Trimmed, never empty when present
    pub alt_text: Option<String>,
    pub image: Option<ImageAsset>,
}

// ============================================================================
// Platform Types
// ============================================================================

/// Authenticated context for a single workflow run
///
/// Created by [`crate::platforms::Platform::authenticate`] and dropped at the
/// end of the run. Never cached between runs.
#[derive(Debug)]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: SecretString,
}

/// Opaque reference to an uploaded blob, as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub serde_json::Value);

/// Image attached to a post
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEmbed {
    pub blob: BlobRef,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPost {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextWithImagePost {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub image: ImageEmbed,
}

/// A post ready to be submitted
#[derive(Debug, Clone, PartialEq)]
pub enum PostPayload {
    Text(TextPost),
    TextWithImage(TextWithImagePost),
}

impl PostPayload {
    /// Text-only post stamped with the current time
    pub fn text(text: impl Into<String>) -> Self {
        PostPayload::Text(TextPost {
            text: text.into(),
            created_at: Utc::now(),
        })
    }

    /// Post with an uploaded image stamped with the current time
    ///
    /// Falls back to [`DEFAULT_ALT_TEXT`] when no alt text is given.
    pub fn with_image(text: impl Into<String>, blob: BlobRef, alt: Option<String>) -> Self {
        PostPayload::TextWithImage(TextWithImagePost {
            text: text.into(),
            created_at: Utc::now(),
            image: ImageEmbed {
                blob,
                alt: alt.unwrap_or_else(|| DEFAULT_ALT_TEXT.to_string()),
            },
        })
    }

    pub fn body(&self) -> &str {
        match self {
            PostPayload::Text(post) => &post.text,
            PostPayload::TextWithImage(post) => &post.text,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            PostPayload::Text(post) => post.created_at,
            PostPayload::TextWithImage(post) => post.created_at,
        }
    }

    /// ISO-8601 UTC timestamp as sent to the platform
    pub fn created_at_iso(&self) -> String {
        self.created_at().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn embed(&self) -> Option<&ImageEmbed> {
        match self {
            PostPayload::Text(_) => None,
            PostPayload::TextWithImage(post) => Some(&post.image),
        }
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReceipt {
    pub uri: String,
    pub cid: String,
}
