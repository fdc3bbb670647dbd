//! Bluesky platform implementation
//!
//! Speaks AT Protocol XRPC over HTTP to a PDS:
//! - `com.atproto.server.createSession` to log in
//! - `com.atproto.repo.uploadBlob` to upload an image
//! - `com.atproto.repo.createRecord` to write an `app.bsky.feed.post`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{BlobRef, ImageMimeType, PostPayload, PostReceipt, Session, POST_LANGUAGE};

/// Bluesky counts graphemes; this is the documented post limit
const CHARACTER_LIMIT: usize = 300;
/// Largest image blob the app view accepts for post embeds
const MAX_BLOB_SIZE: usize = 1_000_000;

const FEED_POST_COLLECTION: &str = "app.bsky.feed.post";
const IMAGES_EMBED_TYPE: &str = "app.bsky.embed.images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Authentication,
    Upload,
    Posting,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Authentication => "authentication",
            Operation::Upload => "upload",
            Operation::Posting => "posting",
        }
    }

    /// Error for a failure that is not a transport or rate limit problem
    fn failure(&self, detail: String) -> PlatformError {
        match self {
            Operation::Authentication => PlatformError::Authentication(format!(
                "Bluesky authentication failed: {}. Please check your handle and app password.",
                detail
            )),
            Operation::Upload => {
                PlatformError::Upload(format!("Bluesky rejected the image: {}", detail))
            }
            Operation::Posting => {
                PlatformError::Posting(format!("Bluesky rejected the post: {}", detail))
            }
        }
    }
}

/// XRPC error body
#[derive(Debug, Deserialize)]
struct XrpcError {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success XRPC response to a `PlatformError`
///
/// Rate limiting wins over everything else; any failure while logging in, or
/// a token problem later on, is an authentication error; the rest are
/// attributed to the operation that was running.
fn map_xrpc_error(status: StatusCode, body: &str, operation: Operation) -> PlatformError {
    let parsed = serde_json::from_str::<XrpcError>(body).ok();
    let code = parsed.as_ref().map(|e| e.error.as_str()).unwrap_or_default();

    let detail = match &parsed {
        Some(XrpcError {
            error,
            message: Some(message),
        }) => format!("{} ({}): {}", error, status, message),
        Some(XrpcError {
            error,
            message: None,
        }) => format!("{} ({})", error, status),
        None if body.trim().is_empty() => status.to_string(),
        None => format!("{}: {}", status, body.trim()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || code == "RateLimitExceeded" {
        return PlatformError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}. Please wait before trying again.",
            operation.as_str(),
            detail
        ));
    }

    let token_problem = matches!(
        code,
        "AuthenticationRequired" | "InvalidToken" | "ExpiredToken" | "AccountTakedown"
    ) || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN;

    if token_problem && operation != Operation::Authentication {
        return PlatformError::Authentication(format!(
            "Bluesky session rejected during {}: {}",
            operation.as_str(),
            detail
        ));
    }

    operation.failure(detail)
}

fn map_transport_error(error: reqwest::Error, operation: Operation) -> PlatformError {
    PlatformError::Network(format!(
        "Network error while connecting to Bluesky PDS during {}: {}",
        operation.as_str(),
        error
    ))
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    did: String,
    handle: String,
    access_jwt: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: BlobRef,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'static str,
    record: FeedPostRecord<'a>,
}

/// `app.bsky.feed.post` record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedPostRecord<'a> {
    #[serde(rename = "$type")]
    record_type: &'static str,
    text: &'a str,
    created_at: String,
    langs: [&'static str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<ImagesEmbed<'a>>,
}

#[derive(Debug, Serialize)]
struct ImagesEmbed<'a> {
    #[serde(rename = "$type")]
    embed_type: &'static str,
    images: Vec<EmbeddedImage<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbeddedImage<'a> {
    alt: &'a str,
    image: &'a BlobRef,
}

impl<'a> FeedPostRecord<'a> {
    fn from_payload(post: &'a PostPayload) -> Self {
        let embed = post.embed().map(|image| ImagesEmbed {
            embed_type: IMAGES_EMBED_TYPE,
            images: vec![EmbeddedImage {
                alt: &image.alt,
                image: &image.blob,
            }],
        });

        Self {
            record_type: FEED_POST_COLLECTION,
            text: post.body(),
            created_at: post.created_at_iso(),
            langs: [POST_LANGUAGE],
            embed,
        }
    }
}

pub struct BlueskyPlatform {
    http: Client,
    service_url: String,
}

impl BlueskyPlatform {
    /// Create a client for the PDS at `service_url` (e.g., "https://bsky.social")
    pub fn new(service_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("skypost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            service_url: service_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, method)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: Operation,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_xrpc_error(status, &body, operation).into());
        }

        response.json::<T>().await.map_err(|e| {
            operation
                .failure(format!("unexpected response body: {}", e))
                .into()
        })
    }
}

#[async_trait]
impl Platform for BlueskyPlatform {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        tracing::debug!("Creating Bluesky session for handle: {}", credentials.identifier);

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&CreateSessionRequest {
                identifier: &credentials.identifier,
                password: credentials.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| map_transport_error(e, Operation::Authentication))?;

        let session: CreateSessionResponse =
            Self::read_json(response, Operation::Authentication).await?;
        tracing::debug!(did = %session.did, "Bluesky session created");

        Ok(Session {
            did: session.did,
            handle: session.handle,
            access_jwt: session.access_jwt.into(),
        })
    }

    async fn upload_asset(
        &self,
        session: &Session,
        bytes: &[u8],
        mime_type: ImageMimeType,
    ) -> Result<BlobRef> {
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(PlatformError::Upload(format!(
                "Image is {} bytes; Bluesky accepts at most {} bytes",
                bytes.len(),
                MAX_BLOB_SIZE
            ))
            .into());
        }

        tracing::debug!(size = bytes.len(), %mime_type, "Uploading blob to Bluesky");

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.uploadBlob"))
            .bearer_auth(session.access_jwt.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, mime_type.as_str())
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| map_transport_error(e, Operation::Upload))?;

        let uploaded: UploadBlobResponse = Self::read_json(response, Operation::Upload).await?;
        Ok(uploaded.blob)
    }

    async fn publish(&self, session: &Session, post: &PostPayload) -> Result<PostReceipt> {
        tracing::debug!("Posting to Bluesky: {} characters", post.body().chars().count());

        let request = CreateRecordRequest {
            repo: &session.did,
            collection: FEED_POST_COLLECTION,
            record: FeedPostRecord::from_payload(post),
        };

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .bearer_auth(session.access_jwt.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, Operation::Posting))?;

        let receipt: PostReceipt = Self::read_json(response, Operation::Posting).await?;
        tracing::debug!("Posted to Bluesky: {}", receipt.uri);

        Ok(receipt)
    }

    fn name(&self) -> &str {
        "bluesky"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(CHARACTER_LIMIT)
    }
}
