//! Mock platform implementation for testing
//!
//! This module provides a configurable mock platform that can simulate
//! successes, failures at each step, and network delays. It records every call
//! so tests can assert exactly what would have been sent to the platform.
//!
//! Clones share their call records, so a test can hand one clone to the
//! workflow and inspect another.

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Credentials;
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{BlobRef, ImageMimeType, PostPayload, PostReceipt, Session};

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name
    pub name: String,

    /// Error to return from authenticate, if any
    pub auth_error: Option<String>,

    /// Error to return from upload_asset, if any
    pub upload_error: Option<String>,

    /// Error to return from publish, if any
    pub post_error: Option<String>,

    /// Delay before completing each operation (simulates network latency)
    pub delay: Duration,

    /// Reported character limit
    pub character_limit: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_error: None,
            upload_error: None,
            post_error: None,
            delay: Duration::from_millis(0),
            character_limit: None,
        }
    }
}

/// One recorded upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub bytes: Vec<u8>,
    pub mime_type: ImageMimeType,
}

#[derive(Debug, Default)]
struct CallLog {
    auth_calls: usize,
    identifiers: Vec<String>,
    uploads: Vec<UploadCall>,
    post_calls: usize,
    published: Vec<PostPayload>,
}

/// Mock platform for testing
#[derive(Debug, Clone)]
pub struct MockPlatform {
    config: MockConfig,
    calls: Arc<Mutex<CallLog>>,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Create a mock platform that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock platform that fails authentication
    pub fn auth_failure(error: &str) -> Self {
        Self::new(MockConfig {
            auth_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock platform that fails image uploads
    pub fn upload_failure(error: &str) -> Self {
        Self::new(MockConfig {
            upload_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock platform that fails posting
    pub fn post_failure(error: &str) -> Self {
        Self::new(MockConfig {
            post_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock platform with a delay on every operation
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Get the number of times authenticate was called
    pub fn auth_call_count(&self) -> usize {
        self.calls.lock().unwrap().auth_calls
    }

    /// Identifiers passed to authenticate, in call order
    pub fn authenticated_identifiers(&self) -> Vec<String> {
        self.calls.lock().unwrap().identifiers.clone()
    }

    /// Get the number of times upload_asset was called
    pub fn upload_call_count(&self) -> usize {
        self.calls.lock().unwrap().uploads.len()
    }

    /// All uploads, in call order
    pub fn uploads(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().uploads.clone()
    }

    /// Get the number of times publish was called
    pub fn post_call_count(&self) -> usize {
        self.calls.lock().unwrap().post_calls
    }

    /// Posts that were published successfully
    pub fn published(&self) -> Vec<PostPayload> {
        self.calls.lock().unwrap().published.clone()
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.auth_calls += 1;
            calls.identifiers.push(credentials.identifier.clone());
        }

        self.simulate_latency().await;

        if let Some(error) = &self.config.auth_error {
            return Err(PlatformError::Authentication(error.clone()).into());
        }

        Ok(Session {
            did: format!("did:plc:{}", self.config.name),
            handle: credentials.identifier.clone(),
            access_jwt: SecretString::from(format!("mock-jwt-{}", uuid::Uuid::new_v4())),
        })
    }

    async fn upload_asset(
        &self,
        _session: &Session,
        bytes: &[u8],
        mime_type: ImageMimeType,
    ) -> Result<BlobRef> {
        self.calls.lock().unwrap().uploads.push(UploadCall {
            bytes: bytes.to_vec(),
            mime_type,
        });

        self.simulate_latency().await;

        if let Some(error) = &self.config.upload_error {
            return Err(PlatformError::Upload(error.clone()).into());
        }

        Ok(BlobRef(serde_json::json!({
            "$type": "blob",
            "ref": { "$link": format!("mock-{}", uuid::Uuid::new_v4()) },
            "mimeType": mime_type.as_str(),
            "size": bytes.len(),
        })))
    }

    async fn publish(&self, session: &Session, post: &PostPayload) -> Result<PostReceipt> {
        self.calls.lock().unwrap().post_calls += 1;

        self.simulate_latency().await;

        if let Some(error) = &self.config.post_error {
            return Err(PlatformError::Posting(error.clone()).into());
        }

        self.calls.lock().unwrap().published.push(post.clone());

        let rkey = uuid::Uuid::new_v4().simple().to_string();
        Ok(PostReceipt {
            uri: format!("at://{}/app.bsky.feed.post/{}", session.did, rkey),
            cid: format!("mock-cid-{}", rkey),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}
