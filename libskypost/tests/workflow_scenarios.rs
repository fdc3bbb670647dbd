//! End-to-end workflow tests against the mock platform
//!
//! Each test builds a real queue on disk in a temp directory and checks both
//! what the platform saw and what the queue looks like afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use libskypost::error::{ContentError, PlatformError};
use libskypost::platforms::mock::MockPlatform;
use libskypost::types::ImageMimeType;
use libskypost::{
    Credentials, EntryId, PostingWorkflow, QueueConfig, QueueStore, RunOutcome, RunStage,
    SkypostError,
};
use tempfile::TempDir;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-cat";

struct TestQueue {
    _temp_dir: TempDir,
    config: QueueConfig,
}

impl TestQueue {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = QueueConfig::rooted_at(temp_dir.path());
        fs::create_dir_all(&config.posts_dir).unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    fn add(&self, name: &str, files: &[(&str, &str)]) {
        let dir = self.config.posts_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), content).unwrap();
        }
    }

    fn add_image(&self, name: &str, file: &str, bytes: &[u8]) {
        fs::write(self.config.posts_dir.join(name).join(file), bytes).unwrap();
    }

    fn workflow(&self, platform: &MockPlatform) -> PostingWorkflow {
        PostingWorkflow::new(
            QueueStore::new(self.config.clone()),
            Arc::new(platform.clone()),
            Credentials::new("khbot.bsky.social", "app-password"),
        )
    }

    fn pending(&self) -> Vec<String> {
        dir_names(&self.config.posts_dir)
    }

    fn archived(&self) -> Vec<String> {
        dir_names(&self.config.archive_dir)
    }
}

fn dir_names(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// File name -> content for every file in a directory
fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .map(|e| (e.file_name().to_string_lossy().to_string(), fs::read(e.path()).unwrap()))
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_text_only_entry_is_posted_and_archived() {
    let queue = TestQueue::new();
    queue.add("folder1", &[("text.txt", "Hello world")]);
    let platform = MockPlatform::success();

    let outcome = queue.workflow(&platform).run().await;

    assert!(matches!(outcome, RunOutcome::Posted { .. }));
    assert_eq!(platform.post_call_count(), 1);
    let published = platform.published();
    assert_eq!(published[0].body(), "Hello world");
    assert!(published[0].embed().is_none());
    assert!(queue.pending().is_empty());
    assert_eq!(queue.archived(), vec!["folder1"]);
}

#[tokio::test]
async fn scenario_b_image_entry_uploads_then_embeds() {
    let queue = TestQueue::new();
    queue.add(
        "folder2",
        &[("text.txt", "Look!"), ("alt.txt", "A cat")],
    );
    queue.add_image("folder2", "cat.png", PNG_BYTES);
    let platform = MockPlatform::success();

    let outcome = queue.workflow(&platform).run().await;

    assert!(matches!(outcome, RunOutcome::Posted { .. }));

    let uploads = platform.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].bytes, PNG_BYTES);
    assert_eq!(uploads[0].mime_type, ImageMimeType::Png);

    let published = platform.published();
    assert_eq!(published.len(), 1);
    let embed = published[0].embed().expect("post should carry an image embed");
    assert_eq!(embed.alt, "A cat");
    assert_eq!(embed.blob.0["mimeType"], "image/png");

    assert_eq!(queue.archived(), vec!["folder2"]);
}

#[tokio::test]
async fn scenario_c_empty_queue_is_a_no_op() {
    let queue = TestQueue::new();
    let platform = MockPlatform::success();

    let outcome = queue.workflow(&platform).run().await;

    assert!(matches!(outcome, RunOutcome::EmptyQueue));
    assert_eq!(platform.auth_call_count(), 0);
    assert_eq!(platform.post_call_count(), 0);
}

#[tokio::test]
async fn scenario_d_missing_text_leaves_entry_pending() {
    let queue = TestQueue::new();
    queue.add("folder3", &[]);
    let platform = MockPlatform::success();

    let outcome = queue.workflow(&platform).run().await;

    match outcome {
        RunOutcome::Aborted {
            entry,
            stage,
            error,
        } => {
            assert_eq!(entry, Some(EntryId::new("folder3")));
            assert_eq!(stage, RunStage::Loading);
            assert!(matches!(
                error,
                SkypostError::Content(ContentError::MissingRequiredField { .. })
            ));
        }
        other => panic!("Expected Aborted, got {:?}", other),
    }
    assert_eq!(platform.auth_call_count(), 0);
    assert_eq!(platform.post_call_count(), 0);
    assert_eq!(queue.pending(), vec!["folder3"]);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn archived_entry_keeps_identifier_and_artifacts() {
    let queue = TestQueue::new();
    queue.add(
        "round-trip",
        &[
            ("text.txt", "Same files after"),
            ("alt.txt", "alt"),
            ("photo.webp", "webp"),
            ("notes.md", "kept too"),
        ],
    );
    let before = snapshot(&queue.config.posts_dir.join("round-trip"));

    let outcome = queue.workflow(&MockPlatform::success()).run().await;

    assert!(matches!(outcome, RunOutcome::Posted { .. }));
    assert!(queue.pending().is_empty());
    let after = snapshot(&queue.config.archive_dir.join("round-trip"));
    assert_eq!(before, after);
}

#[tokio::test]
async fn alt_text_without_image_is_ignored() {
    let queue = TestQueue::new();
    queue.add("no-image", &[("text.txt", "Just words"), ("alt.txt", "orphan")]);
    let platform = MockPlatform::success();

    queue.workflow(&platform).run().await;

    assert_eq!(platform.upload_call_count(), 0);
    assert!(platform.published()[0].embed().is_none());
}

#[tokio::test]
async fn image_without_alt_text_uses_default_alt() {
    let queue = TestQueue::new();
    queue.add("no-alt", &[("text.txt", "Guess"), ("IMG_0001.JPG", "jpeg")]);
    let platform = MockPlatform::success();

    queue.workflow(&platform).run().await;

    assert_eq!(platform.uploads()[0].mime_type, ImageMimeType::Jpeg);
    assert_eq!(platform.published()[0].embed().unwrap().alt, "Image");
}

#[tokio::test]
async fn failures_at_or_before_publish_leave_pending_unchanged() {
    let failing = [
        MockPlatform::auth_failure("rejected credentials"),
        MockPlatform::upload_failure("blob rejected"),
        MockPlatform::post_failure("post rejected"),
    ];

    for platform in failing {
        let queue = TestQueue::new();
        queue.add("a", &[("text.txt", "first"), ("pic.gif", "GIF89a")]);
        queue.add("b", &[("text.txt", "second")]);
        queue.add_image("b", "pic.png", PNG_BYTES);
        let before = queue.pending();
        assert_eq!(before, vec!["a", "b"]);

        let outcome = queue.workflow(&platform).run().await;

        match outcome {
            RunOutcome::Aborted { error, .. } => {
                assert!(matches!(error, SkypostError::Platform(_)));
            }
            other => panic!("Expected Aborted, got {:?}", other),
        }
        assert_eq!(queue.pending(), before);
        assert!(queue.archived().is_empty());
        assert!(platform.published().is_empty());
    }
}

#[tokio::test]
async fn publish_failure_is_reported_at_publishing_stage() {
    let queue = TestQueue::new();
    queue.add("a", &[("text.txt", "first")]);
    let platform = MockPlatform::post_failure("Record/text must not be longer than 300 graphemes");

    let outcome = queue.workflow(&platform).run().await;

    match outcome {
        RunOutcome::Aborted {
            stage,
            error: SkypostError::Platform(PlatformError::Posting(msg)),
            ..
        } => {
            assert_eq!(stage, RunStage::Publishing);
            assert!(msg.contains("300 graphemes"));
        }
        other => panic!("Expected Aborted at publishing, got {:?}", other),
    }
}

#[tokio::test]
async fn queue_drains_one_entry_per_run() {
    let queue = TestQueue::new();
    for name in ["one", "two", "three"] {
        queue.add(name, &[("text.txt", name)]);
    }
    let platform = MockPlatform::success();
    let workflow = queue.workflow(&platform);

    for expected_pending in [2, 1, 0] {
        assert!(matches!(workflow.run().await, RunOutcome::Posted { .. }));
        assert_eq!(queue.pending().len(), expected_pending);
    }
    assert!(matches!(workflow.run().await, RunOutcome::EmptyQueue));

    let mut bodies: Vec<String> = platform
        .published()
        .iter()
        .map(|p| p.body().to_string())
        .collect();
    bodies.sort();
    assert_eq!(bodies, vec!["one", "three", "two"]);
    assert_eq!(queue.archived(), vec!["one", "three", "two"]);
}

#[tokio::test]
async fn non_directory_siblings_are_never_selected() {
    let queue = TestQueue::new();
    fs::write(queue.config.posts_dir.join("stray.txt"), "not a folder").unwrap();
    let platform = MockPlatform::success();

    let outcome = queue.workflow(&platform).run().await;

    assert!(matches!(outcome, RunOutcome::EmptyQueue));
    assert!(queue.config.posts_dir.join("stray.txt").exists());
}
