//! Error types for Skypost

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkypostError>;

#[derive(Error, Debug)]
pub enum SkypostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl SkypostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SkypostError::Config(_) => 2,
            SkypostError::Platform(PlatformError::Authentication(_)) => 2,
            SkypostError::Platform(_) => 1,
            SkypostError::Queue(_) => 1,
            SkypostError::Content(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid schedule expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Pending directory does not exist: {0}")]
    MissingPostsDir(PathBuf),

    #[error("Failed to prepare directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to list pending entries in {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry not found in pending set: {0}")]
    NotFound(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Missing required file {file} in entry {entry}")]
    MissingRequiredField { entry: String, file: String },

    #[error("Required file {file} in entry {entry} is empty")]
    EmptyRequiredField { entry: String, file: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
