//! Content loading for queue entries
//!
//! An entry directory holds:
//! - `text.txt`: required post body
//! - `alt.txt`: optional alt text for the image
//! - one optional image (`.jpg`, `.jpeg`, `.png`, `.gif`, `.webp`)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ContentError, Result};
use crate::types::{EntryId, ImageAsset, ImageMimeType, QueueEntry};

pub const TEXT_FILE: &str = "text.txt";
pub const ALT_FILE: &str = "alt.txt";

#[derive(Debug, Clone)]
pub struct ContentLoader {
    posts_dir: PathBuf,
}

impl ContentLoader {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
        }
    }

    fn entry_dir(&self, id: &EntryId) -> PathBuf {
        self.posts_dir.join(id.as_str())
    }

    /// Read the required post body
    ///
    /// # Errors
    ///
    /// - `ContentError::MissingRequiredField` if `text.txt` does not exist
    /// - `ContentError::EmptyRequiredField` if it is blank after trimming
    /// - `ContentError::Read` for any other I/O or encoding failure
    pub async fn load_text(&self, id: &EntryId) -> Result<String> {
        let path = self.entry_dir(id).join(TEXT_FILE);

        let text = match read_trimmed(&path).await? {
            Some(text) => text,
            None => {
                return Err(ContentError::MissingRequiredField {
                    entry: id.to_string(),
                    file: TEXT_FILE.to_string(),
                }
                .into())
            }
        };

        if text.is_empty() {
            return Err(ContentError::EmptyRequiredField {
                entry: id.to_string(),
                file: TEXT_FILE.to_string(),
            }
            .into());
        }

        Ok(text)
    }

    /// Read the optional alt text; a missing or blank `alt.txt` yields `None`
    pub async fn load_alt_text(&self, id: &EntryId) -> Result<Option<String>> {
        let path = self.entry_dir(id).join(ALT_FILE);
        Ok(read_trimmed(&path).await?.filter(|alt| !alt.is_empty()))
    }

    /// Read the first supported image in the entry
    ///
    /// File names are scanned in sorted order and only the first supported
    /// image is used; any others are ignored.
    pub async fn load_image(&self, id: &EntryId) -> Result<Option<ImageAsset>> {
        let dir = self.entry_dir(id);
        let mut names = list_files(&dir).await?;
        names.sort();

        let Some((file_name, mime_type)) = names.into_iter().find_map(|name| {
            ImageMimeType::from_file_name(&name).map(|mime_type| (name, mime_type))
        }) else {
            return Ok(None);
        };

        let path = dir.join(&file_name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ContentError::Read { path, source })?;

        debug!(entry = %id, file = %file_name, size = bytes.len(), %mime_type, "loaded image");

        Ok(Some(ImageAsset {
            file_name,
            bytes,
            mime_type,
        }))
    }

    /// Load everything the entry provides
    ///
    /// The body text is read first so a missing `text.txt` fails before any
    /// other file is touched.
    pub async fn load(&self, id: &EntryId) -> Result<QueueEntry> {
        let text = self.load_text(id).await?;
        let alt_text = self.load_alt_text(id).await?;
        let image = self.load_image(id).await?;

        Ok(QueueEntry {
            id: id.clone(),
            text,
            alt_text,
            image,
        })
    }
}

/// Read a UTF-8 file and trim it, mapping "not found" to `None`
async fn read_trimmed(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ContentError::Read {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

/// Names of the regular files directly inside `dir`
async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let read_error = |source: std::io::Error| ContentError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(read_error)?;
    let mut names = Vec::new();

    while let Some(item) = read_dir.next_entry().await.map_err(read_error)? {
        let is_file = tokio::fs::metadata(item.path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = item.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    Ok(names)
}
