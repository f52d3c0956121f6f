//! Uploaded image storage
//!
//! Files live flat under the configured directory as `<unix-nanos>.<ext>`.
//! Records keep the relative form `uploads/<file>`, which is rewritten to an
//! absolute URL on every read.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Prefix of stored relative paths, also the public mount point
pub const UPLOADS_PREFIX: &str = "uploads/";

/// Accepted image extensions (lowercase)
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Suffixed names tried when a timestamp name is already taken
const MAX_NAME_ATTEMPTS: u32 = 16;

/// Local image store with public URL rewriting
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    base_url: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Store `data` under a generated name and return its relative path
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String, ApiError> {
        let extension = image_extension(original_name)
            .ok_or_else(|| ApiError::bad_request("Invalid image type"))?;

        let now = Utc::now();
        let stamp = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros());

        let file_name = self.write_new(stamp, &extension, data).await?;
        debug!("Stored upload {} ({} bytes)", file_name, data.len());

        Ok(format!("{}{}", UPLOADS_PREFIX, file_name))
    }

    /// Write `data` to a file that did not exist before, suffixing the
    /// name on collision. Existing uploads are never overwritten.
    async fn write_new(&self, stamp: i64, extension: &str, data: &[u8]) -> Result<String, ApiError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{}.{}", stamp, extension)
            } else {
                format!("{}-{}.{}", stamp, attempt, extension)
            };

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&file_name))
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            file.write_all(data).await?;
            file.flush().await?;
            return Ok(file_name);
        }

        Err(ApiError::Internal(format!(
            "no free upload name for stamp {}",
            stamp
        )))
    }

    /// Remove a stored file; failures are logged and otherwise ignored
    pub async fn remove(&self, stored: &str) {
        let Some(file_name) = stored_file_name(stored) else {
            warn!("Refusing to remove unexpected upload path: {}", stored);
            return;
        };

        if let Err(e) = tokio::fs::remove_file(self.dir.join(file_name)).await {
            warn!("Failed to remove upload {}: {}", stored, e);
        }
    }

    /// Absolute URL for a stored relative path
    pub fn public_url(&self, stored: &str) -> String {
        if stored.starts_with("http://") || stored.starts_with("https://") {
            return stored.to_string();
        }
        format!("{}/{}", self.base_url, stored.trim_start_matches('/'))
    }
}

/// Lowercased extension of `name` when it is an accepted image type
fn image_extension(name: &str) -> Option<String> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// File name inside the upload directory, rejecting anything that could escape it
fn stored_file_name(stored: &str) -> Option<&str> {
    let name = stored.strip_prefix(UPLOADS_PREFIX)?;
    let valid = !name.is_empty() && !name.contains('/') && !name.contains('\\') && name != "..";
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_filtered() {
        assert_eq!(image_extension("struk.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("a.b.webp").as_deref(), Some("webp"));
        assert_eq!(image_extension("script.sh"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn public_url_joins_base() {
        let store = UploadStore::new("/tmp/x", "http://localhost:8080/");
        assert_eq!(
            store.public_url("uploads/1.jpg"),
            "http://localhost:8080/uploads/1.jpg"
        );
        assert_eq!(store.public_url("https://cdn/a.png"), "https://cdn/a.png");
    }

    #[test]
    fn stored_paths_cannot_escape() {
        assert_eq!(stored_file_name("uploads/1.jpg"), Some("1.jpg"));
        assert_eq!(stored_file_name("uploads/../etc/passwd"), None);
        assert_eq!(stored_file_name("other/1.jpg"), None);
        assert_eq!(stored_file_name("uploads/.."), None);
    }

    #[tokio::test]
    async fn save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "http://localhost");

        let stored = store.save("bukti.png", b"png-bytes").await.unwrap();
        assert!(stored.starts_with("uploads/") && stored.ends_with(".png"));

        let path = dir.path().join(stored_file_name(&stored).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        store.remove(&stored).await;
        assert!(!path.exists());

        assert!(matches!(
            store.save("bukti.exe", b"x").await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn colliding_names_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "http://localhost");

        let first = store.write_new(42, "jpg", b"first").await.unwrap();
        let second = store.write_new(42, "jpg", b"second").await.unwrap();
        assert_eq!(first, "42.jpg");
        assert_eq!(second, "42-1.jpg");

        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"second");
    }
}
