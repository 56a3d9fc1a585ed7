use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use repairdesk_core::ports::{FileStore, PortError, StoredFile, UploadFile};

/// Writes uploads under a local directory and returns `file://` URLs.
///
/// Every upload gets a fresh name, so storing the same file twice yields two copies.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, PortError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|error| {
            PortError::Storage(format!("create {}: {error}", self.root.display()))
        })?;

        let name = format!("{}-{}", Uuid::new_v4(), sanitize_filename(&file.filename));
        let path = self.root.join(&name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|error| PortError::Storage(format!("write {}: {error}", path.display())))?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        debug!(
            event_name = "storage.file.written",
            path = %absolute.display(),
            mime = %file.mime,
            bytes = file.bytes.len(),
            "upload stored"
        );
        Ok(StoredFile { url: format!("file://{}", absolute.display()) })
    }
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') { ch } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
