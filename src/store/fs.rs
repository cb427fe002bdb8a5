//! Filesystem store: one JSON document per note, one file per upload.
//!
//! ```text
//! <root>/notes/<user_id>/<note_id>.json
//! <root>/blobs/<user_id>/<uuid>.<ext>
//! ```
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so readers never see a partial document.

use super::{check_key, newest_first, Blob, BlobRef, BlobStore, NoteStore, StoreError};
use crate::output::Note;
use crate::pipeline::input::extension_for;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn notes_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        check_key(user_id)?;
        Ok(self.root.join("notes").join(user_id))
    }

    fn blob_path(&self, reference: &BlobRef) -> Result<PathBuf, StoreError> {
        check_key(&reference.user_id)?;
        check_key(&reference.blob_id)?;
        Ok(self
            .root
            .join("blobs")
            .join(&reference.user_id)
            .join(&reference.blob_id))
    }
}

/// Atomic write: write to temp, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn content_type_for(blob_id: &str) -> &'static str {
    match blob_id.rsplit_once('.').map(|(_, ext)| ext) {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl NoteStore for FsStore {
    async fn put(&self, note: &Note) -> Result<(), StoreError> {
        check_key(&note.id)?;
        let path = self.notes_dir(&note.user_id)?.join(format!("{}.json", note.id));
        let json = serde_json::to_vec_pretty(note)?;
        write_atomic(&path, &json).await
    }

    async fn get(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, StoreError> {
        check_key(note_id)?;
        let path = self.notes_dir(user_id)?.join(format!("{note_id}.json"));
        match read_optional(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Note>, StoreError> {
        let dir = self.notes_dir(user_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut notes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Note>(&bytes) {
                Ok(note) => notes.push(note),
                Err(e) => warn!("Skipping unreadable note {}: {}", path.display(), e),
            }
        }
        newest_first(&mut notes);
        Ok(notes)
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn put(&self, user_id: &str, content_type: &str, bytes: &[u8]) -> Result<BlobRef, StoreError> {
        let reference = BlobRef {
            user_id: user_id.to_string(),
            blob_id: format!("{}.{}", uuid::Uuid::new_v4(), extension_for(content_type)),
        };
        write_atomic(&self.blob_path(&reference)?, bytes).await?;
        Ok(reference)
    }

    async fn get(&self, reference: &BlobRef) -> Result<Option<Blob>, StoreError> {
        let path = self.blob_path(reference)?;
        Ok(read_optional(&path).await?.map(|bytes| Blob {
            bytes,
            content_type: content_type_for(&reference.blob_id).to_string(),
        }))
    }
}
