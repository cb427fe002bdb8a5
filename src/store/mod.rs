//! Persistence for notes and uploaded files.
//!
//! Two narrow async traits, [`NoteStore`] and [`BlobStore`], keep the
//! service independent of where data lives. Each write is atomic per
//! document; nothing spans more than one document, so there are no
//! transactions.
//!
//! | Backend | Notes | Blobs |
//! |---------|-------|-------|
//! | [`memory`] | `HashMap` behind `RwLock` | same |
//! | [`fs`] | `<root>/notes/<user>/<id>.json` | `<root>/blobs/<user>/<id>.<ext>` |

pub mod fs;
pub mod memory;

use crate::config::StorageBackend;
use crate::output::Note;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Location of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub user_id: String,
    pub blob_id: String,
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert or replace a note.
    async fn put(&self, note: &Note) -> Result<(), StoreError>;

    async fn get(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, StoreError>;

    /// All notes of a user, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<Note>, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh id.
    async fn put(&self, user_id: &str, content_type: &str, bytes: &[u8]) -> Result<BlobRef, StoreError>;

    async fn get(&self, reference: &BlobRef) -> Result<Option<Blob>, StoreError>;
}

/// Build the note and blob stores for a backend.
pub fn build_stores(backend: &StorageBackend) -> (Arc<dyn NoteStore>, Arc<dyn BlobStore>) {
    match backend {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let notes: Arc<dyn NoteStore> = store.clone();
            let blobs: Arc<dyn BlobStore> = store;
            (notes, blobs)
        }
        StorageBackend::Filesystem(root) => {
            let store = Arc::new(FsStore::new(root));
            let notes: Arc<dyn NoteStore> = store.clone();
            let blobs: Arc<dyn BlobStore> = store;
            (notes, blobs)
        }
    }
}

/// Keys become path components: letters, digits, `_`, `-` and `.`, not
/// starting with a dot.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

pub(crate) fn newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
