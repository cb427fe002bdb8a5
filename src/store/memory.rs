//! Process-local store. Everything is lost on restart.

use super::{check_key, newest_first, Blob, BlobRef, BlobStore, NoteStore, StoreError};
use crate::output::Note;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type UserNotes = HashMap<String, HashMap<String, Note>>;

/// In-memory notes and blobs. Cloning shares the same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    notes: Arc<RwLock<UserNotes>>,
    blobs: Arc<RwLock<HashMap<BlobRef, Blob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn put(&self, note: &Note) -> Result<(), StoreError> {
        check_key(&note.user_id)?;
        check_key(&note.id)?;
        self.notes
            .write()
            .await
            .entry(note.user_id.clone())
            .or_default()
            .insert(note.id.clone(), note.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str, note_id: &str) -> Result<Option<Note>, StoreError> {
        Ok(self
            .notes
            .read()
            .await
            .get(user_id)
            .and_then(|notes| notes.get(note_id))
            .cloned())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = self
            .notes
            .read()
            .await
            .get(user_id)
            .map(|notes| notes.values().cloned().collect())
            .unwrap_or_default();
        newest_first(&mut notes);
        Ok(notes)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, user_id: &str, content_type: &str, bytes: &[u8]) -> Result<BlobRef, StoreError> {
        check_key(user_id)?;
        let reference = BlobRef {
            user_id: user_id.to_string(),
            blob_id: uuid::Uuid::new_v4().to_string(),
        };
        self.blobs.write().await.insert(
            reference.clone(),
            Blob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(reference)
    }

    async fn get(&self, reference: &BlobRef) -> Result<Option<Blob>, StoreError> {
        Ok(self.blobs.read().await.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{NoteDraft, SourceRef, StructuredResult};
    use crate::task::{OutputShape, TaskKind};
    use chrono::Duration;

    fn note(user: &str, title: &str, age_secs: i64) -> Note {
        let mut n = Note::from_draft(
            user,
            NoteDraft {
                title: title.into(),
                task_kind: TaskKind::Summary,
                source: SourceRef::Text { chars: 1 },
                result: StructuredResult::fallback(OutputShape::Summary, "x"),
                fallback_used: false,
            },
        );
        n.created_at -= Duration::seconds(age_secs);
        n
    }

    #[tokio::test]
    async fn notes_are_scoped_per_user_and_newest_first() {
        let store = MemoryStore::new();
        let old = note("alice", "old", 60);
        let new = note("alice", "new", 0);
        NoteStore::put(&store, &old).await.unwrap();
        NoteStore::put(&store, &new).await.unwrap();
        NoteStore::put(&store, &note("bob", "other", 0)).await.unwrap();

        let titles: Vec<_> = store
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, ["new", "old"]);
        assert!(NoteStore::get(&store, "bob", &old.id).await.unwrap().is_none());
        assert!(store.list("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blobs_round_trip() {
        let store = MemoryStore::new();
        let r = BlobStore::put(&store, "alice", "application/pdf", b"%PDF").await.unwrap();
        let blob = BlobStore::get(&store, &r).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"%PDF");
        assert_eq!(blob.content_type, "application/pdf");
    }
}
