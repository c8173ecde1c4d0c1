//! services/client/src/adapters/storage.rs
//!
//! This module contains the file-backed implementation of the
//! `LocalStorage` port: the client-side persisted storage the session is
//! restored from on revisit. Concurrent writers are not coordinated; the
//! last writer wins.

use async_trait::async_trait;
use interview_core::ports::{LocalStorage, PortError, PortResult};
use interview_core::storage::StoredSession;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A `LocalStorage` adapter that keeps the session as a JSON file.
#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a new `FileStorage`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl LocalStorage for FileStorage {
    async fn load(&self) -> PortResult<Option<StoredSession>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        let stored = serde_json::from_str(&raw)
            .map_err(|e| PortError::Unexpected(format!("corrupt session file: {e}")))?;
        Ok(Some(stored))
    }

    async fn save(&self, stored: &StoredSession) -> PortResult<()> {
        let json = serde_json::to_string_pretty(stored)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::domain::{QaCategory, SeedQuestion};
    use interview_core::session::SessionState;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("interview-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn load_returns_none_when_no_file_exists() {
        let storage = FileStorage::new(temp_path());
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_session_can_be_loaded_back() {
        let path = temp_path();
        let storage = FileStorage::new(path.clone());
        let mut state = SessionState::new(
            "prolific-1",
            vec![SeedQuestion {
                id: "q1".to_string(),
                text: "First?".to_string(),
                short_text: "q1".to_string(),
                category: QaCategory::Research,
            }],
        );
        state.record_answer("q1", "hello");
        storage
            .save(&StoredSession::from_state(&state, &[]))
            .await
            .unwrap();

        let loaded = storage.load().await.unwrap().unwrap();
        let (restored, _) = loaded.into_state();
        assert_eq!(restored.qa_records[0].answer, "hello");
        assert_eq!(restored.prolific_id, "prolific-1");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_panic() {
        let path = temp_path();
        tokio::fs::write(&path, "not json").await.unwrap();
        let storage = FileStorage::new(path.clone());
        assert!(storage.load().await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
