//! crates/interview_core/src/sync.rs
//!
//! Reconciles the local session state with the remote persistence endpoint,
//! tolerating network failure, session loss, and concurrent local edits.
//! Failures are returned as values, never thrown: a failed push retries on
//! the next natural trigger and is never data loss, since local storage
//! retains the state.

use crate::domain::{QaRecord, SessionStatus};
use crate::ports::{PortError, SessionStore};
use crate::session::SessionState;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{info, warn};

/// A session reported missing this soon after creation is likely still
/// replicating; it is not cleared and recreated.
const RECREATION_GUARD_SECS: i64 = 60;

/// The value-shaped result of a push or pull, so UI code can proceed
/// optimistically instead of catching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The synchronization routine. Pushes are full-document and idempotent,
/// so a racing double push is harmless (last write wins, no partial-field
/// corruption).
pub struct SyncService {
    store: Arc<dyn SessionStore>,
    /// Transient failures are retried this many times beyond the first
    /// attempt.
    retries: u32,
    backoff: Duration,
}

impl SyncService {
    pub fn new(store: Arc<dyn SessionStore>, retries: u32, backoff: Duration) -> Self {
        Self {
            store,
            retries,
            backoff,
        }
    }

    /// Pushes local state to the persistence endpoint: existence check,
    /// then update, or create when the session was never durably created.
    /// A remotely-completed session makes push a successful no-op.
    pub async fn push(&self, session: &Arc<Mutex<SessionState>>) -> SyncOutcome {
        let mut last_error = String::new();
        for attempt in 0..=self.retries {
            if attempt > 0 {
                time::sleep(self.backoff).await;
            }
            match self.push_once(session).await {
                Ok(()) => return SyncOutcome::ok(),
                Err(PortError::Completed) => {
                    info!("remote session is completed; push skipped");
                    return SyncOutcome::ok();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "push attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        SyncOutcome::failed(last_error)
    }

    async fn push_once(&self, session: &Arc<Mutex<SessionState>>) -> Result<(), PortError> {
        let (session_id, created_at, doc) = {
            let s = session.lock().await;
            (s.session_id.clone(), s.session_created_at, s.to_document())
        };

        if let Some(id) = session_id {
            match self.store.get_session(&id).await {
                Ok(remote) => {
                    if remote.status == SessionStatus::Completed {
                        info!(session_id = %id, "remote session completed; skipping push");
                        return Ok(());
                    }
                    return self.store.update_session(&id, &doc).await;
                }
                Err(PortError::NotFound(_)) => {
                    let recently_created = created_at
                        .map(|t| {
                            Utc::now().signed_duration_since(t).num_seconds()
                                < RECREATION_GUARD_SECS
                        })
                        .unwrap_or(false);
                    if recently_created {
                        // Likely still replicating; hold off instead of a
                        // spurious reset.
                        return Err(PortError::Unexpected(
                            "session not yet visible remotely".to_string(),
                        ));
                    }
                    warn!(session_id = %id, "remote session missing; recreating");
                    session.lock().await.session_id = None;
                }
                Err(e) => return Err(e),
            }
        }

        let new_id = self.store.create_session(&doc).await?;
        let mut s = session.lock().await;
        s.session_id = Some(new_id);
        s.session_created_at = Some(Utc::now());
        Ok(())
    }

    /// Pulls the remote session and merges it into local state without
    /// clobbering concurrently-entered answers. The cursor is recomputed
    /// afterwards; it is derived, never trusted from either side.
    pub async fn pull(&self, session: &Arc<Mutex<SessionState>>) -> SyncOutcome {
        let Some(id) = session.lock().await.session_id.clone() else {
            return SyncOutcome::failed("no session id to pull");
        };
        match self.store.get_session(&id).await {
            Ok(remote) => {
                let mut s = session.lock().await;
                s.qa_records = merge_records(&s.qa_records, &remote.qa_records);
                // Messages are append-only; the longer transcript wins.
                if remote.messages.len() > s.messages.len() {
                    s.messages = remote.messages;
                }
                if remote.status == SessionStatus::Completed {
                    s.status = SessionStatus::Completed;
                }
                s.recalculate_progress();
                SyncOutcome::ok()
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "pull failed; keeping local state");
                SyncOutcome::failed(e.to_string())
            }
        }
    }

    /// Marks the interview completed: locally, then remotely via a final
    /// full push and a status-only update that stamps the completion time.
    pub async fn complete(&self, session: &Arc<Mutex<SessionState>>) -> SyncOutcome {
        session.lock().await.mark_completed();
        let outcome = self.push(session).await;
        if !outcome.success {
            return outcome;
        }
        let session_id = session.lock().await.session_id.clone();
        if let Some(id) = session_id {
            if let Err(e) = self.store.update_status(&id, SessionStatus::Completed).await {
                warn!(session_id = %id, error = %e, "failed to stamp completion status");
                return SyncOutcome::failed(e.to_string());
            }
        }
        SyncOutcome::ok()
    }
}

/// Merges two copies of the QA list.
///
/// List membership and order come from whichever side has more records,
/// since records are only ever appended during normal operation. Per id
/// the higher-version copy wins (local on ties), but a non-empty local
/// answer is never replaced by an empty remote one: answer content is
/// append-only from the client's perspective.
fn merge_records(local: &[QaRecord], remote: &[QaRecord]) -> Vec<QaRecord> {
    let base: &[QaRecord] = if local.len() >= remote.len() {
        local
    } else {
        remote
    };
    base.iter()
        .map(|record| {
            let local_copy = local.iter().find(|r| r.id == record.id);
            let remote_copy = remote.iter().find(|r| r.id == record.id);
            let mut merged = match (local_copy, remote_copy) {
                (Some(l), Some(r)) => {
                    if r.version > l.version {
                        r.clone()
                    } else {
                        l.clone()
                    }
                }
                (Some(l), None) => l.clone(),
                (None, Some(r)) => r.clone(),
                (None, None) => record.clone(),
            };
            if let Some(l) = local_copy {
                if l.has_answer() && !merged.has_answer() {
                    merged.answer = l.answer.clone();
                }
            }
            merged
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QaCategory, SeedQuestion, SessionDocument};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct MockStore {
        remote_id: StdMutex<Option<String>>,
        remote_doc: StdMutex<Option<SessionDocument>>,
        fail: AtomicBool,
        gets: AtomicUsize,
        creates: AtomicUsize,
        updates: AtomicUsize,
    }

    impl MockStore {
        fn empty() -> Self {
            Self {
                remote_id: StdMutex::new(None),
                remote_doc: StdMutex::new(None),
                fail: AtomicBool::new(false),
                gets: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                updates: AtomicUsize::new(0),
            }
        }

        fn with_remote(id: &str, doc: SessionDocument) -> Self {
            let store = Self::empty();
            *store.remote_id.lock().unwrap() = Some(id.to_string());
            *store.remote_doc.lock().unwrap() = Some(doc);
            store
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn check_fail(&self) -> PortResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(PortError::Unexpected("network down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionStore for MockStore {
        async fn get_session(&self, session_id: &str) -> PortResult<SessionDocument> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_fail()?;
            let id = self.remote_id.lock().unwrap().clone();
            if id.as_deref() == Some(session_id) {
                if let Some(doc) = self.remote_doc.lock().unwrap().clone() {
                    return Ok(doc);
                }
            }
            Err(PortError::NotFound(session_id.to_string()))
        }

        async fn create_session(&self, doc: &SessionDocument) -> PortResult<String> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.check_fail()?;
            let id = "session-1".to_string();
            *self.remote_id.lock().unwrap() = Some(id.clone());
            *self.remote_doc.lock().unwrap() = Some(doc.clone());
            Ok(id)
        }

        async fn update_session(&self, _session_id: &str, doc: &SessionDocument) -> PortResult<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.check_fail()?;
            let mut remote = self.remote_doc.lock().unwrap();
            if let Some(existing) = remote.as_ref() {
                if existing.status == SessionStatus::Completed {
                    return Err(PortError::Completed);
                }
            }
            *remote = Some(doc.clone());
            Ok(())
        }

        async fn get_status(&self, session_id: &str) -> PortResult<SessionStatus> {
            self.check_fail()?;
            self.remote_doc
                .lock()
                .unwrap()
                .as_ref()
                .map(|d| d.status)
                .ok_or_else(|| PortError::NotFound(session_id.to_string()))
        }

        async fn update_status(&self, session_id: &str, status: SessionStatus) -> PortResult<()> {
            self.check_fail()?;
            let mut remote = self.remote_doc.lock().unwrap();
            match remote.as_mut() {
                Some(doc) => {
                    doc.status = status;
                    Ok(())
                }
                None => Err(PortError::NotFound(session_id.to_string())),
            }
        }
    }

    fn seed(id: &str) -> SeedQuestion {
        SeedQuestion {
            id: id.to_string(),
            text: format!("{id}?"),
            short_text: id.to_string(),
            category: QaCategory::Research,
        }
    }

    fn local_session() -> Arc<Mutex<SessionState>> {
        Arc::new(Mutex::new(SessionState::new(
            "prolific-1",
            vec![seed("q1"), seed("q2")],
        )))
    }

    fn service(store: Arc<MockStore>) -> SyncService {
        SyncService::new(store, 2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn push_creates_a_session_and_stores_the_id() {
        let store = Arc::new(MockStore::empty());
        let session = local_session();
        let outcome = service(store.clone()).push(&session).await;

        assert!(outcome.success);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        let s = session.lock().await;
        assert_eq!(s.session_id.as_deref(), Some("session-1"));
        assert!(s.session_created_at.is_some());
    }

    #[tokio::test]
    async fn push_updates_an_existing_session() {
        let store = Arc::new(MockStore::empty());
        let session = local_session();
        let sync = service(store.clone());
        sync.push(&session).await;

        session.lock().await.record_answer("q1", "hello");
        let outcome = sync.push(&session).await;

        assert!(outcome.success);
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
        let remote = store.remote_doc.lock().unwrap().clone().unwrap();
        assert_eq!(remote.qa_records[0].answer, "hello");
    }

    #[tokio::test]
    async fn push_fails_after_bounded_retries_and_leaves_state_intact() {
        // Scenario 6: one initial attempt plus exactly two retries.
        let store = Arc::new(MockStore::empty());
        store.set_failing(true);
        let session = local_session();
        let before = session.lock().await.qa_records.clone();

        let outcome = service(store.clone()).push(&session).await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(store.creates.load(Ordering::SeqCst), 3);
        let s = session.lock().await;
        assert!(s.session_id.is_none());
        assert_eq!(s.qa_records.len(), before.len());
    }

    #[tokio::test]
    async fn push_is_a_no_op_for_a_remotely_completed_session() {
        let session = local_session();
        let mut doc = session.lock().await.to_document();
        doc.status = SessionStatus::Completed;
        let store = Arc::new(MockStore::with_remote("session-1", doc));
        session.lock().await.session_id = Some("session-1".to_string());

        let outcome = service(store.clone()).push(&session).await;

        assert!(outcome.success);
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn push_recreates_a_session_the_server_lost() {
        let store = Arc::new(MockStore::empty());
        let session = local_session();
        {
            let mut s = session.lock().await;
            s.session_id = Some("vanished".to_string());
            // Created long ago, so the recreation guard does not apply.
            s.session_created_at = Some(Utc::now() - chrono::Duration::seconds(300));
        }

        let outcome = service(store.clone()).push(&session).await;

        assert!(outcome.success);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.lock().await.session_id.as_deref(),
            Some("session-1")
        );
    }

    #[tokio::test]
    async fn push_holds_off_recreating_a_recently_created_session() {
        let store = Arc::new(MockStore::empty());
        let session = local_session();
        {
            let mut s = session.lock().await;
            s.session_id = Some("replicating".to_string());
            s.session_created_at = Some(Utc::now());
        }

        let outcome = service(store.clone()).push(&session).await;

        assert!(!outcome.success);
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
        // The id is kept for the next natural trigger.
        assert_eq!(
            session.lock().await.session_id.as_deref(),
            Some("replicating")
        );
    }

    #[tokio::test]
    async fn pull_never_regresses_a_local_answer() {
        // P3 / scenario 5.
        let session = local_session();
        session.lock().await.record_answer("q1", "local");
        let mut remote = session.lock().await.to_document();
        remote.qa_records[0].answer = String::new();
        remote.qa_records[0].version = 0;
        let store = Arc::new(MockStore::with_remote("session-1", remote));
        session.lock().await.session_id = Some("session-1".to_string());

        let outcome = service(store).pull(&session).await;

        assert!(outcome.success);
        assert_eq!(session.lock().await.qa_records[0].answer, "local");
    }

    #[tokio::test]
    async fn pull_adopts_records_the_remote_side_appended() {
        let session = local_session();
        let mut remote = session.lock().await.to_document();
        remote.qa_records.push(QaRecord::follow_up(
            "Why?".to_string(),
            "why".to_string(),
        ));
        remote.qa_records[0].answer = "remote answer".to_string();
        remote.qa_records[0].version = 5;
        let store = Arc::new(MockStore::with_remote("session-1", remote));
        session.lock().await.session_id = Some("session-1".to_string());

        let outcome = service(store).pull(&session).await;

        assert!(outcome.success);
        let s = session.lock().await;
        assert_eq!(s.qa_records.len(), 3);
        assert_eq!(s.qa_records[0].answer, "remote answer");
        // Cursor recomputed from answers, not trusted from either side.
        assert_eq!(s.current_index, 1);
        assert_eq!(s.progress.total, 3);
    }

    #[tokio::test]
    async fn pull_failure_keeps_local_state() {
        let session = local_session();
        session.lock().await.session_id = Some("session-1".to_string());
        session.lock().await.record_answer("q1", "kept");
        let store = Arc::new(MockStore::empty());
        store.set_failing(true);

        let outcome = service(store).pull(&session).await;

        assert!(!outcome.success);
        assert_eq!(session.lock().await.qa_records[0].answer, "kept");
    }

    #[tokio::test]
    async fn complete_pushes_and_stamps_status() {
        let store = Arc::new(MockStore::empty());
        let session = local_session();
        let sync = service(store.clone());
        sync.push(&session).await;

        let outcome = sync.complete(&session).await;

        assert!(outcome.success);
        assert_eq!(session.lock().await.status, SessionStatus::Completed);
        let remote = store.remote_doc.lock().unwrap().clone().unwrap();
        assert_eq!(remote.status, SessionStatus::Completed);
    }

    #[test]
    fn merge_ties_prefer_the_local_copy() {
        let mut local = vec![QaRecord::seed(seed("q1"))];
        local[0].answer = "mine".to_string();
        let mut remote = vec![QaRecord::seed(seed("q1"))];
        remote[0].answer = "theirs".to_string();

        let merged = merge_records(&local, &remote);
        assert_eq!(merged[0].answer, "mine");
    }
}
