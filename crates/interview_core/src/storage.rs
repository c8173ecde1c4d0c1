//! crates/interview_core/src/storage.rs
//!
//! The serialize/deserialize boundary for persisted client storage: a pure
//! mapping between the in-memory session and a storage-shaped record, so
//! format changes never leak into mutation logic.

use crate::domain::{Message, PendingRequest, QaRecord, SessionStatus};
use crate::session::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The storage-shaped session record.
///
/// Progress is deliberately not stored: the QA records are the persisted
/// source of truth and cursor/progress are recomputed on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub session_id: Option<String>,
    pub session_created_at: Option<DateTime<Utc>>,
    pub prolific_id: String,
    #[serde(rename = "qaPairs")]
    pub qa_records: Vec<QaRecord>,
    pub messages: Vec<Message>,
    #[serde(rename = "currentQuestionIndex")]
    pub current_index: usize,
    pub status: SessionStatus,
    pub pending_requests: Vec<PendingRequest>,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn from_state(state: &SessionState, requests: &[PendingRequest]) -> Self {
        Self {
            session_id: state.session_id.clone(),
            session_created_at: state.session_created_at,
            prolific_id: state.prolific_id.clone(),
            qa_records: state.qa_records.clone(),
            messages: state.messages.clone(),
            current_index: state.current_index,
            status: state.status,
            pending_requests: requests.to_vec(),
            saved_at: Utc::now(),
        }
    }

    /// Rebuilds the in-memory session plus the persisted queue entries.
    ///
    /// Cursor and progress are recalculated from the QA records rather
    /// than trusted from storage; queue reconciliation of interrupted
    /// entries is the queue's job (`ProcessingQueue::restore`).
    pub fn into_state(self) -> (SessionState, Vec<PendingRequest>) {
        let mut state = SessionState {
            session_id: self.session_id,
            session_created_at: self.session_created_at,
            prolific_id: self.prolific_id,
            qa_records: self.qa_records,
            messages: self.messages,
            current_index: self.current_index,
            progress: crate::domain::Progress { current: 0, total: 0 },
            status: self.status,
        };
        state.recalculate_progress();
        (state, self.pending_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Progress, QaCategory, SeedQuestion};

    fn seed(id: &str) -> SeedQuestion {
        SeedQuestion {
            id: id.to_string(),
            text: format!("{id}?"),
            short_text: id.to_string(),
            category: QaCategory::Research,
        }
    }

    #[test]
    fn restore_recomputes_cursor_from_answers_not_storage() {
        let mut state = SessionState::new("p", vec![seed("q1"), seed("q2"), seed("q3")]);
        state.record_answer("q1", "one");
        let mut stored = StoredSession::from_state(&state, &[]);
        // Simulate a stale persisted cursor.
        stored.current_index = 0;

        let (restored, _) = stored.into_state();
        assert_eq!(restored.current_index, 1);
        assert_eq!(restored.progress, Progress { current: 1, total: 3 });
    }

    #[test]
    fn queue_entries_survive_the_round_trip() {
        let state = SessionState::new("p", vec![seed("q1")]);
        let request = PendingRequest::new("q1");
        let stored = StoredSession::from_state(&state, &[request.clone()]);

        let json = serde_json::to_string(&stored).unwrap();
        let parsed: StoredSession = serde_json::from_str(&json).unwrap();
        let (_, requests) = parsed.into_state();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, request.id);
        assert_eq!(requests[0].qa_id, "q1");
    }

    #[test]
    fn storage_format_uses_the_wire_field_names() {
        let state = SessionState::new("p", vec![seed("q1")]);
        let stored = StoredSession::from_state(&state, &[]);
        let json = serde_json::to_string(&stored).unwrap();

        assert!(json.contains("\"qaPairs\""));
        assert!(json.contains("\"currentQuestionIndex\""));
        assert!(json.contains("\"prolificId\""));
    }
}
