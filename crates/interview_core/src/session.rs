//! crates/interview_core/src/session.rs
//!
//! The session state engine: one authoritative cursor into the QA list,
//! with the transcript and progress derived from it. All mutation goes
//! through the operations defined here; nothing else writes to QA records.

use crate::domain::{
    Message, MessageKind, MessageRole, Progress, QaRecord, SeedQuestion, SessionDocument,
    SessionStatus,
};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Messages with the same role and text created within this window are
/// treated as the same event and not inserted twice.
const MESSAGE_DEDUP_WINDOW_MS: i64 = 2_000;

/// The in-memory session: transcript, QA list, cursor, progress and status.
///
/// Owned by the top-level application controller and passed by reference to
/// whatever needs to read or mutate it; there is no ambient global store.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Absent until the first successful remote creation.
    pub session_id: Option<String>,
    /// When the remote session was first created, used to guard against
    /// recreating a session that is likely still replicating.
    pub session_created_at: Option<DateTime<Utc>>,
    pub prolific_id: String,
    pub qa_records: Vec<QaRecord>,
    pub messages: Vec<Message>,
    /// Index of the QA record currently awaiting an answer.
    pub current_index: usize,
    pub progress: Progress,
    pub status: SessionStatus,
}

impl SessionState {
    /// Creates a fresh session from the question source's seed list and
    /// announces the first question in the transcript.
    pub fn new(prolific_id: &str, seeds: Vec<SeedQuestion>) -> Self {
        let qa_records: Vec<QaRecord> = seeds.into_iter().map(QaRecord::seed).collect();
        let total = qa_records.len();
        let mut state = Self {
            session_id: None,
            session_created_at: None,
            prolific_id: prolific_id.to_string(),
            qa_records,
            messages: Vec::new(),
            current_index: 0,
            progress: Progress { current: 0, total },
            status: SessionStatus::InProgress,
        };
        if let Some(first) = state.qa_records.first() {
            let msg = Message::system_question(first);
            state.push_message(msg);
        }
        state
    }

    /// The QA record currently awaiting an answer, or `None` once the
    /// cursor is at or past the end. No side effects.
    pub fn current_question(&self) -> Option<&QaRecord> {
        self.qa_records.get(self.current_index)
    }

    pub fn answered_count(&self) -> usize {
        self.qa_records.iter().filter(|r| r.has_answer()).count()
    }

    /// Records the participant's answer on the record at the cursor.
    ///
    /// An empty answer (after trimming) is a no-op, not an error. An id
    /// that does not match the record at the cursor is silently ignored
    /// and logged: it guards against stale UI callbacks, and callers must
    /// re-fetch the current question rather than assume staleness is safe.
    ///
    /// Returns whether the answer was recorded.
    pub fn record_answer(&mut self, qa_id: &str, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        let Some(record) = self.qa_records.get_mut(self.current_index) else {
            warn!(qa_id, "answer submitted but no question is awaiting one");
            return false;
        };
        if record.id != qa_id {
            warn!(
                submitted = qa_id,
                current = %record.id,
                "answer submitted for a question that is not at the cursor; ignoring"
            );
            return false;
        }
        record.answer = trimmed.to_string();
        record.touch();
        let msg = Message::participant_answer(trimmed, qa_id);
        self.push_message(msg);
        true
    }

    /// Moves the cursor past an answered question and announces the next
    /// one in the transcript.
    ///
    /// Only moves when the record at the cursor has an answer, so calling
    /// twice in a row without a new answer leaves the message list
    /// unchanged. At the last index the cursor stays put and progress is
    /// forced to 100%, even if a trailing tutorial record lacks an answer.
    pub fn advance_cursor(&mut self) {
        let total = self.qa_records.len();
        if total == 0 {
            return;
        }
        if self.current_index < total - 1 {
            if !self.qa_records[self.current_index].has_answer() {
                return;
            }
            self.current_index += 1;
            self.progress = Progress {
                current: self.current_index,
                total,
            };
            let record = self.qa_records[self.current_index].clone();
            if !self.latest_message_announces(&record.id) {
                let msg = Message::system_question(&record);
                self.push_message(msg);
            }
        } else {
            self.progress = Progress {
                current: total,
                total,
            };
        }
    }

    /// Inserts new QA records at the end of the list, never at the cursor:
    /// follow-up questions land after all currently-known questions so the
    /// position of already-pending items is preserved.
    pub fn append_questions(&mut self, records: Vec<QaRecord>) {
        self.qa_records.extend(records);
        self.progress.total = self.qa_records.len();
    }

    /// Resynchronizes cursor and progress from QA-record truth.
    ///
    /// The persisted source of truth is the QA list, not the cursor: after
    /// a page reload or a server merge the cursor is recomputed as one
    /// past the longest answered prefix, clamped to the last valid index.
    /// Idempotent.
    pub fn recalculate_progress(&mut self) {
        let total = self.qa_records.len();
        if total == 0 {
            self.current_index = 0;
            self.progress = Progress { current: 0, total: 0 };
            return;
        }
        let prefix = self
            .qa_records
            .iter()
            .take_while(|r| r.has_answer())
            .count();
        self.current_index = prefix.min(total - 1);
        let current = if prefix >= total {
            total
        } else {
            self.answered_count().min(total)
        };
        self.progress = Progress { current, total };
    }

    /// Marks the session terminally completed. No further mutation is
    /// expected except administrative edit/reset.
    pub fn mark_completed(&mut self) {
        self.status = SessionStatus::Completed;
        self.progress.current = self.progress.total;
    }

    /// The wire-shaped full document pushed to the persistence endpoint.
    pub fn to_document(&self) -> SessionDocument {
        SessionDocument {
            prolific_id: self.prolific_id.clone(),
            qa_records: self.qa_records.clone(),
            messages: self.messages.clone(),
            status: self.status,
            progress: self.progress,
            current_index: self.current_index,
        }
    }

    /// Appends a message unless an identical one (same role and text)
    /// was created within the dedup window.
    fn push_message(&mut self, msg: Message) {
        let duplicate = self.messages.iter().rev().take(5).any(|m| {
            m.role == msg.role
                && m.text == msg.text
                && (msg.created_at - m.created_at).num_milliseconds().abs()
                    <= MESSAGE_DEDUP_WINDOW_MS
        });
        if !duplicate {
            self.messages.push(msg);
        }
    }

    fn latest_message_announces(&self, qa_id: &str) -> bool {
        matches!(
            self.messages.last(),
            Some(m) if m.role == MessageRole::System
                && m.kind == MessageKind::Question
                && m.related_qa_id.as_deref() == Some(qa_id)
        )
    }
}
