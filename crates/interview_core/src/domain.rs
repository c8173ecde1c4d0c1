//! crates/interview_core/src/domain.rs
//!
//! Defines the pure, core data structures for the interview engine.
//! These structs are independent of any HTTP endpoint or storage format;
//! serde derives exist only so the storage boundary and the wire adapters
//! can reuse one canonical shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinguishes tutorial warm-up questions from substantive research
/// questions. Tutorial records never enter the processing queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaCategory {
    Research,
    Tutorial,
}

/// A single question/answer pair tracked by the interview.
///
/// `version` strictly increases on every mutation; when two copies of the
/// same record meet during a merge, the one with the higher version is
/// authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaRecord {
    pub id: String,
    pub question: String,
    #[serde(rename = "shortText")]
    pub short_label: String,
    /// Empty string until the participant answers.
    pub answer: String,
    pub category: QaCategory,
    pub processed: bool,
    pub error: Option<String>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl QaRecord {
    /// Creates an unanswered record from a seed question.
    pub fn seed(seed: SeedQuestion) -> Self {
        Self {
            id: seed.id,
            question: seed.text,
            short_label: seed.short_text,
            answer: String::new(),
            category: seed.category,
            processed: false,
            error: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Creates a follow-up record generated by the analysis backend.
    /// Follow-ups are always substantive research questions.
    pub fn follow_up(question: String, short_label: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question,
            short_label,
            answer: String::new(),
            category: QaCategory::Research,
            processed: false,
            error: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn has_answer(&self) -> bool {
        !self.answer.trim().is_empty()
    }

    /// Bumps the version counter and the last-modified timestamp.
    /// Every mutation of a record must go through this.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// A question as supplied by the external question source.
#[derive(Debug, Clone)]
pub struct SeedQuestion {
    pub id: String,
    pub text: String,
    pub short_text: String,
    pub category: QaCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Participant,
    System,
}

/// What a message announces. Structured fields replace the id-string
/// parsing the transcript would otherwise need for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Question,
    Answer,
    Notice,
}

/// One entry of the display transcript. Messages are a projection of the
/// QA sequence and must remain reconstructible from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub kind: MessageKind,
    pub text: String,
    /// True while the text is not yet finalized (e.g. during transcription).
    pub loading: bool,
    pub related_qa_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A participant's answer message.
    pub fn participant_answer(text: &str, qa_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Participant,
            kind: MessageKind::Answer,
            text: text.to_string(),
            loading: false,
            related_qa_id: Some(qa_id.to_string()),
            created_at: Utc::now(),
        }
    }

    /// The system message announcing a question to the participant.
    pub fn system_question(record: &QaRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::System,
            kind: MessageKind::Question,
            text: record.question.clone(),
            loading: false,
            related_qa_id: Some(record.id.clone()),
            created_at: Utc::now(),
        }
    }
}

/// Interview completion as shown to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl RequestStatus {
    /// Completed and errored requests no longer count as active work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Error)
    }
}

/// One asynchronous call to the answer-processing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: Uuid,
    pub qa_id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl PendingRequest {
    pub fn new(qa_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            qa_id: qa_id.to_string(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            error: None,
        }
    }
}

/// A follow-up question candidate returned by the analysis backend,
/// before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub question: String,
    #[serde(rename = "shortText")]
    pub short_label: String,
}

/// The full session document exchanged with the persistence endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub prolific_id: String,
    #[serde(rename = "qaPairs")]
    pub qa_records: Vec<QaRecord>,
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    pub progress: Progress,
    #[serde(rename = "currentQuestionIndex")]
    pub current_index: usize,
}
