//! crates/interview_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the interview engine.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete HTTP endpoints and client storage.

use crate::domain::{SeedQuestion, SessionDocument, SessionStatus};
use crate::storage::StoredSession;
use async_trait::async_trait;
use serde_json::Value;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Session is completed and immutable")]
    Completed,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Supplies the ordered list of active guiding questions. The list may
/// change between sessions (admin-edited), so it is fetched fresh whenever
/// a new session is seeded.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn active_questions(&self) -> PortResult<Vec<SeedQuestion>>;
}

/// The durable session store, keyed by session identifier.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches the full session document, or `NotFound`.
    async fn get_session(&self, session_id: &str) -> PortResult<SessionDocument>;

    /// Creates a new remote session and returns its identifier.
    async fn create_session(&self, doc: &SessionDocument) -> PortResult<String>;

    /// Replaces the remote document wholesale. Must fail with
    /// `PortError::Completed` if the remote session is already completed.
    async fn update_session(&self, session_id: &str, doc: &SessionDocument) -> PortResult<()>;

    /// Lightweight status poll, no full document transfer.
    async fn get_status(&self, session_id: &str) -> PortResult<SessionStatus>;

    /// Status-only update; setting `Completed` stamps a completion time
    /// server-side.
    async fn update_status(&self, session_id: &str, status: SessionStatus) -> PortResult<()>;
}

/// The full context handed to the analysis backend for one answered record.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub session_id: Option<String>,
    pub prolific_id: String,
    pub qa_record: crate::domain::QaRecord,
    pub qa_records: Vec<crate::domain::QaRecord>,
    pub current_index: usize,
}

/// What the analysis backend returned for one processed answer.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub follow_ups: Vec<crate::domain::FollowUp>,
    /// Forwarded opaquely to the graph sink; never interpreted here.
    pub causal_graph: Option<Value>,
}

/// The external answer-processing backend. Calls are serialized by the
/// processing queue; implementations may assume at most one in flight.
#[async_trait]
pub trait AnswerProcessor: Send + Sync {
    async fn process(&self, context: ProcessContext) -> PortResult<ProcessOutcome>;
}

/// Receives causal graphs produced by the analysis backend. Failures are
/// logged by callers and never fatal to the interview.
#[async_trait]
pub trait CausalGraphSink: Send + Sync {
    async fn store_graph(&self, session_id: &str, graph: Value) -> PortResult<()>;
}

/// The persisted-to-client-storage boundary. Read once at startup,
/// written on state changes; concurrent writers are not coordinated
/// (last writer wins).
#[async_trait]
pub trait LocalStorage: Send + Sync {
    async fn load(&self) -> PortResult<Option<StoredSession>>;
    async fn save(&self, stored: &StoredSession) -> PortResult<()>;
}
