pub mod domain;
pub mod ports;
pub mod queue;
pub mod session;
pub mod storage;
pub mod sync;

pub use domain::{
    FollowUp, Message, MessageKind, MessageRole, PendingRequest, Progress, QaCategory, QaRecord,
    RequestStatus, SeedQuestion, SessionDocument, SessionStatus,
};
pub use ports::{
    AnswerProcessor, CausalGraphSink, LocalStorage, PortError, PortResult, ProcessContext,
    ProcessOutcome, QuestionSource, SessionStore,
};
pub use queue::ProcessingQueue;
pub use session::SessionState;
pub use storage::StoredSession;
pub use sync::{SyncOutcome, SyncService};
