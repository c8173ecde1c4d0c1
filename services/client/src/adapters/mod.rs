pub mod graph;
pub mod processor;
pub mod questions;
pub mod sessions;
pub mod storage;

pub use graph::HttpGraphSink;
pub use processor::HttpAnswerProcessor;
pub use questions::HttpQuestionSource;
pub use sessions::HttpSessionStore;
pub use storage::FileStorage;
