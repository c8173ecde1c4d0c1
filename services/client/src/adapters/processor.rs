//! services/client/src/adapters/processor.rs
//!
//! This module contains the adapter for the external answer-processing
//! backend, which analyzes an answered question and returns follow-up
//! questions plus a causal graph. It implements the `AnswerProcessor`
//! port from the `core` crate.

use async_trait::async_trait;
use interview_core::domain::{FollowUp, QaRecord};
use interview_core::ports::{
    AnswerProcessor, PortError, PortResult, ProcessContext, ProcessOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that calls the answer-processing backend over HTTP. The
/// processing queue serializes calls, so at most one is in flight.
#[derive(Clone)]
pub struct HttpAnswerProcessor {
    client: reqwest::Client,
    url: String,
}

impl HttpAnswerProcessor {
    /// Creates a new `HttpAnswerProcessor`.
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    session_id: Option<&'a str>,
    prolific_id: &'a str,
    qa_pair: &'a QaRecord,
    qa_pairs: &'a [QaRecord],
    current_question_index: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    success: bool,
    follow_up_questions: Option<Vec<FollowUp>>,
    causal_graph: Option<Value>,
}

#[async_trait]
impl AnswerProcessor for HttpAnswerProcessor {
    async fn process(&self, context: ProcessContext) -> PortResult<ProcessOutcome> {
        let request = ProcessRequest {
            session_id: context.session_id.as_deref(),
            prolific_id: &context.prolific_id,
            qa_pair: &context.qa_record,
            qa_pairs: &context.qa_records,
            current_question_index: context.current_index,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let body: ProcessResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !body.success {
            return Err(PortError::Unexpected(
                "backend reported processing failure".to_string(),
            ));
        }
        Ok(ProcessOutcome {
            follow_ups: body.follow_up_questions.unwrap_or_default(),
            causal_graph: body.causal_graph,
        })
    }
}
