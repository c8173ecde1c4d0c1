//! services/client/src/adapters/graph.rs
//!
//! This module contains the adapter that forwards causal graphs to the
//! graph-persistence collaborator. The graph contents are opaque to the
//! client; it implements the `CausalGraphSink` port from the `core` crate.

use async_trait::async_trait;
use interview_core::ports::{CausalGraphSink, PortError, PortResult};
use serde::Serialize;
use serde_json::Value;

/// An adapter that stores causal graphs over HTTP.
#[derive(Clone)]
pub struct HttpGraphSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGraphSink {
    /// Creates a new `HttpGraphSink`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    session_id: &'a str,
    graph: Value,
}

#[async_trait]
impl CausalGraphSink for HttpGraphSink {
    async fn store_graph(&self, session_id: &str, graph: Value) -> PortResult<()> {
        let url = format!("{}/graphs", self.base_url);
        self.client
            .post(&url)
            .json(&GraphBody { session_id, graph })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
